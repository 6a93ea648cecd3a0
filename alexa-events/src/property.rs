//! Kodi state entry to Alexa context property.

use chrono::{SecondsFormat, Utc};
use kodi_commands::StateEntry;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

/// One reportable Alexa property.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AlexaProperty {
    pub namespace: String,
    pub name: String,
    pub value: Value,
    pub time_of_sample: String,
    pub uncertainty_in_milliseconds: u64,
}

impl AlexaProperty {
    fn new(namespace: &str, name: &str, value: Value, time_of_sample: String) -> Self {
        Self {
            namespace: namespace.to_string(),
            name: name.to_string(),
            value,
            time_of_sample,
            uncertainty_in_milliseconds: 0,
        }
    }
}

/// Kodi reports volume as any JSON number; Alexa wants a whole percentage.
fn volume_level(value: &Value) -> Option<u64> {
    value.as_u64().or_else(|| {
        value
            .as_f64()
            .filter(|volume| volume.is_finite() && *volume >= 0.0)
            .map(|volume| volume.round() as u64)
    })
}

/// Map a Kodi state entry to its Alexa property.
///
/// Returns `None` for entries Alexa has no property for, and for recognised
/// entries whose value has the wrong shape.
pub fn transform_state(entry: &StateEntry) -> Option<AlexaProperty> {
    let time = entry.time.clone().unwrap_or_else(now);

    match entry.name.as_str() {
        "volume" => volume_level(&entry.value)
            .map(|volume| AlexaProperty::new("Alexa.Speaker", "volume", json!(volume), time)),
        "muted" => entry
            .value
            .as_bool()
            .map(|muted| AlexaProperty::new("Alexa.Speaker", "muted", json!(muted), time)),
        "player" => playback_state(&entry.value).map(|state| {
            AlexaProperty::new(
                "Alexa.PlaybackStateReporter",
                "playbackState",
                json!({ "state": state }),
                time,
            )
        }),
        "power" => entry.value.as_bool().map(|on| {
            AlexaProperty::new(
                "Alexa.PowerController",
                "powerState",
                json!(if on { "ON" } else { "OFF" }),
                time,
            )
        }),
        _ => None,
    }
}

fn playback_state(value: &Value) -> Option<&'static str> {
    match value.as_str()? {
        "playing" => Some("PLAYING"),
        "paused" => Some("PAUSED"),
        "stopped" => Some("STOPPED"),
        _ => None,
    }
}

fn now() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}
