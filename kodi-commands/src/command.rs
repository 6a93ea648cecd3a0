//! Commands and queries understood by the Kodi add-on.
//!
//! A command goes over the wire as `{"type": "command", "commandType": <name>,
//! ...args}`; the two queries are bare `{"type": "state"}` and
//! `{"type": "capabilities"}` frames.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Search criteria for `searchAndPlay` / `searchAndDisplay`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoFilter {
    #[serde(default)]
    pub titles: Vec<String>,
    #[serde(default)]
    pub collections: Vec<String>,
    #[serde(default)]
    pub genres: Vec<String>,
    #[serde(default)]
    pub actors: Vec<String>,
    #[serde(default)]
    pub roles: Vec<String>,
    #[serde(default)]
    pub media_type: Option<String>,
    #[serde(default)]
    pub season: Option<String>,
    #[serde(default)]
    pub episode: Option<String>,
}

impl VideoFilter {
    pub fn titled(title: impl Into<String>) -> Self {
        Self {
            titles: vec![title.into()],
            ..Self::default()
        }
    }
}

/// The closed set of device commands.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "commandType", rename_all = "camelCase")]
pub enum Command {
    TurnOn,
    TurnOff,
    Next,
    Previous,
    StartOver,
    Play,
    Pause,
    Stop,
    Rewind,
    FastForward,
    /// Absolute volume, 0-100
    SetVolume { volume: u8 },
    /// Relative volume change, -100..=100
    AdjustVolume { volume: i8 },
    SetMute { mute: bool },
    SearchAndPlay { filter: VideoFilter },
    SearchAndDisplay { filter: VideoFilter },
    /// Relative seek in seconds
    #[serde(rename_all = "camelCase")]
    Seek { delta_position: f64 },
}

impl Command {
    /// Wire name of the command.
    pub fn name(&self) -> &'static str {
        match self {
            Command::TurnOn => "turnOn",
            Command::TurnOff => "turnOff",
            Command::Next => "next",
            Command::Previous => "previous",
            Command::StartOver => "startOver",
            Command::Play => "play",
            Command::Pause => "pause",
            Command::Stop => "stop",
            Command::Rewind => "rewind",
            Command::FastForward => "fastForward",
            Command::SetVolume { .. } => "setVolume",
            Command::AdjustVolume { .. } => "adjustVolume",
            Command::SetMute { .. } => "setMute",
            Command::SearchAndPlay { .. } => "searchAndPlay",
            Command::SearchAndDisplay { .. } => "searchAndDisplay",
            Command::Seek { .. } => "seek",
        }
    }

    /// Payload to hand to the tunnel.
    pub fn to_payload(&self) -> serde_json::Result<Value> {
        let mut payload = match serde_json::to_value(self)? {
            Value::Object(map) => map,
            _ => Map::new(),
        };
        payload.insert("type".to_string(), Value::String("command".to_string()));
        Ok(Value::Object(payload))
    }
}

/// Read-only requests answered with device data rather than a command result.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Query {
    State,
    Capabilities,
}

impl Query {
    pub fn name(&self) -> &'static str {
        match self {
            Query::State => "state",
            Query::Capabilities => "capabilities",
        }
    }

    pub fn to_payload(&self) -> Value {
        serde_json::json!({ "type": self.name() })
    }
}
