//! Device state as reported by the add-on.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One named piece of device state, e.g. `{"name": "volume", "value": 30}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateEntry {
    pub name: String,
    pub value: Value,
    /// ISO-8601 sample time, when the add-on provides one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time: Option<String>,
}

impl StateEntry {
    pub fn new(name: impl Into<String>, value: Value) -> Self {
        Self {
            name: name.into(),
            value,
            time: None,
        }
    }
}

/// Response to a `state` query.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DeviceState {
    #[serde(default)]
    pub state: Vec<StateEntry>,
}

impl DeviceState {
    pub fn get(&self, name: &str) -> Option<&StateEntry> {
        self.state.iter().find(|entry| entry.name == name)
    }
}
