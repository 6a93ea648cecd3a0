//! Alexa `ChangeReport` event.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::property::AlexaProperty;

/// What caused a reported change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ChangeCause {
    /// Initiated through the add-on on Alexa's behalf
    VoiceInteraction,
    /// Initiated on the device itself
    PhysicalInteraction,
}

impl ChangeCause {
    pub fn from_addon_change(addon_change: bool) -> Self {
        if addon_change {
            ChangeCause::VoiceInteraction
        } else {
            ChangeCause::PhysicalInteraction
        }
    }
}

/// A complete `Alexa.ChangeReport` event, ready to post to the gateway.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChangeReport {
    pub context: ReportContext,
    pub event: ReportEvent,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportContext {
    pub properties: Vec<AlexaProperty>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportEvent {
    pub header: ReportHeader,
    pub endpoint: ReportEndpoint,
    pub payload: ReportPayload,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportHeader {
    pub message_id: String,
    pub namespace: String,
    pub name: String,
    pub payload_version: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportEndpoint {
    pub scope: BearerScope,
    pub endpoint_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BearerScope {
    #[serde(rename = "type")]
    pub kind: String,
    pub token: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportPayload {
    pub change: Change,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Change {
    pub cause: Cause,
    pub properties: Vec<AlexaProperty>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cause {
    #[serde(rename = "type")]
    pub kind: ChangeCause,
}

impl ChangeReport {
    /// Build a report for one changed property, with the rest of the device's
    /// state as context.
    pub fn new(
        access_token: impl Into<String>,
        endpoint_id: impl Into<String>,
        changed: AlexaProperty,
        cause: ChangeCause,
        context_properties: Vec<AlexaProperty>,
    ) -> Self {
        Self {
            context: ReportContext {
                properties: context_properties,
            },
            event: ReportEvent {
                header: ReportHeader {
                    message_id: Uuid::new_v4().to_string(),
                    namespace: "Alexa".to_string(),
                    name: "ChangeReport".to_string(),
                    payload_version: "3".to_string(),
                },
                endpoint: ReportEndpoint {
                    scope: BearerScope {
                        kind: "BearerToken".to_string(),
                        token: access_token.into(),
                    },
                    endpoint_id: endpoint_id.into(),
                },
                payload: ReportPayload {
                    change: Change {
                        cause: Cause { kind: cause },
                        properties: vec![changed],
                    },
                },
            },
        }
    }

    pub fn message_id(&self) -> &str {
        &self.event.header.message_id
    }

    pub fn endpoint_id(&self) -> &str {
        &self.event.endpoint.endpoint_id
    }

    pub fn cause(&self) -> ChangeCause {
        self.event.payload.change.cause.kind
    }
}
