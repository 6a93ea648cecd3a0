//! Async event ingress.
//!
//! Receives the `data` of every `{"async": true}` frame a device sends and turns
//! `change_state` messages into Alexa change reports. Processing failures are
//! logged here and never reach the device connection; the only message that is
//! rejected back to the connection is one whose data is not a JSON object.

use std::sync::Arc;

use async_trait::async_trait;
use kodi_commands::StateEntry;
use serde::Deserialize;
use serde_json::Value;
use tunnel::{AsyncHandlerError, AsyncMessageHandler, DeviceId};

use crate::error::IngressError;
use crate::notifier::EventNotifier;
use crate::property::{transform_state, AlexaProperty};
use crate::region::AwsRegion;
use crate::report::{ChangeCause, ChangeReport};
use crate::tokens::TokenStore;

pub const CHANGE_STATE: &str = "change_state";

/// Body of a `change_state` message.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ChangeState {
    /// Name of the state entry that changed
    pub changed: String,
    /// The device's full current state
    pub state: Vec<StateEntry>,
    /// Whether the change was made by the add-on on Alexa's request
    #[serde(default)]
    pub addon_change: bool,
}

/// Turns device state changes into Alexa change reports.
pub struct ChangeReportIngress {
    tokens: Arc<dyn TokenStore>,
    notifier: Arc<dyn EventNotifier>,
}

impl ChangeReportIngress {
    pub fn new(tokens: Arc<dyn TokenStore>, notifier: Arc<dyn EventNotifier>) -> Self {
        Self { tokens, notifier }
    }

    /// Process one async message end to end and report what went wrong, if
    /// anything.
    pub async fn process(
        &self,
        username: &str,
        device_id: &DeviceId,
        message: Value,
    ) -> Result<(), IngressError> {
        let message_type = message.get("type").and_then(Value::as_str).unwrap_or("");

        match message_type {
            CHANGE_STATE => {
                let change: ChangeState =
                    serde_json::from_value(message).map_err(IngressError::InvalidChangeState)?;
                self.change_state(username, device_id, change).await
            }
            other => Err(IngressError::UnknownMessageType(other.to_string())),
        }
    }

    async fn change_state(
        &self,
        username: &str,
        device_id: &DeviceId,
        change: ChangeState,
    ) -> Result<(), IngressError> {
        tracing::debug!(changed = %change.changed, entries = change.state.len(), "change_state");

        let (changed, context) = split_properties(&change)?;

        let credentials = self
            .tokens
            .region_and_access_token(username)
            .await?
            .ok_or_else(|| IngressError::NoAlexaCredentials(username.to_string()))?;
        let region: AwsRegion = credentials.region.parse()?;

        let report = ChangeReport::new(
            credentials.access_token,
            device_id.as_str(),
            changed,
            ChangeCause::from_addon_change(change.addon_change),
            context,
        );

        self.notifier
            .notify_change_report(region.gateway(), &report)
            .await?;

        tracing::info!(
            region = %region,
            message_id = report.message_id(),
            cause = ?report.cause(),
            "Change report delivered"
        );
        Ok(())
    }
}

/// Split the state into the changed property and the context properties.
fn split_properties(
    change: &ChangeState,
) -> Result<(AlexaProperty, Vec<AlexaProperty>), IngressError> {
    let changed_entry = change
        .state
        .iter()
        .find(|entry| entry.name == change.changed)
        .ok_or_else(|| IngressError::MissingChangedState(change.changed.clone()))?;

    let changed = transform_state(changed_entry)
        .ok_or_else(|| IngressError::UntransformableChangedState(change.changed.clone()))?;

    let context = change
        .state
        .iter()
        .filter(|entry| entry.name != change.changed)
        .filter_map(transform_state)
        .collect();

    Ok((changed, context))
}

#[async_trait]
impl AsyncMessageHandler for ChangeReportIngress {
    async fn handle_async_message(
        &self,
        username: &str,
        device_id: &DeviceId,
        message: Value,
    ) -> Result<(), AsyncHandlerError> {
        if !message.is_object() {
            return Err(AsyncHandlerError::MalformedMessage(format!(
                "expected an object, got {message}"
            )));
        }

        if let Err(error) = self.process(username, device_id, message).await {
            match &error {
                IngressError::NoAlexaCredentials(_) | IngressError::Delivery(_) => {
                    tracing::warn!(username, device_id = %device_id, %error, "Change report dropped");
                }
                _ => {
                    tracing::error!(username, device_id = %device_id, %error, "Async message handler failed");
                }
            }
        }
        Ok(())
    }
}
