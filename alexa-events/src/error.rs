//! Error types for the Alexa event path.

/// Why an async device message produced no change report.
///
/// None of these close the device connection; the message is logged and
/// dropped.
#[derive(Debug, thiserror::Error)]
pub enum IngressError {
    /// `type` is missing or names no known message
    #[error("Unknown async message type: {0}")]
    UnknownMessageType(String),

    /// A `change_state` message that does not deserialize
    #[error("Invalid change_state message: {0}")]
    InvalidChangeState(#[source] serde_json::Error),

    /// `changed` names a state entry that is not in `state`
    #[error("Changed state {0:?} is not part of the reported state")]
    MissingChangedState(String),

    /// The changed entry has no Alexa property counterpart
    #[error("Changed state {0:?} has no Alexa property")]
    UntransformableChangedState(String),

    /// The token store failed
    #[error("Token lookup failed: {0}")]
    TokenLookup(#[from] TokenStoreError),

    /// The user has not linked an Alexa account, so there is nobody to notify
    #[error("User {0} has no Alexa region and/or access token")]
    NoAlexaCredentials(String),

    /// The stored region maps to no event gateway
    #[error("Unsupported region: {0}")]
    UnsupportedRegion(String),

    /// The event gateway did not accept the report
    #[error(transparent)]
    Delivery(#[from] NotifyError),
}

/// Failures delivering an event to the Alexa gateway.
#[derive(Debug, thiserror::Error)]
pub enum NotifyError {
    #[error("Invalid gateway configuration: {0}")]
    Config(String),

    #[error("HTTP request to Alexa event gateway failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Alexa event gateway rejected the event with status {status}: {body}")]
    Rejected { status: u16, body: String },
}

/// Failures of the Alexa token store.
#[derive(Debug, thiserror::Error)]
pub enum TokenStoreError {
    #[error("Token store unavailable: {0}")]
    Unavailable(String),

    #[error("Failed to read token store: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse token store: {0}")]
    Parse(#[from] serde_json::Error),
}
