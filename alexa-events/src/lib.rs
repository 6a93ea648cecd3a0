//! Alexa change reports from Kodi device events.
//!
//! Devices push `change_state` messages over their tunnel whenever volume,
//! mute, playback or power changes. [`ChangeReportIngress`] plugs into the
//! tunnel server as its [`tunnel::AsyncMessageHandler`], maps the device state
//! to Alexa properties and posts an `Alexa.ChangeReport` to the event gateway
//! serving the user's region.
//!
//! ```no_run
//! use std::sync::Arc;
//! use alexa_events::{ChangeReportIngress, GatewayConfig, HttpEventNotifier, InMemoryTokenStore};
//!
//! # fn build() -> Result<ChangeReportIngress, alexa_events::NotifyError> {
//! let notifier = HttpEventNotifier::new(GatewayConfig::default())?;
//! let ingress = ChangeReportIngress::new(Arc::new(InMemoryTokenStore::new()), Arc::new(notifier));
//! # Ok(ingress)
//! # }
//! ```

pub mod error;
pub mod ingress;
pub mod notifier;
pub mod property;
pub mod region;
pub mod report;
pub mod tokens;

pub use error::{IngressError, NotifyError, TokenStoreError};
pub use ingress::{ChangeReportIngress, ChangeState};
pub use notifier::{EventNotifier, HttpEventNotifier};
pub use property::{transform_state, AlexaProperty};
pub use region::{AwsRegion, GatewayConfig, GatewayRegion};
pub use report::{ChangeCause, ChangeReport};
pub use tokens::{AlexaCredentials, InMemoryTokenStore, TokenStore};
