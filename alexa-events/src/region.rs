//! Account regions and the Alexa event gateways that serve them.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{IngressError, NotifyError};

pub const DEFAULT_US_GATEWAY: &str = "https://api.amazonalexa.com/v3/events";
pub const DEFAULT_EU_GATEWAY: &str = "https://api.eu.amazonalexa.com/v3/events";
pub const DEFAULT_FE_GATEWAY: &str = "https://api.fe.amazonalexa.com/v3/events";

/// Region an Alexa account was linked in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AwsRegion {
    Us,
    Ap,
    Ca,
    Cn,
    Eu,
    Sa,
}

impl AwsRegion {
    /// Gateway that accepts events for accounts in this region.
    pub fn gateway(self) -> GatewayRegion {
        match self {
            AwsRegion::Us | AwsRegion::Ca => GatewayRegion::Us,
            AwsRegion::Eu | AwsRegion::Sa => GatewayRegion::Eu,
            AwsRegion::Ap | AwsRegion::Cn => GatewayRegion::Fe,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            AwsRegion::Us => "us",
            AwsRegion::Ap => "ap",
            AwsRegion::Ca => "ca",
            AwsRegion::Cn => "cn",
            AwsRegion::Eu => "eu",
            AwsRegion::Sa => "sa",
        }
    }
}

impl FromStr for AwsRegion {
    type Err = IngressError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "us" => Ok(AwsRegion::Us),
            "ap" => Ok(AwsRegion::Ap),
            "ca" => Ok(AwsRegion::Ca),
            "cn" => Ok(AwsRegion::Cn),
            "eu" => Ok(AwsRegion::Eu),
            "sa" => Ok(AwsRegion::Sa),
            other => Err(IngressError::UnsupportedRegion(other.to_string())),
        }
    }
}

impl fmt::Display for AwsRegion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One of the three Alexa event gateways.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GatewayRegion {
    /// North America
    Us,
    /// Europe and India
    Eu,
    /// Far East
    Fe,
}

impl fmt::Display for GatewayRegion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            GatewayRegion::Us => "us",
            GatewayRegion::Eu => "eu",
            GatewayRegion::Fe => "fe",
        })
    }
}

/// Event gateway endpoints and delivery settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GatewayConfig {
    pub us_url: String,
    pub eu_url: String,
    pub fe_url: String,

    /// Per-request timeout for event delivery
    /// Default: 10 seconds
    pub request_timeout: Duration,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            us_url: DEFAULT_US_GATEWAY.to_string(),
            eu_url: DEFAULT_EU_GATEWAY.to_string(),
            fe_url: DEFAULT_FE_GATEWAY.to_string(),
            request_timeout: Duration::from_secs(10),
        }
    }
}

impl GatewayConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Send every region's events to one URL. Useful against a local mock.
    pub fn single(url: impl Into<String>) -> Self {
        let url = url.into();
        Self {
            us_url: url.clone(),
            eu_url: url.clone(),
            fe_url: url,
            ..Self::default()
        }
    }

    pub fn with_request_timeout(mut self, request_timeout: Duration) -> Self {
        self.request_timeout = request_timeout;
        self
    }

    pub fn url_for(&self, gateway: GatewayRegion) -> Result<Url, NotifyError> {
        let raw = match gateway {
            GatewayRegion::Us => &self.us_url,
            GatewayRegion::Eu => &self.eu_url,
            GatewayRegion::Fe => &self.fe_url,
        };
        Url::parse(raw).map_err(|e| NotifyError::Config(format!("{gateway} gateway URL {raw:?}: {e}")))
    }

    pub fn validate(&self) -> Result<(), NotifyError> {
        for gateway in [GatewayRegion::Us, GatewayRegion::Eu, GatewayRegion::Fe] {
            self.url_for(gateway)?;
        }
        if self.request_timeout == Duration::ZERO {
            return Err(NotifyError::Config(
                "Request timeout must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }
}
