//! Command line and environment configuration.

use std::net::IpAddr;
use std::path::PathBuf;
use std::time::Duration;

use alexa_events::region::{DEFAULT_EU_GATEWAY, DEFAULT_FE_GATEWAY, DEFAULT_US_GATEWAY};
use alexa_events::GatewayConfig;
use clap::Parser;
use tunnel::TunnelConfig;
use tunnel_server::ServerConfig;

use crate::error::{KodiConnectError, Result};
use crate::logging::LoggingMode;

/// Tunnel server for the Kodi Alexa skill.
///
/// Kodi devices dial in over WebSocket and stay connected; Alexa directives are
/// forwarded to them as correlated calls, and state changes they report are
/// sent back to Alexa as change reports.
#[derive(Parser, Debug, Clone)]
#[command(name = "kodi-connect", version, about)]
pub struct Args {
    /// Interface to listen on
    #[arg(long = "bind", env = "KODI_CONNECT_BIND", default_value = "0.0.0.0")]
    pub bind_address: IpAddr,

    /// Port to listen on
    #[arg(short, long, env = "KODI_CONNECT_PORT", default_value_t = tunnel_server::DEFAULT_PORT)]
    pub port: u16,

    /// Path segment of the WebSocket endpoint
    #[arg(long, env = "KODI_CONNECT_WS_PATH", default_value = tunnel_server::DEFAULT_WS_PATH)]
    pub ws_path: String,

    /// Seconds a call to a device waits for its response
    #[arg(long, env = "KODI_CONNECT_RPC_TIMEOUT_SECS", default_value_t = 60)]
    pub rpc_timeout_secs: u64,

    /// Seconds a device may stay silent before it is disconnected (0 disables)
    #[arg(long, env = "KODI_CONNECT_IDLE_TIMEOUT_SECS", default_value_t = 300)]
    pub idle_timeout_secs: u64,

    /// Outbound frames that may queue for one device
    #[arg(long, env = "KODI_CONNECT_OUTBOUND_BUFFER", default_value_t = 256)]
    pub outbound_buffer: usize,

    /// JSON array of `{username, secret, deviceId}` device registrations
    #[arg(long, env = "KODI_CONNECT_DEVICES_FILE")]
    pub devices_file: Option<PathBuf>,

    /// JSON object of `username -> {region, accessToken}` linked Alexa accounts
    #[arg(long, env = "KODI_CONNECT_TOKENS_FILE")]
    pub tokens_file: Option<PathBuf>,

    /// Log output format
    #[arg(long, env = "KODI_CONNECT_LOG_MODE", value_enum, default_value_t = LoggingMode::Development)]
    pub log_mode: LoggingMode,

    /// Log filter, e.g. `info` or `tunnel=debug,warn`
    #[arg(long, env = "KODI_CONNECT_LOG_LEVEL")]
    pub log_level: Option<String>,

    /// Alexa event gateway for North American accounts
    #[arg(long, env = "KODI_CONNECT_GATEWAY_US_URL", default_value = DEFAULT_US_GATEWAY)]
    pub gateway_us_url: String,

    /// Alexa event gateway for European accounts
    #[arg(long, env = "KODI_CONNECT_GATEWAY_EU_URL", default_value = DEFAULT_EU_GATEWAY)]
    pub gateway_eu_url: String,

    /// Alexa event gateway for Far East accounts
    #[arg(long, env = "KODI_CONNECT_GATEWAY_FE_URL", default_value = DEFAULT_FE_GATEWAY)]
    pub gateway_fe_url: String,

    /// Seconds to wait for the event gateway to answer
    #[arg(long, env = "KODI_CONNECT_GATEWAY_TIMEOUT_SECS", default_value_t = 10)]
    pub gateway_timeout_secs: u64,
}

/// Fully resolved settings for [`crate::KodiConnect::start`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Settings {
    pub server: ServerConfig,
    pub gateways: GatewayConfig,
    pub devices_file: Option<PathBuf>,
    pub tokens_file: Option<PathBuf>,
}

impl Settings {
    pub fn validate(&self) -> Result<()> {
        self.server.validate()?;
        self.gateways.validate()?;
        Ok(())
    }
}

impl TryFrom<Args> for Settings {
    type Error = KodiConnectError;

    fn try_from(args: Args) -> Result<Self> {
        let idle_timeout = match args.idle_timeout_secs {
            0 => None,
            secs => Some(Duration::from_secs(secs)),
        };

        let tunnel = TunnelConfig {
            rpc_timeout: Duration::from_secs(args.rpc_timeout_secs),
            idle_timeout,
            outbound_buffer: args.outbound_buffer,
        };

        let settings = Self {
            server: ServerConfig::new()
                .with_bind_address(args.bind_address)
                .with_port(args.port)
                .with_ws_path(args.ws_path)
                .with_tunnel(tunnel),
            gateways: GatewayConfig {
                us_url: args.gateway_us_url,
                eu_url: args.gateway_eu_url,
                fe_url: args.gateway_fe_url,
                request_timeout: Duration::from_secs(args.gateway_timeout_secs),
            },
            devices_file: args.devices_file,
            tokens_file: args.tokens_file,
        };

        settings.validate()?;
        Ok(settings)
    }
}
