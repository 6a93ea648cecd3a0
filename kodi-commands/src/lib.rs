//! Typed commands for connected Kodi devices.
//!
//! [`CommandFacade`] is what directive handlers call. It checks that the device
//! is connected and owned by the caller, sends the command over the device's
//! tunnel, and maps device-reported errors to [`CommandError`] variants.
//!
//! ```no_run
//! use std::sync::Arc;
//! use kodi_commands::{Command, CommandFacade};
//! use tunnel::{ConnectionRegistry, DeviceId, InMemoryDeviceDirectory};
//!
//! # async fn run() -> kodi_commands::Result<()> {
//! let facade = CommandFacade::new(
//!     Arc::new(ConnectionRegistry::new()),
//!     Arc::new(InMemoryDeviceDirectory::new()),
//! );
//!
//! let device = DeviceId::new("dev-1");
//! facade.execute("alice", &device, &Command::SetVolume { volume: 50 }).await?;
//!
//! // Playback directives acknowledge immediately and let the command run.
//! facade.execute_detached("alice", device, Command::Pause);
//! # Ok(())
//! # }
//! ```

pub mod command;
pub mod error;
pub mod facade;
pub mod state;

pub use command::{Command, Query, VideoFilter};
pub use error::{CommandError, Result};
pub use facade::{CommandFacade, UNKNOWN_COMMAND};
pub use state::{DeviceState, StateEntry};
