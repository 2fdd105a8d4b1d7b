//! Error type shared by the application use cases.

use std::time::Duration;

use thiserror::Error;
use tizen_core::ProtocolError;

use crate::infrastructure::discovery::DiscoveryError;
use crate::infrastructure::rest::RestError;
use crate::infrastructure::session::SessionError;
use crate::infrastructure::storage::config::ConfigError;

/// Everything a TV operation can fail with.
///
/// Power transitions report a single terminal error; which step was in
/// progress when the deadline passed is only visible in the logs.
#[derive(Debug, Error)]
pub enum TvError {
    /// The TV did not become ready before the power-on deadline.
    #[error("TV not found on the network within {0:?}")]
    DeviceNotFound(Duration),

    /// The TV was still reachable when the power-off deadline passed.
    #[error("TV did not power off within {0:?}")]
    PowerOffTimeout(Duration),

    /// The authorization handler rejected the new token.
    #[error("authorization handler failed: {0}")]
    Authorize(String),

    /// No registry entry has this id.
    #[error("unknown device {0:?}")]
    UnknownDevice(String),

    #[error(transparent)]
    Session(#[from] SessionError),

    #[error(transparent)]
    Rest(#[from] RestError),

    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Discovery(#[from] DiscoveryError),
}
