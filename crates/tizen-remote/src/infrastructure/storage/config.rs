//! TOML-based persistence of the device registry.
//!
//! Reads and writes [`DeviceRegistry`] to the platform-appropriate file:
//! - Windows:  `%APPDATA%\TizenRemote\devices.toml`
//! - Linux:    `~/.config/tizen-remote/devices.toml`
//! - macOS:    `~/Library/Application Support/TizenRemote/devices.toml`
//!
//! An explicit path can be given instead (the CLI's `--config`).
//!
//! # File layout
//!
//! ```toml
//! [discovery]
//! duration_ms = 5000
//!
//! [[devices]]
//! id = "uuid:0f3c..."
//! name = "[TV] Living Room"
//! host = "192.168.1.20"
//! mac = "aa:bb:cc:dd:ee:ff"
//!
//! [devices.wake]
//! broadcast = "255.255.255.255"
//! port = 9
//!
//! [devices.rest]
//! port = 8001
//! dial_timeout_ms = 1000
//! request_timeout_ms = 10000
//!
//! [devices.control]
//! port = 8002
//! secure = true
//! client_name = "TizenRemote"
//! token = "13579246"
//! ```
//!
//! The session token is the important part: once the user accepts the
//! authorization prompt on the TV, the token is written here so the next run
//! reconnects without a prompt.
//!
//! # Serde default values
//!
//! Every field has a serde default, so a hand-written file only needs the
//! entries it wants to change, and a missing file is an empty registry.

use std::net::Ipv4Addr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::infrastructure::rest::{
    DEFAULT_REST_DIAL_TIMEOUT, DEFAULT_REST_PORT, DEFAULT_REST_REQUEST_TIMEOUT,
};
use crate::infrastructure::session::{
    DEFAULT_CLIENT_NAME, DEFAULT_DIAL_TIMEOUT, DEFAULT_READ_TIMEOUT, DEFAULT_WRITE_TIMEOUT,
    SECURE_PORT,
};
use crate::infrastructure::wake::DEFAULT_WAKE_PORT;

/// File name inside the platform config directory.
pub const REGISTRY_FILE_NAME: &str = "devices.toml";

/// Error type for registry file operations.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The platform config directory could not be determined.
    #[error("could not determine platform config directory")]
    NoPlatformConfigDir,

    /// A file system I/O error occurred.
    #[error("I/O error accessing config at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The TOML content could not be parsed.
    #[error("failed to parse config TOML: {0}")]
    Parse(#[from] toml::de::Error),

    /// The registry could not be serialized to TOML.
    #[error("failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),
}

// ── Schema ────────────────────────────────────────────────────────────────────

/// Everything the manager persists between runs.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct DeviceRegistry {
    #[serde(default)]
    pub discovery: DiscoverySettings,
    #[serde(default)]
    pub devices: Vec<DeviceConfig>,
}

impl DeviceRegistry {
    /// Looks up a device by its id.
    pub fn device(&self, id: &str) -> Option<&DeviceConfig> {
        self.devices.iter().find(|d| d.id == id)
    }

    /// Replaces the entry with the same id, or appends a new one.
    pub fn upsert(&mut self, config: DeviceConfig) {
        match self.devices.iter_mut().find(|d| d.id == config.id) {
            Some(existing) => *existing = config,
            None => self.devices.push(config),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DiscoverySettings {
    /// How long SSDP replies are collected.
    #[serde(default = "default_discovery_ms")]
    pub duration_ms: u64,
}

impl DiscoverySettings {
    pub fn duration(&self) -> Duration {
        Duration::from_millis(self.duration_ms)
    }
}

impl Default for DiscoverySettings {
    fn default() -> Self {
        Self {
            duration_ms: default_discovery_ms(),
        }
    }
}

/// One known TV.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct DeviceConfig {
    pub id: String,
    #[serde(default)]
    pub name: String,
    pub host: String,
    #[serde(default)]
    pub mac: String,
    #[serde(default)]
    pub wake: WakeSettings,
    #[serde(default)]
    pub rest: RestSettings,
    #[serde(default)]
    pub control: ControlSettings,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WakeSettings {
    #[serde(default = "default_broadcast")]
    pub broadcast: Ipv4Addr,
    #[serde(default = "default_wake_port")]
    pub port: u16,
}

impl Default for WakeSettings {
    fn default() -> Self {
        Self {
            broadcast: default_broadcast(),
            port: default_wake_port(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RestSettings {
    #[serde(default = "default_rest_port")]
    pub port: u16,
    #[serde(default = "default_rest_dial_ms")]
    pub dial_timeout_ms: u64,
    #[serde(default = "default_rest_request_ms")]
    pub request_timeout_ms: u64,
}

impl Default for RestSettings {
    fn default() -> Self {
        Self {
            port: default_rest_port(),
            dial_timeout_ms: default_rest_dial_ms(),
            request_timeout_ms: default_rest_request_ms(),
        }
    }
}

/// Control channel settings, including the persisted session token.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ControlSettings {
    #[serde(default = "default_control_port")]
    pub port: u16,
    #[serde(default = "default_true")]
    pub secure: bool,
    #[serde(default = "default_dial_ms")]
    pub dial_timeout_ms: u64,
    #[serde(default = "default_read_ms")]
    pub read_timeout_ms: u64,
    #[serde(default = "default_write_ms")]
    pub write_timeout_ms: u64,
    #[serde(default = "default_client_name")]
    pub client_name: String,
    #[serde(default)]
    pub token: String,
}

impl Default for ControlSettings {
    fn default() -> Self {
        Self {
            port: default_control_port(),
            secure: default_true(),
            dial_timeout_ms: default_dial_ms(),
            read_timeout_ms: default_read_ms(),
            write_timeout_ms: default_write_ms(),
            client_name: default_client_name(),
            token: String::new(),
        }
    }
}

// ── Default helpers ───────────────────────────────────────────────────────────

fn default_discovery_ms() -> u64 {
    5_000
}
fn default_broadcast() -> Ipv4Addr {
    Ipv4Addr::BROADCAST
}
fn default_wake_port() -> u16 {
    DEFAULT_WAKE_PORT
}
fn default_rest_port() -> u16 {
    DEFAULT_REST_PORT
}
fn default_rest_dial_ms() -> u64 {
    DEFAULT_REST_DIAL_TIMEOUT.as_millis() as u64
}
fn default_rest_request_ms() -> u64 {
    DEFAULT_REST_REQUEST_TIMEOUT.as_millis() as u64
}
fn default_control_port() -> u16 {
    SECURE_PORT
}
fn default_true() -> bool {
    true
}
fn default_dial_ms() -> u64 {
    DEFAULT_DIAL_TIMEOUT.as_millis() as u64
}
fn default_read_ms() -> u64 {
    DEFAULT_READ_TIMEOUT.as_millis() as u64
}
fn default_write_ms() -> u64 {
    DEFAULT_WRITE_TIMEOUT.as_millis() as u64
}
fn default_client_name() -> String {
    DEFAULT_CLIENT_NAME.to_string()
}

// ── Storage ───────────────────────────────────────────────────────────────────

/// Loads and stores the registry.
pub trait ConfigStorage: Send + Sync {
    fn load(&self) -> Result<DeviceRegistry, ConfigError>;
    fn store(&self, registry: &DeviceRegistry) -> Result<(), ConfigError>;
}

/// [`ConfigStorage`] backed by one TOML file.
#[derive(Debug, Clone)]
pub struct TomlConfigStorage {
    path: PathBuf,
}

impl TomlConfigStorage {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Storage at the platform default location.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::NoPlatformConfigDir`] when the platform config
    /// base directory cannot be determined from the environment.
    pub fn platform_default() -> Result<Self, ConfigError> {
        Ok(Self::new(config_file_path()?))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl ConfigStorage for TomlConfigStorage {
    /// Returns an empty registry if the file does not exist yet.
    fn load(&self) -> Result<DeviceRegistry, ConfigError> {
        match std::fs::read_to_string(&self.path) {
            Ok(content) => Ok(toml::from_str(&content)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("no registry at {}, starting empty", self.path.display());
                Ok(DeviceRegistry::default())
            }
            Err(source) => Err(ConfigError::Io {
                path: self.path.clone(),
                source,
            }),
        }
    }

    /// Creates the parent directory if needed.
    fn store(&self, registry: &DeviceRegistry) -> Result<(), ConfigError> {
        if let Some(dir) = self.path.parent() {
            std::fs::create_dir_all(dir).map_err(|source| ConfigError::Io {
                path: dir.to_path_buf(),
                source,
            })?;
        }

        let content = toml::to_string_pretty(registry)?;
        std::fs::write(&self.path, content).map_err(|source| ConfigError::Io {
            path: self.path.clone(),
            source,
        })?;
        debug!("registry with {} device(s) written to {}", registry.devices.len(), self.path.display());
        Ok(())
    }
}

/// Resolves the full path of the registry file.
///
/// # Errors
///
/// Returns [`ConfigError::NoPlatformConfigDir`] if the base directory cannot be
/// determined.
pub fn config_file_path() -> Result<PathBuf, ConfigError> {
    Ok(platform_config_dir()
        .ok_or(ConfigError::NoPlatformConfigDir)?
        .join(REGISTRY_FILE_NAME))
}

/// Resolves the platform config directory including the application subdirectory.
fn platform_config_dir() -> Option<PathBuf> {
    #[cfg(target_os = "windows")]
    {
        // %APPDATA% e.g. C:\Users\<user>\AppData\Roaming
        std::env::var_os("APPDATA").map(|p| PathBuf::from(p).join("TizenRemote"))
    }

    #[cfg(target_os = "linux")]
    {
        // XDG_CONFIG_HOME or ~/.config
        let base = std::env::var_os("XDG_CONFIG_HOME")
            .map(PathBuf::from)
            .or_else(|| std::env::var_os("HOME").map(|h| PathBuf::from(h).join(".config")))?;
        Some(base.join("tizen-remote"))
    }

    #[cfg(target_os = "macos")]
    {
        std::env::var_os("HOME").map(|h| {
            PathBuf::from(h)
                .join("Library")
                .join("Application Support")
                .join("TizenRemote")
        })
    }

    #[cfg(not(any(target_os = "windows", target_os = "linux", target_os = "macos")))]
    {
        None
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
