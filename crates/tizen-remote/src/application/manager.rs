//! `TvManager`: discovery and the persistent device registry.
//!
//! # Where do `Tv` values come from? (for beginners)
//!
//! A [`Tv`] needs four collaborators (control channel, HTTP API,
//! availability probe, wake sender), each configured from the TV's registry
//! entry.  The manager owns that wiring:
//!
//! 1. [`TvManager::discover`] finds TVs on the LAN via SSDP, asks each one
//!    for its metadata, and picks the control port it answers on.
//! 2. [`TvManager::store`] merges the discovered TVs into the registry file.
//! 3. [`TvManager::load`] / [`TvManager::load_by_id`] rebuild `Tv` values
//!    from the registry on later runs, including the saved session token.
//!
//! The collaborators are built by a [`DeviceBackend`].  Production code uses
//! [`NetworkBackend`]; tests substitute one that returns in-memory doubles.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use tracing::{debug, info, warn};

use crate::application::error::TvError;
use crate::application::tv::Tv;
use crate::infrastructure::discovery::{HostDiscoverer, SsdpDiscoverer};
use crate::infrastructure::probe::{AllReachable, AvailabilityProbe, TcpProbe};
use crate::infrastructure::rest::{DeviceApi, RestClient};
use crate::infrastructure::session::{
    ControlChannel, DuplexSession, SessionConfig, Transport, PLAIN_PORT, SECURE_PORT,
};
use crate::infrastructure::storage::config::{ConfigStorage, DeviceConfig};
use crate::infrastructure::wake::{WakeOnLan, WakeSignal};

// ── Backend seam ──────────────────────────────────────────────────────────────

/// Builds the collaborators of one TV from its registry entry.
pub trait DeviceBackend: Send + Sync {
    fn device_api(&self, config: &DeviceConfig) -> Result<Arc<dyn DeviceApi>, TvError>;

    /// Probe for a single port, used while choosing the control transport.
    fn port_probe(&self, host: &str, port: u16, dial_timeout: Duration) -> Arc<dyn AvailabilityProbe>;

    /// Probe that passes only when every service port of the TV answers.
    fn availability_probe(&self, config: &DeviceConfig) -> Arc<dyn AvailabilityProbe>;

    fn control_channel(&self, config: &DeviceConfig) -> Arc<dyn ControlChannel>;

    fn wake_signal(&self, config: &DeviceConfig) -> Arc<dyn WakeSignal>;
}

/// Real sockets, HTTP, and WebSocket sessions.
#[derive(Debug, Clone, Copy, Default)]
pub struct NetworkBackend;

impl DeviceBackend for NetworkBackend {
    fn device_api(&self, config: &DeviceConfig) -> Result<Arc<dyn DeviceApi>, TvError> {
        let client = RestClient::with_settings(
            config.host.clone(),
            config.rest.port,
            Duration::from_millis(config.rest.dial_timeout_ms),
            Duration::from_millis(config.rest.request_timeout_ms),
        )?;
        Ok(Arc::new(client))
    }

    fn port_probe(&self, host: &str, port: u16, dial_timeout: Duration) -> Arc<dyn AvailabilityProbe> {
        Arc::new(TcpProbe::new(host, port, dial_timeout))
    }

    fn availability_probe(&self, config: &DeviceConfig) -> Arc<dyn AvailabilityProbe> {
        Arc::new(AllReachable::new(vec![
            TcpProbe::new(
                config.host.clone(),
                config.rest.port,
                Duration::from_millis(config.rest.dial_timeout_ms),
            ),
            TcpProbe::new(
                config.host.clone(),
                config.control.port,
                Duration::from_millis(config.control.dial_timeout_ms),
            ),
        ]))
    }

    fn control_channel(&self, config: &DeviceConfig) -> Arc<dyn ControlChannel> {
        Arc::new(DuplexSession::new(session_config(config)))
    }

    fn wake_signal(&self, config: &DeviceConfig) -> Arc<dyn WakeSignal> {
        Arc::new(
            WakeOnLan::new(config.mac.clone())
                .with_broadcast(config.wake.broadcast)
                .with_port(config.wake.port),
        )
    }
}

/// Maps a registry entry onto session settings: transport first, then the
/// options that depend on it.
pub fn session_config(config: &DeviceConfig) -> SessionConfig {
    let transport = if config.control.secure {
        Transport::Secure
    } else {
        Transport::Plain
    };
    SessionConfig::with_transport(config.host.clone(), transport)
        .with_port(config.control.port)
        .with_dial_timeout(Duration::from_millis(config.control.dial_timeout_ms))
        .with_read_timeout(Duration::from_millis(config.control.read_timeout_ms))
        .with_write_timeout(Duration::from_millis(config.control.write_timeout_ms))
        .with_client_name(config.control.client_name.clone())
}

// ── Manager ───────────────────────────────────────────────────────────────────

pub struct TvManager {
    storage: Arc<dyn ConfigStorage>,
    discoverer: Option<Arc<dyn HostDiscoverer>>,
    backend: Arc<dyn DeviceBackend>,
}

impl TvManager {
    /// A manager using the network backend and SSDP with the registry's
    /// search duration.
    pub fn new(storage: Arc<dyn ConfigStorage>) -> Self {
        Self {
            storage,
            discoverer: None,
            backend: Arc::new(NetworkBackend),
        }
    }

    pub fn with_discoverer(mut self, discoverer: Arc<dyn HostDiscoverer>) -> Self {
        self.discoverer = Some(discoverer);
        self
    }

    pub fn with_backend(mut self, backend: Arc<dyn DeviceBackend>) -> Self {
        self.backend = backend;
        self
    }

    /// Finds TVs on the local network.
    ///
    /// Hosts that do not answer the metadata query, or answer on neither
    /// control port, are skipped.  The secure port is preferred.
    pub async fn discover(&self) -> Result<Vec<Tv>, TvError> {
        let discoverer = match &self.discoverer {
            Some(discoverer) => Arc::clone(discoverer),
            None => {
                let duration = self.storage.load()?.discovery.duration();
                Arc::new(SsdpDiscoverer::new(duration)) as Arc<dyn HostDiscoverer>
            }
        };

        let hosts = discoverer.discover().await?;
        let mut tvs = Vec::new();
        for host in hosts {
            match self.inspect(&host).await? {
                Some(config) => {
                    info!("discovered {} ({}) at {}", config.name, config.id, config.host);
                    tvs.push(self.create_tv(config)?);
                }
                None => debug!("{host} is not a controllable TV, skipping"),
            }
        }
        Ok(tvs)
    }

    /// Merges `tvs` into the registry.
    ///
    /// Existing entries keep their name and client name.  The token is
    /// taken from the `Tv` when it has one, otherwise the stored one is kept.
    pub fn store(&self, tvs: &[Tv]) -> Result<(), TvError> {
        let mut registry = self.storage.load()?;
        for tv in tvs {
            let mut config = tv.config().clone();
            config.control.token = tv.token();
            if let Some(existing) = registry.device(&config.id) {
                if !existing.name.is_empty() {
                    config.name = existing.name.clone();
                }
                config.control.client_name = existing.control.client_name.clone();
                if config.control.token.is_empty() {
                    config.control.token = existing.control.token.clone();
                }
            }
            registry.upsert(config);
        }
        self.storage.store(&registry)?;
        info!("stored {} device(s)", tvs.len());
        Ok(())
    }

    /// Builds a `Tv` for every registry entry.
    pub fn load(&self) -> Result<Vec<Tv>, TvError> {
        let registry = self.storage.load()?;
        registry
            .devices
            .into_iter()
            .map(|config| self.create_tv(config))
            .collect()
    }

    pub fn load_by_id(&self, id: &str) -> Result<Tv, TvError> {
        let registry = self.storage.load()?;
        let config = registry
            .device(id)
            .cloned()
            .ok_or_else(|| TvError::UnknownDevice(id.to_string()))?;
        self.create_tv(config)
    }

    /// Wires a `Tv` whose new tokens are written back to the registry.
    pub fn create_tv(&self, config: DeviceConfig) -> Result<Tv, TvError> {
        let tv = Tv::new(
            config.clone(),
            self.backend.control_channel(&config),
            self.backend.device_api(&config)?,
            self.backend.availability_probe(&config),
            self.backend.wake_signal(&config),
        );

        let storage = Arc::clone(&self.storage);
        tv.on_authorize(move |token| {
            let mut registry = storage.load().context("loading device registry")?;
            match registry.devices.iter_mut().find(|d| d.id == config.id) {
                Some(entry) => entry.control.token = token.to_string(),
                None => {
                    let mut entry = config.clone();
                    entry.control.token = token.to_string();
                    registry.upsert(entry);
                }
            }
            storage
                .store(&registry)
                .with_context(|| format!("saving token for {}", config.id))?;
            info!("saved new token for {}", config.id);
            Ok(())
        });
        Ok(tv)
    }

    /// Builds a registry entry for `host`, or `None` if it is not usable.
    async fn inspect(&self, host: &str) -> Result<Option<DeviceConfig>, TvError> {
        let mut config = DeviceConfig {
            host: host.to_string(),
            ..DeviceConfig::default()
        };

        let api = self.backend.device_api(&config)?;
        let info = match api.device_info().await {
            Ok(info) => info,
            Err(e) => {
                debug!("{host}: metadata query failed: {e}");
                return Ok(None);
            }
        };

        let dial = Duration::from_millis(config.control.dial_timeout_ms);
        let (secure, port) = if self.backend.port_probe(host, SECURE_PORT, dial).is_available().await {
            (true, SECURE_PORT)
        } else if self.backend.port_probe(host, PLAIN_PORT, dial).is_available().await {
            (false, PLAIN_PORT)
        } else {
            warn!("{host}: neither control port answers");
            return Ok(None);
        };
        config.control.secure = secure;
        config.control.port = port;

        config.id = first_non_empty(info.device.id(), &info.id).to_string();
        config.name = first_non_empty(info.device.name(), &info.name).to_string();
        config.mac = info.device.mac().to_string();
        if config.id.is_empty() {
            config.id = host.to_string();
        }
        Ok(Some(config))
    }
}

fn first_non_empty<'a>(preferred: &'a str, fallback: &'a str) -> &'a str {
    if preferred.is_empty() {
        fallback
    } else {
        preferred
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;
    use std::sync::Mutex;

    use async_trait::async_trait;
    use tizen_core::{DeviceDescriptor, DeviceInfo};

    use crate::infrastructure::discovery::MockHostDiscoverer;
    use crate::infrastructure::rest::{MockDeviceApi, RestError};
    use crate::infrastructure::session::{MockControlChannel, SessionInfo};
    use crate::infrastructure::storage::config::{ConfigError, DeviceRegistry};
    use crate::infrastructure::wake::MockWakeSignal;

    #[derive(Default)]
    struct MemoryStorage {
        registry: Mutex<DeviceRegistry>,
    }

    impl ConfigStorage for MemoryStorage {
        fn load(&self) -> Result<DeviceRegistry, ConfigError> {
            Ok(self.registry.lock().unwrap().clone())
        }

        fn store(&self, registry: &DeviceRegistry) -> Result<(), ConfigError> {
            *self.registry.lock().unwrap() = registry.clone();
            Ok(())
        }
    }

    struct FixedProbe(bool);

    #[async_trait]
    impl AvailabilityProbe for FixedProbe {
        async fn is_available(&self) -> bool {
            self.0
        }
    }

    /// Answers metadata for hosts listed in `tvs`; `open_ports` lists which
    /// control ports answer.  Every channel issues `issued_token`.
    #[derive(Default)]
    struct FakeBackend {
        tvs: BTreeMap<String, DeviceInfo>,
        open_ports: Vec<(String, u16)>,
        issued_token: String,
    }

    impl DeviceBackend for FakeBackend {
        fn device_api(&self, config: &DeviceConfig) -> Result<Arc<dyn DeviceApi>, TvError> {
            let info = self.tvs.get(&config.host).cloned();
            let mut api = MockDeviceApi::new();
            api.expect_device_info().returning(move || match &info {
                Some(info) => Ok(info.clone()),
                None => Err(RestError::Status(404)),
            });
            Ok(Arc::new(api))
        }

        fn port_probe(&self, host: &str, port: u16, _dial: Duration) -> Arc<dyn AvailabilityProbe> {
            let open = self.open_ports.iter().any(|(h, p)| h == host && *p == port);
            Arc::new(FixedProbe(open))
        }

        fn availability_probe(&self, _config: &DeviceConfig) -> Arc<dyn AvailabilityProbe> {
            Arc::new(FixedProbe(true))
        }

        fn control_channel(&self, _config: &DeviceConfig) -> Arc<dyn ControlChannel> {
            let token = self.issued_token.clone();
            let mut channel = MockControlChannel::new();
            let mut checks = 0;
            channel.expect_is_connected().returning(move || {
                checks += 1;
                checks > 1
            });
            channel.expect_connect().returning(move |_| {
                Ok(SessionInfo {
                    event: "ms.channel.connect".into(),
                    id: "c".into(),
                    token: token.clone(),
                    clients: Vec::new(),
                })
            });
            channel.expect_send_command().returning(|_| Ok(()));
            Arc::new(channel)
        }

        fn wake_signal(&self, _config: &DeviceConfig) -> Arc<dyn WakeSignal> {
            Arc::new(MockWakeSignal::new())
        }
    }

    fn tv_info(id: &str, name: &str, mac: &str) -> DeviceInfo {
        let mut descriptor = BTreeMap::new();
        descriptor.insert("id".to_string(), id.to_string());
        descriptor.insert("name".to_string(), name.to_string());
        descriptor.insert("wifiMac".to_string(), mac.to_string());
        DeviceInfo {
            device: DeviceDescriptor(descriptor),
            ..DeviceInfo::default()
        }
    }

    fn manager(storage: Arc<MemoryStorage>, backend: FakeBackend, hosts: Vec<&str>) -> TvManager {
        let hosts: Vec<String> = hosts.into_iter().map(String::from).collect();
        let mut discoverer = MockHostDiscoverer::new();
        discoverer
            .expect_discover()
            .returning(move || Ok(hosts.clone()));
        TvManager::new(storage)
            .with_discoverer(Arc::new(discoverer))
            .with_backend(Arc::new(backend))
    }

    #[tokio::test]
    async fn test_discover_prefers_secure_port_and_skips_non_tvs() {
        // Arrange
        let mut backend = FakeBackend::default();
        backend.tvs.insert("10.0.0.7".into(), tv_info("uuid:a", "Kitchen", "aa:bb:cc:dd:ee:01"));
        backend.tvs.insert("10.0.0.8".into(), tv_info("uuid:b", "Den", "aa:bb:cc:dd:ee:02"));
        backend.tvs.insert("10.0.0.9".into(), tv_info("uuid:c", "Attic", ""));
        backend.open_ports = vec![
            ("10.0.0.7".into(), SECURE_PORT),
            ("10.0.0.7".into(), PLAIN_PORT),
            ("10.0.0.8".into(), PLAIN_PORT),
        ];
        let storage = Arc::new(MemoryStorage::default());
        let manager = manager(storage, backend, vec!["10.0.0.7", "10.0.0.8", "10.0.0.9", "10.0.0.10"]);

        // Act
        let tvs = manager.discover().await.unwrap();

        // Assert
        assert_eq!(tvs.len(), 2);
        assert_eq!(tvs[0].id(), "uuid:a");
        assert!(tvs[0].config().control.secure);
        assert_eq!(tvs[0].config().control.port, SECURE_PORT);
        assert_eq!(tvs[0].config().mac, "aa:bb:cc:dd:ee:01");
        assert_eq!(tvs[1].id(), "uuid:b");
        assert!(!tvs[1].config().control.secure);
        assert_eq!(tvs[1].config().control.port, PLAIN_PORT);
    }

    #[tokio::test]
    async fn test_store_keeps_existing_name_client_name_and_token() {
        // Arrange: the registry already knows this TV under a custom name
        let storage = Arc::new(MemoryStorage::default());
        {
            let mut registry = storage.registry.lock().unwrap();
            let mut existing = DeviceConfig {
                id: "uuid:a".into(),
                name: "My TV".into(),
                host: "10.0.0.5".into(),
                ..DeviceConfig::default()
            };
            existing.control.client_name = "Custom".into();
            existing.control.token = "old-token".into();
            registry.devices.push(existing);
        }
        let mut backend = FakeBackend::default();
        backend.tvs.insert("10.0.0.7".into(), tv_info("uuid:a", "Kitchen", ""));
        backend.open_ports = vec![("10.0.0.7".into(), SECURE_PORT)];
        let manager = manager(Arc::clone(&storage), backend, vec!["10.0.0.7"]);
        let tvs = manager.discover().await.unwrap();

        // Act
        manager.store(&tvs).unwrap();

        // Assert
        let registry = storage.registry.lock().unwrap();
        assert_eq!(registry.devices.len(), 1);
        let entry = &registry.devices[0];
        assert_eq!(entry.name, "My TV");
        assert_eq!(entry.host, "10.0.0.7");
        assert_eq!(entry.control.client_name, "Custom");
        assert_eq!(entry.control.token, "old-token");
    }

    #[tokio::test]
    async fn test_load_by_id_unknown_device() {
        let manager = TvManager::new(Arc::new(MemoryStorage::default()))
            .with_backend(Arc::new(FakeBackend::default()));

        let result = manager.load_by_id("uuid:missing");

        assert!(matches!(result, Err(TvError::UnknownDevice(id)) if id == "uuid:missing"));
    }

    #[tokio::test]
    async fn test_load_restores_saved_token() {
        let storage = Arc::new(MemoryStorage::default());
        {
            let mut registry = storage.registry.lock().unwrap();
            let mut entry = DeviceConfig {
                id: "uuid:a".into(),
                host: "10.0.0.7".into(),
                ..DeviceConfig::default()
            };
            entry.control.token = "saved".into();
            registry.devices.push(entry);
        }
        let manager = TvManager::new(storage).with_backend(Arc::new(FakeBackend::default()));

        let tvs = manager.load().unwrap();

        assert_eq!(tvs.len(), 1);
        assert_eq!(tvs[0].token(), "saved");
    }

    #[tokio::test]
    async fn test_new_token_is_written_to_registry() {
        // Arrange
        let storage = Arc::new(MemoryStorage::default());
        storage.registry.lock().unwrap().devices.push(DeviceConfig {
            id: "uuid:a".into(),
            host: "10.0.0.7".into(),
            ..DeviceConfig::default()
        });
        let backend = FakeBackend {
            issued_token: "issued".into(),
            ..FakeBackend::default()
        };
        let manager = TvManager::new(Arc::clone(&storage) as Arc<dyn ConfigStorage>)
            .with_backend(Arc::new(backend));
        let tv = manager.load_by_id("uuid:a").unwrap();

        // Act
        tv.click_key(tizen_core::Key::Home).await.unwrap();

        // Assert
        let registry = storage.registry.lock().unwrap();
        assert_eq!(registry.devices[0].control.token, "issued");
    }

    #[test]
    fn test_session_config_follows_registry_entry() {
        let mut config = DeviceConfig {
            host: "10.0.0.7".into(),
            ..DeviceConfig::default()
        };
        config.control.secure = false;
        config.control.port = PLAIN_PORT;
        config.control.read_timeout_ms = 2_000;

        let session = session_config(&config);

        assert!(!session.is_secure());
        assert_eq!(session.port(), PLAIN_PORT);
        assert_eq!(session.read_timeout(), Duration::from_secs(2));
        assert_eq!(session.host(), "10.0.0.7");
    }
}
