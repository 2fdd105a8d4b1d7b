//! `Tv`: the device facade.
//!
//! One `Tv` wraps everything needed to drive a single TV:
//!
//! - the control channel for keys and app launches,
//! - the HTTP API for metadata and app management,
//! - the power controller for wake-up and standby.
//!
//! Commands that need the control channel connect it on demand.  When the
//! TV hands out a new token during that handshake, the registered
//! authorization handler is called once with it so the caller can persist
//! it.  The next connection presents the stored token and the TV skips its
//! on-screen "Allow this device?" prompt.
//!
//! # Precondition
//!
//! The control protocol carries no request ids.  A `Tv` assumes the caller
//! issues commands one after another; two concurrent [`Tv::apps`] or
//! [`Tv::launch_app`] calls may receive each other's replies.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tizen_core::protocol::{
    check_launch_ack, decode_installed_apps, encode_installed_apps_query, encode_key_command,
    encode_launch_app,
};
use tizen_core::{App, DeviceInfo, Key, KeyAction, KeySequence, LaunchActionType};
use tokio::time::sleep;
use tracing::{debug, info, warn};

use crate::application::error::TvError;
use crate::application::power::{PowerController, PowerSettings};
use crate::infrastructure::probe::AvailabilityProbe;
use crate::infrastructure::rest::DeviceApi;
use crate::infrastructure::session::ControlChannel;
use crate::infrastructure::storage::config::DeviceConfig;
use crate::infrastructure::wake::WakeSignal;

/// App id of the built-in web browser.
pub const BROWSER_APP_ID: &str = "org.tizen.browser";

/// Called with the new token whenever the TV issues one.
pub type AuthorizeHandler = Arc<dyn Fn(&str) -> anyhow::Result<()> + Send + Sync>;

pub struct Tv {
    config: DeviceConfig,
    channel: Arc<dyn ControlChannel>,
    api: Arc<dyn DeviceApi>,
    power: PowerController,
    token: Mutex<String>,
    on_authorize: Mutex<Option<AuthorizeHandler>>,
    /// Serialises on-demand connects.
    connect_lock: tokio::sync::Mutex<()>,
}

impl std::fmt::Debug for Tv {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Tv")
            .field("id", &self.config.id)
            .field("host", &self.config.host)
            .finish_non_exhaustive()
    }
}

impl Tv {
    pub fn new(
        config: DeviceConfig,
        channel: Arc<dyn ControlChannel>,
        api: Arc<dyn DeviceApi>,
        probe: Arc<dyn AvailabilityProbe>,
        wake: Arc<dyn WakeSignal>,
    ) -> Self {
        let token = config.control.token.clone();
        let power = PowerController::new(probe, Arc::clone(&api), wake, PowerSettings::default());
        Self {
            config,
            channel,
            api,
            power,
            token: Mutex::new(token),
            on_authorize: Mutex::new(None),
            connect_lock: tokio::sync::Mutex::new(()),
        }
    }

    /// Replaces the power timing defaults.
    pub fn with_power_settings(mut self, settings: PowerSettings) -> Self {
        self.power = PowerController::new(
            self.power.probe(),
            Arc::clone(&self.api),
            self.power.wake(),
            settings,
        );
        self
    }

    pub fn id(&self) -> &str {
        &self.config.id
    }

    pub fn config(&self) -> &DeviceConfig {
        &self.config
    }

    /// Current session token; empty until the TV has issued one.
    pub fn token(&self) -> String {
        lock(&self.token).clone()
    }

    pub fn power_settings(&self) -> &PowerSettings {
        self.power.settings()
    }

    /// Registers the handler called when the TV issues a new token.
    pub fn on_authorize<F>(&self, handler: F)
    where
        F: Fn(&str) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        *lock(&self.on_authorize) = Some(Arc::new(handler));
    }

    // ── Metadata and apps (HTTP) ────────────────────────────────────────────

    pub async fn info(&self) -> Result<DeviceInfo, TvError> {
        Ok(self.api.device_info().await?)
    }

    /// Lists installed apps with their running state.
    ///
    /// Apps whose status query fails are left out.
    pub async fn apps(&self) -> Result<Vec<App>, TvError> {
        self.ensure_connected().await?;
        let reply = self
            .channel
            .send_and_await(encode_installed_apps_query()?)
            .await?;
        let installed = decode_installed_apps(&reply)?;

        let mut apps = Vec::with_capacity(installed.len());
        for entry in &installed {
            match self.api.app_status(&entry.app_id).await {
                Ok(status) => apps.push(App::merge(entry, status)),
                Err(e) => debug!("[{}] skipping app {}: {e}", self.config.id, entry.app_id),
            }
        }
        Ok(apps)
    }

    pub async fn app(&self, app_id: &str) -> Result<App, TvError> {
        Ok(App::from(self.api.app_status(app_id).await?))
    }

    pub async fn open_app(&self, app_id: &str) -> Result<(), TvError> {
        info!("[{}] opening app {}", self.config.id, app_id);
        Ok(self.api.open_app(app_id).await?)
    }

    pub async fn close_app(&self, app_id: &str) -> Result<(), TvError> {
        info!("[{}] closing app {}", self.config.id, app_id);
        Ok(self.api.close_app(app_id).await?)
    }

    pub async fn install_app(&self, app_id: &str) -> Result<(), TvError> {
        info!("[{}] installing app {}", self.config.id, app_id);
        Ok(self.api.install_app(app_id).await?)
    }

    // ── Control channel ─────────────────────────────────────────────────────

    /// Opens `url` in the built-in browser.
    pub async fn open_browser(&self, url: &str) -> Result<(), TvError> {
        self.launch_app(BROWSER_APP_ID, LaunchActionType::NativeLaunch, url)
            .await
    }

    /// Launches an app over the control channel and checks the TV's ack.
    pub async fn launch_app(
        &self,
        app_id: &str,
        action: LaunchActionType,
        meta_tag: &str,
    ) -> Result<(), TvError> {
        self.ensure_connected().await?;
        let frame = encode_launch_app(app_id, action, meta_tag)?;
        let reply = self.channel.send_and_await(frame).await?;
        check_launch_ack(&reply)?;
        info!("[{}] launched {} ({:?})", self.config.id, app_id, action);
        Ok(())
    }

    pub async fn send_key(&self, key: Key, action: KeyAction) -> Result<(), TvError> {
        self.ensure_connected().await?;
        let frame = encode_key_command(key, action)?;
        self.channel.send_command(frame).await?;
        debug!("[{}] {} {}", self.config.id, action.verb(), key);
        Ok(())
    }

    pub async fn click_key(&self, key: Key) -> Result<(), TvError> {
        self.send_key(key, KeyAction::Click).await
    }

    pub async fn press_key(&self, key: Key) -> Result<(), TvError> {
        self.send_key(key, KeyAction::Press).await
    }

    pub async fn release_key(&self, key: Key) -> Result<(), TvError> {
        self.send_key(key, KeyAction::Release).await
    }

    /// Plays a sequence, sleeping each command's post-delay after sending it.
    ///
    /// Stops at the first failed send.
    pub async fn send_keys(&self, sequence: &KeySequence) -> Result<(), TvError> {
        for command in sequence.iter() {
            self.send_key(command.key, command.action).await?;
            sleep(command.post_delay).await;
        }
        Ok(())
    }

    // ── Power ───────────────────────────────────────────────────────────────

    /// Ports open and metadata answering.
    pub async fn is_ready(&self) -> bool {
        self.power.is_ready().await
    }

    /// Powers on within the default timeout.
    pub async fn power_on(&self) -> Result<(), TvError> {
        self.power_on_within(self.power.settings().power_on_timeout)
            .await
    }

    /// Wakes the TV and opens the control channel, all within `timeout`.
    pub async fn power_on_within(&self, timeout: Duration) -> Result<(), TvError> {
        info!("[{}] powering on (timeout {:?})", self.config.id, timeout);
        self.power
            .power_on(timeout, || self.ensure_connected())
            .await
    }

    /// Powers off within the default timeout.
    pub async fn power_off(&self) -> Result<(), TvError> {
        self.power_off_within(self.power.settings().power_off_timeout)
            .await
    }

    /// Sends the power key and waits until the TV stops answering.
    pub async fn power_off_within(&self, timeout: Duration) -> Result<(), TvError> {
        info!("[{}] powering off (timeout {:?})", self.config.id, timeout);
        let power_key = self.power.settings().power_key;
        self.power
            .power_off(timeout, || self.click_key(power_key))
            .await?;
        if let Err(e) = self.channel.close().await {
            warn!("[{}] closing control channel after power-off: {e}", self.config.id);
        }
        Ok(())
    }

    /// Closes the control channel.  Safe to call when not connected.
    pub async fn close(&self) -> Result<(), TvError> {
        Ok(self.channel.close().await?)
    }

    // ── Internals ───────────────────────────────────────────────────────────

    /// Connects the control channel unless it is already running.
    async fn ensure_connected(&self) -> Result<(), TvError> {
        let _guard = self.connect_lock.lock().await;
        if self.channel.is_connected() {
            return Ok(());
        }

        let presented = self.token();
        let session = self.channel.connect(&presented).await?;
        if session.token.is_empty() || session.token == presented {
            return Ok(());
        }

        info!("[{}] TV issued a new token", self.config.id);
        *lock(&self.token) = session.token.clone();
        let handler = lock(&self.on_authorize).clone();
        if let Some(handler) = handler {
            handler(&session.token).map_err(|e| TvError::Authorize(format!("{e:#}")))?;
        }
        Ok(())
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

// ── Tests ─────────────────────────────────────────────────────────────────────
