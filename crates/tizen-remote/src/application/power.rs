//! Power transitions: waking a TV up and putting it to sleep.
//!
//! Neither transition has a completion event.  A TV in standby only answers
//! Wake-on-LAN, and a TV that has accepted `KEY_POWER` simply stops
//! answering some seconds later.  Both operations are therefore written as
//! "race a poll against a deadline":
//!
//! ```text
//! power-on:   Seeking ──ready──▶ Found ──▶ Authorizing ──session──▶ Ready
//!                │                              │
//!                └──────── deadline ────────────┴──▶ DeviceNotFound
//!
//! power-off:  Requesting ──key sent──▶ Confirming ──unreachable──▶ Off
//!                                          │
//!                                          └── deadline ──▶ PowerOffTimeout
//! ```
//!
//! While seeking, two background tasks run side by side: one polls readiness
//! every 250 ms, the other re-sends the wake packet every 3 s (the packet is
//! unreliable UDP, so errors are ignored).  Both watch a shared
//! [`CancellationToken`] and stop at their next step once the TV is found or
//! the deadline passes.  They are never aborted mid-step.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tizen_core::Key;
use tokio::sync::oneshot;
use tokio::time::{sleep, timeout_at, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::application::error::TvError;
use crate::infrastructure::probe::AvailabilityProbe;
use crate::infrastructure::rest::DeviceApi;
use crate::infrastructure::wake::WakeSignal;

pub const DEFAULT_POWER_ON_TIMEOUT: Duration = Duration::from_secs(15);
pub const DEFAULT_POWER_OFF_TIMEOUT: Duration = Duration::from_secs(60);
pub const DEFAULT_READINESS_POLL: Duration = Duration::from_millis(250);
pub const DEFAULT_WAKE_INTERVAL: Duration = Duration::from_secs(3);
pub const DEFAULT_POWER_OFF_POLL: Duration = Duration::from_secs(1);

/// Progress of a power-on attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PowerOnStage {
    Seeking,
    Found,
    Authorizing,
    Ready,
}

/// Progress of a power-off attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PowerOffStage {
    Requesting,
    Confirming,
    Off,
}

/// Timing knobs for power transitions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PowerSettings {
    pub power_on_timeout: Duration,
    pub power_off_timeout: Duration,
    pub readiness_poll: Duration,
    pub wake_interval: Duration,
    pub power_off_poll: Duration,
    /// Key that puts the TV to sleep.
    pub power_key: Key,
}

impl Default for PowerSettings {
    fn default() -> Self {
        Self {
            power_on_timeout: DEFAULT_POWER_ON_TIMEOUT,
            power_off_timeout: DEFAULT_POWER_OFF_TIMEOUT,
            readiness_poll: DEFAULT_READINESS_POLL,
            wake_interval: DEFAULT_WAKE_INTERVAL,
            power_off_poll: DEFAULT_POWER_OFF_POLL,
            power_key: Key::Power,
        }
    }
}

/// Drives power transitions for one TV.
#[derive(Clone)]
pub struct PowerController {
    probe: Arc<dyn AvailabilityProbe>,
    api: Arc<dyn DeviceApi>,
    wake: Arc<dyn WakeSignal>,
    settings: PowerSettings,
}

impl PowerController {
    pub fn new(
        probe: Arc<dyn AvailabilityProbe>,
        api: Arc<dyn DeviceApi>,
        wake: Arc<dyn WakeSignal>,
        settings: PowerSettings,
    ) -> Self {
        Self {
            probe,
            api,
            wake,
            settings,
        }
    }

    pub fn settings(&self) -> &PowerSettings {
        &self.settings
    }

    pub fn probe(&self) -> Arc<dyn AvailabilityProbe> {
        Arc::clone(&self.probe)
    }

    pub fn wake(&self) -> Arc<dyn WakeSignal> {
        Arc::clone(&self.wake)
    }

    /// Reachable on every service port and answering metadata queries.
    pub async fn is_ready(&self) -> bool {
        is_ready(self.probe.as_ref(), self.api.as_ref()).await
    }

    /// Reachable on every service port.
    pub async fn is_available(&self) -> bool {
        self.probe.is_available().await
    }

    /// Wakes the TV and runs `authorize` once it is ready.
    ///
    /// `authorize` establishes the control session.  The whole operation,
    /// authorization included, must finish within `timeout`.  A TV that is
    /// already ready is never sent a wake packet.
    ///
    /// # Errors
    ///
    /// [`TvError::DeviceNotFound`] when the deadline passes first, otherwise
    /// whatever `authorize` returns.
    pub async fn power_on<F, Fut>(&self, timeout: Duration, authorize: F) -> Result<(), TvError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<(), TvError>>,
    {
        let deadline = Instant::now() + timeout;
        let not_found = || TvError::DeviceNotFound(timeout);

        debug!("power-on: {:?}", PowerOnStage::Seeking);
        let ready_now = timeout_at(deadline, self.is_ready())
            .await
            .map_err(|_| not_found())?;
        if !ready_now {
            self.seek(deadline).await.map_err(|_| not_found())?;
        }
        debug!("power-on: {:?}", PowerOnStage::Found);

        debug!("power-on: {:?}", PowerOnStage::Authorizing);
        timeout_at(deadline, authorize())
            .await
            .map_err(|_| not_found())??;

        info!("power-on: {:?}", PowerOnStage::Ready);
        Ok(())
    }

    /// Runs `request` (which sends the power key) and waits until the TV
    /// stops answering.
    ///
    /// An already unreachable TV succeeds immediately without `request`
    /// being called.
    ///
    /// # Errors
    ///
    /// [`TvError::PowerOffTimeout`] if the TV is still reachable at the
    /// deadline, otherwise whatever `request` returns.
    pub async fn power_off<F, Fut>(&self, timeout: Duration, request: F) -> Result<(), TvError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<(), TvError>>,
    {
        let deadline = Instant::now() + timeout;
        let timed_out = || TvError::PowerOffTimeout(timeout);

        let available = timeout_at(deadline, self.probe.is_available())
            .await
            .map_err(|_| timed_out())?;
        if !available {
            info!("power-off: TV already unreachable");
            return Ok(());
        }

        debug!("power-off: {:?}", PowerOffStage::Requesting);
        timeout_at(deadline, request()).await.map_err(|_| timed_out())??;

        debug!("power-off: {:?}", PowerOffStage::Confirming);
        let poll = self.settings.power_off_poll;
        let confirm = async {
            while self.probe.is_available().await {
                sleep(poll).await;
            }
        };
        timeout_at(deadline, confirm).await.map_err(|_| {
            warn!("power-off: TV still reachable after {:?}", timeout);
            timed_out()
        })?;

        info!("power-off: {:?}", PowerOffStage::Off);
        Ok(())
    }

    /// Polls readiness and sends wake packets until the TV answers or
    /// `deadline` passes.
    async fn seek(&self, deadline: Instant) -> Result<(), tokio::time::error::Elapsed> {
        let cancel = CancellationToken::new();
        // Stops both tasks when this function returns, however it returns.
        let _stop = cancel.clone().drop_guard();
        let (ready_tx, ready_rx) = oneshot::channel::<()>();

        let probe = Arc::clone(&self.probe);
        let api = Arc::clone(&self.api);
        let poll_cancel = cancel.clone();
        let poll_spacing = self.settings.readiness_poll;
        tokio::spawn(async move {
            loop {
                let ready = tokio::select! {
                    biased;
                    _ = poll_cancel.cancelled() => return,
                    ready = is_ready(probe.as_ref(), api.as_ref()) => ready,
                };
                if ready {
                    let _ = ready_tx.send(());
                    return;
                }
                tokio::select! {
                    biased;
                    _ = poll_cancel.cancelled() => return,
                    _ = sleep(poll_spacing) => {}
                }
            }
        });

        let wake = Arc::clone(&self.wake);
        let wake_cancel = cancel.clone();
        let wake_spacing = self.settings.wake_interval;
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    biased;
                    _ = wake_cancel.cancelled() => return,
                    result = wake.wake() => {
                        if let Err(e) = result {
                            debug!("power-on: wake signal failed (ignored): {e}");
                        }
                    }
                }
                tokio::select! {
                    biased;
                    _ = wake_cancel.cancelled() => return,
                    _ = sleep(wake_spacing) => {}
                }
            }
        });

        match timeout_at(deadline, ready_rx).await {
            Ok(Ok(())) => Ok(()),
            // The poller only drops its sender when cancelled; treat it as a timeout.
            Ok(Err(_)) => timeout_at(deadline, std::future::pending::<()>()).await,
            Err(elapsed) => Err(elapsed),
        }
    }
}

async fn is_ready(probe: &dyn AvailabilityProbe, api: &dyn DeviceApi) -> bool {
    probe.is_available().await && api.device_info().await.is_ok()
}

// ── Tests ─────────────────────────────────────────────────────────────────────
