//! Bounded-time TCP reachability checks.
//!
//! A TV in standby keeps its network interface alive for Wake-on-LAN but
//! stops listening on its service ports.  Opening (and immediately dropping)
//! a TCP connection is therefore the cheapest way to tell "asleep" from
//! "awake": if the port accepts within the dial timeout, the service is up.

use std::time::Duration;

use async_trait::async_trait;
use tokio::net::TcpStream;
use tracing::trace;

/// Answers "is the device reachable right now?".
///
/// The power controller polls this at short intervals; implementations must
/// return within a bounded time and never block indefinitely.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait AvailabilityProbe: Send + Sync {
    async fn is_available(&self) -> bool;
}

/// Probes a single `host:port` with a TCP connect.
#[derive(Debug, Clone)]
pub struct TcpProbe {
    host: String,
    port: u16,
    dial_timeout: Duration,
}

impl TcpProbe {
    pub fn new(host: impl Into<String>, port: u16, dial_timeout: Duration) -> Self {
        Self {
            host: host.into(),
            port,
            dial_timeout,
        }
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    /// Returns `true` if a TCP connection is accepted within the dial timeout.
    pub async fn is_reachable(&self) -> bool {
        let addr = (self.host.as_str(), self.port);
        let reachable = matches!(
            tokio::time::timeout(self.dial_timeout, TcpStream::connect(addr)).await,
            Ok(Ok(_))
        );
        trace!("probe {}:{} reachable={}", self.host, self.port, reachable);
        reachable
    }
}

#[async_trait]
impl AvailabilityProbe for TcpProbe {
    async fn is_available(&self) -> bool {
        self.is_reachable().await
    }
}

/// A device is available only when every one of its service ports answers.
///
/// For a TV this is the REST port together with the control port.
pub struct AllReachable {
    probes: Vec<TcpProbe>,
}

impl AllReachable {
    pub fn new(probes: Vec<TcpProbe>) -> Self {
        Self { probes }
    }
}

#[async_trait]
impl AvailabilityProbe for AllReachable {
    async fn is_available(&self) -> bool {
        for probe in &self.probes {
            if !probe.is_reachable().await {
                return false;
            }
        }
        true
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
