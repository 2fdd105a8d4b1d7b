//! SSDP discovery of TVs on the local network.
//!
//! # How SSDP works (for beginners)
//!
//! SSDP (Simple Service Discovery Protocol) is the discovery half of UPnP.
//! A client multicasts an HTTP-formatted `M-SEARCH` request over UDP to
//! `239.255.255.250:1900`.  Every device that matches the search target
//! replies with a unicast HTTP-style response whose `LOCATION` header points
//! at the device description, for example:
//!
//! ```text
//! HTTP/1.1 200 OK
//! ST: upnp:rootdevice
//! LOCATION: http://192.168.1.20:7676/smp_15_
//! ```
//!
//! We only need the host part of that URL.  Replies are collected until the
//! search duration elapses; one TV usually answers several times, so hosts
//! are de-duplicated in arrival order.

use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4};
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use tokio::net::UdpSocket;
use tokio::time::Instant;
use tracing::{debug, info, trace};

pub const SSDP_MULTICAST: SocketAddrV4 = SocketAddrV4::new(Ipv4Addr::new(239, 255, 255, 250), 1900);
pub const SEARCH_ROOT_DEVICE: &str = "upnp:rootdevice";
pub const DEFAULT_SEARCH_DURATION: Duration = Duration::from_secs(5);

/// Error type for discovery operations.
#[derive(Debug, Error)]
pub enum DiscoveryError {
    /// The UDP socket could not be bound.
    #[error("failed to bind discovery socket: {0}")]
    Bind(#[source] std::io::Error),

    /// The search request could not be sent.
    #[error("failed to send M-SEARCH to {addr}: {source}")]
    Send {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },

    /// An I/O error occurred while receiving replies.
    #[error("recv error: {0}")]
    Recv(#[source] std::io::Error),
}

/// Finds candidate device hosts.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait HostDiscoverer: Send + Sync {
    async fn discover(&self) -> Result<Vec<String>, DiscoveryError>;
}

/// SSDP `M-SEARCH` discoverer.
#[derive(Debug, Clone)]
pub struct SsdpDiscoverer {
    duration: Duration,
    search_target: String,
    destination: SocketAddr,
}

impl Default for SsdpDiscoverer {
    fn default() -> Self {
        Self::new(DEFAULT_SEARCH_DURATION)
    }
}

impl SsdpDiscoverer {
    pub fn new(duration: Duration) -> Self {
        Self {
            duration,
            search_target: SEARCH_ROOT_DEVICE.to_string(),
            destination: SocketAddr::V4(SSDP_MULTICAST),
        }
    }

    pub fn with_search_target(mut self, search_target: impl Into<String>) -> Self {
        self.search_target = search_target.into();
        self
    }

    /// Sends the search somewhere other than the SSDP multicast group.
    pub fn with_destination(mut self, destination: SocketAddr) -> Self {
        self.destination = destination;
        self
    }

    pub fn duration(&self) -> Duration {
        self.duration
    }

    fn request(&self) -> String {
        // MX is the maximum reply delay in whole seconds; devices spread replies over it.
        let mx = self.duration.as_secs().max(1);
        format!(
            "M-SEARCH * HTTP/1.1\r\nHOST: {SSDP_MULTICAST}\r\nMAN: \"ssdp:discover\"\r\nMX: {mx}\r\nST: {}\r\n\r\n",
            self.search_target
        )
    }
}

#[async_trait]
impl HostDiscoverer for SsdpDiscoverer {
    async fn discover(&self) -> Result<Vec<String>, DiscoveryError> {
        let socket = UdpSocket::bind((Ipv4Addr::UNSPECIFIED, 0))
            .await
            .map_err(DiscoveryError::Bind)?;
        socket
            .send_to(self.request().as_bytes(), self.destination)
            .await
            .map_err(|source| DiscoveryError::Send {
                addr: self.destination,
                source,
            })?;
        debug!("M-SEARCH {} sent to {}", self.search_target, self.destination);

        let deadline = Instant::now() + self.duration;
        let mut hosts: Vec<String> = Vec::new();
        let mut buf = vec![0u8; 2048];

        loop {
            let received = match tokio::time::timeout_at(deadline, socket.recv_from(&mut buf)).await {
                Err(_) => break,
                Ok(result) => result.map_err(DiscoveryError::Recv)?,
            };
            let (len, from) = received;
            let reply = String::from_utf8_lossy(&buf[..len]);
            trace!("SSDP reply from {}: {}", from, reply);

            let Some(host) = location_header(&reply).and_then(host_of) else {
                continue;
            };
            if !hosts.contains(&host) {
                hosts.push(host);
            }
        }

        info!("SSDP discovery found {} host(s)", hosts.len());
        Ok(hosts)
    }
}

/// Extracts the `LOCATION` header value (case-insensitive name).
fn location_header(reply: &str) -> Option<&str> {
    reply.lines().find_map(|line| {
        let (name, value) = line.split_once(':')?;
        name.trim()
            .eq_ignore_ascii_case("location")
            .then(|| value.trim())
    })
}

fn host_of(location: &str) -> Option<String> {
    let url = reqwest::Url::parse(location).ok()?;
    url.host_str().map(|h| h.trim_matches(|c| c == '[' || c == ']').to_string())
}

// ── Tests ─────────────────────────────────────────────────────────────────────
