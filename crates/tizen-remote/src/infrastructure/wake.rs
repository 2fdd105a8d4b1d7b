//! Wake-on-LAN sender.
//!
//! # How Wake-on-LAN works (for beginners)
//!
//! A sleeping TV keeps its network card powered and watches for a "magic
//! packet": 6 bytes of `0xFF` followed by the card's 6-byte MAC address
//! repeated 16 times (102 bytes total).  The packet is sent as a UDP
//! broadcast, usually to port 9, because a sleeping device has no IP
//! stack to route to.
//!
//! There is no acknowledgement.  The sender cannot know whether the packet
//! arrived, which is why the power controller resends it periodically and
//! ignores send errors.

use std::net::Ipv4Addr;

use async_trait::async_trait;
use thiserror::Error;
use tokio::net::UdpSocket;
use tracing::debug;

pub const DEFAULT_BROADCAST: Ipv4Addr = Ipv4Addr::BROADCAST;
pub const DEFAULT_WAKE_PORT: u16 = 9;

/// Size of a magic packet in bytes.
pub const MAGIC_PACKET_LEN: usize = 6 + 16 * 6;

/// Error type for wake signal operations.
#[derive(Debug, Error)]
pub enum WakeError {
    /// The configured MAC is not an EUI-48 address.
    #[error("invalid MAC address {0:?}: expected six hex octets separated by ':' or '-'")]
    InvalidMac(String),

    /// The broadcast datagram could not be sent.
    #[error("failed to send wake packet: {0}")]
    Send(#[from] std::io::Error),
}

/// Fire-and-forget "please wake up" signal.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait WakeSignal: Send + Sync {
    async fn wake(&self) -> Result<(), WakeError>;
}

/// Broadcasts magic packets for one MAC address.
#[derive(Debug, Clone)]
pub struct WakeOnLan {
    mac: String,
    broadcast: Ipv4Addr,
    port: u16,
}

impl WakeOnLan {
    pub fn new(mac: impl Into<String>) -> Self {
        Self {
            mac: mac.into(),
            broadcast: DEFAULT_BROADCAST,
            port: DEFAULT_WAKE_PORT,
        }
    }

    pub fn with_broadcast(mut self, broadcast: Ipv4Addr) -> Self {
        self.broadcast = broadcast;
        self
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    pub fn mac(&self) -> &str {
        &self.mac
    }

    pub fn broadcast(&self) -> Ipv4Addr {
        self.broadcast
    }

    pub fn port(&self) -> u16 {
        self.port
    }
}

#[async_trait]
impl WakeSignal for WakeOnLan {
    async fn wake(&self) -> Result<(), WakeError> {
        let mac = parse_mac(&self.mac)?;
        let packet = magic_packet(&mac);

        let socket = UdpSocket::bind((Ipv4Addr::UNSPECIFIED, 0)).await?;
        socket.set_broadcast(true)?;
        socket.send_to(&packet, (self.broadcast, self.port)).await?;

        debug!("wake packet for {} sent to {}:{}", self.mac, self.broadcast, self.port);
        Ok(())
    }
}

/// Parses `aa:bb:cc:dd:ee:ff` or `aa-bb-cc-dd-ee-ff`.
pub fn parse_mac(mac: &str) -> Result<[u8; 6], WakeError> {
    let invalid = || WakeError::InvalidMac(mac.to_string());

    let separator = if mac.contains('-') { '-' } else { ':' };
    let mut octets = [0u8; 6];
    let mut parts = mac.split(separator);

    for octet in octets.iter_mut() {
        let part = parts.next().ok_or_else(invalid)?;
        if part.len() != 2 {
            return Err(invalid());
        }
        *octet = u8::from_str_radix(part, 16).map_err(|_| invalid())?;
    }

    if parts.next().is_some() {
        return Err(invalid());
    }
    Ok(octets)
}

/// Builds the 102-byte magic packet for `mac`.
pub fn magic_packet(mac: &[u8; 6]) -> [u8; MAGIC_PACKET_LEN] {
    let mut packet = [0xFF; MAGIC_PACKET_LEN];
    for chunk in packet[6..].chunks_exact_mut(6) {
        chunk.copy_from_slice(mac);
    }
    packet
}

// ── Tests ─────────────────────────────────────────────────────────────────────
