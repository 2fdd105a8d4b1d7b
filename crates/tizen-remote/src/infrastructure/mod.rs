//! Infrastructure layer: everything that touches the network or the disk.
//!
//! - `session`   – the duplex WebSocket control channel.
//! - `tls`       – relaxed certificate verification for the secure port.
//! - `probe`     – TCP reachability checks.
//! - `wake`      – Wake-on-LAN magic packets.
//! - `rest`      – the HTTP metadata API.
//! - `discovery` – SSDP search for TVs on the LAN.
//! - `storage`   – the TOML device registry.
//!
//! Each module exposes a trait next to its implementation (`ControlChannel`,
//! `AvailabilityProbe`, `WakeSignal`, `DeviceApi`, `HostDiscoverer`,
//! `ConfigStorage`).  The application layer depends only on those traits, so
//! its use cases run against test doubles without any sockets.
//!
//! **Dependency rule**: this layer may depend on `tizen_core`, but MUST NOT
//! import from `application`.

pub mod discovery;
pub mod probe;
pub mod rest;
pub mod session;
pub mod storage;
pub mod tls;
pub mod wake;
