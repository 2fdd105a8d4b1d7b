//! # tizen-core
//!
//! Shared library for Tizen TV remote control containing the key catalogue,
//! key sequences, the JSON wire protocol of the control channel, and the
//! device metadata types returned by the TV's HTTP API.
//!
//! This crate is used by the `tizen-remote` library and binary.
//! It has zero dependencies on sockets, timers, or async runtimes.
//!
//! # Architecture overview (for beginners)
//!
//! A Tizen TV exposes two network services once it is awake:
//!
//! - An HTTP API on port 8001 that answers metadata questions ("what is your
//!   name?", "is Netflix running?").
//! - A WebSocket control channel (port 8001 plain, 8002 TLS) that accepts
//!   remote-control key presses and app launches as JSON messages.
//!
//! This crate defines the *language* spoken over both services:
//!
//! - **`key`** – Every remote key code the TV understands (`KEY_POWER`,
//!   `KEY_VOLUP`, ...).
//!
//! - **`sequence`** – Ordered key scripts ("press HOME, wait, press RIGHT
//!   three times") that the remote crate plays back over the control channel.
//!
//! - **`protocol`** – The exact JSON shapes of outbound commands and inbound
//!   events, plus classification of inbound frames into responses and
//!   ignorable notifications.
//!
//! - **`device`** – Typed views over the HTTP API's metadata responses.

pub mod device;
pub mod key;
pub mod protocol;
pub mod sequence;

// Re-export the most-used types at the crate root so callers can write
// `tizen_core::Key` instead of `tizen_core::key::Key`.
pub use device::{App, AppStatus, DeviceDescriptor, DeviceInfo};
pub use key::{Key, UnknownKey};
pub use protocol::codec::{classify_frame, Frame, ProtocolError};
pub use protocol::messages::{ConnectEvent, LaunchActionType};
pub use sequence::{KeyAction, KeyCommand, KeySequence};
