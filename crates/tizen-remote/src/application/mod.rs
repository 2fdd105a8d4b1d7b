//! Application layer: the use cases built on top of the infrastructure.
//!
//! # What lives here? (for beginners)
//!
//! The infrastructure layer knows how to talk to a TV (sockets, HTTP,
//! WebSocket frames, UDP broadcasts).  This layer decides *what* to say and
//! *when*:
//!
//! - **Orchestrate** several collaborators to fulfil one user goal, e.g.
//!   "turn the TV on" means wake packets, readiness polling, and a session
//!   handshake racing a single deadline.
//! - **Depend on the traits** the infrastructure exposes
//!   (`ControlChannel`, `DeviceApi`, `AvailabilityProbe`, `WakeSignal`,
//!   `ConfigStorage`), so tests can swap in doubles.
//! - **Open no sockets and touch no files** directly.
//!
//! # Sub-modules
//!
//! - **`power`**   – Power-on and power-off state machines.
//! - **`tv`**      – The per-device facade: keys, apps, power, token handling.
//! - **`manager`** – Discovery and the persistent device registry.
//! - **`error`**   – [`TvError`], returned by every use case.

pub mod error;
pub mod manager;
pub mod power;
pub mod tv;

pub use error::TvError;
pub use manager::{DeviceBackend, NetworkBackend, TvManager};
pub use power::{PowerController, PowerOffStage, PowerOnStage, PowerSettings};
pub use tv::{AuthorizeHandler, Tv};
