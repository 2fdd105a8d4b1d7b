//! Storage infrastructure: device registry persistence.
//!
//! The `config` sub-module reads and writes the TOML registry of known TVs,
//! including the session token each TV issued after the user approved this
//! client.  Keeping file access here means the application layer only sees
//! the [`config::ConfigStorage`] trait.

pub mod config;
