//! Shared domain types for PocketBot.
//!
//! Session records, bus events, provider credentials and the global config,
//! plus their error types.
//!
//! Zero infrastructure dependencies -- only serde, serde_json, uuid, chrono,
//! thiserror.

pub mod bus;
pub mod config;
pub mod error;
pub mod provider;
pub mod session;
