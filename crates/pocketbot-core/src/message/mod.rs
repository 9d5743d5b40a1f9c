//! In-process message routing between channel adapters and the dispatch loop.
//!
//! - `bus` -- `MessageBus` with per-subscriber bounded queues and topic filters

pub mod bus;

pub use bus::{MessageBus, Subscription, Topic};
