//! Durable session storage.
//!
//! - `filename` -- injective, reversible key to file name escaping
//! - `jsonl_store` -- `JsonlSessionStore`, one JSONL log per session

pub mod filename;
pub mod jsonl_store;

pub use jsonl_store::JsonlSessionStore;
