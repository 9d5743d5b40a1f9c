//! Conversation sessions: the entity, its durable-store port, and the
//! manager that owns the live cache.
//!
//! - `entity` -- `Session`, one conversation's ordered history
//! - `repository` -- `SessionStore` trait implemented by the infra layer
//! - `manager` -- `SessionManager` with single-instance-per-key caching

pub mod entity;
pub mod manager;
pub mod repository;

pub use entity::Session;
pub use manager::{SessionManager, SharedSession};
pub use repository::SessionStore;
