//! Business logic and port definitions for PocketBot.
//!
//! This crate owns session state, the message bus, and provider resolution.
//! It defines the `SessionStore` port that the infrastructure layer
//! implements and depends only on `pocketbot-types` -- never on
//! `pocketbot-infra` or any filesystem code.

pub mod llm;
pub mod message;
pub mod session;
