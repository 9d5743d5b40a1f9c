//! Infrastructure layer for PocketBot.
//!
//! Contains the implementations of the ports defined in `pocketbot-core`:
//! the JSONL session store, plus data directory layout and the
//! `config.json` loader.

pub mod config;
pub mod filesystem;
pub mod session;
