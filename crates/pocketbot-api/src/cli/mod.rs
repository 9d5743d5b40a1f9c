//! CLI command definitions and dispatch for the `pocketbot` binary.
//!
//! Uses clap derive macros for argument parsing. Commands are grouped by
//! noun (e.g., `pocketbot sessions list`, `pocketbot provider resolve`).

pub mod config;
pub mod provider;
pub mod send;
pub mod session;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use clap_complete::Shell;

/// Inspect and maintain a PocketBot installation.
#[derive(Parser)]
#[command(name = "pocketbot", version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Output machine-readable JSON instead of styled text.
    #[arg(long, global = true)]
    pub json: bool,

    /// Suppress all output except errors.
    #[arg(long, global = true)]
    pub quiet: bool,

    /// Detailed output (-v for verbose, -vv for debug/trace).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Emit logs as JSON lines.
    #[arg(long, global = true)]
    pub log_json: bool,

    /// Export tracing spans through OpenTelemetry (stdout exporter).
    #[arg(long, global = true)]
    pub otel: bool,

    /// Config file to use instead of `<data dir>/config.json`.
    #[arg(long, global = true, env = "POCKETBOT_CONFIG")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Browse and maintain conversation sessions.
    #[command(alias = "session")]
    Sessions {
        #[command(subcommand)]
        action: session::SessionCommand,
    },

    /// Inspect provider credentials and resolution.
    Provider {
        #[command(subcommand)]
        action: provider::ProviderCommand,
    },

    /// Inspect or create the configuration file.
    Config {
        #[command(subcommand)]
        action: config::ConfigCommand,
    },

    /// Record a user turn through the message bus, as a channel adapter would.
    Send {
        /// Channel name (e.g., "cli", "telegram").
        #[arg(long, default_value = "cli")]
        channel: String,

        /// Chat identifier within the channel.
        #[arg(long, default_value = "direct")]
        chat_id: String,

        /// Sender identifier.
        #[arg(long, default_value = "user")]
        sender: String,

        /// Message text.
        content: String,
    },

    /// Generate shell completions.
    Completions {
        /// Shell to generate completions for.
        #[arg(value_enum)]
        shell: Shell,
    },
}
