//! PocketBot admin CLI entry point.
//!
//! Binary name: `pocketbot`
//!
//! Parses CLI arguments, sets up tracing, loads configuration and wires the
//! session manager and message bus, then dispatches to a command handler.

mod cli;
mod state;

use clap::Parser;
use clap_complete::generate;
use pocketbot_observe::tracing_setup::{TracingOptions, init_tracing, shutdown_tracing};

use cli::{Cli, Commands};
use state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let tracing_options = TracingOptions {
        json: cli.log_json,
        otel: cli.otel,
        ..TracingOptions::from_verbosity(cli.verbose, cli.quiet)
    };
    if let Err(e) = init_tracing(&tracing_options) {
        eprintln!("Warning: failed to initialize tracing: {e}");
    }

    let result = run(cli).await;
    shutdown_tracing();
    result
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    // Shell completions don't need app state
    if let Commands::Completions { shell } = &cli.command {
        let mut cmd = <Cli as clap::CommandFactory>::command();
        generate(*shell, &mut cmd, "pocketbot", &mut std::io::stdout());
        return Ok(());
    }

    let state = AppState::init(cli.config.clone()).await;

    match cli.command {
        Commands::Sessions { action } => {
            cli::session::handle_session_command(action, &state, cli.json).await?;
        }

        Commands::Provider { action } => {
            cli::provider::handle_provider_command(action, &state, cli.json)?;
        }

        Commands::Config { action } => {
            cli::config::handle_config_command(action, &state, cli.json).await?;
        }

        Commands::Send {
            channel,
            chat_id,
            sender,
            content,
        } => {
            cli::send::send_message(&state, &channel, &chat_id, &sender, &content, cli.json).await?;
        }

        Commands::Completions { .. } => unreachable!("handled above"),
    }

    Ok(())
}
