//! Configuration CLI commands: path, show, init.

use anyhow::{Context, Result};
use clap::Subcommand;
use console::style;

use pocketbot_infra::config::save_config;
use pocketbot_types::config::Config;

use super::provider::mask_secret;
use crate::state::AppState;

/// Configuration subcommands.
#[derive(Subcommand)]
pub enum ConfigCommand {
    /// Print the config file location.
    Path,

    /// Print the effective configuration (defaults applied, keys masked).
    Show {
        /// Print API keys and tokens in full.
        #[arg(long)]
        reveal: bool,
    },

    /// Write a config file with default values.
    Init {
        /// Overwrite an existing file.
        #[arg(long)]
        force: bool,
    },
}

/// Handle a config subcommand.
pub async fn handle_config_command(cmd: ConfigCommand, state: &AppState, json: bool) -> Result<()> {
    match cmd {
        ConfigCommand::Path => {
            if json {
                println!(
                    "{}",
                    serde_json::json!({
                        "config": state.config_path.display().to_string(),
                        "data_dir": state.data_dir.display().to_string(),
                        "workspace": state.workspace.display().to_string(),
                    })
                );
            } else {
                println!("{}", state.config_path.display());
            }
            Ok(())
        }
        ConfigCommand::Show { reveal } => {
            let mut config = (*state.config).clone();
            if !reveal {
                redact(&mut config);
            }
            // Same layout as the file on disk, regardless of --json
            println!("{}", serde_json::to_string_pretty(&config)?);
            Ok(())
        }
        ConfigCommand::Init { force } => init_config(state, force, json).await,
    }
}

async fn init_config(state: &AppState, force: bool, json: bool) -> Result<()> {
    let path = &state.config_path;
    let exists = tokio::fs::try_exists(path).await.unwrap_or(false);

    if exists && !force {
        if json {
            println!(
                "{}",
                serde_json::json!({"created": false, "path": path.display().to_string()})
            );
        } else {
            println!(
                "  {} Config already exists at {} (use {} to overwrite)",
                style("i").blue().bold(),
                style(path.display()).yellow(),
                style("--force").cyan()
            );
        }
        return Ok(());
    }

    save_config(&Config::default(), path)
        .await
        .with_context(|| format!("Failed to write {}", path.display()))?;

    if json {
        println!(
            "{}",
            serde_json::json!({"created": true, "path": path.display().to_string()})
        );
    } else {
        println!(
            "  {} Wrote default config to {}",
            style("✓").green().bold(),
            style(path.display()).yellow()
        );
    }

    Ok(())
}

/// Mask every credential in place.
fn redact(config: &mut Config) {
    for spec in pocketbot_types::provider::PROVIDERS {
        if let Some(provider) = config.providers.get_mut(spec.name) {
            if provider.has_key() {
                provider.api_key = mask_secret(&provider.api_key);
            }
        }
    }
    if !config.web.auth.token.is_empty() {
        config.web.auth.token = mask_secret(&config.web.auth.token);
    }
}
