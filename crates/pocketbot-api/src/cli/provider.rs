//! Provider CLI commands: list, resolve.
//!
//! Reads credentials from `config.json` and shows which provider a model
//! identifier would be routed to, without making any upstream call.

use anyhow::Result;
use clap::Subcommand;
use comfy_table::{Cell, Color, ContentArrangement, Table, presets};
use console::style;

use pocketbot_core::llm::{NO_PROVIDER, resolve};
use pocketbot_types::provider::PROVIDERS;

use crate::state::AppState;

/// Provider subcommands.
#[derive(Subcommand)]
pub enum ProviderCommand {
    /// List supported providers in resolution order with their credential state.
    #[command(alias = "ls")]
    List,

    /// Show which provider, API base, and key serve a model.
    Resolve {
        /// Model identifier, e.g. "deepseek/deepseek-chat". Defaults to the
        /// configured agent model.
        model: Option<String>,
    },
}

/// Handle a provider subcommand.
pub fn handle_provider_command(cmd: ProviderCommand, state: &AppState, json: bool) -> Result<()> {
    match cmd {
        ProviderCommand::List => provider_list(state, json),
        ProviderCommand::Resolve { model } => provider_resolve(state, model.as_deref(), json),
    }
}

fn provider_list(state: &AppState, json: bool) -> Result<()> {
    let providers = &state.config.providers;

    if json {
        let entries: Vec<_> = PROVIDERS
            .iter()
            .map(|spec| {
                let config = providers.get(spec.name);
                serde_json::json!({
                    "name": spec.name,
                    "display_name": spec.display_name,
                    "configured": config.is_some_and(|c| c.has_key()),
                    "api_base": config
                        .and_then(|c| c.api_base.as_deref())
                        .or(spec.default_api_base),
                    "is_gateway": spec.is_gateway,
                    "is_local": spec.is_local,
                })
            })
            .collect();
        println!("{}", serde_json::to_string_pretty(&entries)?);
        return Ok(());
    }

    let mut table = Table::new();
    table.load_preset(presets::UTF8_FULL_CONDENSED);
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(vec![
        Cell::new("#").fg(Color::White),
        Cell::new("Provider").fg(Color::White),
        Cell::new("Key").fg(Color::White),
        Cell::new("API Base").fg(Color::White),
        Cell::new("Keywords").fg(Color::White),
    ]);

    let mut configured = 0;
    for (i, spec) in PROVIDERS.iter().enumerate() {
        let config = providers.get(spec.name);
        let key_cell = match config.filter(|c| c.has_key()) {
            Some(c) => {
                configured += 1;
                Cell::new(mask_secret(&c.api_key)).fg(Color::Green)
            }
            None => Cell::new("-").fg(Color::DarkGrey),
        };
        let api_base = config
            .and_then(|c| c.api_base.as_deref())
            .or(spec.default_api_base)
            .unwrap_or("(default)");

        table.add_row(vec![
            Cell::new(i + 1).fg(Color::DarkGrey),
            Cell::new(spec.display_name).fg(Color::Cyan),
            key_cell,
            Cell::new(api_base).fg(Color::DarkGrey),
            Cell::new(spec.keywords.join(", ")).fg(Color::DarkGrey),
        ]);
    }

    println!();
    println!("{table}");
    println!();
    println!(
        "  {} of {} providers configured",
        style(configured).bold(),
        PROVIDERS.len()
    );
    println!();

    Ok(())
}

fn provider_resolve(state: &AppState, model: Option<&str>, json: bool) -> Result<()> {
    let model = model.unwrap_or(&state.config.agents.defaults.model);
    let resolved = resolve(&state.config.providers, Some(model));

    if json {
        let output = match resolved {
            Some(found) => serde_json::json!({
                "model": model,
                "provider": found.name(),
                "api_base": found.api_base(),
                "api_key": mask_secret(found.api_key()),
            }),
            None => serde_json::json!({
                "model": model,
                "provider": serde_json::Value::Null,
            }),
        };
        println!("{}", serde_json::to_string_pretty(&output)?);
        return Ok(());
    }

    println!();
    println!("  Model     {}", style(model).cyan().bold());
    match resolved {
        Some(found) => {
            println!("  Provider  {}", style(found.spec.display_name).green().bold());
            println!("  API base  {}", found.api_base().unwrap_or("(provider default)"));
            println!("  API key   {}", mask_secret(found.api_key()));
        }
        None => {
            println!("  Provider  {}", style(NO_PROVIDER).red().bold());
            println!(
                "  {} No provider has an API key. Add one under {} in {}",
                style("i").blue().bold(),
                style("providers").yellow(),
                style(state.config_path.display()).yellow()
            );
        }
    }
    println!();

    Ok(())
}

/// Mask a secret for display, keeping only the last four characters.
pub fn mask_secret(value: &str) -> String {
    let chars: Vec<char> = value.chars().collect();
    if chars.len() <= 4 {
        "****".to_string()
    } else {
        let tail: String = chars[chars.len() - 4..].iter().collect();
        format!("****{tail}")
    }
}
