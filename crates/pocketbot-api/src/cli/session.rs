//! Session management CLI commands: list, show, clear, delete.
//!
//! Provides session browsing with rich tables, history inspection, and
//! destructive operations behind a confirmation prompt.

use anyhow::{Context, Result, bail};
use clap::Subcommand;
use comfy_table::{Cell, Color, ContentArrangement, Table, presets};
use console::style;
use dialoguer::Confirm;

use pocketbot_core::session::{Session, SessionStore};
use pocketbot_types::session::MessageRole;

use crate::state::AppState;

/// Session subcommands.
#[derive(Subcommand)]
pub enum SessionCommand {
    /// List persisted sessions, most recently updated first.
    #[command(alias = "ls")]
    List,

    /// Show a session's history.
    Show {
        /// Session key (e.g., "telegram:12345").
        key: String,

        /// Only show the last N messages.
        #[arg(long, value_name = "N")]
        last: Option<usize>,
    },

    /// Erase a session's messages, keeping the session itself.
    Clear {
        key: String,

        /// Skip the confirmation prompt.
        #[arg(long)]
        force: bool,
    },

    /// Delete a session log.
    #[command(alias = "rm")]
    Delete {
        key: String,

        /// Skip the confirmation prompt.
        #[arg(long)]
        force: bool,
    },
}

/// Handle a session subcommand.
pub async fn handle_session_command(cmd: SessionCommand, state: &AppState, json: bool) -> Result<()> {
    match cmd {
        SessionCommand::List => list_sessions(state, json).await,
        SessionCommand::Show { key, last } => show_session(state, &key, last, json).await,
        SessionCommand::Clear { key, force } => clear_session(state, &key, force, json).await,
        SessionCommand::Delete { key, force } => delete_session(state, &key, force, json).await,
    }
}

/// List all persisted sessions.
///
/// # Examples
///
/// ```bash
/// pocketbot sessions list
/// pocketbot sessions list --json
/// ```
pub async fn list_sessions(state: &AppState, json: bool) -> Result<()> {
    let sessions = state.sessions.list_sessions().await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&sessions)?);
        return Ok(());
    }

    if sessions.is_empty() {
        println!();
        println!(
            "  {} No sessions in {}",
            style("i").blue().bold(),
            style(state.sessions.store().sessions_dir().display()).yellow()
        );
        println!();
        return Ok(());
    }

    let mut table = Table::new();
    table.load_preset(presets::UTF8_FULL_CONDENSED);
    table.set_content_arrangement(ContentArrangement::Dynamic);

    table.set_header(vec![
        Cell::new("Key").fg(Color::White),
        Cell::new("Created").fg(Color::White),
        Cell::new("Updated").fg(Color::White),
    ]);

    for info in &sessions {
        let format_time = |t: Option<chrono::DateTime<chrono::Utc>>| {
            t.map(|t| t.format("%Y-%m-%d %H:%M").to_string())
                .unwrap_or_else(|| "-".to_string())
        };
        let key = if info.key.is_empty() { "(empty key)" } else { info.key.as_str() };
        table.add_row(vec![
            Cell::new(key).fg(Color::Cyan),
            Cell::new(format_time(info.created_at)).fg(Color::DarkGrey),
            Cell::new(format_time(info.updated_at)).fg(Color::White),
        ]);
    }

    println!();
    println!("{table}");
    println!();
    println!(
        "  {} session{}",
        style(sessions.len()).bold(),
        if sessions.len() == 1 { "" } else { "s" }
    );
    println!();

    Ok(())
}

/// Show a session's history.
///
/// # Examples
///
/// ```bash
/// pocketbot sessions show telegram:12345
/// pocketbot sessions show telegram:12345 --last 10 --json
/// ```
pub async fn show_session(state: &AppState, key: &str, last: Option<usize>, json: bool) -> Result<()> {
    let session = load_existing(state, key).await?;
    let history = session.get_history(last);

    if json {
        let export = serde_json::json!({
            "key": session.key(),
            "created_at": session.created_at(),
            "updated_at": session.updated_at(),
            "last_consolidated": session.last_consolidated(),
            "metadata": session.metadata,
            "messages": history,
        });
        println!("{}", serde_json::to_string_pretty(&export)?);
        return Ok(());
    }

    println!();
    println!("  Session '{}'", style(session.key()).cyan().bold());
    println!(
        "  {}",
        style(format!(
            "{} messages, {} consolidated, updated {}",
            session.len(),
            session.last_consolidated(),
            session.updated_at().format("%Y-%m-%d %H:%M UTC")
        ))
        .dim()
    );
    println!();

    if session.is_empty() {
        println!("  {} No messages.", style("i").blue().bold());
        println!();
        return Ok(());
    }

    let offset = session.len() - history.len();
    let mut table = Table::new();
    table.load_preset(presets::UTF8_FULL_CONDENSED);
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(vec![
        Cell::new("#").fg(Color::White),
        Cell::new("Role").fg(Color::White),
        Cell::new("Time").fg(Color::White),
        Cell::new("Content").fg(Color::White),
    ]);

    for (i, message) in session.messages()[offset..].iter().enumerate() {
        let role_cell = match &message.role {
            MessageRole::User => Cell::new("user").fg(Color::Green),
            MessageRole::Assistant => Cell::new("assistant").fg(Color::Cyan),
            MessageRole::Tool => Cell::new("tool").fg(Color::Yellow),
            other => Cell::new(other.as_str()).fg(Color::DarkGrey),
        };

        let mut content = truncate(&message.content, 80);
        if let Some(calls) = &message.tool_calls {
            content = format!("{content} [{} tool call{}]", calls.len(), if calls.len() == 1 { "" } else { "s" });
        }
        if let Some(name) = &message.name {
            content = format!("[{name}] {content}");
        }

        table.add_row(vec![
            Cell::new(offset + i).fg(Color::DarkGrey),
            role_cell,
            Cell::new(message.timestamp.as_deref().map(short_time).unwrap_or("-")).fg(Color::DarkGrey),
            Cell::new(content),
        ]);
    }

    println!("{table}");
    println!();

    Ok(())
}

/// Clear a session's history with confirmation.
pub async fn clear_session(state: &AppState, key: &str, force: bool, json: bool) -> Result<()> {
    let existing = load_existing(state, key).await?;

    if !force && !json {
        let confirmed = Confirm::new()
            .with_prompt(format!(
                "Clear session '{}' ({} messages)?",
                style(key).red().bold(),
                existing.len()
            ))
            .default(false)
            .interact()?;

        if !confirmed {
            println!("  Cancelled.");
            return Ok(());
        }
    }

    let session = state.sessions.get_or_create(key).await;
    session.write().await.clear();
    state
        .sessions
        .save(&session)
        .await
        .with_context(|| format!("Failed to save cleared session '{key}'"))?;

    if json {
        println!("{}", serde_json::json!({"cleared": true, "key": key}));
    } else {
        println!("  {} Session '{}' cleared.", style("✓").green().bold(), key);
    }

    Ok(())
}

/// Delete a session log with confirmation.
pub async fn delete_session(state: &AppState, key: &str, force: bool, json: bool) -> Result<()> {
    let existing = load_existing(state, key).await?;

    if !force && !json {
        let confirmed = Confirm::new()
            .with_prompt(format!(
                "Delete session '{}' ({} messages)?",
                style(key).red().bold(),
                existing.len()
            ))
            .default(false)
            .interact()?;

        if !confirmed {
            println!("  Cancelled.");
            return Ok(());
        }
    }

    if !state.sessions.delete(key).await? {
        bail!("Session '{key}' not found");
    }

    if json {
        println!("{}", serde_json::json!({"deleted": true, "key": key}));
    } else {
        println!("  {} Session '{}' deleted.", style("x").red().bold(), key);
    }

    Ok(())
}

/// Load a persisted session straight from the store, failing if none exists.
async fn load_existing(state: &AppState, key: &str) -> Result<Session> {
    state
        .sessions
        .store()
        .load(key)
        .await?
        .with_context(|| format!("Session '{key}' not found"))
}

// --- Formatting helpers ---

fn truncate(text: &str, max_chars: usize) -> String {
    let flat = text.replace('\n', " ");
    if flat.chars().count() > max_chars {
        let cut: String = flat.chars().take(max_chars.saturating_sub(3)).collect();
        format!("{cut}...")
    } else {
        flat
    }
}

/// `HH:MM:SS` from an ISO timestamp, or the raw string if it is too short.
fn short_time(timestamp: &str) -> &str {
    timestamp.get(11..19).unwrap_or(timestamp)
}
