//! Configuration loader for PocketBot.
//!
//! Reads `config.json` from the data directory (`~/.pocketbot/` in production)
//! and deserializes it into [`Config`]. Falls back to defaults when the file
//! is missing or malformed, so a broken config never stops the process.

use std::path::{Path, PathBuf};

use pocketbot_types::config::Config;
use pocketbot_types::error::ConfigError;
use serde_json::Value;

use crate::filesystem::expand_home;

pub const CONFIG_FILE_NAME: &str = "config.json";

/// `{data_dir}/config.json`.
pub fn config_path(data_dir: &Path) -> PathBuf {
    data_dir.join(CONFIG_FILE_NAME)
}

/// Load configuration from `path`.
///
/// - If the file does not exist, returns [`Config::default()`].
/// - If the file exists but fails to read or parse, logs a warning and
///   returns the default.
/// - Older layouts are migrated in memory before parsing; the file on disk
///   is left untouched until the next [`save_config`].
pub async fn load_config(path: &Path) -> Config {
    let content = match tokio::fs::read_to_string(path).await {
        Ok(content) => content,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            tracing::debug!("No config.json found at {}, using defaults", path.display());
            return Config::default();
        }
        Err(err) => {
            tracing::warn!("Failed to read {}: {err}, using defaults", path.display());
            return Config::default();
        }
    };

    let parsed = serde_json::from_str::<Value>(&content)
        .map(migrate_config)
        .and_then(serde_json::from_value::<Config>);

    match parsed {
        Ok(config) => config,
        Err(err) => {
            tracing::warn!("Failed to parse {}: {err}, using defaults", path.display());
            Config::default()
        }
    }
}

/// Write `config` to `path` as pretty camelCase JSON, creating parent
/// directories as needed.
pub async fn save_config(config: &Config, path: &Path) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    let mut content = serde_json::to_string_pretty(config)?;
    content.push('\n');
    tokio::fs::write(path, content).await?;
    tracing::debug!("Saved config to {}", path.display());
    Ok(())
}

/// The agent workspace with `~` expanded. Session logs live under
/// `{workspace}/sessions`.
pub fn workspace_path(config: &Config) -> PathBuf {
    expand_home(&config.agents.defaults.workspace)
}

/// Move `tools.exec.restrictToWorkspace` to `tools.restrictToWorkspace`.
///
/// An explicit top-level value is never overwritten.
fn migrate_config(mut value: Value) -> Value {
    let Some(tools) = value.get_mut("tools").and_then(Value::as_object_mut) else {
        return value;
    };
    let legacy = tools
        .get_mut("exec")
        .and_then(Value::as_object_mut)
        .and_then(|exec| {
            exec.remove("restrictToWorkspace")
                .or_else(|| exec.remove("restrict_to_workspace"))
        });
    if let Some(restrict) = legacy {
        let already_set =
            tools.contains_key("restrictToWorkspace") || tools.contains_key("restrict_to_workspace");
        if !already_set {
            tracing::debug!("Migrating tools.exec.restrictToWorkspace to tools.restrictToWorkspace");
            tools.insert("restrictToWorkspace".to_string(), restrict);
        }
    }
    value
}
