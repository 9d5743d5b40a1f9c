//! Filesystem layout for PocketBot.
//!
//! Resolves the data directory (where `config.json` lives), expands `~` in
//! user-supplied paths, and locates the legacy `~/.nanobot` tree that older
//! installs wrote sessions to.

use std::path::{Path, PathBuf};

/// Environment variable that overrides the data directory.
pub const DATA_DIR_ENV: &str = "POCKETBOT_HOME";

const DATA_DIR_NAME: &str = ".pocketbot";
const LEGACY_DATA_DIR_NAME: &str = ".nanobot";

/// Resolve the data directory from environment or the home directory.
///
/// Priority:
/// 1. `POCKETBOT_HOME` environment variable
/// 2. `~/.pocketbot`, unless only the legacy `~/.nanobot` exists
/// 3. `~/.nanobot` for installs that predate the rename
pub fn resolve_data_dir() -> PathBuf {
    let from_env = std::env::var_os(DATA_DIR_ENV)
        .filter(|value| !value.is_empty())
        .map(PathBuf::from);
    resolve_data_dir_from(from_env, dirs::home_dir().as_deref())
}

fn resolve_data_dir_from(from_env: Option<PathBuf>, home: Option<&Path>) -> PathBuf {
    if let Some(dir) = from_env {
        return expand_home(&dir.to_string_lossy());
    }

    let Some(home) = home else {
        // Last resort: current directory
        return PathBuf::from(DATA_DIR_NAME);
    };

    let current = home.join(DATA_DIR_NAME);
    let legacy = home.join(LEGACY_DATA_DIR_NAME);
    if !current.exists() && legacy.exists() {
        tracing::debug!("using legacy data directory {}", legacy.display());
        return legacy;
    }
    current
}

/// Root of the pre-rename data tree (`~/.nanobot`).
pub fn legacy_data_dir() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(LEGACY_DATA_DIR_NAME))
}

/// Where older installs kept session logs (`~/.nanobot/sessions`).
pub fn legacy_sessions_dir() -> Option<PathBuf> {
    legacy_data_dir().map(|dir| dir.join("sessions"))
}

/// Expand a leading `~` to the home directory.
///
/// Paths without a leading `~` (and `~user` forms) are returned unchanged.
pub fn expand_home(path: &str) -> PathBuf {
    expand_home_with(path, dirs::home_dir().as_deref())
}

fn expand_home_with(path: &str, home: Option<&Path>) -> PathBuf {
    let Some(home) = home else {
        return PathBuf::from(path);
    };
    if path == "~" {
        return home.to_path_buf();
    }
    match path.strip_prefix("~/") {
        Some(rest) => home.join(rest),
        None => PathBuf::from(path),
    }
}
