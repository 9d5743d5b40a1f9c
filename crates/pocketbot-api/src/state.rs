//! Application state wiring the core services together.
//!
//! `SessionManager` is generic over its store; AppState pins it to the JSONL
//! store under the configured workspace.

use std::path::PathBuf;
use std::sync::Arc;

use pocketbot_core::message::MessageBus;
use pocketbot_core::session::SessionManager;
use pocketbot_infra::config::{config_path, load_config, workspace_path};
use pocketbot_infra::filesystem::resolve_data_dir;
use pocketbot_infra::session::JsonlSessionStore;
use pocketbot_types::config::Config;

pub type ConcreteSessionManager = SessionManager<JsonlSessionStore>;

/// Shared application state used by every CLI command.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub config_path: PathBuf,
    pub data_dir: PathBuf,
    pub workspace: PathBuf,
    pub sessions: Arc<ConcreteSessionManager>,
    pub bus: MessageBus,
}

impl AppState {
    /// Load configuration and wire the session manager and message bus.
    ///
    /// `config_override` replaces `{data_dir}/config.json`.
    pub async fn init(config_override: Option<PathBuf>) -> Self {
        let data_dir = resolve_data_dir();
        let config_file = config_override.unwrap_or_else(|| config_path(&data_dir));
        let config = load_config(&config_file).await;

        let workspace = workspace_path(&config);
        let store = JsonlSessionStore::new(&workspace);
        tracing::debug!(
            data_dir = %data_dir.display(),
            sessions_dir = %store.sessions_dir().display(),
            "initialized application state"
        );

        Self {
            bus: MessageBus::with_capacity(config.bus.subscriber_capacity),
            sessions: Arc::new(SessionManager::new(store)),
            config: Arc::new(config),
            config_path: config_file,
            data_dir,
            workspace,
        }
    }
}
