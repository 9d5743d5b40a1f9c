//! Global configuration types for PocketBot.
//!
//! `Config` mirrors `config.json` in the data directory. Keys are camelCase
//! on disk; snake_case spellings are accepted on read. Every section has
//! defaults, so a partial (or empty) file is valid.

use serde::{Deserialize, Serialize};

use crate::provider::ProvidersConfig;

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Config {
    pub agents: AgentsConfig,
    pub providers: ProvidersConfig,
    pub gateway: GatewayConfig,
    pub web: WebConfig,
    pub tools: ToolsConfig,
    pub bus: BusConfig,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AgentsConfig {
    pub defaults: AgentDefaults,
}

/// Defaults applied to every agent turn.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AgentDefaults {
    /// Workspace root; `~` is expanded when resolved.
    pub workspace: String,
    pub model: String,
    #[serde(alias = "max_tokens")]
    pub max_tokens: u32,
    pub temperature: f64,
    /// Number of recent messages fed back to the model.
    #[serde(alias = "memory_window")]
    pub memory_window: usize,
    #[serde(alias = "max_tool_iterations")]
    pub max_tool_iterations: u32,
}

impl Default for AgentDefaults {
    fn default() -> Self {
        Self {
            workspace: "~/.pocketbot/workspace".to_string(),
            model: "anthropic/claude-opus-4-5".to_string(),
            max_tokens: 8192,
            temperature: 0.7,
            memory_window: 50,
            max_tool_iterations: 20,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct GatewayConfig {
    pub host: String,
    pub port: u16,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 18790,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct WebConfig {
    pub enabled: bool,
    pub host: String,
    pub port: u16,
    pub auth: WebAuthConfig,
}

impl Default for WebConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            host: "localhost".to_string(),
            port: 8080,
            auth: WebAuthConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct WebAuthConfig {
    pub enabled: bool,
    pub token: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ToolsConfig {
    #[serde(alias = "restrict_to_workspace")]
    pub restrict_to_workspace: bool,
}

/// Message bus tuning.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BusConfig {
    /// Per-subscriber queue depth; once full, the oldest events are dropped.
    #[serde(alias = "subscriber_capacity")]
    pub subscriber_capacity: usize,
}

impl Default for BusConfig {
    fn default() -> Self {
        Self {
            subscriber_capacity: 256,
        }
    }
}
