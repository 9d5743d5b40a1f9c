//! Provider credential types and the static provider registry.
//!
//! [`ProvidersConfig`] is the credential mapping read from `config.json`; it
//! has one fixed field per supported provider. [`PROVIDERS`] describes those
//! providers (matching keywords, default endpoints) and fixes the order in
//! which fallback resolution visits them.

use serde::{Deserialize, Serialize};

use std::collections::BTreeMap;

/// Credentials and endpoint override for a single provider.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderConfig {
    #[serde(default, alias = "api_key")]
    pub api_key: String,
    #[serde(default, alias = "api_base")]
    pub api_base: Option<String>,
    #[serde(default, alias = "extra_headers")]
    pub extra_headers: Option<BTreeMap<String, String>>,
}

impl ProviderConfig {
    pub fn with_key(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            ..Self::default()
        }
    }

    /// Whether this provider can be used at all.
    pub fn has_key(&self) -> bool {
        !self.api_key.trim().is_empty()
    }
}

/// Credential mapping, one entry per supported provider.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ProvidersConfig {
    pub custom: ProviderConfig,
    pub openrouter: ProviderConfig,
    pub aihubmix: ProviderConfig,
    pub siliconflow: ProviderConfig,
    pub anthropic: ProviderConfig,
    pub openai: ProviderConfig,
    #[serde(alias = "openai_codex")]
    pub openai_codex: ProviderConfig,
    #[serde(alias = "github_copilot")]
    pub github_copilot: ProviderConfig,
    pub deepseek: ProviderConfig,
    pub gemini: ProviderConfig,
    pub zhipu: ProviderConfig,
    pub dashscope: ProviderConfig,
    pub moonshot: ProviderConfig,
    pub minimax: ProviderConfig,
    pub vllm: ProviderConfig,
    pub groq: ProviderConfig,
}

impl ProvidersConfig {
    /// Look up a provider's config by its registry name.
    pub fn get(&self, name: &str) -> Option<&ProviderConfig> {
        let config = match name {
            "custom" => &self.custom,
            "openrouter" => &self.openrouter,
            "aihubmix" => &self.aihubmix,
            "siliconflow" => &self.siliconflow,
            "anthropic" => &self.anthropic,
            "openai" => &self.openai,
            "openai_codex" => &self.openai_codex,
            "github_copilot" => &self.github_copilot,
            "deepseek" => &self.deepseek,
            "gemini" => &self.gemini,
            "zhipu" => &self.zhipu,
            "dashscope" => &self.dashscope,
            "moonshot" => &self.moonshot,
            "minimax" => &self.minimax,
            "vllm" => &self.vllm,
            "groq" => &self.groq,
            _ => return None,
        };
        Some(config)
    }

    /// Mutable lookup by registry name (used when setting keys).
    pub fn get_mut(&mut self, name: &str) -> Option<&mut ProviderConfig> {
        let config = match name {
            "custom" => &mut self.custom,
            "openrouter" => &mut self.openrouter,
            "aihubmix" => &mut self.aihubmix,
            "siliconflow" => &mut self.siliconflow,
            "anthropic" => &mut self.anthropic,
            "openai" => &mut self.openai,
            "openai_codex" => &mut self.openai_codex,
            "github_copilot" => &mut self.github_copilot,
            "deepseek" => &mut self.deepseek,
            "gemini" => &mut self.gemini,
            "zhipu" => &mut self.zhipu,
            "dashscope" => &mut self.dashscope,
            "moonshot" => &mut self.moonshot,
            "minimax" => &mut self.minimax,
            "vllm" => &mut self.vllm,
            "groq" => &mut self.groq,
            _ => return None,
        };
        Some(config)
    }
}

/// Static description of a provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProviderSpec {
    /// Registry name; equals the field name in [`ProvidersConfig`].
    pub name: &'static str,
    pub display_name: &'static str,
    /// Substrings that identify this provider inside a model string.
    pub keywords: &'static [&'static str],
    /// Environment variable conventionally holding this provider's key.
    pub env_key: &'static str,
    pub default_api_base: Option<&'static str>,
    /// Routes requests for many upstream vendors.
    pub is_gateway: bool,
    /// Self-hosted endpoint.
    pub is_local: bool,
}

/// Every supported provider, in resolution order.
///
/// Fallback resolution walks this slice front to back, so the order is a
/// deliberate precedence: user-defined endpoint first, then gateways (which
/// can serve any model), then direct vendors, then local servers.
pub const PROVIDERS: &[ProviderSpec] = &[
    ProviderSpec {
        name: "custom",
        display_name: "Custom",
        keywords: &[],
        env_key: "",
        default_api_base: None,
        is_gateway: false,
        is_local: false,
    },
    ProviderSpec {
        name: "openrouter",
        display_name: "OpenRouter",
        keywords: &["openrouter"],
        env_key: "OPENROUTER_API_KEY",
        default_api_base: Some("https://openrouter.ai/api/v1"),
        is_gateway: true,
        is_local: false,
    },
    ProviderSpec {
        name: "aihubmix",
        display_name: "AiHubMix",
        keywords: &["aihubmix"],
        env_key: "OPENAI_API_KEY",
        default_api_base: Some("https://aihubmix.com/v1"),
        is_gateway: true,
        is_local: false,
    },
    ProviderSpec {
        name: "siliconflow",
        display_name: "SiliconFlow",
        keywords: &["siliconflow"],
        env_key: "OPENAI_API_KEY",
        default_api_base: Some("https://api.siliconflow.cn/v1"),
        is_gateway: true,
        is_local: false,
    },
    ProviderSpec {
        name: "anthropic",
        display_name: "Anthropic",
        keywords: &["anthropic", "claude"],
        env_key: "ANTHROPIC_API_KEY",
        default_api_base: None,
        is_gateway: false,
        is_local: false,
    },
    ProviderSpec {
        name: "openai",
        display_name: "OpenAI",
        keywords: &["openai", "gpt"],
        env_key: "OPENAI_API_KEY",
        default_api_base: None,
        is_gateway: false,
        is_local: false,
    },
    ProviderSpec {
        name: "openai_codex",
        display_name: "OpenAI Codex",
        keywords: &["openai-codex", "codex"],
        env_key: "",
        default_api_base: Some("https://chatgpt.com/backend-api"),
        is_gateway: false,
        is_local: false,
    },
    ProviderSpec {
        name: "github_copilot",
        display_name: "GitHub Copilot",
        keywords: &["github_copilot", "copilot"],
        env_key: "",
        default_api_base: None,
        is_gateway: false,
        is_local: false,
    },
    ProviderSpec {
        name: "deepseek",
        display_name: "DeepSeek",
        keywords: &["deepseek"],
        env_key: "DEEPSEEK_API_KEY",
        default_api_base: None,
        is_gateway: false,
        is_local: false,
    },
    ProviderSpec {
        name: "gemini",
        display_name: "Gemini",
        keywords: &["gemini"],
        env_key: "GEMINI_API_KEY",
        default_api_base: None,
        is_gateway: false,
        is_local: false,
    },
    ProviderSpec {
        name: "zhipu",
        display_name: "Zhipu AI",
        keywords: &["zhipu", "glm", "zai"],
        env_key: "ZAI_API_KEY",
        default_api_base: None,
        is_gateway: false,
        is_local: false,
    },
    ProviderSpec {
        name: "dashscope",
        display_name: "DashScope",
        keywords: &["qwen", "dashscope"],
        env_key: "DASHSCOPE_API_KEY",
        default_api_base: None,
        is_gateway: false,
        is_local: false,
    },
    ProviderSpec {
        name: "moonshot",
        display_name: "Moonshot",
        keywords: &["moonshot", "kimi"],
        env_key: "MOONSHOT_API_KEY",
        default_api_base: Some("https://api.moonshot.ai/v1"),
        is_gateway: false,
        is_local: false,
    },
    ProviderSpec {
        name: "minimax",
        display_name: "MiniMax",
        keywords: &["minimax"],
        env_key: "MINIMAX_API_KEY",
        default_api_base: Some("https://api.minimax.io/v1"),
        is_gateway: false,
        is_local: false,
    },
    ProviderSpec {
        name: "vllm",
        display_name: "vLLM/Local",
        keywords: &["vllm"],
        env_key: "HOSTED_VLLM_API_KEY",
        default_api_base: None,
        is_gateway: false,
        is_local: true,
    },
    ProviderSpec {
        name: "groq",
        display_name: "Groq",
        keywords: &["groq"],
        env_key: "GROQ_API_KEY",
        default_api_base: None,
        is_gateway: false,
        is_local: false,
    },
];

/// Find a registry entry by name.
pub fn find_provider_spec(name: &str) -> Option<&'static ProviderSpec> {
    PROVIDERS.iter().find(|spec| spec.name == name)
}
