//! Provider resolution: picks which upstream provider and credential serve a
//! given model identifier.
//!
//! Resolution is a pure function of the credential mapping and the model
//! string, so callers hand in the current `ProvidersConfig` on every call and
//! rotated keys take effect immediately. Precedence:
//!
//! 1. an explicit `<provider>/...` prefix naming a provider that has a key
//!    (`-` and `_` are interchangeable in the prefix);
//! 2. the first provider in [`PROVIDERS`] order with a keyword found in the
//!    model string and a key;
//! 3. the first provider in [`PROVIDERS`] order with a key;
//! 4. nothing.

use pocketbot_types::provider::{PROVIDERS, ProviderConfig, ProviderSpec, ProvidersConfig};
use tracing::debug;

/// Shown wherever a resolution came up empty.
pub const NO_PROVIDER: &str = "none";

/// A provider chosen for a request, borrowed from the credential mapping.
#[derive(Debug, Clone, Copy)]
pub struct ResolvedProvider<'a> {
    pub spec: &'static ProviderSpec,
    pub config: &'a ProviderConfig,
}

impl<'a> ResolvedProvider<'a> {
    pub fn name(&self) -> &'static str {
        self.spec.name
    }

    pub fn api_key(&self) -> &'a str {
        &self.config.api_key
    }

    /// The configured base URL if set, otherwise the provider's default.
    pub fn api_base(&self) -> Option<&'a str> {
        match self.config.api_base.as_deref() {
            Some(base) if !base.trim().is_empty() => Some(base),
            _ => self.spec.default_api_base,
        }
    }
}

/// Run the full resolution for `model`.
pub fn resolve<'a>(providers: &'a ProvidersConfig, model: Option<&str>) -> Option<ResolvedProvider<'a>> {
    let usable = |spec: &'static ProviderSpec| {
        providers
            .get(spec.name)
            .filter(|config| config.has_key())
            .map(|config| ResolvedProvider { spec, config })
    };

    if let Some(model) = model {
        let lowered = model.to_lowercase();
        let normalized = lowered.replace('-', "_");

        if let Some((prefix, _)) = normalized.split_once('/') {
            if let Some(found) = PROVIDERS
                .iter()
                .find(|spec| spec.name == prefix)
                .and_then(usable)
            {
                debug!(%model, provider = found.name(), "resolved provider from model prefix");
                return Some(found);
            }
        }

        let by_keyword = PROVIDERS
            .iter()
            .filter(|spec| {
                spec.keywords.iter().any(|kw| {
                    lowered.contains(kw) || normalized.contains(&kw.replace('-', "_"))
                })
            })
            .find_map(usable);
        if let Some(found) = by_keyword {
            debug!(%model, provider = found.name(), "resolved provider from model keyword");
            return Some(found);
        }
    }

    let fallback = PROVIDERS.iter().find_map(usable);
    match fallback {
        Some(found) => debug!(model = ?model, provider = found.name(), "fell back to first configured provider"),
        None => debug!(model = ?model, "no provider has an api key configured"),
    }
    fallback
}

/// The credential entry serving `model`, or `None` if nothing is configured.
pub fn get_provider<'a>(providers: &'a ProvidersConfig, model: Option<&str>) -> Option<&'a ProviderConfig> {
    resolve(providers, model).map(|found| found.config)
}

pub fn get_api_key<'a>(providers: &'a ProvidersConfig, model: Option<&str>) -> Option<&'a str> {
    resolve(providers, model).map(|found| found.api_key())
}

/// Base URL for `model`: the resolved provider's override, else its default.
pub fn get_api_base<'a>(providers: &'a ProvidersConfig, model: Option<&str>) -> Option<&'a str> {
    resolve(providers, model).and_then(|found| found.api_base())
}

/// Registry name of the provider serving `model`.
///
/// Render `None` with [`NO_PROVIDER`].
pub fn get_provider_name(providers: &ProvidersConfig, model: Option<&str>) -> Option<&'static str> {
    resolve(providers, model).map(|found| found.name())
}
