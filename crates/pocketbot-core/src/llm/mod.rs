//! Upstream model provider selection.
//!
//! - `resolver` -- picks the provider/credential for a model identifier

pub mod resolver;

pub use resolver::{
    NO_PROVIDER, ResolvedProvider, get_api_base, get_api_key, get_provider, get_provider_name,
    resolve,
};
