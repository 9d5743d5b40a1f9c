use thiserror::Error;

/// Errors surfaced by session persistence.
///
/// Only write-side failures reach callers; read-side problems (corrupt lines,
/// unreadable logs, failed legacy migration) are logged and degrade to a
/// fresh session instead.
#[derive(Debug, Error)]
pub enum SessionStoreError {
    #[error("session I/O error for '{key}': {source}")]
    Io {
        key: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to encode session '{key}': {source}")]
    Encode {
        key: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to read sessions directory: {0}")]
    Listing(#[source] std::io::Error),
}

/// Errors from writing configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("config encoding error: {0}")]
    Encode(#[from] serde_json::Error),
}
