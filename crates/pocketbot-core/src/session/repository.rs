//! SessionStore trait definition.
//!
//! The durable side of session management. The infrastructure layer
//! implements it with one newline-delimited JSON log per session
//! (`JsonlSessionStore`). Uses native async fn in traits (RPITIT).

use pocketbot_types::error::SessionStoreError;
use pocketbot_types::session::SessionInfo;

use super::entity::Session;

/// Durable storage for session logs.
pub trait SessionStore: Send + Sync {
    /// Replay the log for `key`.
    ///
    /// Returns `Ok(None)` when nothing is persisted for the key (including
    /// after a legacy-location lookup came up empty). Implementations skip
    /// records they cannot parse instead of failing the whole load.
    fn load(
        &self,
        key: &str,
    ) -> impl std::future::Future<Output = Result<Option<Session>, SessionStoreError>> + Send;

    /// Replace the log for the session with its full current state.
    fn save(
        &self,
        session: &Session,
    ) -> impl std::future::Future<Output = Result<(), SessionStoreError>> + Send;

    /// Remove the log for `key`. Returns `true` if one existed.
    fn delete(
        &self,
        key: &str,
    ) -> impl std::future::Future<Output = Result<bool, SessionStoreError>> + Send;

    /// Enumerate every persisted session.
    fn list(
        &self,
    ) -> impl std::future::Future<Output = Result<Vec<SessionInfo>, SessionStoreError>> + Send;
}
