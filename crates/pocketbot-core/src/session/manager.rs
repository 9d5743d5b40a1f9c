//! Session manager: the single owner of live sessions.
//!
//! Every reader and writer in the process goes through one `SessionManager`,
//! so a conversation key maps to exactly one in-memory `Session`. The cache
//! maps each key to a per-key once-cell: inserting the cell is atomic
//! (DashMap entry), and hydrating the session from disk happens inside the
//! cell's initializer, so concurrent first accesses wait for a single load
//! instead of racing to build two copies. No cache-wide lock is held while
//! the store does I/O.

use std::sync::Arc;

use dashmap::DashMap;
use pocketbot_types::error::SessionStoreError;
use pocketbot_types::session::SessionInfo;
use tokio::sync::{OnceCell, RwLock};
use tracing::{debug, warn};

use super::entity::Session;
use super::repository::SessionStore;

/// Shared handle to a live session. Clones point at the same session.
pub type SharedSession = Arc<RwLock<Session>>;

/// Owns the session cache and mediates all access to the durable store.
pub struct SessionManager<S: SessionStore> {
    store: S,
    cache: DashMap<String, Arc<OnceCell<SharedSession>>>,
}

impl<S: SessionStore> SessionManager<S> {
    pub fn new(store: S) -> Self {
        Self {
            store,
            cache: DashMap::new(),
        }
    }

    /// Return the live session for `key`, loading or creating it on first use.
    ///
    /// Resolution order on a cache miss: current log, legacy log (migrated
    /// by the store), fresh empty session. Load failures never reach the
    /// caller; they are logged and a fresh session is served.
    pub async fn get_or_create(&self, key: &str) -> SharedSession {
        let cell = self
            .cache
            .entry(key.to_string())
            .or_insert_with(|| Arc::new(OnceCell::new()))
            .clone();

        cell.get_or_init(|| self.hydrate(key)).await.clone()
    }

    async fn hydrate(&self, key: &str) -> SharedSession {
        let session = match self.store.load(key).await {
            Ok(Some(session)) => {
                debug!(%key, messages = session.len(), "loaded session from store");
                session
            }
            Ok(None) => {
                debug!(%key, "creating new session");
                Session::new(key)
            }
            Err(e) => {
                warn!(%key, error = %e, "failed to load session, starting fresh");
                Session::new(key)
            }
        };
        Arc::new(RwLock::new(session))
    }

    /// Persist the session's full current state.
    ///
    /// The session is snapshotted under a read lock and the lock is released
    /// before the store writes, so writers are never blocked on disk I/O.
    /// Write failures are returned; the in-memory session is unaffected.
    pub async fn save(&self, session: &SharedSession) -> Result<(), SessionStoreError> {
        let snapshot = session.read().await.clone();
        self.store.save(&snapshot).await?;
        debug!(key = %snapshot.key(), messages = snapshot.len(), "saved session");
        Ok(())
    }

    /// Drop `key` from the cache without touching the durable log.
    ///
    /// The next `get_or_create` reloads from disk; unsaved changes are lost.
    /// Returns `true` if the key was cached.
    pub fn invalidate(&self, key: &str) -> bool {
        let removed = self.cache.remove(key).is_some();
        if removed {
            debug!(%key, "invalidated cached session");
        }
        removed
    }

    /// Remove a session from both the cache and the durable store.
    pub async fn delete(&self, key: &str) -> Result<bool, SessionStoreError> {
        self.cache.remove(key);
        self.store.delete(key).await
    }

    /// Every durably persisted session, independent of the cache.
    pub async fn list_sessions(&self) -> Result<Vec<SessionInfo>, SessionStoreError> {
        self.store.list().await
    }

    /// Whether `key` currently has a cache entry.
    pub fn is_cached(&self, key: &str) -> bool {
        self.cache.contains_key(key)
    }

    /// Number of cached sessions.
    pub fn cached_count(&self) -> usize {
        self.cache.len()
    }

    /// Access the underlying store.
    pub fn store(&self) -> &S {
        &self.store
    }
}

impl<S: SessionStore> std::fmt::Debug for SessionManager<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionManager")
            .field("cached_sessions", &self.cache.len())
            .finish()
    }
}
