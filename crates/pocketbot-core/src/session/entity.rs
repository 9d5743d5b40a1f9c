//! The in-memory session entity.
//!
//! A `Session` is one conversation's ordered message history plus the
//! consolidation marker maintained by the external summarizer. Messages are
//! only ever appended; the single destructive operation is [`Session::clear`].

use chrono::{DateTime, Utc};
use pocketbot_types::session::{MessageExtras, MessageRole, SessionMessage};
use serde_json::{Map, Value};

/// One conversation's history.
#[derive(Debug, Clone)]
pub struct Session {
    key: String,
    messages: Vec<SessionMessage>,
    last_consolidated: usize,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    /// Opaque attributes persisted alongside the history.
    pub metadata: Map<String, Value>,
}

impl Session {
    /// Create a fresh, empty session.
    pub fn new(key: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            key: key.into(),
            messages: Vec::new(),
            last_consolidated: 0,
            created_at: now,
            updated_at: now,
            metadata: Map::new(),
        }
    }

    /// Rebuild a session from persisted state.
    ///
    /// `last_consolidated` is clamped to the number of recovered messages, so
    /// a log that lost trailing lines still yields a consistent marker.
    pub fn restore(
        key: impl Into<String>,
        messages: Vec<SessionMessage>,
        last_consolidated: usize,
        created_at: DateTime<Utc>,
        updated_at: DateTime<Utc>,
        metadata: Map<String, Value>,
    ) -> Self {
        let last_consolidated = last_consolidated.min(messages.len());
        Self {
            key: key.into(),
            messages,
            last_consolidated,
            created_at,
            updated_at: updated_at.max(created_at),
            metadata,
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn messages(&self) -> &[SessionMessage] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn last_consolidated(&self) -> usize {
        self.last_consolidated
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    /// Append a message stamped with the current time.
    pub fn add_message(&mut self, role: impl Into<MessageRole>, content: impl Into<String>) {
        self.push(SessionMessage::new(role, content));
    }

    /// Append a message carrying extra attributes (tool metadata and anything
    /// else the caller attaches). Extras are stored verbatim.
    pub fn add_message_with(
        &mut self,
        role: impl Into<MessageRole>,
        content: impl Into<String>,
        extras: MessageExtras,
    ) {
        self.push(SessionMessage::new(role, content).with_extras(extras));
    }

    /// Append a prebuilt record as-is.
    pub fn push(&mut self, message: SessionMessage) {
        self.messages.push(message);
        self.touch();
    }

    /// History in dispatch format (`role`, `content`, tool metadata, extras),
    /// oldest first. With `Some(n)` only the last `n` messages are returned.
    pub fn get_history(&self, max_messages: Option<usize>) -> Vec<Value> {
        let start = match max_messages {
            Some(max) => self.messages.len().saturating_sub(max),
            None => 0,
        };
        self.messages[start..]
            .iter()
            .map(SessionMessage::to_history_entry)
            .collect()
    }

    /// Messages not yet covered by consolidation.
    pub fn unconsolidated(&self) -> &[SessionMessage] {
        &self.messages[self.last_consolidated..]
    }

    /// Record that everything before `index` has been consolidated.
    ///
    /// The marker never moves backwards and never passes the end of the
    /// history.
    pub fn mark_consolidated(&mut self, index: usize) {
        let index = index.min(self.messages.len());
        if index > self.last_consolidated {
            self.last_consolidated = index;
            self.touch();
        }
    }

    /// Drop every message and reset the consolidation marker. The key stays.
    pub fn clear(&mut self) {
        self.messages.clear();
        self.last_consolidated = 0;
        self.touch();
    }

    fn touch(&mut self) {
        let now = Utc::now();
        if now > self.updated_at {
            self.updated_at = now;
        }
    }
}
