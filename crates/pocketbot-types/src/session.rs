//! Session record types for PocketBot.
//!
//! These types model what a conversation looks like on disk and on the wire:
//! the message record (with an open map of extra attributes that callers may
//! attach), the role enum, and the metadata record that heads every session
//! log.

use chrono::{DateTime, Utc};
use serde::de::{self, Deserializer};
use serde::{Deserialize, Serialize, Serializer};
use serde_json::{Map, Value};

use std::fmt;
use std::str::FromStr;

/// Discriminator value of the metadata record in a session log.
pub const METADATA_RECORD_TYPE: &str = "metadata";

/// Role of a message within a session.
///
/// Unknown roles are kept as [`MessageRole::Other`] so that records written by
/// newer or foreign producers survive a load/save cycle unchanged.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum MessageRole {
    System,
    User,
    Assistant,
    Tool,
    Other(String),
}

impl MessageRole {
    pub fn as_str(&self) -> &str {
        match self {
            MessageRole::System => "system",
            MessageRole::User => "user",
            MessageRole::Assistant => "assistant",
            MessageRole::Tool => "tool",
            MessageRole::Other(other) => other,
        }
    }
}

impl fmt::Display for MessageRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<&str> for MessageRole {
    fn from(s: &str) -> Self {
        match s {
            "system" => MessageRole::System,
            "user" => MessageRole::User,
            "assistant" => MessageRole::Assistant,
            "tool" => MessageRole::Tool,
            other => MessageRole::Other(other.to_string()),
        }
    }
}

impl From<String> for MessageRole {
    fn from(s: String) -> Self {
        MessageRole::from(s.as_str())
    }
}

impl From<MessageRole> for String {
    fn from(role: MessageRole) -> Self {
        match role {
            MessageRole::Other(other) => other,
            known => known.as_str().to_string(),
        }
    }
}

impl FromStr for MessageRole {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(MessageRole::from(s))
    }
}

/// Extra attributes attached to a message by its producer.
///
/// Insertion order is preserved (serde_json `preserve_order`).
pub type MessageExtras = Map<String, Value>;

/// A single message record in a session.
///
/// The typed fields are views over the record. A key is lifted into its field
/// only when the value has the expected shape; anything else, including a
/// well-known key with an unexpected shape (multimodal `content`, a numeric
/// `tool_call_id`), stays in `extra`. Extras replace core keys when the record
/// is written or rendered as history, so a record reads back the way it was
/// written and never carries a key twice.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionMessage {
    pub role: MessageRole,
    /// Plain-text content. For non-text content this is the text of its parts;
    /// the original value is kept in `extra["content"]`.
    pub content: String,
    pub timestamp: Option<String>,
    pub tool_calls: Option<Vec<Value>>,
    pub tool_call_id: Option<String>,
    pub name: Option<String>,
    pub extra: MessageExtras,
}

impl SessionMessage {
    /// Build a message stamped with the current time.
    pub fn new(role: impl Into<MessageRole>, content: impl Into<String>) -> Self {
        Self {
            role: role.into(),
            content: content.into(),
            timestamp: Some(Utc::now().to_rfc3339()),
            tool_calls: None,
            tool_call_id: None,
            name: None,
            extra: MessageExtras::new(),
        }
    }

    /// Merge caller-supplied attributes into the record. Later keys win,
    /// including over `role`, `content` and `timestamp`.
    pub fn with_extras(mut self, extras: MessageExtras) -> Self {
        for (key, value) in extras {
            self.absorb(key, value);
        }
        self
    }

    fn absorb(&mut self, key: String, value: Value) {
        let rest = match (key.as_str(), value) {
            ("role", Value::String(role)) => {
                self.role = role.into();
                None
            }
            ("content", Value::String(text)) => {
                self.content = text;
                None
            }
            ("content", Value::Null) => {
                self.content.clear();
                None
            }
            ("timestamp", Value::String(ts)) => {
                self.timestamp = Some(ts);
                None
            }
            ("tool_calls", Value::Array(calls)) => {
                self.tool_calls = Some(calls);
                None
            }
            ("tool_call_id", Value::String(id)) => {
                self.tool_call_id = Some(id);
                None
            }
            ("name", Value::String(name)) => {
                self.name = Some(name);
                None
            }
            (_, value) => Some(value),
        };

        match rest {
            Some(value) => {
                match key.as_str() {
                    "content" => self.content = text_of(&value),
                    "timestamp" => self.timestamp = None,
                    "tool_calls" => self.tool_calls = None,
                    "tool_call_id" => self.tool_call_id = None,
                    "name" => self.name = None,
                    _ => {}
                }
                self.extra.insert(key, value);
            }
            None => {
                if self.extra.contains_key(&key) {
                    self.extra.retain(|k, _| *k != key);
                }
            }
        }
    }

    /// Render the record the way the dispatch loop consumes it:
    /// `role`, `content`, tool metadata and extras, with extras replacing
    /// core keys. The typed timestamp is dropped.
    pub fn to_history_entry(&self) -> Value {
        Value::Object(self.to_record(false))
    }

    fn to_record(&self, with_timestamp: bool) -> Map<String, Value> {
        let mut record = Map::new();
        record.insert("role".to_string(), Value::String(self.role.to_string()));
        record.insert("content".to_string(), Value::String(self.content.clone()));
        if with_timestamp {
            if let Some(ts) = &self.timestamp {
                record.insert("timestamp".to_string(), Value::String(ts.clone()));
            }
        }
        if let Some(calls) = &self.tool_calls {
            record.insert("tool_calls".to_string(), Value::Array(calls.clone()));
        }
        if let Some(id) = &self.tool_call_id {
            record.insert("tool_call_id".to_string(), Value::String(id.clone()));
        }
        if let Some(name) = &self.name {
            record.insert("name".to_string(), Value::String(name.clone()));
        }
        // Existing keys keep their position and take the extra's value.
        for (key, value) in &self.extra {
            record.insert(key.clone(), value.clone());
        }
        record
    }
}

impl Serialize for SessionMessage {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_record(true).serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for SessionMessage {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let record = Map::<String, Value>::deserialize(deserializer)?;
        if !record.contains_key("role") {
            return Err(de::Error::missing_field("role"));
        }

        let mut message = SessionMessage {
            role: MessageRole::Other(String::new()),
            content: String::new(),
            timestamp: None,
            tool_calls: None,
            tool_call_id: None,
            name: None,
            extra: MessageExtras::new(),
        };
        for (key, value) in record {
            message.absorb(key, value);
        }
        Ok(message)
    }
}

/// Readable text of a non-string content value.
fn text_of(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(text) => text.clone(),
        Value::Array(parts) => parts
            .iter()
            .filter_map(|part| match part {
                Value::String(text) => Some(text.as_str()),
                other => other.get("text").and_then(Value::as_str),
            })
            .collect::<Vec<_>>()
            .join("\n"),
        other => other.to_string(),
    }
}

/// First record of a session log.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionMetadataRecord {
    #[serde(rename = "_type")]
    pub record_type: String,
    /// Session key. Older logs do not carry it; the key is then derived from
    /// the file name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<String>,
    #[serde(default)]
    pub last_consolidated: usize,
    #[serde(default)]
    pub metadata: Map<String, Value>,
}

impl SessionMetadataRecord {
    pub fn is_metadata(value: &Value) -> bool {
        value.get("_type").and_then(Value::as_str) == Some(METADATA_RECORD_TYPE)
    }
}

/// Summary of a persisted session, as returned by administrative listing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionInfo {
    pub key: String,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
    pub path: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_message_role_roundtrip() {
        for role in ["system", "user", "assistant", "tool"] {
            let parsed: MessageRole = role.parse().unwrap();
            assert_eq!(parsed.to_string(), role);
            assert!(!matches!(parsed, MessageRole::Other(_)));
        }
    }

    #[test]
    fn test_unknown_role_is_preserved() {
        let role: MessageRole = serde_json::from_value(json!("developer")).unwrap();
        assert_eq!(role, MessageRole::Other("developer".to_string()));
        assert_eq!(serde_json::to_value(&role).unwrap(), json!("developer"));
    }

    #[test]
    fn test_message_extras_keep_order_and_values() {
        let line = r#"{"role":"user","content":"hi","timestamp":"2024-01-01T00:00:00","zeta":1,"alpha":{"nested":true}}"#;
        let msg: SessionMessage = serde_json::from_str(line).unwrap();
        let keys: Vec<&String> = msg.extra.keys().collect();
        assert_eq!(keys, vec!["zeta", "alpha"]);

        let back = serde_json::to_string(&msg).unwrap();
        assert_eq!(back, line);
    }

    #[test]
    fn test_null_content_reads_as_empty() {
        let msg: SessionMessage = serde_json::from_value(json!({
            "role": "assistant",
            "content": null,
            "tool_calls": [{"id": "tc1"}]
        }))
        .unwrap();
        assert_eq!(msg.content, "");
        assert_eq!(msg.tool_calls.as_ref().unwrap().len(), 1);
    }

    #[test]
    fn test_with_extras_lifts_tool_fields() {
        let mut extras = MessageExtras::new();
        extras.insert("tool_call_id".into(), json!("tc1"));
        extras.insert("name".into(), json!("search"));
        extras.insert("channel".into(), json!("web"));

        let msg = SessionMessage::new("tool", "result").with_extras(extras);
        assert_eq!(msg.tool_call_id.as_deref(), Some("tc1"));
        assert_eq!(msg.name.as_deref(), Some("search"));
        assert_eq!(msg.extra.get("channel"), Some(&json!("web")));
    }

    #[test]
    fn test_with_extras_keeps_odd_shapes_verbatim() {
        let mut extras = MessageExtras::new();
        extras.insert("tool_calls".into(), json!("not-a-list"));

        let msg = SessionMessage::new("assistant", "").with_extras(extras);
        assert!(msg.tool_calls.is_none());
        assert_eq!(msg.extra.get("tool_calls"), Some(&json!("not-a-list")));
    }

    #[test]
    fn test_extras_replace_core_keys_without_duplicates() {
        let mut extras = MessageExtras::new();
        extras.insert("timestamp".into(), json!("2020-01-01T00:00:00"));
        extras.insert("content".into(), json!("overridden"));

        let msg = SessionMessage::new("user", "original").with_extras(extras);
        assert_eq!(msg.timestamp.as_deref(), Some("2020-01-01T00:00:00"));
        assert_eq!(msg.content, "overridden");
        assert!(msg.extra.is_empty());

        let line = serde_json::to_string(&msg).unwrap();
        assert_eq!(line.matches("\"timestamp\"").count(), 1);
        assert_eq!(line.matches("\"content\"").count(), 1);
    }

    #[test]
    fn test_odd_shaped_tool_fields_survive_a_write_and_read() {
        let mut extras = MessageExtras::new();
        extras.insert("tool_call_id".into(), json!(5));
        extras.insert("name".into(), json!({"first": "x"}));
        extras.insert("timestamp".into(), json!(1700000000));

        let msg = SessionMessage::new("tool", "done").with_extras(extras);
        assert!(msg.tool_call_id.is_none());
        assert!(msg.name.is_none());
        assert!(msg.timestamp.is_none());

        let line = serde_json::to_string(&msg).unwrap();
        let raw: Map<String, Value> = serde_json::from_str(&line).unwrap();
        assert_eq!(raw["tool_call_id"], json!(5));
        assert_eq!(raw["name"], json!({"first": "x"}));

        let back: SessionMessage = serde_json::from_str(&line).unwrap();
        assert_eq!(back, msg);
        assert_eq!(back.to_history_entry(), msg.to_history_entry());
    }

    #[test]
    fn test_multimodal_content_is_kept_verbatim() {
        let line = r#"{"role":"user","content":[{"type":"text","text":"look"},{"type":"image_url","image_url":{"url":"data:x"}}],"timestamp":"2024-01-01T00:00:00"}"#;
        let msg: SessionMessage = serde_json::from_str(line).unwrap();
        assert_eq!(msg.role, MessageRole::User);
        assert_eq!(msg.content, "look");
        assert_eq!(msg.timestamp.as_deref(), Some("2024-01-01T00:00:00"));
        assert!(msg.extra["content"].is_array());

        assert_eq!(serde_json::to_string(&msg).unwrap(), line);
        assert_eq!(msg.to_history_entry()["content"][1]["type"], "image_url");
    }

    #[test]
    fn test_record_without_role_is_rejected() {
        let result = serde_json::from_value::<SessionMessage>(json!({"content": "orphan"}));
        assert!(result.is_err());
    }

    #[test]
    fn test_history_entry_lets_extras_win() {
        let mut extras = MessageExtras::new();
        extras.insert("tool_calls".into(), json!({"pending": true}));
        extras.insert("channel".into(), json!("web"));

        let msg = SessionMessage::new("assistant", "").with_extras(extras);
        let entry = msg.to_history_entry();
        assert_eq!(entry["tool_calls"], json!({"pending": true}));
        assert_eq!(entry["channel"], "web");
        assert!(entry.get("timestamp").is_none());
    }

    #[test]
    fn test_history_entry_drops_timestamp() {
        let msg = SessionMessage::new("user", "ping");
        let entry = msg.to_history_entry();
        assert_eq!(entry["role"], "user");
        assert_eq!(entry["content"], "ping");
        assert!(entry.get("timestamp").is_none());
    }

    #[test]
    fn test_metadata_record_detection() {
        let meta = json!({"_type": "metadata", "created_at": "2024-01-01T00:00:00"});
        assert!(SessionMetadataRecord::is_metadata(&meta));
        assert!(!SessionMetadataRecord::is_metadata(&json!({"role": "user"})));

        let record: SessionMetadataRecord = serde_json::from_value(meta).unwrap();
        assert_eq!(record.last_consolidated, 0);
        assert!(record.key.is_none());
    }
}
