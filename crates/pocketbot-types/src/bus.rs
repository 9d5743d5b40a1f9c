//! Event types carried by the in-process message bus.
//!
//! Channel adapters publish [`InboundMessage`]s (a user turn arriving from a
//! chat platform or the web UI); the dispatch loop publishes
//! [`OutboundMessage`]s (a reply to deliver). Both are addressed by
//! `channel` + `chat_id`, which together form the session key.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

/// Build the session key for a channel/chat pair (`"telegram:123"`).
pub fn session_key(channel: &str, chat_id: &str) -> String {
    format!("{channel}:{chat_id}")
}

/// A user turn received by a channel adapter.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InboundMessage {
    pub id: Uuid,
    pub channel: String,
    pub sender_id: String,
    pub chat_id: String,
    pub content: String,
    pub timestamp: DateTime<Utc>,
    /// Paths or URLs of attached media.
    #[serde(default)]
    pub media: Vec<String>,
    /// Channel-specific attributes, opaque to the bus.
    #[serde(default)]
    pub metadata: Map<String, Value>,
}

impl InboundMessage {
    pub fn new(
        channel: impl Into<String>,
        sender_id: impl Into<String>,
        chat_id: impl Into<String>,
        content: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::now_v7(),
            channel: channel.into(),
            sender_id: sender_id.into(),
            chat_id: chat_id.into(),
            content: content.into(),
            timestamp: Utc::now(),
            media: Vec::new(),
            metadata: Map::new(),
        }
    }

    pub fn session_key(&self) -> String {
        session_key(&self.channel, &self.chat_id)
    }
}

/// A reply to be delivered back out through a channel.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutboundMessage {
    pub id: Uuid,
    pub channel: String,
    pub chat_id: String,
    pub content: String,
    /// Id of the inbound message this replies to, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reply_to: Option<Uuid>,
    #[serde(default)]
    pub media: Vec<String>,
    #[serde(default)]
    pub metadata: Map<String, Value>,
}

impl OutboundMessage {
    pub fn new(
        channel: impl Into<String>,
        chat_id: impl Into<String>,
        content: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::now_v7(),
            channel: channel.into(),
            chat_id: chat_id.into(),
            content: content.into(),
            reply_to: None,
            media: Vec::new(),
            metadata: Map::new(),
        }
    }

    /// Build a reply addressed to the same conversation as `inbound`.
    pub fn reply_to(inbound: &InboundMessage, content: impl Into<String>) -> Self {
        let mut msg = Self::new(&inbound.channel, &inbound.chat_id, content);
        msg.reply_to = Some(inbound.id);
        msg
    }

    pub fn session_key(&self) -> String {
        session_key(&self.channel, &self.chat_id)
    }
}

/// Everything that travels over the bus.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "direction", rename_all = "snake_case")]
pub enum BusEvent {
    Inbound(InboundMessage),
    Outbound(OutboundMessage),
}

impl BusEvent {
    /// Session key of the conversation this event belongs to.
    pub fn session_key(&self) -> String {
        match self {
            BusEvent::Inbound(msg) => msg.session_key(),
            BusEvent::Outbound(msg) => msg.session_key(),
        }
    }

    pub fn is_inbound(&self) -> bool {
        matches!(self, BusEvent::Inbound(_))
    }
}

impl From<InboundMessage> for BusEvent {
    fn from(msg: InboundMessage) -> Self {
        BusEvent::Inbound(msg)
    }
}

impl From<OutboundMessage> for BusEvent {
    fn from(msg: OutboundMessage) -> Self {
        BusEvent::Outbound(msg)
    }
}
