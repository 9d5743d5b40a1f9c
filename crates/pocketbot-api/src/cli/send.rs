//! `pocketbot send`: push a user turn through the message bus.
//!
//! Acts as a minimal channel adapter: the turn is published on the bus, an
//! inbound subscriber (standing in for the dispatch loop) records it in the
//! conversation's session and persists it, and the provider that would serve
//! the reply is reported. No model is called.

use anyhow::{Context, Result};
use console::style;
use serde_json::{Map, Value};

use pocketbot_core::llm::{NO_PROVIDER, get_provider_name};
use pocketbot_core::message::Topic;
use pocketbot_types::bus::{BusEvent, InboundMessage};

use crate::state::AppState;

/// Record `content` as a user turn from `channel`/`chat_id`.
pub async fn send_message(
    state: &AppState,
    channel: &str,
    chat_id: &str,
    sender: &str,
    content: &str,
    json: bool,
) -> Result<()> {
    let mut inbound = state.bus.subscribe_to(Topic::Inbound);

    let message = InboundMessage::new(channel, sender, chat_id, content);
    let key = message.session_key();
    let delivered = state.bus.publish_inbound(message);

    let Some(BusEvent::Inbound(received)) = inbound.recv().await else {
        anyhow::bail!("Inbound subscriber closed before receiving the message");
    };
    drop(inbound);

    let session = state.sessions.get_or_create(&received.session_key()).await;
    let total = {
        let mut guard = session.write().await;
        guard.add_message_with("user", received.content.clone(), turn_extras(&received));
        guard.len()
    };
    state
        .sessions
        .save(&session)
        .await
        .with_context(|| format!("Failed to save session '{key}'"))?;

    let model = &state.config.agents.defaults.model;
    let provider = get_provider_name(&state.config.providers, Some(model)).unwrap_or(NO_PROVIDER);

    if json {
        println!(
            "{}",
            serde_json::json!({
                "session": key,
                "message_id": received.id.to_string(),
                "delivered": delivered,
                "messages": total,
                "model": model,
                "provider": provider,
            })
        );
    } else {
        println!(
            "  {} Recorded turn in '{}' ({} message{})",
            style("✓").green().bold(),
            style(&key).cyan(),
            total,
            if total == 1 { "" } else { "s" }
        );
        println!(
            "  {}",
            style(format!("Reply would be routed to {provider} for {model}")).dim()
        );
    }

    Ok(())
}

/// Channel attributes stored next to the turn.
fn turn_extras(message: &InboundMessage) -> Map<String, Value> {
    let mut extras = Map::new();
    extras.insert("sender_id".to_string(), Value::String(message.sender_id.clone()));
    if !message.media.is_empty() {
        extras.insert(
            "media".to_string(),
            Value::Array(message.media.iter().cloned().map(Value::String).collect()),
        );
    }
    extras
}
