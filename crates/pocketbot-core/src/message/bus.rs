//! In-process publish/subscribe bus between channel adapters and the
//! dispatch loop.
//!
//! Every subscriber owns a bounded queue (a dedicated `broadcast` channel).
//! Publishing never waits: when a subscriber's queue is full its oldest
//! events are overwritten, so one stalled consumer cannot hold up producers
//! or other consumers. Subscribers pick a [`Topic`] to filter what they see.

use std::sync::{Arc, Weak};

use dashmap::DashMap;
use pocketbot_types::bus::{BusEvent, InboundMessage, OutboundMessage};
use tokio::sync::broadcast;
use tracing::{debug, warn};
use uuid::Uuid;

/// Default per-subscriber queue depth.
pub const DEFAULT_SUBSCRIBER_CAPACITY: usize = 256;

/// Which events a subscriber receives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Topic {
    /// Every event.
    All,
    /// Turns arriving from channels (what the dispatch loop consumes).
    Inbound,
    /// Replies headed out to channels.
    Outbound,
    /// Both directions, for one conversation only.
    Session(String),
}

impl Topic {
    pub fn matches(&self, event: &BusEvent) -> bool {
        match self {
            Topic::Session(key) => event.session_key() == *key,
            other => other.accepts(event, ""),
        }
    }

    /// `matches` with the event's session key already computed.
    fn accepts(&self, event: &BusEvent, session_key: &str) -> bool {
        match self {
            Topic::All => true,
            Topic::Inbound => event.is_inbound(),
            Topic::Outbound => !event.is_inbound(),
            Topic::Session(key) => key == session_key,
        }
    }
}

struct SubscriberSlot {
    topic: Topic,
    sender: broadcast::Sender<BusEvent>,
}

struct BusInner {
    subscribers: DashMap<Uuid, SubscriberSlot>,
    capacity: usize,
}

/// Publish/subscribe router. Cloning shares the same subscriber set.
#[derive(Clone)]
pub struct MessageBus {
    inner: Arc<BusInner>,
}

impl MessageBus {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_SUBSCRIBER_CAPACITY)
    }

    /// Create a bus whose subscribers each buffer up to `capacity` events.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            inner: Arc::new(BusInner {
                subscribers: DashMap::new(),
                capacity: capacity.max(1),
            }),
        }
    }

    /// Subscribe to every event published from now on.
    pub fn subscribe(&self) -> Subscription {
        self.subscribe_to(Topic::All)
    }

    /// Subscribe to events matching `topic`. No history is replayed.
    pub fn subscribe_to(&self, topic: Topic) -> Subscription {
        let id = Uuid::now_v7();
        let (sender, receiver) = broadcast::channel(self.inner.capacity);
        self.inner.subscribers.insert(
            id,
            SubscriberSlot {
                topic: topic.clone(),
                sender,
            },
        );
        debug!(subscriber = %id, ?topic, "subscribed to message bus");
        Subscription {
            id,
            topic,
            receiver,
            bus: Arc::downgrade(&self.inner),
        }
    }

    /// Remove a subscriber. Its pending `recv` (if any) returns `None` once
    /// the already-queued events are drained.
    ///
    /// Returns `true` if the subscriber was registered.
    pub fn unsubscribe(&self, id: Uuid) -> bool {
        let removed = self.inner.subscribers.remove(&id).is_some();
        if removed {
            debug!(subscriber = %id, "unsubscribed from message bus");
        }
        removed
    }

    /// Deliver `event` to every matching subscriber.
    ///
    /// Never blocks. Returns how many subscribers the event was queued for.
    pub fn publish(&self, event: impl Into<BusEvent>) -> usize {
        let event = event.into();
        let session_key = event.session_key();
        let mut delivered = 0;
        for slot in self.inner.subscribers.iter() {
            if !slot.topic.accepts(&event, &session_key) {
                continue;
            }
            if slot.sender.send(event.clone()).is_ok() {
                delivered += 1;
            }
        }
        debug!(session = %session_key, delivered, "published bus event");
        delivered
    }

    pub fn publish_inbound(&self, msg: InboundMessage) -> usize {
        self.publish(BusEvent::Inbound(msg))
    }

    pub fn publish_outbound(&self, msg: OutboundMessage) -> usize {
        self.publish(BusEvent::Outbound(msg))
    }

    pub fn subscriber_count(&self) -> usize {
        self.inner.subscribers.len()
    }

    pub fn capacity(&self) -> usize {
        self.inner.capacity
    }
}

impl Default for MessageBus {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for MessageBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MessageBus")
            .field("subscribers", &self.inner.subscribers.len())
            .field("capacity", &self.inner.capacity)
            .finish()
    }
}

/// Receiving end of a bus subscription.
///
/// Dropping it unsubscribes.
pub struct Subscription {
    id: Uuid,
    topic: Topic,
    receiver: broadcast::Receiver<BusEvent>,
    bus: Weak<BusInner>,
}

impl Subscription {
    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn topic(&self) -> &Topic {
        &self.topic
    }

    /// Wait for the next event.
    ///
    /// Returns `None` once the subscription has been removed (or the bus
    /// dropped) and the queue is drained. Events lost to overflow are
    /// skipped with a warning.
    pub async fn recv(&mut self) -> Option<BusEvent> {
        loop {
            match self.receiver.recv().await {
                Ok(event) => return Some(event),
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!(subscriber = %self.id, skipped, "subscriber lagged, dropped oldest events");
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }

    /// Take the next queued event without waiting.
    pub fn try_recv(&mut self) -> Option<BusEvent> {
        loop {
            match self.receiver.try_recv() {
                Ok(event) => return Some(event),
                Err(broadcast::error::TryRecvError::Lagged(skipped)) => {
                    warn!(subscriber = %self.id, skipped, "subscriber lagged, dropped oldest events");
                }
                Err(_) => return None,
            }
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(bus) = self.bus.upgrade() {
            bus.subscribers.remove(&self.id);
        }
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("id", &self.id)
            .field("topic", &self.topic)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tokio::task::JoinSet;

    fn inbound(chat_id: &str, content: &str) -> InboundMessage {
        InboundMessage::new("telegram", "user-1", chat_id, content)
    }

    fn content(event: &BusEvent) -> &str {
        match event {
            BusEvent::Inbound(msg) => &msg.content,
            BusEvent::Outbound(msg) => &msg.content,
        }
    }

    #[tokio::test]
    async fn publish_reaches_every_subscriber_once() {
        let bus = MessageBus::new();
        let mut a = bus.subscribe();
        let mut b = bus.subscribe();

        let delivered = bus.publish(inbound("1", "hello"));
        assert_eq!(delivered, 2);

        assert_eq!(content(&a.recv().await.unwrap()), "hello");
        assert_eq!(content(&b.recv().await.unwrap()), "hello");
        assert!(a.try_recv().is_none());
        assert!(b.try_recv().is_none());
    }

    #[tokio::test]
    async fn subscribers_see_only_later_events() {
        let bus = MessageBus::new();
        bus.publish(inbound("1", "before"));

        let mut late = bus.subscribe();
        assert!(late.try_recv().is_none());

        bus.publish(inbound("1", "after"));
        assert_eq!(content(&late.recv().await.unwrap()), "after");
    }

    #[tokio::test]
    async fn unsubscribed_consumer_receives_nothing_afterwards() {
        let bus = MessageBus::new();
        let mut gone = bus.subscribe();
        let mut stays = bus.subscribe();

        assert!(bus.unsubscribe(gone.id()));
        assert!(!bus.unsubscribe(gone.id()));

        assert_eq!(bus.publish(inbound("1", "later")), 1);
        assert!(gone.recv().await.is_none());
        assert_eq!(content(&stays.recv().await.unwrap()), "later");
    }

    #[tokio::test]
    async fn unsubscribe_wakes_pending_receiver() {
        let bus = MessageBus::new();
        let mut sub = bus.subscribe();
        let id = sub.id();

        let waiter = tokio::spawn(async move { sub.recv().await });
        tokio::time::sleep(Duration::from_millis(10)).await;
        bus.unsubscribe(id);

        let result = tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .expect("receiver should wake")
            .unwrap();
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn stalled_subscriber_does_not_block_publishers() {
        let bus = MessageBus::with_capacity(4);
        let mut stalled = bus.subscribe();
        let mut active = bus.subscribe();

        let mut received = Vec::new();
        for i in 0..100 {
            assert_eq!(bus.publish(inbound("1", &i.to_string())), 2);
            received.push(content(&active.recv().await.unwrap()).to_string());
        }
        let expected: Vec<String> = (0..100).map(|i| i.to_string()).collect();
        assert_eq!(received, expected);

        // The stalled subscriber kept only the newest events
        let mut tail = Vec::new();
        while let Some(event) = stalled.try_recv() {
            tail.push(content(&event).to_string());
        }
        assert_eq!(tail, vec!["96", "97", "98", "99"]);
    }

    #[tokio::test]
    async fn many_session_subscribers_each_get_their_chat() {
        let bus = MessageBus::new();
        let mut chats: Vec<_> = (0..5)
            .map(|i| bus.subscribe_to(Topic::Session(format!("telegram:{i}"))))
            .collect();
        let mut second_watcher = bus.subscribe_to(Topic::Session("telegram:3".to_string()));

        for i in 0..5 {
            let delivered = bus.publish_inbound(inbound(&i.to_string(), &format!("hello {i}")));
            assert_eq!(delivered, if i == 3 { 2 } else { 1 });
        }

        for (i, chat) in chats.iter_mut().enumerate() {
            assert_eq!(content(&chat.recv().await.unwrap()), format!("hello {i}"));
            assert!(chat.try_recv().is_none());
        }
        assert_eq!(content(&second_watcher.recv().await.unwrap()), "hello 3");
        assert!(Topic::Session("telegram:3".to_string()).matches(&BusEvent::Inbound(inbound("3", "x"))));
    }

    #[tokio::test]
    async fn topics_filter_events() {
        let bus = MessageBus::new();
        let mut inbound_only = bus.subscribe_to(Topic::Inbound);
        let mut outbound_only = bus.subscribe_to(Topic::Outbound);
        let mut one_chat = bus.subscribe_to(Topic::Session("telegram:42".to_string()));

        let turn = inbound("42", "question");
        bus.publish_inbound(turn.clone());
        bus.publish_inbound(inbound("7", "other chat"));
        bus.publish_outbound(OutboundMessage::reply_to(&turn, "answer"));

        assert_eq!(content(&inbound_only.recv().await.unwrap()), "question");
        assert_eq!(content(&inbound_only.recv().await.unwrap()), "other chat");
        assert!(inbound_only.try_recv().is_none());

        assert_eq!(content(&outbound_only.recv().await.unwrap()), "answer");
        assert!(outbound_only.try_recv().is_none());

        assert_eq!(content(&one_chat.recv().await.unwrap()), "question");
        assert_eq!(content(&one_chat.recv().await.unwrap()), "answer");
        assert!(one_chat.try_recv().is_none());
    }

    #[tokio::test]
    async fn dropping_subscription_unsubscribes() {
        let bus = MessageBus::new();
        let sub = bus.subscribe();
        assert_eq!(bus.subscriber_count(), 1);

        drop(sub);
        assert_eq!(bus.subscriber_count(), 0);
        assert_eq!(bus.publish(inbound("1", "nobody")), 0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_producers_keep_per_producer_order() {
        let bus = MessageBus::with_capacity(1024);
        let mut sub = bus.subscribe();

        let mut producers = JoinSet::new();
        for p in 0..8 {
            let bus = bus.clone();
            producers.spawn(async move {
                for i in 0..50 {
                    bus.publish(inbound(&p.to_string(), &i.to_string()));
                    tokio::task::yield_now().await;
                }
            });
        }
        while let Some(result) = producers.join_next().await {
            result.unwrap();
        }

        let mut last_seen = [-1i32; 8];
        let mut total = 0;
        while let Some(BusEvent::Inbound(msg)) = sub.try_recv() {
            let producer: usize = msg.chat_id.parse().unwrap();
            let seq: i32 = msg.content.parse().unwrap();
            assert!(seq > last_seen[producer]);
            last_seen[producer] = seq;
            total += 1;
        }
        assert_eq!(total, 400);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_subscribe_and_unsubscribe_is_safe() {
        let bus = MessageBus::new();
        let mut tasks = JoinSet::new();
        for _ in 0..32 {
            let bus = bus.clone();
            tasks.spawn(async move {
                let sub = bus.subscribe();
                bus.publish(inbound("1", "x"));
                bus.unsubscribe(sub.id());
            });
        }
        while let Some(result) = tasks.join_next().await {
            result.unwrap();
        }
        assert_eq!(bus.subscriber_count(), 0);
    }

    #[test]
    fn zero_capacity_is_clamped() {
        let bus = MessageBus::with_capacity(0);
        assert_eq!(bus.capacity(), 1);
        let _sub = bus.subscribe();
    }

    #[test]
    fn debug_impl() {
        let bus = MessageBus::new();
        let _sub = bus.subscribe();
        let debug = format!("{bus:?}");
        assert!(debug.contains("MessageBus"));
        assert!(debug.contains("subscribers"));
    }
}
