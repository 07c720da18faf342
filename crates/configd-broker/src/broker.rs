//! In-process publish/subscribe hub, fanning out published config updates to
//! every subscriber of a topic.
//!
//! Topic keys are `(org, app, env)` triples, canonicalized to a single
//! string to index the subscription map. Each subscriber owns a bounded
//! outbound queue; a full queue causes the message to be dropped for that
//! subscriber only, never blocking the publisher.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use configd_core::{ConfigResponse, Topic};
use parking_lot::Mutex;
use tokio::sync::mpsc;

/// Default bounded outbound queue capacity per subscriber.
pub const DEFAULT_QUEUE_CAPACITY: usize = 16;

type SubscriberId = u64;

/// In-process event broker. Cheap to clone; wrap in `Arc` and share across
/// request handlers.
pub struct EventBroker {
    topics: Mutex<HashMap<String, HashMap<SubscriberId, mpsc::Sender<ConfigResponse>>>>,
    next_id: AtomicU64,
    dropped: AtomicU64,
    queue_capacity: usize,
}

impl EventBroker {
    /// Construct a broker with the default per-subscriber queue capacity.
    pub fn new() -> Arc<Self> {
        Self::with_capacity(DEFAULT_QUEUE_CAPACITY)
    }

    /// Construct a broker with a custom per-subscriber queue capacity.
    pub fn with_capacity(queue_capacity: usize) -> Arc<Self> {
        Arc::new(Self {
            topics: Mutex::new(HashMap::new()),
            next_id: AtomicU64::new(0),
            dropped: AtomicU64::new(0),
            queue_capacity,
        })
    }

    /// Subscribe to a topic, allocating a bounded outbound queue.
    pub fn subscribe(self: &Arc<Self>, topic: &Topic) -> SubscriberHandle {
        let (tx, rx) = mpsc::channel(self.queue_capacity);
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let key = topic.canonical();

        self.topics
            .lock()
            .entry(key.clone())
            .or_default()
            .insert(id, tx);

        SubscriberHandle {
            id,
            topic_key: key,
            receiver: rx,
            broker: Arc::clone(self),
            closed: false,
        }
    }

    /// Remove a subscriber from a topic. Idempotent: unsubscribing twice, or
    /// unsubscribing an id that was never registered, is a no-op.
    pub fn unsubscribe(&self, topic_key: &str, id: SubscriberId) {
        let mut topics = self.topics.lock();
        if let Some(subs) = topics.get_mut(topic_key) {
            subs.remove(&id);
            if subs.is_empty() {
                topics.remove(topic_key);
            }
        }
    }

    /// Publish a message to every current subscriber of a topic.
    ///
    /// Non-blocking: a subscriber whose queue is full never stalls the
    /// publisher -- the message is dropped for that subscriber and the drop
    /// counter is incremented. Returns the number of subscribers the message
    /// was successfully enqueued for.
    pub fn publish(&self, topic: &Topic, message: ConfigResponse) -> usize {
        let key = topic.canonical();
        let mut topics = self.topics.lock();
        let Some(subs) = topics.get_mut(&key) else {
            return 0;
        };

        let mut delivered = 0;
        let mut dead = Vec::new();
        for (&id, tx) in subs.iter() {
            match tx.try_send(message.clone()) {
                Ok(()) => delivered += 1,
                Err(mpsc::error::TrySendError::Full(_)) => {
                    self.dropped.fetch_add(1, Ordering::Relaxed);
                    tracing::debug!(topic = %key, subscriber = id, "dropped message: queue full");
                }
                Err(mpsc::error::TrySendError::Closed(_)) => {
                    dead.push(id);
                }
            }
        }
        for id in dead {
            subs.remove(&id);
        }
        if subs.is_empty() {
            topics.remove(&key);
        }

        delivered
    }

    /// Number of subscribers currently registered across all topics.
    pub fn subscriber_count(&self, topic: &Topic) -> usize {
        self.topics
            .lock()
            .get(&topic.canonical())
            .map(|s| s.len())
            .unwrap_or(0)
    }

    /// Cumulative count of messages dropped due to a full subscriber queue.
    pub fn dropped_count(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

impl Default for EventBroker {
    fn default() -> Self {
        // `Arc::new` is performed by `new`/`with_capacity`; `Default` exists
        // only so the type can be used in contexts expecting it directly
        // (e.g. behind a test's own `Arc::new(EventBroker::default())`).
        Self {
            topics: Mutex::new(HashMap::new()),
            next_id: AtomicU64::new(0),
            dropped: AtomicU64::new(0),
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
        }
    }
}

/// A live subscription to a topic. Dropping the handle unsubscribes it.
pub struct SubscriberHandle {
    id: SubscriberId,
    topic_key: String,
    receiver: mpsc::Receiver<ConfigResponse>,
    broker: Arc<EventBroker>,
    closed: bool,
}

impl SubscriberHandle {
    /// Receive the next published message, or `None` once unsubscribed.
    pub async fn recv(&mut self) -> Option<ConfigResponse> {
        self.receiver.recv().await
    }

    /// Unsubscribe explicitly. Idempotent -- safe to call more than once, and
    /// safe to call before the handle is dropped (Drop will then no-op).
    pub fn unsubscribe(&mut self) {
        if self.closed {
            return;
        }
        self.broker.unsubscribe(&self.topic_key, self.id);
        self.closed = true;
    }
}

impl Drop for SubscriberHandle {
    fn drop(&mut self) {
        self.unsubscribe();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn topic() -> Topic {
        Topic::new("demo-org", "app", "prod")
    }

    fn response(version: i64) -> ConfigResponse {
        ConfigResponse {
            organization: "demo-org".into(),
            application: "app".into(),
            environment: "prod".into(),
            version,
            config: serde_json::json!({"v": version}),
            updated_at: chrono::Utc::now(),
        }
    }

    #[tokio::test]
    async fn publish_delivers_in_order() {
        let broker = EventBroker::new();
        let mut handle = broker.subscribe(&topic());

        broker.publish(&topic(), response(1));
        broker.publish(&topic(), response(2));

        assert_eq!(handle.recv().await.unwrap().version, 1);
        assert_eq!(handle.recv().await.unwrap().version, 2);
    }

    #[tokio::test]
    async fn publish_with_no_subscribers_returns_zero() {
        let broker = EventBroker::new();
        let delivered = broker.publish(&topic(), response(1));
        assert_eq!(delivered, 0);
    }

    #[tokio::test]
    async fn full_queue_drops_and_counts() {
        let broker = EventBroker::with_capacity(1);
        let mut handle = broker.subscribe(&topic());

        // First publish fills the one-slot queue.
        broker.publish(&topic(), response(1));
        // Second publish finds the queue full and must drop.
        broker.publish(&topic(), response(2));

        assert_eq!(broker.dropped_count(), 1);
        // The subscriber still gets the first message uncorrupted.
        assert_eq!(handle.recv().await.unwrap().version, 1);
    }

    #[tokio::test]
    async fn unsubscribe_is_idempotent() {
        let broker = EventBroker::new();
        let mut handle = broker.subscribe(&topic());
        assert_eq!(broker.subscriber_count(&topic()), 1);

        handle.unsubscribe();
        assert_eq!(broker.subscriber_count(&topic()), 0);

        // Second call must not panic or affect other subscribers.
        handle.unsubscribe();
        assert_eq!(broker.subscriber_count(&topic()), 0);
    }

    #[tokio::test]
    async fn drop_releases_subscription() {
        let broker = EventBroker::new();
        {
            let _handle = broker.subscribe(&topic());
            assert_eq!(broker.subscriber_count(&topic()), 1);
        }
        assert_eq!(broker.subscriber_count(&topic()), 0);
    }

    #[tokio::test]
    async fn independent_topics_do_not_interfere() {
        let broker = EventBroker::new();
        let topic_a = Topic::new("org", "app", "staging");
        let topic_b = Topic::new("org", "app", "prod");

        let mut handle_a = broker.subscribe(&topic_a);
        let mut handle_b = broker.subscribe(&topic_b);

        broker.publish(&topic_a, response(1));

        assert_eq!(handle_a.recv().await.unwrap().version, 1);
        assert!(handle_b.receiver.try_recv().is_err());
    }

    #[tokio::test]
    async fn multiple_subscribers_each_receive() {
        let broker = EventBroker::new();
        let mut h1 = broker.subscribe(&topic());
        let mut h2 = broker.subscribe(&topic());

        let delivered = broker.publish(&topic(), response(7));
        assert_eq!(delivered, 2);

        assert_eq!(h1.recv().await.unwrap().version, 7);
        assert_eq!(h2.recv().await.unwrap().version, 7);
    }
}
