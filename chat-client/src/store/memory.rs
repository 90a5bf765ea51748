//! In-memory message store.
//!
//! Reference implementation of [`MessageStore`] for tests and demos. Allows
//! forcing failures, holding live notifications in flight, and cancelling
//! subscriptions from the store side.

use super::{MessageStore, StoreError, SubscriberHub, Subscription};
use async_trait::async_trait;
use chat_types::{CollectionId, Message, SequenceKey, StoredMessage, SubscriptionId};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// In-memory append-only store.
///
/// Clones share the same log, so one clone can be handed to a feed while the
/// test keeps another to append "from other participants".
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    collection: CollectionId,
    inner: Arc<Mutex<MemoryStoreInner>>,
}

#[derive(Debug, Default)]
struct MemoryStoreInner {
    log: Vec<StoredMessage>,
    last_key: u64,
    hub: SubscriberHub,
    offline: bool,
    fail_next_append: Option<String>,
    fail_next_subscribe: Option<String>,
    held: Option<Vec<StoredMessage>>,
}

impl MemoryStore {
    /// Create an empty store for the default collection.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty store for a named collection.
    pub fn with_collection(collection: CollectionId) -> Self {
        Self {
            collection,
            inner: Arc::default(),
        }
    }

    fn lock(&self) -> MutexGuard<'_, MemoryStoreInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Snapshot of the committed log.
    pub fn messages(&self) -> Vec<StoredMessage> {
        self.lock().log.clone()
    }

    /// Number of committed messages.
    pub fn len(&self) -> usize {
        self.lock().log.len()
    }

    /// Whether nothing has been committed.
    pub fn is_empty(&self) -> bool {
        self.lock().log.is_empty()
    }

    /// Number of open subscriptions.
    pub fn subscriber_count(&self) -> usize {
        self.lock().hub.len()
    }

    /// Make every append and subscribe fail until set back to `false`.
    pub fn set_offline(&self, offline: bool) {
        self.lock().offline = offline;
    }

    /// Cause the next append() to fail with the given error.
    pub fn fail_next_append(&self, error: &str) {
        self.lock().fail_next_append = Some(error.to_string());
    }

    /// Cause the next subscribe() to fail with the given error.
    pub fn fail_next_subscribe(&self, error: &str) {
        self.lock().fail_next_subscribe = Some(error.to_string());
    }

    /// Keep assigning keys to appends but defer their commit and
    /// notification until [`release_deliveries`](Self::release_deliveries).
    pub fn hold_deliveries(&self) {
        let mut inner = self.lock();
        if inner.held.is_none() {
            inner.held = Some(Vec::new());
        }
    }

    /// Commit and publish every held append, in key order.
    ///
    /// Returns the number of messages released.
    pub fn release_deliveries(&self) -> usize {
        let mut inner = self.lock();
        let held = inner.held.take().unwrap_or_default();
        let count = held.len();
        for message in held {
            inner.hub.publish(&message);
            inner.log.push(message);
        }
        count
    }

    /// End every open subscription from the store side.
    pub fn cancel_subscriptions(&self, reason: &str) -> usize {
        self.lock().hub.cancel_all(reason)
    }

    /// Clear all state (log, subscriptions, forced failures).
    pub fn reset(&self) {
        *self.lock() = MemoryStoreInner::default();
    }
}

#[async_trait]
impl MessageStore for MemoryStore {
    fn collection(&self) -> &CollectionId {
        &self.collection
    }

    async fn append(&self, message: Message) -> Result<SequenceKey, StoreError> {
        let mut guard = self.lock();
        let inner = &mut *guard;

        if inner.offline {
            return Err(StoreError::Unavailable("store offline".into()));
        }
        // Check for forced failure
        if let Some(error) = inner.fail_next_append.take() {
            return Err(StoreError::Unavailable(error));
        }

        inner.last_key += 1;
        let stored = StoredMessage::new(SequenceKey::new(inner.last_key), message);
        let key = stored.key();

        if let Some(held) = inner.held.as_mut() {
            held.push(stored);
        } else {
            inner.hub.publish(&stored);
            inner.log.push(stored);
        }
        Ok(key)
    }

    async fn subscribe(&self, after: Option<SequenceKey>) -> Result<Subscription, StoreError> {
        let mut inner = self.lock();

        if inner.offline {
            return Err(StoreError::Unavailable("store offline".into()));
        }
        if let Some(error) = inner.fail_next_subscribe.take() {
            return Err(StoreError::Unavailable(error));
        }

        let backlog: Vec<StoredMessage> = inner
            .log
            .iter()
            .filter(|m| after.map_or(true, |after| m.key() > after))
            .cloned()
            .collect();
        Ok(inner.hub.open(after, backlog))
    }

    async fn unsubscribe(&self, id: SubscriptionId) {
        self.lock().hub.close(&id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::StoreEvent;

    fn text(body: &str, sender: &str) -> Message {
        Message::text(body, Some(sender))
    }

    // ===========================================
    // Append Tests
    // ===========================================

    #[tokio::test]
    async fn append_assigns_increasing_keys() {
        let store = MemoryStore::new();

        let k1 = store.append(text("one", "A")).await.unwrap();
        let k2 = store.append(text("two", "B")).await.unwrap();
        let k3 = store.append(text("three", "A")).await.unwrap();

        assert!(k1 < k2 && k2 < k3);
        assert_eq!(store.len(), 3);
    }

    #[tokio::test]
    async fn append_offline_fails() {
        let store = MemoryStore::new();
        store.set_offline(true);

        let result = store.append(text("hi", "A")).await;
        assert!(matches!(result, Err(StoreError::Unavailable(_))));
        assert!(store.is_empty());

        store.set_offline(false);
        store.append(text("hi", "A")).await.unwrap();
    }

    #[tokio::test]
    async fn forced_append_failure_affects_one_call() {
        let store = MemoryStore::new();
        store.fail_next_append("quota exceeded");

        let result = store.append(text("hi", "A")).await;
        assert_eq!(
            result,
            Err(StoreError::Unavailable("quota exceeded".into()))
        );

        // Next append should work
        store.append(text("hi", "A")).await.unwrap();
        assert_eq!(store.len(), 1);
    }

    // ===========================================
    // Subscribe Tests
    // ===========================================

    #[tokio::test]
    async fn subscribe_replays_backlog_then_caught_up() {
        let store = MemoryStore::new();
        store.append(text("one", "A")).await.unwrap();
        store.append(text("two", "B")).await.unwrap();

        let mut sub = store.subscribe(None).await.unwrap();

        let first = sub.next().await.unwrap();
        assert!(matches!(first, StoreEvent::Appended(m) if m.message.text.as_deref() == Some("one")));
        let second = sub.next().await.unwrap();
        assert!(matches!(second, StoreEvent::Appended(m) if m.message.text.as_deref() == Some("two")));
        assert_eq!(sub.next().await, Some(StoreEvent::CaughtUp));
    }

    #[tokio::test]
    async fn subscribe_after_key_skips_older_entries() {
        let store = MemoryStore::new();
        let k1 = store.append(text("one", "A")).await.unwrap();
        store.append(text("two", "B")).await.unwrap();

        let mut sub = store.subscribe(Some(k1)).await.unwrap();

        match sub.next().await {
            Some(StoreEvent::Appended(m)) => assert!(m.key() > k1),
            other => panic!("Expected Appended, got {:?}", other),
        }
        assert_eq!(sub.next().await, Some(StoreEvent::CaughtUp));
    }

    #[tokio::test]
    async fn live_appends_follow_caught_up() {
        let store = MemoryStore::new();
        let mut sub = store.subscribe(None).await.unwrap();
        assert_eq!(sub.next().await, Some(StoreEvent::CaughtUp));

        let key = store.append(text("live", "C")).await.unwrap();

        match sub.next().await {
            Some(StoreEvent::Appended(m)) => assert_eq!(m.key(), key),
            other => panic!("Expected Appended, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn forced_subscribe_failure() {
        let store = MemoryStore::new();
        store.fail_next_subscribe("network unreachable");

        let result = store.subscribe(None).await;
        assert!(matches!(result, Err(StoreError::Unavailable(_))));
        assert_eq!(store.subscriber_count(), 0);

        store.subscribe(None).await.unwrap();
        assert_eq!(store.subscriber_count(), 1);
    }

    #[tokio::test]
    async fn unsubscribe_is_idempotent() {
        let store = MemoryStore::new();
        let sub = store.subscribe(None).await.unwrap();

        store.unsubscribe(sub.id()).await;
        store.unsubscribe(sub.id()).await;
        store.unsubscribe(SubscriptionId::new()).await;

        assert_eq!(store.subscriber_count(), 0);
    }

    #[tokio::test]
    async fn unsubscribed_stream_ends() {
        let store = MemoryStore::new();
        let mut sub = store.subscribe(None).await.unwrap();
        store.unsubscribe(sub.id()).await;
        store.append(text("after", "A")).await.unwrap();

        assert_eq!(sub.next().await, Some(StoreEvent::CaughtUp));
        assert_eq!(sub.next().await, None);
    }

    // ===========================================
    // Held Delivery and Cancellation Tests
    // ===========================================

    #[tokio::test]
    async fn held_appends_are_released_in_order() {
        let store = MemoryStore::new();
        let mut sub = store.subscribe(None).await.unwrap();
        assert_eq!(sub.next().await, Some(StoreEvent::CaughtUp));

        store.hold_deliveries();
        let k1 = store.append(text("one", "A")).await.unwrap();
        let k2 = store.append(text("two", "A")).await.unwrap();
        assert!(sub.try_next().is_none());
        assert!(store.is_empty());

        assert_eq!(store.release_deliveries(), 2);

        let keys: Vec<_> = [sub.try_next(), sub.try_next()]
            .into_iter()
            .map(|e| match e {
                Some(StoreEvent::Appended(m)) => m.key(),
                other => panic!("Expected Appended, got {:?}", other),
            })
            .collect();
        assert_eq!(keys, vec![k1, k2]);
    }

    #[tokio::test]
    async fn cancel_subscriptions_sends_cancelled() {
        let store = MemoryStore::new();
        let mut sub = store.subscribe(None).await.unwrap();

        assert_eq!(store.cancel_subscriptions("permission denied"), 1);

        assert_eq!(sub.next().await, Some(StoreEvent::CaughtUp));
        assert_eq!(
            sub.next().await,
            Some(StoreEvent::Cancelled {
                reason: "permission denied".into()
            })
        );
        assert_eq!(sub.next().await, None);
    }

    // ===========================================
    // Clone and Shared State Tests
    // ===========================================

    #[tokio::test]
    async fn clone_shares_state() {
        let store1 = MemoryStore::new();
        let store2 = store1.clone();

        store1.append(text("from 1", "A")).await.unwrap();
        store2.append(text("from 2", "B")).await.unwrap();

        assert_eq!(store1.messages().len(), 2);
        assert_eq!(store2.messages(), store1.messages());
    }

    #[tokio::test]
    async fn reset_clears_all() {
        let store = MemoryStore::new();
        store.append(text("x", "A")).await.unwrap();
        let _sub = store.subscribe(None).await.unwrap();
        store.fail_next_append("boom");

        store.reset();

        assert!(store.is_empty());
        assert_eq!(store.subscriber_count(), 0);
        store.append(text("y", "A")).await.unwrap();
    }

    #[test]
    fn named_collection() {
        let store = MemoryStore::with_collection(CollectionId::new("lobby").unwrap());
        assert_eq!(store.collection().as_str(), "lobby");
    }
}
