//! Message store abstraction for friendlychat.
//!
//! This module provides a pluggable store layer over a remote, append-only,
//! ordered collection of messages (in-memory for tests and demos, SQLite in
//! `chat-store`).
//!
//! # Design
//!
//! The store trait is async and subscription-oriented:
//! - `append()` commits a message and returns its assigned key
//! - `subscribe()` replays everything after a key, then streams live appends
//! - `unsubscribe()` releases a subscription (idempotent)
//!
//! # Example
//!
//! ```ignore
//! let store = MemoryStore::new();
//! let key = store.append(Message::text("hi", Some("A"))).await?;
//! let mut sub = store.subscribe(None).await?;
//! while let Some(event) = sub.next().await { /* ... */ }
//! store.unsubscribe(sub.id()).await;
//! ```

mod hub;
mod memory;

pub use hub::SubscriberHub;
pub use memory::MemoryStore;

use async_trait::async_trait;
use chat_types::{CollectionId, Message, SequenceKey, StoredMessage, SubscriptionId};
use thiserror::Error;
use tokio::sync::mpsc;

/// Store errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    /// The store cannot be reached or refused the operation.
    #[error("store unavailable: {0}")]
    Unavailable(String),

    /// The store returned data that does not decode into a message.
    #[error("corrupt store data: {0}")]
    Corrupt(String),
}

/// One notification on a subscription.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreEvent {
    /// A message was appended (replayed backlog or live).
    Appended(StoredMessage),
    /// The backlog has been fully replayed; later events are live.
    CaughtUp,
    /// The store ended the subscription. No further events follow.
    Cancelled {
        /// Reason reported by the store.
        reason: String,
    },
}

/// Receiving end of a subscription.
///
/// Events arrive in ascending key order. The stream ends after
/// [`StoreEvent::Cancelled`] or once the store releases the subscription.
#[derive(Debug)]
pub struct Subscription {
    id: SubscriptionId,
    events: mpsc::UnboundedReceiver<StoreEvent>,
}

impl Subscription {
    /// Wrap a receiver the store feeds for subscription `id`.
    pub fn new(id: SubscriptionId, events: mpsc::UnboundedReceiver<StoreEvent>) -> Self {
        Self { id, events }
    }

    /// Handle to pass to [`MessageStore::unsubscribe`].
    pub fn id(&self) -> SubscriptionId {
        self.id
    }

    /// Wait for the next event. `None` once the stream has ended.
    pub async fn next(&mut self) -> Option<StoreEvent> {
        self.events.recv().await
    }

    /// Take the next event if one is already buffered.
    pub fn try_next(&mut self) -> Option<StoreEvent> {
        self.events.try_recv().ok()
    }
}

/// Append-only ordered message collection.
///
/// Implementations own key assignment: every key returned by `append` is
/// strictly greater than all keys assigned before it in the same collection.
#[async_trait]
pub trait MessageStore: Send + Sync {
    /// The collection this store reads and writes.
    fn collection(&self) -> &CollectionId;

    /// Commit a message and notify active subscriptions.
    ///
    /// Fails with [`StoreError::Unavailable`] if the store cannot be reached.
    async fn append(&self, message: Message) -> Result<SequenceKey, StoreError>;

    /// Open a subscription delivering every message with key > `after`,
    /// then [`StoreEvent::CaughtUp`], then live appends.
    ///
    /// Connection failures are reported here, once, not per event.
    async fn subscribe(&self, after: Option<SequenceKey>) -> Result<Subscription, StoreError>;

    /// Release a subscription. Safe to call repeatedly or on an ended stream.
    async fn unsubscribe(&self, id: SubscriptionId);
}

#[async_trait]
impl<S: MessageStore + ?Sized> MessageStore for std::sync::Arc<S> {
    fn collection(&self) -> &CollectionId {
        (**self).collection()
    }

    async fn append(&self, message: Message) -> Result<SequenceKey, StoreError> {
        (**self).append(message).await
    }

    async fn subscribe(&self, after: Option<SequenceKey>) -> Result<Subscription, StoreError> {
        (**self).subscribe(after).await
    }

    async fn unsubscribe(&self, id: SubscriptionId) {
        (**self).unsubscribe(id).await
    }
}
