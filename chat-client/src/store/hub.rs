//! Fan-out of committed messages to open subscriptions.
//!
//! The hub is not synchronized itself; a store keeps it under the same lock
//! that serializes key assignment, so publish order always equals key order
//! and a subscription opened under that lock sees no gap between its replayed
//! backlog and its first live event.

use std::collections::HashMap;

use chat_types::{SequenceKey, StoredMessage, SubscriptionId};
use tokio::sync::mpsc;

use super::{StoreEvent, Subscription};

/// Registry of live subscriptions for one collection.
#[derive(Debug, Default)]
pub struct SubscriberHub {
    subscribers: HashMap<SubscriptionId, Subscriber>,
}

#[derive(Debug)]
struct Subscriber {
    tx: mpsc::UnboundedSender<StoreEvent>,
    /// Keys at or below this are never delivered live.
    after: Option<SequenceKey>,
}

impl Subscriber {
    fn wants(&self, message: &StoredMessage) -> bool {
        self.after.map_or(true, |after| message.key() > after)
    }
}

impl SubscriberHub {
    /// Create an empty hub.
    pub fn new() -> Self {
        Self::default()
    }

    /// Open a subscription: queue the backlog and `CaughtUp`, then register
    /// it for live appends with key > `after`.
    pub fn open(
        &mut self,
        after: Option<SequenceKey>,
        backlog: impl IntoIterator<Item = StoredMessage>,
    ) -> Subscription {
        let (tx, rx) = mpsc::unbounded_channel();
        let id = SubscriptionId::new();

        for message in backlog {
            // Receiver is still in scope, cannot fail
            let _ = tx.send(StoreEvent::Appended(message));
        }
        let _ = tx.send(StoreEvent::CaughtUp);

        self.subscribers.insert(id, Subscriber { tx, after });
        Subscription::new(id, rx)
    }

    /// Deliver a committed message to every subscriber.
    ///
    /// Subscribers whose receiver was dropped are pruned. Subscribers that
    /// opened after this key skip it. Returns the number of subscribers
    /// reached.
    pub fn publish(&mut self, message: &StoredMessage) -> usize {
        let mut reached = 0;
        self.subscribers.retain(|_, sub| {
            if !sub.wants(message) {
                return !sub.tx.is_closed();
            }
            let sent = sub.tx.send(StoreEvent::Appended(message.clone())).is_ok();
            reached += usize::from(sent);
            sent
        });
        reached
    }

    /// Release one subscription. Returns `false` if it was not registered.
    ///
    /// Events already queued stay readable; nothing new is sent.
    pub fn close(&mut self, id: &SubscriptionId) -> bool {
        self.subscribers.remove(id).is_some()
    }

    /// End every subscription with [`StoreEvent::Cancelled`].
    pub fn cancel_all(&mut self, reason: &str) -> usize {
        let count = self.subscribers.len();
        for (_, sub) in self.subscribers.drain() {
            let _ = sub.tx.send(StoreEvent::Cancelled {
                reason: reason.to_string(),
            });
        }
        count
    }

    /// Number of registered subscriptions.
    pub fn len(&self) -> usize {
        self.subscribers.len()
    }

    /// Whether no subscription is registered.
    pub fn is_empty(&self) -> bool {
        self.subscribers.is_empty()
    }
}
