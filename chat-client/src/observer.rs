//! Observer interface for the display layer.
//!
//! A feed drives exactly one observer. Callbacks run one at a time, in store
//! order, while the feed holds its state lock: an observer must return
//! quickly and must not call back into the feed.

use chat_types::StoredMessage;
use tokio::sync::mpsc;

use crate::feed::FeedError;

/// Receives the feed's callbacks.
///
/// Per subscription: zero or one `on_caught_up`, any number of
/// `on_message_appended`, and at most one `on_feed_error` which ends it.
/// There is no "closed" callback; `stop()` ends delivery silently.
pub trait FeedObserver: Send + Sync {
    /// The initial backlog has been rendered (hide loading indicators).
    fn on_caught_up(&self) {}

    /// A message was appended to the view.
    fn on_message_appended(&self, message: &StoredMessage);

    /// The subscription failed asynchronously and the feed is idle again.
    fn on_feed_error(&self, error: &FeedError) {
        let _ = error;
    }
}

/// One observer callback, as recorded by [`ChannelObserver`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FeedEvent {
    /// `on_caught_up` was called.
    CaughtUp,
    /// `on_message_appended` was called.
    MessageAppended(StoredMessage),
    /// `on_feed_error` was called.
    Error(FeedError),
}

/// Observer forwarding every callback into an unbounded channel.
///
/// Delivery never blocks the feed; the receiver drains at its own pace.
#[derive(Debug, Clone)]
pub struct ChannelObserver {
    tx: mpsc::UnboundedSender<FeedEvent>,
}

impl ChannelObserver {
    /// Create an observer and the receiver its events go to.
    pub fn new() -> (Self, mpsc::UnboundedReceiver<FeedEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    fn forward(&self, event: FeedEvent) {
        // A dropped receiver means nobody is displaying the feed anymore
        let _ = self.tx.send(event);
    }
}

impl FeedObserver for ChannelObserver {
    fn on_caught_up(&self) {
        self.forward(FeedEvent::CaughtUp);
    }

    fn on_message_appended(&self, message: &StoredMessage) {
        self.forward(FeedEvent::MessageAppended(message.clone()));
    }

    fn on_feed_error(&self, error: &FeedError) {
        self.forward(FeedEvent::Error(error.clone()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::StoreError;
    use chat_types::{Message, SequenceKey};

    #[test]
    fn channel_observer_forwards_in_call_order() {
        let (observer, mut rx) = ChannelObserver::new();
        let message = StoredMessage::new(SequenceKey::new(1), Message::text("hi", Some("A")));
        let error = FeedError::Store(StoreError::Unavailable("gone".into()));

        observer.on_caught_up();
        observer.on_message_appended(&message);
        observer.on_feed_error(&error);

        assert_eq!(rx.try_recv().unwrap(), FeedEvent::CaughtUp);
        assert_eq!(rx.try_recv().unwrap(), FeedEvent::MessageAppended(message));
        assert_eq!(rx.try_recv().unwrap(), FeedEvent::Error(error));
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn channel_observer_survives_dropped_receiver() {
        let (observer, rx) = ChannelObserver::new();
        drop(rx);
        observer.on_caught_up();
    }

    #[test]
    fn default_callbacks_are_optional() {
        struct Count(std::sync::atomic::AtomicUsize);
        impl FeedObserver for Count {
            fn on_message_appended(&self, _: &StoredMessage) {
                self.0.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
            }
        }

        let observer = Count(Default::default());
        observer.on_caught_up();
        observer.on_feed_error(&FeedError::Store(StoreError::Unavailable("x".into())));
        observer.on_message_appended(&StoredMessage::new(
            SequenceKey::new(1),
            Message::text("hi", None),
        ));
        assert_eq!(observer.0.load(std::sync::atomic::Ordering::SeqCst), 1);
    }
}
