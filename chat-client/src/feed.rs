//! ChatFeed - the live message view for friendlychat.
//!
//! This module provides [`ChatFeed`], which keeps a local ordered copy of a
//! shared append-only message log and forwards every new entry to a single
//! [`FeedObserver`].
//!
//! # Architecture
//!
//! ChatFeed uses a pure state machine (from chat-core) for lifecycle logic
//! and interprets its actions to perform store calls via the MessageStore
//! trait.
//!
//! ```text
//! Display layer → ChatFeed → MessageStore → backend
//!        ↑           ↓
//!    observer   chat-core (pure state machine)
//! ```
//!
//! One pump task per subscription moves store events into the feed. Every
//! mutation of the view, the resume position and the state happens under one
//! lock, and each subscription carries a generation number: an event whose
//! generation is no longer current is dropped, so nothing is delivered after
//! `stop()` returns.
//!
//! # Example
//!
//! ```ignore
//! use chat_client::{ChatFeed, ChannelObserver, MemoryStore};
//!
//! let (observer, mut events) = ChannelObserver::new();
//! let feed = ChatFeed::new(Arc::new(MemoryStore::new()), Arc::new(observer));
//!
//! feed.start().await?;
//! feed.post(Message::text("hi", Some("A"))).await?;
//! feed.stop().await;
//! ```

use std::future::Future;
use std::sync::{Arc, PoisonError};
use std::time::Duration;

use chat_core::{Action, Event, FeedState, ResumeTracker, Signal};
use chat_types::{ChatError, Message, SequenceKey, StoredMessage, SubscriptionId};
use thiserror::Error;
use tokio::sync::Mutex;
use tokio::task::AbortHandle;

use crate::observer::FeedObserver;
use crate::store::{MessageStore, StoreError, StoreEvent, Subscription};

/// Feed errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FeedError {
    /// Message failed validation; nothing was sent to the store.
    #[error(transparent)]
    InvalidMessage(#[from] ChatError),

    /// Store error.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// A store call exceeded its configured timeout and was cancelled.
    #[error("{operation} timed out after {after:?}")]
    Timeout {
        /// The store operation (`subscribe` or `append`).
        operation: &'static str,
        /// The configured limit.
        after: Duration,
    },
}

/// Coarse classification display layers act on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Transient backend failure; retrying may succeed.
    StoreUnavailable,
    /// Caller bug; retrying the same message will fail again.
    InvalidMessage,
}

impl FeedError {
    /// Classify this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidMessage(_) => ErrorKind::InvalidMessage,
            Self::Store(_) | Self::Timeout { .. } => ErrorKind::StoreUnavailable,
        }
    }
}

/// Configuration for ChatFeed.
#[derive(Debug, Clone)]
pub struct FeedConfig {
    /// Limit for `subscribe` (None = wait indefinitely).
    pub subscribe_timeout: Option<Duration>,
    /// Limit for `append` (None = wait indefinitely).
    pub append_timeout: Option<Duration>,
    /// Resume after the last seen key on restart. When false, every
    /// `start()` clears the view and replays the whole log.
    pub resume_on_restart: bool,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            subscribe_timeout: None,
            append_timeout: None,
            resume_on_restart: true,
        }
    }
}

impl FeedConfig {
    /// Set the subscribe timeout.
    pub fn with_subscribe_timeout(mut self, timeout: Duration) -> Self {
        self.subscribe_timeout = Some(timeout);
        self
    }

    /// Set the append timeout.
    pub fn with_append_timeout(mut self, timeout: Duration) -> Self {
        self.append_timeout = Some(timeout);
        self
    }

    /// Choose between resuming by position and full resync on restart.
    pub fn with_resume_on_restart(mut self, resume: bool) -> Self {
        self.resume_on_restart = resume;
        self
    }
}

/// The live feed.
///
/// Manages the single subscription, the ordered view and observer delivery.
pub struct ChatFeed<S: MessageStore + 'static> {
    store: Arc<S>,
    config: FeedConfig,
    observer: Arc<dyn FeedObserver>,
    inner: Arc<Mutex<FeedInner>>,
    /// Abort handle of the current pump task. Kept outside `inner` so drop
    /// can reach it while the pump holds the feed lock.
    pump: std::sync::Mutex<Option<AbortHandle>>,
}

#[derive(Default)]
struct FeedInner {
    state: FeedState,
    messages: Vec<StoredMessage>,
    resume: ResumeTracker,
    /// Bumped whenever a subscription is requested or torn down.
    generation: u64,
    active: Option<SubscriptionId>,
}

impl FeedInner {
    /// Run an event through the state machine, performing view and observer
    /// actions in place. Store actions are returned for the caller to run
    /// outside the lock.
    fn dispatch(
        &mut self,
        event: Event,
        mut delivered: Option<StoredMessage>,
        observer: &dyn FeedObserver,
    ) -> Vec<Action> {
        let (next, actions) = self.state.on_event(event);
        self.state = next;

        let mut store_actions = Vec::new();
        for action in actions {
            match action {
                Action::ApplyMessage { key } => {
                    if let Some(message) = delivered.take().filter(|m| m.key() == key) {
                        self.apply(message, observer);
                    }
                }
                Action::EmitSignal(Signal::CaughtUp) => observer.on_caught_up(),
                Action::EmitSignal(Signal::Failed { error }) => {
                    observer.on_feed_error(&FeedError::Store(StoreError::Unavailable(error)));
                }
                Action::Subscribe | Action::Unsubscribe => store_actions.push(action),
            }
        }
        store_actions
    }

    fn apply(&mut self, message: StoredMessage, observer: &dyn FeedObserver) {
        let key = message.key();
        if !self.resume.accept(key) {
            tracing::warn!(
                %key,
                position = ?self.resume.position(),
                "dropping stale message"
            );
            return;
        }
        observer.on_message_appended(&message);
        self.messages.push(message);
    }
}

impl<S: MessageStore + 'static> ChatFeed<S> {
    /// Create a feed with the default configuration.
    pub fn new(store: Arc<S>, observer: Arc<dyn FeedObserver>) -> Self {
        Self::with_config(store, observer, FeedConfig::default())
    }

    /// Create a feed with an explicit configuration.
    pub fn with_config(store: Arc<S>, observer: Arc<dyn FeedObserver>, config: FeedConfig) -> Self {
        Self {
            store,
            config,
            observer,
            inner: Arc::new(Mutex::new(FeedInner::default())),
            pump: std::sync::Mutex::new(None),
        }
    }

    /// Resume after a persisted key instead of replaying the whole log.
    pub fn with_resume_position(self, key: SequenceKey) -> Self {
        // Freshly built, nobody else holds the lock
        if let Ok(mut inner) = self.inner.try_lock() {
            inner.resume = ResumeTracker::with_position(key);
        }
        self
    }

    /// Subscribe and begin delivering messages.
    ///
    /// A no-op if the feed is already starting or live. A subscribe failure
    /// is returned here and leaves the feed idle; it is not retried.
    pub async fn start(&self) -> Result<(), FeedError> {
        let (generation, after) = {
            let mut inner = self.inner.lock().await;
            let actions = inner.dispatch(Event::StartRequested, None, &*self.observer);
            if !actions.contains(&Action::Subscribe) {
                tracing::debug!(state = ?inner.state, "start ignored, feed already active");
                return Ok(());
            }
            if !self.config.resume_on_restart {
                inner.messages.clear();
                inner.resume.reset();
            }
            inner.generation += 1;
            (inner.generation, inner.resume.position())
        };

        tracing::info!(
            collection = %self.store.collection(),
            after = ?after,
            "subscribing"
        );
        let result = with_timeout(
            self.config.subscribe_timeout,
            "subscribe",
            self.store.subscribe(after),
        )
        .await;

        let mut inner = self.inner.lock().await;
        if inner.generation != generation {
            // stop() won the race against the in-flight subscribe
            drop(inner);
            if let Ok(subscription) = result {
                tracing::debug!(id = %subscription.id(), "discarding cancelled subscription");
                self.store.unsubscribe(subscription.id()).await;
            }
            return Ok(());
        }

        match result {
            Ok(subscription) => {
                let id = subscription.id();
                let pump = tokio::spawn(pump(
                    Arc::clone(&self.inner),
                    Arc::clone(&self.observer),
                    Arc::clone(&self.store),
                    subscription,
                    generation,
                ));
                inner.active = Some(id);
                self.replace_pump(Some(pump.abort_handle()));
                tracing::debug!(%id, "subscription active");
                Ok(())
            }
            Err(error) => {
                tracing::warn!(%error, "subscribe failed");
                inner.dispatch(
                    Event::SubscribeFailed {
                        error: error.to_string(),
                    },
                    None,
                    &*self.observer,
                );
                Err(error)
            }
        }
    }

    /// Tear down the subscription.
    ///
    /// After this returns the observer receives nothing more, even if the
    /// store had events in flight. Keeps the view and resume position.
    pub async fn stop(&self) {
        let active = {
            let mut inner = self.inner.lock().await;
            let actions = inner.dispatch(Event::StopRequested, None, &*self.observer);
            if !actions.contains(&Action::Unsubscribe) {
                return;
            }
            inner.generation += 1;
            self.replace_pump(None);
            inner.active.take()
        };

        if let Some(id) = active {
            self.store.unsubscribe(id).await;
            tracing::info!(%id, "unsubscribed");
        }
    }

    /// Validate a message and append it to the store.
    ///
    /// The message is not added to the view here; it appears when the store
    /// delivers it through the subscription.
    pub async fn post(&self, message: Message) -> Result<SequenceKey, FeedError> {
        message.validate()?;
        let key = with_timeout(
            self.config.append_timeout,
            "append",
            self.store.append(message),
        )
        .await?;
        tracing::debug!(%key, "message appended");
        Ok(key)
    }

    /// Drop the local view. The subscription and resume position are kept.
    pub async fn clear(&self) {
        self.inner.lock().await.messages.clear();
    }

    /// Drop the local view and forget the resume position, so the next
    /// `start()` replays the whole log.
    pub async fn reset(&self) {
        let mut inner = self.inner.lock().await;
        inner.messages.clear();
        inner.resume.reset();
    }

    /// Snapshot of the ordered view.
    pub async fn messages(&self) -> Vec<StoredMessage> {
        self.inner.lock().await.messages.clone()
    }

    /// Number of messages in the view.
    pub async fn len(&self) -> usize {
        self.inner.lock().await.messages.len()
    }

    /// Whether the view is empty.
    pub async fn is_empty(&self) -> bool {
        self.inner.lock().await.messages.is_empty()
    }

    /// Current lifecycle state.
    pub async fn state(&self) -> FeedState {
        self.inner.lock().await.state
    }

    /// Last key applied to the view.
    pub async fn resume_position(&self) -> Option<SequenceKey> {
        self.inner.lock().await.resume.position()
    }

    /// Get a reference to the underlying store.
    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    /// Swap the tracked pump task, aborting the previous one.
    fn replace_pump(&self, next: Option<AbortHandle>) {
        let mut slot = self.pump.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(previous) = std::mem::replace(&mut *slot, next) {
            previous.abort();
        }
    }

    /// Get the active configuration.
    pub fn config(&self) -> &FeedConfig {
        &self.config
    }
}

impl<S: MessageStore + 'static> Drop for ChatFeed<S> {
    fn drop(&mut self) {
        // Without an async context the store cannot be told; dropping the
        // receiver lets it prune the subscription on its next publish.
        self.replace_pump(None);
    }
}

/// Move store events into the feed until the subscription ends or is
/// superseded.
async fn pump<S: MessageStore + 'static>(
    inner: Arc<Mutex<FeedInner>>,
    observer: Arc<dyn FeedObserver>,
    store: Arc<S>,
    mut subscription: Subscription,
    generation: u64,
) {
    let id = subscription.id();
    loop {
        let event = subscription.next().await;
        let mut guard = inner.lock().await;
        if guard.generation != generation {
            tracing::debug!(%id, "dropping event for superseded subscription");
            return;
        }

        let reason = match event {
            Some(StoreEvent::Appended(message)) => {
                let key = message.key();
                guard.dispatch(Event::MessageReceived { key }, Some(message), &*observer);
                continue;
            }
            Some(StoreEvent::CaughtUp) => {
                guard.dispatch(Event::CaughtUp, None, &*observer);
                continue;
            }
            Some(StoreEvent::Cancelled { reason }) => reason,
            None => "subscription stream closed".to_string(),
        };

        tracing::warn!(%id, %reason, "subscription ended by store");
        guard.dispatch(Event::StreamFailed { error: reason }, None, &*observer);
        guard.generation += 1;
        let owned = guard.active.take().is_some();
        drop(guard);

        if owned {
            store.unsubscribe(id).await;
        }
        return;
    }
}

/// Run a store call, cancelling it if the configured limit elapses.
async fn with_timeout<T>(
    limit: Option<Duration>,
    operation: &'static str,
    call: impl Future<Output = Result<T, StoreError>>,
) -> Result<T, FeedError> {
    match limit {
        None => Ok(call.await?),
        Some(after) => match tokio::time::timeout(after, call).await {
            Ok(result) => Ok(result?),
            Err(_) => Err(FeedError::Timeout { operation, after }),
        },
    }
}
