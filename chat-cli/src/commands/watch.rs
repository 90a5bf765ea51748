//! Follow the chat live.

use anyhow::{Context, Result};
use chat_client::{ChatFeed, FeedConfig, FeedError, FeedObserver, MessageStore};
use chat_core::FeedState;
use chat_types::StoredMessage;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::time;

use super::{format_message, Backend};

const MIN_POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Prints every feed callback.
struct PrintObserver;

impl FeedObserver for PrintObserver {
    fn on_caught_up(&self) {
        eprintln!("-- live --");
    }

    fn on_message_appended(&self, message: &StoredMessage) {
        println!("{}", format_message(message));
    }

    fn on_feed_error(&self, error: &FeedError) {
        eprintln!("Feed error: {}", error);
    }
}

/// Run the watch command.
pub async fn run(backend: &Backend, config: FeedConfig, poll_interval: Duration) -> Result<()> {
    match backend {
        Backend::Sqlite(store) => {
            let poller = Arc::clone(store);
            follow(Arc::clone(store), config, poll_interval, move || {
                let store = Arc::clone(&poller);
                async move {
                    if let Err(error) = store.refresh().await {
                        tracing::warn!(%error, "refresh failed");
                    }
                }
            })
            .await
        }
        // Nothing else can append to a process-local store
        Backend::Mock(_) => anyhow::bail!("watch needs the database; --mock is not supported"),
    }
}

/// Common watch logic for any store.
///
/// `tick` runs every `poll_interval` while the feed is live.
async fn follow<S, F, Fut>(
    store: Arc<S>,
    config: FeedConfig,
    poll_interval: Duration,
    tick: F,
) -> Result<()>
where
    S: MessageStore + 'static,
    F: Fn() -> Fut,
    Fut: Future<Output = ()>,
{
    let feed = ChatFeed::with_config(store, Arc::new(PrintObserver), config);
    feed.start().await.context("Failed to subscribe")?;
    tracing::info!(collection = %feed.store().collection(), "watching, Ctrl+C to stop");

    // tokio panics on a zero period
    let mut interval = time::interval(poll_interval.max(MIN_POLL_INTERVAL));
    loop {
        tokio::select! {
            _ = interval.tick() => {
                tick().await;
                if feed.state().await == FeedState::Idle {
                    anyhow::bail!("subscription ended by the store");
                }
            }
            _ = tokio::signal::ctrl_c() => {
                eprintln!("Shutting down...");
                break;
            }
        }
    }

    feed.stop().await;
    Ok(())
}
