//! # chat-client
//!
//! Live message feed for friendlychat.
//!
//! This is the library display layers use to show a shared chat log.
//!
//! ## Features
//!
//! - **Ordered live view**: messages appear in store-commit order, never twice
//! - **Explicit lifecycle**: `start()` / `stop()` replace listener attach/detach
//! - **Store Abstraction**: Pluggable append-only store (in-memory, SQLite)
//! - **Pure State Machine**: Uses chat-core for side-effect-free logic
//!
//! ## Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use chat_client::{ChannelObserver, ChatFeed, MemoryStore};
//! use chat_types::Message;
//!
//! let store = Arc::new(MemoryStore::new());
//! let (observer, mut events) = ChannelObserver::new();
//! let feed = ChatFeed::new(store, Arc::new(observer));
//!
//! feed.start().await?;
//! feed.post(Message::text("hi", Some("A"))).await?;
//! let event = events.recv().await;
//! feed.stop().await;
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod compose;
pub mod feed;
pub mod observer;
pub mod store;

pub use compose::{
    ComposeError, Composer, DataUrlResolver, IdentityProvider, MediaError, MediaResolver,
    StaticIdentity, DEFAULT_IMAGE_MIME,
};
pub use feed::{ChatFeed, ErrorKind, FeedConfig, FeedError};
pub use observer::{ChannelObserver, FeedEvent, FeedObserver};
pub use store::{MemoryStore, MessageStore, StoreError, StoreEvent, SubscriberHub, Subscription};
