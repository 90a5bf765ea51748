//! # chat-store
//!
//! Durable message store for friendlychat.
//!
//! This crate provides [`SqliteStore`], a [`MessageStore`](chat_client::MessageStore)
//! backed by SQLite:
//! - Assigns per-collection sequence keys atomically
//! - Replays history after a key, then streams live appends
//! - Picks up rows written by other processes sharing the database file
//!
//! ## Layout
//!
//! ```text
//! ChatFeed ──► SqliteStore ──► SQLite (WAL)
//!                  │
//!                  └── SubscriberHub (in-process fan-out)
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod config;
pub mod error;
pub mod sqlite;

pub use config::{Config, ConfigError, FeedSection, StorageConfig};
pub use error::{StorageError, StorageResult};
pub use sqlite::SqliteStore;
