//! # chat-types
//!
//! Message and ordering types shared by all friendlychat crates:
//! - [`Message`], [`MessageKind`], [`StoredMessage`] - chat content and its committed form
//! - [`SequenceKey`], [`CollectionId`], [`SubscriptionId`] - ordering and identity types
//! - [`ChatError`] - validation and parsing errors

#![warn(missing_docs)]
#![warn(clippy::all)]

mod error;
mod ids;
mod message;

pub use error::ChatError;
pub use ids::{CollectionId, SequenceKey, SubscriptionId, DEFAULT_COLLECTION};
pub use message::{Message, MessageKind, StoredMessage, ANONYMOUS, DEFAULT_MSG_LENGTH_LIMIT};
