//! Composing outgoing messages.
//!
//! A [`Composer`] ties a feed to the two pieces of context a display layer
//! normally supplies: who is sending ([`IdentityProvider`]) and where picked
//! images end up ([`MediaResolver`]).

use std::sync::Arc;

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine};
use chat_types::{ChatError, Message, SequenceKey, ANONYMOUS};
use thiserror::Error;

use crate::feed::{ChatFeed, FeedError};
use crate::store::MessageStore;

/// MIME type assumed for picked images.
pub const DEFAULT_IMAGE_MIME: &str = "image/jpeg";

/// Default cap for inline images (5 MiB).
const DEFAULT_MAX_INLINE_BYTES: usize = 5 * 1024 * 1024;

/// Media errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MediaError {
    /// No bytes to upload.
    #[error("media is empty")]
    Empty,

    /// Content exceeds the resolver's limit.
    #[error("media too large: {size} bytes (limit {limit})")]
    TooLarge {
        /// Content size in bytes.
        size: usize,
        /// Configured limit in bytes.
        limit: usize,
    },

    /// The backing media service rejected the upload.
    #[error("upload failed: {0}")]
    Upload(String),
}

/// Errors from [`Composer`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ComposeError {
    /// Posting failed (validation or store).
    #[error(transparent)]
    Feed(#[from] FeedError),

    /// The image could not be turned into a URL.
    #[error(transparent)]
    Media(#[from] MediaError),

    /// Text exceeds the composer's length limit.
    #[error("message too long: {len} characters (limit {limit})")]
    TooLong {
        /// Length in characters.
        len: usize,
        /// Configured limit.
        limit: usize,
    },
}

/// Supplies the display name for outgoing messages.
pub trait IdentityProvider: Send + Sync {
    /// The signed-in user's display name, if any.
    fn display_name(&self) -> Option<String>;

    /// Sender value to store: the display name, or [`ANONYMOUS`].
    fn sender(&self) -> String {
        self.display_name()
            .map(|name| name.trim().to_string())
            .filter(|name| !name.is_empty())
            .unwrap_or_else(|| ANONYMOUS.to_string())
    }
}

/// Fixed identity.
#[derive(Debug, Clone, Default)]
pub struct StaticIdentity {
    name: Option<String>,
}

impl StaticIdentity {
    /// Identity with a display name.
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
        }
    }

    /// Signed-out identity.
    pub fn anonymous() -> Self {
        Self::default()
    }
}

impl IdentityProvider for StaticIdentity {
    fn display_name(&self) -> Option<String> {
        self.name.clone()
    }
}

/// Turns picked media into a URL a message can reference.
#[async_trait]
pub trait MediaResolver: Send + Sync {
    /// Store `content` and return its URL.
    async fn resolve(&self, content: Vec<u8>, mime: &str) -> Result<String, MediaError>;
}

/// Resolver that inlines content as a base64 `data:` URL.
#[derive(Debug, Clone)]
pub struct DataUrlResolver {
    max_bytes: usize,
}

impl Default for DataUrlResolver {
    fn default() -> Self {
        Self {
            max_bytes: DEFAULT_MAX_INLINE_BYTES,
        }
    }
}

impl DataUrlResolver {
    /// Create a resolver with the default size limit.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the maximum content size.
    pub fn with_max_bytes(mut self, max_bytes: usize) -> Self {
        self.max_bytes = max_bytes;
        self
    }
}

#[async_trait]
impl MediaResolver for DataUrlResolver {
    async fn resolve(&self, content: Vec<u8>, mime: &str) -> Result<String, MediaError> {
        if content.is_empty() {
            return Err(MediaError::Empty);
        }
        if content.len() > self.max_bytes {
            return Err(MediaError::TooLarge {
                size: content.len(),
                limit: self.max_bytes,
            });
        }
        let mime = if mime.trim().is_empty() {
            DEFAULT_IMAGE_MIME
        } else {
            mime
        };
        Ok(format!("data:{};base64,{}", mime, STANDARD.encode(&content)))
    }
}

/// Builds and posts messages on behalf of the current user.
pub struct Composer<'a, S: MessageStore + 'static> {
    feed: &'a ChatFeed<S>,
    identity: Arc<dyn IdentityProvider>,
    media: Arc<dyn MediaResolver>,
    length_limit: Option<usize>,
}

impl<'a, S: MessageStore + 'static> Composer<'a, S> {
    /// Bind a feed to an identity and a media resolver.
    pub fn new(
        feed: &'a ChatFeed<S>,
        identity: Arc<dyn IdentityProvider>,
        media: Arc<dyn MediaResolver>,
    ) -> Self {
        Self {
            feed,
            identity,
            media,
            length_limit: None,
        }
    }

    /// Reject text longer than `limit` characters.
    pub fn with_length_limit(mut self, limit: usize) -> Self {
        self.length_limit = Some(limit);
        self
    }

    /// Post a text message. Blank text is rejected before reaching the store.
    pub async fn send_text(&self, text: &str) -> Result<SequenceKey, ComposeError> {
        if text.trim().is_empty() {
            return Err(FeedError::from(ChatError::InvalidMessage("text is blank".into())).into());
        }
        if let Some(limit) = self.length_limit {
            let len = text.chars().count();
            if len > limit {
                return Err(ComposeError::TooLong { len, limit });
            }
        }

        let sender = self.identity.sender();
        Ok(self.feed.post(Message::text(text, Some(sender.as_str()))).await?)
    }

    /// Resolve an image to a URL and post it.
    pub async fn send_image(&self, content: Vec<u8>) -> Result<SequenceKey, ComposeError> {
        self.send_image_as(content, DEFAULT_IMAGE_MIME).await
    }

    /// [`send_image`](Self::send_image) with an explicit MIME type.
    pub async fn send_image_as(
        &self,
        content: Vec<u8>,
        mime: &str,
    ) -> Result<SequenceKey, ComposeError> {
        let url = self.media.resolve(content, mime).await?;
        tracing::debug!(mime, url_len = url.len(), "media resolved");

        let sender = self.identity.sender();
        Ok(self.feed.post(Message::image(url, Some(sender.as_str()))).await?)
    }
}
