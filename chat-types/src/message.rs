//! Chat messages.
//!
//! A [`Message`] is the content a participant submits; a [`StoredMessage`]
//! is that content after the store committed it under a [`SequenceKey`].
//! There is no explicit type field: whether a message is text or image is
//! derived from which of `text` / `image_url` is present.

use serde::{Deserialize, Serialize};

use crate::{ChatError, SequenceKey};

/// Sender used when the author is not authenticated.
pub const ANONYMOUS: &str = "anonymous";

/// Character limit display layers apply to composed text.
pub const DEFAULT_MSG_LENGTH_LIMIT: usize = 1000;

/// Kind of a message, derived from which content field is set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageKind {
    /// Plain text message.
    Text,
    /// Image message carrying a resolvable URL.
    Image,
}

/// Message content, before or after it has been appended.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    /// Text body, present for text messages.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    /// Display identity of the author.
    pub sender: String,
    /// Image location, present for image messages.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
}

impl Message {
    /// Create a text message. An absent or blank sender becomes [`ANONYMOUS`].
    pub fn text(text: impl Into<String>, sender: Option<&str>) -> Self {
        Self {
            text: Some(text.into()),
            sender: sender_or_anonymous(sender),
            image_url: None,
        }
    }

    /// Create an image message. An absent or blank sender becomes [`ANONYMOUS`].
    pub fn image(image_url: impl Into<String>, sender: Option<&str>) -> Self {
        Self {
            text: None,
            sender: sender_or_anonymous(sender),
            image_url: Some(image_url.into()),
        }
    }

    /// Check the discriminant and sender, returning the derived kind.
    ///
    /// Empty strings count as absent, so `text: Some("")` with no image is
    /// rejected just like a message with neither field.
    pub fn validate(&self) -> Result<MessageKind, ChatError> {
        if self.sender.is_empty() {
            return Err(ChatError::InvalidMessage("sender is empty".into()));
        }
        match (present(&self.text), present(&self.image_url)) {
            (true, false) => Ok(MessageKind::Text),
            (false, true) => Ok(MessageKind::Image),
            (true, true) => Err(ChatError::InvalidMessage(
                "both text and image_url are set".into(),
            )),
            (false, false) => Err(ChatError::InvalidMessage(
                "neither text nor image_url is set".into(),
            )),
        }
    }

    /// Derived kind, or `None` if the message is invalid.
    pub fn kind(&self) -> Option<MessageKind> {
        self.validate().ok()
    }

    /// Whether the author was unauthenticated.
    pub fn is_anonymous(&self) -> bool {
        self.sender == ANONYMOUS
    }
}

/// A message committed to a store, with its assigned key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredMessage {
    /// Store-assigned ordering key.
    pub sequence_key: SequenceKey,
    /// The committed content.
    #[serde(flatten)]
    pub message: Message,
}

impl StoredMessage {
    /// Pair content with its assigned key.
    pub fn new(sequence_key: SequenceKey, message: Message) -> Self {
        Self {
            sequence_key,
            message,
        }
    }

    /// The assigned key.
    pub fn key(&self) -> SequenceKey {
        self.sequence_key
    }
}

fn present(field: &Option<String>) -> bool {
    field.as_deref().is_some_and(|s| !s.is_empty())
}

fn sender_or_anonymous(sender: Option<&str>) -> String {
    match sender.map(str::trim) {
        Some(name) if !name.is_empty() => name.to_string(),
        _ => ANONYMOUS.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn text_message_is_text_kind() {
        let msg = Message::text("hi", Some("A"));
        assert_eq!(msg.validate().unwrap(), MessageKind::Text);
        assert_eq!(msg.sender, "A");
    }

    #[test]
    fn image_message_is_image_kind() {
        let msg = Message::image("https://example.com/cat.jpg", Some("B"));
        assert_eq!(msg.kind(), Some(MessageKind::Image));
    }

    #[test]
    fn missing_sender_defaults_to_anonymous() {
        assert_eq!(Message::text("hi", None).sender, ANONYMOUS);
        assert!(Message::text("hi", Some("   ")).is_anonymous());
    }

    #[test]
    fn both_fields_set_is_invalid() {
        let msg = Message {
            text: Some("hi".into()),
            sender: "A".into(),
            image_url: Some("https://example.com/x.jpg".into()),
        };
        assert!(matches!(msg.validate(), Err(ChatError::InvalidMessage(_))));
    }

    #[test]
    fn neither_field_set_is_invalid() {
        let msg = Message {
            text: None,
            sender: "A".into(),
            image_url: None,
        };
        assert!(matches!(msg.validate(), Err(ChatError::InvalidMessage(_))));
        assert_eq!(msg.kind(), None);
    }

    #[test]
    fn empty_text_counts_as_absent() {
        let msg = Message {
            text: Some(String::new()),
            sender: "A".into(),
            image_url: None,
        };
        assert!(msg.validate().is_err());

        let msg = Message {
            text: Some(String::new()),
            sender: "A".into(),
            image_url: Some("https://example.com/x.jpg".into()),
        };
        assert_eq!(msg.validate().unwrap(), MessageKind::Image);
    }

    #[test]
    fn empty_sender_is_invalid() {
        let msg = Message {
            text: Some("hi".into()),
            sender: String::new(),
            image_url: None,
        };
        assert!(msg.validate().is_err());
    }

    #[test]
    fn json_shape_uses_camel_case_and_omits_absent_fields() {
        let stored = StoredMessage::new(
            SequenceKey::new(3),
            Message::image("https://example.com/x.jpg", Some("B")),
        );
        let json = serde_json::to_value(&stored).unwrap();
        assert_eq!(json["imageUrl"], "https://example.com/x.jpg");
        assert_eq!(json["sender"], "B");
        assert_eq!(json["sequenceKey"], 3);
        assert!(json.get("text").is_none());
    }
}
