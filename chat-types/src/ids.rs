//! Identity and ordering types for friendlychat.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::ChatError;

/// Collection used when none is configured.
pub const DEFAULT_COLLECTION: &str = "messages";

/// Store-assigned key establishing the total order of a collection.
///
/// Assigned by the store at append time, never by clients. The string form
/// is a fixed-width decimal so that lexicographic order matches numeric
/// order; either form can be used as a subscription resume point.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SequenceKey(u64);

impl SequenceKey {
    /// Width of the string form.
    pub const WIDTH: usize = 20;

    /// Create a key with the given value.
    pub fn new(value: u64) -> Self {
        Self(value)
    }

    /// Get the numeric value of this key.
    pub fn value(&self) -> u64 {
        self.0
    }

    /// The key that follows this one.
    pub fn next(&self) -> Self {
        Self(self.0.saturating_add(1))
    }
}

impl fmt::Display for SequenceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:0width$}", self.0, width = Self::WIDTH)
    }
}

impl fmt::Debug for SequenceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SequenceKey({})", self.0)
    }
}

impl FromStr for SequenceKey {
    type Err = ChatError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if trimmed.is_empty() || !trimmed.bytes().all(|b| b.is_ascii_digit()) {
            return Err(ChatError::InvalidKey(s.to_string()));
        }
        trimmed
            .parse::<u64>()
            .map(Self)
            .map_err(|_| ChatError::InvalidKey(s.to_string()))
    }
}

/// Stable identifier of a message collection inside a store.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct CollectionId(String);

impl CollectionId {
    /// Create a collection id, rejecting empty names and path separators.
    pub fn new(name: &str) -> Result<Self, ChatError> {
        let forbidden = ['/', '.', '#', '$', '[', ']'];
        if name.is_empty() || name.contains(forbidden) || name.trim() != name {
            return Err(ChatError::InvalidCollection(name.to_string()));
        }
        Ok(Self(name.to_string()))
    }

    /// Get the collection name.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for CollectionId {
    fn default() -> Self {
        Self(DEFAULT_COLLECTION.to_string())
    }
}

impl TryFrom<String> for CollectionId {
    type Error = ChatError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(&value)
    }
}

impl From<CollectionId> for String {
    fn from(id: CollectionId) -> Self {
        id.0
    }
}

impl fmt::Display for CollectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Debug for CollectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CollectionId({})", self.0)
    }
}

/// Opaque handle naming one subscription inside a store.
///
/// UUID v4 format (16 bytes).
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SubscriptionId(uuid::Uuid);

impl SubscriptionId {
    /// Create a new random SubscriptionId.
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4())
    }

    /// Get the inner UUID.
    pub fn as_uuid(&self) -> &uuid::Uuid {
        &self.0
    }
}

impl Default for SubscriptionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Debug for SubscriptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SubscriptionId({})", self.0)
    }
}
