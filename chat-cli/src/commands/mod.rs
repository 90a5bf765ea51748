//! CLI command implementations.

pub mod history;
pub mod send;
pub mod watch;

use anyhow::{Context, Result};
use chat_client::MemoryStore;
use chat_store::{Config, SqliteStore};
use chat_types::{SequenceKey, StoredMessage};
use std::path::Path;
use std::sync::Arc;

/// Longest image URL printed in full.
const MAX_URL_DISPLAY: usize = 60;

/// The store a command runs against.
pub enum Backend {
    /// Database in the data directory.
    Sqlite(Arc<SqliteStore>),
    /// In-process store, empty at startup.
    Mock(Arc<MemoryStore>),
}

impl Backend {
    /// Open the configured store, or a mock one.
    pub async fn open(config: &Config, data_dir: &Path, mock: bool) -> Result<Self> {
        if mock {
            let collection = config.storage.collection_id()?;
            return Ok(Self::Mock(Arc::new(MemoryStore::with_collection(collection))));
        }

        let mut storage = config.storage.clone();
        if storage.database.is_relative() {
            storage.database = data_dir.join(&storage.database);
        }
        let store = SqliteStore::from_config(&storage)
            .await
            .with_context(|| format!("Failed to open {}", storage.database.display()))?;
        Ok(Self::Sqlite(Arc::new(store)))
    }

    /// Up to `limit` messages after `after`, in key order.
    pub async fn history(
        &self,
        after: Option<SequenceKey>,
        limit: u32,
    ) -> Result<Vec<StoredMessage>> {
        match self {
            Self::Sqlite(store) => Ok(store.history(after, limit).await?),
            Self::Mock(store) => Ok(store
                .messages()
                .into_iter()
                .filter(|m| after.map_or(true, |after| m.key() > after))
                .take(limit as usize)
                .collect()),
        }
    }
}

/// One display line for a message.
pub fn format_message(message: &StoredMessage) -> String {
    let content = &message.message;
    let body = match (&content.text, &content.image_url) {
        (Some(text), _) => text.clone(),
        (None, Some(url)) if url.chars().count() > MAX_URL_DISPLAY => {
            let head: String = url.chars().take(MAX_URL_DISPLAY).collect();
            format!("<image {}...>", head)
        }
        (None, Some(url)) => format!("<image {}>", url),
        (None, None) => String::new(),
    };
    format!("[{}] {}: {}", message.key().value(), content.sender, body)
}
