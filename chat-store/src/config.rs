//! Configuration loading for friendlychat.
//!
//! Configuration is loaded from a TOML file (default: `friendlychat.toml`).
//! Every section and field is optional.

use std::path::PathBuf;
use std::time::Duration;

use chat_client::FeedConfig;
use chat_types::{CollectionId, DEFAULT_COLLECTION};
use serde::Deserialize;

/// Root configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    /// Storage configuration.
    #[serde(default)]
    pub storage: StorageConfig,
    /// Feed configuration.
    #[serde(default)]
    pub feed: FeedSection,
}

/// Storage configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    /// Path to SQLite database file.
    #[serde(default = "default_database_path")]
    pub database: PathBuf,
    /// Collection to read and write (default: `messages`).
    #[serde(default = "default_collection")]
    pub collection: String,
    /// Maximum pool connections (default: 5).
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
    /// How long to wait on a locked database, in milliseconds (default: 5000).
    #[serde(default = "default_busy_timeout_ms")]
    pub busy_timeout_ms: u64,
    /// How often a watcher checks for rows from other processes, in
    /// milliseconds (default: 500).
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
}

/// Feed configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct FeedSection {
    /// Subscribe timeout in milliseconds (absent = no timeout).
    pub subscribe_timeout_ms: Option<u64>,
    /// Append timeout in milliseconds (absent = no timeout).
    pub append_timeout_ms: Option<u64>,
    /// Resume after the last seen key on restart (default: true).
    #[serde(default = "default_resume_on_restart")]
    pub resume_on_restart: bool,
}

// Default value functions
fn default_database_path() -> PathBuf {
    PathBuf::from("friendlychat.db")
}

fn default_collection() -> String {
    DEFAULT_COLLECTION.to_string()
}

fn default_max_connections() -> u32 {
    5
}

fn default_busy_timeout_ms() -> u64 {
    5000
}

fn default_poll_interval_ms() -> u64 {
    500
}

fn default_resume_on_restart() -> bool {
    true
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database: default_database_path(),
            collection: default_collection(),
            max_connections: default_max_connections(),
            busy_timeout_ms: default_busy_timeout_ms(),
            poll_interval_ms: default_poll_interval_ms(),
        }
    }
}

impl Default for FeedSection {
    fn default() -> Self {
        Self {
            subscribe_timeout_ms: None,
            append_timeout_ms: None,
            resume_on_restart: default_resume_on_restart(),
        }
    }
}

impl StorageConfig {
    /// Validated collection identifier.
    pub fn collection_id(&self) -> Result<CollectionId, ConfigError> {
        CollectionId::new(&self.collection).map_err(|e| ConfigError::Invalid {
            field: "storage.collection",
            reason: e.to_string(),
        })
    }

    /// Busy timeout as a duration.
    pub fn busy_timeout(&self) -> Duration {
        Duration::from_millis(self.busy_timeout_ms)
    }

    /// Poll interval as a duration.
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

impl FeedSection {
    /// Build the feed configuration.
    pub fn feed_config(&self) -> FeedConfig {
        let mut config = FeedConfig::default().with_resume_on_restart(self.resume_on_restart);
        if let Some(ms) = self.subscribe_timeout_ms {
            config = config.with_subscribe_timeout(Duration::from_millis(ms));
        }
        if let Some(ms) = self.append_timeout_ms {
            config = config.with_append_timeout(Duration::from_millis(ms));
        }
        config
    }
}

impl Config {
    /// Load configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: &std::path::Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            source: e,
        })?;

        toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            source: e,
        })
    }
}

/// Configuration error types.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read configuration file.
    #[error("failed to read config file {path}: {source}")]
    ReadError {
        /// Path to the configuration file.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },
    /// Failed to parse configuration file.
    #[error("failed to parse config file {path}: {source}")]
    ParseError {
        /// Path to the configuration file.
        path: PathBuf,
        /// Underlying TOML parse error.
        source: toml::de::Error,
    },
    /// A value parsed but is not usable.
    #[error("invalid {field}: {reason}")]
    Invalid {
        /// Dotted field name.
        field: &'static str,
        /// Why it was rejected.
        reason: String,
    },
}
