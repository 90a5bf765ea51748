//! SQLite message store.

use std::path::Path;
use std::str::FromStr;
use std::sync::Arc;

use async_trait::async_trait;
use chat_client::{MessageStore, StoreError, SubscriberHub, Subscription};
use chat_types::{CollectionId, Message, SequenceKey, StoredMessage, SubscriptionId};
use sqlx::sqlite::{
    SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions, SqliteSynchronous,
};
use tokio::sync::Mutex;

use crate::config::StorageConfig;
use crate::error::StorageError;

/// SQLite-backed append-only store for one collection.
///
/// Uses WAL mode for concurrent reads/writes. Key assignment, publishing and
/// subscription registration share one async lock per store, so a new
/// subscription's replayed history meets the live stream with no gap and no
/// overlap.
///
/// Rows appended by other processes on the same file are published on the
/// next local append or [`refresh`](Self::refresh).
#[derive(Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
    collection: CollectionId,
    live: Arc<Mutex<LiveState>>,
}

struct LiveState {
    hub: SubscriberHub,
    /// Highest key handed to the hub.
    published: i64,
}

impl SqliteStore {
    /// Open (or create) a database file for the default collection.
    pub async fn new(path: &Path) -> Result<Self, StorageError> {
        Self::from_config(&StorageConfig {
            database: path.to_path_buf(),
            ..StorageConfig::default()
        })
        .await
    }

    /// Open the database and collection described by `config`.
    pub async fn from_config(config: &StorageConfig) -> Result<Self, StorageError> {
        let collection = CollectionId::new(&config.collection)?;
        let path = config
            .database
            .to_str()
            .ok_or_else(|| StorageError::InvalidPath {
                path: config.database.clone(),
            })?;

        let options = SqliteConnectOptions::from_str(path)?
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal)
            .busy_timeout(config.busy_timeout());

        let pool = SqlitePoolOptions::new()
            .max_connections(config.max_connections)
            .connect_with(options)
            .await?;

        Self::open(pool, collection).await
    }

    /// Create an in-memory store (for testing).
    pub async fn in_memory() -> Result<Self, StorageError> {
        let options = SqliteConnectOptions::from_str(":memory:")?
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal);

        // Every connection to ":memory:" is its own database: keep exactly one
        // and never recycle it.
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await?;

        Self::open(pool, CollectionId::default()).await
    }

    async fn open(pool: SqlitePool, collection: CollectionId) -> Result<Self, StorageError> {
        run_migrations(&pool).await?;
        let published = max_seq(&pool, &collection).await?;
        tracing::debug!(%collection, published, "store opened");

        Ok(Self {
            pool,
            collection,
            live: Arc::new(Mutex::new(LiveState {
                hub: SubscriberHub::new(),
                published,
            })),
        })
    }

    /// Another collection in the same database.
    ///
    /// The returned store shares the connection pool but has its own keys
    /// and subscriptions.
    pub async fn collection_store(&self, collection: CollectionId) -> Result<Self, StorageError> {
        Self::open(self.pool.clone(), collection).await
    }

    /// Atomically get and increment the key counter for this collection.
    async fn next_seq(
        conn: &mut sqlx::SqliteConnection,
        collection: &CollectionId,
    ) -> Result<i64, StorageError> {
        let seq: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO collection_keys (collection, next_seq)
            VALUES (?1, 2)
            ON CONFLICT(collection) DO UPDATE SET next_seq = next_seq + 1
            RETURNING next_seq - 1
            "#,
        )
        .bind(collection.as_str())
        .fetch_one(conn)
        .await?;

        Ok(seq)
    }

    async fn insert(&self, message: &Message) -> Result<SequenceKey, StorageError> {
        let mut tx = self.pool.begin().await?;
        let seq = Self::next_seq(&mut tx, &self.collection).await?;

        sqlx::query(
            r#"
            INSERT INTO messages (collection, seq, text, sender, image_url)
            VALUES (?1, ?2, ?3, ?4, ?5)
            "#,
        )
        .bind(self.collection.as_str())
        .bind(seq)
        .bind(message.text.as_deref())
        .bind(&message.sender)
        .bind(message.image_url.as_deref())
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        key_from_seq(seq)
    }

    /// Fetch committed rows in `(after, up_to]`, in key order.
    async fn range(&self, after: i64, up_to: i64) -> Result<Vec<StoredMessage>, StorageError> {
        let rows = sqlx::query_as::<_, MessageRow>(
            r#"
            SELECT seq, text, sender, image_url
            FROM messages
            WHERE collection = ?1 AND seq > ?2 AND seq <= ?3
            ORDER BY seq ASC
            "#,
        )
        .bind(self.collection.as_str())
        .bind(after)
        .bind(up_to)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(StoredMessage::try_from).collect()
    }

    /// Publish every committed row newer than the last published one.
    async fn publish_pending(&self, live: &mut LiveState) -> Result<usize, StorageError> {
        let fresh = self.range(live.published, i64::MAX).await?;
        for message in &fresh {
            live.hub.publish(message);
            live.published = seq_after(Some(message.key()));
        }
        Ok(fresh.len())
    }

    /// Publish rows appended by other processes since the last check.
    ///
    /// Returns the number of messages published.
    pub async fn refresh(&self) -> Result<usize, StorageError> {
        let mut live = self.live.lock().await;
        let count = self.publish_pending(&mut live).await?;
        if count > 0 {
            tracing::debug!(count, collection = %self.collection, "published external rows");
        }
        Ok(count)
    }

    /// Up to `limit` messages with key > `after`, in key order.
    pub async fn history(
        &self,
        after: Option<SequenceKey>,
        limit: u32,
    ) -> Result<Vec<StoredMessage>, StorageError> {
        let rows = sqlx::query_as::<_, MessageRow>(
            r#"
            SELECT seq, text, sender, image_url
            FROM messages
            WHERE collection = ?1 AND seq > ?2
            ORDER BY seq ASC
            LIMIT ?3
            "#,
        )
        .bind(self.collection.as_str())
        .bind(seq_after(after))
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(StoredMessage::try_from).collect()
    }

    /// Highest committed key, or `None` for an empty collection.
    pub async fn max_key(&self) -> Result<Option<SequenceKey>, StorageError> {
        let seq = max_seq(&self.pool, &self.collection).await?;
        Ok((seq > 0).then(|| SequenceKey::new(seq.unsigned_abs())))
    }

    /// Number of open subscriptions.
    pub async fn subscriber_count(&self) -> usize {
        self.live.lock().await.hub.len()
    }

    /// End every open subscription from the store side.
    pub async fn cancel_subscriptions(&self, reason: &str) -> usize {
        self.live.lock().await.hub.cancel_all(reason)
    }

    /// Close the connection pool.
    pub async fn close(&self) {
        self.pool.close().await;
    }
}

#[async_trait]
impl MessageStore for SqliteStore {
    fn collection(&self) -> &CollectionId {
        &self.collection
    }

    async fn append(&self, message: Message) -> Result<SequenceKey, StoreError> {
        let mut live = self.live.lock().await;
        let key = self.insert(&message).await?;
        tracing::debug!(%key, collection = %self.collection, "message stored");

        // The row is durable at this point; a failed publish only delays
        // delivery until the next append or refresh.
        if let Err(error) = self.publish_pending(&mut live).await {
            tracing::warn!(%error, %key, "publish after append failed");
        }
        Ok(key)
    }

    async fn subscribe(&self, after: Option<SequenceKey>) -> Result<Subscription, StoreError> {
        let mut live = self.live.lock().await;
        // Rows from other processes go out to existing subscribers first, so
        // the backlog below ends at the newest committed row.
        if let Err(error) = self.publish_pending(&mut live).await {
            tracing::warn!(%error, "publish before subscribe failed");
        }
        let backlog = self.range(seq_after(after), live.published).await?;
        let subscription = live.hub.open(after, backlog);
        tracing::debug!(
            id = %subscription.id(),
            after = ?after,
            up_to = live.published,
            "subscription opened"
        );
        Ok(subscription)
    }

    async fn unsubscribe(&self, id: SubscriptionId) {
        if self.live.lock().await.hub.close(&id) {
            tracing::debug!(%id, "subscription closed");
        }
    }
}

/// Run database migrations.
async fn run_migrations(pool: &SqlitePool) -> Result<(), StorageError> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS collection_keys (
            collection TEXT PRIMARY KEY,
            next_seq INTEGER NOT NULL DEFAULT 1
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS messages (
            collection TEXT NOT NULL,
            seq INTEGER NOT NULL,
            text TEXT,
            sender TEXT NOT NULL,
            image_url TEXT,
            created_at INTEGER NOT NULL DEFAULT (strftime('%s', 'now')),
            UNIQUE(collection, seq)
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_messages_collection_seq ON messages(collection, seq)",
    )
    .execute(pool)
    .await?;

    Ok(())
}

/// Database bound for "seq > after". Stored keys never exceed `i64::MAX`.
fn seq_after(after: Option<SequenceKey>) -> i64 {
    after.map_or(0, |k| i64::try_from(k.value()).unwrap_or(i64::MAX))
}

fn key_from_seq(seq: i64) -> Result<SequenceKey, StorageError> {
    u64::try_from(seq)
        .ok()
        .filter(|&value| value > 0)
        .map(SequenceKey::new)
        .ok_or_else(|| StorageError::Corrupt {
            seq,
            reason: "non-positive sequence number".into(),
        })
}

async fn max_seq(pool: &SqlitePool, collection: &CollectionId) -> Result<i64, StorageError> {
    let seq: Option<i64> =
        sqlx::query_scalar("SELECT MAX(seq) FROM messages WHERE collection = ?1")
            .bind(collection.as_str())
            .fetch_one(pool)
            .await?;

    Ok(seq.unwrap_or(0))
}

/// Internal row type for SQLite queries.
#[derive(sqlx::FromRow)]
struct MessageRow {
    seq: i64,
    text: Option<String>,
    sender: String,
    image_url: Option<String>,
}

impl TryFrom<MessageRow> for StoredMessage {
    type Error = StorageError;

    fn try_from(row: MessageRow) -> Result<Self, Self::Error> {
        let key = key_from_seq(row.seq)?;
        let message = Message {
            text: row.text,
            sender: row.sender,
            image_url: row.image_url,
        };
        message.validate().map_err(|e| StorageError::Corrupt {
            seq: row.seq,
            reason: e.to_string(),
        })?;

        Ok(StoredMessage::new(key, message))
    }
}
