//! Post messages.

use anyhow::{Context, Result};
use chat_client::{
    ChannelObserver, ChatFeed, Composer, DataUrlResolver, FeedConfig, MessageStore,
    StaticIdentity, DEFAULT_IMAGE_MIME,
};
use chat_types::{SequenceKey, DEFAULT_MSG_LENGTH_LIMIT};
use std::path::Path;
use std::sync::Arc;

use super::Backend;

/// What to post.
enum Outgoing<'a> {
    Text(&'a str),
    Image { content: Vec<u8>, mime: &'static str },
}

/// Run the send command.
pub async fn text(
    backend: &Backend,
    config: FeedConfig,
    name: Option<String>,
    text: &str,
) -> Result<()> {
    let key = dispatch(backend, config, name, Outgoing::Text(text)).await?;
    println!("Sent [{}]", key.value());
    Ok(())
}

/// Run the send-image command.
pub async fn image(
    backend: &Backend,
    config: FeedConfig,
    name: Option<String>,
    file: &Path,
) -> Result<()> {
    let content = tokio::fs::read(file)
        .await
        .with_context(|| format!("Failed to read {}", file.display()))?;
    let mime = mime_for(file);

    let key = dispatch(backend, config, name, Outgoing::Image { content, mime }).await?;
    println!("Sent image [{}]", key.value());
    Ok(())
}

async fn dispatch(
    backend: &Backend,
    config: FeedConfig,
    name: Option<String>,
    outgoing: Outgoing<'_>,
) -> Result<SequenceKey> {
    match backend {
        Backend::Sqlite(store) => post(Arc::clone(store), config, name, outgoing).await,
        Backend::Mock(store) => post(Arc::clone(store), config, name, outgoing).await,
    }
}

/// Common send logic for any store.
async fn post<S: MessageStore + 'static>(
    store: Arc<S>,
    config: FeedConfig,
    name: Option<String>,
    outgoing: Outgoing<'_>,
) -> Result<SequenceKey> {
    // Posting needs no subscription, so nobody listens to this feed
    let (observer, _events) = ChannelObserver::new();
    let feed = ChatFeed::with_config(store, Arc::new(observer), config);

    let identity = match name {
        Some(name) => StaticIdentity::named(name),
        None => StaticIdentity::anonymous(),
    };
    let composer = Composer::new(&feed, Arc::new(identity), Arc::new(DataUrlResolver::new()))
        .with_length_limit(DEFAULT_MSG_LENGTH_LIMIT);

    let key = match outgoing {
        Outgoing::Text(text) => composer.send_text(text).await,
        Outgoing::Image { content, mime } => composer.send_image_as(content, mime).await,
    }
    .context("Failed to send message")?;

    tracing::debug!(%key, "posted");
    Ok(key)
}

/// Guess an image MIME type from the file extension.
fn mime_for(file: &Path) -> &'static str {
    let ext = file
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase());
    match ext.as_deref() {
        Some("png") => "image/png",
        Some("gif") => "image/gif",
        Some("webp") => "image/webp",
        _ => DEFAULT_IMAGE_MIME,
    }
}
