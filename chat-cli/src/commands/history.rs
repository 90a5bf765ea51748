//! Print stored messages.

use anyhow::Result;
use chat_types::SequenceKey;

use super::{format_message, Backend};

/// Run the history command.
pub async fn run(backend: &Backend, after: Option<u64>, limit: u32) -> Result<()> {
    let messages = backend.history(after.map(SequenceKey::new), limit).await?;

    if messages.is_empty() {
        println!("No messages.");
        return Ok(());
    }
    for message in &messages {
        println!("{}", format_message(message));
    }
    Ok(())
}
