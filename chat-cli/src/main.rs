//! # chat-cli
//!
//! Command-line client for friendlychat.
//!
//! ## Commands
//!
//! - `send`: Post a text message
//! - `send-image`: Post an image file
//! - `history`: Print stored messages
//! - `watch`: Follow the chat live until Ctrl+C
//!
//! ## Example
//!
//! ```bash
//! # Follow the chat in one terminal
//! chat-cli watch
//!
//! # Post from another
//! chat-cli --name Ada send "Hello, world!"
//! chat-cli --name Ada send-image cat.jpg
//!
//! # Everything after key 10
//! chat-cli history --after 10
//! ```

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use chat_store::Config;

mod commands;

use commands::{history, send, watch, Backend};

/// Config file looked up in the data directory when `--config` is absent.
const CONFIG_FILE: &str = "friendlychat.toml";

/// Command-line client for friendlychat.
#[derive(Parser, Debug)]
#[command(name = "chat-cli")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Configuration file (TOML)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Data directory for the message database
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    /// Display name to send as (anonymous if absent)
    #[arg(long, global = true)]
    name: Option<String>,

    /// Use an in-process store instead of the database (for testing/demo)
    #[arg(long, global = true)]
    mock: bool,

    /// Enable debug logging
    #[arg(long, short, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Post a text message
    Send {
        /// Message text
        text: String,
    },

    /// Post an image file
    SendImage {
        /// Image to post
        file: PathBuf,
    },

    /// Print stored messages
    History {
        /// Only messages after this key
        #[arg(long)]
        after: Option<u64>,

        /// Maximum number of messages
        #[arg(long, default_value = "100")]
        limit: u32,
    },

    /// Follow the chat live until Ctrl+C
    Watch,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Logs go to stderr; stdout carries chat output only
    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| filter.into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr),
        )
        .init();

    // Determine data directory
    let data_dir = match cli.data_dir {
        Some(dir) => dir,
        None => default_data_dir()?,
    };

    // Ensure data directory exists
    tokio::fs::create_dir_all(&data_dir)
        .await
        .context("Failed to create data directory")?;

    let config = load_config(cli.config.as_deref(), &data_dir)?;
    let backend = Backend::open(&config, &data_dir, cli.mock).await?;
    let feed_config = config.feed.feed_config();

    match cli.command {
        Commands::Send { text } => {
            send::text(&backend, feed_config, cli.name, &text).await?;
        }
        Commands::SendImage { file } => {
            send::image(&backend, feed_config, cli.name, &file).await?;
        }
        Commands::History { after, limit } => {
            history::run(&backend, after, limit).await?;
        }
        Commands::Watch => {
            watch::run(&backend, feed_config, config.storage.poll_interval()).await?;
        }
    }

    Ok(())
}

/// Load the explicit config file, else the data directory's, else defaults.
fn load_config(explicit: Option<&Path>, data_dir: &Path) -> Result<Config> {
    if let Some(path) = explicit {
        return Ok(Config::from_file(path)?);
    }

    let path = data_dir.join(CONFIG_FILE);
    if path.exists() {
        tracing::debug!(path = %path.display(), "loading config");
        return Ok(Config::from_file(&path)?);
    }
    Ok(Config::default())
}

/// Get the default data directory for chat-cli.
fn default_data_dir() -> Result<PathBuf> {
    let dirs = directories::ProjectDirs::from("io", "friendlychat", "chat-cli")
        .context("Could not determine home directory")?;
    Ok(dirs.data_dir().to_path_buf())
}
