//! murmur - durable terminal chat
//!
//! A command-line front end for a murmur room log. Every command recovers
//! the room from disk first, so messages survive crashes and restarts.
//!
//! ## Usage
//!
//! ```bash
//! # Register users
//! murmur register alice
//! murmur register bob
//!
//! # Send as a user
//! murmur send --as 1 "hello everyone"
//!
//! # Show the last messages
//! murmur tail -n 20
//!
//! # Interactive session
//! murmur enter --as 1
//!
//! # Write the complete history to a file
//! murmur export history.txt
//! ```

mod display;
mod session;
mod settings;

use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow};
use clap::{Parser, Subcommand};
use murmur_logging::{MurmurSubscriberBuilder, WorkerGuard};
use murmur_room::{RoomConfig, RoomLog, SenderId};
use tokio::io::{AsyncWriteExt, BufReader, BufWriter};
use tracing::debug;

use display::*;
use settings::{Settings, expand_home};

/// murmur - durable terminal chat
#[derive(Parser)]
#[command(name = "murmur")]
#[command(about = "Durable, bounded chat room in your terminal")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Data directory
    #[arg(short, long, default_value = "~/.murmur", global = true)]
    data_dir: String,

    /// TOML settings file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Log level (RUST_LOG takes precedence)
    #[arg(long, global = true)]
    log_level: Option<String>,

    /// Human-readable log output on stderr
    #[arg(long, global = true)]
    pretty_logs: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Register a new user
    Register {
        /// Display name (1 to 50 bytes)
        name: String,
    },
    /// Deactivate a user; their messages stay in the history
    Deactivate {
        /// User ID
        id: u64,
    },
    /// List users
    Users {
        /// Include deactivated users
        #[arg(short, long)]
        all: bool,
    },
    /// Send a message
    Send {
        /// Sending user ID
        #[arg(long = "as")]
        sender: u64,
        /// Message text (up to 512 bytes)
        text: String,
    },
    /// Show the most recent messages
    Tail {
        /// Number of messages
        #[arg(short = 'n', long, default_value_t = 10)]
        count: usize,
    },
    /// Show every message kept in memory
    History,
    /// Write the complete history, including evicted messages, to a file
    Export {
        /// Output file
        path: PathBuf,
    },
    /// Drop messages from disk that are no longer shown
    Compact,
    /// Start an interactive session
    Enter {
        /// Start as this user ID
        #[arg(long = "as")]
        sender: Option<u64>,
    },
}

fn init_logging(cli: &Cli, settings: &Settings) -> Result<Option<WorkerGuard>> {
    let mut config = settings.logging.clone();
    if let Some(level) = &cli.log_level {
        config.default_level = level.clone();
    }
    if cli.pretty_logs {
        config.console.pretty = true;
        config.console.ansi = true;
    }

    MurmurSubscriberBuilder::new()
        .with_config(config)
        .try_init()
        .context("Failed to initialize logging")
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let settings = match &cli.config {
        Some(path) => Settings::load(path)?,
        None => Settings::default(),
    };
    let _log_guard = init_logging(&cli, &settings)?;

    let data_dir = expand_home(&cli.data_dir);
    let room = open_room(settings.room_config(&data_dir)).await?;

    match cli.command {
        Commands::Register { name } => cmd_register(&room, &name).await,
        Commands::Deactivate { id } => cmd_deactivate(&room, SenderId(id)).await,
        Commands::Users { all } => cmd_users(&room, all),
        Commands::Send { sender, text } => cmd_send(&room, SenderId(sender), text).await,
        Commands::Tail { count } => cmd_tail(&room, count),
        Commands::History => cmd_tail(&room, room.len()),
        Commands::Export { path } => cmd_export(&room, &path).await,
        Commands::Compact => cmd_compact(&room).await,
        Commands::Enter { sender } => cmd_enter(&room, sender.map(SenderId)).await,
    }?;

    room.close().await.context("Failed to close room log")?;
    Ok(())
}

async fn open_room(config: RoomConfig) -> Result<RoomLog> {
    debug!(?config, "Opening room");
    let room = RoomLog::new(config).context("Invalid room configuration")?;
    let report = room
        .recover()
        .await
        .context("Failed to load the chat log")?;
    debug!(?report, "Room recovered");
    Ok(room)
}

async fn cmd_register(room: &RoomLog, name: &str) -> Result<()> {
    let id = room
        .register(name)
        .await
        .map_err(|e| anyhow!(describe_directory_error(&e)))?;
    print_success(&format!("Registered {} (ID: {})", name, id));
    Ok(())
}

async fn cmd_deactivate(room: &RoomLog, id: SenderId) -> Result<()> {
    let changed = room
        .deactivate(id)
        .await
        .map_err(|e| anyhow!(describe_directory_error(&e)))?;
    if changed {
        print_success(&format!("Deactivated user {}", id));
    } else {
        print_info(&format!("User {} was not active", id));
    }
    Ok(())
}

fn cmd_users(room: &RoomLog, all: bool) -> Result<()> {
    let users = if all {
        room.senders()
    } else {
        room.list_active()
    };
    print_users(&users, None);
    Ok(())
}

async fn cmd_send(room: &RoomLog, sender: SenderId, text: String) -> Result<()> {
    room.append(sender, text)
        .await
        .map_err(|e| anyhow!(describe_append_error(&e)))?;
    if let Some(line) = room.transcript_tail(1).pop() {
        print_line(&line, true);
    }
    Ok(())
}

fn cmd_tail(room: &RoomLog, count: usize) -> Result<()> {
    print_history(&room.transcript_tail(count), None);
    Ok(())
}

async fn cmd_export(room: &RoomLog, path: &Path) -> Result<()> {
    let file = tokio::fs::File::create(path)
        .await
        .with_context(|| format!("Failed to create {}", path.display()))?;
    let mut out = BufWriter::new(file);
    let lines = room
        .export_transcript(&mut out)
        .await
        .context("Failed to export history")?;
    out.shutdown().await?;
    print_success(&format!("Exported {} messages to {}", lines, path.display()));
    Ok(())
}

async fn cmd_compact(room: &RoomLog) -> Result<()> {
    let result = room
        .compact_to_window()
        .await
        .context("Failed to compact the message log")?;
    print_compaction(&result);
    Ok(())
}

async fn cmd_enter(room: &RoomLog, sender: Option<SenderId>) -> Result<()> {
    if let Some(id) = sender
        && !room.list_active().iter().any(|s| s.id == id)
    {
        return Err(anyhow!("No active user with ID {}", id));
    }
    // Default to the only active user when there is exactly one
    let current = sender.or_else(|| match room.list_active().as_slice() {
        [only] => Some(only.id),
        _ => None,
    });

    print_banner();
    print_current_user(current.and_then(|id| room.lookup(id)).as_ref());

    let recent = room.transcript_tail(session::WELCOME_HISTORY);
    if !recent.is_empty() {
        print_history(&recent, current);
    }
    print_interactive_help();

    let stdin = BufReader::new(tokio::io::stdin());
    let summary = session::run(room, current, stdin).await?;
    debug!(sent = summary.sent, "Session finished");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;
    use tempfile::TempDir;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_send() {
        let cli = Cli::parse_from(["murmur", "send", "--as", "2", "hello there"]);
        match cli.command {
            Commands::Send { sender, text } => {
                assert_eq!(sender, 2);
                assert_eq!(text, "hello there");
            }
            _ => panic!("expected send"),
        }
        assert_eq!(cli.data_dir, "~/.murmur");
    }

    #[test]
    fn test_global_options_after_subcommand() {
        let cli = Cli::parse_from(["murmur", "tail", "-n", "3", "--data-dir", "/tmp/room"]);
        assert!(matches!(cli.command, Commands::Tail { count: 3 }));
        assert_eq!(cli.data_dir, "/tmp/room");
    }

    #[tokio::test]
    async fn test_commands_against_real_room() {
        let temp = TempDir::new().unwrap();
        let config = Settings::default().room_config(temp.path());

        let room = open_room(config.clone()).await.unwrap();
        cmd_register(&room, "alice").await.unwrap();
        cmd_send(&room, SenderId(1), "hello".to_string()).await.unwrap();
        assert!(cmd_send(&room, SenderId(5), "nope".to_string()).await.is_err());
        cmd_deactivate(&room, SenderId(1)).await.unwrap();
        room.close().await.unwrap();

        // A fresh process sees the same state
        let room = open_room(config).await.unwrap();
        assert_eq!(room.snapshot()[0].body, "hello");
        assert!(room.list_active().is_empty());

        let export = temp.path().join("history.txt");
        cmd_export(&room, &export).await.unwrap();
        let text = std::fs::read_to_string(&export).unwrap();
        assert!(text.trim_end().ends_with("alice (ID: 1) (inactive): hello"));
    }
}
