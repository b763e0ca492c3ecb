//! Interactive chat session
//!
//! A line-oriented loop over any async reader: plain text is sent as the
//! current user, a handful of words act as commands.

use std::io::Write;

use anyhow::Result;
use murmur_room::{RoomLog, SenderId};
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tracing::debug;

use crate::display::*;

/// How many messages to show when a session starts
pub const WELCOME_HISTORY: usize = 10;

/// A parsed line of input
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionCommand {
    Empty,
    Send(String),
    History,
    Users,
    Switch(SenderId),
    Add(String),
    Help,
    Quit,
    Invalid(String),
}

/// Parse one line of input
pub fn parse_command(input: &str) -> SessionCommand {
    let input = input.trim();
    if input.is_empty() {
        return SessionCommand::Empty;
    }

    let (word, rest) = match input.split_once(' ') {
        Some((word, rest)) => (word, rest.trim()),
        None => (input, ""),
    };

    match word.trim_start_matches('/').to_lowercase().as_str() {
        "quit" | "exit" | "q" => SessionCommand::Quit,
        "help" | "?" => SessionCommand::Help,
        "history" => SessionCommand::History,
        "users" => SessionCommand::Users,
        "switch" => match rest.parse::<u64>() {
            Ok(id) => SessionCommand::Switch(SenderId(id)),
            Err(_) => SessionCommand::Invalid("Usage: switch <id>".to_string()),
        },
        "add" if rest.is_empty() => SessionCommand::Invalid("Usage: add <name>".to_string()),
        "add" => SessionCommand::Add(rest.to_string()),
        "send" => SessionCommand::Send(rest.to_string()),
        _ => SessionCommand::Send(input.to_string()),
    }
}

/// What happened during a session
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionSummary {
    pub sent: usize,
    pub current: Option<SenderId>,
}

/// Run the interactive loop until `quit` or end of input
pub async fn run<R>(room: &RoomLog, mut current: Option<SenderId>, input: R) -> Result<SessionSummary>
where
    R: AsyncBufRead + Unpin,
{
    let mut lines = input.lines();
    let mut sent = 0;

    loop {
        let sender = current.and_then(|id| room.lookup(id));
        print_prompt(sender.as_ref());
        std::io::stdout().flush()?;

        let Some(line) = lines.next_line().await? else {
            println!();
            break;
        };

        let command = parse_command(&line);
        debug!(?command, "Session command");

        match command {
            SessionCommand::Empty => {}
            SessionCommand::Quit => {
                match sender {
                    Some(sender) => print_info(&format!("Goodbye, {}!", sender.display_name)),
                    None => print_info("Goodbye!"),
                }
                break;
            }
            SessionCommand::Help => print_interactive_help(),
            SessionCommand::History => {
                print_history(&room.transcript_tail(room.len()), current);
            }
            SessionCommand::Users => print_users(&room.list_active(), current),
            SessionCommand::Switch(id) => {
                if room.list_active().iter().any(|s| s.id == id) {
                    current = Some(id);
                    print_success("Switched user");
                    print_current_user(room.lookup(id).as_ref());
                } else {
                    print_error(&format!("No active user with ID {}", id));
                }
            }
            SessionCommand::Add(name) => match room.register(&name).await {
                Ok(id) => {
                    current = Some(id);
                    print_success(&format!("Added {} (ID: {})", name, id));
                }
                Err(e) => print_error(&describe_directory_error(&e)),
            },
            SessionCommand::Send(body) => {
                let Some(id) = current else {
                    print_warning("No current user. Use 'add <name>' or 'switch <id>'.");
                    continue;
                };
                match room.append(id, body).await {
                    Ok(_) => {
                        sent += 1;
                        if let Some(line) = room.transcript_tail(1).pop() {
                            print_line(&line, true);
                        }
                    }
                    Err(e) => print_error(&describe_append_error(&e)),
                }
            }
            SessionCommand::Invalid(usage) => print_warning(&usage),
        }
    }

    Ok(SessionSummary { sent, current })
}

#[cfg(test)]
mod tests {
    use super::*;
    use murmur_room::RoomConfig;
    use tempfile::TempDir;

    async fn ready_room() -> (RoomLog, TempDir) {
        let temp = TempDir::new().unwrap();
        let room = RoomLog::new(RoomConfig::with_data_dir(temp.path())).unwrap();
        room.recover().await.unwrap();
        (room, temp)
    }

    #[test]
    fn test_parse_commands() {
        assert_eq!(parse_command("   "), SessionCommand::Empty);
        assert_eq!(parse_command("quit"), SessionCommand::Quit);
        assert_eq!(parse_command("/EXIT"), SessionCommand::Quit);
        assert_eq!(parse_command("?"), SessionCommand::Help);
        assert_eq!(parse_command("history"), SessionCommand::History);
        assert_eq!(parse_command("switch 3"), SessionCommand::Switch(SenderId(3)));
        assert!(matches!(parse_command("switch bob"), SessionCommand::Invalid(_)));
        assert_eq!(parse_command("add  carol "), SessionCommand::Add("carol".to_string()));
        assert!(matches!(parse_command("add"), SessionCommand::Invalid(_)));
        assert_eq!(
            parse_command("send hello there"),
            SessionCommand::Send("hello there".to_string())
        );
        assert_eq!(
            parse_command("hello there"),
            SessionCommand::Send("hello there".to_string())
        );
    }

    #[tokio::test]
    async fn test_scripted_session() {
        let (room, _temp) = ready_room().await;
        let alice = room.register("alice").await.unwrap();

        let script = "hi\nadd bob\nhello alice\nswitch 1\nbye\nswitch 99\nquit\nnever sent\n";
        let summary = run(&room, Some(alice), script.as_bytes()).await.unwrap();

        assert_eq!(summary.sent, 3);
        assert_eq!(summary.current, Some(alice));

        let senders: Vec<u64> = room.snapshot().iter().map(|m| m.sender_id.get()).collect();
        assert_eq!(senders, vec![1, 2, 1]);
    }

    #[tokio::test]
    async fn test_session_without_user_sends_nothing() {
        let (room, _temp) = ready_room().await;
        let summary = run(&room, None, "hello\n".as_bytes()).await.unwrap();

        assert_eq!(summary.sent, 0);
        assert!(room.is_empty());
    }

    #[tokio::test]
    async fn test_rejected_message_keeps_session_alive() {
        let (room, _temp) = ready_room().await;
        let alice = room.register("alice").await.unwrap();

        let long = "x".repeat(600);
        let script = format!("{}\nshort\n", long);
        let summary = run(&room, Some(alice), script.as_bytes()).await.unwrap();

        assert_eq!(summary.sent, 1);
        assert_eq!(room.snapshot()[0].body, "short");
    }
}
