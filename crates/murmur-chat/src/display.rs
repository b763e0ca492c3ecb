//! Terminal display utilities for the chat CLI

use chrono::{DateTime, Local};
use colored::Colorize;
use murmur_room::{
    AppendError, CompactionResult, DirectoryError, RecoveryReport, Sender, SenderId,
    TranscriptLine,
};

/// Print the application banner
pub fn print_banner() {
    println!();
    println!(
        "{}",
        "╔═══════════════════════════════════════════════════╗".cyan()
    );
    println!(
        "{}",
        "║          murmur - durable terminal chat           ║".cyan()
    );
    println!(
        "{}",
        "╚═══════════════════════════════════════════════════╝".cyan()
    );
    println!();
}

/// Print a success message
pub fn print_success(msg: &str) {
    println!("{} {}", "✓".green().bold(), msg.green());
}

/// Print an info message
pub fn print_info(msg: &str) {
    println!("{} {}", "ℹ".blue(), msg.dimmed());
}

/// Print an error message
pub fn print_error(msg: &str) {
    println!("{} {}", "✗".red().bold(), msg.red());
}

/// Print a warning message
pub fn print_warning(msg: &str) {
    println!("{} {}", "⚠".yellow(), msg.yellow());
}

/// Print the chat prompt
pub fn print_prompt(current: Option<&Sender>) {
    let who = match current {
        Some(sender) => sender.display_name.as_str(),
        None => "nobody",
    };
    print!("{} {} ", format!("[{}]", who).cyan(), ">".green());
}

/// Print the current user line
pub fn print_current_user(current: Option<&Sender>) {
    match current {
        Some(sender) => println!("{} {}", "Current user:".dimmed(), sender.to_string().cyan()),
        None => println!(
            "{}",
            "No current user. Use 'add <name>' or 'switch <id>'.".dimmed()
        ),
    }
}

/// Print interactive mode help
pub fn print_interactive_help() {
    println!();
    println!("{}", "Commands:".yellow().bold());
    println!("  {}      - Send a text message", "send <message>".cyan());
    println!("  {}           - Send shorthand (just type)", "<message>".cyan());
    println!("  {}         - Show messages in memory", "history".cyan());
    println!("  {}           - List active users", "users".cyan());
    println!("  {}     - Continue as another user", "switch <id>".cyan());
    println!("  {}      - Register a user and switch to them", "add <name>".cyan());
    println!("  {}            - Show this help", "help".cyan());
    println!("  {}            - Exit", "quit".cyan());
    println!();
}

/// Print one transcript line, highlighting the current user's messages
pub fn print_line(line: &TranscriptLine, is_self: bool) {
    let local: DateTime<Local> = line.timestamp.to_datetime().into();
    let time_str = format!("[{}]", local.format("%Y-%m-%d %H:%M:%S"));

    let mut who = format!("{} (ID: {})", line.name(), line.sender_id);
    if line.sender_name.is_some() && !line.sender_active {
        who.push_str(" (inactive)");
    }
    let who = format!("{}:", who);
    let who = if is_self {
        who.cyan().bold()
    } else if line.sender_active {
        who.magenta().bold()
    } else {
        who.dimmed()
    };

    println!("{} {} {}", time_str.dimmed(), who, line.body);
}

/// Print a block of history
pub fn print_history(lines: &[TranscriptLine], current: Option<SenderId>) {
    println!();
    println!(
        "{} {} {}",
        "─".repeat(10).dimmed(),
        format!("Chat history ({} messages)", lines.len())
            .yellow()
            .bold(),
        "─".repeat(10).dimmed()
    );
    if lines.is_empty() {
        println!("{}", "No messages yet".dimmed());
    }
    for line in lines {
        print_line(line, Some(line.sender_id) == current);
    }
    println!();
}

/// Print a table of users
pub fn print_users(users: &[Sender], current: Option<SenderId>) {
    if users.is_empty() {
        println!("{}", "No users. Use 'register <name>' to add one.".dimmed());
        return;
    }

    println!();
    println!("{}", "Users:".yellow().bold());
    println!("{}", "+--------+----------------------+----------+".dimmed());
    println!("| {:>6} | {:<20} | {:<8} |", "ID", "Username", "Status");
    println!("{}", "+--------+----------------------+----------+".dimmed());
    for user in users {
        let status = if user.active { "active" } else { "inactive" };
        let row = format!(
            "| {:>6} | {:<20} | {:<8} |",
            user.id, user.display_name, status
        );
        if Some(user.id) == current {
            println!("{}", row.cyan());
        } else if user.active {
            println!("{}", row);
        } else {
            println!("{}", row.dimmed());
        }
    }
    println!("{}", "+--------+----------------------+----------+".dimmed());
    println!();
}

/// Print what recovery found
pub fn print_recovery(report: &RecoveryReport) {
    print_info(&format!(
        "Loaded {} messages ({} older ones kept on disk only), {} active of {} users",
        report.messages_replayed - report.messages_evicted,
        report.messages_evicted,
        report.senders_active,
        report.senders_known
    ));
}

/// Print a compaction summary
pub fn print_compaction(result: &CompactionResult) {
    print_success(&format!(
        "Compacted message log: kept {}, dropped {}, freed {} bytes",
        result.records_retained,
        result.records_dropped,
        result.bytes_freed()
    ));
}

/// User-facing explanation of a refused append
pub fn describe_append_error(err: &AppendError) -> String {
    match err {
        AppendError::NotReady => "The chat log has not been loaded yet".to_string(),
        AppendError::UnknownSender(id) => format!(
            "User {} is not registered or has been deactivated. Run 'users' to see who can send.",
            id
        ),
        AppendError::BodyTooLong { len, max } => format!(
            "Message is {} bytes; the limit is {} bytes. Shorten it and try again.",
            len, max
        ),
        AppendError::PersistenceFailed(e) if err.is_retryable() => {
            format!("Message was not saved ({}). Free some space and try again.", e)
        }
        AppendError::PersistenceFailed(e) => format!("Message was not saved: {}", e),
    }
}

/// User-facing explanation of a refused directory change
pub fn describe_directory_error(err: &DirectoryError) -> String {
    match err {
        DirectoryError::NotReady => "The chat log has not been loaded yet".to_string(),
        DirectoryError::Capacity(e) => format!(
            "Maximum users reached ({}). Deactivate someone first.",
            e.capacity
        ),
        DirectoryError::InvalidName(e) => format!("Invalid username: {}", e),
        DirectoryError::PersistenceFailed(e) => format!("User change was not saved: {}", e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use murmur_room::{CapacityError, ValidationError};

    #[test]
    fn test_append_errors_are_explained() {
        let msg = describe_append_error(&AppendError::UnknownSender(SenderId(4)));
        assert!(msg.contains("User 4"));

        let msg = describe_append_error(&AppendError::BodyTooLong { len: 600, max: 512 });
        assert!(msg.contains("600 bytes"));
        assert!(msg.contains("512"));
    }

    #[test]
    fn test_directory_errors_are_explained() {
        let msg = describe_directory_error(&DirectoryError::Capacity(CapacityError {
            capacity: 10,
        }));
        assert_eq!(msg, "Maximum users reached (10). Deactivate someone first.");

        let msg = describe_directory_error(&DirectoryError::InvalidName(
            ValidationError::EmptyName,
        ));
        assert!(msg.starts_with("Invalid username"));
    }
}
