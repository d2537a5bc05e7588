//! Colored CLI display utilities for relay output.

use std::io::{self, Write};

use chrono::Utc;
use owo_colors::OwoColorize;

use crate::session::{SessionPhase, SessionStatus};

/// Get current timestamp in the same format as tracing.
fn timestamp() -> String {
    Utc::now().format("%Y-%m-%dT%H:%M:%S%.6fZ").to_string()
}

/// Truncate a string to at most `max_len` bytes, adding ellipsis if truncated.
#[must_use]
pub fn truncate(s: &str, max_len: usize) -> String {
    if s.len() <= max_len {
        return s.to_string();
    }
    if max_len <= 3 {
        return "...".to_string();
    }
    let mut cut = max_len - 3;
    while !s.is_char_boundary(cut) {
        cut -= 1;
    }
    format!("{}...", &s[..cut])
}

/// Print session start information.
pub fn print_session_start(identity: &str, log_file: &str) {
    println!(
        "{} {} Relaying for {} from {}",
        timestamp().dimmed(),
        "[SESSION]".blue().bold(),
        identity.cyan(),
        log_file.dimmed()
    );
    let _ = io::stdout().flush();
}

/// Print a phase change.
pub fn print_status(status: &SessionStatus) {
    let label = status.phase.label();
    let tag = match status.phase {
        SessionPhase::Tailing => label.green().bold().to_string(),
        SessionPhase::Failed => label.red().bold().to_string(),
        SessionPhase::Stopping | SessionPhase::Stopped => label.yellow().bold().to_string(),
        _ => label.blue().bold().to_string(),
    };
    println!(
        "{} {} {} {}",
        timestamp().dimmed(),
        "[STATUS]".blue().bold(),
        tag,
        status.identity.as_deref().unwrap_or("-").cyan()
    );
    let _ = io::stdout().flush();
}

/// Print a full status report.
pub fn print_status_report(status: &SessionStatus, counter: u64) {
    print_status(status);
    println!(
        "  log={} lines={} relayed={} failed={} count={}",
        status.log_file.as_deref().unwrap_or("-").dimmed(),
        status.stats.lines_read,
        status.stats.messages_relayed.green(),
        status.stats.delivery_failures.red(),
        counter.bold()
    );
    if let Some(error) = &status.last_error {
        println!("  last error: {}", error.red());
    }
    let _ = io::stdout().flush();
}

/// Print the counting-mode total.
pub fn print_counter(total: u64) {
    println!(
        "{} {} {}",
        timestamp().dimmed(),
        "[COUNT]".magenta().bold(),
        total.bold()
    );
    let _ = io::stdout().flush();
}

/// Print a message that would have been posted.
pub fn print_relayed(display_name: &str, content: &str) {
    println!(
        "{} {} {}: {}",
        timestamp().dimmed(),
        "[RELAY]".green().bold(),
        display_name.cyan(),
        truncate(content, 200)
    );
    let _ = io::stdout().flush();
}

/// Print an informational notice.
pub fn print_notice(message: &str) {
    println!("{} {}", "[INFO]".blue().bold(), message);
    let _ = io::stdout().flush();
}

/// Print an error message.
pub fn print_error(message: &str) {
    println!("{} {}", "[ERROR]".red().bold(), message);
    let _ = io::stdout().flush();
}
