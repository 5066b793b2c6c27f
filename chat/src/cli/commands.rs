//! Special commands for interactive mode
//!
//! `quit` / `exit` end the session; `history [N]` and `history -n N` print
//! the last N inputs. Anything else is sent to the model.

use std::sync::LazyLock;

use regex::Regex;

/// Number of history entries shown when no count is given
pub const DEFAULT_HISTORY_COUNT: usize = 20;

pub const HISTORY_USAGE: &str = "Usage: history [N] or history -n N";
pub const HISTORY_COUNT_ERROR: &str = "Error: N must be a positive integer for history command.";

static HISTORY_ARGS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(-n\s+)?(-?\d+)$").expect("Invalid history regex"));

/// A recognized interactive command
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SpecialCommand {
    /// `quit` or `exit`
    Quit,
    /// Show the last N history entries
    History(usize),
    /// A history command with a message to print instead
    Invalid(&'static str),
}

/// Parse user input; `None` means the input is a chat message
pub fn parse_special_command(input: &str) -> Option<SpecialCommand> {
    let trimmed = input.trim().to_lowercase();

    match trimmed.as_str() {
        "quit" | "exit" => return Some(SpecialCommand::Quit),
        "history" => return Some(SpecialCommand::History(DEFAULT_HISTORY_COUNT)),
        _ => {}
    }

    let args = trimmed.strip_prefix("history")?;
    if !args.starts_with(char::is_whitespace) {
        return None;
    }

    let Some(caps) = HISTORY_ARGS.captures(args.trim()) else {
        return Some(SpecialCommand::Invalid(HISTORY_USAGE));
    };

    match caps[2].parse::<i64>() {
        Ok(n) if n > 0 => Some(SpecialCommand::History(n as usize)),
        Ok(_) => Some(SpecialCommand::Invalid(HISTORY_COUNT_ERROR)),
        // digits too long for i64 are still a positive count
        Err(_) if !caps[2].starts_with('-') => Some(SpecialCommand::History(usize::MAX)),
        Err(_) => Some(SpecialCommand::Invalid(HISTORY_COUNT_ERROR)),
    }
}

/// The last `count` entries, numbered from their position in the history
pub fn history_lines(entries: &[String], count: usize) -> Vec<String> {
    let start = entries.len().saturating_sub(count);
    entries[start..]
        .iter()
        .enumerate()
        .map(|(i, cmd)| format!("{}  {}", start + i + 1, cmd))
        .collect()
}
