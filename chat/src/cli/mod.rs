//! CLI module
//!
//! - argument definitions (args)
//! - special commands for interactive mode (commands)
//! - persistent command history (history)
//! - the interactive loop (repl)

pub mod args;
pub mod commands;
pub mod history;
pub mod repl;

pub use args::{Cli, Commands};
pub use commands::{history_lines, parse_special_command, SpecialCommand};
pub use history::CommandHistory;
pub use repl::Repl;
