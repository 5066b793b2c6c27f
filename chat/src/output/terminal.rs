//! Terminal output with colors
//!
//! Uses ANSI escape codes. Content goes to stdout, errors and warnings to
//! stderr.

use std::io::{self, IsTerminal, Write};

use super::{pretty_json, OutputEvent, OutputWriter};

// ANSI color codes
const RESET: &str = "\x1b[0m";
const BOLD: &str = "\x1b[1m";
const RED: &str = "\x1b[31m";
const GREEN: &str = "\x1b[32m";
const YELLOW: &str = "\x1b[33m";
const BLUE: &str = "\x1b[34m";
const GRAY: &str = "\x1b[90m";

/// Terminal output writer
pub struct TerminalOutput {
    use_colors: bool,
}

impl Default for TerminalOutput {
    fn default() -> Self {
        Self::new()
    }
}

impl TerminalOutput {
    pub fn new() -> Self {
        Self { use_colors: true }
    }

    /// Colors only when stdout is a TTY
    pub fn auto() -> Self {
        Self {
            use_colors: io::stdout().is_terminal(),
        }
    }

    pub fn without_colors() -> Self {
        Self { use_colors: false }
    }

    fn color(&self, code: &str, text: &str) -> String {
        if self.use_colors {
            format!("{}{}{}", code, text, RESET)
        } else {
            text.to_string()
        }
    }

    /// Render an event to the string that would be printed
    fn render(&self, event: &OutputEvent) -> String {
        match event {
            OutputEvent::Text(text) | OutputEvent::System(text) => text.clone(),
            OutputEvent::Token(token) => token.clone(),
            OutputEvent::ToolCall { name } => {
                format!("\n{}\n", self.color(GREEN, &format!("[Tool Call] {}", name)))
            }
            OutputEvent::ToolInput(fragment) => self.color(GREEN, fragment),
            OutputEvent::ToolArguments(args) => {
                self.color(GREEN, &format!("Arguments: {}", pretty_json(args)))
            }
            OutputEvent::ToolResult { content, is_error } => {
                let code = if *is_error { RED } else { BLUE };
                format!("\n{}\n", self.color(code, &format!("Result: {}", pretty_json(content))))
            }
            OutputEvent::Error(msg) => format!(
                "{} {}",
                self.color(&format!("{}{}", BOLD, RED), "Error:"),
                self.color(RED, msg)
            ),
            OutputEvent::Warning(msg) => format!(
                "{} {}",
                self.color(&format!("{}{}", BOLD, YELLOW), "Warning:"),
                self.color(YELLOW, msg)
            ),
            OutputEvent::NewLine => String::new(),
        }
    }
}

impl OutputWriter for TerminalOutput {
    fn write(&self, event: OutputEvent) {
        let rendered = self.render(&event);
        match event {
            OutputEvent::Token(_)
            | OutputEvent::ToolCall { .. }
            | OutputEvent::ToolInput(_)
            | OutputEvent::ToolResult { .. } => {
                print!("{}", rendered);
                let _ = io::stdout().flush();
            }
            OutputEvent::Error(_) | OutputEvent::Warning(_) => eprintln!("{}", rendered),
            OutputEvent::System(_) => println!("{}", self.color(GRAY, &rendered)),
            OutputEvent::Text(_) | OutputEvent::ToolArguments(_) | OutputEvent::NewLine => {
                println!("{}", rendered)
            }
        }
    }

    fn flush(&self) {
        let _ = io::stdout().flush();
        let _ = io::stderr().flush();
    }
}
