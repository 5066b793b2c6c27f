//! Output abstraction for the terminal front end
//!
//! Chat events and resumed history are turned into [`OutputEvent`]s; a
//! writer decides how they look.

mod terminal;

pub use terminal::TerminalOutput;

use serde_json::Value;

use crate::agent::ChatEvent;
use crate::llm::{ConversationMessage, MessageContent, Role};

// ============================================================================
// Output Events
// ============================================================================

/// Events that can be displayed to the user
#[derive(Debug, Clone, PartialEq)]
pub enum OutputEvent {
    /// A full line of text
    Text(String),

    /// Streaming token, printed without a newline
    Token(String),

    /// The model opened a tool call
    ToolCall { name: String },

    /// Streamed fragment of tool arguments
    ToolInput(String),

    /// Complete arguments of a tool call (history echo)
    ToolArguments(Value),

    /// A tool returned
    ToolResult { content: Value, is_error: bool },

    /// Error message
    Error(String),

    /// Warning message
    Warning(String),

    /// System message (banner, separators)
    System(String),

    /// New line / separator
    NewLine,
}

impl From<ChatEvent> for OutputEvent {
    fn from(event: ChatEvent) -> Self {
        match event {
            ChatEvent::Token { content } => OutputEvent::Token(content),
            ChatEvent::ToolCall { name } => OutputEvent::ToolCall { name },
            ChatEvent::ToolInput { partial_json } => OutputEvent::ToolInput(partial_json),
            ChatEvent::ToolResult {
                content, is_error, ..
            } => OutputEvent::ToolResult { content, is_error },
            ChatEvent::Error { message } => OutputEvent::Error(message),
        }
    }
}

// ============================================================================
// Output Writer Trait
// ============================================================================

/// Trait for writing output events
pub trait OutputWriter: Send + Sync {
    /// Write an output event
    fn write(&self, event: OutputEvent);

    /// Flush any buffered output
    fn flush(&self);
}

/// Render a saved conversation for display when resuming
///
/// User text is shown as `> text`, assistant text as-is and tool calls by
/// name with their arguments. Tool results are not repeated.
pub fn transcript(messages: &[ConversationMessage]) -> Vec<OutputEvent> {
    let mut events = vec![OutputEvent::System("\nPrevious messages:".to_string())];

    for message in messages {
        match (&message.role, &message.content) {
            (Role::User, MessageContent::Text(text)) => {
                events.push(OutputEvent::Text(format!("\n> {}", text)));
            }
            (Role::User, MessageContent::Blocks(_)) => {}
            (Role::Assistant, MessageContent::Text(text)) => {
                events.push(OutputEvent::Text(format!("\n{}", text)));
            }
            (Role::Assistant, MessageContent::Blocks(blocks)) => {
                for block in blocks {
                    if let Some((name, input)) = block.as_tool_use() {
                        events.push(OutputEvent::ToolCall {
                            name: name.to_string(),
                        });
                        events.push(OutputEvent::ToolArguments(input.clone()));
                    } else if let Some(text) = block.as_text() {
                        events.push(OutputEvent::Text(format!("\n{}", text)));
                    }
                }
            }
        }
    }

    events.push(OutputEvent::System("\n--- Continuing chat ---\n".to_string()));
    events
}

/// Pretty JSON for display
pub(crate) fn pretty_json(value: &Value) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string())
}
