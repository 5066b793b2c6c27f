//! Chat events for real-time visibility
//!
//! Events are emitted while a turn is in flight. The CLI renders them to
//! the terminal; the web API turns them into the token/complete/error
//! envelope streamed to the browser.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::mpsc;

use crate::llm::ConversationMessage;
use crate::session::ChatSettings;

// ============================================================================
// Chat Events
// ============================================================================

/// Events emitted by the chat client during a turn
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ChatEvent {
    /// Streamed model text
    Token { content: String },

    /// The model opened a tool-use block
    ToolCall { name: String },

    /// Raw fragment of the tool arguments being streamed
    ToolInput { partial_json: String },

    /// A tool finished
    ToolResult {
        name: String,
        content: Value,
        is_error: bool,
    },

    /// The turn failed
    Error { message: String },
}

// ============================================================================
// Wire envelope
// ============================================================================

/// Final chat state sent once a turn settles
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatSnapshot {
    pub id: String,
    pub title: String,
    pub messages: Vec<ConversationMessage>,
    pub settings: ChatSettings,
}

/// Envelope streamed to live consumers, one JSON object per event
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StreamEnvelope {
    Token { content: String },
    Complete { data: ChatSnapshot },
    Error { error: String },
}

impl StreamEnvelope {
    /// Render a chat event as a plain-text envelope
    pub fn from_event(event: ChatEvent) -> Self {
        match event {
            ChatEvent::Token { content } => StreamEnvelope::Token { content },
            ChatEvent::ToolCall { name } => StreamEnvelope::Token {
                content: format!("\n[Tool Call] {}\n", name),
            },
            ChatEvent::ToolInput { partial_json } => StreamEnvelope::Token {
                content: partial_json,
            },
            ChatEvent::ToolResult { content, .. } => StreamEnvelope::Token {
                content: format!(
                    "\nResult: {}\n",
                    serde_json::to_string_pretty(&content).unwrap_or_default()
                ),
            },
            ChatEvent::Error { message } => StreamEnvelope::Error { error: message },
        }
    }
}

// ============================================================================
// Event Channel
// ============================================================================

/// Sender for chat events
pub type EventSender = mpsc::UnboundedSender<ChatEvent>;

/// Receiver for chat events
pub type EventReceiver = mpsc::UnboundedReceiver<ChatEvent>;

/// Create a new event channel
pub fn event_channel() -> (EventSender, EventReceiver) {
    mpsc::unbounded_channel()
}

/// Helper for sending events with a consistent API
#[derive(Clone, Default)]
pub struct ChatEventSender {
    sender: Option<EventSender>,
}

impl ChatEventSender {
    /// Create with an actual sender
    pub fn new(sender: EventSender) -> Self {
        Self {
            sender: Some(sender),
        }
    }

    /// Create a no-op sender (events are discarded)
    pub fn none() -> Self {
        Self { sender: None }
    }

    #[cfg(test)]
    fn is_active(&self) -> bool {
        self.sender.is_some()
    }

    /// Send an event (silently dropped if there is no receiver)
    pub fn send(&self, event: ChatEvent) {
        if let Some(ref sender) = self.sender {
            let _ = sender.send(event);
        }
    }

    pub fn token(&self, content: &str) {
        self.send(ChatEvent::Token {
            content: content.to_string(),
        });
    }

    pub fn tool_call(&self, name: &str) {
        self.send(ChatEvent::ToolCall {
            name: name.to_string(),
        });
    }

    pub fn tool_input(&self, partial_json: &str) {
        self.send(ChatEvent::ToolInput {
            partial_json: partial_json.to_string(),
        });
    }

    pub fn tool_result(&self, name: &str, content: &Value, is_error: bool) {
        self.send(ChatEvent::ToolResult {
            name: name.to_string(),
            content: content.clone(),
            is_error,
        });
    }

    pub fn error(&self, message: &str) {
        self.send(ChatEvent::Error {
            message: message.to_string(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_envelope_wire_format() {
        let token = StreamEnvelope::Token {
            content: "Hel".into(),
        };
        assert_eq!(
            serde_json::to_string(&token).unwrap(),
            r#"{"type":"token","content":"Hel"}"#
        );

        let error = StreamEnvelope::from_event(ChatEvent::Error {
            message: "boom".into(),
        });
        assert_eq!(
            serde_json::to_string(&error).unwrap(),
            r#"{"type":"error","error":"boom"}"#
        );
    }

    #[test]
    fn test_tool_call_renders_as_token() {
        match StreamEnvelope::from_event(ChatEvent::ToolCall {
            name: "list_pods".into(),
        }) {
            StreamEnvelope::Token { content } => assert_eq!(content, "\n[Tool Call] list_pods\n"),
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_event_sender() {
        let (tx, mut rx) = event_channel();
        let sender = ChatEventSender::new(tx);
        assert!(sender.is_active());

        sender.token("Hello");
        sender.tool_call("echo");

        assert_eq!(
            rx.recv().await.unwrap(),
            ChatEvent::Token {
                content: "Hello".into()
            }
        );
        assert_eq!(
            rx.recv().await.unwrap(),
            ChatEvent::ToolCall {
                name: "echo".into()
            }
        );
    }

    #[test]
    fn test_none_sender_discards() {
        let sender = ChatEventSender::none();
        assert!(!sender.is_active());
        sender.token("ignored");
    }
}
