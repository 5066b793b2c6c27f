//! Completion service abstraction
//!
//! The chat loop only needs "send the conversation, get streamed events".
//! [`AnthropicClient`] implements that against the Messages API; tests use
//! scripted services.

mod anthropic;
mod message;
pub mod sse;

pub use anthropic::{AnthropicClient, AnthropicConfig, ANTHROPIC_API_URL, ANTHROPIC_VERSION};
pub use message::{ContentBlock, ConversationMessage, MessageContent, Role, ToolUseBlock};

use async_trait::async_trait;
use futures_util::stream::BoxStream;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::CompletionError;
use crate::mcp::McpTool;

/// Ordered stream of completion events
pub type EventStream = BoxStream<'static, Result<StreamEvent, CompletionError>>;

/// A tool definition as advertised to the model
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ToolDefinition {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub input_schema: Value,
}

impl From<&McpTool> for ToolDefinition {
    fn from(tool: &McpTool) -> Self {
        Self {
            name: tool.name.clone(),
            description: tool.description.clone(),
            input_schema: tool.input_schema.clone(),
        }
    }
}

/// One streaming request: full history plus the current tool catalog
#[derive(Debug, Clone, Serialize)]
pub struct CompletionRequest {
    pub model: String,
    pub max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system: Option<String>,
    pub messages: Vec<ConversationMessage>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub tools: Vec<ToolDefinition>,
    pub stream: bool,
}

/// Events of a streamed completion
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StreamEvent {
    MessageStart {
        #[serde(default)]
        message: Value,
    },
    ContentBlockStart {
        #[serde(default)]
        index: usize,
        content_block: BlockStart,
    },
    ContentBlockDelta {
        #[serde(default)]
        index: usize,
        delta: BlockDelta,
    },
    ContentBlockStop {
        #[serde(default)]
        index: usize,
    },
    MessageDelta {
        #[serde(default)]
        delta: Value,
    },
    MessageStop,
    Ping,
    Error {
        error: ApiErrorBody,
    },
}

/// The block announced by `content_block_start`
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BlockStart {
    Text {
        #[serde(default)]
        text: String,
    },
    ToolUse {
        id: String,
        name: String,
    },
    #[serde(other)]
    Other,
}

/// Incremental content of an open block
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BlockDelta {
    TextDelta { text: String },
    InputJsonDelta { partial_json: String },
    #[serde(other)]
    Other,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ApiErrorBody {
    #[serde(rename = "type", default)]
    pub kind: String,
    #[serde(default)]
    pub message: String,
}

/// Trait for streaming completion backends
#[async_trait]
pub trait CompletionService: Send + Sync {
    /// Start a streaming completion
    async fn stream(&self, request: CompletionRequest) -> Result<EventStream, CompletionError>;
}
