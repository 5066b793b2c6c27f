//! MCP type definitions
//!
//! Shared types used across the transport, manager and pool.

use serde::Serialize;
use serde_json::Value;

/// Tool arguments as sent over the protocol
pub type JsonObject = serde_json::Map<String, Value>;

/// A tool advertised by a connected MCP server
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct McpTool {
    /// Launch string of the server this tool belongs to
    pub server: String,
    /// Tool name
    pub name: String,
    /// Tool description
    pub description: Option<String>,
    /// Input schema (JSON)
    pub input_schema: Value,
}

/// Result of a tool invocation
#[derive(Debug, Clone, PartialEq)]
pub struct ToolOutput {
    /// Content blocks as returned by the server (JSON array)
    pub content: Value,
    /// Whether the server flagged the call as failed
    pub is_error: bool,
}

impl ToolOutput {
    /// Plain text result
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            content: serde_json::json!([{ "type": "text", "text": text.into() }]),
            is_error: false,
        }
    }

    /// Concatenated text of all text content blocks
    pub fn text_content(&self) -> String {
        let mut output = String::new();
        if let Value::Array(blocks) = &self.content {
            for block in blocks {
                let piece = match block.get("text").and_then(Value::as_str) {
                    Some(text) => text.to_string(),
                    None => block.to_string(),
                };
                if !output.is_empty() {
                    output.push('\n');
                }
                output.push_str(&piece);
            }
        }
        output
    }
}
