//! Stream buffer for accumulating streamed responses
//!
//! Holds the open text run and the open tool-use block. Tool input arrives
//! as raw JSON fragments that are only parsed once the block closes.

use serde_json::Value;

use crate::llm::ToolUseBlock;

/// A tool-use block whose input is still streaming
#[derive(Debug, Clone)]
struct PendingTool {
    id: String,
    name: String,
    input: String,
}

/// Buffer for the block currently being streamed
#[derive(Debug, Default)]
pub struct StreamBuffer {
    /// Accumulated assistant text since the last flush
    text: String,
    /// Open tool-use block, if any
    tool: Option<PendingTool>,
}

impl StreamBuffer {
    /// Create a new empty buffer
    pub fn new() -> Self {
        Self::default()
    }

    /// Push text content to the buffer
    pub fn push_text(&mut self, text: &str) {
        self.text.push_str(text);
    }

    #[cfg(test)]
    fn text(&self) -> &str {
        &self.text
    }

    /// Take the accumulated text, leaving the buffer empty
    pub fn take_text(&mut self) -> Option<String> {
        if self.text.is_empty() {
            None
        } else {
            Some(std::mem::take(&mut self.text))
        }
    }

    /// Open a tool-use block
    pub fn start_tool(&mut self, id: &str, name: &str) {
        self.tool = Some(PendingTool {
            id: id.to_string(),
            name: name.to_string(),
            input: String::new(),
        });
    }

    #[cfg(test)]
    fn has_tool(&self) -> bool {
        self.tool.is_some()
    }

    /// Append a raw input fragment to the open tool block
    ///
    /// Returns false when no tool block is open.
    pub fn push_tool_input(&mut self, fragment: &str) -> bool {
        match self.tool.as_mut() {
            Some(tool) => {
                tool.input.push_str(fragment);
                true
            }
            None => false,
        }
    }

    /// Close the open tool block and parse its input
    pub fn finish_tool(&mut self) -> Option<ToolUseBlock> {
        let tool = self.tool.take()?;
        let (input, input_valid) = parse_tool_input(&tool.name, &tool.input);
        Some(ToolUseBlock {
            id: tool.id,
            name: tool.name,
            input,
            input_valid,
        })
    }
}

/// Parse accumulated tool input
///
/// Empty input means no arguments. Anything that is not a JSON object
/// degrades to `{}` and is flagged invalid.
fn parse_tool_input(tool_name: &str, raw: &str) -> (Value, bool) {
    if raw.trim().is_empty() {
        return (Value::Object(Default::default()), true);
    }

    match serde_json::from_str::<Value>(raw) {
        Ok(value @ Value::Object(_)) => (value, true),
        Ok(other) => {
            tracing::warn!(
                "Tool input for {} is not a JSON object ({}), calling without arguments",
                tool_name,
                other
            );
            (Value::Object(Default::default()), false)
        }
        Err(e) => {
            tracing::warn!(
                "Error parsing tool input JSON for {}: {}, calling without arguments",
                tool_name,
                e
            );
            (Value::Object(Default::default()), false)
        }
    }
}
