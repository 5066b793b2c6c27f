//! Conversation message types
//!
//! These serialize to the Messages API wire format and are stored verbatim
//! in chat files.

use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

/// Message content: either a plain string or a sequence of typed blocks
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MessageContent {
    Text(String),
    Blocks(Vec<ContentBlock>),
}

/// A content block
///
/// Blocks this client understands are typed. Anything else, including a
/// known block carrying extra fields, is kept as the raw JSON it was read
/// from and written back unchanged.
#[derive(Debug, Clone, PartialEq)]
pub enum ContentBlock {
    Text {
        text: String,
    },
    ToolUse {
        id: String,
        name: String,
        input: Value,
    },
    ToolResult {
        tool_use_id: String,
        content: Value,
        is_error: Option<bool>,
    },
    Other(Value),
}

impl ContentBlock {
    /// Text of a text block
    pub fn as_text(&self) -> Option<&str> {
        match self {
            ContentBlock::Text { text } => Some(text.as_str()),
            ContentBlock::Other(raw) if block_type(raw) == Some("text") => {
                raw.get("text").and_then(Value::as_str)
            }
            _ => None,
        }
    }

    /// Name and input of a tool-use block
    pub fn as_tool_use(&self) -> Option<(&str, &Value)> {
        match self {
            ContentBlock::ToolUse { name, input, .. } => Some((name.as_str(), input)),
            ContentBlock::Other(raw) if block_type(raw) == Some("tool_use") => {
                let name = raw.get("name").and_then(Value::as_str)?;
                Some((name, raw.get("input")?))
            }
            _ => None,
        }
    }
}

fn block_type(raw: &Value) -> Option<&str> {
    raw.get("type").and_then(Value::as_str)
}

// Key order follows what the Messages API SDKs write for these blocks
impl Serialize for ContentBlock {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            ContentBlock::Text { text } => {
                let mut map = serializer.serialize_map(Some(2))?;
                map.serialize_entry("type", "text")?;
                map.serialize_entry("text", text)?;
                map.end()
            }
            ContentBlock::ToolUse { id, name, input } => {
                let mut map = serializer.serialize_map(Some(4))?;
                map.serialize_entry("id", id)?;
                map.serialize_entry("type", "tool_use")?;
                map.serialize_entry("name", name)?;
                map.serialize_entry("input", input)?;
                map.end()
            }
            ContentBlock::ToolResult {
                tool_use_id,
                content,
                is_error,
            } => {
                let mut map = serializer.serialize_map(None)?;
                map.serialize_entry("tool_use_id", tool_use_id)?;
                map.serialize_entry("type", "tool_result")?;
                map.serialize_entry("content", content)?;
                if let Some(is_error) = is_error {
                    map.serialize_entry("is_error", is_error)?;
                }
                map.end()
            }
            ContentBlock::Other(raw) => raw.serialize(serializer),
        }
    }
}

impl<'de> Deserialize<'de> for ContentBlock {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Ok(ContentBlock::from_raw(Value::deserialize(deserializer)?))
    }
}

/// Wire shape of the typed blocks, used only when reading
#[derive(Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum KnownBlock {
    Text {
        text: String,
    },
    ToolUse {
        id: String,
        name: String,
        input: Value,
    },
    ToolResult {
        tool_use_id: String,
        content: Value,
        #[serde(default)]
        is_error: Option<bool>,
    },
}

impl ContentBlock {
    /// Type a raw block only when writing it back reproduces it exactly
    fn from_raw(raw: Value) -> Self {
        let typed = match serde_json::from_value::<KnownBlock>(raw.clone()) {
            Ok(KnownBlock::Text { text }) => ContentBlock::Text { text },
            Ok(KnownBlock::ToolUse { id, name, input }) => ContentBlock::ToolUse { id, name, input },
            Ok(KnownBlock::ToolResult {
                tool_use_id,
                content,
                is_error,
            }) => ContentBlock::ToolResult {
                tool_use_id,
                content,
                is_error,
            },
            Err(_) => return ContentBlock::Other(raw),
        };

        let same = match (serde_json::to_string(&typed), serde_json::to_string(&raw)) {
            (Ok(a), Ok(b)) => a == b,
            _ => false,
        };
        if same {
            typed
        } else {
            ContentBlock::Other(raw)
        }
    }
}

/// A message in the conversation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationMessage {
    pub role: Role,
    pub content: MessageContent,
}

impl ConversationMessage {
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: MessageContent::Text(text.into()),
        }
    }

    pub fn assistant(text: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: MessageContent::Text(text.into()),
        }
    }

    /// Assistant message carrying a single tool-use block
    pub fn tool_use(block: ToolUseBlock) -> Self {
        Self {
            role: Role::Assistant,
            content: MessageContent::Blocks(vec![ContentBlock::ToolUse {
                id: block.id,
                name: block.name,
                input: block.input,
            }]),
        }
    }

    /// User message carrying a single tool-result block
    pub fn tool_result(tool_use_id: impl Into<String>, content: Value, is_error: bool) -> Self {
        Self {
            role: Role::User,
            content: MessageContent::Blocks(vec![ContentBlock::ToolResult {
                tool_use_id: tool_use_id.into(),
                content,
                is_error: is_error.then_some(true),
            }]),
        }
    }

    /// Plain text of the message, if it is a text message
    pub fn as_text(&self) -> Option<&str> {
        match &self.content {
            MessageContent::Text(text) => Some(text),
            MessageContent::Blocks(_) => None,
        }
    }

    /// Tool-use blocks contained in the message
    pub fn tool_uses(&self) -> impl Iterator<Item = (&str, &Value)> {
        let blocks: &[ContentBlock] = match &self.content {
            MessageContent::Blocks(blocks) => blocks,
            MessageContent::Text(_) => &[],
        };
        blocks.iter().filter_map(ContentBlock::as_tool_use)
    }
}

/// A completed tool-use request from the model
#[derive(Debug, Clone, PartialEq)]
pub struct ToolUseBlock {
    pub id: String,
    pub name: String,
    /// Parsed arguments; `{}` when the streamed input was empty or malformed
    pub input: Value,
    /// False when the streamed input could not be parsed
    pub input_valid: bool,
}

impl ToolUseBlock {
    /// Arguments to send to the tool provider
    pub fn arguments(&self) -> Option<Value> {
        self.input_valid.then(|| self.input.clone())
    }
}
