//! Streaming response processing
//!
//! Consumes the ordered event stream of one completion and materializes it
//! into ordered items: assistant text runs and closed tool-use blocks.
//! Text is forwarded to the event sink as it arrives; tool input is held
//! until its block closes.

mod buffer;

pub use buffer::StreamBuffer;

use futures_util::StreamExt;

use crate::agent::events::ChatEventSender;
use crate::error::CompletionError;
use crate::llm::{BlockDelta, BlockStart, EventStream, StreamEvent, ToolUseBlock};

/// An item produced by a completion stream, in emission order
#[derive(Debug, Clone, PartialEq)]
pub enum StreamItem {
    /// A completed run of assistant text
    Text(String),
    /// A closed tool-use block
    ToolUse(ToolUseBlock),
}

/// State machine over `content_block_start` / `delta` / `stop` events
pub struct StreamProcessor {
    buffer: StreamBuffer,
    events: ChatEventSender,
    items: Vec<StreamItem>,
}

impl StreamProcessor {
    pub fn new(events: ChatEventSender) -> Self {
        Self {
            buffer: StreamBuffer::new(),
            events,
            items: Vec::new(),
        }
    }

    /// Apply one event
    pub fn handle(&mut self, event: StreamEvent) {
        match event {
            StreamEvent::ContentBlockStart { content_block, .. } => match content_block {
                BlockStart::Text { text } => {
                    if !text.is_empty() {
                        self.push_text(&text);
                    }
                }
                BlockStart::ToolUse { id, name } => {
                    // text before a tool call is its own message
                    self.flush_text();
                    self.events.tool_call(&name);
                    self.buffer.start_tool(&id, &name);
                }
                BlockStart::Other => {}
            },
            StreamEvent::ContentBlockDelta { delta, .. } => match delta {
                BlockDelta::TextDelta { text } => self.push_text(&text),
                BlockDelta::InputJsonDelta { partial_json } => {
                    if self.buffer.push_tool_input(&partial_json) {
                        self.events.tool_input(&partial_json);
                    }
                }
                BlockDelta::Other => {}
            },
            StreamEvent::ContentBlockStop { .. } => {
                if let Some(block) = self.buffer.finish_tool() {
                    self.items.push(StreamItem::ToolUse(block));
                }
            }
            StreamEvent::MessageStart { .. }
            | StreamEvent::MessageDelta { .. }
            | StreamEvent::MessageStop
            | StreamEvent::Ping
            | StreamEvent::Error { .. } => {}
        }
    }

    /// End of stream: flush open text and return the items
    pub fn finish(mut self) -> Vec<StreamItem> {
        // a tool block left open by a truncated stream still gets recorded
        if let Some(block) = self.buffer.finish_tool() {
            self.items.push(StreamItem::ToolUse(block));
        }
        self.flush_text();
        self.items
    }

    /// Drive a whole stream through the state machine
    pub async fn process(
        events: ChatEventSender,
        mut stream: EventStream,
    ) -> Result<Vec<StreamItem>, CompletionError> {
        let mut processor = Self::new(events);
        while let Some(event) = stream.next().await {
            match event? {
                StreamEvent::Error { error } => {
                    return Err(CompletionError::Api(format!("{}: {}", error.kind, error.message)))
                }
                event => processor.handle(event),
            }
        }
        Ok(processor.finish())
    }

    fn push_text(&mut self, text: &str) {
        self.buffer.push_text(text);
        self.events.token(text);
    }

    fn flush_text(&mut self) {
        if let Some(text) = self.buffer.take_text() {
            self.items.push(StreamItem::Text(text));
        }
    }
}
