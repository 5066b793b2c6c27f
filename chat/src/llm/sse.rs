//! Server-Sent Events (SSE) decoding
//!
//! The Messages API streams `event:`/`data:` frames separated by blank
//! lines. [`SseDecoder`] is a line-driven decoder; [`sse_frames`] adapts a
//! reqwest response body into a stream of frames.

use futures_util::stream::{self, BoxStream, StreamExt};
use tokio::io::{AsyncBufReadExt, BufReader, Lines};
use tokio_util::bytes::Bytes;
use tokio_util::io::StreamReader;

/// A single SSE frame
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SseFrame {
    /// The event type (e.g. "message_start", "content_block_delta")
    pub event: Option<String>,
    /// The event data (JSON string)
    pub data: String,
}

/// Incremental line-based SSE decoder
#[derive(Debug, Default)]
pub struct SseDecoder {
    event: Option<String>,
    data: String,
}

impl SseDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one line (without its terminator); returns a frame on a blank line
    pub fn push_line(&mut self, line: &str) -> Option<SseFrame> {
        let line = line.strip_suffix('\r').unwrap_or(line);

        if line.is_empty() {
            return self.take_frame();
        }

        if let Some(event_type) = line.strip_prefix("event:") {
            self.event = Some(event_type.trim_start().to_string());
        } else if let Some(data) = line.strip_prefix("data:") {
            if !self.data.is_empty() {
                self.data.push('\n');
            }
            self.data.push_str(data.strip_prefix(' ').unwrap_or(data));
        }
        // id:, retry: and comments are ignored
        None
    }

    /// Flush a trailing frame at end of input
    pub fn finish(&mut self) -> Option<SseFrame> {
        self.take_frame()
    }

    fn take_frame(&mut self) -> Option<SseFrame> {
        let event = self.event.take();
        if self.data.is_empty() {
            return None;
        }
        Some(SseFrame {
            event,
            data: std::mem::take(&mut self.data),
        })
    }
}

type ByteLines = Lines<BufReader<StreamReader<BoxStream<'static, std::io::Result<Bytes>>, Bytes>>>;

struct FrameState {
    lines: ByteLines,
    decoder: SseDecoder,
    done: bool,
}

/// Decode a streaming response body into SSE frames
pub fn sse_frames(response: reqwest::Response) -> BoxStream<'static, std::io::Result<SseFrame>> {
    let bytes = response
        .bytes_stream()
        .map(|result| result.map_err(std::io::Error::other))
        .boxed();
    let lines = BufReader::new(StreamReader::new(bytes)).lines();

    let state = FrameState {
        lines,
        decoder: SseDecoder::new(),
        done: false,
    };

    stream::unfold(state, |mut state| async move {
        loop {
            if state.done {
                return None;
            }
            match state.lines.next_line().await {
                Ok(Some(line)) => {
                    if let Some(frame) = state.decoder.push_line(&line) {
                        return Some((Ok(frame), state));
                    }
                }
                Ok(None) => {
                    state.done = true;
                    let frame = state.decoder.finish()?;
                    return Some((Ok(frame), state));
                }
                Err(e) => {
                    state.done = true;
                    return Some((Err(e), state));
                }
            }
        }
    })
    .boxed()
}
