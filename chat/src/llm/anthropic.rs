//! Anthropic Messages API client (streaming)

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use futures_util::StreamExt;

use super::sse::{sse_frames, SseFrame};
use super::{CompletionRequest, CompletionService, EventStream, StreamEvent};
use crate::error::{CompletionError, StartupError};

pub const ANTHROPIC_API_URL: &str = "https://api.anthropic.com";
pub const ANTHROPIC_VERSION: &str = "2023-06-01";

/// Event names the Messages API is documented to send
const KNOWN_EVENTS: &[&str] = &[
    "message_start",
    "content_block_start",
    "content_block_delta",
    "content_block_stop",
    "message_delta",
    "message_stop",
    "ping",
    "error",
];

/// Connection settings for the Messages API
#[derive(Clone)]
pub struct AnthropicConfig {
    pub api_key: String,
    pub base_url: String,
}

impl fmt::Debug for AnthropicConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AnthropicConfig")
            .field("api_key", &"[REDACTED]")
            .field("base_url", &self.base_url)
            .finish()
    }
}

impl AnthropicConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: ANTHROPIC_API_URL.to_string(),
        }
    }

    /// Build from an optional key, failing when it is absent or blank
    pub fn from_key(api_key: Option<String>) -> Result<Self, StartupError> {
        match api_key {
            Some(key) if !key.trim().is_empty() => Ok(Self::new(key)),
            _ => Err(StartupError::MissingApiKey),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }
}

/// Streaming client for the Messages API
pub struct AnthropicClient {
    config: AnthropicConfig,
    http: reqwest::Client,
}

impl AnthropicClient {
    pub fn new(config: AnthropicConfig) -> Self {
        let http = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .build()
            .unwrap_or_default();
        Self { config, http }
    }

    fn messages_url(&self) -> String {
        format!("{}/v1/messages", self.config.base_url.trim_end_matches('/'))
    }
}

/// Decode one SSE frame; unknown event kinds are skipped
pub(crate) fn decode_frame(frame: &SseFrame) -> Option<Result<StreamEvent, CompletionError>> {
    match serde_json::from_str::<StreamEvent>(&frame.data) {
        Ok(StreamEvent::Error { error }) => Some(Err(if error.kind == "rate_limit_error" {
            CompletionError::RateLimited
        } else {
            CompletionError::Api(format!("{}: {}", error.kind, error.message))
        })),
        Ok(event) => Some(Ok(event)),
        Err(e) => {
            let known = frame
                .event
                .as_deref()
                .map(|name| KNOWN_EVENTS.contains(&name))
                .unwrap_or(true);
            if known {
                Some(Err(CompletionError::Parse(e.to_string())))
            } else {
                tracing::debug!("Skipping unknown stream event: {:?}", frame.event);
                None
            }
        }
    }
}

#[async_trait]
impl CompletionService for AnthropicClient {
    async fn stream(&self, request: CompletionRequest) -> Result<EventStream, CompletionError> {
        tracing::debug!(
            model = %request.model,
            messages = request.messages.len(),
            tools = request.tools.len(),
            "Messages API streaming request"
        );

        let response = self
            .http
            .post(self.messages_url())
            .header("x-api-key", &self.config.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .header("content-type", "application/json")
            .json(&request)
            .send()
            .await
            .map_err(|e| CompletionError::Network(e.to_string()))?;

        let status = response.status();
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(CompletionError::RateLimited);
        }
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            let text = text.chars().take(200).collect::<String>();
            return Err(CompletionError::Api(format!("HTTP {status}: {text}")));
        }

        let events = sse_frames(response).filter_map(|frame| async move {
            match frame {
                Ok(frame) => decode_frame(&frame),
                Err(e) => Some(Err(CompletionError::Network(e.to_string()))),
            }
        });

        Ok(events.boxed())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame(event: &str, data: &str) -> SseFrame {
        SseFrame {
            event: Some(event.to_string()),
            data: data.to_string(),
        }
    }

    #[test]
    fn test_missing_key_is_startup_error() {
        assert_eq!(
            AnthropicConfig::from_key(None).unwrap_err(),
            StartupError::MissingApiKey
        );
        assert!(AnthropicConfig::from_key(Some("  ".into())).is_err());
        assert!(AnthropicConfig::from_key(Some("sk-test".into())).is_ok());
    }

    #[test]
    fn test_debug_redacts_key() {
        let config = AnthropicConfig::new("sk-secret");
        assert!(!format!("{:?}", config).contains("sk-secret"));
    }

    #[test]
    fn test_messages_url() {
        let client = AnthropicClient::new(
            AnthropicConfig::new("k").with_base_url("http://localhost:8080/"),
        );
        assert_eq!(client.messages_url(), "http://localhost:8080/v1/messages");
    }

    #[test]
    fn test_decode_error_event() {
        let decoded = decode_frame(&frame(
            "error",
            r#"{"type":"error","error":{"type":"overloaded_error","message":"Overloaded"}}"#,
        ));
        match decoded {
            Some(Err(CompletionError::Api(msg))) => assert!(msg.contains("Overloaded")),
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn test_decode_skips_unknown_event() {
        assert!(decode_frame(&frame("future_event", r#"{"type":"future_event"}"#)).is_none());
    }

    #[test]
    fn test_decode_text_delta() {
        let decoded = decode_frame(&frame(
            "content_block_delta",
            r#"{"type":"content_block_delta","index":0,"delta":{"type":"text_delta","text":"Hi"}}"#,
        ));
        assert!(matches!(decoded, Some(Ok(StreamEvent::ContentBlockDelta { .. }))));
    }
}
