//! Chat client - Claude with MCP tools
//!
//! One turn runs as a small state machine:
//! 1. AwaitingModel: stream a completion over the full history and the
//!    combined tool catalog
//! 2. AwaitingTool: apply the streamed items in order, invoking each
//!    requested tool and appending the use/result pair
//! 3. If any tool ran, go back to 1; otherwise the turn is Flushed
//!
//! The number of model round-trips after a tool call is bounded.

use std::sync::Arc;

use crate::error::{ChatError, SessionError};
use crate::llm::{
    CompletionRequest, CompletionService, ConversationMessage, ToolDefinition, ToolUseBlock,
};
use crate::mcp::McpClientPool;
use crate::output::{transcript, OutputWriter};
use crate::session::{ChatSession, SessionStore};
use crate::streaming::{StreamItem, StreamProcessor};

// Event emission for real-time visibility
pub mod events;
pub use events::{
    event_channel, ChatEvent, ChatEventSender, ChatSnapshot, EventReceiver, EventSender,
    StreamEnvelope,
};

/// System prompt used when a chat has none
pub const DEFAULT_SYSTEM_PROMPT: &str = "
You are a generic AI agent assistant.
You are given tools via MCP servers to assist with tasks.
Use the tools as needed to complete the user's tasks.
If you need help, ask the user for more information.
If you are asked to retrieve logs, please only tail the last 100 lines of the logs.
";

/// Default completion token limit
pub const DEFAULT_MAX_TOKENS: u32 = 4096;

/// Default bound on model round-trips triggered by tool calls
pub const DEFAULT_MAX_TOOL_ROUNDS: usize = 10;

/// Where a turn currently is
#[derive(Debug)]
enum TurnState {
    AwaitingModel { depth: usize },
    AwaitingTool { depth: usize, items: Vec<StreamItem> },
    Flushed,
}

/// A chat client bound to a completion service and a set of tool servers
pub struct ChatClient {
    completion: Arc<dyn CompletionService>,
    pool: McpClientPool,
    default_system_prompt: Option<String>,
    max_tokens: u32,
    max_tool_rounds: usize,
    event_sender: ChatEventSender,
}

impl ChatClient {
    /// Create a client with no connected servers
    pub fn new(completion: Arc<dyn CompletionService>, pool: McpClientPool) -> Self {
        Self {
            completion,
            pool,
            default_system_prompt: Some(DEFAULT_SYSTEM_PROMPT.to_string()),
            max_tokens: DEFAULT_MAX_TOKENS,
            max_tool_rounds: DEFAULT_MAX_TOOL_ROUNDS,
            event_sender: ChatEventSender::none(),
        }
    }

    /// Set the completion token limit
    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    /// Set the bound on tool-triggered model round-trips
    pub fn with_max_tool_rounds(mut self, rounds: usize) -> Self {
        self.max_tool_rounds = rounds;
        self
    }

    /// Prompt used for chats that have no system prompt of their own
    pub fn with_default_system_prompt(mut self, prompt: Option<String>) -> Self {
        self.default_system_prompt = prompt;
        self
    }

    /// Set event sender dynamically
    pub fn set_event_sender(&mut self, sender: Option<EventSender>) {
        self.event_sender = match sender {
            Some(s) => ChatEventSender::new(s),
            None => ChatEventSender::none(),
        };
    }

    /// Access the MCP pool
    pub fn pool(&self) -> &McpClientPool {
        &self.pool
    }

    pub fn max_tool_rounds(&self) -> usize {
        self.max_tool_rounds
    }

    /// Connect each server, warning about and skipping failures
    pub async fn connect_servers(&mut self, specs: &[String]) -> Vec<String> {
        if specs.is_empty() {
            tracing::warn!("No mcp server specified. Starting chat loop without server.");
            return Vec::new();
        }
        self.pool.connect_all(specs).await
    }

    /// Load a saved chat
    ///
    /// Unless `reconnect_servers` is false, every server listed in the chat
    /// settings is connected. When `echo` is given, the history is written
    /// to it.
    pub async fn resume(
        &mut self,
        store: &SessionStore,
        id: &str,
        echo: Option<&dyn OutputWriter>,
        reconnect_servers: bool,
    ) -> Result<ChatSession, SessionError> {
        let session = store.load(id).map_err(|e| {
            tracing::error!("Failed to load chat file {}: {}", id, e);
            e
        })?;

        if reconnect_servers {
            let servers = session.settings.server_list().to_vec();
            if !servers.is_empty() {
                self.pool.connect_all(&servers).await;
            }
        }

        if let Some(output) = echo {
            for event in transcript(&session.messages) {
                output.write(event);
            }
            output.flush();
        }

        Ok(session)
    }

    /// Run one user turn to completion
    ///
    /// Returns the assistant text produced during the turn. On error the
    /// messages appended before the failure stay in the session.
    pub async fn process_query(
        &mut self,
        session: &mut ChatSession,
        query: &str,
    ) -> Result<String, ChatError> {
        session.messages.push(ConversationMessage::user(query));

        let mut response = Vec::new();
        let mut state = TurnState::AwaitingModel { depth: 0 };

        loop {
            state = match state {
                TurnState::AwaitingModel { depth } => {
                    let items = self.request_completion(session).await.map_err(|e| {
                        self.event_sender.error(&e.to_string());
                        e
                    })?;
                    TurnState::AwaitingTool { depth, items }
                }
                TurnState::AwaitingTool { depth, items } => {
                    let mut ran_tool = false;
                    for item in items {
                        match item {
                            StreamItem::Text(text) => {
                                response.push(text.clone());
                                session.messages.push(ConversationMessage::assistant(text));
                            }
                            StreamItem::ToolUse(block) => {
                                self.run_tool(session, block).await?;
                                ran_tool = true;
                            }
                        }
                    }

                    if !ran_tool {
                        TurnState::Flushed
                    } else if depth >= self.max_tool_rounds {
                        let err = ChatError::MaxToolCallDepthExceeded {
                            limit: self.max_tool_rounds,
                        };
                        tracing::warn!("{}", err);
                        self.event_sender.error(&err.to_string());
                        return Err(err);
                    } else {
                        TurnState::AwaitingModel { depth: depth + 1 }
                    }
                }
                TurnState::Flushed => break,
            };
        }

        Ok(response.join("\n"))
    }

    /// Close every server connection
    pub async fn cleanup(&mut self) {
        self.pool.close_all().await;
    }

    async fn request_completion(
        &self,
        session: &ChatSession,
    ) -> Result<Vec<StreamItem>, ChatError> {
        let system = session
            .settings
            .system_prompt
            .clone()
            .or_else(|| self.default_system_prompt.clone());

        let request = CompletionRequest {
            model: session.settings.model.clone(),
            max_tokens: self.max_tokens,
            system,
            messages: session.messages.clone(),
            tools: self.pool.tools().iter().map(ToolDefinition::from).collect(),
            stream: true,
        };

        let stream = self.completion.stream(request).await?;
        Ok(StreamProcessor::process(self.event_sender.clone(), stream).await?)
    }

    /// Invoke one tool and append the use/result pair
    async fn run_tool(
        &self,
        session: &mut ChatSession,
        block: ToolUseBlock,
    ) -> Result<(), ChatError> {
        let output = match self.pool.call_tool(&block.name, block.arguments()).await {
            Ok(output) => output,
            Err(e) => {
                let err = ChatError::ToolInvocation {
                    name: block.name.clone(),
                    message: e.to_string(),
                };
                tracing::error!("{}", err);
                self.event_sender.error(&err.to_string());
                return Err(err);
            }
        };

        self.event_sender
            .tool_result(&block.name, &output.content, output.is_error);

        let tool_use_id = block.id.clone();
        session.messages.push(ConversationMessage::tool_use(block));
        session.messages.push(ConversationMessage::tool_result(
            tool_use_id,
            output.content,
            output.is_error,
        ));
        Ok(())
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::error::CompletionError;
    use crate::llm::{BlockDelta, BlockStart, ContentBlock, EventStream, MessageContent, StreamEvent};
    use crate::mcp::manager::tests::RecordingLauncher;
    use crate::session::ChatSettings;
    use async_trait::async_trait;
    use futures_util::{stream, StreamExt};
    use std::collections::VecDeque;
    use std::sync::Mutex;

    /// Plays back one scripted response per request
    #[derive(Default)]
    pub(crate) struct ScriptedCompletion {
        responses: Mutex<VecDeque<Vec<StreamEvent>>>,
        pub requests: Mutex<Vec<CompletionRequest>>,
        /// Response used once the script runs out
        repeat: Option<Vec<StreamEvent>>,
    }

    impl ScriptedCompletion {
        pub(crate) fn new(responses: Vec<Vec<StreamEvent>>) -> Self {
            Self {
                responses: Mutex::new(responses.into()),
                ..Default::default()
            }
        }

        pub(crate) fn repeating(response: Vec<StreamEvent>) -> Self {
            Self {
                repeat: Some(response),
                ..Default::default()
            }
        }
    }

    #[async_trait]
    impl CompletionService for ScriptedCompletion {
        async fn stream(&self, request: CompletionRequest) -> Result<EventStream, CompletionError> {
            self.requests.lock().unwrap().push(request);
            let events = self
                .responses
                .lock()
                .unwrap()
                .pop_front()
                .or_else(|| self.repeat.clone())
                .ok_or_else(|| CompletionError::Api("script exhausted".into()))?;
            Ok(stream::iter(events.into_iter().map(Ok)).boxed())
        }
    }

    pub(crate) fn text_response(text: &str) -> Vec<StreamEvent> {
        vec![
            StreamEvent::MessageStart {
                message: serde_json::Value::Null,
            },
            StreamEvent::ContentBlockStart {
                index: 0,
                content_block: BlockStart::Text {
                    text: String::new(),
                },
            },
            StreamEvent::ContentBlockDelta {
                index: 0,
                delta: BlockDelta::TextDelta { text: text.into() },
            },
            StreamEvent::ContentBlockStop { index: 0 },
            StreamEvent::MessageStop,
        ]
    }

    pub(crate) fn tool_response(id: &str, name: &str, input: &str) -> Vec<StreamEvent> {
        vec![
            StreamEvent::ContentBlockStart {
                index: 0,
                content_block: BlockStart::ToolUse {
                    id: id.into(),
                    name: name.into(),
                },
            },
            StreamEvent::ContentBlockDelta {
                index: 0,
                delta: BlockDelta::InputJsonDelta {
                    partial_json: input.into(),
                },
            },
            StreamEvent::ContentBlockStop { index: 0 },
            StreamEvent::MessageStop,
        ]
    }

    async fn client_with_server(completion: Arc<ScriptedCompletion>) -> ChatClient {
        let mut pool = McpClientPool::new(Arc::new(RecordingLauncher::default()));
        pool.connect("npx echo").await.unwrap();
        ChatClient::new(completion, pool)
    }

    #[tokio::test]
    async fn test_plain_turn_appends_two_messages() {
        let completion = Arc::new(ScriptedCompletion::new(vec![text_response("Hi!")]));
        let mut client = ChatClient::new(completion.clone(), McpClientPool::new(Arc::new(RecordingLauncher::default())));
        let mut session = ChatSession::new(ChatSettings::default());

        let reply = client.process_query(&mut session, "hello").await.unwrap();

        assert_eq!(reply, "Hi!");
        assert_eq!(session.messages.len(), 2);
        assert_eq!(session.messages[0].as_text(), Some("hello"));
        assert_eq!(session.messages[1].as_text(), Some("Hi!"));

        let requests = completion.requests.lock().unwrap();
        assert_eq!(requests[0].system.as_deref(), Some(DEFAULT_SYSTEM_PROMPT));
        assert!(requests[0].tools.is_empty());
    }

    #[tokio::test]
    async fn test_tool_round_trip() {
        let completion = Arc::new(ScriptedCompletion::new(vec![
            tool_response("toolu_1", "echo_tool", r#"{"text":"ping"}"#),
            text_response("Done."),
        ]));
        let mut client = client_with_server(completion.clone()).await;
        let mut session = ChatSession::new(ChatSettings::default());

        let reply = client.process_query(&mut session, "use the tool").await.unwrap();
        assert_eq!(reply, "Done.");

        // user, tool_use, tool_result, assistant text
        assert_eq!(session.messages.len(), 4);
        match &session.messages[2].content {
            MessageContent::Blocks(blocks) => match &blocks[0] {
                ContentBlock::ToolResult { tool_use_id, .. } => assert_eq!(tool_use_id, "toolu_1"),
                other => panic!("expected tool_result, got {:?}", other),
            },
            other => panic!("expected blocks, got {:?}", other),
        }

        let requests = completion.requests.lock().unwrap();
        assert_eq!(requests.len(), 2);
        assert_eq!(requests[1].messages.len(), 3);
        assert_eq!(requests[1].tools[0].name, "echo_tool");
    }

    #[tokio::test]
    async fn test_depth_bound() {
        let completion = Arc::new(ScriptedCompletion::repeating(tool_response(
            "toolu_loop",
            "echo_tool",
            "{}",
        )));
        let mut client = client_with_server(completion.clone())
            .await
            .with_max_tool_rounds(3);
        let mut session = ChatSession::new(ChatSettings::default());

        let err = client.process_query(&mut session, "loop").await.unwrap_err();
        assert!(matches!(err, ChatError::MaxToolCallDepthExceeded { limit: 3 }));
        assert_eq!(completion.requests.lock().unwrap().len(), 4);
    }

    #[tokio::test]
    async fn test_unknown_tool_aborts_turn() {
        let completion = Arc::new(ScriptedCompletion::new(vec![tool_response(
            "toolu_1",
            "missing_tool",
            "{}",
        )]));
        let mut client = client_with_server(completion).await;
        let (tx, mut rx) = event_channel();
        client.set_event_sender(Some(tx));
        let mut session = ChatSession::new(ChatSettings::default());

        let err = client.process_query(&mut session, "go").await.unwrap_err();
        assert!(matches!(err, ChatError::ToolInvocation { .. }));
        // nothing appended for the failed tool
        assert_eq!(session.messages.len(), 1);

        let mut saw_error = false;
        while let Ok(event) = rx.try_recv() {
            if matches!(event, ChatEvent::Error { .. }) {
                saw_error = true;
            }
        }
        assert!(saw_error);
    }

    #[tokio::test]
    async fn test_malformed_tool_input_still_runs_tool() {
        let completion = Arc::new(ScriptedCompletion::new(vec![
            tool_response("toolu_1", "echo_tool", r#"{"text": "#),
            text_response("ok"),
        ]));
        let mut client = client_with_server(completion).await;
        let mut session = ChatSession::new(ChatSettings::default());

        client.process_query(&mut session, "go").await.unwrap();
        let uses: Vec<_> = session.messages[1].tool_uses().collect();
        assert_eq!(uses[0].1, &serde_json::json!({}));
    }

    #[tokio::test]
    async fn test_session_system_prompt_wins() {
        let completion = Arc::new(ScriptedCompletion::new(vec![text_response("ok")]));
        let mut client = ChatClient::new(completion.clone(), McpClientPool::default());
        let mut settings = ChatSettings::default();
        settings.system_prompt = Some("Be terse.".into());
        let mut session = ChatSession::new(settings);

        client.process_query(&mut session, "hi").await.unwrap();
        assert_eq!(
            completion.requests.lock().unwrap()[0].system.as_deref(),
            Some("Be terse.")
        );
    }
}
