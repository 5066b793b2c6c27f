//! End-to-end chat turns against scripted backends
//!
//! A scripted completion service and an in-memory tool server drive the
//! public client API through real chat files in a temp directory.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use futures_util::{stream, StreamExt};
use serde_json::{json, Value};
use tempfile::TempDir;

use mcp_chat::agent::{event_channel, ChatEvent, StreamEnvelope};
use mcp_chat::error::{CompletionError, TransportError};
use mcp_chat::llm::{
    BlockDelta, BlockStart, CompletionRequest, CompletionService, EventStream, MessageContent,
    Role, StreamEvent,
};
use mcp_chat::mcp::{
    JsonObject, McpClientPool, McpTool, ServerCommand, ToolOutput, ToolTransport,
    TransportLauncher,
};
use mcp_chat::{ChatClient, ChatError, ChatSettings, SessionStore};

// ============================================================================
// Scripted backends
// ============================================================================

struct Script {
    responses: Mutex<VecDeque<Vec<StreamEvent>>>,
    repeat: Option<Vec<StreamEvent>>,
    requests: Mutex<Vec<CompletionRequest>>,
}

impl Script {
    fn new(responses: Vec<Vec<StreamEvent>>) -> Arc<Self> {
        Arc::new(Self {
            responses: Mutex::new(responses.into()),
            repeat: None,
            requests: Mutex::new(Vec::new()),
        })
    }

    fn repeating(response: Vec<StreamEvent>) -> Arc<Self> {
        Arc::new(Self {
            responses: Mutex::new(VecDeque::new()),
            repeat: Some(response),
            requests: Mutex::new(Vec::new()),
        })
    }

    fn request_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }
}

#[async_trait]
impl CompletionService for Script {
    async fn stream(&self, request: CompletionRequest) -> Result<EventStream, CompletionError> {
        self.requests.lock().unwrap().push(request);
        let events = self
            .responses
            .lock()
            .unwrap()
            .pop_front()
            .or_else(|| self.repeat.clone())
            .ok_or_else(|| CompletionError::Api("no scripted response left".into()))?;
        Ok(stream::iter(events.into_iter().map(Ok)).boxed())
    }
}

fn text_response(text: &str) -> Vec<StreamEvent> {
    vec![
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

fn tool_response(id: &str, name: &str, input: &str) -> Vec<StreamEvent> {
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

/// Serves a single `get_weather` tool that echoes its city argument
#[derive(Default)]
struct WeatherLauncher {
    calls: Arc<Mutex<Vec<Option<JsonObject>>>>,
}

struct WeatherTransport {
    calls: Arc<Mutex<Vec<Option<JsonObject>>>>,
}

#[async_trait]
impl TransportLauncher for WeatherLauncher {
    async fn launch(&self, _command: &ServerCommand) -> Result<Box<dyn ToolTransport>, TransportError> {
        Ok(Box::new(WeatherTransport {
            calls: self.calls.clone(),
        }))
    }
}

#[async_trait]
impl ToolTransport for WeatherTransport {
    async fn list_tools(&self, server: &str) -> Result<Vec<McpTool>, TransportError> {
        Ok(vec![McpTool {
            server: server.to_string(),
            name: "get_weather".into(),
            description: Some("Current weather for a city".into()),
            input_schema: json!({
                "type": "object",
                "properties": { "city": { "type": "string" } }
            }),
        }])
    }

    async fn call_tool(
        &self,
        _name: &str,
        arguments: Option<JsonObject>,
    ) -> Result<ToolOutput, TransportError> {
        let city = arguments
            .as_ref()
            .and_then(|args| args.get("city"))
            .and_then(Value::as_str)
            .unwrap_or("nowhere")
            .to_string();
        self.calls.lock().unwrap().push(arguments);
        Ok(ToolOutput::text(format!("Sunny in {}", city)))
    }

    async fn close(self: Box<Self>) -> Result<(), TransportError> {
        Ok(())
    }
}

async fn weather_client(script: Arc<Script>, launcher: WeatherLauncher) -> ChatClient {
    let mut pool = McpClientPool::new(Arc::new(launcher));
    pool.connect("npx weather-server").await.unwrap();
    ChatClient::new(script, pool)
}

// ============================================================================
// Tests
// ============================================================================

#[tokio::test]
async fn test_single_turn_persists_two_messages() {
    let dir = TempDir::new().unwrap();
    let store = SessionStore::new(dir.path());
    let created = store.create(ChatSettings::with_model("claude-test")).unwrap();

    let script = Script::new(vec![text_response("Hi there!")]);
    let mut client = ChatClient::new(script.clone(), McpClientPool::default());
    let mut session = store.load(&created.id).unwrap();

    let reply = client.process_query(&mut session, "hello").await.unwrap();
    store.save(&mut session).unwrap();

    assert_eq!(reply, "Hi there!");
    let saved = store.load(&created.id).unwrap();
    assert_eq!(saved.messages.len(), 2);
    assert_eq!(saved.messages[0].role, Role::User);
    assert_eq!(saved.messages[1].as_text(), Some("Hi there!"));

    let raw: Value =
        serde_json::from_str(&std::fs::read_to_string(dir.path().join(&created.id)).unwrap())
            .unwrap();
    assert_eq!(raw["messages"][0]["content"], "hello");
    assert_eq!(raw["settings"]["model"], "claude-test");
    assert_eq!(script.requests.lock().unwrap()[0].model, "claude-test");
}

#[tokio::test]
async fn test_tool_round_trip() {
    let launcher = WeatherLauncher::default();
    let calls = launcher.calls.clone();
    let script = Script::new(vec![
        tool_response("toolu_1", "get_weather", r#"{"city": "Paris"}"#),
        text_response("It is sunny in Paris."),
    ]);
    let mut client = weather_client(script.clone(), launcher).await;

    let (tx, mut rx) = event_channel();
    client.set_event_sender(Some(tx));

    let mut session = mcp_chat::ChatSession::new(ChatSettings::default());
    let reply = client
        .process_query(&mut session, "Weather in Paris?")
        .await
        .unwrap();
    client.set_event_sender(None);

    assert_eq!(reply, "It is sunny in Paris.");
    assert_eq!(session.messages.len(), 4);
    assert_eq!(calls.lock().unwrap()[0].as_ref().unwrap()["city"], "Paris");

    match &session.messages[2].content {
        MessageContent::Blocks(blocks) => {
            let json = serde_json::to_value(blocks).unwrap();
            assert_eq!(json[0]["type"], "tool_result");
            assert_eq!(json[0]["tool_use_id"], "toolu_1");
        }
        other => panic!("expected tool result blocks, got {:?}", other),
    }

    // second request carries the tool result and the catalog
    let requests = script.requests.lock().unwrap();
    assert_eq!(requests.len(), 2);
    assert_eq!(requests[1].messages.len(), 3);
    assert_eq!(requests[1].tools[0].name, "get_weather");
    drop(requests);

    let mut saw_call = false;
    let mut saw_result = false;
    while let Ok(event) = rx.try_recv() {
        match event {
            ChatEvent::ToolCall { name } => saw_call |= name == "get_weather",
            ChatEvent::ToolResult { is_error, .. } => saw_result |= !is_error,
            _ => {}
        }
    }
    assert!(saw_call);
    assert!(saw_result);

    client.cleanup().await;
    assert!(client.pool().tools().is_empty());
}

#[tokio::test]
async fn test_endless_tool_requests_hit_depth_bound() {
    let script = Script::repeating(tool_response("toolu_x", "get_weather", r#"{"city": "Oslo"}"#));
    let mut client = weather_client(script.clone(), WeatherLauncher::default())
        .await
        .with_max_tool_rounds(3);

    let mut session = mcp_chat::ChatSession::new(ChatSettings::default());
    let err = client
        .process_query(&mut session, "loop forever")
        .await
        .unwrap_err();

    assert!(matches!(err, ChatError::MaxToolCallDepthExceeded { limit: 3 }));
    assert_eq!(script.request_count(), 4);
    // user message plus a use/result pair per executed tool
    assert_eq!(session.messages.len(), 1 + 2 * 4);
}

#[tokio::test]
async fn test_completion_failure_keeps_user_message() {
    let dir = TempDir::new().unwrap();
    let store = SessionStore::new(dir.path());
    let created = store.create(ChatSettings::default()).unwrap();

    let script = Script::new(vec![]);
    let mut client = ChatClient::new(script, McpClientPool::default());
    let mut session = store.load(&created.id).unwrap();

    let err = client.process_query(&mut session, "anyone?").await.unwrap_err();
    assert!(matches!(err, ChatError::Completion(_)));

    store.save(&mut session).unwrap();
    assert_eq!(store.load(&created.id).unwrap().messages.len(), 1);
}

#[tokio::test]
async fn test_resume_reconnects_saved_servers() {
    let dir = TempDir::new().unwrap();
    let store = SessionStore::new(dir.path());
    let mut settings = ChatSettings::default();
    settings.servers = Some(vec!["npx weather-server".into()]);
    let created = store.create(settings).unwrap();

    let pool = McpClientPool::new(Arc::new(WeatherLauncher::default()));
    let mut client = ChatClient::new(Script::new(vec![]), pool);
    let session = client.resume(&store, &created.id, None, true).await.unwrap();

    assert_eq!(session.id.as_deref(), Some(created.id.as_str()));
    assert_eq!(client.pool().server_names(), vec!["npx weather-server"]);
    client.cleanup().await;
}

#[tokio::test]
async fn test_turn_snapshot_envelope() {
    let dir = TempDir::new().unwrap();
    let store = SessionStore::new(dir.path());
    let created = store.create(ChatSettings::default()).unwrap();

    let mut client = ChatClient::new(Script::new(vec![text_response("Hi!")]), McpClientPool::default());
    let mut session = store.load(&created.id).unwrap();
    client.process_query(&mut session, "hello").await.unwrap();
    store.save(&mut session).unwrap();

    let envelope = StreamEnvelope::Complete {
        data: session.snapshot(),
    };
    let json = serde_json::to_value(&envelope).unwrap();
    assert_eq!(json["type"], "complete");
    assert_eq!(json["data"]["id"], created.id);
    assert_eq!(json["data"]["messages"][1]["content"], "Hi!");

    let token = StreamEnvelope::from_event(ChatEvent::Token {
        content: "Hi".into(),
    });
    assert_eq!(
        serde_json::to_string(&token).unwrap(),
        r#"{"type":"token","content":"Hi"}"#
    );
}
