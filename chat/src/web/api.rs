//! REST API handlers
//!
//! Chat ids are passed as the `chatId` query parameter. Message requests
//! answer with an SSE stream of token/complete/error envelopes.

use std::convert::Infallible;

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::sse::{Event, KeepAlive, Sse},
    Json,
};
use futures_util::stream::{self, Stream};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tokio::sync::mpsc;

use super::state::AppState;
use crate::agent::{event_channel, ChatEvent, StreamEnvelope};
use crate::error::SessionError;
use crate::session::{ChatListItem, ChatSession, ChatSettings};

/// Sent when a turn fails for any reason
pub const MESSAGE_FAILED: &str = "Failed to process message. Please check your server settings.";

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct ChatIdQuery {
    #[serde(rename = "chatId")]
    pub chat_id: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct MessageRequest {
    #[serde(default)]
    pub content: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

impl ErrorResponse {
    pub fn new(msg: impl Into<String>) -> Self {
        Self { error: msg.into() }
    }
}

type ApiError = (StatusCode, Json<ErrorResponse>);

fn api_error(status: StatusCode, msg: &str) -> ApiError {
    (status, Json(ErrorResponse::new(msg)))
}

fn require_chat_id(query: ChatIdQuery, msg: &str) -> Result<String, ApiError> {
    match query.chat_id {
        Some(id) if !id.is_empty() => Ok(id),
        _ => Err(api_error(StatusCode::BAD_REQUEST, msg)),
    }
}

/// Map a store error, logging it under `context`
fn store_error(e: SessionError, context: &str, msg: &str) -> ApiError {
    tracing::error!("{}: {}", context, e);
    match e {
        SessionError::NotFound(_) => api_error(StatusCode::NOT_FOUND, "Chat not found"),
        _ => api_error(StatusCode::INTERNAL_SERVER_ERROR, msg),
    }
}

// ============================================================================
// Chat Endpoints
// ============================================================================

/// GET /api/chats
pub async fn list_chats(State(state): State<AppState>) -> Result<Json<Vec<ChatListItem>>, ApiError> {
    state
        .store
        .list()
        .map(Json)
        .map_err(|e| store_error(e, "Error fetching chats", "Failed to fetch chats"))
}

/// POST /api/chat/create
pub async fn create_chat(State(state): State<AppState>) -> Result<Json<ChatListItem>, ApiError> {
    state
        .store
        .create(ChatSettings::with_model(state.model.clone()))
        .map(Json)
        .map_err(|e| store_error(e, "Error creating chat", "Failed to create chat"))
}

/// GET /api/chat?chatId=
pub async fn get_chat(
    State(state): State<AppState>,
    Query(query): Query<ChatIdQuery>,
) -> Result<Json<Value>, ApiError> {
    let id = require_chat_id(query, "chatId query parameter is required")?;
    let session = state
        .store
        .load(&id)
        .map_err(|e| store_error(e, "Error loading chat", "Failed to load chat"))?;

    let mut settings = Map::new();
    settings.insert("title".to_string(), Value::String(session.title.clone()));
    if let Ok(Value::Object(rest)) = serde_json::to_value(&session.settings) {
        settings.extend(rest);
    }

    Ok(Json(serde_json::json!({
        "id": id,
        "title": session.title,
        "messages": session.messages,
        "settings": settings,
    })))
}

/// PUT /api/chat/settings?chatId=
pub async fn update_settings(
    State(state): State<AppState>,
    Query(query): Query<ChatIdQuery>,
    Json(patch): Json<Map<String, Value>>,
) -> Result<Json<Map<String, Value>>, ApiError> {
    let id = require_chat_id(query, "chatId is required")?;
    state
        .store
        .update_settings(&id, patch)
        .map(Json)
        .map_err(|e| {
            store_error(e, "Error updating chat settings", "Failed to update chat settings")
        })
}

/// POST /api/chat/message?chatId=
pub async fn post_message(
    State(state): State<AppState>,
    Query(query): Query<ChatIdQuery>,
    Json(body): Json<MessageRequest>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, ApiError> {
    let id = require_chat_id(query, "chatId query parameter is required")?;
    let content = match body.content {
        Some(content) if !content.is_empty() => content,
        _ => {
            return Err(api_error(
                StatusCode::BAD_REQUEST,
                "content is required in request body",
            ))
        }
    };

    let session = state
        .store
        .load(&id)
        .map_err(|e| store_error(e, "Error in message handler", "Internal server error"))?;

    let (tx, rx) = mpsc::unbounded_channel();
    tokio::spawn(run_message(state, session, content, tx));

    let events = stream::unfold(rx, |mut rx| async move {
        let envelope = rx.recv().await?;
        let data = serde_json::to_string(&envelope).unwrap_or_default();
        Some((Ok(Event::default().data(data)), rx))
    });

    Ok(Sse::new(events).keep_alive(KeepAlive::default()))
}

/// Run one turn for a web request, sending envelopes as it goes
///
/// Servers listed in the chat settings are connected first; if any of them
/// fails, the request proceeds with no servers at all. The client and its
/// servers are torn down before returning.
pub async fn run_message(
    state: AppState,
    mut session: ChatSession,
    content: String,
    tx: mpsc::UnboundedSender<StreamEnvelope>,
) {
    let mut pool = state.pool();
    for spec in session.settings.server_list() {
        if let Err(e) = pool.connect(spec).await {
            tracing::warn!("Failed to connect to server {}: {}", spec, e);
            tracing::warn!(
                "Resetting MCP client without servers. Please fix the server string in chat settings."
            );
            pool.close_all().await;
            break;
        }
    }

    let mut client = state.client(pool);
    let (events_tx, mut events_rx) = event_channel();
    client.set_event_sender(Some(events_tx));

    let turn = async {
        let result = client.process_query(&mut session, &content).await;
        client.set_event_sender(None);
        result
    };
    let forward = async {
        while let Some(event) = events_rx.recv().await {
            // failures are reported once, below
            if matches!(event, ChatEvent::Error { .. }) {
                continue;
            }
            let _ = tx.send(StreamEnvelope::from_event(event));
        }
    };
    let (result, ()) = tokio::join!(turn, forward);

    // whatever the turn appended is kept, even when it failed
    let saved = state.store.save(&mut session);
    if let Err(e) = &saved {
        tracing::error!("Failed to save chat file: {}", e);
    }

    let envelope = match (result, saved) {
        (Ok(_), Ok(())) => StreamEnvelope::Complete {
            data: session.snapshot(),
        },
        (Err(e), _) => {
            tracing::error!("Error in MCP client operations: {}", e);
            StreamEnvelope::Error {
                error: MESSAGE_FAILED.to_string(),
            }
        }
        (Ok(_), Err(_)) => StreamEnvelope::Error {
            error: MESSAGE_FAILED.to_string(),
        },
    };
    let _ = tx.send(envelope);

    client.cleanup().await;
}
