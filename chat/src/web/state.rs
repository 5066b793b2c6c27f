//! Shared application state

use std::sync::Arc;

use crate::agent::ChatClient;
use crate::llm::CompletionService;
use crate::mcp::{McpClientPool, TransportLauncher};
use crate::session::SessionStore;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    /// Chat files
    pub store: SessionStore,
    /// Completion backend shared by every request
    pub completion: Arc<dyn CompletionService>,
    /// Launches MCP servers for per-request pools
    pub launcher: Arc<dyn TransportLauncher>,
    /// Model for newly created chats
    pub model: String,
    pub max_tokens: u32,
    pub max_tool_rounds: usize,
    pub system_prompt: Option<String>,
}

impl AppState {
    /// Fresh client for one message request
    pub fn client(&self, pool: McpClientPool) -> ChatClient {
        let client = ChatClient::new(self.completion.clone(), pool)
            .with_max_tokens(self.max_tokens)
            .with_max_tool_rounds(self.max_tool_rounds);
        match &self.system_prompt {
            Some(prompt) => client.with_default_system_prompt(Some(prompt.clone())),
            None => client,
        }
    }

    /// Empty pool that launches servers with this state's launcher
    pub fn pool(&self) -> McpClientPool {
        McpClientPool::new(self.launcher.clone())
    }
}
