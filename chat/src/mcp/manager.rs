//! Transport manager for a single server slot
//!
//! Owns zero or one open transport. Reconnecting always closes the prior
//! transport before the new process is launched, so a slot never holds two
//! live server processes.

use std::sync::Arc;

use serde_json::Value;

use super::launch::resolve_server_spec;
use super::transport::{ToolTransport, TransportLauncher};
use super::types::{McpTool, ToolOutput};
use crate::error::{ConnectError, TransportError};

/// Connection state for one MCP server slot
pub struct TransportManager {
    launcher: Arc<dyn TransportLauncher>,
    spec: Option<String>,
    transport: Option<Box<dyn ToolTransport>>,
    tools: Vec<McpTool>,
}

impl TransportManager {
    /// Create an empty slot
    pub fn new(launcher: Arc<dyn TransportLauncher>) -> Self {
        Self {
            launcher,
            spec: None,
            transport: None,
            tools: Vec::new(),
        }
    }

    /// Launch string of the current connection
    pub fn spec(&self) -> Option<&str> {
        self.spec.as_deref()
    }

    /// Whether a transport is open
    pub fn is_connected(&self) -> bool {
        self.transport.is_some()
    }

    /// Tool catalog fetched on the last successful connect
    pub fn tools(&self) -> &[McpTool] {
        &self.tools
    }

    /// Whether this slot's catalog offers a tool
    pub fn has_tool(&self, name: &str) -> bool {
        self.tools.iter().any(|t| t.name == name)
    }

    /// Connect to a server, replacing any open transport
    pub async fn connect(&mut self, spec: &str) -> Result<&[McpTool], ConnectError> {
        self.close().await;

        match self.open(spec).await {
            Ok((transport, tools)) => {
                tracing::info!(
                    "Connected to server with tools: {:?}",
                    tools.iter().map(|t| t.name.as_str()).collect::<Vec<_>>()
                );
                self.transport = Some(transport);
                self.spec = Some(spec.to_string());
                self.tools = tools;
                Ok(&self.tools)
            }
            Err(e) => {
                tracing::error!("Failed to connect to MCP server \"{}\".", spec);
                tracing::error!("Error: {}", e);
                Err(e)
            }
        }
    }

    async fn open(
        &self,
        spec: &str,
    ) -> Result<(Box<dyn ToolTransport>, Vec<McpTool>), ConnectError> {
        let command = resolve_server_spec(spec)?;
        let transport = self
            .launcher
            .launch(&command)
            .await
            .map_err(ConnectError::classify)?;

        match transport.list_tools(spec).await {
            Ok(tools) => Ok((transport, tools)),
            Err(e) => {
                if let Err(close_err) = transport.close().await {
                    tracing::warn!("Error closing transport for {}: {}", spec, close_err);
                }
                Err(ConnectError::classify(e))
            }
        }
    }

    /// Invoke a tool on the open transport
    pub async fn call_tool(
        &self,
        name: &str,
        arguments: Option<Value>,
    ) -> Result<ToolOutput, TransportError> {
        let transport = self
            .transport
            .as_ref()
            .ok_or_else(|| TransportError::Protocol("not connected".to_string()))?;

        let args = arguments.and_then(|v| v.as_object().cloned());
        transport.call_tool(name, args).await
    }

    /// Close the open transport, if any; errors are logged, not returned
    pub async fn close(&mut self) {
        self.tools.clear();
        if let Some(transport) = self.transport.take() {
            let spec = self.spec.take().unwrap_or_default();
            tracing::debug!("Closing transport for {}", spec);
            if let Err(e) = transport.close().await {
                tracing::warn!("Error closing existing transport for {}: {}", spec, e);
            }
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::mcp::launch::ServerCommand;
    use crate::mcp::types::JsonObject;
    use async_trait::async_trait;
    use std::sync::Mutex;

    /// Launcher that records launches and closes in call order
    #[derive(Default)]
    pub(crate) struct RecordingLauncher {
        pub log: Arc<Mutex<Vec<String>>>,
        pub fail_with: Mutex<Option<std::io::ErrorKind>>,
        pub fail_close: bool,
        /// Transports refuse to list their tools
        pub fail_list: bool,
    }

    struct RecordingTransport {
        id: String,
        log: Arc<Mutex<Vec<String>>>,
        fail_close: bool,
        fail_list: bool,
    }

    #[async_trait]
    impl ToolTransport for RecordingTransport {
        async fn list_tools(&self, server: &str) -> Result<Vec<McpTool>, TransportError> {
            if self.fail_list {
                return Err(TransportError::Protocol("Failed to list tools".into()));
            }
            Ok(vec![McpTool {
                server: server.to_string(),
                name: format!("{}_tool", self.id),
                description: None,
                input_schema: serde_json::json!({"type": "object"}),
            }])
        }

        async fn call_tool(
            &self,
            name: &str,
            _arguments: Option<JsonObject>,
        ) -> Result<ToolOutput, TransportError> {
            self.log.lock().unwrap().push(format!("call:{}", name));
            Ok(ToolOutput::text("ok"))
        }

        async fn close(self: Box<Self>) -> Result<(), TransportError> {
            self.log.lock().unwrap().push(format!("close:{}", self.id));
            if self.fail_close {
                return Err(TransportError::Protocol("close failed".into()));
            }
            Ok(())
        }
    }

    #[async_trait]
    impl TransportLauncher for RecordingLauncher {
        async fn launch(
            &self,
            command: &ServerCommand,
        ) -> Result<Box<dyn ToolTransport>, TransportError> {
            if let Some(kind) = *self.fail_with.lock().unwrap() {
                return Err(TransportError::Spawn(std::io::Error::new(kind, "spawn failed")));
            }
            let id = command.args.last().cloned().unwrap_or_default();
            self.log.lock().unwrap().push(format!("launch:{}", id));
            Ok(Box::new(RecordingTransport {
                id,
                log: self.log.clone(),
                fail_close: self.fail_close,
                fail_list: self.fail_list,
            }))
        }
    }

    #[tokio::test]
    async fn test_reconnect_closes_prior_transport_once() {
        let launcher = Arc::new(RecordingLauncher::default());
        let log = launcher.log.clone();
        let mut manager = TransportManager::new(launcher);

        manager.connect("npx server1").await.unwrap();
        assert!(log.lock().unwrap().iter().all(|e| !e.starts_with("close")));

        let tools = manager.connect("npx server2").await.unwrap();
        assert_eq!(tools[0].name, "server2_tool");

        let log = log.lock().unwrap().clone();
        assert_eq!(log, vec!["launch:server1", "close:server1", "launch:server2"]);
    }

    #[tokio::test]
    async fn test_close_failure_does_not_block_reconnect() {
        let launcher = Arc::new(RecordingLauncher {
            fail_close: true,
            ..Default::default()
        });
        let mut manager = TransportManager::new(launcher);

        manager.connect("npx server1").await.unwrap();
        assert!(manager.connect("npx server2").await.is_ok());
        assert_eq!(manager.spec(), Some("npx server2"));
    }

    #[tokio::test]
    async fn test_not_found_clears_transport() {
        let launcher = Arc::new(RecordingLauncher::default());
        let mut manager = TransportManager::new(launcher.clone());
        manager.connect("npx server1").await.unwrap();

        *launcher.fail_with.lock().unwrap() = Some(std::io::ErrorKind::NotFound);
        let err = manager.connect("nonexistent.js").await.unwrap_err();

        assert!(matches!(err, ConnectError::NotFound(_)));
        assert!(!manager.is_connected());
        assert!(manager.tools().is_empty());
        assert!(launcher.log.lock().unwrap().contains(&"close:server1".to_string()));
    }

    #[tokio::test]
    async fn test_catalog_failure_closes_new_transport() {
        let launcher = Arc::new(RecordingLauncher {
            fail_list: true,
            ..Default::default()
        });
        let mut manager = TransportManager::new(launcher.clone());

        let err = manager.connect("npx broken").await.unwrap_err();
        assert!(matches!(err, ConnectError::Failed(_)));
        assert!(!manager.is_connected());
        assert_eq!(manager.spec(), None);

        let log = launcher.log.lock().unwrap().clone();
        assert_eq!(log, vec!["launch:broken", "close:broken"]);
    }

    #[tokio::test]
    async fn test_permission_denied() {
        let launcher = Arc::new(RecordingLauncher::default());
        *launcher.fail_with.lock().unwrap() = Some(std::io::ErrorKind::PermissionDenied);
        let mut manager = TransportManager::new(launcher);

        let err = manager.connect("denied.js").await.unwrap_err();
        assert!(matches!(err, ConnectError::PermissionDenied(_)));
        assert!(!manager.is_connected());
    }

    #[tokio::test]
    async fn test_unsupported_spec_never_launches() {
        let launcher = Arc::new(RecordingLauncher::default());
        let mut manager = TransportManager::new(launcher.clone());

        let err = manager.connect("server.rb").await.unwrap_err();
        assert!(matches!(err, ConnectError::Unsupported(_)));
        assert!(launcher.log.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_call_tool_requires_connection() {
        let manager = TransportManager::new(Arc::new(RecordingLauncher::default()));
        assert!(manager.call_tool("anything", None).await.is_err());
    }
}
