//! MCP client pool
//!
//! Holds one [`TransportManager`] per connected server, exposes the
//! combined tool catalog and routes tool calls to the server that
//! advertised the tool.

use std::sync::Arc;

use serde_json::Value;

use super::manager::TransportManager;
use super::transport::{ChildProcessLauncher, TransportLauncher};
use super::types::{McpTool, ToolOutput};
use crate::error::{ConnectError, TransportError};

/// Pool of server connections for one chat client
pub struct McpClientPool {
    launcher: Arc<dyn TransportLauncher>,
    slots: Vec<TransportManager>,
}

impl Default for McpClientPool {
    fn default() -> Self {
        Self::new(Arc::new(ChildProcessLauncher))
    }
}

impl McpClientPool {
    /// Create an empty pool using the given launcher
    pub fn new(launcher: Arc<dyn TransportLauncher>) -> Self {
        Self {
            launcher,
            slots: Vec::new(),
        }
    }

    /// Connect a server; a spec that is already connected is reconnected in its slot
    pub async fn connect(&mut self, spec: &str) -> Result<usize, ConnectError> {
        let index = match self.slots.iter().position(|s| s.spec() == Some(spec)) {
            Some(index) => index,
            None => {
                self.slots.push(TransportManager::new(self.launcher.clone()));
                self.slots.len() - 1
            }
        };

        match self.slots[index].connect(spec).await {
            Ok(tools) => Ok(tools.len()),
            Err(e) => {
                self.slots.remove(index);
                Err(e)
            }
        }
    }

    /// Connect every spec, skipping (and warning about) the ones that fail
    ///
    /// Returns the specs that failed.
    pub async fn connect_all(&mut self, specs: &[String]) -> Vec<String> {
        let mut failed = Vec::new();
        for spec in specs {
            if let Err(e) = self.connect(spec).await {
                tracing::warn!("Failed to connect to server {}: {}", spec, e);
                failed.push(spec.clone());
            }
        }
        failed
    }

    /// Launch strings of connected servers
    pub fn server_names(&self) -> Vec<String> {
        self.slots
            .iter()
            .filter_map(|s| s.spec().map(str::to_string))
            .collect()
    }

    /// Combined catalog of all connected servers
    pub fn tools(&self) -> Vec<McpTool> {
        self.slots.iter().flat_map(|s| s.tools().iter().cloned()).collect()
    }

    /// Call a tool on whichever server offers it
    pub async fn call_tool(
        &self,
        tool_name: &str,
        arguments: Option<Value>,
    ) -> Result<ToolOutput, TransportError> {
        let slot = self
            .slots
            .iter()
            .find(|s| s.has_tool(tool_name))
            .ok_or_else(|| {
                TransportError::Protocol(format!("Tool '{}' not found in any MCP server", tool_name))
            })?;

        tracing::info!("Executing tool: {} with args: {:?}", tool_name, arguments);
        slot.call_tool(tool_name, arguments).await
    }

    /// Close every connection
    pub async fn close_all(&mut self) {
        for mut slot in self.slots.drain(..) {
            slot.close().await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mcp::manager::tests::RecordingLauncher;

    #[tokio::test]
    async fn test_connect_all_skips_failures() {
        let launcher = Arc::new(RecordingLauncher::default());
        let mut pool = McpClientPool::new(launcher);

        let failed = pool
            .connect_all(&["npx alpha".to_string(), "bad.rb".to_string(), "npx beta".to_string()])
            .await;

        assert_eq!(failed, vec!["bad.rb"]);
        assert_eq!(pool.server_names(), vec!["npx alpha", "npx beta"]);
        let names: Vec<_> = pool.tools().into_iter().map(|t| t.name).collect();
        assert_eq!(names, vec!["alpha_tool", "beta_tool"]);
    }

    #[tokio::test]
    async fn test_call_routes_by_tool_name() {
        let launcher = Arc::new(RecordingLauncher::default());
        let log = launcher.log.clone();
        let mut pool = McpClientPool::new(launcher);
        pool.connect_all(&["npx alpha".to_string(), "npx beta".to_string()]).await;

        let output = pool.call_tool("beta_tool", None).await.unwrap();
        assert_eq!(output.text_content(), "ok");
        assert!(log.lock().unwrap().contains(&"call:beta_tool".to_string()));

        assert!(pool.call_tool("missing", None).await.is_err());
    }

    #[tokio::test]
    async fn test_same_spec_reuses_slot() {
        let launcher = Arc::new(RecordingLauncher::default());
        let log = launcher.log.clone();
        let mut pool = McpClientPool::new(launcher);

        pool.connect("npx alpha").await.unwrap();
        pool.connect("npx alpha").await.unwrap();

        assert_eq!(pool.server_names().len(), 1);
        assert_eq!(
            log.lock().unwrap().clone(),
            vec!["launch:alpha", "close:alpha", "launch:alpha"]
        );
    }

    #[tokio::test]
    async fn test_close_all() {
        let launcher = Arc::new(RecordingLauncher::default());
        let log = launcher.log.clone();
        let mut pool = McpClientPool::new(launcher);
        pool.connect_all(&["npx alpha".to_string(), "npx beta".to_string()]).await;

        pool.close_all().await;

        assert!(pool.tools().is_empty());
        let log = log.lock().unwrap();
        assert!(log.contains(&"close:alpha".to_string()));
        assert!(log.contains(&"close:beta".to_string()));
    }
}
