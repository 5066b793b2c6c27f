//! Process-backed MCP transports
//!
//! A [`TransportLauncher`] spawns a server process and completes the MCP
//! handshake, yielding a [`ToolTransport`]. The production launcher uses
//! rmcp's `TokioChildProcess`; tests substitute their own launcher.

use async_trait::async_trait;
use rmcp::{
    model::CallToolRequestParam,
    service::RunningService,
    transport::TokioChildProcess,
    RoleClient, ServiceExt,
};
use serde_json::Value;
use tokio::process::Command;

use super::launch::ServerCommand;
use super::types::{JsonObject, McpTool, ToolOutput};
use crate::error::TransportError;

/// An open connection to a single tool provider
#[async_trait]
pub trait ToolTransport: Send + Sync {
    /// Fetch the provider's tool catalog
    async fn list_tools(&self, server: &str) -> Result<Vec<McpTool>, TransportError>;

    /// Invoke a tool by name
    async fn call_tool(
        &self,
        name: &str,
        arguments: Option<JsonObject>,
    ) -> Result<ToolOutput, TransportError>;

    /// Shut the connection down and release the process
    async fn close(self: Box<Self>) -> Result<(), TransportError>;
}

/// Opens transports for resolved server commands
#[async_trait]
pub trait TransportLauncher: Send + Sync {
    async fn launch(&self, command: &ServerCommand) -> Result<Box<dyn ToolTransport>, TransportError>;
}

/// Launches servers as child processes speaking MCP over stdio
#[derive(Debug, Default, Clone, Copy)]
pub struct ChildProcessLauncher;

#[async_trait]
impl TransportLauncher for ChildProcessLauncher {
    async fn launch(&self, command: &ServerCommand) -> Result<Box<dyn ToolTransport>, TransportError> {
        tracing::debug!("Spawning MCP server: {} {:?}", command.command, command.args);

        let mut cmd = Command::new(&command.command);
        if !command.args.is_empty() {
            cmd.args(&command.args);
        }

        let transport = TokioChildProcess::new(cmd)?;
        let service = ()
            .serve(transport)
            .await
            .map_err(|e| TransportError::Handshake(e.to_string()))?;

        Ok(Box::new(ChildProcessTransport { service }))
    }
}

/// Running rmcp client over a child process
///
/// Dropping the service cancels it and the child process is killed with it,
/// so a transport that is never closed explicitly still does not leak.
pub struct ChildProcessTransport {
    service: RunningService<RoleClient, ()>,
}

#[async_trait]
impl ToolTransport for ChildProcessTransport {
    async fn list_tools(&self, server: &str) -> Result<Vec<McpTool>, TransportError> {
        let response = self
            .service
            .list_tools(Default::default())
            .await
            .map_err(|e| TransportError::Protocol(format!("Failed to list tools: {}", e)))?;

        Ok(response
            .tools
            .into_iter()
            .map(|t| McpTool {
                server: server.to_string(),
                name: t.name.to_string(),
                description: t.description.map(|d| d.to_string()),
                input_schema: Value::Object(t.input_schema.as_ref().clone()),
            })
            .collect())
    }

    async fn call_tool(
        &self,
        name: &str,
        arguments: Option<JsonObject>,
    ) -> Result<ToolOutput, TransportError> {
        let result = self
            .service
            .call_tool(CallToolRequestParam {
                name: name.to_string().into(),
                arguments,
                task: None,
            })
            .await
            .map_err(|e| TransportError::Protocol(format!("Failed to call tool: {}", e)))?;

        let content = serde_json::to_value(&result.content)
            .map_err(|e| TransportError::Protocol(e.to_string()))?;

        Ok(ToolOutput {
            content,
            is_error: result.is_error.unwrap_or(false),
        })
    }

    async fn close(self: Box<Self>) -> Result<(), TransportError> {
        self.service
            .cancel()
            .await
            .map_err(|e| TransportError::Protocol(e.to_string()))?;
        Ok(())
    }
}
