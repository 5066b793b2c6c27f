//! MCP (Model Context Protocol) client implementation
//!
//! Resolves server launch strings, connects to servers over stdio and
//! provides access to their tools.

pub mod launch;
pub(crate) mod manager;
mod pool;
pub mod transport;
mod types;

pub use launch::{resolve_server_spec, ServerCommand};
pub use manager::TransportManager;
pub use pool::McpClientPool;
pub use transport::{ChildProcessLauncher, ToolTransport, TransportLauncher};
pub use types::{JsonObject, McpTool, ToolOutput};
