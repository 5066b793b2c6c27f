//! Chat client for Claude with MCP tool servers
//!
//! Connects to tool servers over stdio, streams completions, runs the
//! tools the model asks for and keeps chats as JSON files.

pub mod agent;
pub mod cli;
pub mod config;
pub mod error;
pub mod llm;
pub mod mcp;
pub mod output;
pub mod session;
pub mod streaming;

#[cfg(feature = "web")]
pub mod web;

pub use agent::ChatClient;
pub use error::{ChatError, ConnectError, SessionError, StartupError};
pub use session::{ChatSession, ChatSettings, SessionStore};
