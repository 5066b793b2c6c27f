//! Error types for the chat client
//!
//! Each layer has its own error enum so callers can decide what is
//! recoverable: connection failures skip a server, tool failures abort a
//! turn, persistence failures abort a save, startup failures end the
//! process.

use thiserror::Error;

/// A launch string that none of the resolution rules accept
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Server script must be a .js or .py file")]
pub struct UnsupportedScriptError {
    /// The launch string as given
    pub spec: String,
}

/// Errors raised by a tool transport (process spawn, handshake, protocol)
#[derive(Error, Debug)]
pub enum TransportError {
    /// The child process could not be started
    #[error("failed to spawn server process: {0}")]
    Spawn(#[from] std::io::Error),

    /// The MCP initialize handshake failed
    #[error("handshake failed: {0}")]
    Handshake(String),

    /// A request on an established connection failed
    #[error("protocol error: {0}")]
    Protocol(String),
}

/// Classified failure to connect a tool provider
#[derive(Error, Debug)]
pub enum ConnectError {
    /// The launch string could not be resolved
    #[error(transparent)]
    Unsupported(#[from] UnsupportedScriptError),

    /// The command or script does not exist
    #[error("The script path was not found.")]
    NotFound(#[source] TransportError),

    /// The command exists but may not be executed
    #[error("Permission denied.")]
    PermissionDenied(#[source] TransportError),

    /// Anything else (handshake, catalog fetch, ...)
    #[error("Details: {0}")]
    Failed(#[source] TransportError),
}

impl ConnectError {
    /// Classify a transport failure by the underlying io error kind
    pub fn classify(err: TransportError) -> Self {
        match &err {
            TransportError::Spawn(io) => match io.kind() {
                std::io::ErrorKind::NotFound => ConnectError::NotFound(err),
                std::io::ErrorKind::PermissionDenied => ConnectError::PermissionDenied(err),
                _ => ConnectError::Failed(err),
            },
            _ => ConnectError::Failed(err),
        }
    }
}

/// Errors from the completion service
#[derive(Error, Debug)]
pub enum CompletionError {
    #[error("network error: {0}")]
    Network(String),

    #[error("rate limited by completion service")]
    RateLimited,

    #[error("completion service error: {0}")]
    Api(String),

    #[error("failed to parse stream event: {0}")]
    Parse(String),
}

/// Session file persistence errors
#[derive(Error, Debug)]
pub enum SessionError {
    #[error("chat not found: {0}")]
    NotFound(String),

    #[error("chat file I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid chat file: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("home directory could not be determined")]
    NoHomeDir,
}

/// Errors that end a conversation turn
#[derive(Error, Debug)]
pub enum ChatError {
    #[error(transparent)]
    Completion(#[from] CompletionError),

    /// The tool provider failed or no connected server offers the tool
    #[error("tool '{name}' failed: {message}")]
    ToolInvocation { name: String, message: String },

    /// The model kept requesting tools past the configured bound
    #[error("tool call depth exceeded (max {limit} rounds)")]
    MaxToolCallDepthExceeded { limit: usize },

    #[error(transparent)]
    Session(#[from] SessionError),
}

/// Fatal conditions detected before any session work begins
#[derive(Error, Debug, PartialEq, Eq)]
pub enum StartupError {
    #[error("ANTHROPIC_API_KEY is not set")]
    MissingApiKey,

    #[error("Unsupported platform: {0}")]
    UnsupportedPlatform(String),
}
