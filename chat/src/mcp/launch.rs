//! Launch string resolution
//!
//! Turns a free-form server launch string ("npx pkg arg", "uv python
//! script.py", "node server.js", ...) into a command and argument list.
//! Pure: no filesystem or process access.

use crate::error::UnsupportedScriptError;

/// Launchers whose remaining tokens are passed through verbatim
const PASSTHROUGH_LAUNCHERS: &[&str] = &["npx", "uvx", "docker"];

/// Runtimes allowed to lead a `.js` launch string
const JS_RUNTIMES: &[&str] = &["node", "bun"];

/// Runtime used for bare `.js` scripts
const DEFAULT_JS_RUNTIME: &str = "node";

/// A resolved process invocation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerCommand {
    pub command: String,
    pub args: Vec<String>,
}

impl ServerCommand {
    fn new(command: &str, args: &[&str]) -> Self {
        Self {
            command: command.to_string(),
            args: args.iter().map(|a| a.to_string()).collect(),
        }
    }
}

/// Python launcher for the current platform
pub fn python_launcher() -> &'static str {
    if cfg!(windows) {
        "python"
    } else {
        "python3"
    }
}

/// Resolve a launch string into a command and its arguments
///
/// Rules, first match wins:
/// 1. `npx`, `uvx` or `docker` as the first token: that token is the command
/// 2. a `.py` script: `uv` leads or the platform Python launcher is used
/// 3. a `.js` script: `node`/`bun` leads or the default runtime is used
pub fn resolve_server_spec(spec: &str) -> Result<ServerCommand, UnsupportedScriptError> {
    let tokens: Vec<&str> = spec.split_whitespace().collect();
    let unsupported = || UnsupportedScriptError {
        spec: spec.to_string(),
    };

    let (first, rest) = tokens.split_first().ok_or_else(unsupported)?;

    if PASSTHROUGH_LAUNCHERS.contains(first) {
        return Ok(ServerCommand::new(first, rest));
    }

    if script_token(&tokens, ".py").is_some() {
        if *first == "uv" {
            return Ok(ServerCommand::new("uv", rest));
        }
        // a lone script path is the script itself, not a launcher
        if rest.is_empty() {
            return Ok(ServerCommand::new(python_launcher(), &[first]));
        }
        return Ok(ServerCommand::new(python_launcher(), rest));
    }

    if let Some(script) = script_token(&tokens, ".js") {
        if JS_RUNTIMES.contains(first) {
            return Ok(ServerCommand::new(first, rest));
        }
        return Ok(ServerCommand::new(DEFAULT_JS_RUNTIME, &[script]));
    }

    Err(unsupported())
}

/// First token naming a script with the given extension
fn script_token<'a>(tokens: &[&'a str], extension: &str) -> Option<&'a str> {
    tokens.iter().copied().find(|t| t.ends_with(extension))
}
