//! Configuration loading
//!
//! Two sources:
//! - `.mcpchat.toml` / `~/.mcpchat/config.toml` for client defaults
//! - `claude_desktop_config.json` for the list of MCP servers

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Deserialize;
use serde_json::{Map, Value};

use crate::agent::{DEFAULT_MAX_TOKENS, DEFAULT_MAX_TOOL_ROUNDS};
use crate::error::StartupError;
use crate::llm::ANTHROPIC_API_URL;
use crate::session::DEFAULT_MODEL;

/// Project-local config file name
pub const CONFIG_FILE_NAME: &str = ".mcpchat.toml";

/// Find a config file by walking up from `start`, then checking `global`.
fn find_config_file_from(start: &Path, filename: &str, global: Option<PathBuf>) -> Option<PathBuf> {
    let mut current = start.to_path_buf();

    loop {
        let candidate = current.join(filename);
        if candidate.is_file() {
            return Some(candidate);
        }
        match current.parent() {
            Some(parent) => current = parent.to_path_buf(),
            None => break,
        }
    }

    global.filter(|path| path.is_file())
}

/// Search order:
/// 1. Current directory and its parents for `.mcpchat.toml`
/// 2. `~/.mcpchat/config.toml`
fn find_config_file() -> Option<PathBuf> {
    let cwd = std::env::current_dir().ok()?;
    let global = dirs::home_dir().map(|home| home.join(".mcpchat").join("config.toml"));
    find_config_file_from(&cwd, CONFIG_FILE_NAME, global)
}

// ============================================================================
// Client configuration (.mcpchat.toml)
// ============================================================================

/// Top-level client configuration
#[derive(Debug, Default, Deserialize)]
pub struct ChatFileConfig {
    #[serde(default)]
    pub llm: LlmSection,
    #[serde(default)]
    pub chat: ChatSection,
}

/// `[llm]` section
#[derive(Debug, Default, Deserialize)]
pub struct LlmSection {
    pub model: Option<String>,
    pub api_url: Option<String>,
    pub max_tokens: Option<u32>,
}

/// `[chat]` section
#[derive(Debug, Default, Deserialize)]
pub struct ChatSection {
    pub system_prompt: Option<String>,
    pub max_tool_rounds: Option<usize>,
}

impl ChatFileConfig {
    /// Load the nearest config file, or defaults when there is none
    pub fn load() -> Result<Self> {
        if let Some(config_path) = find_config_file() {
            tracing::debug!("Loading config from: {}", config_path.display());
            return Self::load_from_path(&config_path);
        }

        tracing::debug!("No {} found, using defaults", CONFIG_FILE_NAME);
        Ok(Self::default())
    }

    /// Load from a specific path
    pub fn load_from_path(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let config: ChatFileConfig = toml::from_str(&content)
            .with_context(|| format!("Invalid config file {}", path.display()))?;
        Ok(config)
    }

    /// Model to use: flag, then config, then the built-in default
    pub fn model(&self, flag: Option<&str>) -> String {
        flag.map(str::to_string)
            .or_else(|| self.llm.model.clone())
            .unwrap_or_else(|| DEFAULT_MODEL.to_string())
    }

    pub fn api_url(&self) -> String {
        self.llm
            .api_url
            .clone()
            .unwrap_or_else(|| ANTHROPIC_API_URL.to_string())
    }

    pub fn max_tokens(&self) -> u32 {
        self.llm.max_tokens.unwrap_or(DEFAULT_MAX_TOKENS)
    }

    pub fn max_tool_rounds(&self) -> usize {
        self.chat.max_tool_rounds.unwrap_or(DEFAULT_MAX_TOOL_ROUNDS)
    }
}

// ============================================================================
// Desktop MCP configuration (claude_desktop_config.json)
// ============================================================================

/// One entry of `mcpServers`
#[derive(Debug, Clone, Deserialize)]
pub struct McpServerConfig {
    pub command: String,
    #[serde(default)]
    pub args: Vec<String>,
}

impl McpServerConfig {
    /// Launch string: command followed by its arguments
    pub fn launch_string(&self) -> String {
        std::iter::once(self.command.as_str())
            .chain(self.args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// Server launch strings from a desktop config, in file order
///
/// Unreadable or malformed files yield an empty list.
pub fn parse_config_file(path: &Path) -> Vec<String> {
    match read_server_specs(path) {
        Ok(specs) => specs,
        Err(e) => {
            tracing::error!("Error reading config file {}: {:#}", path.display(), e);
            Vec::new()
        }
    }
}

fn read_server_specs(path: &Path) -> Result<Vec<String>> {
    let content = std::fs::read_to_string(path)?;
    let root: Value = serde_json::from_str(&content)?;
    let servers: Map<String, Value> = match root.get("mcpServers") {
        Some(Value::Object(servers)) => servers.clone(),
        _ => anyhow::bail!("missing mcpServers"),
    };

    servers
        .into_iter()
        .map(|(name, entry)| {
            let server: McpServerConfig = serde_json::from_value(entry)
                .with_context(|| format!("invalid entry for server {}", name))?;
            Ok(server.launch_string())
        })
        .collect()
}

/// Default desktop config location for the running platform
pub fn default_config_path() -> Result<PathBuf, StartupError> {
    let home = dirs::home_dir().unwrap_or_default();
    let appdata = std::env::var_os("APPDATA").map(PathBuf::from);
    default_config_path_for(std::env::consts::OS, &home, appdata.as_deref())
}

/// Desktop config location for a given platform
pub fn default_config_path_for(
    os: &str,
    home: &Path,
    appdata: Option<&Path>,
) -> Result<PathBuf, StartupError> {
    match os {
        "macos" => Ok(home
            .join("Library")
            .join("Application Support")
            .join("Claude")
            .join("claude_desktop_config.json")),
        "windows" => {
            let base = appdata
                .map(Path::to_path_buf)
                .unwrap_or_else(|| home.join("AppData").join("Roaming"));
            Ok(base.join("Claude").join("claude_desktop_config.json"))
        }
        other => Err(StartupError::UnsupportedPlatform(other.to_string())),
    }
}
