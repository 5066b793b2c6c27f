//! CLI argument definitions

use std::path::PathBuf;

use clap::{ArgAction, Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "mcp-chat")]
#[command(version)]
#[command(about = "Open Source Generic MCP Client for testing & evaluating mcp servers and agents")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// MCP server command to run (repeatable)
    #[arg(short = 's', long = "server", value_name = "COMMAND", action = ArgAction::Append, global = true)]
    pub servers: Vec<String>,

    /// Path to claude_desktop_config.json (platform default when no path is given)
    #[arg(short = 'c', long, value_name = "PATH", num_args = 0..=1, global = true)]
    pub config: Option<Option<PathBuf>>,

    /// Run a single prompt and exit
    #[arg(short = 'p', long, value_name = "TEXT")]
    pub prompt: Option<String>,

    /// Choose a specific model to chat with
    #[arg(short = 'm', long, value_name = "NAME", env = "MCPCHAT_MODEL", global = true)]
    pub model: Option<String>,

    /// Resume a saved chat file
    #[arg(short = 'f', long = "chat", value_name = "FILE")]
    pub chat: Option<PathBuf>,

    /// Run in agent mode
    #[arg(short = 'a', long)]
    pub agent: bool,

    /// Run evaluation mode with specified JSON file
    #[arg(short = 'e', long, value_name = "PATH")]
    pub eval: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// List saved chats, newest first
    Chats,

    /// Start the HTTP API server
    #[cfg(feature = "web")]
    Web {
        /// Port to listen on
        #[arg(long, default_value = "3000")]
        port: u16,
    },
}
