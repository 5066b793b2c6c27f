//! Persistent command history (`~/.mcpchat/history`)

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use crate::session::mcpchat_dir;

/// Oldest entries are dropped past this size
pub const MAX_HISTORY: usize = 1000;

/// Newline-separated list of past inputs
#[derive(Debug, Clone)]
pub struct CommandHistory {
    path: PathBuf,
    entries: Vec<String>,
}

impl CommandHistory {
    /// History at the default location
    pub fn default_path() -> Result<PathBuf> {
        Ok(mcpchat_dir()?.join("history"))
    }

    /// Load history; a missing or unreadable file gives an empty history
    pub fn load(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let entries = match std::fs::read_to_string(&path) {
            Ok(content) => content
                .lines()
                .filter(|line| !line.is_empty())
                .map(str::to_string)
                .collect(),
            Err(_) => Vec::new(),
        };
        Self { path, entries }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn entries(&self) -> &[String] {
        &self.entries
    }

    /// Append an input; blank inputs are ignored
    pub fn push(&mut self, input: &str) {
        let input = input.trim();
        if input.is_empty() || input.contains('\n') {
            return;
        }
        self.entries.push(input.to_string());
        if self.entries.len() > MAX_HISTORY {
            let excess = self.entries.len() - MAX_HISTORY;
            self.entries.drain(..excess);
        }
    }

    /// Rewrite the history file
    pub fn save(&self) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory: {:?}", parent))?;
        }
        let mut content = self.entries.join("\n");
        content.push('\n');
        std::fs::write(&self.path, content)
            .with_context(|| format!("Failed to save history to {:?}", self.path))?;
        Ok(())
    }
}
