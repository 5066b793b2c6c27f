//! Chat persistence
//!
//! Each chat is one pretty-printed JSON file under `~/.mcpchat/chats`,
//! named `chat-<index>-<epoch-ms>.json`. The file name is the chat id.
//! The store is the only writer; writes go to a synced temp file that is
//! then renamed over the chat, so a crash never leaves a truncated chat
//! behind.

mod types;

pub use types::{ChatFile, ChatListItem, ChatSession, ChatSettings, DEFAULT_MODEL};

use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Local, SecondsFormat, TimeZone, Utc};
use serde_json::{Map, Value};
use tempfile::NamedTempFile;

use crate::error::SessionError;

/// Directory holding all client state (`~/.mcpchat`)
pub fn mcpchat_dir() -> Result<PathBuf, SessionError> {
    let home = dirs::home_dir().ok_or(SessionError::NoHomeDir)?;
    Ok(home.join(".mcpchat"))
}

/// File-backed chat store
#[derive(Debug, Clone)]
pub struct SessionStore {
    dir: PathBuf,
}

impl SessionStore {
    /// Store rooted at an explicit directory
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Store at the default location (`~/.mcpchat/chats`)
    pub fn open_default() -> Result<Self, SessionError> {
        Ok(Self::new(Self::default_dir()?))
    }

    pub fn default_dir() -> Result<PathBuf, SessionError> {
        Ok(mcpchat_dir()?.join("chats"))
    }

    /// Store and id for an arbitrary chat file path
    pub fn for_file(path: &Path) -> Result<(Self, String), SessionError> {
        let id = path
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| SessionError::NotFound(path.display().to_string()))?
            .to_string();
        let dir = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        Ok((Self::new(dir), id))
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path of a chat file; ids with path separators are rejected
    pub fn path_for(&self, id: &str) -> Result<PathBuf, SessionError> {
        if id.is_empty() || id.contains(['/', '\\']) || id == "." || id == ".." {
            return Err(SessionError::NotFound(id.to_string()));
        }
        Ok(self.dir.join(id))
    }

    /// Create a chat with no messages and write it immediately
    pub fn create(&self, settings: ChatSettings) -> Result<ChatListItem, SessionError> {
        let (id, index, timestamp) = self.allocate_id()?;
        let file = ChatFile {
            title: default_title(index, timestamp),
            settings,
            messages: Vec::new(),
        };
        self.write_file(&id, &file)?;
        tracing::info!("Created chat {}", id);

        Ok(ChatListItem {
            id,
            title: file.title,
            model: Some(file.settings.model),
            last_modified: iso_timestamp(timestamp),
            message_count: 0,
        })
    }

    /// Load a chat by id
    pub fn load(&self, id: &str) -> Result<ChatSession, SessionError> {
        let file = self.read_file(id)?;
        Ok(ChatSession::from_file(id.to_string(), file))
    }

    /// Write a session, allocating an id on first save
    ///
    /// Settings already on disk are merged under the in-memory settings so
    /// keys written by other clients survive.
    pub fn save(&self, session: &mut ChatSession) -> Result<(), SessionError> {
        let id = match &session.id {
            Some(id) => id.clone(),
            None => {
                let (id, index, timestamp) = self.allocate_id()?;
                if session.title.is_empty() {
                    session.title = default_title(index, timestamp);
                }
                session.id = Some(id.clone());
                id
            }
        };

        if self.path_for(&id)?.exists() {
            let existing = self.read_file(&id)?;
            let mut merged = existing.settings;
            merged.merge_from(&session.settings);
            session.settings = merged;
            if session.title.is_empty() {
                session.title = existing.title;
            }
        }

        self.write_file(&id, &session.to_file())?;
        tracing::debug!("Saved chat {} ({} messages)", id, session.messages.len());
        Ok(())
    }

    /// Summaries of all chats, newest first
    pub fn list(&self) -> Result<Vec<ChatListItem>, SessionError> {
        let mut items: Vec<(i64, ChatListItem)> = Vec::new();

        for id in self.chat_ids()? {
            let file = match self.read_file(&id) {
                Ok(file) => file,
                Err(e) => {
                    tracing::warn!("Skipping unreadable chat {}: {}", id, e);
                    continue;
                }
            };
            let millis = match filename_timestamp(&id) {
                Some(ms) => ms,
                None => self.modified_millis(&id),
            };
            items.push((
                millis,
                ChatListItem {
                    title: file.title,
                    model: Some(file.settings.model),
                    last_modified: iso_timestamp(millis),
                    message_count: file.messages.len(),
                    id,
                },
            ));
        }

        items.sort_by(|a, b| b.0.cmp(&a.0));
        Ok(items.into_iter().map(|(_, item)| item).collect())
    }

    /// Apply a settings patch
    ///
    /// A `title` key renames the chat; every other key is shallow-merged
    /// into the settings. Returns `{title, ...settings}`.
    pub fn update_settings(
        &self,
        id: &str,
        mut patch: Map<String, Value>,
    ) -> Result<Map<String, Value>, SessionError> {
        let mut file = self.read_file(id)?;

        if let Some(title) = patch.remove("title") {
            file.title = match title {
                Value::String(s) => s,
                other => other.to_string(),
            };
        }

        let mut settings = match serde_json::to_value(&file.settings)? {
            Value::Object(map) => map,
            _ => Map::new(),
        };
        settings.extend(patch);
        file.settings = serde_json::from_value(Value::Object(settings))?;

        self.write_file(id, &file)?;

        let mut response = Map::new();
        response.insert("title".to_string(), Value::String(file.title.clone()));
        if let Value::Object(settings) = serde_json::to_value(&file.settings)? {
            response.extend(settings);
        }
        Ok(response)
    }

    /// Ids of all chat files in the directory
    fn chat_ids(&self) -> Result<Vec<String>, SessionError> {
        let entries = match std::fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut ids = Vec::new();
        for entry in entries {
            let name = entry?.file_name();
            if let Some(name) = name.to_str() {
                if name.starts_with("chat-") && name.ends_with(".json") {
                    ids.push(name.to_string());
                }
            }
        }
        Ok(ids)
    }

    fn allocate_id(&self) -> Result<(String, usize, i64), SessionError> {
        let index = self.chat_ids()?.len() + 1;
        let mut timestamp = Utc::now().timestamp_millis();
        loop {
            let id = format!("chat-{}-{}.json", index, timestamp);
            if !self.dir.join(&id).exists() {
                return Ok((id, index, timestamp));
            }
            timestamp += 1;
        }
    }

    fn read_file(&self, id: &str) -> Result<ChatFile, SessionError> {
        let path = self.path_for(id)?;
        let content = match std::fs::read_to_string(&path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(SessionError::NotFound(id.to_string()))
            }
            Err(e) => return Err(e.into()),
        };
        Ok(serde_json::from_str(&content)?)
    }

    fn write_file(&self, id: &str, file: &ChatFile) -> Result<(), SessionError> {
        let path = self.path_for(id)?;
        std::fs::create_dir_all(&self.dir)?;

        let content = serde_json::to_string_pretty(file)?;
        // the temp file is removed on drop if anything below fails
        let mut tmp = NamedTempFile::new_in(&self.dir)?;
        tmp.write_all(content.as_bytes())?;
        tmp.as_file_mut().sync_all()?;
        tmp.persist(&path).map_err(|e| {
            tracing::error!("Failed to save chat {}: {}", id, e);
            SessionError::Io(e.error)
        })?;
        Ok(())
    }

    fn modified_millis(&self, id: &str) -> i64 {
        self.dir
            .join(id)
            .metadata()
            .and_then(|m| m.modified())
            .map(|t| DateTime::<Utc>::from(t).timestamp_millis())
            .unwrap_or(0)
    }
}

/// `chat-<index>-<millis>.json` → millis
fn filename_timestamp(id: &str) -> Option<i64> {
    let stem = id.strip_suffix(".json")?;
    stem.split('-').nth(2)?.parse().ok()
}

fn iso_timestamp(millis: i64) -> String {
    DateTime::<Utc>::from_timestamp_millis(millis)
        .unwrap_or_default()
        .to_rfc3339_opts(SecondsFormat::Millis, true)
}

fn default_title(index: usize, millis: i64) -> String {
    let local = Local
        .timestamp_millis_opt(millis)
        .single()
        .unwrap_or_else(Local::now);
    format!("Chat {} - {}", index, local.format("%-m/%-d/%Y, %-I:%M:%S %p"))
}
