//! Chat file types
//!
//! Field names follow the on-disk JSON written by the desktop and web
//! clients, so files can be shared between them.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::agent::events::ChatSnapshot;
use crate::llm::ConversationMessage;

/// Default model for new chats
pub const DEFAULT_MODEL: &str = "claude-3-7-sonnet-20250219";

fn default_model() -> String {
    DEFAULT_MODEL.to_string()
}

/// Per-chat settings
///
/// Keys this client does not know about are kept in `extra` and written
/// back unchanged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatSettings {
    #[serde(default = "default_model")]
    pub model: String,

    #[serde(
        rename = "systemPrompt",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub system_prompt: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub servers: Option<Vec<String>>,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Default for ChatSettings {
    fn default() -> Self {
        Self {
            model: default_model(),
            system_prompt: None,
            servers: None,
            extra: Map::new(),
        }
    }
}

impl ChatSettings {
    pub fn with_model(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            ..Self::default()
        }
    }

    /// Merge `newer` over `self`
    ///
    /// The model always comes from `newer`; the prompt and server list only
    /// when set there. Extra keys are unioned, `newer` winning.
    pub fn merge_from(&mut self, newer: &ChatSettings) {
        self.model = newer.model.clone();
        if newer.system_prompt.is_some() {
            self.system_prompt = newer.system_prompt.clone();
        }
        if newer.servers.is_some() {
            self.servers = newer.servers.clone();
        }
        for (key, value) in &newer.extra {
            self.extra.insert(key.clone(), value.clone());
        }
    }

    /// Server launch strings, empty when unset
    pub fn server_list(&self) -> &[String] {
        self.servers.as_deref().unwrap_or(&[])
    }
}

/// On-disk chat file
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatFile {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub settings: ChatSettings,
    #[serde(default)]
    pub messages: Vec<ConversationMessage>,
}

/// A chat held in memory
///
/// A session without an id has never been saved.
#[derive(Debug, Clone, Default)]
pub struct ChatSession {
    pub id: Option<String>,
    pub title: String,
    pub settings: ChatSettings,
    pub messages: Vec<ConversationMessage>,
}

impl ChatSession {
    /// Fresh, unsaved session
    pub fn new(settings: ChatSettings) -> Self {
        Self {
            id: None,
            title: String::new(),
            settings,
            messages: Vec::new(),
        }
    }

    pub(crate) fn from_file(id: String, file: ChatFile) -> Self {
        Self {
            id: Some(id),
            title: file.title,
            settings: file.settings,
            messages: file.messages,
        }
    }

    pub(crate) fn to_file(&self) -> ChatFile {
        ChatFile {
            title: self.title.clone(),
            settings: self.settings.clone(),
            messages: self.messages.clone(),
        }
    }

    /// Final state sent to live consumers after a turn
    pub fn snapshot(&self) -> ChatSnapshot {
        ChatSnapshot {
            id: self.id.clone().unwrap_or_default(),
            title: self.title.clone(),
            messages: self.messages.clone(),
            settings: self.settings.clone(),
        }
    }
}

/// Summary row returned by `list` and `create`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatListItem {
    pub id: String,
    pub title: String,
    pub model: Option<String>,
    pub last_modified: String,
    pub message_count: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_settings_keep_unknown_keys() {
        let raw = r#"{"model":"claude-x","systemPrompt":"be brief","temperature":0.2}"#;
        let settings: ChatSettings = serde_json::from_str(raw).unwrap();
        assert_eq!(settings.system_prompt.as_deref(), Some("be brief"));
        assert!(settings.servers.is_none());
        assert_eq!(settings.extra["temperature"], serde_json::json!(0.2));
        assert_eq!(serde_json::to_string(&settings).unwrap(), raw);
    }

    #[test]
    fn test_missing_model_defaults() {
        let settings: ChatSettings = serde_json::from_str("{}").unwrap();
        assert_eq!(settings.model, DEFAULT_MODEL);
    }

    #[test]
    fn test_merge_prefers_newer() {
        let mut existing: ChatSettings = serde_json::from_str(
            r#"{"model":"old","systemPrompt":"keep me","servers":["npx a"],"theme":"dark","x":1}"#,
        )
        .unwrap();
        let mut newer = ChatSettings::with_model("new");
        newer.extra.insert("x".into(), serde_json::json!(2));

        existing.merge_from(&newer);

        assert_eq!(existing.model, "new");
        assert_eq!(existing.system_prompt.as_deref(), Some("keep me"));
        assert_eq!(existing.server_list(), ["npx a".to_string()]);
        assert_eq!(existing.extra["theme"], "dark");
        assert_eq!(existing.extra["x"], 2);
    }

    #[test]
    fn test_list_item_wire_names() {
        let item = ChatListItem {
            id: "chat-1-0.json".into(),
            title: "Chat 1".into(),
            model: Some(DEFAULT_MODEL.into()),
            last_modified: "1970-01-01T00:00:00.000Z".into(),
            message_count: 0,
        };
        let json = serde_json::to_value(&item).unwrap();
        assert!(json.get("lastModified").is_some());
        assert!(json.get("messageCount").is_some());
    }
}
