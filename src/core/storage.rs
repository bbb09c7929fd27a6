//! The persistence surface the response pipeline reads from and writes to.

use std::error::Error;
use std::fmt;

use async_trait::async_trait;

use crate::character::Character;
use crate::core::message::{Chat, Message};
use crate::core::secret::ApiSecret;

/// Settings consumed by generation: the default model, sampling defaults,
/// and the per-provider secrets.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UserSettings {
    pub default_model: Option<String>,
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
    pub openai_key: Option<ApiSecret>,
    pub openrouter_key: Option<ApiSecret>,
    pub huggingface_key: Option<ApiSecret>,
    /// Upstream model used for `openrouter/any`.
    pub openrouter_model: Option<String>,
}

impl UserSettings {
    /// `(credential slot, secret)` for every configured provider secret.
    pub fn credentials(&self) -> Vec<(&'static str, ApiSecret)> {
        [
            ("openai", &self.openai_key),
            ("openrouter", &self.openrouter_key),
            ("huggingface", &self.huggingface_key),
        ]
        .into_iter()
        .filter_map(|(slot, secret)| secret.clone().map(|secret| (slot, secret)))
        .collect()
    }
}

/// Partial chat update, applied atomically by the store.
#[derive(Debug, Clone, Default)]
pub struct ChatUpdate {
    pub messages: Option<Vec<Message>>,
    pub unread: Option<bool>,
    /// Drop every typing placeholder, whatever else is in the chat.
    pub discard_typing: bool,
    /// Character reply appended last. Skipped when the newest
    /// conversational message is already a character reply.
    pub reply: Option<Message>,
}

impl ChatUpdate {
    pub fn discard_typing() -> Self {
        Self {
            discard_typing: true,
            ..Self::default()
        }
    }

    /// Clear typing placeholders and append `reply` in one step.
    pub fn commit_reply(reply: Message) -> Self {
        Self {
            discard_typing: true,
            reply: Some(reply),
            ..Self::default()
        }
    }

    pub fn mark_read() -> Self {
        Self {
            unread: Some(false),
            ..Self::default()
        }
    }

    pub(crate) fn apply(self, chat: &mut Chat) {
        if let Some(messages) = self.messages {
            chat.messages = messages;
        }
        if let Some(unread) = self.unread {
            chat.unread = unread;
        }
        if self.discard_typing {
            chat.discard_typing();
        }
        if let Some(reply) = self.reply {
            let answered = chat
                .last_conversational_message()
                .is_some_and(Message::is_character);
            if !answered {
                if reply.is_character() {
                    chat.unread = true;
                }
                chat.messages.push(reply);
            }
        }
    }
}

#[derive(Debug)]
pub enum StorageError {
    ChatNotFound(String),
    CharacterNotFound(String),
    /// System characters are read-only.
    ReadOnlyCharacter(String),
    Io(std::io::Error),
    Serialize(serde_json::Error),
}

impl fmt::Display for StorageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StorageError::ChatNotFound(id) => write!(f, "Chat '{id}' not found"),
            StorageError::CharacterNotFound(id) => write!(f, "Character '{id}' not found"),
            StorageError::ReadOnlyCharacter(id) => {
                write!(f, "Character '{id}' is part of the built-in catalog and cannot be changed")
            }
            StorageError::Io(err) => write!(f, "Store I/O error: {err}"),
            StorageError::Serialize(err) => write!(f, "Store format error: {err}"),
        }
    }
}

impl Error for StorageError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            StorageError::Io(err) => Some(err),
            StorageError::Serialize(err) => Some(err),
            _ => None,
        }
    }
}

impl From<std::io::Error> for StorageError {
    fn from(err: std::io::Error) -> Self {
        StorageError::Io(err)
    }
}

impl From<serde_json::Error> for StorageError {
    fn from(err: serde_json::Error) -> Self {
        StorageError::Serialize(err)
    }
}

/// Read/write operations generation depends on. Implementations must apply
/// each call atomically with respect to other calls on the same chat.
#[async_trait]
pub trait Storage: Send + Sync {
    async fn get_chat(&self, id: &str) -> Result<Option<Chat>, StorageError>;

    async fn update_chat(&self, id: &str, update: ChatUpdate) -> Result<Chat, StorageError>;

    async fn get_character(&self, id: &str) -> Result<Option<Character>, StorageError>;

    /// Append a message. A `character` message marks the chat unread.
    async fn add_message(&self, chat_id: &str, message: Message) -> Result<Chat, StorageError>;

    async fn get_user_settings(&self) -> Result<UserSettings, StorageError>;
}
