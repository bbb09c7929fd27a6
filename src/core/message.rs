use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Sender {
    User,
    Character,
    System,
}

impl Sender {
    pub fn as_str(self) -> &'static str {
        match self {
            Sender::User => "user",
            Sender::Character => "character",
            Sender::System => "system",
        }
    }

    /// Whether messages from this sender are part of the conversation sent
    /// to a provider. System messages are UI markers only.
    pub fn is_conversational(self) -> bool {
        matches!(self, Sender::User | Sender::Character)
    }
}

impl AsRef<str> for Sender {
    fn as_ref(&self) -> &str {
        self.as_str()
    }
}

impl TryFrom<&str> for Sender {
    type Error = String;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value {
            "user" => Ok(Sender::User),
            "character" => Ok(Sender::Character),
            "system" => Ok(Sender::System),
            _ => Err(format!("invalid message sender: {value}")),
        }
    }
}

impl TryFrom<String> for Sender {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::try_from(value.as_str())
    }
}

impl From<Sender> for String {
    fn from(value: Sender) -> Self {
        value.as_str().to_string()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub id: String,
    pub sender: Sender,
    pub content: String,
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub is_typing: bool,
}

impl Message {
    pub fn new(
        id: impl Into<String>,
        sender: Sender,
        content: impl Into<String>,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            id: id.into(),
            sender,
            content: content.into(),
            timestamp,
            is_typing: false,
        }
    }

    /// Transient placeholder shown while a reply is being generated.
    pub fn typing(id: impl Into<String>, character_name: &str, timestamp: DateTime<Utc>) -> Self {
        Self {
            id: id.into(),
            sender: Sender::System,
            content: format!("{character_name} is typing..."),
            timestamp,
            is_typing: true,
        }
    }

    pub fn is_user(&self) -> bool {
        self.sender == Sender::User
    }

    pub fn is_character(&self) -> bool {
        self.sender == Sender::Character
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Chat {
    pub id: String,
    pub character_id: String,
    #[serde(default)]
    pub messages: Vec<Message>,
    #[serde(default)]
    pub unread: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Chat {
    pub fn new(id: impl Into<String>, character_id: impl Into<String>, now: DateTime<Utc>) -> Self {
        Self {
            id: id.into(),
            character_id: character_id.into(),
            messages: Vec::new(),
            unread: false,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn last_user_message(&self) -> Option<&Message> {
        self.messages.iter().rev().find(|message| message.is_user())
    }

    /// Most recent message that belongs to the conversation proper.
    pub fn last_conversational_message(&self) -> Option<&Message> {
        self.messages
            .iter()
            .rev()
            .find(|message| message.sender.is_conversational())
    }

    pub fn typing_count(&self) -> usize {
        self.messages.iter().filter(|message| message.is_typing).count()
    }

    pub fn discard_typing(&mut self) {
        self.messages.retain(|message| !message.is_typing);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap()
    }

    #[test]
    fn sender_strings_round_trip_through_serde() {
        let message = Message::new("msg-1", Sender::Character, "Hello", at(0));
        let json = serde_json::to_string(&message).unwrap();
        assert!(json.contains(r#""sender":"character""#));
        assert!(!json.contains("isTyping"));

        let parsed: Message = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, message);
    }

    #[test]
    fn invalid_sender_strings_are_rejected() {
        assert!(Sender::try_from("assistant").is_err());
        let json = r#"{"id":"m","sender":"bot","content":"x","timestamp":"2024-01-01T00:00:00Z"}"#;
        assert!(serde_json::from_str::<Message>(json).is_err());
    }

    #[test]
    fn typing_placeholder_is_a_system_message() {
        let typing = Message::typing("msg-t", "Luna", at(0));
        assert_eq!(typing.sender, Sender::System);
        assert!(typing.is_typing);
        assert_eq!(typing.content, "Luna is typing...");

        let json = serde_json::to_string(&typing).unwrap();
        assert!(json.contains(r#""isTyping":true"#));
    }

    #[test]
    fn chat_lookups_skip_system_markers() {
        let mut chat = Chat::new("chat-1", "system-luna", at(0));
        chat.messages.push(Message::new("m1", Sender::User, "first", at(1)));
        chat.messages.push(Message::new("m2", Sender::Character, "reply", at(2)));
        chat.messages.push(Message::new("m3", Sender::User, "second", at(3)));
        chat.messages.push(Message::typing("m4", "Luna", at(4)));

        assert_eq!(chat.last_user_message().map(|m| m.id.as_str()), Some("m3"));
        assert_eq!(
            chat.last_conversational_message().map(|m| m.id.as_str()),
            Some("m3")
        );
        assert_eq!(chat.typing_count(), 1);

        chat.discard_typing();
        assert_eq!(chat.typing_count(), 0);
        assert_eq!(chat.messages.len(), 3);
    }
}
