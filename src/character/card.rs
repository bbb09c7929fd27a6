use serde::{Deserialize, Serialize};

/// Prefix carried by ids of characters shipped with the application.
pub const SYSTEM_ID_PREFIX: &str = "system-";
/// Prefix carried by ids of characters created by the user.
pub const USER_ID_PREFIX: &str = "user-";

/// Model identifier value meaning "use whatever the settings say".
pub const DEFAULT_MODEL_SENTINEL: &str = "default";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DialogueExample {
    pub user: String,
    pub character: String,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum Visibility {
    #[default]
    Public,
    Private,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Character {
    #[serde(default)]
    pub id: String,
    pub name: String,
    pub description: String,
    #[serde(default)]
    pub full_description: String,
    #[serde(default)]
    pub personality: String,
    #[serde(default)]
    pub greeting: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub categories: Vec<String>,
    #[serde(default)]
    pub dialogue_examples: Vec<DialogueExample>,

    // Generation overrides; absent values fall through to settings.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preferred_model: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub top_p: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub presence_penalty: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub frequency_penalty: Option<f32>,

    #[serde(default)]
    pub nsfw: bool,
    #[serde(default)]
    pub visibility: Visibility,
}

impl Character {
    pub fn is_system(&self) -> bool {
        self.id.starts_with(SYSTEM_ID_PREFIX)
    }

    /// Long description when present, otherwise the short one.
    pub fn best_description(&self) -> &str {
        if self.full_description.trim().is_empty() {
            &self.description
        } else {
            &self.full_description
        }
    }

    /// The preferred model, ignoring blanks and the `default` sentinel.
    pub fn model_override(&self) -> Option<&str> {
        self.preferred_model
            .as_deref()
            .map(str::trim)
            .filter(|model| !model.is_empty() && *model != DEFAULT_MODEL_SENTINEL)
    }

    /// Opening line for a fresh chat.
    pub fn greeting_or_default(&self) -> String {
        if self.greeting.trim().is_empty() {
            format!("Hello! I'm {}. How can I help you today?", self.name)
        } else {
            self.greeting.clone()
        }
    }
}
