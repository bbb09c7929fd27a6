use serde::{Deserialize, Serialize};
use serde_json::Value;

pub mod models;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PromptRole {
    System,
    User,
    Assistant,
}

#[derive(Debug, Serialize, Clone, PartialEq)]
pub struct ChatMessage {
    pub role: PromptRole,
    pub content: String,
}

impl ChatMessage {
    pub fn new(role: PromptRole, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }
}

#[derive(Serialize)]
pub struct ChatRequest<'a> {
    pub model: &'a str,
    pub messages: &'a [ChatMessage],
    pub temperature: f32,
    pub max_tokens: u32,
    pub top_p: f32,
    pub presence_penalty: f32,
    pub frequency_penalty: f32,
    pub stream: bool,
}

#[derive(Deserialize)]
pub struct ChatResponseMessage {
    pub content: Option<String>,
}

#[derive(Deserialize)]
pub struct ChatResponseChoice {
    pub message: ChatResponseMessage,
}

#[derive(Deserialize)]
pub struct ChatResponse {
    #[serde(default)]
    pub choices: Vec<ChatResponseChoice>,
}

#[derive(Serialize)]
pub struct InferenceParameters {
    pub temperature: f32,
    pub max_new_tokens: u32,
    pub top_p: f32,
    pub do_sample: bool,
}

#[derive(Serialize)]
pub struct InferenceRequest {
    pub inputs: String,
    pub parameters: InferenceParameters,
}

#[derive(Debug, Deserialize)]
pub struct GeneratedText {
    pub generated_text: String,
}

/// The shapes hosted text-generation endpoints reply with. Only the first
/// element of a batch is read, so its other elements may take any shape.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum InferenceResponse {
    Batch(Vec<Value>),
    Single(GeneratedText),
    Bare(String),
    Unrecognized(Value),
}
