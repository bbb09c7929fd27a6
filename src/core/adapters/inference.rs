use async_trait::async_trait;
use serde_json::Value;
use tracing::{debug, warn};

use crate::api::{ChatMessage, InferenceParameters, InferenceRequest, InferenceResponse, PromptRole};
use crate::core::adapters::{
    upstream_error_message, GenerationOptions, ProviderAdapter, ProviderError,
};
use crate::core::secret::ApiSecret;

/// Returned when the endpoint answers with a shape we do not understand.
pub const INFERENCE_APOLOGY: &str =
    "I apologize, but I am having trouble understanding at the moment.";

/// Number of most recent turns small models get to see.
const HISTORY_WINDOW: usize = 6;
const ASSISTANT_MARKER: &str = "Assistant:";
const USER_MARKER: &str = "User:";

/// Hosted small-model text generation. These models take one flat prompt
/// string rather than a structured conversation, and a credential is
/// optional.
pub struct InferenceEndpointAdapter {
    client: reqwest::Client,
    endpoint: String,
    credential: Option<ApiSecret>,
}

impl InferenceEndpointAdapter {
    pub fn new(client: reqwest::Client, endpoint: String, credential: Option<ApiSecret>) -> Self {
        Self {
            client,
            endpoint,
            credential,
        }
    }
}

#[async_trait]
impl ProviderAdapter for InferenceEndpointAdapter {
    fn name(&self) -> &'static str {
        "Inference endpoint"
    }

    async fn generate(
        &self,
        messages: &[ChatMessage],
        options: &GenerationOptions,
    ) -> Result<String, ProviderError> {
        let request = InferenceRequest {
            inputs: collapse_prompt(messages),
            parameters: InferenceParameters {
                temperature: options.temperature,
                max_new_tokens: options.max_tokens,
                top_p: options.top_p,
                do_sample: true,
            },
        };

        debug!(
            endpoint = %self.endpoint,
            model = %options.model,
            authenticated = self.credential.is_some(),
            "Sending inference request"
        );

        let mut http_request = self
            .client
            .post(&self.endpoint)
            .header("Content-Type", "application/json");
        if let Some(credential) = &self.credential {
            http_request = http_request.header("Authorization", credential.bearer());
        }

        let response = http_request
            .json(&request)
            .send()
            .await
            .map_err(ProviderError::transport)?;

        let status = response.status();
        let body = response.text().await.map_err(ProviderError::transport)?;

        if !status.is_success() {
            let message = upstream_error_message(&body)
                .or_else(|| Some(body.trim().to_string()).filter(|text| !text.is_empty()))
                .unwrap_or_else(|| {
                    format!("Inference endpoint error (HTTP {})", status.as_u16())
                });
            return Err(ProviderError::upstream(message));
        }

        parse_inference_body(&body).map(|text| extract_reply(&text))
    }
}

/// Flatten the prompt into `context / Conversation / User / Assistant:` form.
pub fn collapse_prompt(messages: &[ChatMessage]) -> String {
    let context = messages
        .iter()
        .find(|message| message.role == PromptRole::System)
        .map(|message| message.content.as_str())
        .unwrap_or_default();

    let turns: Vec<&ChatMessage> = messages
        .iter()
        .filter(|message| message.role != PromptRole::System)
        .collect();
    let recent = &turns[turns.len().saturating_sub(HISTORY_WINDOW)..];
    let history = recent
        .iter()
        .map(|message| format!("{} {}", speaker(message.role), message.content))
        .collect::<Vec<_>>()
        .join("\n");

    let mut prompt = format!("{context}\n\nConversation:\n{history}");
    if let Some(last_user) = messages
        .iter()
        .rev()
        .find(|message| message.role == PromptRole::User)
    {
        prompt.push_str(&format!("\n\n{USER_MARKER} {}", last_user.content));
    }
    prompt.push_str(&format!("\n\n{ASSISTANT_MARKER}"));
    prompt
}

fn speaker(role: PromptRole) -> &'static str {
    match role {
        PromptRole::User => USER_MARKER,
        PromptRole::Assistant | PromptRole::System => ASSISTANT_MARKER,
    }
}

/// Decode the generated text from any of the response shapes endpoints
/// use. Unrecognized JSON yields the apology text; a body that is not JSON
/// at all is an error.
pub fn parse_inference_body(body: &str) -> Result<String, ProviderError> {
    let payload: InferenceResponse = serde_json::from_str(body)
        .map_err(|err| ProviderError::malformed(format!("Unreadable inference body: {err}")))?;

    let text = match payload {
        InferenceResponse::Batch(items) => items
            .first()
            .and_then(|item| item.get("generated_text"))
            .and_then(Value::as_str)
            .filter(|text| !text.is_empty())
            .map(str::to_string),
        InferenceResponse::Single(item) => Some(item.generated_text).filter(|text| !text.is_empty()),
        InferenceResponse::Bare(text) => Some(text),
        InferenceResponse::Unrecognized(value) => {
            warn!(response = %value, "Unexpected inference response format");
            None
        }
    };

    Ok(text.unwrap_or_else(|| INFERENCE_APOLOGY.to_string()))
}

/// Recover the model's own turn from generations that echo the prompt or
/// run on into invented follow-up turns.
pub fn extract_reply(generated: &str) -> String {
    let mut reply = generated;

    if let Some(index) = reply.rfind(ASSISTANT_MARKER) {
        reply = &reply[index + ASSISTANT_MARKER.len()..];
    }
    if let Some(index) = reply.find(USER_MARKER) {
        reply = &reply[..index];
    }

    reply.trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::adapters::ProviderErrorKind;
    use crate::core::test_helpers::{spawn_stub_server, StubResponse};

    fn conversation(turns: usize) -> Vec<ChatMessage> {
        let mut messages = vec![ChatMessage::new(PromptRole::System, "You are Luna.")];
        for index in 0..turns {
            let role = if index % 2 == 0 {
                PromptRole::User
            } else {
                PromptRole::Assistant
            };
            messages.push(ChatMessage::new(role, format!("turn {index}")));
        }
        messages
    }

    #[test]
    fn collapse_keeps_context_recent_turns_and_repeats_the_last_user_message() {
        let prompt = collapse_prompt(&conversation(9));

        let expected = "You are Luna.\n\nConversation:\n\
            Assistant: turn 3\n\
            User: turn 4\n\
            Assistant: turn 5\n\
            User: turn 6\n\
            Assistant: turn 7\n\
            User: turn 8\n\n\
            User: turn 8\n\n\
            Assistant:";
        assert_eq!(prompt, expected);
    }

    #[test]
    fn collapse_handles_short_conversations() {
        let prompt = collapse_prompt(&conversation(1));
        assert_eq!(
            prompt,
            "You are Luna.\n\nConversation:\nUser: turn 0\n\nUser: turn 0\n\nAssistant:"
        );

        let only_system = collapse_prompt(&conversation(0));
        assert_eq!(only_system, "You are Luna.\n\nConversation:\n\n\nAssistant:");
    }

    #[test]
    fn parses_every_known_response_shape() {
        assert_eq!(
            parse_inference_body(r#"[{"generated_text":"from batch"}]"#).unwrap(),
            "from batch"
        );
        assert_eq!(
            parse_inference_body(r#"{"generated_text":"from object"}"#).unwrap(),
            "from object"
        );
        assert_eq!(parse_inference_body(r#""bare string""#).unwrap(), "bare string");

        let mixed = parse_inference_body(r#"[{"generated_text":"Assistant: Hello!"},{"score":0.1}]"#)
            .unwrap();
        assert_eq!(extract_reply(&mixed), "Hello!");
    }

    #[test]
    fn unknown_json_shapes_become_the_apology() {
        for body in [
            r#"{"error":"loading"}"#,
            "[]",
            r#"[{"score":0.4}]"#,
            r#"{"generated_text":""}"#,
            "42",
        ] {
            assert_eq!(parse_inference_body(body).unwrap(), INFERENCE_APOLOGY, "{body}");
        }
    }

    #[test]
    fn non_json_bodies_are_malformed() {
        let err = parse_inference_body("<html>oops</html>").unwrap_err();
        assert_eq!(err.kind, ProviderErrorKind::MalformedResponse);
    }

    #[test]
    fn extract_reply_recovers_the_assistant_turn() {
        assert_eq!(
            extract_reply("...Assistant: Hi there! User: ignore this"),
            "Hi there!"
        );
        assert_eq!(
            extract_reply("Assistant: one\nAssistant: two\nUser: three\nUser: four"),
            "two"
        );
        assert_eq!(extract_reply("  plain text  "), "plain text");
        assert_eq!(extract_reply("Sure thing. User: and then"), "Sure thing.");
    }

    #[tokio::test]
    async fn posts_a_flat_prompt_and_extracts_the_reply() {
        let server = spawn_stub_server(StubResponse::ok(
            r#"[{"generated_text":"...Assistant: Hi there! User: ignore this"}]"#,
        ))
        .await;
        let adapter =
            InferenceEndpointAdapter::new(reqwest::Client::new(), server.url("/inference/GPT-2"), None);
        let mut options = GenerationOptions::for_model("hf/GPT-2");
        options.max_tokens = 42;

        let text = adapter.generate(&conversation(1), &options).await.unwrap();
        assert_eq!(text, "Hi there!");

        let request = &server.requests()[0];
        assert_eq!(request.path, "/inference/GPT-2");
        assert_eq!(request.header("authorization"), None);

        let body = request.json();
        assert!(body["inputs"].as_str().unwrap().ends_with("Assistant:"));
        assert_eq!(body["parameters"]["max_new_tokens"], 42);
        assert_eq!(body["parameters"]["do_sample"], true);
        assert!(body.get("messages").is_none());
    }

    #[tokio::test]
    async fn attaches_the_optional_credential() {
        let server = spawn_stub_server(StubResponse::ok(r#"{"generated_text":"ok"}"#)).await;
        let adapter = InferenceEndpointAdapter::new(
            reqwest::Client::new(),
            server.url("/"),
            ApiSecret::new("hf_token"),
        );

        adapter
            .generate(&conversation(1), &GenerationOptions::for_model("hf/GPT-2"))
            .await
            .unwrap();
        assert_eq!(server.requests()[0].header("authorization"), Some("Bearer hf_token"));
    }

    #[tokio::test]
    async fn error_status_uses_the_body_text() {
        let server = spawn_stub_server(StubResponse::status(500, "CUDA out of memory")).await;
        let adapter = InferenceEndpointAdapter::new(reqwest::Client::new(), server.url("/"), None);

        let err = adapter
            .generate(&conversation(1), &GenerationOptions::for_model("hf/GPT-2"))
            .await
            .unwrap_err();
        assert_eq!(err.kind, ProviderErrorKind::UpstreamHttp);
        assert_eq!(err.message, "CUDA out of memory");
    }
}
