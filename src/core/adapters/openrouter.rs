use async_trait::async_trait;

use crate::api::ChatMessage;
use crate::core::adapters::chat_completions::{send_chat_request, ChatCall};
use crate::core::adapters::{GenerationOptions, ProviderAdapter, ProviderError};
use crate::core::secret::ApiSecret;

/// Model routed to when neither the identifier nor the settings pick one.
pub const DEFAULT_OPENROUTER_MODEL: &str = "openai/gpt-3.5-turbo";

const APP_REFERER: &str = "http://localhost";
const APP_TITLE: &str = "AI Character Chat";

/// OpenRouter's `chat/completions`. Same wire shape as OpenAI, but the
/// model field carries the routed upstream model and the request is tagged
/// with the calling application for OpenRouter's dashboards.
pub struct OpenRouterAdapter {
    client: reqwest::Client,
    endpoint: String,
    credential: Option<ApiSecret>,
}

impl OpenRouterAdapter {
    pub fn new(client: reqwest::Client, endpoint: String, credential: Option<ApiSecret>) -> Self {
        Self {
            client,
            endpoint,
            credential,
        }
    }
}

#[async_trait]
impl ProviderAdapter for OpenRouterAdapter {
    fn name(&self) -> &'static str {
        "OpenRouter"
    }

    async fn generate(
        &self,
        messages: &[ChatMessage],
        options: &GenerationOptions,
    ) -> Result<String, ProviderError> {
        let credential = self
            .credential
            .as_ref()
            .ok_or_else(|| ProviderError::missing_credential(self.name()))?;

        let model = options
            .specific_model
            .as_deref()
            .map(str::trim)
            .filter(|model| !model.is_empty())
            .unwrap_or(DEFAULT_OPENROUTER_MODEL);

        let headers = [
            ("HTTP-Referer", APP_REFERER.to_string()),
            ("X-Title", APP_TITLE.to_string()),
        ];

        send_chat_request(ChatCall {
            client: &self.client,
            endpoint: &self.endpoint,
            credential,
            provider_label: self.name(),
            model,
            messages,
            options,
            extra_headers: &headers,
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::PromptRole;
    use crate::core::adapters::ProviderErrorKind;
    use crate::core::test_helpers::{spawn_stub_server, StubResponse};

    const REPLY: &str = r#"{"choices":[{"message":{"content":"Routed reply"}}]}"#;

    fn prompt() -> Vec<ChatMessage> {
        vec![ChatMessage::new(PromptRole::User, "hello")]
    }

    #[tokio::test]
    async fn requires_its_own_credential() {
        let server = spawn_stub_server(StubResponse::ok(REPLY)).await;
        let adapter = OpenRouterAdapter::new(reqwest::Client::new(), server.url("/"), None);

        let err = adapter
            .generate(&prompt(), &GenerationOptions::for_model("openrouter/any"))
            .await
            .unwrap_err();
        assert_eq!(err.kind, ProviderErrorKind::MissingCredential);
        assert_eq!(server.request_count(), 0);
    }

    #[tokio::test]
    async fn defaults_the_routed_model_and_tags_the_request() {
        let server = spawn_stub_server(StubResponse::ok(REPLY)).await;
        let adapter = OpenRouterAdapter::new(
            reqwest::Client::new(),
            server.url("/api/v1/chat/completions"),
            ApiSecret::new("or-key"),
        );

        let text = adapter
            .generate(&prompt(), &GenerationOptions::for_model("openrouter/any"))
            .await
            .unwrap();
        assert_eq!(text, "Routed reply");

        let request = &server.requests()[0];
        assert_eq!(request.json()["model"], DEFAULT_OPENROUTER_MODEL);
        assert_eq!(request.header("authorization"), Some("Bearer or-key"));
        assert_eq!(request.header("http-referer"), Some(APP_REFERER));
        assert_eq!(request.header("x-title"), Some(APP_TITLE));
    }

    #[tokio::test]
    async fn specific_model_override_is_sent_upstream() {
        let server = spawn_stub_server(StubResponse::ok(REPLY)).await;
        let adapter = OpenRouterAdapter::new(
            reqwest::Client::new(),
            server.url("/"),
            ApiSecret::new("or-key"),
        );
        let mut options = GenerationOptions::for_model("openrouter/meta-llama/llama-3-8b");
        options.specific_model = Some("meta-llama/llama-3-8b".to_string());

        adapter.generate(&prompt(), &options).await.unwrap();
        assert_eq!(server.requests()[0].json()["model"], "meta-llama/llama-3-8b");
    }
}
