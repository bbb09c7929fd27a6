use async_trait::async_trait;
use tracing::debug;

use crate::api::{ChatMessage, ChatRequest, ChatResponse};
use crate::core::adapters::{
    upstream_error_message, GenerationOptions, ProviderAdapter, ProviderError,
};
use crate::core::secret::ApiSecret;

/// OpenAI-compatible `chat/completions`, non-streaming.
pub struct ChatCompletionsAdapter {
    client: reqwest::Client,
    endpoint: String,
    credential: Option<ApiSecret>,
}

impl ChatCompletionsAdapter {
    pub fn new(client: reqwest::Client, endpoint: String, credential: Option<ApiSecret>) -> Self {
        Self {
            client,
            endpoint,
            credential,
        }
    }
}

#[async_trait]
impl ProviderAdapter for ChatCompletionsAdapter {
    fn name(&self) -> &'static str {
        "OpenAI"
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

        send_chat_request(ChatCall {
            client: &self.client,
            endpoint: &self.endpoint,
            credential,
            provider_label: self.name(),
            model: options.model_name(),
            messages,
            options,
            extra_headers: &[],
        })
        .await
    }
}

pub(crate) struct ChatCall<'a> {
    pub client: &'a reqwest::Client,
    pub endpoint: &'a str,
    pub credential: &'a ApiSecret,
    pub provider_label: &'a str,
    pub model: &'a str,
    pub messages: &'a [ChatMessage],
    pub options: &'a GenerationOptions,
    pub extra_headers: &'a [(&'static str, String)],
}

/// One `chat/completions` round trip shared by every OpenAI-shaped provider.
pub(crate) async fn send_chat_request(call: ChatCall<'_>) -> Result<String, ProviderError> {
    let request = ChatRequest {
        model: call.model,
        messages: call.messages,
        temperature: call.options.temperature,
        max_tokens: call.options.max_tokens,
        top_p: call.options.top_p,
        presence_penalty: call.options.presence_penalty,
        frequency_penalty: call.options.frequency_penalty,
        stream: false,
    };

    debug!(
        provider = call.provider_label,
        endpoint = call.endpoint,
        model = call.model,
        messages = call.messages.len(),
        "Sending chat completion request"
    );

    let mut http_request = call
        .client
        .post(call.endpoint)
        .header("Content-Type", "application/json")
        .header("Authorization", call.credential.bearer());
    for (name, value) in call.extra_headers {
        http_request = http_request.header(*name, value);
    }

    let response = http_request
        .json(&request)
        .send()
        .await
        .map_err(ProviderError::transport)?;

    let status = response.status();
    let body = response.text().await.map_err(ProviderError::transport)?;

    if !status.is_success() {
        let message = upstream_error_message(&body).unwrap_or_else(|| {
            format!(
                "{} API error (HTTP {})",
                call.provider_label,
                status.as_u16()
            )
        });
        return Err(ProviderError::upstream(message));
    }

    parse_chat_response(&body)
}

pub(crate) fn parse_chat_response(body: &str) -> Result<String, ProviderError> {
    let response: ChatResponse = serde_json::from_str(body)
        .map_err(|err| ProviderError::malformed(format!("Unreadable completion body: {err}")))?;

    response
        .choices
        .into_iter()
        .next()
        .and_then(|choice| choice.message.content)
        .map(|content| content.trim().to_string())
        .ok_or_else(|| ProviderError::malformed("Completion response has no message content"))
}
