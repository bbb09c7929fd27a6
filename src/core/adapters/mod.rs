//! Provider adapters turn the provider-agnostic prompt into one HTTP call
//! and the reply back into plain text.

pub mod chat_completions;
pub mod inference;
pub mod openrouter;

use std::error::Error;
use std::fmt;

use async_trait::async_trait;

use crate::api::ChatMessage;
use crate::core::builtin_providers::ProviderKind;
use crate::core::providers::{RegistryError, ResolvedModel};
use crate::core::secret::ApiSecret;

pub use chat_completions::ChatCompletionsAdapter;
pub use inference::InferenceEndpointAdapter;
pub use openrouter::OpenRouterAdapter;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderErrorKind {
    /// A provider that requires a secret has none configured.
    MissingCredential,
    /// The provider answered with a non-2xx status.
    UpstreamHttp,
    /// The provider answered 2xx with a body we cannot read.
    MalformedResponse,
    /// The model identifier does not resolve to a known provider.
    UnknownModel,
    /// Connection failures and timeouts.
    Transport,
}

impl ProviderErrorKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ProviderErrorKind::MissingCredential => "missing_credential",
            ProviderErrorKind::UpstreamHttp => "upstream_http",
            ProviderErrorKind::MalformedResponse => "malformed_response",
            ProviderErrorKind::UnknownModel => "unknown_model",
            ProviderErrorKind::Transport => "transport",
        }
    }

    /// Configuration problems are not worth retrying: the same request
    /// fails the same way until the user changes their settings.
    pub fn is_configuration(self) -> bool {
        matches!(
            self,
            ProviderErrorKind::MissingCredential | ProviderErrorKind::UnknownModel
        )
    }
}

impl fmt::Display for ProviderErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderError {
    pub kind: ProviderErrorKind,
    pub message: String,
}

impl ProviderError {
    pub fn new(kind: ProviderErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn missing_credential(provider_label: &str) -> Self {
        Self::new(
            ProviderErrorKind::MissingCredential,
            format!("{provider_label} API key is required. Add it with 'charchat auth' or the config file."),
        )
    }

    pub fn upstream(message: impl Into<String>) -> Self {
        Self::new(ProviderErrorKind::UpstreamHttp, message)
    }

    pub fn malformed(message: impl Into<String>) -> Self {
        Self::new(ProviderErrorKind::MalformedResponse, message)
    }

    pub(crate) fn transport(err: reqwest::Error) -> Self {
        let message = if err.is_timeout() {
            format!("Request timed out: {err}")
        } else {
            format!("Request failed: {err}")
        };
        Self::new(ProviderErrorKind::Transport, message)
    }
}

impl fmt::Display for ProviderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.message, self.kind)
    }
}

impl Error for ProviderError {}

impl From<RegistryError> for ProviderError {
    fn from(err: RegistryError) -> Self {
        Self::new(ProviderErrorKind::UnknownModel, err.to_string())
    }
}

pub const DEFAULT_TEMPERATURE: f32 = 0.7;
pub const DEFAULT_MAX_TOKENS: u32 = 150;
pub const DEFAULT_TOP_P: f32 = 0.9;
pub const DEFAULT_PRESENCE_PENALTY: f32 = 0.6;
pub const DEFAULT_FREQUENCY_PENALTY: f32 = 0.6;

/// Sampling parameters for one generation request.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationOptions {
    /// Full `provider/model` identifier.
    pub model: String,
    pub temperature: f32,
    pub max_tokens: u32,
    pub top_p: f32,
    pub presence_penalty: f32,
    pub frequency_penalty: f32,
    /// Upstream model routed to by aggregators such as OpenRouter.
    pub specific_model: Option<String>,
}

impl GenerationOptions {
    pub fn for_model(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            temperature: DEFAULT_TEMPERATURE,
            max_tokens: DEFAULT_MAX_TOKENS,
            top_p: DEFAULT_TOP_P,
            presence_penalty: DEFAULT_PRESENCE_PENALTY,
            frequency_penalty: DEFAULT_FREQUENCY_PENALTY,
            specific_model: None,
        }
    }

    /// The model name with the provider prefix stripped.
    pub fn model_name(&self) -> &str {
        self.model
            .split_once('/')
            .map(|(_, name)| name)
            .unwrap_or(self.model.as_str())
    }
}

#[async_trait]
pub trait ProviderAdapter: Send + Sync {
    fn name(&self) -> &'static str;

    async fn generate(
        &self,
        messages: &[ChatMessage],
        options: &GenerationOptions,
    ) -> Result<String, ProviderError>;
}

/// Build the adapter for a resolved model, handing it the credential
/// configured for its slot.
pub fn adapter_for(
    resolved: &ResolvedModel,
    client: reqwest::Client,
    credential: Option<ApiSecret>,
) -> Box<dyn ProviderAdapter> {
    match resolved.kind {
        ProviderKind::ChatCompletions => Box::new(ChatCompletionsAdapter::new(
            client,
            resolved.endpoint.clone(),
            credential,
        )),
        ProviderKind::OpenRouter => Box::new(OpenRouterAdapter::new(
            client,
            resolved.endpoint.clone(),
            credential,
        )),
        ProviderKind::Inference => Box::new(InferenceEndpointAdapter::new(
            client,
            resolved.endpoint.clone(),
            credential,
        )),
    }
}

fn extract_error_summary(value: &serde_json::Value) -> Option<String> {
    let summary = value
        .pointer("/error/message")
        .and_then(|v| v.as_str())
        .map(str::to_owned)
        .or_else(|| {
            value.get("error").and_then(|v| match v {
                serde_json::Value::String(s) => Some(s.to_string()),
                _ => None,
            })
        })
        .or_else(|| {
            value
                .get("message")
                .and_then(|v| v.as_str().map(str::to_owned))
        });

    summary
        .map(|text| text.split_whitespace().collect::<Vec<_>>().join(" "))
        .filter(|text| !text.is_empty())
}

/// Pull a human-readable message out of an error body, if it carries one.
pub(crate) fn upstream_error_message(body: &str) -> Option<String> {
    serde_json::from_str::<serde_json::Value>(body.trim())
        .ok()
        .and_then(|value| extract_error_summary(&value))
}
