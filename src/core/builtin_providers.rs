//! Built-in provider configuration
//!
//! This module loads the provider families and their models from the
//! embedded `builtins/models.toml` file.

use serde::{Deserialize, Serialize};

/// Which adapter speaks to a provider family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ProviderKind {
    /// OpenAI-compatible `chat/completions`.
    ChatCompletions,
    /// OpenRouter's routed `chat/completions`.
    #[serde(rename = "openrouter")]
    OpenRouter,
    /// Hosted small-model text generation, one endpoint per model.
    Inference,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuiltinProvider {
    pub id: String,
    pub kind: ProviderKind,
    pub credential: String,
    pub base_url: String,
    #[serde(default)]
    pub open_models: bool,
    pub models: Vec<String>,
}

#[derive(Debug, Serialize, Deserialize)]
struct BuiltinProvidersConfig {
    providers: Vec<BuiltinProvider>,
}

impl BuiltinProvider {
    pub fn lists_model(&self, model: &str) -> bool {
        self.models.iter().any(|listed| listed == model)
    }
}

/// Load built-in providers from the embedded configuration
pub fn load_builtin_providers() -> Vec<BuiltinProvider> {
    const CONFIG_CONTENT: &str = include_str!("../builtins/models.toml");

    let config: BuiltinProvidersConfig =
        toml::from_str(CONFIG_CONTENT).expect("Failed to parse builtins/models.toml");

    config.providers
}
