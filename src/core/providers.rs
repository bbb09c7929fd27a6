//! Model identifier resolution and provider credentials.
//!
//! A model identifier has the form `provider/model`. The provider prefix
//! picks a family from the built-in table; the remainder names the model
//! within it. Resolution never guesses: an unrecognized prefix is an
//! error rather than a silent switch to some other provider.

use std::collections::HashMap;
use std::error::Error;
use std::fmt;
use std::sync::RwLock;

use tracing::debug;

use crate::api::models::ModelOption;
use crate::core::builtin_providers::{load_builtin_providers, BuiltinProvider, ProviderKind};
use crate::core::secret::ApiSecret;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegistryError {
    UnknownModel(String),
}

impl fmt::Display for RegistryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RegistryError::UnknownModel(model) => write!(f, "Unknown model '{model}'"),
        }
    }
}

impl Error for RegistryError {}

/// Everything needed to dispatch one request for a model identifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedModel {
    pub id: String,
    pub provider_id: String,
    pub model: String,
    pub kind: ProviderKind,
    pub endpoint: String,
    pub credential_slot: String,
}

pub struct ProviderRegistry {
    providers: Vec<BuiltinProvider>,
    credentials: RwLock<HashMap<String, ApiSecret>>,
}

impl ProviderRegistry {
    /// Registry seeded from the built-in provider table.
    pub fn new() -> Self {
        Self::from_providers(load_builtin_providers())
    }

    pub fn from_providers(providers: Vec<BuiltinProvider>) -> Self {
        Self {
            providers,
            credentials: RwLock::new(HashMap::new()),
        }
    }

    /// Point a provider family at a different base URL (self-hosted
    /// compatible servers, local proxies). Returns false for unknown ids.
    pub fn set_base_url(&mut self, provider_id: &str, base_url: &str) -> bool {
        match self
            .providers
            .iter_mut()
            .find(|provider| provider.id.eq_ignore_ascii_case(provider_id))
        {
            Some(provider) => {
                provider.base_url = base_url.trim_end_matches('/').to_string();
                true
            }
            None => false,
        }
    }

    pub fn resolve(&self, model_id: &str) -> Result<ResolvedModel, RegistryError> {
        let unknown = || RegistryError::UnknownModel(model_id.to_string());

        let (prefix, model) = model_id.trim().split_once('/').ok_or_else(unknown)?;
        if model.is_empty() {
            return Err(unknown());
        }

        let provider = self
            .providers
            .iter()
            .find(|provider| provider.id == prefix)
            .ok_or_else(unknown)?;

        if !provider.open_models && !provider.lists_model(model) {
            return Err(unknown());
        }

        let endpoint = match provider.kind {
            ProviderKind::ChatCompletions | ProviderKind::OpenRouter => {
                construct_api_url(&provider.base_url, "chat/completions")
            }
            ProviderKind::Inference => construct_api_url(&provider.base_url, model),
        };

        Ok(ResolvedModel {
            id: format!("{prefix}/{model}"),
            provider_id: provider.id.clone(),
            model: model.to_string(),
            kind: provider.kind,
            endpoint,
            credential_slot: provider.credential.clone(),
        })
    }

    pub fn resolve_endpoint(&self, model_id: &str) -> Result<String, RegistryError> {
        self.resolve(model_id).map(|resolved| resolved.endpoint)
    }

    /// Store a credential for a provider, addressed either by its
    /// credential slot (`huggingface`) or its model prefix (`hf`).
    /// Returns false when the name matches no provider.
    pub fn set_credential(&self, provider_name: &str, secret: ApiSecret) -> bool {
        let Some(slot) = self.credential_slot_for(provider_name) else {
            return false;
        };
        debug!(provider = %slot, credential = %secret, "Credential updated");
        let mut credentials = match self.credentials.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        credentials.insert(slot, secret);
        true
    }

    pub fn clear_credential(&self, provider_name: &str) -> bool {
        let Some(slot) = self.credential_slot_for(provider_name) else {
            return false;
        };
        let mut credentials = match self.credentials.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        credentials.remove(&slot);
        true
    }

    pub fn credential(&self, slot: &str) -> Option<ApiSecret> {
        let credentials = match self.credentials.read() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        credentials.get(slot).cloned()
    }

    pub fn list_models(&self) -> Vec<ModelOption> {
        self.providers
            .iter()
            .flat_map(|provider| {
                provider
                    .models
                    .iter()
                    .map(move |model| ModelOption::new(&provider.id, model))
            })
            .collect()
    }

    /// Credential slot for a slot name or model prefix, if either is known.
    pub fn credential_slot_for(&self, provider_name: &str) -> Option<String> {
        self.providers
            .iter()
            .find(|provider| {
                provider.credential.eq_ignore_ascii_case(provider_name)
                    || provider.id.eq_ignore_ascii_case(provider_name)
            })
            .map(|provider| provider.credential.clone())
    }
}

impl Default for ProviderRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Join a base URL and an endpoint path without doubling slashes.
pub fn construct_api_url(base_url: &str, endpoint: &str) -> String {
    let base = base_url.trim_end_matches('/');
    let endpoint = endpoint.trim_start_matches('/');
    format!("{base}/{endpoint}")
}
