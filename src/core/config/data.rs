use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, warn};

use crate::core::config::io::ConfigError;
use crate::core::keyring::SecretVault;
use crate::core::orchestrator::DEFAULT_REQUEST_TIMEOUT;
use crate::core::providers::ProviderRegistry;
use crate::core::secret::ApiSecret;
use crate::core::storage::UserSettings;

/// Credential slot and the environment variable consulted for it.
const CREDENTIAL_SOURCES: [(&str, &str); 3] = [
    ("openai", "OPENAI_API_KEY"),
    ("openrouter", "OPENROUTER_API_KEY"),
    ("huggingface", "HUGGINGFACE_API_KEY"),
];

const BASE_URL_KEY_PREFIX: &str = "base_url.";

#[derive(Debug, Serialize, Deserialize, Default, Clone, PartialEq)]
pub struct Config {
    /// Model used when a character has no preference, e.g. `openai/gpt-4`
    pub default_model: Option<String>,
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
    pub openai_key: Option<String>,
    pub openrouter_key: Option<String>,
    pub huggingface_key: Option<String>,
    /// Upstream model for `openrouter/any`
    pub openrouter_model: Option<String>,
    pub request_timeout_secs: Option<u64>,
    /// Provider id -> base URL override
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub base_urls: BTreeMap<String, String>,
}

/// Get a user-friendly display string for a path
/// Converts absolute paths to use ~ notation on Unix-like systems when possible
pub fn path_display<P: AsRef<Path>>(path: P) -> String {
    let path = path.as_ref();

    #[cfg(unix)]
    {
        if let Some(home) = std::env::var_os("HOME") {
            let home_path = PathBuf::from(home);
            if let Ok(relative) = path.strip_prefix(&home_path) {
                return format!("~/{}", relative.display());
            }
        }
    }

    path.display().to_string()
}

impl Config {
    /// Keys accepted by [`Config::set_value`], for help output.
    pub fn settable_keys() -> &'static [&'static str] {
        &[
            "default_model",
            "temperature",
            "max_tokens",
            "openai_key",
            "openrouter_key",
            "huggingface_key",
            "openrouter_model",
            "request_timeout_secs",
            "base_url.<provider>",
        ]
    }

    pub fn set_value(&mut self, key: &str, value: &str) -> Result<(), ConfigError> {
        let value = value.trim();
        if value.is_empty() {
            return Err(ConfigError::invalid(key, value, "value cannot be empty"));
        }

        match key {
            "default_model" => {
                if !value.contains('/') {
                    return Err(ConfigError::invalid(key, value, "expected provider/model"));
                }
                self.default_model = Some(value.to_string());
            }
            "temperature" => {
                let temperature: f32 = value
                    .parse()
                    .map_err(|_| ConfigError::invalid(key, value, "expected a number"))?;
                if !(0.0..=2.0).contains(&temperature) {
                    return Err(ConfigError::invalid(key, value, "expected 0.0 to 2.0"));
                }
                self.temperature = Some(temperature);
            }
            "max_tokens" => self.max_tokens = Some(parse_positive(key, value)?),
            "request_timeout_secs" => self.request_timeout_secs = Some(parse_positive(key, value)?),
            "openai_key" => self.openai_key = Some(value.to_string()),
            "openrouter_key" => self.openrouter_key = Some(value.to_string()),
            "huggingface_key" => self.huggingface_key = Some(value.to_string()),
            "openrouter_model" => self.openrouter_model = Some(value.to_string()),
            _ => match key.strip_prefix(BASE_URL_KEY_PREFIX) {
                Some(provider) if !provider.is_empty() => {
                    if !value.starts_with("http://") && !value.starts_with("https://") {
                        return Err(ConfigError::invalid(key, value, "expected an http(s) URL"));
                    }
                    self.base_urls
                        .insert(provider.to_string(), value.trim_end_matches('/').to_string());
                }
                _ => return Err(ConfigError::UnknownKey(key.to_string())),
            },
        }
        Ok(())
    }

    /// Clear a key. Returns whether anything was set.
    pub fn unset_value(&mut self, key: &str) -> Result<bool, ConfigError> {
        let was_set = match key {
            "default_model" => self.default_model.take().is_some(),
            "temperature" => self.temperature.take().is_some(),
            "max_tokens" => self.max_tokens.take().is_some(),
            "request_timeout_secs" => self.request_timeout_secs.take().is_some(),
            "openai_key" => self.openai_key.take().is_some(),
            "openrouter_key" => self.openrouter_key.take().is_some(),
            "huggingface_key" => self.huggingface_key.take().is_some(),
            "openrouter_model" => self.openrouter_model.take().is_some(),
            _ => match key.strip_prefix(BASE_URL_KEY_PREFIX) {
                Some(provider) if !provider.is_empty() => self.base_urls.remove(provider).is_some(),
                _ => return Err(ConfigError::UnknownKey(key.to_string())),
            },
        };
        Ok(was_set)
    }

    pub fn request_timeout(&self) -> Duration {
        self.request_timeout_secs
            .filter(|secs| *secs > 0)
            .map(Duration::from_secs)
            .unwrap_or(DEFAULT_REQUEST_TIMEOUT)
    }

    /// Point registry providers at any configured base URL overrides.
    pub fn apply_base_urls(&self, registry: &mut ProviderRegistry) {
        for (provider, base_url) in &self.base_urls {
            if !registry.set_base_url(provider, base_url) {
                warn!(provider = %provider, "Ignoring base URL for unknown provider");
            }
        }
    }

    /// Settings with process environment lookups.
    pub fn user_settings(&self, vault: &SecretVault) -> UserSettings {
        self.user_settings_with(|name| std::env::var(name).ok(), vault)
    }

    /// Project the config into generation settings. Each provider secret
    /// comes from the config file, then `env`, then the keyring.
    pub fn user_settings_with<F>(&self, env: F, vault: &SecretVault) -> UserSettings
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut secrets = CREDENTIAL_SOURCES.iter().map(|&(slot, variable)| {
            self.configured_secret(slot)
                .or_else(|| env(variable).and_then(ApiSecret::new))
                .or_else(|| keyring_secret(vault, slot))
        });

        UserSettings {
            default_model: self.default_model.clone(),
            temperature: self.temperature,
            max_tokens: self.max_tokens,
            openai_key: secrets.next().flatten(),
            openrouter_key: secrets.next().flatten(),
            huggingface_key: secrets.next().flatten(),
            openrouter_model: self.openrouter_model.clone(),
        }
    }

    fn configured_secret(&self, slot: &str) -> Option<ApiSecret> {
        let value = match slot {
            "openai" => &self.openai_key,
            "openrouter" => &self.openrouter_key,
            "huggingface" => &self.huggingface_key,
            _ => return None,
        };
        value.clone().and_then(ApiSecret::new)
    }
}

fn keyring_secret(vault: &SecretVault, slot: &str) -> Option<ApiSecret> {
    match vault.load(slot) {
        Ok(secret) => secret,
        Err(err) if err.is_recoverable() => {
            debug!(slot, "Keyring unavailable: {err}");
            None
        }
        Err(err) => {
            warn!(slot, "Keyring lookup failed: {err}");
            None
        }
    }
}

fn parse_positive<T>(key: &str, value: &str) -> Result<T, ConfigError>
where
    T: std::str::FromStr + PartialOrd + Default,
{
    match value.parse::<T>() {
        Ok(parsed) if parsed > T::default() => Ok(parsed),
        _ => Err(ConfigError::invalid(key, value, "expected a positive whole number")),
    }
}
