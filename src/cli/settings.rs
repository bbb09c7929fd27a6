//! `set`, `unset` and `auth`.

use std::error::Error;
use std::io::{self, BufRead, Write};

use crate::core::config::{path_display, Config};
use crate::core::keyring::SecretVault;
use crate::core::providers::ProviderRegistry;
use crate::core::secret::ApiSecret;

pub fn set_value(key: &str, value: Vec<String>) -> Result<(), Box<dyn Error>> {
    let value = value.join(" ");
    let mut config = Config::load()?;
    config.set_value(key, &value)?;
    if key == "default_model" {
        ProviderRegistry::new().resolve(value.trim())?;
    }
    config.save()?;

    let shown = if key.ends_with("_key") {
        ApiSecret::new(value.as_str())
            .map(|secret| secret.to_string())
            .unwrap_or_default()
    } else {
        value.trim().to_string()
    };
    println!("✅ Set {key} to: {shown}");
    Ok(())
}

pub fn unset_value(key: &str) -> Result<(), Box<dyn Error>> {
    let mut config = Config::load()?;
    if config.unset_value(key)? {
        config.save()?;
        println!("✅ Unset {key}");
    } else {
        println!("{key} was not set");
    }
    Ok(())
}

pub fn print_config() -> Result<(), Box<dyn Error>> {
    let config = Config::load()?;
    let path = Config::get_config_path()?;
    println!("Configuration ({}):", path_display(&path));
    print!("{}", render_config(&config));
    Ok(())
}

pub fn render_config(config: &Config) -> String {
    let secret = |value: &Option<String>| {
        value
            .clone()
            .and_then(ApiSecret::new)
            .map(|secret| secret.to_string())
    };
    let rows: [(&str, Option<String>); 8] = [
        ("default_model", config.default_model.clone()),
        ("temperature", config.temperature.map(|value| value.to_string())),
        ("max_tokens", config.max_tokens.map(|value| value.to_string())),
        ("openrouter_model", config.openrouter_model.clone()),
        (
            "request_timeout_secs",
            config.request_timeout_secs.map(|value| value.to_string()),
        ),
        ("openai_key", secret(&config.openai_key)),
        ("openrouter_key", secret(&config.openrouter_key)),
        ("huggingface_key", secret(&config.huggingface_key)),
    ];

    let mut output = String::new();
    for (key, value) in rows {
        let value = value.unwrap_or_else(|| "(unset)".to_string());
        output.push_str(&format!("  {key}: {value}\n"));
    }
    for (provider, url) in &config.base_urls {
        output.push_str(&format!("  base_url.{provider}: {url}\n"));
    }
    output
}

/// Store (or with `remove`, forget) a provider secret in the keyring.
pub fn run_auth(provider: &str, remove: bool) -> Result<(), Box<dyn Error>> {
    let slot = ProviderRegistry::new()
        .credential_slot_for(provider)
        .ok_or_else(|| format!("Unknown provider '{provider}'. Try openai, openrouter or huggingface."))?;
    let vault = SecretVault::system();

    if remove {
        vault.remove(&slot)?;
        println!("✅ Removed {slot} key from the keyring");
        return Ok(());
    }

    print!("Enter API key for {slot}: ");
    io::stdout().flush()?;
    let mut line = String::new();
    io::stdin().lock().read_line(&mut line)?;
    let secret = ApiSecret::new(line).ok_or("No key entered")?;

    vault.store(&slot, &secret)?;
    println!("✅ Stored {slot} key {secret} in the keyring");
    Ok(())
}
