use super::data::Config;
use super::io::ConfigError;
use crate::core::keyring::SecretVault;
use crate::core::orchestrator::DEFAULT_REQUEST_TIMEOUT;
use crate::core::providers::ProviderRegistry;
use std::collections::HashMap;
use std::time::Duration;
use tempfile::TempDir;

fn no_env(_: &str) -> Option<String> {
    None
}

#[test]
fn test_load_nonexistent_config() {
    let temp_dir = TempDir::new().expect("Failed to create temp directory");
    let config_path = temp_dir.path().join("nonexistent_config.toml");

    let config = Config::load_from_path(&config_path).expect("Failed to load config");

    assert_eq!(config, Config::default());
}

#[test]
fn test_config_persistence_lifecycle() {
    let temp_dir = TempDir::new().expect("Failed to create temp directory");
    let config_path = temp_dir.path().join("nested").join("config.toml");

    let mut config = Config::default();
    config.set_value("default_model", "openai/gpt-4").unwrap();
    config.set_value("temperature", "0.9").unwrap();
    config.set_value("max_tokens", "256").unwrap();
    config
        .set_value("base_url.openai", "http://localhost:8080/v1/")
        .unwrap();
    config.save_to_path(&config_path).expect("save failed");

    let loaded = Config::load_from_path(&config_path).expect("load failed");
    assert_eq!(loaded, config);
    assert_eq!(
        loaded.base_urls.get("openai").map(String::as_str),
        Some("http://localhost:8080/v1")
    );

    let mut edited = loaded;
    assert!(edited.unset_value("temperature").unwrap());
    assert!(!edited.unset_value("temperature").unwrap());
    assert!(edited.unset_value("base_url.openai").unwrap());
    edited.save_to_path(&config_path).expect("save failed");

    let reloaded = Config::load_from_path(&config_path).expect("reload failed");
    assert_eq!(reloaded.temperature, None);
    assert!(reloaded.base_urls.is_empty());
    assert_eq!(reloaded.default_model.as_deref(), Some("openai/gpt-4"));
}

#[test]
fn invalid_toml_reports_the_path() {
    let temp_dir = TempDir::new().expect("Failed to create temp directory");
    let config_path = temp_dir.path().join("config.toml");
    std::fs::write(&config_path, "default_model = [").unwrap();

    let err = Config::load_from_path(&config_path).unwrap_err();
    assert!(matches!(err, ConfigError::Parse { .. }));
    assert!(err.to_string().contains("Failed to parse config"));
}

#[test]
fn set_value_validates_input() {
    let mut config = Config::default();

    assert!(matches!(
        config.set_value("colour", "blue"),
        Err(ConfigError::UnknownKey(_))
    ));
    assert!(matches!(
        config.set_value("temperature", "3.5"),
        Err(ConfigError::InvalidValue { .. })
    ));
    assert!(matches!(
        config.set_value("max_tokens", "0"),
        Err(ConfigError::InvalidValue { .. })
    ));
    assert!(matches!(
        config.set_value("default_model", "gpt-4"),
        Err(ConfigError::InvalidValue { .. })
    ));
    assert!(matches!(
        config.set_value("base_url.openai", "ftp://example.com"),
        Err(ConfigError::InvalidValue { .. })
    ));
    assert!(matches!(
        config.set_value("openai_key", "   "),
        Err(ConfigError::InvalidValue { .. })
    ));
    assert_eq!(config, Config::default());
}

#[test]
fn request_timeout_defaults_to_thirty_seconds() {
    let mut config = Config::default();
    assert_eq!(config.request_timeout(), DEFAULT_REQUEST_TIMEOUT);

    config.request_timeout_secs = Some(0);
    assert_eq!(config.request_timeout(), DEFAULT_REQUEST_TIMEOUT);

    config.set_value("request_timeout_secs", "5").unwrap();
    assert_eq!(config.request_timeout(), Duration::from_secs(5));
}

#[test]
fn config_secrets_take_precedence_over_environment() {
    let config = Config {
        openai_key: Some("sk-from-config".to_string()),
        huggingface_key: Some("   ".to_string()),
        ..Config::default()
    };
    let env: HashMap<&str, &str> = HashMap::from([
        ("OPENAI_API_KEY", "sk-from-env"),
        ("OPENROUTER_API_KEY", "or-from-env"),
        ("HUGGINGFACE_API_KEY", "hf-from-env"),
    ]);

    let settings = config.user_settings_with(
        |name| env.get(name).map(|value| value.to_string()),
        &SecretVault::disabled(),
    );

    assert_eq!(settings.openai_key.unwrap().expose(), "sk-from-config");
    assert_eq!(settings.openrouter_key.unwrap().expose(), "or-from-env");
    // A blank config value does not shadow the environment.
    assert_eq!(settings.huggingface_key.unwrap().expose(), "hf-from-env");
}

#[test]
fn settings_carry_generation_defaults() {
    let config = Config {
        default_model: Some("openrouter/any".to_string()),
        temperature: Some(0.4),
        max_tokens: Some(99),
        openrouter_model: Some("anthropic/claude-3-haiku".to_string()),
        ..Config::default()
    };

    let settings = config.user_settings_with(no_env, &SecretVault::disabled());
    assert_eq!(settings.default_model.as_deref(), Some("openrouter/any"));
    assert_eq!(settings.temperature, Some(0.4));
    assert_eq!(settings.max_tokens, Some(99));
    assert_eq!(
        settings.openrouter_model.as_deref(),
        Some("anthropic/claude-3-haiku")
    );
    assert!(settings.credentials().is_empty());
}

#[test]
fn base_urls_rewrite_registry_endpoints() {
    let mut config = Config::default();
    config
        .set_value("base_url.openai", "http://127.0.0.1:9000/v1")
        .unwrap();
    config
        .set_value("base_url.nonexistent", "http://127.0.0.1:9001")
        .unwrap();

    let mut registry = ProviderRegistry::new();
    config.apply_base_urls(&mut registry);

    assert_eq!(
        registry.resolve_endpoint("openai/gpt-4").unwrap(),
        "http://127.0.0.1:9000/v1/chat/completions"
    );
}
