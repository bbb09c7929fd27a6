//! Model listing
//!
//! Lists every model identifier the built-in provider table knows about.

use crate::api::models::{sort_models, ModelOption};
use crate::core::config::Config;
use crate::core::orchestrator::DEFAULT_MODEL;
use crate::core::providers::ProviderRegistry;
use std::error::Error;

pub fn list_models(config: &Config) -> Result<(), Box<dyn Error>> {
    let mut models = ProviderRegistry::new().list_models();
    sort_models(&mut models);

    let default_model = config.default_model.as_deref().unwrap_or(DEFAULT_MODEL);
    print!("{}", render_model_list(&models, default_model));
    Ok(())
}

pub fn render_model_list(models: &[ModelOption], default_model: &str) -> String {
    let mut output = String::from("🤖 Available models\n");
    output.push_str("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━\n");

    let mut current_provider: Option<&str> = None;
    for model in models {
        if current_provider != Some(model.provider_display_name.as_str()) {
            output.push_str(&format!("\n{}\n", model.provider_display_name));
            current_provider = Some(model.provider_display_name.as_str());
        }
        let marker = if model.id == default_model { " (default)" } else { "" };
        output.push_str(&format!("  • {}{}\n", model.id, marker));
    }

    output.push_str("\n💡 Any openai/<model> or openrouter/<vendor>/<model> also works.\n");
    output
}
