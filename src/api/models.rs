use serde::Serialize;

/// A selectable model as shown in pickers and `charchat models`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelOption {
    pub id: String,
    pub display_name: String,
    pub provider_display_name: String,
}

impl ModelOption {
    pub fn new(provider: &str, model: &str) -> Self {
        Self {
            id: format!("{provider}/{model}"),
            display_name: model.to_string(),
            provider_display_name: capitalize(provider),
        }
    }
}

/// Upper-case the first letter, leaving the rest untouched (`hf` -> `Hf`).
pub fn capitalize(value: &str) -> String {
    let mut chars = value.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

pub fn sort_models(models: &mut [ModelOption]) {
    models.sort_by(|a, b| {
        a.provider_display_name
            .cmp(&b.provider_display_name)
            .then_with(|| a.display_name.to_lowercase().cmp(&b.display_name.to_lowercase()))
    });
}
