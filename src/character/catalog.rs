//! Built-in character catalog
//!
//! The system characters are embedded from `builtins/characters.toml` at
//! build time and are never written back; user characters live in the
//! local store.

use serde::Deserialize;

use crate::character::card::Character;

#[derive(Debug, Deserialize)]
struct CatalogFile {
    characters: Vec<Character>,
}

/// Load the system characters from the embedded catalog
pub fn load_builtin_characters() -> Vec<Character> {
    const CATALOG: &str = include_str!("../builtins/characters.toml");

    let catalog: CatalogFile =
        toml::from_str(CATALOG).expect("Failed to parse builtins/characters.toml");

    catalog.characters
}

/// Find a system character by id
pub fn find_builtin_character(id: &str) -> Option<Character> {
    load_builtin_characters()
        .into_iter()
        .find(|character| character.id == id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::character::card::SYSTEM_ID_PREFIX;

    #[test]
    fn catalog_parses_and_every_entry_is_system_owned() {
        let characters = load_builtin_characters();
        assert_eq!(characters.len(), 5);

        for character in &characters {
            assert!(character.id.starts_with(SYSTEM_ID_PREFIX));
            assert!(character.is_system());
            assert!(!character.name.is_empty());
            assert!(!character.greeting.is_empty());
            assert_eq!(character.dialogue_examples.len(), 2);
            assert!(character.model_override().is_none());
        }
    }

    #[test]
    fn find_by_id() {
        let luna = find_builtin_character("system-luna").expect("luna ships built in");
        assert_eq!(luna.name, "Luna");
        assert_eq!(luna.tags.first().map(String::as_str), Some("spiritual"));

        assert!(find_builtin_character("system-nobody").is_none());
    }
}
