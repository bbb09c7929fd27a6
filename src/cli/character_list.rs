use crate::character::Character;
use crate::core::store::LocalStore;
use std::error::Error;
use std::path::Path;

pub async fn list_characters(store: &LocalStore) -> Result<(), Box<dyn Error>> {
    let characters = store.list_characters().await?;
    println!("Available characters:\n");
    for character in &characters {
        println!("{}", render_character_line(character));
    }
    println!("\n💡 Start a chat with:");
    println!("   charchat new <character-id>");
    Ok(())
}

pub fn render_character_line(character: &Character) -> String {
    let origin = if character.is_system() { "built-in" } else { "yours" };
    let mut line = format!("  • {} ({}, {})", character.name, character.id, origin);
    if !character.description.trim().is_empty() {
        line.push_str(&format!(": {}", character.description.trim()));
    }
    line
}

/// Parse a character document. Catalog ids are dropped so the import
/// becomes a user character.
pub fn parse_character(contents: &str) -> Result<Character, Box<dyn Error>> {
    let mut character: Character = serde_json::from_str(contents)?;
    if character.name.trim().is_empty() {
        return Err("Character has no name".into());
    }
    if character.is_system() {
        character.id.clear();
    }
    Ok(character)
}

pub async fn import_character(store: &LocalStore, path: &Path) -> Result<(), Box<dyn Error>> {
    let contents = std::fs::read_to_string(path)
        .map_err(|err| format!("Failed to read {}: {err}", path.display()))?;
    let character = parse_character(&contents)?;
    let saved = store.save_character(character).await?;
    println!("✅ Imported {} as {}", saved.name, saved.id);
    Ok(())
}
