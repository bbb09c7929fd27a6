//! Turns a character and its chat history into the provider-agnostic
//! message list every adapter starts from.

use crate::api::{ChatMessage, PromptRole};
use crate::character::Character;
use crate::core::message::{Message, Sender};

const DEFAULT_PERSONALITY: &str = "Friendly and helpful";

/// Build the ordered prompt: the system entry, the character's dialogue
/// examples as few-shot turns, then the real conversation. System-sender
/// messages (typing placeholders and other UI markers) are left out.
pub fn build_prompt(character: &Character, history: &[Message]) -> Vec<ChatMessage> {
    let mut prompt =
        Vec::with_capacity(1 + character.dialogue_examples.len() * 2 + history.len());

    prompt.push(ChatMessage::new(
        PromptRole::System,
        build_system_prompt(character),
    ));

    for example in &character.dialogue_examples {
        prompt.push(ChatMessage::new(PromptRole::User, example.user.clone()));
        prompt.push(ChatMessage::new(
            PromptRole::Assistant,
            example.character.clone(),
        ));
    }

    prompt.extend(history.iter().filter_map(|message| {
        let role = match message.sender {
            Sender::User => PromptRole::User,
            Sender::Character => PromptRole::Assistant,
            Sender::System => return None,
        };
        Some(ChatMessage::new(role, message.content.clone()))
    }));

    prompt
}

pub fn build_system_prompt(character: &Character) -> String {
    let name = &character.name;
    let personality = if character.personality.trim().is_empty() {
        DEFAULT_PERSONALITY
    } else {
        character.personality.as_str()
    };

    let mut prompt = String::new();
    prompt.push_str(&format!("You are {name}.\n"));
    prompt.push_str(&format!("Name: {name}\n"));
    prompt.push_str(&format!("Description: {}\n", character.best_description()));
    prompt.push_str(&format!("Personality: {personality}\n"));
    prompt.push_str("\nWhen responding, stay in character and follow these guidelines:\n");
    prompt.push_str(&format!("1. Always respond as {name}.\n"));
    prompt.push_str("2. Never break character or mention that you are an AI.\n");
    prompt.push_str(&format!(
        "3. Your responses should reflect {name}'s personality and speech patterns.\n"
    ));
    prompt.push_str("4. Keep responses concise, direct, and conversational.\n");

    if !character.dialogue_examples.is_empty() {
        prompt.push_str("\nHere are some examples of how you should respond:");
    }

    prompt
}
