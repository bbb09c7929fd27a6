//! Local replies used when the remote provider cannot answer.
//!
//! Nothing here can fail: every branch produces some text, however generic.

use crate::character::Character;
use crate::core::entropy::Entropy;

const DEFAULT_TOPIC: &str = "this topic";
const DEFAULT_TRAIT: &str = "curious";

/// Reply from the character's own dialogue examples when one matches the
/// user's message, otherwise a templated line about the character.
pub fn local_reply(character: &Character, user_message: &str, entropy: &dyn Entropy) -> String {
    match matching_example(character, user_message) {
        Some(reply) => reply.to_string(),
        None => templated_reply(character, entropy),
    }
}

/// First dialogue example whose `user` line appears, case-insensitively,
/// inside the user's message.
pub fn matching_example<'a>(character: &'a Character, user_message: &str) -> Option<&'a str> {
    let haystack = user_message.to_lowercase();
    character
        .dialogue_examples
        .iter()
        .find(|example| {
            let needle = example.user.trim().to_lowercase();
            !needle.is_empty() && haystack.contains(&needle)
        })
        .map(|example| example.character.as_str())
}

pub fn templated_reply(character: &Character, entropy: &dyn Entropy) -> String {
    let templates = generic_replies(character);
    let index = entropy.pick(templates.len());
    templates.into_iter().nth(index).unwrap_or_default()
}

fn generic_replies(character: &Character) -> Vec<String> {
    let name = &character.name;
    let first_tag = character
        .tags
        .first()
        .map(String::as_str)
        .filter(|tag| !tag.trim().is_empty())
        .unwrap_or(DEFAULT_TOPIC);
    let two_tags = match character.tags.as_slice() {
        [] => DEFAULT_TOPIC.to_string(),
        tags => tags
            .iter()
            .take(2)
            .map(String::as_str)
            .collect::<Vec<_>>()
            .join(" and "),
    };
    let first_sentence = leading_clause(&character.personality, '.');
    let first_trait = leading_clause(&character.personality, ',');

    vec![
        format!(
            "That's an interesting point! As {name}, I'd say that relates to my perspective on {first_tag}."
        ),
        format!("I understand what you're saying. From my experience, I've found that {first_sentence}."),
        format!(
            "That's a great question! Let me think... {}",
            character.greeting_or_default()
        ),
        format!("Interesting! I'd approach this by considering {two_tags}."),
        format!(
            "Thanks for sharing that with me. As someone who is {first_trait}, I appreciate your perspective."
        ),
    ]
}

fn leading_clause(text: &str, separator: char) -> String {
    let clause = text.split(separator).next().unwrap_or_default().trim();
    if clause.is_empty() {
        DEFAULT_TRAIT.to_string()
    } else {
        clause.to_string()
    }
}
