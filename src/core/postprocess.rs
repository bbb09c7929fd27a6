//! Final clean-up applied to every reply before it is committed.

use crate::character::Character;

pub const EMPTY_REPLY_FALLBACK: &str = "I seem to be having trouble responding right now.";
pub const MAX_REPLY_CHARS: usize = 1000;
const CHARACTER_PLACEHOLDER: &str = "{character}";
const ELLIPSIS: &str = "...";

/// Substitute the `{character}` placeholder and cap the length. Lengths are
/// counted in characters, not bytes.
pub fn process(raw: Option<&str>, character: &Character) -> String {
    let text = match raw {
        Some(text) if !text.is_empty() => text,
        _ => return EMPTY_REPLY_FALLBACK.to_string(),
    };

    let substituted = text.replace(CHARACTER_PLACEHOLDER, &character.name);
    truncate_reply(&substituted, MAX_REPLY_CHARS)
}

/// Cut at the last period at or before `limit`; without one, hard-cut at
/// `limit` and mark the cut with an ellipsis.
pub fn truncate_reply(text: &str, limit: usize) -> String {
    if text.chars().count() <= limit {
        return text.to_string();
    }

    let last_period = text
        .chars()
        .take(limit + 1)
        .enumerate()
        .filter(|(_, ch)| *ch == '.')
        .map(|(index, _)| index)
        .last();

    match last_period {
        Some(index) if index > 0 => text.chars().take(index + 1).collect(),
        _ => {
            let mut truncated: String = text.chars().take(limit).collect();
            truncated.push_str(ELLIPSIS);
            truncated
        }
    }
}
