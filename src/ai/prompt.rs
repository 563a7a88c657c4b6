use std::fmt::Write as _;

use super::dto::{HistoryEntry, ProviderMessage};
use crate::types::{Character, MessageRole};

/// The character's system prompt followed by a "Character Details" block
/// listing custom fields, one `- key: value` line each.
pub fn build_system_prompt(character: &Character) -> String {
    let mut prompt = String::new();

    if let Some(system_prompt) = character
        .system_prompt
        .as_deref()
        .filter(|p| !p.trim().is_empty())
    {
        prompt.push_str(system_prompt);
    }

    if !character.custom_fields.is_empty() {
        if !prompt.is_empty() {
            prompt.push_str("\n\n");
        }
        prompt.push_str("Character Details:\n");
        for (key, value) in &character.custom_fields {
            let _ = writeln!(prompt, "- {key}: {value}");
        }
    }

    prompt
}

/// System turn, then the history in order, then the new user turn.
pub fn build_messages(
    character: &Character,
    history: &[HistoryEntry],
    user_message: &str,
) -> Vec<ProviderMessage> {
    let mut messages = Vec::with_capacity(history.len() + 2);
    messages.push(ProviderMessage::new(
        MessageRole::System,
        build_system_prompt(character),
    ));

    for entry in history {
        messages.push(ProviderMessage::new(
            entry.role.unwrap_or(MessageRole::User),
            entry.content.clone(),
        ));
    }

    messages.push(ProviderMessage::new(MessageRole::User, user_message));
    messages
}
