use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ai::HistoryEntry;
use crate::error::{Error, Result};
use crate::types::{Character, Message, MessageRole, Role, User};

// Users

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub username: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterResponse {
    pub user_id: String,
    pub username: String,
    pub email: String,
    pub message: &'static str,
}

impl From<User> for RegisterResponse {
    fn from(user: User) -> Self {
        Self {
            user_id: user.meta.id,
            username: user.username,
            email: user.email,
            message: "User registered successfully",
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub username: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginResponse {
    pub token: String,
    pub user_id: String,
    pub username: String,
    pub email: String,
    pub role: Role,
}

#[derive(Debug, Default, Deserialize)]
pub struct LogoutRequest {
    pub token: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct LogoutResponse {
    pub status: &'static str,
}

// Characters

/// Editable character fields. Identity, ownership and image URLs are
/// server-managed and ignored if sent.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CharacterRequest {
    pub name: Option<String>,
    pub description: Option<String>,
    pub system_prompt: Option<String>,
    pub short_greeting: Option<String>,
    #[serde(default)]
    pub custom_fields: BTreeMap<String, String>,
}

impl CharacterRequest {
    pub fn into_character(self) -> Result<Character> {
        let name = self
            .name
            .map(|n| n.trim().to_string())
            .filter(|n| !n.is_empty())
            .ok_or_else(|| Error::BadRequest("name is required".to_string()))?;

        Ok(Character {
            name,
            description: self.description,
            system_prompt: self.system_prompt,
            short_greeting: self.short_greeting,
            custom_fields: self.custom_fields,
            ..Default::default()
        })
    }
}

// Chats

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CharacterQuery {
    pub character_id: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateChatRequest {
    pub character_id: Option<String>,
    #[serde(default)]
    pub message_list: Vec<SeedMessage>,
}

/// A message supplied when a chat is created.
#[derive(Debug, Deserialize)]
pub struct SeedMessage {
    #[serde(default)]
    pub role: MessageRole,
    #[serde(default)]
    pub content: String,
    pub timestamp: Option<DateTime<Utc>>,
}

impl From<SeedMessage> for Message {
    fn from(seed: SeedMessage) -> Self {
        let mut message = Message::new(seed.role, seed.content);
        if let Some(timestamp) = seed.timestamp {
            message.timestamp = timestamp;
        }
        message
    }
}

// Messages

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageRequest {
    pub character_id: Option<String>,
    pub chat_id: Option<String>,
    #[serde(default)]
    pub user_message: String,
    #[serde(default)]
    pub history: Vec<HistoryEntry>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateMessageRequest {
    pub content: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_character_request_requires_name() {
        let request: CharacterRequest =
            serde_json::from_str(r#"{"name":"  ","systemPrompt":"x"}"#).unwrap();
        assert!(matches!(request.into_character(), Err(Error::BadRequest(_))));
    }

    #[test]
    fn test_character_request_ignores_server_fields() {
        let request: CharacterRequest = serde_json::from_str(
            r#"{"id":"forged","ownerId":"mallory","name":"Ada","customFields":{"mood":"calm"}}"#,
        )
        .unwrap();
        let character = request.into_character().unwrap();

        assert!(character.meta.is_new());
        assert!(character.meta.owner_id.is_none());
        assert_eq!(character.name, "Ada");
        assert_eq!(character.custom_fields["mood"], "calm");
    }

    #[test]
    fn test_chat_request_seed_messages() {
        let request: CreateChatRequest = serde_json::from_str(
            r#"{"characterId":"c-1","messageList":[{"role":"ASSISTANT","content":"Hello"}]}"#,
        )
        .unwrap();
        assert_eq!(request.character_id.as_deref(), Some("c-1"));

        let message = Message::from(request.message_list.into_iter().next().unwrap());
        assert_eq!(message.role, MessageRole::Assistant);
        assert_eq!(message.content, "Hello");
    }

    #[test]
    fn test_message_request_field_names() {
        let request: MessageRequest = serde_json::from_str(
            r#"{"characterId":"c","chatId":"h","userMessage":"hi","history":[{"role":"user","content":"a"}]}"#,
        )
        .unwrap();
        assert_eq!(request.chat_id.as_deref(), Some("h"));
        assert_eq!(request.user_message, "hi");
        assert_eq!(request.history.len(), 1);
    }
}
