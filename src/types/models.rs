use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{MessageRole, ResourceStatus, Role};

/// Identity, ownership, status and timestamps carried by every persisted entity.
///
/// An empty `id` marks an entity that has not been persisted yet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceMeta {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub owner_id: Option<String>,
    #[serde(default, rename = "resourceStatus")]
    pub status: ResourceStatus,
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
    #[serde(default = "Utc::now")]
    pub updated_at: DateTime<Utc>,
}

impl Default for ResourceMeta {
    fn default() -> Self {
        let now = Utc::now();
        Self {
            id: String::new(),
            owner_id: None,
            status: ResourceStatus::Active,
            created_at: now,
            updated_at: now,
        }
    }
}

impl ResourceMeta {
    #[must_use]
    pub fn is_new(&self) -> bool {
        self.id.is_empty()
    }

    #[must_use]
    pub fn is_deleted(&self) -> bool {
        self.status == ResourceStatus::Deleted
    }

    #[must_use]
    pub fn is_owned_by(&self, user_id: &str) -> bool {
        self.owner_id.as_deref() == Some(user_id)
    }
}

/// An entity managed by the generic lifecycle in [`crate::service::lifecycle`].
pub trait Resource: Clone + Send + Sync {
    fn meta(&self) -> &ResourceMeta;
    fn meta_mut(&mut self) -> &mut ResourceMeta;

    fn id(&self) -> &str {
        &self.meta().id
    }

    fn owner_id(&self) -> Option<&str> {
        self.meta().owner_id.as_deref()
    }
}

macro_rules! impl_resource {
    ($($ty:ty),+ $(,)?) => {
        $(
            impl Resource for $ty {
                fn meta(&self) -> &ResourceMeta {
                    &self.meta
                }

                fn meta_mut(&mut self) -> &mut ResourceMeta {
                    &mut self.meta
                }
            }
        )+
    };
}

impl_resource!(User, Character, Chat, Message);

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    #[serde(flatten)]
    pub meta: ResourceMeta,
    pub username: String,
    pub email: String,
    #[serde(skip)]
    pub password_hash: String,
    #[serde(default)]
    pub role: Role,
}

impl User {
    #[must_use]
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }
}

/// A persona definition that parameterizes AI replies.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Character {
    #[serde(flatten)]
    pub meta: ResourceMeta,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system_prompt: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub short_greeting: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub profile_image_small: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub profile_image_medium: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub profile_image_large: Option<String>,
    #[serde(default)]
    pub custom_fields: BTreeMap<String, String>,
}

/// A conversation between one user and one character.
///
/// `messages` is only populated when the caller asks the store for it.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Chat {
    #[serde(flatten)]
    pub meta: ResourceMeta,
    pub character_id: String,
    #[serde(default, rename = "messageList")]
    pub messages: Vec<Message>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    #[serde(flatten)]
    pub meta: ResourceMeta,
    #[serde(default)]
    pub chat_id: String,
    #[serde(default)]
    pub role: MessageRole,
    pub content: String,
    #[serde(default = "Utc::now")]
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub versions: Vec<String>,
    #[serde(default)]
    pub current_version_index: usize,
}

impl Message {
    #[must_use]
    pub fn new(role: MessageRole, content: impl Into<String>) -> Self {
        Self {
            meta: ResourceMeta::default(),
            chat_id: String::new(),
            role,
            content: content.into(),
            timestamp: Utc::now(),
            versions: Vec::new(),
            current_version_index: 0,
        }
    }

    #[must_use]
    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(MessageRole::Assistant, content)
    }

    /// Replaces the content, keeping every prior revision in `versions`.
    pub fn revise(&mut self, content: impl Into<String>) {
        if self.versions.is_empty() {
            self.versions.push(self.content.clone());
        }
        let content = content.into();
        self.versions.push(content.clone());
        self.current_version_index = self.versions.len() - 1;
        self.content = content;
    }
}

/// Number of rows touched by a character deletion.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CascadeCounts {
    pub messages: usize,
    pub chats: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_meta_is_active_and_unsaved() {
        let meta = ResourceMeta::default();
        assert!(meta.is_new());
        assert_eq!(meta.status, ResourceStatus::Active);
        assert!(meta.owner_id.is_none());
    }

    #[test]
    fn test_revise_keeps_history() {
        let mut msg = Message::new(MessageRole::User, "first");
        msg.revise("second");
        msg.revise("third");

        assert_eq!(msg.content, "third");
        assert_eq!(msg.versions, vec!["first", "second", "third"]);
        assert_eq!(msg.current_version_index, 2);
    }

    #[test]
    fn test_user_password_hash_not_serialized() {
        let user = User {
            username: "alice".to_string(),
            email: "alice@example.com".to_string(),
            password_hash: "$argon2id$secret".to_string(),
            ..Default::default()
        };
        let json = serde_json::to_value(&user).unwrap();
        assert!(json.get("passwordHash").is_none());
        assert_eq!(json["username"], "alice");
        assert_eq!(json["role"], "USER");
    }

    #[test]
    fn test_chat_messages_serialize_as_message_list() {
        let chat = Chat {
            character_id: "c-1".to_string(),
            messages: vec![Message::assistant("hi")],
            ..Default::default()
        };
        let json = serde_json::to_value(&chat).unwrap();
        assert_eq!(json["characterId"], "c-1");
        assert_eq!(json["messageList"][0]["content"], "hi");
        assert_eq!(json["messageList"][0]["role"], "ASSISTANT");
    }
}
