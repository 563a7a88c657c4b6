use chrono::Utc;
use uuid::Uuid;

use super::Lifecycle;
use crate::auth::{Actor, validate_ownership};
use crate::error::{Error, Result};
use crate::store::{CharacterRepository, ChatRepository, MessageRepository, Store};
use crate::types::{Character, Chat, Message, ResourceMeta};

pub struct ChatService<'a> {
    store: &'a dyn Store,
}

impl<'a> ChatService<'a> {
    pub fn new(store: &'a dyn Store) -> Self {
        Self { store }
    }

    fn lifecycle(&self) -> Lifecycle<'a, Chat, dyn ChatRepository + 'a> {
        Lifecycle::new(self.store.chats(), "Chat")
    }

    /// Starts a chat with an existing character. Seed messages become part of
    /// the new chat and belong to `actor`.
    pub fn create_chat(
        &self,
        actor: &Actor,
        character_id: &str,
        messages: Vec<Message>,
    ) -> Result<Chat> {
        let character_id = character_id.trim();
        if character_id.is_empty() {
            return Err(Error::BadRequest("characterId is required".to_string()));
        }
        let characters: Lifecycle<'a, Character, dyn CharacterRepository + 'a> =
            Lifecycle::new(self.store.characters(), "Character");
        characters
            .find_by_id(character_id)?
            .filter(|c| !c.meta.is_deleted())
            .ok_or_else(|| Error::not_found("Character"))?;

        let chat_id = Uuid::new_v4().to_string();
        let messages = messages
            .into_iter()
            .map(|message| adopt_message(message, &chat_id, actor))
            .collect();

        let chat = Chat {
            meta: ResourceMeta {
                id: chat_id,
                owner_id: Some(actor.user_id.clone()),
                ..Default::default()
            },
            character_id: character_id.to_string(),
            messages,
        };

        let chat = self.lifecycle().save(Some(actor), chat)?;
        tracing::info!(
            "User {} started chat {} with character {}",
            actor.user_id,
            chat.meta.id,
            chat.character_id
        );
        Ok(chat)
    }

    /// The caller's most recently created chat with the character, messages included.
    pub fn find_latest_chat(&self, actor: &Actor, character_id: &str) -> Result<Option<Chat>> {
        let latest = self
            .store
            .chats()
            .find_latest_by_character_and_owner(character_id, &actor.user_id)?;

        match latest {
            Some(chat) => self.store.chats().find_with_messages(&chat.meta.id),
            None => Ok(None),
        }
    }

    /// The caller's chats with the character, most recently active first.
    pub fn find_all_chats(&self, actor: &Actor, character_id: &str) -> Result<Vec<Chat>> {
        let mut chats = self
            .store
            .chats()
            .find_all_by_character_and_owner(character_id, &actor.user_id)?;

        for chat in &mut chats {
            chat.messages = self.store.messages().find_by_chat(&chat.meta.id)?;
        }
        Ok(chats)
    }

    /// Loads a chat without messages or an ownership check.
    pub fn find_chat(&self, id: &str) -> Result<Chat> {
        self.lifecycle().find_by_id_or_throw(id)
    }

    pub fn get_chat(&self, actor: &Actor, id: &str) -> Result<Chat> {
        let chat = self.lifecycle().find_by_id_or_throw(id)?;
        validate_ownership(Some(actor), &chat)?;

        self.store
            .chats()
            .find_with_messages(id)?
            .ok_or_else(|| Error::not_found("Chat"))
    }

    /// Appends to the chat without checking who owns it; callers validate
    /// access at the request boundary.
    pub fn add_message_to_chat(&self, chat_id: &str, mut message: Message) -> Result<Message> {
        self.lifecycle().find_by_id_or_throw(chat_id)?;

        let now = Utc::now();
        if message.meta.is_new() {
            message.meta.id = Uuid::new_v4().to_string();
            message.meta.created_at = now;
        }
        message.meta.updated_at = now;
        message.chat_id = chat_id.to_string();

        self.store.chats().append_message(&message)?;
        Ok(message)
    }
}

fn adopt_message(mut message: Message, chat_id: &str, actor: &Actor) -> Message {
    let now = Utc::now();
    message.meta = ResourceMeta {
        id: Uuid::new_v4().to_string(),
        owner_id: Some(actor.user_id.clone()),
        created_at: now,
        updated_at: now,
        ..Default::default()
    };
    message.chat_id = chat_id.to_string();
    message
}
