use chrono::Utc;

use super::{CharacterService, ChatService, Lifecycle};
use crate::ai::{AiClient, HistoryEntry};
use crate::auth::{Actor, validate_ownership};
use crate::error::{Error, Result};
use crate::store::{MessageRepository, Repository, Store};
use crate::types::{Message, MessageRole};

/// A new user turn plus the context the client already has on screen.
#[derive(Debug, Clone, Default)]
pub struct IncomingMessage {
    pub character_id: Option<String>,
    pub chat_id: Option<String>,
    pub user_message: String,
    pub history: Vec<HistoryEntry>,
}

pub struct MessageService<'a> {
    store: &'a dyn Store,
    ai: &'a AiClient,
}

impl<'a> MessageService<'a> {
    pub fn new(store: &'a dyn Store, ai: &'a AiClient) -> Self {
        Self { store, ai }
    }

    fn lifecycle(&self) -> Lifecycle<'a, Message, dyn MessageRepository + 'a> {
        Lifecycle::new(self.store.messages(), "Message")
    }

    /// Persists the user turn, asks the provider for a reply and persists that
    /// too. Provider failures still produce a stored assistant turn.
    pub async fn handle_message(&self, actor: &Actor, request: IncomingMessage) -> Result<Message> {
        let character_id = request
            .character_id
            .as_deref()
            .filter(|id| !id.trim().is_empty())
            .ok_or_else(|| Error::BadRequest("characterId is required".to_string()))?;
        let character = CharacterService::new(self.store).find_character(character_id)?;

        let chat_id = request
            .chat_id
            .as_deref()
            .filter(|id| !id.trim().is_empty())
            .ok_or_else(|| Error::BadRequest("Chat ID is required".to_string()))?;
        let chats = ChatService::new(self.store);
        let chat = chats.find_chat(chat_id)?;
        validate_ownership(Some(actor), &chat)?;

        if request.user_message.trim().is_empty() {
            return Err(Error::BadRequest("userMessage is required".to_string()));
        }

        let mut user_turn = Message::new(MessageRole::User, request.user_message.clone());
        user_turn.meta.owner_id = Some(actor.user_id.clone());
        chats.add_message_to_chat(chat_id, user_turn)?;

        let mut reply = self
            .ai
            .get_ai_response(&character, &request.history, &request.user_message)
            .await;
        reply.meta.owner_id = Some(actor.user_id.clone());

        chats.add_message_to_chat(chat_id, reply)
    }

    /// Edits a message in place, keeping earlier contents in `versions`.
    /// Access follows the parent chat's owner.
    pub fn update_message(&self, actor: &Actor, id: &str, content: &str) -> Result<Message> {
        let mut message = self.lifecycle().find_by_id_or_throw(id)?;

        let chat = self
            .store
            .chats()
            .find_by_id(&message.chat_id)?
            .ok_or_else(Error::access_denied)?;
        validate_ownership(Some(actor), &chat)?;

        message.revise(content);
        message.meta.updated_at = Utc::now();
        self.store.messages().update(&message)?;

        tracing::debug!(
            "Message {} now at version {}",
            message.meta.id,
            message.current_version_index
        );
        Ok(message)
    }
}
