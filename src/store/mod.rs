mod schema;
mod sqlite;

pub use sqlite::SqliteStore;

use crate::error::Result;
use crate::types::*;

/// Plain CRUD over one entity type. Related collections are never loaded implicitly.
pub trait Repository<T: Resource>: Send + Sync {
    fn find_all(&self) -> Result<Vec<T>>;
    fn find_by_id(&self, id: &str) -> Result<Option<T>>;
    fn insert(&self, entity: &T) -> Result<()>;
    /// Overwrites every column of the row with `entity.id()`.
    fn update(&self, entity: &T) -> Result<()>;
    fn delete(&self, id: &str) -> Result<bool>;
}

pub trait UserRepository: Repository<User> {
    fn find_by_username(&self, username: &str) -> Result<Option<User>>;
    fn find_by_email(&self, email: &str) -> Result<Option<User>>;
    fn exists_by_username(&self, username: &str) -> Result<bool>;
    fn exists_by_email(&self, email: &str) -> Result<bool>;
}

pub trait CharacterRepository: Repository<Character> {
    fn find_by_status(&self, status: ResourceStatus) -> Result<Vec<Character>>;
    fn find_by_status_and_owner(
        &self,
        status: ResourceStatus,
        owner_id: &str,
    ) -> Result<Vec<Character>>;
    fn find_by_name(&self, name: &str) -> Result<Option<Character>>;
}

pub trait ChatRepository: Repository<Chat> {
    /// Loads the chat together with its non-deleted messages, oldest first.
    fn find_with_messages(&self, id: &str) -> Result<Option<Chat>>;
    /// Most recently created non-deleted chat; ties broken by `updated_at`.
    fn find_latest_by_character_and_owner(
        &self,
        character_id: &str,
        owner_id: &str,
    ) -> Result<Option<Chat>>;
    /// Non-deleted chats ordered by `updated_at` desc, then `created_at` desc.
    fn find_all_by_character_and_owner(
        &self,
        character_id: &str,
        owner_id: &str,
    ) -> Result<Vec<Chat>>;
    /// Inserts `message` into its chat and touches the chat's `updated_at`.
    fn append_message(&self, message: &Message) -> Result<()>;
}

pub trait MessageRepository: Repository<Message> {
    fn find_by_chat(&self, chat_id: &str) -> Result<Vec<Message>>;
}

/// Store defines the database interface.
pub trait Store: Send + Sync {
    fn initialize(&self) -> Result<()>;

    fn users(&self) -> &dyn UserRepository;
    fn characters(&self) -> &dyn CharacterRepository;
    fn chats(&self) -> &dyn ChatRepository;
    fn messages(&self) -> &dyn MessageRepository;

    /// Soft-deletes the character, every chat referencing it and all of
    /// those chats' messages (messages first) as one atomic unit.
    fn soft_delete_character_cascade(&self, character_id: &str) -> Result<CascadeCounts>;
}
