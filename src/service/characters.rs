use chrono::Utc;

use super::Lifecycle;
use crate::auth::{Actor, validate_ownership};
use crate::error::Result;
use crate::media::ProfileImages;
use crate::store::{CharacterRepository, Repository, Store};
use crate::types::{CascadeCounts, Character, ResourceMeta, ResourceStatus};

pub struct CharacterService<'a> {
    store: &'a dyn Store,
}

impl<'a> CharacterService<'a> {
    pub fn new(store: &'a dyn Store) -> Self {
        Self { store }
    }

    fn lifecycle(&self) -> Lifecycle<'a, Character, dyn CharacterRepository + 'a> {
        Lifecycle::new(self.store.characters(), "Character")
    }

    /// Admins see every active character; everyone else only their own.
    pub fn get_all_characters(&self, actor: &Actor) -> Result<Vec<Character>> {
        let repo = self.store.characters();
        if actor.is_admin() {
            repo.find_by_status(ResourceStatus::Active)
        } else {
            repo.find_by_status_and_owner(ResourceStatus::Active, &actor.user_id)
        }
    }

    pub fn get_character(&self, actor: &Actor, id: &str) -> Result<Character> {
        let character = self.lifecycle().find_by_id_or_throw(id)?;
        validate_ownership(Some(actor), &character)?;
        Ok(character)
    }

    /// Loads a character without an ownership check.
    pub fn find_character(&self, id: &str) -> Result<Character> {
        self.lifecycle().find_by_id_or_throw(id)
    }

    /// Creates a character owned by `actor`, whatever identity the payload carries.
    pub fn create_character(&self, actor: &Actor, mut character: Character) -> Result<Character> {
        character.meta = ResourceMeta::default();
        character.meta.owner_id = Some(actor.user_id.clone());

        let character = self.lifecycle().save(Some(actor), character)?;
        tracing::info!(
            "User {} created character {} '{}'",
            actor.user_id,
            character.meta.id,
            character.name
        );
        Ok(character)
    }

    /// Profile image URLs are managed by the upload endpoints and survive a
    /// regular update.
    pub fn update_character(
        &self,
        actor: &Actor,
        id: &str,
        mut character: Character,
    ) -> Result<Character> {
        let existing = self.lifecycle().find_by_id_or_throw(id)?;
        character.profile_image_small = existing.profile_image_small;
        character.profile_image_medium = existing.profile_image_medium;
        character.profile_image_large = existing.profile_image_large;

        self.lifecycle().update(Some(actor), id, character)
    }

    /// Soft-deletes the character with all of its chats and their messages.
    /// Returns `None` when no character has that id.
    pub fn delete_character(&self, actor: &Actor, id: &str) -> Result<Option<CascadeCounts>> {
        let Some(character) = self.lifecycle().find_by_id(id)? else {
            return Ok(None);
        };
        validate_ownership(Some(actor), &character)?;

        let counts = self.store.soft_delete_character_cascade(id)?;
        tracing::info!(
            "Deleted character {} with {} chats and {} messages",
            id,
            counts.chats,
            counts.messages
        );
        Ok(Some(counts))
    }

    pub fn set_profile_images(
        &self,
        actor: &Actor,
        id: &str,
        images: Option<ProfileImages>,
    ) -> Result<Character> {
        let mut character = self.get_character(actor, id)?;

        match images {
            Some(images) => {
                character.profile_image_small = Some(images.small);
                character.profile_image_medium = Some(images.medium);
                character.profile_image_large = Some(images.large);
            }
            None => {
                character.profile_image_small = None;
                character.profile_image_medium = None;
                character.profile_image_large = None;
            }
        }
        character.meta.updated_at = Utc::now();

        self.store.characters().update(&character)?;
        Ok(character)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{ChatRepository, SqliteStore};
    use crate::types::{Chat, Message, MessageRole, Role};

    fn test_store() -> SqliteStore {
        let store = SqliteStore::in_memory().unwrap();
        store.initialize().unwrap();
        store
    }

    fn named(name: &str) -> Character {
        Character {
            name: name.to_string(),
            system_prompt: Some(format!("You are {name}.")),
            ..Default::default()
        }
    }

    #[test]
    fn test_listing_is_owner_scoped_for_users() {
        let store = test_store();
        let service = CharacterService::new(&store);
        let alice = Actor::new("alice", Role::User);
        let bob = Actor::new("bob", Role::User);
        let admin = Actor::new("root", Role::Admin);

        service.create_character(&alice, named("Ada")).unwrap();
        let gone = service.create_character(&alice, named("Gone")).unwrap();
        service.create_character(&bob, named("Bea")).unwrap();
        service.delete_character(&alice, &gone.meta.id).unwrap();

        let names = |chars: Vec<Character>| {
            let mut names: Vec<String> = chars.into_iter().map(|c| c.name).collect();
            names.sort();
            names
        };

        assert_eq!(names(service.get_all_characters(&alice).unwrap()), vec!["Ada"]);
        assert_eq!(names(service.get_all_characters(&bob).unwrap()), vec!["Bea"]);
        assert_eq!(
            names(service.get_all_characters(&admin).unwrap()),
            vec!["Ada", "Bea"]
        );
    }

    #[test]
    fn test_create_ignores_payload_identity() {
        let store = test_store();
        let service = CharacterService::new(&store);
        let alice = Actor::new("alice", Role::User);

        let mut payload = named("Ada");
        payload.meta.owner_id = Some("mallory".to_string());
        payload.meta.status = ResourceStatus::Deleted;

        let created = service.create_character(&alice, payload).unwrap();
        assert_eq!(created.meta.owner_id.as_deref(), Some("alice"));
        assert_eq!(created.meta.status, ResourceStatus::Active);
    }

    #[test]
    fn test_get_requires_ownership() {
        let store = test_store();
        let service = CharacterService::new(&store);
        let alice = Actor::new("alice", Role::User);
        let bob = Actor::new("bob", Role::User);
        let ada = service.create_character(&alice, named("Ada")).unwrap();

        assert!(service.get_character(&alice, &ada.meta.id).is_ok());
        assert!(matches!(
            service.get_character(&bob, &ada.meta.id),
            Err(crate::error::Error::Forbidden(_))
        ));
    }

    #[test]
    fn test_update_keeps_profile_images() {
        let store = test_store();
        let service = CharacterService::new(&store);
        let alice = Actor::new("alice", Role::User);
        let ada = service.create_character(&alice, named("Ada")).unwrap();
        let images = ProfileImages {
            small: "/s.png".to_string(),
            medium: "/m.png".to_string(),
            large: "/l.png".to_string(),
        };
        service
            .set_profile_images(&alice, &ada.meta.id, Some(images))
            .unwrap();

        let updated = service
            .update_character(&alice, &ada.meta.id, named("Ada Lovelace"))
            .unwrap();
        assert_eq!(updated.name, "Ada Lovelace");
        assert_eq!(updated.profile_image_small.as_deref(), Some("/s.png"));

        let cleared = service.set_profile_images(&alice, &ada.meta.id, None).unwrap();
        assert!(cleared.profile_image_large.is_none());
    }

    #[test]
    fn test_delete_cascades_to_chats_and_messages() {
        let store = test_store();
        let service = CharacterService::new(&store);
        let alice = Actor::new("alice", Role::User);
        let ada = service.create_character(&alice, named("Ada")).unwrap();

        let mut chat = Chat {
            character_id: ada.meta.id.clone(),
            ..Default::default()
        };
        chat.meta.id = "chat-1".to_string();
        chat.meta.owner_id = Some("alice".to_string());
        store.chats().insert(&chat).unwrap();

        let mut message = Message::new(MessageRole::User, "hi");
        message.meta.id = "m-1".to_string();
        message.chat_id = "chat-1".to_string();
        store.chats().append_message(&message).unwrap();

        let counts = service.delete_character(&alice, &ada.meta.id).unwrap();
        assert_eq!(counts, Some(CascadeCounts { messages: 1, chats: 1 }));

        let chat = store.chats().find_by_id("chat-1").unwrap().unwrap();
        assert!(chat.meta.is_deleted());
        assert!(store.chats().find_with_messages("chat-1").unwrap().unwrap().messages.is_empty());
    }

    #[test]
    fn test_delete_unknown_and_foreign() {
        let store = test_store();
        let service = CharacterService::new(&store);
        let alice = Actor::new("alice", Role::User);
        let bob = Actor::new("bob", Role::User);
        let ada = service.create_character(&alice, named("Ada")).unwrap();

        assert_eq!(
            service
                .delete_character(&alice, &uuid::Uuid::new_v4().to_string())
                .unwrap(),
            None
        );
        assert!(service.delete_character(&bob, &ada.meta.id).is_err());
        assert!(!service.find_character(&ada.meta.id).unwrap().meta.is_deleted());
    }
}
