use super::{CharacterService, Lifecycle, UserService};
use crate::auth::{Actor, PasswordHasher, SessionStore};
use crate::config::SeedConfig;
use crate::error::Result;
use crate::store::{CharacterRepository, Store};
use crate::types::{Character, Role};

/// Creates the configured admin account and sample character unless records
/// with the same username or name already exist. Safe to run on every start.
pub fn apply_seed(
    store: &dyn Store,
    sessions: &dyn SessionStore,
    hasher: &dyn PasswordHasher,
    seed: &SeedConfig,
) -> Result<()> {
    let mut owner = None;

    if let Some(admin) = &seed.admin {
        let existing = store.users().find_by_username(&admin.username)?;
        let user = match existing {
            Some(user) => {
                tracing::debug!("Admin account '{}' already present", user.username);
                user
            }
            None => UserService::new(store, sessions, hasher, None).create_account(
                &admin.username,
                &admin.email,
                &admin.password,
                Role::Admin,
            )?,
        };
        owner = Some(Actor::from(&user));
    }

    if let Some(sample) = &seed.character {
        if store.characters().find_by_name(&sample.name)?.is_some() {
            tracing::debug!("Sample character '{}' already present", sample.name);
            return Ok(());
        }

        let character = Character {
            name: sample.name.clone(),
            description: sample.description.clone(),
            system_prompt: sample.system_prompt.clone(),
            short_greeting: sample.short_greeting.clone(),
            ..Default::default()
        };
        match &owner {
            Some(actor) => {
                CharacterService::new(store).create_character(actor, character)?;
            }
            None => {
                let lifecycle: Lifecycle<'_, Character, dyn CharacterRepository + '_> =
                    Lifecycle::new(store.characters(), "Character");
                let character = lifecycle.save(None, character)?;
                tracing::info!("Seeded unowned character '{}'", character.name);
            }
        }
    }

    Ok(())
}
