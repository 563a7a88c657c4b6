use std::marker::PhantomData;

use chrono::Utc;
use uuid::Uuid;

use crate::auth::{Actor, validate_ownership};
use crate::error::{Error, Result};
use crate::store::Repository;
use crate::types::{Resource, ResourceMeta, ResourceStatus};

/// Ownership-aware create/read/update/delete shared by every entity type.
///
/// `resource` is the human-readable type name used in not-found errors.
pub struct Lifecycle<'a, T, R: ?Sized> {
    repo: &'a R,
    resource: &'static str,
    _entity: PhantomData<fn() -> T>,
}

impl<'a, T, R> Lifecycle<'a, T, R>
where
    T: Resource,
    R: ?Sized + Repository<T>,
{
    pub fn new(repo: &'a R, resource: &'static str) -> Self {
        Self {
            repo,
            resource,
            _entity: PhantomData,
        }
    }

    pub fn find_all(&self) -> Result<Vec<T>> {
        self.repo.find_all()
    }

    /// Malformed ids resolve to `None` without touching the store.
    pub fn find_by_id(&self, id: &str) -> Result<Option<T>> {
        if Uuid::parse_str(id).is_err() {
            return Ok(None);
        }
        self.repo.find_by_id(id)
    }

    pub fn find_by_id_or_throw(&self, id: &str) -> Result<T> {
        self.find_by_id(id)?
            .ok_or_else(|| Error::not_found(self.resource))
    }

    /// Inserts a new entity, or overwrites an existing row with the same id.
    ///
    /// A new entity without an owner is assigned to `actor`. Ownership is not
    /// checked here.
    pub fn save(&self, actor: Option<&Actor>, mut entity: T) -> Result<T> {
        let now = Utc::now();
        let meta = entity.meta_mut();
        let was_new = meta.is_new();

        if was_new {
            meta.id = Uuid::new_v4().to_string();
            meta.created_at = now;
            if meta.owner_id.is_none() {
                meta.owner_id = actor.map(|a| a.user_id.clone());
            }
        }
        meta.updated_at = now;

        if !was_new && self.repo.find_by_id(entity.id())?.is_some() {
            self.repo.update(&entity)?;
        } else {
            self.repo.insert(&entity)?;
        }
        Ok(entity)
    }

    /// Replaces the mutable fields of an existing entity.
    ///
    /// `id`, `owner_id`, `created_at` and `status` always come from the stored
    /// record, whatever `entity` carries.
    pub fn update(&self, actor: Option<&Actor>, id: &str, mut entity: T) -> Result<T> {
        let existing = self.find_by_id_or_throw(id)?;
        validate_ownership(actor, &existing)?;

        let kept = existing.meta();
        *entity.meta_mut() = ResourceMeta {
            id: kept.id.clone(),
            owner_id: kept.owner_id.clone(),
            status: kept.status,
            created_at: kept.created_at,
            updated_at: Utc::now(),
        };

        self.repo.update(&entity)?;
        Ok(entity)
    }

    /// Marks the entity DELETED. Returns false when nothing has that id.
    pub fn soft_delete(&self, actor: Option<&Actor>, id: &str) -> Result<bool> {
        let Some(mut existing) = self.find_by_id(id)? else {
            return Ok(false);
        };
        validate_ownership(actor, &existing)?;

        let meta = existing.meta_mut();
        meta.status = ResourceStatus::Deleted;
        meta.updated_at = Utc::now();

        self.repo.update(&existing)?;
        Ok(true)
    }

    pub fn hard_delete(&self, actor: Option<&Actor>, id: &str) -> Result<()> {
        let existing = self.find_by_id_or_throw(id)?;
        validate_ownership(actor, &existing)?;

        if !self.repo.delete(id)? {
            return Err(Error::not_found(self.resource));
        }
        Ok(())
    }
}
