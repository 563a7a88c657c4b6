use crate::error::{Error, Result};
use crate::types::{Resource, Role, User};

/// The authenticated caller, resolved once per request and passed explicitly
/// into every service call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Actor {
    pub user_id: String,
    pub role: Role,
}

impl Actor {
    #[must_use]
    pub fn new(user_id: impl Into<String>, role: Role) -> Self {
        Self {
            user_id: user_id.into(),
            role,
        }
    }

    #[must_use]
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }
}

impl From<&User> for Actor {
    fn from(user: &User) -> Self {
        Self::new(user.meta.id.clone(), user.role)
    }
}

pub fn ensure_authenticated(actor: Option<&Actor>) -> Result<&Actor> {
    actor.ok_or_else(Error::unauthenticated)
}

/// Succeeds iff the actor is an admin or owns `resource`.
pub fn validate_ownership<R: Resource>(actor: Option<&Actor>, resource: &R) -> Result<()> {
    let actor = ensure_authenticated(actor)?;
    if actor.is_admin() || resource.owner_id() == Some(actor.user_id.as_str()) {
        return Ok(());
    }
    Err(Error::access_denied())
}
