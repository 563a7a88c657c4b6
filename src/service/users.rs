use chrono::Duration;
use uuid::Uuid;

use super::Lifecycle;
use crate::auth::{PasswordHasher, SessionStore};
use crate::error::{Error, Result};
use crate::store::{Store, UserRepository};
use crate::types::{ResourceMeta, Role, User};

const INVALID_CREDENTIALS: &str = "Invalid username/email or password";

/// A freshly issued session.
#[derive(Debug)]
pub struct LoginSession {
    pub token: String,
    pub user: User,
}

/// Account registration and the login/logout session flow.
pub struct UserService<'a> {
    store: &'a dyn Store,
    sessions: &'a dyn SessionStore,
    hasher: &'a dyn PasswordHasher,
    session_ttl: Option<Duration>,
}

impl<'a> UserService<'a> {
    pub fn new(
        store: &'a dyn Store,
        sessions: &'a dyn SessionStore,
        hasher: &'a dyn PasswordHasher,
        session_ttl: Option<Duration>,
    ) -> Self {
        Self {
            store,
            sessions,
            hasher,
            session_ttl,
        }
    }

    fn users(&self) -> Lifecycle<'a, User, dyn UserRepository + 'a> {
        Lifecycle::new(self.store.users(), "User")
    }

    pub fn register(&self, username: &str, email: &str, password: &str) -> Result<User> {
        self.create_account(username, email, password, Role::User)
    }

    /// Creates an account with the given role. Username and email must both be unused.
    pub fn create_account(
        &self,
        username: &str,
        email: &str,
        password: &str,
        role: Role,
    ) -> Result<User> {
        let username = username.trim();
        let email = email.trim();
        if username.is_empty() || email.is_empty() || password.is_empty() {
            return Err(Error::BadRequest(
                "Username, email and password are required".to_string(),
            ));
        }

        let repo = self.store.users();
        if repo.exists_by_username(username)? {
            return Err(Error::Conflict("Username already exists".to_string()));
        }
        if repo.exists_by_email(email)? {
            return Err(Error::Conflict("Email already exists".to_string()));
        }

        let id = Uuid::new_v4().to_string();
        let user = User {
            meta: ResourceMeta {
                id: id.clone(),
                owner_id: Some(id),
                ..Default::default()
            },
            username: username.to_string(),
            email: email.to_string(),
            password_hash: self.hasher.hash(password)?,
            role,
        };

        let user = self.users().save(None, user)?;
        tracing::info!("Registered {} account '{}'", user.role, user.username);
        Ok(user)
    }

    /// Looks the account up by username, or by email when no username is
    /// given. Every mismatch yields the same error.
    pub fn login(
        &self,
        username: Option<&str>,
        email: Option<&str>,
        password: &str,
    ) -> Result<LoginSession> {
        let username = username.map(str::trim).filter(|u| !u.is_empty());
        let email = email.map(str::trim).filter(|e| !e.is_empty());

        let repo = self.store.users();
        let user = match (username, email) {
            (Some(username), _) => repo.find_by_username(username)?,
            (None, Some(email)) => repo.find_by_email(email)?,
            (None, None) => {
                return Err(Error::BadRequest(
                    "Username or email is required".to_string(),
                ));
            }
        };
        if password.is_empty() {
            return Err(Error::BadRequest("Password is required".to_string()));
        }

        let invalid = || Error::Unauthorized(INVALID_CREDENTIALS.to_string());
        let user = user.filter(|u| !u.meta.is_deleted()).ok_or_else(invalid)?;
        if !self.hasher.verify(password, &user.password_hash)? {
            tracing::debug!("Password mismatch for '{}'", user.username);
            return Err(invalid());
        }

        let token = self.sessions.issue(&user.meta.id, self.session_ttl)?;
        tracing::info!("User '{}' logged in", user.username);
        Ok(LoginSession { token, user })
    }

    /// Revokes the token if there is one. Unknown tokens are not an error.
    pub fn logout(&self, token: Option<&str>) -> Result<()> {
        if let Some(token) = token.map(str::trim).filter(|t| !t.is_empty()) {
            self.sessions.revoke(token)?;
        }
        Ok(())
    }
}
