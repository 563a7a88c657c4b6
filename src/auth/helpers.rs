use std::sync::Arc;

use crate::server::AppState;
use crate::store::Repository;
use crate::types::User;

#[derive(Debug)]
pub enum TokenValidationError {
    InvalidScheme,
    InvalidToken,
    InternalError,
}

/// Extracts token from an Authorization header.
/// Returns None if no auth header is present.
/// Returns Err if the auth scheme is not Bearer.
pub fn extract_token_from_header(
    auth_header: Option<&str>,
) -> Result<Option<String>, TokenValidationError> {
    let Some(header) = auth_header else {
        return Ok(None);
    };

    match header.strip_prefix("Bearer ") {
        Some(token) if !token.trim().is_empty() => Ok(Some(token.trim().to_string())),
        Some(_) => Err(TokenValidationError::InvalidToken),
        None => Err(TokenValidationError::InvalidScheme),
    }
}

/// Resolves a raw token through the session registry and loads its user.
/// Deleted accounts are treated like unknown tokens.
pub fn validate_token(
    state: &Arc<AppState>,
    raw_token: &str,
) -> Result<User, TokenValidationError> {
    let user_id = state
        .sessions
        .lookup(raw_token)
        .map_err(|e| {
            tracing::error!("Session lookup failed: {e}");
            TokenValidationError::InternalError
        })?
        .ok_or(TokenValidationError::InvalidToken)?;

    state
        .store
        .users()
        .find_by_id(&user_id)
        .map_err(|e| {
            tracing::error!("Failed to load session user {user_id}: {e}");
            TokenValidationError::InternalError
        })?
        .filter(|user| !user.meta.is_deleted())
        .ok_or(TokenValidationError::InvalidToken)
}
