use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("image error: {0}")]
    Image(#[from] image::ImageError),

    /// Carries the human-readable resource type name.
    #[error("{0} not found")]
    NotFound(String),

    #[error("{0}")]
    Unauthorized(String),

    #[error("{0}")]
    Forbidden(String),

    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    Conflict(String),

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl Error {
    #[must_use]
    pub fn not_found(resource: &str) -> Self {
        Self::NotFound(resource.to_string())
    }

    #[must_use]
    pub fn unauthenticated() -> Self {
        Self::Unauthorized("User not authenticated".to_string())
    }

    #[must_use]
    pub fn access_denied() -> Self {
        Self::Forbidden("Access denied".to_string())
    }
}

pub type Result<T> = std::result::Result<T, Error>;
