mod characters;
mod chats;
mod messages;
mod users;

use std::sync::Arc;

use axum::{
    Router,
    routing::{get, post, put},
};

use super::response::ApiError;
use crate::server::AppState;

pub fn api_router() -> Router<Arc<AppState>> {
    Router::new()
        // Accounts
        .route("/users/register", post(users::register))
        .route("/users/login", post(users::login))
        .route("/users/logout", post(users::logout))
        // Characters
        .route(
            "/characters",
            get(characters::list_characters).post(characters::create_character),
        )
        .route(
            "/characters/{id}",
            get(characters::get_character)
                .put(characters::update_character)
                .delete(characters::delete_character),
        )
        .route(
            "/characters/{id}/profile-image",
            post(characters::upload_profile_image).delete(characters::delete_profile_image),
        )
        // Chats
        .route("/chat", get(chats::list_chats).post(chats::create_chat))
        .route("/chat/new", post(chats::create_chat))
        .route("/chat/latest", get(chats::latest_chat))
        .route("/chat/{id}", get(chats::get_chat))
        // Messages
        .route("/message", post(messages::post_message))
        .route("/message/{id}", put(messages::update_message))
}

/// Runs CPU-bound or filesystem work off the async executor.
async fn run_blocking<T, F>(f: F) -> Result<T, ApiError>
where
    F: FnOnce() -> crate::error::Result<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| {
            tracing::error!("spawn_blocking join error: {}", e);
            ApiError::internal("Internal server error")
        })?
        .map_err(ApiError::from)
}
