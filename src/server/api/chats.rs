use std::sync::Arc;

use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};

use crate::auth::RequireUser;
use crate::server::AppState;
use crate::server::dto::{CharacterQuery, CreateChatRequest};
use crate::server::response::{ApiError, OptionExt};
use crate::service::ChatService;
use crate::types::Message;

fn required_character_id(query: CharacterQuery) -> Result<String, ApiError> {
    query
        .character_id
        .filter(|id| !id.trim().is_empty())
        .ok_or_else(|| ApiError::bad_request("characterId is required"))
}

pub async fn create_chat(
    auth: RequireUser,
    State(state): State<Arc<AppState>>,
    Json(req): Json<CreateChatRequest>,
) -> impl IntoResponse {
    let messages: Vec<Message> = req.message_list.into_iter().map(Message::from).collect();
    let chat = ChatService::new(state.store.as_ref()).create_chat(
        &auth.actor,
        req.character_id.as_deref().unwrap_or_default(),
        messages,
    )?;
    Ok::<_, ApiError>((StatusCode::CREATED, Json(chat)))
}

pub async fn list_chats(
    auth: RequireUser,
    State(state): State<Arc<AppState>>,
    Query(query): Query<CharacterQuery>,
) -> impl IntoResponse {
    let character_id = required_character_id(query)?;
    let chats = ChatService::new(state.store.as_ref()).find_all_chats(&auth.actor, &character_id)?;
    Ok::<_, ApiError>(Json(chats))
}

pub async fn latest_chat(
    auth: RequireUser,
    State(state): State<Arc<AppState>>,
    Query(query): Query<CharacterQuery>,
) -> impl IntoResponse {
    let character_id = required_character_id(query)?;
    let chat = ChatService::new(state.store.as_ref())
        .find_latest_chat(&auth.actor, &character_id)?
        .or_not_found("No chat found")?;
    Ok::<_, ApiError>(Json(chat))
}

pub async fn get_chat(
    auth: RequireUser,
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    let chat = ChatService::new(state.store.as_ref()).get_chat(&auth.actor, &id)?;
    Ok::<_, ApiError>(Json(chat))
}
