use std::sync::Arc;

use axum::{
    Json,
    extract::{Path, State},
    response::IntoResponse,
};

use crate::auth::RequireUser;
use crate::server::AppState;
use crate::server::dto::{MessageRequest, UpdateMessageRequest};
use crate::server::response::ApiError;
use crate::service::{IncomingMessage, MessageService};

/// Stores the user's turn and the AI reply, returning the reply. Provider
/// failures come back as a regular assistant message.
pub async fn post_message(
    auth: RequireUser,
    State(state): State<Arc<AppState>>,
    Json(req): Json<MessageRequest>,
) -> impl IntoResponse {
    let incoming = IncomingMessage {
        character_id: req.character_id,
        chat_id: req.chat_id,
        user_message: req.user_message,
        history: req.history,
    };

    let reply = MessageService::new(state.store.as_ref(), &state.ai)
        .handle_message(&auth.actor, incoming)
        .await?;
    Ok::<_, ApiError>(Json(reply))
}

pub async fn update_message(
    auth: RequireUser,
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(req): Json<UpdateMessageRequest>,
) -> impl IntoResponse {
    let content = req
        .content
        .filter(|c| !c.trim().is_empty())
        .ok_or_else(|| ApiError::bad_request("content is required"))?;

    let message =
        MessageService::new(state.store.as_ref(), &state.ai).update_message(&auth.actor, &id, &content)?;
    Ok::<_, ApiError>(Json(message))
}
