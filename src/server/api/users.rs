use std::sync::Arc;

use axum::{
    Json,
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode, header::AUTHORIZATION},
    response::IntoResponse,
};

use super::run_blocking;
use crate::auth::extract_token_from_header;
use crate::server::AppState;
use crate::server::dto::{
    LoginRequest, LoginResponse, LogoutRequest, LogoutResponse, RegisterRequest,
    RegisterResponse,
};
use crate::server::response::ApiError;
use crate::service::UserService;

fn user_service(state: &AppState) -> UserService<'_> {
    UserService::new(
        state.store.as_ref(),
        state.sessions.as_ref(),
        state.hasher.as_ref(),
        state.config.session.ttl(),
    )
}

pub async fn register(
    State(state): State<Arc<AppState>>,
    Json(req): Json<RegisterRequest>,
) -> impl IntoResponse {
    let user = run_blocking(move || {
        user_service(&state).register(
            req.username.as_deref().unwrap_or_default(),
            req.email.as_deref().unwrap_or_default(),
            req.password.as_deref().unwrap_or_default(),
        )
    })
    .await?;

    Ok::<_, ApiError>((StatusCode::CREATED, Json(RegisterResponse::from(user))))
}

pub async fn login(
    State(state): State<Arc<AppState>>,
    Json(req): Json<LoginRequest>,
) -> impl IntoResponse {
    let session = run_blocking(move || {
        user_service(&state).login(
            req.username.as_deref(),
            req.email.as_deref(),
            req.password.as_deref().unwrap_or_default(),
        )
    })
    .await?;

    let user = session.user;
    Ok::<_, ApiError>(Json(LoginResponse {
        token: session.token,
        user_id: user.meta.id,
        username: user.username,
        email: user.email,
        role: user.role,
    }))
}

/// Accepts the token either as a Bearer header or as `{"token": ...}`.
/// Logging out without a usable token still succeeds.
pub async fn logout(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Bytes,
) -> impl IntoResponse {
    let header = headers.get(AUTHORIZATION).and_then(|h| h.to_str().ok());
    let token = match extract_token_from_header(header) {
        Ok(Some(token)) => Some(token),
        _ => serde_json::from_slice::<LogoutRequest>(&body)
            .ok()
            .and_then(|req| req.token),
    };

    user_service(&state).logout(token.as_deref())?;

    Ok::<_, ApiError>(Json(LogoutResponse {
        status: "logged out",
    }))
}
