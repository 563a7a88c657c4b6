use std::sync::Arc;
use std::time::Instant;

use axum::extract::{DefaultBodyLimit, Request};
use axum::http::{HeaderValue, Method, header};
use axum::middleware::{self, Next};
use axum::response::Response;
use axum::{Router, routing::get};
use tower::ServiceBuilder;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::services::ServeDir;

use super::api::api_router;
use crate::ai::AiClient;
use crate::auth::{Argon2Hasher, PasswordHasher, SessionStore};
use crate::config::{Config, CorsConfig};
use crate::error::Result;
use crate::media::{ImageStore, UPLOAD_URL_PREFIX};
use crate::store::Store;

/// Room for multipart framing on top of the largest accepted image.
const MULTIPART_OVERHEAD: usize = 64 * 1024;

pub struct AppState {
    pub store: Arc<dyn Store>,
    pub sessions: Arc<dyn SessionStore>,
    pub hasher: Arc<dyn PasswordHasher>,
    pub ai: AiClient,
    pub images: Arc<ImageStore>,
    pub config: Config,
}

impl AppState {
    pub fn new(
        config: Config,
        store: Arc<dyn Store>,
        sessions: Arc<dyn SessionStore>,
    ) -> Result<Self> {
        let ai = AiClient::new(config.ai.clone())?;
        let images = Arc::new(ImageStore::new(config.upload_dir(), &config.upload));
        Ok(Self {
            store,
            sessions,
            hasher: Arc::new(Argon2Hasher::new()),
            ai,
            images,
            config,
        })
    }
}

async fn health() -> &'static str {
    "OK"
}

async fn log_request(request: Request, next: Next) -> Response {
    let method = request.method().clone();
    let uri = request.uri().clone();
    let start = Instant::now();

    let response = next.run(request).await;

    let latency = start.elapsed();
    let status = response.status();

    tracing::info!(
        "{} {} {} {}ms",
        method,
        uri.path(),
        status.as_u16(),
        latency.as_millis()
    );

    response
}

fn cors_layer(config: &CorsConfig) -> CorsLayer {
    let layer = CorsLayer::new()
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE]);

    // Credentials cannot be combined with a wildcard origin.
    if config.allowed_origins.iter().any(|o| o == "*") {
        return layer.allow_origin(AllowOrigin::any());
    }

    let origins: Vec<HeaderValue> = config
        .allowed_origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!("Ignoring invalid CORS origin '{origin}'");
                None
            }
        })
        .collect();

    layer
        .allow_origin(AllowOrigin::list(origins))
        .allow_credentials(config.allow_credentials)
}

pub fn create_router(state: Arc<AppState>) -> Router {
    let body_limit = state.config.upload.max_file_size + MULTIPART_OVERHEAD;
    let uploads = ServeDir::new(state.images.dir());

    Router::new()
        .route("/health", get(health))
        .nest("/api", api_router())
        .nest_service(UPLOAD_URL_PREFIX, uploads)
        .layer(
            ServiceBuilder::new()
                .layer(middleware::from_fn(log_request))
                .layer(cors_layer(&state.config.cors))
                .layer(DefaultBodyLimit::max(body_limit)),
        )
        .with_state(state)
}
