use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use axum::{Json, Router, extract::State, http::StatusCode, routing::post};
use serde_json::{Value, json};
use tokio::task::JoinHandle;

pub const DEFAULT_REPLY: &str = "Hello from the fake provider";

struct ProviderState {
    status: Mutex<StatusCode>,
    body: Mutex<Value>,
    hits: AtomicUsize,
    last_request: Mutex<Option<Value>>,
}

/// OpenAI-compatible completion endpoint with a scripted response.
pub struct FakeProvider {
    pub url: String,
    state: Arc<ProviderState>,
    handle: JoinHandle<()>,
}

async fn complete(
    State(state): State<Arc<ProviderState>>,
    Json(body): Json<Value>,
) -> (StatusCode, Json<Value>) {
    state.hits.fetch_add(1, Ordering::SeqCst);
    *state.last_request.lock().unwrap() = Some(body);
    let status = *state.status.lock().unwrap();
    let body = state.body.lock().unwrap().clone();
    (status, Json(body))
}

impl FakeProvider {
    pub async fn start() -> Self {
        let state = Arc::new(ProviderState {
            status: Mutex::new(StatusCode::OK),
            body: Mutex::new(reply_body(DEFAULT_REPLY)),
            hits: AtomicUsize::new(0),
            last_request: Mutex::new(None),
        });

        let app = Router::new()
            .route("/v1/chat/completions", post(complete))
            .with_state(state.clone());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind fake provider");
        let addr = listener.local_addr().expect("local addr");
        let handle = tokio::spawn(async move {
            axum::serve(listener, app).await.ok();
        });

        Self {
            url: format!("http://{addr}/v1/chat/completions"),
            state,
            handle,
        }
    }

    pub fn respond_with(&self, status: u16, body: Value) {
        *self.state.status.lock().unwrap() = StatusCode::from_u16(status).expect("valid status");
        *self.state.body.lock().unwrap() = body;
    }

    pub fn hits(&self) -> usize {
        self.state.hits.load(Ordering::SeqCst)
    }

    pub fn last_request(&self) -> Option<Value> {
        self.state.last_request.lock().unwrap().clone()
    }
}

impl Drop for FakeProvider {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

pub fn reply_body(content: &str) -> Value {
    json!({
        "id": "gen-test",
        "choices": [
            { "index": 0, "message": { "role": "assistant", "content": content } }
        ]
    })
}
