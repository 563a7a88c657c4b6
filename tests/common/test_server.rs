use std::path::Path;
use std::sync::Arc;

use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde_json::{Value, json};
use tempfile::TempDir;
use tokio::task::JoinHandle;

use tavern::config::Config;
use tavern::server::{AppState, create_router};
use tavern::service::apply_seed;
use tavern::store::{SqliteStore, Store};

pub const PASSWORD: &str = "correct horse battery";

/// The full router served in-process on an ephemeral port, backed by a
/// fresh data directory.
pub struct TestServer {
    pub temp_dir: TempDir,
    pub base_url: String,
    pub client: Client,
    handle: JoinHandle<()>,
}

impl TestServer {
    pub async fn start() -> Self {
        Self::start_with(|_| {}).await
    }

    /// Starts with a default config adjusted by `configure`. The data
    /// directory is always the server's temp dir.
    pub async fn start_with<F>(configure: F) -> Self
    where
        F: FnOnce(&mut Config),
    {
        let temp_dir = TempDir::new().expect("create temp dir");
        let mut config = Config::default();
        configure(&mut config);
        config.server.data_dir = temp_dir.path().to_path_buf();

        let store = Arc::new(SqliteStore::new(config.server.db_path()).expect("open store"));
        store.initialize().expect("initialize schema");

        let state = AppState::new(config, store.clone(), store).expect("build state");
        apply_seed(
            state.store.as_ref(),
            state.sessions.as_ref(),
            state.hasher.as_ref(),
            &state.config.seed,
        )
        .expect("apply seed");

        let app = create_router(Arc::new(state));
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind");
        let addr = listener.local_addr().expect("local addr");
        let handle = tokio::spawn(async move {
            axum::serve(listener, app).await.ok();
        });

        Self {
            temp_dir,
            base_url: format!("http://{addr}"),
            client: Client::new(),
            handle,
        }
    }

    pub fn data_dir(&self) -> &Path {
        self.temp_dir.path()
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    pub fn get(&self, token: &str, path: &str) -> RequestBuilder {
        self.client.get(self.url(path)).bearer_auth(token)
    }

    pub fn post(&self, token: &str, path: &str, body: Value) -> RequestBuilder {
        self.client.post(self.url(path)).bearer_auth(token).json(&body)
    }

    pub fn put(&self, token: &str, path: &str, body: Value) -> RequestBuilder {
        self.client.put(self.url(path)).bearer_auth(token).json(&body)
    }

    pub fn delete(&self, token: &str, path: &str) -> RequestBuilder {
        self.client.delete(self.url(path)).bearer_auth(token)
    }

    pub async fn register(&self, username: &str) -> Response {
        self.client
            .post(self.url("/api/users/register"))
            .json(&json!({
                "username": username,
                "email": format!("{username}@example.com"),
                "password": PASSWORD,
            }))
            .send()
            .await
            .expect("register request")
    }

    pub async fn login(&self, username: &str, password: &str) -> Response {
        self.client
            .post(self.url("/api/users/login"))
            .json(&json!({ "username": username, "password": password }))
            .send()
            .await
            .expect("login request")
    }

    /// Registers `username` and returns a session token for it.
    pub async fn signup(&self, username: &str) -> String {
        let response = self.register(username).await;
        assert_eq!(response.status(), StatusCode::CREATED);
        self.token_for(username, PASSWORD).await
    }

    pub async fn token_for(&self, username: &str, password: &str) -> String {
        let response = self.login(username, password).await;
        assert_eq!(response.status(), StatusCode::OK);
        let body: Value = response.json().await.expect("login body");
        body["token"].as_str().expect("token").to_string()
    }

    pub async fn create_character(&self, token: &str, name: &str) -> Value {
        let response = self
            .post(
                token,
                "/api/characters",
                json!({
                    "name": name,
                    "description": format!("{name} is a test character"),
                    "systemPrompt": format!("You are {name}."),
                    "customFields": { "mood": "cheerful" },
                }),
            )
            .send()
            .await
            .expect("create character request");
        assert_eq!(response.status(), StatusCode::CREATED);
        response.json().await.expect("character body")
    }

    pub async fn create_chat(&self, token: &str, character_id: &str) -> Value {
        let response = self
            .post(token, "/api/chat/new", json!({ "characterId": character_id }))
            .send()
            .await
            .expect("create chat request");
        assert_eq!(response.status(), StatusCode::CREATED);
        response.json().await.expect("chat body")
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}
