use std::time::Duration;

use reqwest::StatusCode;
use thiserror::Error;

use super::dto::{ChatCompletionRequest, ChatCompletionResponse, HistoryEntry};
use super::prompt::build_messages;
use crate::config::AiConfig;
use crate::error::{Error, Result};
use crate::types::{Character, Message};

const HEADER_HTTP_REFERER: &str = "HTTP-Referer";
const HEADER_X_TITLE: &str = "X-Title";

/// Why a provider call produced no usable reply. The display text becomes the
/// body of the `[Error: ...]` assistant message.
#[derive(Debug, Error)]
pub enum ProviderFailure {
    #[error("AI API Key is missing. Set OPENROUTER_API_KEY environment variable.")]
    MissingKey,

    #[error("Received empty content from AI")]
    EmptyContent,

    #[error("AI API Key is invalid or missing.")]
    InvalidKey,

    #[error("Rate limit exceeded for AI API.")]
    RateLimited,

    #[error("Failed to communicate with AI. Status: {0}")]
    ClientStatus(StatusCode),

    #[error("Could not connect to AI Service - {0}")]
    ServerStatus(StatusCode),

    #[error("Invalid response from AI Service - Status: {0}")]
    UnexpectedStatus(StatusCode),

    #[error("Could not connect to AI Service - {0}")]
    Transport(String),

    #[error("Unexpected issue processing AI response")]
    Unexpected,
}

impl ProviderFailure {
    #[must_use]
    pub fn sentinel(&self) -> String {
        format!("[Error: {self}]")
    }
}

/// Chat-completion client. Every call yields an assistant [`Message`];
/// provider failures become sentinel content instead of errors.
pub struct AiClient {
    http: reqwest::Client,
    config: AiConfig,
}

impl AiClient {
    pub fn new(config: AiConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| Error::Config(format!("failed to build AI HTTP client: {e}")))?;

        Ok(Self { http, config })
    }

    /// Single attempt, no streaming. Never fails.
    pub async fn get_ai_response(
        &self,
        character: &Character,
        history: &[HistoryEntry],
        user_message: &str,
    ) -> Message {
        let content = match self.complete(character, history, user_message).await {
            Ok(content) => {
                tracing::debug!(
                    "AI reply for character {} ({} chars)",
                    character.meta.id,
                    content.len()
                );
                content
            }
            Err(failure) => {
                let sentinel = failure.sentinel();
                tracing::warn!(
                    "AI provider call for character {} failed: {}",
                    character.meta.id,
                    sentinel
                );
                sentinel
            }
        };

        Message::assistant(content)
    }

    async fn complete(
        &self,
        character: &Character,
        history: &[HistoryEntry],
        user_message: &str,
    ) -> std::result::Result<String, ProviderFailure> {
        if !self.config.has_api_key() {
            return Err(ProviderFailure::MissingKey);
        }

        let request = ChatCompletionRequest {
            model: self.config.model.clone(),
            messages: build_messages(character, history, user_message),
            max_tokens: self.config.max_tokens,
            temperature: self.config.temperature,
        };

        let response = self
            .http
            .post(&self.config.api_url)
            .bearer_auth(self.config.api_key.trim())
            .header(HEADER_HTTP_REFERER, &self.config.referer)
            .header(HEADER_X_TITLE, &self.config.title)
            .json(&request)
            .send()
            .await
            .map_err(|e| ProviderFailure::Transport(e.to_string()))?;

        match response.status() {
            StatusCode::OK => {}
            StatusCode::UNAUTHORIZED => return Err(ProviderFailure::InvalidKey),
            StatusCode::TOO_MANY_REQUESTS => return Err(ProviderFailure::RateLimited),
            status if status.is_client_error() => return Err(ProviderFailure::ClientStatus(status)),
            status if status.is_server_error() => return Err(ProviderFailure::ServerStatus(status)),
            status => return Err(ProviderFailure::UnexpectedStatus(status)),
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| ProviderFailure::Transport(e.to_string()))?;

        let body: ChatCompletionResponse = serde_json::from_slice(&bytes).map_err(|e| {
            tracing::debug!("Failed to decode AI response body: {e}");
            ProviderFailure::Unexpected
        })?;

        body.into_first_content()
            .ok_or(ProviderFailure::EmptyContent)
    }
}
