use serde::Deserialize;

pub const DEFAULT_API_URL: &str = "https://openrouter.ai/api/v1/chat/completions";
pub const DEFAULT_MODEL: &str = "openrouter/auto";

/// Chat-completion provider settings.
#[derive(Clone, Deserialize)]
#[serde(default)]
pub struct AiConfig {
    /// Blank disables outbound calls; replies become an error sentinel.
    pub api_key: String,
    pub api_url: String,
    pub model: String,
    pub max_tokens: Option<u32>,
    pub temperature: Option<f32>,
    pub referer: String,
    pub title: String,
    pub timeout_secs: u64,
}

impl AiConfig {
    #[must_use]
    pub fn has_api_key(&self) -> bool {
        !self.api_key.trim().is_empty()
    }
}

impl Default for AiConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            api_url: DEFAULT_API_URL.to_string(),
            model: DEFAULT_MODEL.to_string(),
            max_tokens: None,
            temperature: None,
            referer: "http://localhost".to_string(),
            title: "Chatbot".to_string(),
            timeout_secs: 60,
        }
    }
}

impl std::fmt::Debug for AiConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AiConfig")
            .field("api_key", &if self.has_api_key() { "<set>" } else { "<unset>" })
            .field("api_url", &self.api_url)
            .field("model", &self.model)
            .field("max_tokens", &self.max_tokens)
            .field("temperature", &self.temperature)
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}
