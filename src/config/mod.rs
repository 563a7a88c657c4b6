//! Layered configuration: TOML file, then environment, then CLI flags.

mod ai;
mod server;

use std::path::{Path, PathBuf};

use serde::Deserialize;

pub use ai::{AiConfig, DEFAULT_API_URL, DEFAULT_MODEL};
pub use server::{CorsConfig, ServerConfig, SessionConfig, UploadConfig};

use crate::error::{Error, Result};

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub ai: AiConfig,
    pub upload: UploadConfig,
    pub cors: CorsConfig,
    pub session: SessionConfig,
    pub seed: SeedConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "tavern=info,tower_http=info".to_string(),
        }
    }
}

/// Records created at startup when they do not exist yet.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct SeedConfig {
    pub admin: Option<AdminSeed>,
    pub character: Option<CharacterSeed>,
}

#[derive(Clone, Deserialize)]
pub struct AdminSeed {
    pub username: String,
    pub email: String,
    pub password: String,
}

impl std::fmt::Debug for AdminSeed {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AdminSeed")
            .field("username", &self.username)
            .field("email", &self.email)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct CharacterSeed {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub system_prompt: Option<String>,
    #[serde(default)]
    pub short_greeting: Option<String>,
}

impl Config {
    /// Reads the TOML file if one is given, then applies process environment overrides.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => Self::from_toml(&std::fs::read_to_string(path)?)?,
            None => Self::default(),
        };
        config.apply_env(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content).map_err(|e| Error::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        self.session.validate()
    }

    /// Overrides settings from environment variables, read through `lookup`.
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let lookup = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(key) = lookup("OPENROUTER_API_KEY") {
            self.ai.api_key = key;
        }
        if let Some(url) = lookup("OPENROUTER_API_URL") {
            self.ai.api_url = url;
        }
        if let Some(model) = lookup("OPENROUTER_MODEL") {
            self.ai.model = model;
        }
        if let Some(host) = lookup("TAVERN_HOST") {
            self.server.host = host;
        }
        if let Some(port) = lookup("TAVERN_PORT") {
            match port.parse() {
                Ok(port) => self.server.port = port,
                Err(_) => tracing::warn!("Ignoring invalid TAVERN_PORT value '{port}'"),
            }
        }
        if let Some(dir) = lookup("TAVERN_DATA_DIR") {
            self.server.data_dir = PathBuf::from(dir);
        }
        if let Some(origins) = lookup("TAVERN_CORS_ORIGINS") {
            self.cors.allowed_origins = parse_comma_separated(&origins);
        }
    }

    #[must_use]
    pub fn upload_dir(&self) -> PathBuf {
        self.upload
            .dir
            .clone()
            .unwrap_or_else(|| self.server.data_dir.join("uploads").join("characters"))
    }
}

fn parse_comma_separated(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}
