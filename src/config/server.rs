use std::net::SocketAddr;
use std::path::PathBuf;

use chrono::{Duration, Utc};
use serde::Deserialize;

use crate::error::{Error, Result};

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Holds the database and, unless overridden, uploaded character images.
    pub data_dir: PathBuf,
}

impl ServerConfig {
    pub fn socket_addr(&self) -> std::result::Result<SocketAddr, std::net::AddrParseError> {
        format!("{}:{}", self.host, self.port).parse()
    }

    #[must_use]
    pub fn db_path(&self) -> PathBuf {
        self.data_dir.join("tavern.db")
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
            data_dir: PathBuf::from("./data"),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CorsConfig {
    pub allowed_origins: Vec<String>,
    pub allow_credentials: bool,
}

impl Default for CorsConfig {
    fn default() -> Self {
        Self {
            allowed_origins: vec![
                "http://localhost:4200".to_string(),
                "http://localhost:5173".to_string(),
                "http://127.0.0.1:4200".to_string(),
            ],
            allow_credentials: true,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct UploadConfig {
    /// Defaults to `<data_dir>/uploads/characters` when unset.
    pub dir: Option<PathBuf>,
    pub allowed_extensions: Vec<String>,
    pub max_file_size: usize,
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            dir: None,
            allowed_extensions: vec!["jpg".to_string(), "jpeg".to_string(), "png".to_string()],
            max_file_size: 5 * 1024 * 1024,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// `None` keeps sessions until logout.
    pub ttl_hours: Option<i64>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            ttl_hours: Some(24 * 7),
        }
    }
}

impl SessionConfig {
    #[must_use]
    pub fn ttl(&self) -> Option<Duration> {
        self.ttl_hours.and_then(Duration::try_hours)
    }

    /// Rejects lifetimes that are not positive or that overflow a timestamp.
    pub fn validate(&self) -> Result<()> {
        let Some(hours) = self.ttl_hours else {
            return Ok(());
        };
        if hours <= 0 {
            return Err(Error::Config(format!(
                "session.ttl_hours must be positive, got {hours}"
            )));
        }
        Duration::try_hours(hours)
            .and_then(|ttl| Utc::now().checked_add_signed(ttl))
            .map(|_| ())
            .ok_or_else(|| Error::Config(format!("session.ttl_hours {hours} is too large")))
    }
}
