//! # Tavern
//!
//! A character chat backend: users define AI personas ("characters"), hold
//! conversations with them, and each new message is relayed to an
//! OpenAI-compatible provider with the character's prompt and the recent
//! history. Usable as a standalone binary or as a library.
//!
//! ## Library Usage
//!
//! ```toml
//! [dependencies]
//! tavern = { version = "0.1", default-features = false }
//! ```
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use tavern::config::Config;
//! use tavern::server::{AppState, create_router};
//! use tavern::store::{SqliteStore, Store};
//!
//! let config = Config::load(None).unwrap();
//! let store = Arc::new(SqliteStore::new(config.server.db_path()).unwrap());
//! store.initialize().unwrap();
//!
//! let state = Arc::new(AppState::new(config, store.clone(), store).unwrap());
//! let router = create_router(state);
//! // Serve with axum...
//! ```
//!
//! ## Feature Flags
//!
//! - `cli` (default): Builds the `tavern` binary. Disable with `default-features = false`.

pub mod ai;
pub mod auth;
pub mod config;
pub mod error;
pub mod media;
pub mod server;
pub mod service;
pub mod store;
pub mod types;
