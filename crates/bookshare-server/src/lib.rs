//! HTTP server wiring for Bookshare.
//!
//! Mounts the JSON API under `/api` and adds request tracing. The binary in
//! `main.rs` loads [`ServerConfig`] and opens the SQLite store.

use std::{path::PathBuf, sync::Arc};

use axum::Router;
use bookshare_core::{history::HistoryPolicy, store::Backend};
use serde::Deserialize;
use tower_http::trace::TraceLayer;

// ─── Configuration ────────────────────────────────────────────────────────────

/// Runtime server configuration, deserialised from `config.toml` and
/// `BOOKSHARE_*` environment variables.
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct ServerConfig {
  #[serde(default = "default_host")]
  pub host:           String,
  #[serde(default = "default_port")]
  pub port:           u16,
  #[serde(default = "default_store_path")]
  pub store_path:     PathBuf,
  /// Whether a failed history write aborts the entity write.
  #[serde(default)]
  pub history_policy: HistoryPolicy,
}

fn default_host() -> String { "127.0.0.1".to_string() }

fn default_port() -> u16 { 8080 }

fn default_store_path() -> PathBuf { PathBuf::from("~/.local/share/bookshare/bookshare.db") }

impl ServerConfig {
  pub fn address(&self) -> String { format!("{}:{}", self.host, self.port) }
}

// ─── Router ───────────────────────────────────────────────────────────────────

/// Build the top-level application router.
pub fn app<S>(store: Arc<S>) -> Router
where
  S: Backend + 'static,
{
  Router::new()
    .nest("/api", bookshare_api::api_router(store))
    .layer(TraceLayer::new_for_http())
}
