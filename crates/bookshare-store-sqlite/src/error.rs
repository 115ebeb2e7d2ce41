//! Error type for `bookshare-store-sqlite`.

use bookshare_core::{error::AsCoreError, validate::ValidationErrors};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("core error: {0}")]
  Core(#[from] bookshare_core::Error),

  #[error("database error: {0}")]
  Database(#[from] tokio_rusqlite::Error),

  #[error("sqlite error: {0}")]
  Sqlite(#[from] rusqlite::Error),

  #[error("json error: {0}")]
  Json(#[from] serde_json::Error),

  #[error("uuid parse error: {0}")]
  Uuid(#[from] uuid::Error),

  #[error("decode error: {0}")]
  Decode(String),

  /// The history write failed under the atomic policy; the entity write it
  /// belonged to was rolled back with it.
  #[error("history write failed, change rolled back: {0}")]
  HistoryWrite(#[source] Box<Error>),
}

impl From<ValidationErrors> for Error {
  fn from(e: ValidationErrors) -> Self { Self::Core(e.into()) }
}

impl AsCoreError for Error {
  fn as_core(&self) -> Option<&bookshare_core::Error> {
    match self {
      Self::Core(e) => Some(e),
      _ => None,
    }
  }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
