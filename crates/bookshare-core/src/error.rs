//! Error types for `bookshare-core`.

use thiserror::Error;
use uuid::Uuid;

use crate::{entity::EntityKind, validate::ValidationErrors};

#[derive(Debug, Error)]
pub enum Error {
  /// One or more fields failed validation. Never logged as activity.
  #[error("validation failed: {0}")]
  Validation(ValidationErrors),

  #[error("{kind} not found: {id}")]
  NotFound { kind: EntityKind, id: Uuid },

  /// A uniqueness rule was violated (duplicate genre name, second review of
  /// the same book by the same user, second profile for a user).
  #[error("conflict: {0}")]
  Conflict(String),

  #[error("forbidden: {0}")]
  Forbidden(String),

  #[error("unknown {what} discriminant: {value:?}")]
  UnknownDiscriminant { what: &'static str, value: String },

  #[error("serialization error: {0}")]
  Serialization(#[from] serde_json::Error),
}

impl From<ValidationErrors> for Error {
  fn from(e: ValidationErrors) -> Self { Self::Validation(e) }
}

/// Exposes the domain failure, if any, inside a backend's own error type so
/// callers can tell validation and lookup failures from storage failures.
pub trait AsCoreError {
  fn as_core(&self) -> Option<&Error>;
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
