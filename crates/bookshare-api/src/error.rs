//! API error type and [`axum::response::IntoResponse`] implementation.

use axum::{
  Json,
  http::StatusCode,
  response::{IntoResponse, Response},
};
use bookshare_core::{error::AsCoreError, validate::ValidationErrors};
use serde_json::json;
use thiserror::Error;

/// An error returned by an API handler.
#[derive(Debug, Error)]
pub enum ApiError {
  #[error("validation failed: {0}")]
  Validation(ValidationErrors),

  #[error("not found: {0}")]
  NotFound(String),

  #[error("bad request: {0}")]
  BadRequest(String),

  #[error("missing x-user-id header")]
  Unauthorized,

  #[error("forbidden: {0}")]
  Forbidden(String),

  #[error("conflict: {0}")]
  Conflict(String),

  #[error("store error: {0}")]
  Store(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl ApiError {
  /// Classify a backend error by the domain failure it carries, if any.
  pub fn store<E>(e: E) -> Self
  where
    E: std::error::Error + AsCoreError + Send + Sync + 'static,
  {
    use bookshare_core::Error as Core;
    match e.as_core() {
      Some(Core::Validation(v)) => Self::Validation(v.clone()),
      Some(Core::NotFound { kind, id }) => Self::NotFound(format!("{kind} {id} not found")),
      Some(Core::Conflict(m)) => Self::Conflict(m.clone()),
      Some(Core::Forbidden(m)) => Self::Forbidden(m.clone()),
      _ => Self::Store(Box::new(e)),
    }
  }
}

impl From<ValidationErrors> for ApiError {
  fn from(e: ValidationErrors) -> Self { Self::Validation(e) }
}

impl IntoResponse for ApiError {
  fn into_response(self) -> Response {
    let status = match &self {
      ApiError::Validation(errors) => {
        let body = json!({ "error": self.to_string(), "fields": errors });
        return (StatusCode::UNPROCESSABLE_ENTITY, Json(body)).into_response();
      }
      ApiError::NotFound(_) => StatusCode::NOT_FOUND,
      ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
      ApiError::Unauthorized => StatusCode::UNAUTHORIZED,
      ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
      ApiError::Conflict(_) => StatusCode::CONFLICT,
      ApiError::Store(e) => {
        tracing::error!(error = %e, "store error");
        StatusCode::INTERNAL_SERVER_ERROR
      }
    };
    (status, Json(json!({ "error": self.to_string() }))).into_response()
  }
}
