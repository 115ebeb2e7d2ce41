//! Handlers for `/genres`. Genres are shared catalogue data: anyone may list
//! them, only staff may change them. Changes are versioned but not logged as
//! user activity.

use std::sync::Arc;

use axum::{
  Json,
  extract::{Path, State},
  http::StatusCode,
  response::IntoResponse,
};
use bookshare_core::{
  entity::{Genre, NewGenre},
  store::Backend,
};
use serde::Deserialize;
use uuid::Uuid;

use crate::{
  context::{Caller, RequestMeta},
  error::ApiError,
};

#[derive(Debug, Deserialize)]
pub struct GenreBody {
  pub name:   String,
  pub reason: Option<String>,
}

fn require_staff(caller: &Caller) -> Result<(), ApiError> {
  if caller.staff {
    Ok(())
  } else {
    Err(ApiError::Forbidden("genres are managed by staff".into()))
  }
}

/// `GET /genres`
pub async fn list<S: Backend>(
  State(store): State<Arc<S>>,
) -> Result<Json<Vec<Genre>>, ApiError> {
  Ok(Json(store.list_genres().await.map_err(ApiError::store)?))
}

/// `POST /genres`
pub async fn create<S: Backend>(
  State(store): State<Arc<S>>,
  caller: Caller,
  meta: RequestMeta,
  Json(body): Json<GenreBody>,
) -> Result<impl IntoResponse, ApiError> {
  require_staff(&caller)?;
  let genre = store
    .create_genre(NewGenre { name: body.name }, meta.change(&caller, body.reason))
    .await
    .map_err(ApiError::store)?;
  Ok((StatusCode::CREATED, Json(genre)))
}

/// `PATCH /genres/{id}`
pub async fn rename<S: Backend>(
  State(store): State<Arc<S>>,
  Path(id): Path<Uuid>,
  caller: Caller,
  meta: RequestMeta,
  Json(body): Json<GenreBody>,
) -> Result<Json<Genre>, ApiError> {
  require_staff(&caller)?;
  let genre = store
    .rename_genre(id, body.name, meta.change(&caller, body.reason))
    .await
    .map_err(ApiError::store)?;
  Ok(Json(genre))
}

/// `DELETE /genres/{id}`
pub async fn delete_one<S: Backend>(
  State(store): State<Arc<S>>,
  Path(id): Path<Uuid>,
  caller: Caller,
  meta: RequestMeta,
) -> Result<StatusCode, ApiError> {
  require_staff(&caller)?;
  store.delete_genre(id, meta.change(&caller, None)).await.map_err(ApiError::store)?;
  Ok(StatusCode::NO_CONTENT)
}
