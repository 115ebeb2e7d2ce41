//! Handlers for `/profiles`.

use std::sync::Arc;

use axum::{
  Json,
  extract::{Path, State},
};
use bookshare_core::{
  activity::{ActionKind, NewActivity},
  entity::{EntityKind, Profile, ProfilePatch},
  store::Backend,
};
use serde::Deserialize;
use uuid::Uuid;

use crate::{
  activity::log,
  context::{Caller, RequestMeta},
  error::ApiError,
};

/// `GET /profiles/me`. A user who never saved a profile gets a 404.
pub async fn me<S: Backend>(
  State(store): State<Arc<S>>,
  caller: Caller,
) -> Result<Json<Profile>, ApiError> {
  get_one(State(store), Path(caller.id())).await
}

/// `GET /profiles/{user_id}`
pub async fn get_one<S: Backend>(
  State(store): State<Arc<S>>,
  Path(user_id): Path<Uuid>,
) -> Result<Json<Profile>, ApiError> {
  let profile = store
    .get_profile(user_id)
    .await
    .map_err(ApiError::store)?
    .ok_or_else(|| ApiError::NotFound(format!("no profile for user {user_id}")))?;
  Ok(Json(profile))
}

#[derive(Debug, Deserialize)]
pub struct UpdateBody {
  #[serde(flatten)]
  pub patch:  ProfilePatch,
  pub reason: Option<String>,
}

/// `PATCH /profiles/me`. Creates the profile on first use.
pub async fn update_me<S: Backend>(
  State(store): State<Arc<S>>,
  caller: Caller,
  meta: RequestMeta,
  Json(body): Json<UpdateBody>,
) -> Result<Json<Profile>, ApiError> {
  let profile = store
    .upsert_profile(caller.id(), body.patch, meta.change(&caller, body.reason))
    .await
    .map_err(ApiError::store)?;

  log(
    &*store,
    NewActivity::new(caller.id(), ActionKind::UpdateProfile)
      .target(EntityKind::Profile, profile.profile_id)
      .client(Some(meta.client)),
  )
  .await;
  Ok(Json(profile))
}
