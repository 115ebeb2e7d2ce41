//! Handlers for `/history` and `/users/{id}/timeline`.
//!
//! Access follows ownership: a caller may read, compare and restore the
//! history of entities they own. Staff may do so for any entity; genres,
//! which have no owner, are staff-only.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `GET`  | `/history/{kind}/{id}` | `?limit=` |
//! | `GET`  | `/history/{kind}/{id}/compare` | `?v1=&v2=` |
//! | `POST` | `/history/{kind}/{id}/restore` | Body `{"history_id":N}` |
//! | `GET`  | `/history/{kind}/recent` | Staff only; `?days=` `&limit=` |
//! | `GET`  | `/users/{id}/timeline` | Self or staff; `?days=` |

use std::sync::Arc;

use axum::{
  Json,
  extract::{Path, Query, State},
};
use bookshare_core::{
  activity::{ActionKind, NewActivity, window_start},
  entity::{EntityKind, EntityRef},
  history::{HistoricalRecord, VersionDiff},
  store::Backend,
};
use chrono::Utc;
use serde::Deserialize;
use uuid::Uuid;

use crate::{
  activity::{DEFAULT_WINDOW_DAYS, log},
  context::{Caller, RequestMeta},
  error::ApiError,
};

pub const DEFAULT_RECENT_LIMIT: usize = 50;

/// Check that `caller` may see `entity`'s history, judging ownership by its
/// most recent record.
async fn authorize<S: Backend>(
  store: &S,
  entity: EntityRef,
  caller: &Caller,
) -> Result<(), ApiError> {
  if caller.staff {
    return Ok(());
  }
  let latest = store.history(entity, Some(1)).await.map_err(ApiError::store)?;
  match latest.first() {
    None => Err(ApiError::NotFound(format!("no history for {} {}", entity.kind, entity.id))),
    Some(record) if record.owner_id == Some(caller.id()) => Ok(()),
    Some(_) => Err(ApiError::Forbidden("no access to this history".into())),
  }
}

fn restore_action(kind: EntityKind) -> Option<ActionKind> {
  match kind {
    EntityKind::Book => Some(ActionKind::UpdateBook),
    EntityKind::Review => Some(ActionKind::UpdateReview),
    EntityKind::Profile => Some(ActionKind::UpdateProfile),
    EntityKind::Genre | EntityKind::Message => None,
  }
}

// ─── Per entity ───────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct ListParams {
  pub limit: Option<usize>,
}

/// `GET /history/{kind}/{id}[?limit=N]`
pub async fn list<S: Backend>(
  State(store): State<Arc<S>>,
  Path((kind, id)): Path<(EntityKind, Uuid)>,
  caller: Caller,
  Query(params): Query<ListParams>,
) -> Result<Json<Vec<HistoricalRecord>>, ApiError> {
  let entity = EntityRef::new(kind, id);
  authorize(&*store, entity, &caller).await?;
  let records = store.history(entity, params.limit).await.map_err(ApiError::store)?;
  Ok(Json(records))
}

#[derive(Debug, Deserialize)]
pub struct CompareParams {
  pub v1: i64,
  pub v2: i64,
}

/// `GET /history/{kind}/{id}/compare?v1=A&v2=B`
pub async fn compare<S: Backend>(
  State(store): State<Arc<S>>,
  Path((kind, id)): Path<(EntityKind, Uuid)>,
  caller: Caller,
  Query(params): Query<CompareParams>,
) -> Result<Json<VersionDiff>, ApiError> {
  let entity = EntityRef::new(kind, id);
  authorize(&*store, entity, &caller).await?;
  let diff = store
    .compare_versions(entity, params.v1, params.v2)
    .await
    .map_err(ApiError::store)?
    .ok_or_else(|| {
      ApiError::NotFound(format!("versions {} and {} not both found", params.v1, params.v2))
    })?;
  Ok(Json(diff))
}

#[derive(Debug, Deserialize)]
pub struct RestoreBody {
  pub history_id: i64,
  pub reason:     Option<String>,
}

/// `POST /history/{kind}/{id}/restore`
pub async fn restore<S: Backend>(
  State(store): State<Arc<S>>,
  Path((kind, id)): Path<(EntityKind, Uuid)>,
  caller: Caller,
  meta: RequestMeta,
  Json(body): Json<RestoreBody>,
) -> Result<Json<HistoricalRecord>, ApiError> {
  let entity = EntityRef::new(kind, id);
  authorize(&*store, entity, &caller).await?;
  let record = store
    .restore(entity, body.history_id, meta.change(&caller, body.reason))
    .await
    .map_err(ApiError::store)?
    .ok_or_else(|| ApiError::NotFound(format!("version {} not found", body.history_id)))?;

  if let Some(action) = restore_action(kind) {
    log(
      &*store,
      NewActivity::new(caller.id(), action)
        .target(kind, id)
        .describe(format!("restored version {}", body.history_id))
        .client(Some(meta.client)),
    )
    .await;
  }
  Ok(Json(record))
}

// ─── Across entities ──────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct WindowParams {
  pub days:  Option<u32>,
  pub limit: Option<usize>,
}

/// `GET /history/{kind}/recent[?days=N&limit=M]`. Staff only.
pub async fn recent<S: Backend>(
  State(store): State<Arc<S>>,
  Path(kind): Path<EntityKind>,
  caller: Caller,
  Query(params): Query<WindowParams>,
) -> Result<Json<Vec<HistoricalRecord>>, ApiError> {
  if !caller.staff {
    return Err(ApiError::Forbidden("recent changes are staff-only".into()));
  }
  let since = window_start(Utc::now(), params.days.unwrap_or(DEFAULT_WINDOW_DAYS))?;
  let records = store
    .recent_changes(kind, since, params.limit.unwrap_or(DEFAULT_RECENT_LIMIT))
    .await
    .map_err(ApiError::store)?;
  Ok(Json(records))
}

/// `GET /users/{id}/timeline[?days=N]`
pub async fn timeline<S: Backend>(
  State(store): State<Arc<S>>,
  Path(user_id): Path<Uuid>,
  caller: Caller,
  Query(params): Query<WindowParams>,
) -> Result<Json<Vec<HistoricalRecord>>, ApiError> {
  if !caller.can_view(user_id) {
    return Err(ApiError::Forbidden("no access to this user's timeline".into()));
  }
  let since = window_start(Utc::now(), params.days.unwrap_or(DEFAULT_WINDOW_DAYS))?;
  let records = store.user_timeline(user_id, since).await.map_err(ApiError::store)?;
  Ok(Json(records))
}
