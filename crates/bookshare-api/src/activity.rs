//! Activity logging helper and the `/activity` endpoints.

use std::sync::Arc;

use axum::{
  Json,
  extract::{Path, Query, State},
  http::StatusCode,
  response::IntoResponse,
};
use bookshare_core::{
  activity::{
    ActionKind, ActivityRecord, ActivitySummary, NewActivity, SystemActivityStats, check_window,
    window_start,
  },
  entity::EntityKind,
  store::{ActivityLog, Backend},
  validate::ValidationErrors,
};
use chrono::Utc;
use serde::Deserialize;
use uuid::Uuid;

use crate::{
  context::{Caller, RequestMeta},
  error::ApiError,
};

pub const DEFAULT_WINDOW_DAYS: u32 = 30;
pub const DEFAULT_ACTIVITY_LIMIT: usize = 50;

/// Record an action after the domain write it describes has committed.
///
/// The write already succeeded, so a failure here is logged and the request
/// still succeeds.
pub async fn log<S: ActivityLog>(store: &S, activity: NewActivity) {
  let action = activity.action;
  if let Err(e) = store.record_activity(activity).await {
    tracing::error!(%action, error = %e, "failed to record activity");
  }
}

#[derive(Debug, Deserialize)]
pub struct LimitParams {
  pub limit: Option<usize>,
}

/// `GET /activity/me[?limit=N]`
pub async fn mine<S: Backend>(
  State(store): State<Arc<S>>,
  caller: Caller,
  Query(params): Query<LimitParams>,
) -> Result<Json<Vec<ActivityRecord>>, ApiError> {
  let records = store
    .activities_for(caller.id(), params.limit.unwrap_or(DEFAULT_ACTIVITY_LIMIT))
    .await
    .map_err(ApiError::store)?;
  Ok(Json(records))
}

/// `GET /users/{id}/activity[?limit=N]`. The user themself or staff.
pub async fn for_user<S: Backend>(
  State(store): State<Arc<S>>,
  Path(user_id): Path<Uuid>,
  caller: Caller,
  Query(params): Query<LimitParams>,
) -> Result<Json<Vec<ActivityRecord>>, ApiError> {
  if !caller.can_view(user_id) {
    return Err(ApiError::Forbidden("no access to this user's activity".into()));
  }
  let records = store
    .activities_for(user_id, params.limit.unwrap_or(DEFAULT_ACTIVITY_LIMIT))
    .await
    .map_err(ApiError::store)?;
  Ok(Json(records))
}

#[derive(Debug, Deserialize)]
pub struct WindowParams {
  pub days: Option<u32>,
}

/// `GET /activity/summary[?days=N]`. The caller's own action counts.
pub async fn summary<S: Backend>(
  State(store): State<Arc<S>>,
  caller: Caller,
  Query(params): Query<WindowParams>,
) -> Result<Json<ActivitySummary>, ApiError> {
  let since = window_start(Utc::now(), params.days.unwrap_or(DEFAULT_WINDOW_DAYS))?;
  let summary = store.activity_summary(caller.id(), since).await.map_err(ApiError::store)?;
  Ok(Json(summary))
}

/// `GET /activity/stats[?days=N]`. Staff only.
pub async fn system_stats<S: Backend>(
  State(store): State<Arc<S>>,
  caller: Caller,
  Query(params): Query<WindowParams>,
) -> Result<Json<SystemActivityStats>, ApiError> {
  if !caller.staff {
    return Err(ApiError::Forbidden("system activity is staff-only".into()));
  }
  let days = params.days.unwrap_or(DEFAULT_WINDOW_DAYS);
  check_window(days)?;
  let stats = store.system_activity_stats(days, Utc::now()).await.map_err(ApiError::store)?;
  Ok(Json(stats))
}

// ─── Client-reported actions ──────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct ReportBody {
  pub action:      ActionKind,
  pub target_type: Option<EntityKind>,
  pub target_id:   Option<Uuid>,
  pub description: Option<String>,
}

/// `POST /activity`. Accepts only the actions that happen outside this
/// service (`login`, `logout`); everything else is recorded by the handler
/// that performs it.
pub async fn report<S: Backend>(
  State(store): State<Arc<S>>,
  caller: Caller,
  meta: RequestMeta,
  Json(body): Json<ReportBody>,
) -> Result<impl IntoResponse, ApiError> {
  if !matches!(body.action, ActionKind::Login | ActionKind::Logout) {
    let mut errors = ValidationErrors::default();
    errors.push("action", format!("{} is recorded by the server", body.action));
    return Err(errors.into());
  }

  let mut activity = NewActivity::new(caller.id(), body.action).client(Some(meta.client));
  if let (Some(kind), Some(id)) = (body.target_type, body.target_id) {
    activity = activity.target(kind, id);
  }
  if let Some(description) = body.description {
    activity = activity.describe(description);
  }
  let record = store.record_activity(activity).await.map_err(ApiError::store)?;
  Ok((StatusCode::CREATED, Json(record)))
}
