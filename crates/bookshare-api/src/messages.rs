//! Handlers for `/messages`. Every route is scoped to the caller: a message
//! is only visible to its sender and recipient.

use std::sync::Arc;

use axum::{
  Json,
  extract::{Path, State},
  http::StatusCode,
  response::IntoResponse,
};
use bookshare_core::{
  activity::{ActionKind, NewActivity},
  entity::{EntityKind, Message, NewMessage},
  store::Backend,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
  activity::log,
  context::{Caller, RequestMeta},
  error::ApiError,
};

#[derive(Debug, Deserialize)]
pub struct SendBody {
  pub recipient_id: Uuid,
  pub book_id:      Uuid,
  pub subject:      String,
  pub body:         String,
  pub reason:       Option<String>,
}

/// `POST /messages`
pub async fn send<S: Backend>(
  State(store): State<Arc<S>>,
  caller: Caller,
  meta: RequestMeta,
  Json(body): Json<SendBody>,
) -> Result<impl IntoResponse, ApiError> {
  let input = NewMessage {
    sender_id:    caller.id(),
    recipient_id: body.recipient_id,
    book_id:      body.book_id,
    subject:      body.subject,
    body:         body.body,
  };
  let message = store
    .send_message(input, meta.change(&caller, body.reason))
    .await
    .map_err(ApiError::store)?;

  log(
    &*store,
    NewActivity::new(caller.id(), ActionKind::SendMessage)
      .target(EntityKind::Message, message.message_id)
      .describe(format!("wrote to {} about book {}", message.recipient_id, message.book_id))
      .client(Some(meta.client)),
  )
  .await;
  Ok((StatusCode::CREATED, Json(message)))
}

/// `GET /messages/inbox`
pub async fn inbox<S: Backend>(
  State(store): State<Arc<S>>,
  caller: Caller,
) -> Result<Json<Vec<Message>>, ApiError> {
  Ok(Json(store.inbox(caller.id()).await.map_err(ApiError::store)?))
}

/// `GET /messages/sent`
pub async fn sent<S: Backend>(
  State(store): State<Arc<S>>,
  caller: Caller,
) -> Result<Json<Vec<Message>>, ApiError> {
  Ok(Json(store.sent(caller.id()).await.map_err(ApiError::store)?))
}

#[derive(Debug, Serialize)]
pub struct UnreadCount {
  pub unread_count: u64,
}

/// `GET /messages/unread_count`
pub async fn unread_count<S: Backend>(
  State(store): State<Arc<S>>,
  caller: Caller,
) -> Result<Json<UnreadCount>, ApiError> {
  let unread_count = store.unread_count(caller.id()).await.map_err(ApiError::store)?;
  Ok(Json(UnreadCount { unread_count }))
}

/// `GET /messages/{id}`. A message the caller neither sent nor received is
/// reported as missing.
pub async fn get_one<S: Backend>(
  State(store): State<Arc<S>>,
  Path(id): Path<Uuid>,
  caller: Caller,
) -> Result<Json<Message>, ApiError> {
  store
    .get_message(id)
    .await
    .map_err(ApiError::store)?
    .filter(|m| m.sender_id == caller.id() || m.recipient_id == caller.id())
    .map(Json)
    .ok_or_else(|| ApiError::NotFound(format!("message {id} not found")))
}

/// `POST /messages/{id}/read`. Recipient only.
pub async fn mark_read<S: Backend>(
  State(store): State<Arc<S>>,
  Path(id): Path<Uuid>,
  caller: Caller,
  meta: RequestMeta,
) -> Result<Json<Message>, ApiError> {
  let message = store
    .mark_message_read(id, caller.id(), meta.change(&caller, None))
    .await
    .map_err(ApiError::store)?;

  log(
    &*store,
    NewActivity::new(caller.id(), ActionKind::ReadMessage)
      .target(EntityKind::Message, id)
      .client(Some(meta.client)),
  )
  .await;
  Ok(Json(message))
}
