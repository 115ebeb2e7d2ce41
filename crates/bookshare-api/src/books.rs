//! Handlers for `/books` endpoints.
//!
//! | Method   | Path | Notes |
//! |----------|------|-------|
//! | `GET`    | `/books` | Optional `?owner=<uuid>` |
//! | `POST`   | `/books` | Owner is the caller |
//! | `GET`    | `/books/{id}` | Includes the current average rating |
//! | `PATCH`  | `/books/{id}` | Owner only |
//! | `DELETE` | `/books/{id}` | Owner only; removes reviews and messages |
//! | `PUT`    | `/books/{id}/genres` | Owner only; body `{"genre_ids":[..]}` |
//! | `GET`    | `/books/{id}/history` | Owner or staff; `?limit=` (default 20) |
//! | `POST`   | `/books/{id}/favorite` | Logs `toggle_favorite` |

use std::sync::Arc;

use axum::{
  Json,
  extract::{Path, Query, State},
  http::StatusCode,
  response::IntoResponse,
};
use bookshare_core::{
  activity::{ActionKind, NewActivity},
  entity::{Book, BookPatch, EntityKind, EntityRef, NewBook},
  history::HistoricalRecord,
  store::Backend,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
  activity::log,
  context::{Caller, RequestMeta},
  error::ApiError,
};

pub const DEFAULT_HISTORY_LIMIT: usize = 20;

/// Load a book and check that `caller` owns it.
pub(crate) async fn owned_book<S: Backend>(
  store: &S,
  id: Uuid,
  caller: &Caller,
) -> Result<Book, ApiError> {
  let book = store
    .get_book(id)
    .await
    .map_err(ApiError::store)?
    .ok_or_else(|| ApiError::NotFound(format!("book {id} not found")))?;
  if book.owner_id != caller.id() {
    return Err(ApiError::Forbidden("only the owner can change this book".into()));
  }
  Ok(book)
}

// ─── List ─────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct ListParams {
  pub owner: Option<Uuid>,
}

/// `GET /books[?owner=<uuid>]`
pub async fn list<S: Backend>(
  State(store): State<Arc<S>>,
  Query(params): Query<ListParams>,
) -> Result<Json<Vec<Book>>, ApiError> {
  let books = store.list_books(params.owner).await.map_err(ApiError::store)?;
  Ok(Json(books))
}

// ─── Create ───────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct CreateBody {
  pub title:       String,
  pub author:      String,
  #[serde(default)]
  pub description: String,
  pub cover_image: Option<String>,
  pub book_file:   Option<String>,
  #[serde(default)]
  pub genre_ids:   Vec<Uuid>,
  pub reason:      Option<String>,
}

/// `POST /books`
pub async fn create<S: Backend>(
  State(store): State<Arc<S>>,
  caller: Caller,
  meta: RequestMeta,
  Json(body): Json<CreateBody>,
) -> Result<impl IntoResponse, ApiError> {
  let input = NewBook {
    title:       body.title,
    author:      body.author,
    description: body.description,
    cover_image: body.cover_image,
    book_file:   body.book_file,
    owner_id:    caller.id(),
    genre_ids:   body.genre_ids,
  };
  let book = store
    .create_book(input, meta.change(&caller, body.reason))
    .await
    .map_err(ApiError::store)?;

  log(
    &*store,
    NewActivity::new(caller.id(), ActionKind::CreateBook)
      .target(EntityKind::Book, book.book_id)
      .describe(format!("added book {:?}", book.title))
      .client(Some(meta.client)),
  )
  .await;
  Ok((StatusCode::CREATED, Json(book)))
}

// ─── Get one ──────────────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
pub struct BookDetail {
  #[serde(flatten)]
  pub book:           Book,
  pub average_rating: f64,
}

/// `GET /books/{id}`
pub async fn get_one<S: Backend>(
  State(store): State<Arc<S>>,
  Path(id): Path<Uuid>,
) -> Result<Json<BookDetail>, ApiError> {
  let book = store
    .get_book(id)
    .await
    .map_err(ApiError::store)?
    .ok_or_else(|| ApiError::NotFound(format!("book {id} not found")))?;
  let average_rating = store.average_rating(id).await.map_err(ApiError::store)?;
  Ok(Json(BookDetail { book, average_rating }))
}

// ─── Update ───────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct UpdateBody {
  #[serde(flatten)]
  pub patch:  BookPatch,
  pub reason: Option<String>,
}

/// `PATCH /books/{id}`
pub async fn update<S: Backend>(
  State(store): State<Arc<S>>,
  Path(id): Path<Uuid>,
  caller: Caller,
  meta: RequestMeta,
  Json(body): Json<UpdateBody>,
) -> Result<Json<Book>, ApiError> {
  owned_book(&*store, id, &caller).await?;
  let book = store
    .update_book(id, body.patch, meta.change(&caller, body.reason))
    .await
    .map_err(ApiError::store)?;

  log(
    &*store,
    NewActivity::new(caller.id(), ActionKind::UpdateBook)
      .target(EntityKind::Book, id)
      .describe(format!("edited book {:?}", book.title))
      .client(Some(meta.client)),
  )
  .await;
  Ok(Json(book))
}

#[derive(Debug, Deserialize)]
pub struct GenresBody {
  pub genre_ids: Vec<Uuid>,
  pub reason:    Option<String>,
}

/// `PUT /books/{id}/genres`
pub async fn set_genres<S: Backend>(
  State(store): State<Arc<S>>,
  Path(id): Path<Uuid>,
  caller: Caller,
  meta: RequestMeta,
  Json(body): Json<GenresBody>,
) -> Result<Json<Book>, ApiError> {
  owned_book(&*store, id, &caller).await?;
  let book = store
    .set_book_genres(id, body.genre_ids, meta.change(&caller, body.reason))
    .await
    .map_err(ApiError::store)?;

  log(
    &*store,
    NewActivity::new(caller.id(), ActionKind::UpdateBook)
      .target(EntityKind::Book, id)
      .describe(format!("changed genres of {:?}", book.title))
      .client(Some(meta.client)),
  )
  .await;
  Ok(Json(book))
}

// ─── Delete ───────────────────────────────────────────────────────────────────

/// `DELETE /books/{id}`
pub async fn delete_one<S: Backend>(
  State(store): State<Arc<S>>,
  Path(id): Path<Uuid>,
  caller: Caller,
  meta: RequestMeta,
) -> Result<StatusCode, ApiError> {
  owned_book(&*store, id, &caller).await?;
  let book = store
    .delete_book(id, meta.change(&caller, None))
    .await
    .map_err(ApiError::store)?;

  log(
    &*store,
    NewActivity::new(caller.id(), ActionKind::DeleteBook)
      .target(EntityKind::Book, id)
      .describe(format!("deleted book {:?}", book.title))
      .client(Some(meta.client)),
  )
  .await;
  Ok(StatusCode::NO_CONTENT)
}

// ─── History ──────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct HistoryParams {
  pub limit: Option<usize>,
}

/// `GET /books/{id}/history[?limit=N]`
pub async fn history<S: Backend>(
  State(store): State<Arc<S>>,
  Path(id): Path<Uuid>,
  caller: Caller,
  Query(params): Query<HistoryParams>,
) -> Result<Json<Vec<HistoricalRecord>>, ApiError> {
  let book = store
    .get_book(id)
    .await
    .map_err(ApiError::store)?
    .ok_or_else(|| ApiError::NotFound(format!("book {id} not found")))?;
  if !caller.can_view(book.owner_id) {
    return Err(ApiError::Forbidden("no access to this book's history".into()));
  }

  let limit = params.limit.unwrap_or(DEFAULT_HISTORY_LIMIT);
  let records = store
    .history(EntityRef::new(EntityKind::Book, id), Some(limit))
    .await
    .map_err(ApiError::store)?;
  Ok(Json(records))
}

// ─── Favorite ─────────────────────────────────────────────────────────────────

/// `POST /books/{id}/favorite`. Favorites themselves live with the client;
/// the server only records the action.
pub async fn toggle_favorite<S: Backend>(
  State(store): State<Arc<S>>,
  Path(id): Path<Uuid>,
  caller: Caller,
  meta: RequestMeta,
) -> Result<StatusCode, ApiError> {
  let book = store
    .get_book(id)
    .await
    .map_err(ApiError::store)?
    .ok_or_else(|| ApiError::NotFound(format!("book {id} not found")))?;

  log(
    &*store,
    NewActivity::new(caller.id(), ActionKind::ToggleFavorite)
      .target(EntityKind::Book, id)
      .describe(format!("toggled favorite on {:?}", book.title))
      .client(Some(meta.client)),
  )
  .await;
  Ok(StatusCode::NO_CONTENT)
}
