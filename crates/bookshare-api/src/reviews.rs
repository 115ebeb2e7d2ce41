//! Handlers for reviews: `/books/{id}/reviews` and `/reviews/{id}`.

use std::sync::Arc;

use axum::{
  Json,
  extract::{Path, State},
  http::StatusCode,
  response::IntoResponse,
};
use bookshare_core::{
  activity::{ActionKind, NewActivity},
  entity::{EntityKind, NewReview, Review, ReviewPatch},
  store::Backend,
};
use serde::Deserialize;
use uuid::Uuid;

use crate::{
  activity::log,
  context::{Caller, RequestMeta},
  error::ApiError,
};

async fn authored_review<S: Backend>(
  store: &S,
  id: Uuid,
  caller: &Caller,
) -> Result<Review, ApiError> {
  let review = store
    .get_review(id)
    .await
    .map_err(ApiError::store)?
    .ok_or_else(|| ApiError::NotFound(format!("review {id} not found")))?;
  if review.user_id != caller.id() {
    return Err(ApiError::Forbidden("only the author can change this review".into()));
  }
  Ok(review)
}

/// `GET /books/{id}/reviews`
pub async fn list_for_book<S: Backend>(
  State(store): State<Arc<S>>,
  Path(book_id): Path<Uuid>,
) -> Result<Json<Vec<Review>>, ApiError> {
  let reviews = store.reviews_for_book(book_id).await.map_err(ApiError::store)?;
  Ok(Json(reviews))
}

#[derive(Debug, Deserialize)]
pub struct CreateBody {
  pub text:   String,
  pub rating: u8,
  pub reason: Option<String>,
}

/// `POST /books/{id}/reviews`
pub async fn create<S: Backend>(
  State(store): State<Arc<S>>,
  Path(book_id): Path<Uuid>,
  caller: Caller,
  meta: RequestMeta,
  Json(body): Json<CreateBody>,
) -> Result<impl IntoResponse, ApiError> {
  let input = NewReview { book_id, user_id: caller.id(), text: body.text, rating: body.rating };
  let review = store
    .create_review(input, meta.change(&caller, body.reason))
    .await
    .map_err(ApiError::store)?;

  log(
    &*store,
    NewActivity::new(caller.id(), ActionKind::CreateReview)
      .target(EntityKind::Review, review.review_id)
      .describe(format!("rated book {book_id} {}/5", review.rating))
      .client(Some(meta.client)),
  )
  .await;
  Ok((StatusCode::CREATED, Json(review)))
}

/// `GET /reviews/{id}`
pub async fn get_one<S: Backend>(
  State(store): State<Arc<S>>,
  Path(id): Path<Uuid>,
) -> Result<Json<Review>, ApiError> {
  let review = store
    .get_review(id)
    .await
    .map_err(ApiError::store)?
    .ok_or_else(|| ApiError::NotFound(format!("review {id} not found")))?;
  Ok(Json(review))
}

#[derive(Debug, Deserialize)]
pub struct UpdateBody {
  #[serde(flatten)]
  pub patch:  ReviewPatch,
  pub reason: Option<String>,
}

/// `PATCH /reviews/{id}`. Author only.
pub async fn update<S: Backend>(
  State(store): State<Arc<S>>,
  Path(id): Path<Uuid>,
  caller: Caller,
  meta: RequestMeta,
  Json(body): Json<UpdateBody>,
) -> Result<Json<Review>, ApiError> {
  authored_review(&*store, id, &caller).await?;
  let review = store
    .update_review(id, body.patch, meta.change(&caller, body.reason))
    .await
    .map_err(ApiError::store)?;

  log(
    &*store,
    NewActivity::new(caller.id(), ActionKind::UpdateReview)
      .target(EntityKind::Review, id)
      .client(Some(meta.client)),
  )
  .await;
  Ok(Json(review))
}

/// `DELETE /reviews/{id}`. Author only.
pub async fn delete_one<S: Backend>(
  State(store): State<Arc<S>>,
  Path(id): Path<Uuid>,
  caller: Caller,
  meta: RequestMeta,
) -> Result<StatusCode, ApiError> {
  authored_review(&*store, id, &caller).await?;
  store.delete_review(id, meta.change(&caller, None)).await.map_err(ApiError::store)?;

  log(
    &*store,
    NewActivity::new(caller.id(), ActionKind::DeleteReview)
      .target(EntityKind::Review, id)
      .client(Some(meta.client)),
  )
  .await;
  Ok(StatusCode::NO_CONTENT)
}
