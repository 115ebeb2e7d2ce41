//! Read-only statistics endpoints under `/stats`.

use std::sync::Arc;

use axum::{
  Json,
  extract::{Query, State},
};
use bookshare_core::{
  stats::{BookRating, CatalogStatistics, GenreCount},
  store::Backend,
};
use chrono::Utc;
use serde::Deserialize;

use crate::error::ApiError;

pub const DEFAULT_POPULAR_LIMIT: usize = 10;

/// `GET /stats`
pub async fn catalog<S: Backend>(
  State(store): State<Arc<S>>,
) -> Result<Json<CatalogStatistics>, ApiError> {
  Ok(Json(store.catalog_statistics().await.map_err(ApiError::store)?))
}

#[derive(Debug, Deserialize)]
pub struct PopularParams {
  pub limit: Option<usize>,
}

/// `GET /stats/popular[?limit=N]`
pub async fn popular<S: Backend>(
  State(store): State<Arc<S>>,
  Query(params): Query<PopularParams>,
) -> Result<Json<Vec<BookRating>>, ApiError> {
  let limit = params.limit.unwrap_or(DEFAULT_POPULAR_LIMIT);
  Ok(Json(store.popular_books(Some(limit)).await.map_err(ApiError::store)?))
}

/// `GET /stats/trending`
pub async fn trending<S: Backend>(
  State(store): State<Arc<S>>,
) -> Result<Json<Vec<BookRating>>, ApiError> {
  Ok(Json(store.trending_books(Utc::now()).await.map_err(ApiError::store)?))
}

/// `GET /stats/genres`
pub async fn genres<S: Backend>(
  State(store): State<Arc<S>>,
) -> Result<Json<Vec<GenreCount>>, ApiError> {
  Ok(Json(store.popular_genres().await.map_err(ApiError::store)?))
}
