//! Read-side statistics. Everything here is a pure function of rows the
//! store hands in; nothing is cached or persisted.

use std::cmp::Ordering;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub const TRENDING_WINDOW_DAYS: i64 = 30;
pub const TRENDING_MIN_RATING: f64 = 4.0;
pub const TRENDING_LIMIT: usize = 10;
pub const POPULAR_GENRES_LIMIT: usize = 10;

/// Mean of `sum / count`, or exactly `0.0` when there is nothing to average.
pub fn average(sum: u64, count: u64) -> f64 {
  if count == 0 { 0.0 } else { sum as f64 / count as f64 }
}

/// Per-book review aggregate used for ranking.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BookRating {
  pub book_id:        Uuid,
  pub title:          String,
  pub author:         String,
  pub created_at:     DateTime<Utc>,
  pub review_count:   u64,
  pub average_rating: f64,
}

impl BookRating {
  pub fn new(
    book_id: Uuid,
    title: String,
    author: String,
    created_at: DateTime<Utc>,
    review_count: u64,
    rating_sum: u64,
  ) -> Self {
    Self {
      book_id,
      title,
      author,
      created_at,
      review_count,
      average_rating: average(rating_sum, review_count),
    }
  }
}

/// Ranking order: average rating desc, review count desc, then newest first
/// and lowest id so the result is total.
fn ranking(a: &BookRating, b: &BookRating) -> Ordering {
  b.average_rating
    .total_cmp(&a.average_rating)
    .then_with(|| b.review_count.cmp(&a.review_count))
    .then_with(|| b.created_at.cmp(&a.created_at))
    .then_with(|| a.book_id.cmp(&b.book_id))
}

/// Books with at least one review, ranked, optionally truncated.
pub fn popular(mut books: Vec<BookRating>, limit: Option<usize>) -> Vec<BookRating> {
  books.retain(|b| b.review_count > 0);
  books.sort_by(ranking);
  if let Some(limit) = limit {
    books.truncate(limit);
  }
  books
}

/// Books created in the trailing window whose average is at least
/// [`TRENDING_MIN_RATING`], ranked and capped at [`TRENDING_LIMIT`].
pub fn trending(mut books: Vec<BookRating>, now: DateTime<Utc>) -> Vec<BookRating> {
  let since = now - Duration::days(TRENDING_WINDOW_DAYS);
  books.retain(|b| {
    b.created_at >= since && b.review_count > 0 && b.average_rating >= TRENDING_MIN_RATING
  });
  books.sort_by(ranking);
  books.truncate(TRENDING_LIMIT);
  books
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenreCount {
  pub genre_id:   Uuid,
  pub name:       String,
  pub book_count: u64,
}

fn genre_order(a: &GenreCount, b: &GenreCount) -> Ordering {
  b.book_count.cmp(&a.book_count).then_with(|| a.name.cmp(&b.name))
}

/// The genre with the most books; ties go to the alphabetically lowest name.
/// `None` only when there are no genres at all.
pub fn most_popular_genre(genres: &[GenreCount]) -> Option<GenreCount> {
  genres.iter().min_by(|a, b| genre_order(a, b)).cloned()
}

/// Genres with at least one book, most used first.
pub fn popular_genres(mut genres: Vec<GenreCount>) -> Vec<GenreCount> {
  genres.retain(|g| g.book_count > 0);
  genres.sort_by(genre_order);
  genres.truncate(POPULAR_GENRES_LIMIT);
  genres
}

/// Catalogue-wide totals.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogStatistics {
  pub total_books:        u64,
  pub total_reviews:      u64,
  pub total_genres:       u64,
  pub total_messages:     u64,
  pub total_profiles:     u64,
  pub books_with_files:   u64,
  /// Mean over every review; `0.0` when there are none.
  pub average_rating:     f64,
  pub most_popular_genre: Option<GenreCount>,
}
