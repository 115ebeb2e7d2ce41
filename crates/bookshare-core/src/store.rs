//! Store traits implemented by storage backends (e.g.
//! `bookshare-store-sqlite`).
//!
//! Higher layers (`bookshare-api`) depend on these abstractions, not on any
//! concrete backend. The acting user and change reason are always passed in
//! explicitly through [`ChangeContext`]; no store reads ambient request
//! state.
//!
//! All methods return `Send` futures so the traits can be used in
//! multi-threaded async runtimes (e.g. tokio with `axum`).

use std::future::Future;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::{
  activity::{ActivityRecord, ActivitySummary, NewActivity, SystemActivityStats},
  error::AsCoreError,
  entity::{
    Book, BookPatch, EntityKind, EntityRef, Genre, Message, NewBook, NewGenre,
    NewMessage, NewReview, Profile, ProfilePatch, Review, ReviewPatch,
  },
  history::{ChangeContext, HistoricalRecord, VersionDiff},
  stats::{self, BookRating, CatalogStatistics, GenreCount},
};

/// Shared error type for every store trait of one backend.
pub trait Store: Send + Sync {
  type Error: std::error::Error + AsCoreError + Send + Sync + 'static;
}

// ─── Entities ────────────────────────────────────────────────────────────────

/// Entity reads and writes. Every write appends exactly one history record
/// for the entity it touches, in the same transaction as the entity write
/// unless the backend is configured for best-effort history.
pub trait CatalogStore: Store {
  // ── Genres ────────────────────────────────────────────────────────────

  fn create_genre(
    &self,
    input: NewGenre,
    ctx: ChangeContext,
  ) -> impl Future<Output = Result<Genre, Self::Error>> + Send + '_;

  fn rename_genre(
    &self,
    id: Uuid,
    name: String,
    ctx: ChangeContext,
  ) -> impl Future<Output = Result<Genre, Self::Error>> + Send + '_;

  /// Delete a genre. Every book that carried it gets a `relation_changed`
  /// entry.
  fn delete_genre(
    &self,
    id: Uuid,
    ctx: ChangeContext,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  fn list_genres(&self) -> impl Future<Output = Result<Vec<Genre>, Self::Error>> + Send + '_;

  // ── Books ─────────────────────────────────────────────────────────────

  fn create_book(
    &self,
    input: NewBook,
    ctx: ChangeContext,
  ) -> impl Future<Output = Result<Book, Self::Error>> + Send + '_;

  /// Apply a partial update. A patch that only changes genres records a
  /// `relation_changed` entry; otherwise an `update` entry.
  fn update_book(
    &self,
    id: Uuid,
    patch: BookPatch,
    ctx: ChangeContext,
  ) -> impl Future<Output = Result<Book, Self::Error>> + Send + '_;

  fn set_book_genres(
    &self,
    id: Uuid,
    genre_ids: Vec<Uuid>,
    ctx: ChangeContext,
  ) -> impl Future<Output = Result<Book, Self::Error>> + Send + '_;

  /// Delete a book together with its reviews and messages. Each removed
  /// review and message gets its own `delete` entry.
  fn delete_book(
    &self,
    id: Uuid,
    ctx: ChangeContext,
  ) -> impl Future<Output = Result<Book, Self::Error>> + Send + '_;

  fn get_book(
    &self,
    id: Uuid,
  ) -> impl Future<Output = Result<Option<Book>, Self::Error>> + Send + '_;

  /// All books, newest first, optionally restricted to one owner.
  fn list_books(
    &self,
    owner: Option<Uuid>,
  ) -> impl Future<Output = Result<Vec<Book>, Self::Error>> + Send + '_;

  // ── Reviews ───────────────────────────────────────────────────────────

  /// Returns a conflict error if the user already reviewed the book.
  fn create_review(
    &self,
    input: NewReview,
    ctx: ChangeContext,
  ) -> impl Future<Output = Result<Review, Self::Error>> + Send + '_;

  fn update_review(
    &self,
    id: Uuid,
    patch: ReviewPatch,
    ctx: ChangeContext,
  ) -> impl Future<Output = Result<Review, Self::Error>> + Send + '_;

  fn delete_review(
    &self,
    id: Uuid,
    ctx: ChangeContext,
  ) -> impl Future<Output = Result<Review, Self::Error>> + Send + '_;

  fn get_review(
    &self,
    id: Uuid,
  ) -> impl Future<Output = Result<Option<Review>, Self::Error>> + Send + '_;

  fn reviews_for_book(
    &self,
    book_id: Uuid,
  ) -> impl Future<Output = Result<Vec<Review>, Self::Error>> + Send + '_;

  // ── Profiles ──────────────────────────────────────────────────────────

  /// Create the user's profile on first use, then apply `patch`. Records a
  /// `create` entry the first time and `update` afterwards.
  fn upsert_profile(
    &self,
    user_id: Uuid,
    patch: ProfilePatch,
    ctx: ChangeContext,
  ) -> impl Future<Output = Result<Profile, Self::Error>> + Send + '_;

  fn get_profile(
    &self,
    user_id: Uuid,
  ) -> impl Future<Output = Result<Option<Profile>, Self::Error>> + Send + '_;

  // ── Messages ──────────────────────────────────────────────────────────

  fn send_message(
    &self,
    input: NewMessage,
    ctx: ChangeContext,
  ) -> impl Future<Output = Result<Message, Self::Error>> + Send + '_;

  /// Only the recipient may mark a message read. Marking an already-read
  /// message is a no-op and records nothing.
  fn mark_message_read(
    &self,
    id: Uuid,
    reader: Uuid,
    ctx: ChangeContext,
  ) -> impl Future<Output = Result<Message, Self::Error>> + Send + '_;

  fn get_message(
    &self,
    id: Uuid,
  ) -> impl Future<Output = Result<Option<Message>, Self::Error>> + Send + '_;

  fn inbox(
    &self,
    user_id: Uuid,
  ) -> impl Future<Output = Result<Vec<Message>, Self::Error>> + Send + '_;

  fn sent(
    &self,
    user_id: Uuid,
  ) -> impl Future<Output = Result<Vec<Message>, Self::Error>> + Send + '_;

  fn unread_count(
    &self,
    user_id: Uuid,
  ) -> impl Future<Output = Result<u64, Self::Error>> + Send + '_;
}

// ─── History ─────────────────────────────────────────────────────────────────

pub trait HistoryStore: Store {
  /// Records for one entity, newest first. Records survive deletion of the
  /// entity.
  fn history(
    &self,
    entity: EntityRef,
    limit: Option<usize>,
  ) -> impl Future<Output = Result<Vec<HistoricalRecord>, Self::Error>> + Send + '_;

  fn history_record(
    &self,
    entity: EntityRef,
    history_id: i64,
  ) -> impl Future<Output = Result<Option<HistoricalRecord>, Self::Error>> + Send + '_;

  /// Diff two records of `entity`. `None` if either id does not belong to
  /// the entity.
  fn compare_versions(
    &self,
    entity: EntityRef,
    version1: i64,
    version2: i64,
  ) -> impl Future<Output = Result<Option<VersionDiff>, Self::Error>> + Send + '_;

  /// Copy every tracked field of record `history_id` onto the live entity
  /// and record the restoration as a new `update`. `None` for an unknown
  /// record; not-found error when the live entity no longer exists.
  fn restore(
    &self,
    entity: EntityRef,
    history_id: i64,
    ctx: ChangeContext,
  ) -> impl Future<Output = Result<Option<HistoricalRecord>, Self::Error>> + Send + '_;

  /// Records of any entity of `kind` since `since`, newest first.
  fn recent_changes(
    &self,
    kind: EntityKind,
    since: DateTime<Utc>,
    limit: usize,
  ) -> impl Future<Output = Result<Vec<HistoricalRecord>, Self::Error>> + Send + '_;

  /// Records of entities owned by `user_id` since `since`, newest first.
  fn user_timeline(
    &self,
    user_id: Uuid,
    since: DateTime<Utc>,
  ) -> impl Future<Output = Result<Vec<HistoricalRecord>, Self::Error>> + Send + '_;
}

// ─── Activity ────────────────────────────────────────────────────────────────

pub trait ActivityLog: Store {
  /// Append an activity record. Store failures are returned, never retried.
  fn record_activity(
    &self,
    input: NewActivity,
  ) -> impl Future<Output = Result<ActivityRecord, Self::Error>> + Send + '_;

  /// The actor's most recent activity, newest first.
  fn activities_for(
    &self,
    actor_id: Uuid,
    limit: usize,
  ) -> impl Future<Output = Result<Vec<ActivityRecord>, Self::Error>> + Send + '_;

  /// Count of each action kind performed by `actor_id` since `since`.
  fn activity_summary(
    &self,
    actor_id: Uuid,
    since: DateTime<Utc>,
  ) -> impl Future<Output = Result<ActivitySummary, Self::Error>> + Send + '_;

  /// System-wide totals over the trailing `days` days ending at `now`.
  fn system_activity_stats(
    &self,
    days: u32,
    now: DateTime<Utc>,
  ) -> impl Future<Output = Result<SystemActivityStats, Self::Error>> + Send + '_;
}

// ─── Statistics ──────────────────────────────────────────────────────────────

pub trait StatisticsStore: Store {
  fn catalog_statistics(
    &self,
  ) -> impl Future<Output = Result<CatalogStatistics, Self::Error>> + Send + '_;

  /// Mean rating of the book's current reviews; `0.0` with no reviews.
  fn average_rating(
    &self,
    book_id: Uuid,
  ) -> impl Future<Output = Result<f64, Self::Error>> + Send + '_;

  /// Review aggregate for every book.
  fn book_ratings(
    &self,
  ) -> impl Future<Output = Result<Vec<BookRating>, Self::Error>> + Send + '_;

  /// Book count for every genre.
  fn genre_counts(
    &self,
  ) -> impl Future<Output = Result<Vec<GenreCount>, Self::Error>> + Send + '_;

  fn popular_books(
    &self,
    limit: Option<usize>,
  ) -> impl Future<Output = Result<Vec<BookRating>, Self::Error>> + Send + '_ {
    async move { Ok(stats::popular(self.book_ratings().await?, limit)) }
  }

  fn trending_books(
    &self,
    now: DateTime<Utc>,
  ) -> impl Future<Output = Result<Vec<BookRating>, Self::Error>> + Send + '_ {
    async move { Ok(stats::trending(self.book_ratings().await?, now)) }
  }

  fn popular_genres(
    &self,
  ) -> impl Future<Output = Result<Vec<GenreCount>, Self::Error>> + Send + '_ {
    async move { Ok(stats::popular_genres(self.genre_counts().await?)) }
  }
}

/// Everything the HTTP layer needs from a backend.
pub trait Backend: CatalogStore + HistoryStore + ActivityLog + StatisticsStore {}

impl<T> Backend for T where T: CatalogStore + HistoryStore + ActivityLog + StatisticsStore {}
