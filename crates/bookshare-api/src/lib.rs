//! JSON REST API for Bookshare.
//!
//! Exposes an axum [`Router`] backed by any [`bookshare_core::store::Backend`].
//! Authentication happens upstream; the acting user arrives in trusted
//! headers (see [`context`]). Every successful mutation is followed by one
//! activity-log entry.
//!
//! # Mounting
//!
//! ```rust,ignore
//! .nest("/api", bookshare_api::api_router(store.clone()))
//! ```

pub mod activity;
pub mod books;
pub mod context;
pub mod error;
pub mod genres;
pub mod history;
pub mod messages;
pub mod profiles;
pub mod reviews;
pub mod stats;

use std::sync::Arc;

use axum::{
  Router,
  routing::{get, patch, post, put},
};
use bookshare_core::store::Backend;

pub use error::ApiError;

/// Build a fully-materialised API router for `store`.
///
/// The returned `Router<()>` can be nested into any parent router regardless
/// of its own state type.
pub fn api_router<S>(store: Arc<S>) -> Router<()>
where
  S: Backend + 'static,
{
  Router::new()
    // Genres
    .route("/genres", get(genres::list::<S>).post(genres::create::<S>))
    .route("/genres/{id}", patch(genres::rename::<S>).delete(genres::delete_one::<S>))
    // Books
    .route("/books", get(books::list::<S>).post(books::create::<S>))
    .route(
      "/books/{id}",
      get(books::get_one::<S>).patch(books::update::<S>).delete(books::delete_one::<S>),
    )
    .route("/books/{id}/genres", put(books::set_genres::<S>))
    .route("/books/{id}/history", get(books::history::<S>))
    .route("/books/{id}/favorite", post(books::toggle_favorite::<S>))
    .route(
      "/books/{id}/reviews",
      get(reviews::list_for_book::<S>).post(reviews::create::<S>),
    )
    // Reviews
    .route(
      "/reviews/{id}",
      get(reviews::get_one::<S>).patch(reviews::update::<S>).delete(reviews::delete_one::<S>),
    )
    // Profiles
    .route("/profiles/me", get(profiles::me::<S>).patch(profiles::update_me::<S>))
    .route("/profiles/{user_id}", get(profiles::get_one::<S>))
    // Messages
    .route("/messages", post(messages::send::<S>))
    .route("/messages/inbox", get(messages::inbox::<S>))
    .route("/messages/sent", get(messages::sent::<S>))
    .route("/messages/unread_count", get(messages::unread_count::<S>))
    .route("/messages/{id}", get(messages::get_one::<S>))
    .route("/messages/{id}/read", post(messages::mark_read::<S>))
    // History
    .route("/history/{kind}/recent", get(history::recent::<S>))
    .route("/history/{kind}/{id}", get(history::list::<S>))
    .route("/history/{kind}/{id}/compare", get(history::compare::<S>))
    .route("/history/{kind}/{id}/restore", post(history::restore::<S>))
    .route("/users/{id}/timeline", get(history::timeline::<S>))
    .route("/users/{id}/activity", get(activity::for_user::<S>))
    // Activity
    .route("/activity", post(activity::report::<S>))
    .route("/activity/me", get(activity::mine::<S>))
    .route("/activity/summary", get(activity::summary::<S>))
    .route("/activity/stats", get(activity::system_stats::<S>))
    // Statistics
    .route("/stats", get(stats::catalog::<S>))
    .route("/stats/popular", get(stats::popular::<S>))
    .route("/stats/trending", get(stats::trending::<S>))
    .route("/stats/genres", get(stats::genres::<S>))
    .with_state(store)
}

#[cfg(test)]
mod tests;
