//! SQLite backend for the Bookshare store traits.
//!
//! Wraps [`tokio_rusqlite`] so all database access runs on a dedicated thread
//! without blocking the async runtime. Entity writes and their history
//! records share one transaction.

mod activity;
mod catalog;
mod encode;
mod history;
mod schema;
mod stats;
mod store;

pub mod error;

pub use error::{Error, Result};
pub use store::SqliteStore;

#[cfg(test)]
mod tests;
