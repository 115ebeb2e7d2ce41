//! Domain model of the Bookshare catalogue: entities and their validation,
//! the history recorder's snapshot/diff/restore logic, activity types,
//! statistics ranking and the store traits backends implement.
//!
//! No HTTP or database dependencies live here.

pub mod activity;
pub mod entity;
pub mod error;
pub mod history;
pub mod stats;
pub mod store;
pub mod validate;

pub use error::{Error, Result};
