//! Field-level validation for entity inputs and change reasons.
//!
//! Validators collect every problem instead of stopping at the first one, so
//! a caller can show the whole list next to the offending fields.

use std::fmt;

use serde::Serialize;

/// Upper bound on a change reason, in characters.
pub const MAX_REASON_LEN: usize = 500;

/// A single rejected field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldError {
  pub field:   &'static str,
  pub message: String,
}

/// A non-empty list of [`FieldError`]s.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct ValidationErrors(pub Vec<FieldError>);

impl ValidationErrors {
  pub fn is_empty(&self) -> bool { self.0.is_empty() }

  pub fn fields(&self) -> impl Iterator<Item = &'static str> + '_ {
    self.0.iter().map(|e| e.field)
  }

  pub fn push(&mut self, field: &'static str, message: impl Into<String>) {
    self.0.push(FieldError { field, message: message.into() });
  }

  /// `Ok(())` when nothing was collected, otherwise `Err(self)`.
  pub fn finish(self) -> Result<(), Self> {
    if self.0.is_empty() { Ok(()) } else { Err(self) }
  }

  /// Require a non-blank value of at most `max` characters.
  pub fn required(&mut self, field: &'static str, value: &str, max: usize) {
    if value.trim().is_empty() {
      self.push(field, "must not be empty");
    } else {
      self.max_len(field, value, max);
    }
  }

  pub fn max_len(&mut self, field: &'static str, value: &str, max: usize) {
    let len = value.chars().count();
    if len > max {
      self.push(field, format!("must be at most {max} characters (got {len})"));
    }
  }

  pub fn optional_max_len(
    &mut self,
    field: &'static str,
    value: Option<&str>,
    max: usize,
  ) {
    if let Some(v) = value {
      self.max_len(field, v, max);
    }
  }
}

impl fmt::Display for ValidationErrors {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let parts: Vec<String> =
      self.0.iter().map(|e| format!("{}: {}", e.field, e.message)).collect();
    f.write_str(&parts.join("; "))
  }
}

/// Normalise and check a book title: trimmed, 2..=200 characters.
pub fn clean_title(raw: &str, errors: &mut ValidationErrors) -> String {
  let title = raw.trim().to_owned();
  let len = title.chars().count();
  if raw.is_empty() {
    errors.push("title", "must not be empty");
  } else if title.is_empty() {
    errors.push("title", "must not consist only of whitespace");
  } else if len > 200 {
    errors.push("title", "must be at most 200 characters");
  } else if len < 2 {
    errors.push("title", "must be at least 2 characters");
  }
  title
}

pub fn check_rating(rating: u8, errors: &mut ValidationErrors) {
  if !(1..=5).contains(&rating) {
    errors.push("rating", format!("must be between 1 and 5 (got {rating})"));
  }
}

/// Validate an optional change reason on its own.
pub fn check_reason(reason: Option<&str>) -> Result<(), ValidationErrors> {
  let mut errors = ValidationErrors::default();
  errors.optional_max_len("reason", reason, MAX_REASON_LEN);
  errors.finish()
}
