//! Domain entities: genres, books, reviews, profiles and messages.
//!
//! Each entity has an immutable identity (`*_id`) and `created_at`. Every
//! other field may change, and every change is versioned through the
//! [`Tracked`](crate::history::Tracked) implementation declared here.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use strum::{AsRefStr, Display, EnumIter, EnumString};
use uuid::Uuid;

use crate::{
  history::{Tracked, TrackedField},
  validate::{check_rating, clean_title, ValidationErrors},
};

// ─── Kind ────────────────────────────────────────────────────────────────────

/// Discriminant for every versioned entity type. The string form is used in
/// the database, in history records and as an activity target type.
#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  PartialOrd,
  Ord,
  Hash,
  Serialize,
  Deserialize,
  Display,
  EnumString,
  AsRefStr,
  EnumIter,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum EntityKind {
  Book,
  Review,
  Genre,
  Message,
  Profile,
}

/// A typed pointer to one entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EntityRef {
  pub kind: EntityKind,
  pub id:   Uuid,
}

impl EntityRef {
  pub fn new(kind: EntityKind, id: Uuid) -> Self { Self { kind, id } }
}

// ─── Genre ───────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Genre {
  pub genre_id:   Uuid,
  pub created_at: DateTime<Utc>,
  pub name:       String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewGenre {
  pub name: String,
}

impl NewGenre {
  pub fn validated(self) -> Result<Self, ValidationErrors> {
    let mut errors = ValidationErrors::default();
    let name = self.name.trim().to_owned();
    errors.required("name", &name, 100);
    errors.finish()?;
    Ok(Self { name })
  }
}

impl Tracked for Genre {
  const KIND: EntityKind = EntityKind::Genre;
  const FIELDS: &'static [TrackedField] = &[TrackedField::new("name", "Genre name")];

  fn entity_id(&self) -> Uuid { self.genre_id }

  /// Genres are shared catalogue data with no single owner.
  fn owner_id(&self) -> Option<Uuid> { None }
}

// ─── Book ────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Book {
  pub book_id:     Uuid,
  pub created_at:  DateTime<Utc>,
  /// Bumped on every write; deliberately excluded from history snapshots.
  pub updated_at:  DateTime<Utc>,
  pub title:       String,
  pub author:      String,
  pub description: String,
  /// Blob-store key for the cover image.
  pub cover_image: Option<String>,
  /// Blob-store key for the downloadable book file.
  pub book_file:   Option<String>,
  pub owner_id:    Uuid,
  /// Current genre associations. Versioned as a relation, not as a field.
  #[serde(default)]
  pub genre_ids:   Vec<Uuid>,
}

/// Input to [`crate::store::CatalogStore::create_book`].
#[derive(Debug, Clone, Deserialize)]
pub struct NewBook {
  pub title:       String,
  pub author:      String,
  #[serde(default)]
  pub description: String,
  pub cover_image: Option<String>,
  pub book_file:   Option<String>,
  pub owner_id:    Uuid,
  #[serde(default)]
  pub genre_ids:   Vec<Uuid>,
}

impl NewBook {
  pub fn validated(mut self) -> Result<Self, ValidationErrors> {
    let mut errors = ValidationErrors::default();
    self.title = clean_title(&self.title, &mut errors);
    errors.required("author", &self.author, 100);
    errors.finish()?;
    Ok(self)
  }
}

/// Partial update of a book. `None` leaves a field untouched; for the two
/// blob keys an empty string clears the value.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct BookPatch {
  pub title:       Option<String>,
  pub author:      Option<String>,
  pub description: Option<String>,
  pub cover_image: Option<String>,
  pub book_file:   Option<String>,
  /// Replace the full genre set.
  pub genre_ids:   Option<Vec<Uuid>>,
}

impl BookPatch {
  /// Apply the scalar part of the patch to `book`, validating as it goes.
  /// Genre changes are handled by the caller as a relation change.
  pub fn apply(&self, book: &mut Book) -> Result<(), ValidationErrors> {
    let mut errors = ValidationErrors::default();
    if let Some(title) = &self.title {
      book.title = clean_title(title, &mut errors);
    }
    if let Some(author) = &self.author {
      errors.required("author", author, 100);
      book.author = author.clone();
    }
    if let Some(description) = &self.description {
      book.description = description.clone();
    }
    if let Some(cover) = &self.cover_image {
      book.cover_image = non_empty(cover);
    }
    if let Some(file) = &self.book_file {
      book.book_file = non_empty(file);
    }
    errors.finish()
  }
}

fn non_empty(s: &str) -> Option<String> {
  if s.is_empty() { None } else { Some(s.to_owned()) }
}

impl Tracked for Book {
  const KIND: EntityKind = EntityKind::Book;
  const FIELDS: &'static [TrackedField] = &[
    TrackedField::new("title", "Title"),
    TrackedField::new("author", "Author"),
    TrackedField::new("description", "Description"),
    TrackedField::new("cover_image", "Cover image"),
    TrackedField::new("book_file", "Book file"),
    TrackedField::new("owner_id", "Owner"),
  ];

  fn entity_id(&self) -> Uuid { self.book_id }

  fn owner_id(&self) -> Option<Uuid> { Some(self.owner_id) }
}

// ─── Review ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Review {
  pub review_id:  Uuid,
  pub created_at: DateTime<Utc>,
  pub book_id:    Uuid,
  pub user_id:    Uuid,
  pub text:       String,
  /// 1 through 5.
  pub rating:     u8,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewReview {
  pub book_id: Uuid,
  pub user_id: Uuid,
  pub text:    String,
  pub rating:  u8,
}

impl NewReview {
  pub fn validate(&self) -> Result<(), ValidationErrors> {
    let mut errors = ValidationErrors::default();
    errors.required("text", &self.text, usize::MAX);
    check_rating(self.rating, &mut errors);
    errors.finish()
  }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ReviewPatch {
  pub text:   Option<String>,
  pub rating: Option<u8>,
}

impl ReviewPatch {
  pub fn apply(&self, review: &mut Review) -> Result<(), ValidationErrors> {
    let mut errors = ValidationErrors::default();
    if let Some(text) = &self.text {
      errors.required("text", text, usize::MAX);
      review.text = text.clone();
    }
    if let Some(rating) = self.rating {
      check_rating(rating, &mut errors);
      review.rating = rating;
    }
    errors.finish()
  }
}

impl Tracked for Review {
  const KIND: EntityKind = EntityKind::Review;
  const FIELDS: &'static [TrackedField] = &[
    TrackedField::new("book_id", "Book"),
    TrackedField::new("user_id", "User"),
    TrackedField::new("text", "Review text"),
    TrackedField::new("rating", "Rating"),
  ];

  fn entity_id(&self) -> Uuid { self.review_id }

  fn owner_id(&self) -> Option<Uuid> { Some(self.user_id) }
}

// ─── Profile ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Profile {
  pub profile_id: Uuid,
  pub created_at: DateTime<Utc>,
  pub user_id:    Uuid,
  pub bio:        String,
  pub location:   String,
  pub birth_date: Option<NaiveDate>,
  /// Blob-store key.
  pub avatar:     Option<String>,
  pub phone:      String,
  pub telegram:   String,
}

impl Profile {
  /// An empty profile, as created on first access.
  pub fn blank(user_id: Uuid, now: DateTime<Utc>) -> Self {
    Self {
      profile_id: Uuid::new_v4(),
      created_at: now,
      user_id,
      bio: String::new(),
      location: String::new(),
      birth_date: None,
      avatar: None,
      phone: String::new(),
      telegram: String::new(),
    }
  }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProfilePatch {
  pub bio:        Option<String>,
  pub location:   Option<String>,
  /// Absent leaves the date alone; `null` clears it.
  #[serde(default, deserialize_with = "present")]
  pub birth_date: Option<Option<NaiveDate>>,
  /// Empty string clears the avatar.
  pub avatar:     Option<String>,
  pub phone:      Option<String>,
  pub telegram:   Option<String>,
}

/// Deserialise a field that was present in the input, `null` included, as
/// `Some`. Paired with `#[serde(default)]` so an absent field stays `None`.
fn present<'de, D, T>(de: D) -> Result<Option<Option<T>>, D::Error>
where
  D: Deserializer<'de>,
  T: Deserialize<'de>,
{
  Option::<T>::deserialize(de).map(Some)
}

impl ProfilePatch {
  pub fn apply(&self, profile: &mut Profile) -> Result<(), ValidationErrors> {
    let mut errors = ValidationErrors::default();
    errors.optional_max_len("bio", self.bio.as_deref(), 500);
    errors.optional_max_len("location", self.location.as_deref(), 30);
    errors.optional_max_len("phone", self.phone.as_deref(), 20);
    errors.optional_max_len("telegram", self.telegram.as_deref(), 50);
    errors.finish()?;

    if let Some(v) = &self.bio {
      profile.bio = v.clone();
    }
    if let Some(v) = &self.location {
      profile.location = v.clone();
    }
    if let Some(v) = self.birth_date {
      profile.birth_date = v;
    }
    if let Some(v) = &self.avatar {
      profile.avatar = non_empty(v);
    }
    if let Some(v) = &self.phone {
      profile.phone = v.clone();
    }
    if let Some(v) = &self.telegram {
      profile.telegram = v.clone();
    }
    Ok(())
  }
}

impl Tracked for Profile {
  const KIND: EntityKind = EntityKind::Profile;
  const FIELDS: &'static [TrackedField] = &[
    TrackedField::new("user_id", "User"),
    TrackedField::new("bio", "About"),
    TrackedField::new("location", "Location"),
    TrackedField::new("birth_date", "Date of birth"),
    TrackedField::new("avatar", "Avatar"),
    TrackedField::new("phone", "Phone"),
    TrackedField::new("telegram", "Telegram"),
  ];

  fn entity_id(&self) -> Uuid { self.profile_id }

  fn owner_id(&self) -> Option<Uuid> { Some(self.user_id) }
}

// ─── Message ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
  pub message_id:   Uuid,
  /// Not part of history snapshots.
  pub created_at:   DateTime<Utc>,
  pub sender_id:    Uuid,
  pub recipient_id: Uuid,
  pub book_id:      Uuid,
  pub subject:      String,
  pub body:         String,
  pub is_read:      bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewMessage {
  pub sender_id:    Uuid,
  pub recipient_id: Uuid,
  pub book_id:      Uuid,
  pub subject:      String,
  pub body:         String,
}

impl NewMessage {
  pub fn validate(&self) -> Result<(), ValidationErrors> {
    let mut errors = ValidationErrors::default();
    errors.required("subject", &self.subject, 200);
    errors.required("body", &self.body, usize::MAX);
    errors.finish()
  }
}

impl Tracked for Message {
  const KIND: EntityKind = EntityKind::Message;
  const FIELDS: &'static [TrackedField] = &[
    TrackedField::new("sender_id", "Sender"),
    TrackedField::new("recipient_id", "Recipient"),
    TrackedField::new("book_id", "Book"),
    TrackedField::new("subject", "Subject"),
    TrackedField::new("body", "Message"),
    TrackedField::new("is_read", "Read"),
  ];

  fn entity_id(&self) -> Uuid { self.message_id }

  fn owner_id(&self) -> Option<Uuid> { Some(self.sender_id) }
}
