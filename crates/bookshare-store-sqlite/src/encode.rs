//! Encoding and decoding helpers between Rust domain types and the plain-text
//! representations stored in SQLite columns.
//!
//! Timestamps are stored as RFC 3339 UTC strings with fixed microsecond
//! precision, so lexical order in SQL equals chronological order. UUIDs are
//! stored as hyphenated lowercase strings. Enums use their `strum` names.

use std::str::FromStr;

use bookshare_core::{
  activity::ActivityRecord,
  entity::{Book, Genre, Message, Profile, Review},
  history::{HistoricalRecord, RelationChange},
};
use chrono::{DateTime, NaiveDate, SecondsFormat, SubsecRound as _, Utc};
use uuid::Uuid;

use crate::{Error, Result};

// ─── Scalars ─────────────────────────────────────────────────────────────────

pub fn encode_uuid(id: Uuid) -> String { id.hyphenated().to_string() }

pub fn decode_uuid(s: &str) -> Result<Uuid> { Ok(Uuid::parse_str(s)?) }

pub fn decode_opt_uuid(s: Option<String>) -> Result<Option<Uuid>> {
  s.as_deref().map(decode_uuid).transpose()
}

/// The current time, truncated to the precision the database keeps.
pub fn now() -> DateTime<Utc> { Utc::now().trunc_subsecs(6) }

pub fn encode_dt(dt: DateTime<Utc>) -> String {
  dt.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub fn decode_dt(s: &str) -> Result<DateTime<Utc>> {
  DateTime::parse_from_rfc3339(s)
    .map(|dt| dt.with_timezone(&Utc))
    .map_err(|e| Error::Decode(format!("bad timestamp {s:?}: {e}")))
}

pub fn encode_date(d: NaiveDate) -> String { d.format("%Y-%m-%d").to_string() }

pub fn decode_date(s: &str) -> Result<NaiveDate> {
  NaiveDate::parse_from_str(s, "%Y-%m-%d")
    .map_err(|e| Error::Decode(format!("bad date {s:?}: {e}")))
}

/// Parse any `strum`-backed enum from its stored name.
pub fn decode_enum<T: FromStr>(what: &'static str, s: &str) -> Result<T> {
  T::from_str(s).map_err(|_| {
    Error::Core(bookshare_core::Error::UnknownDiscriminant {
      what,
      value: s.to_owned(),
    })
  })
}

pub fn encode_uuids(ids: &[Uuid]) -> Result<String> { Ok(serde_json::to_string(ids)?) }

pub fn decode_uuids(s: &str) -> Result<Vec<Uuid>> { Ok(serde_json::from_str(s)?) }

// ─── Row types ───────────────────────────────────────────────────────────────

/// Raw strings read directly from a `genres` row.
pub struct RawGenre {
  pub genre_id:   String,
  pub created_at: String,
  pub name:       String,
}

impl RawGenre {
  pub const COLUMNS: &'static str = "genre_id, created_at, name";

  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self { genre_id: row.get(0)?, created_at: row.get(1)?, name: row.get(2)? })
  }

  pub fn into_genre(self) -> Result<Genre> {
    Ok(Genre {
      genre_id:   decode_uuid(&self.genre_id)?,
      created_at: decode_dt(&self.created_at)?,
      name:       self.name,
    })
  }
}

/// Raw strings read directly from a `books` row. Genre ids are loaded
/// separately from `book_genres`.
pub struct RawBook {
  pub book_id:     String,
  pub created_at:  String,
  pub updated_at:  String,
  pub title:       String,
  pub author:      String,
  pub description: String,
  pub cover_image: Option<String>,
  pub book_file:   Option<String>,
  pub owner_id:    String,
}

impl RawBook {
  pub const COLUMNS: &'static str = "book_id, created_at, updated_at, title, author, \
                                     description, cover_image, book_file, owner_id";

  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      book_id:     row.get(0)?,
      created_at:  row.get(1)?,
      updated_at:  row.get(2)?,
      title:       row.get(3)?,
      author:      row.get(4)?,
      description: row.get(5)?,
      cover_image: row.get(6)?,
      book_file:   row.get(7)?,
      owner_id:    row.get(8)?,
    })
  }

  pub fn into_book(self, genre_ids: Vec<Uuid>) -> Result<Book> {
    Ok(Book {
      book_id: decode_uuid(&self.book_id)?,
      created_at: decode_dt(&self.created_at)?,
      updated_at: decode_dt(&self.updated_at)?,
      title: self.title,
      author: self.author,
      description: self.description,
      cover_image: self.cover_image,
      book_file: self.book_file,
      owner_id: decode_uuid(&self.owner_id)?,
      genre_ids,
    })
  }
}

pub struct RawReview {
  pub review_id:  String,
  pub created_at: String,
  pub book_id:    String,
  pub user_id:    String,
  pub text:       String,
  pub rating:     i64,
}

impl RawReview {
  pub const COLUMNS: &'static str = "review_id, created_at, book_id, user_id, text, rating";

  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      review_id:  row.get(0)?,
      created_at: row.get(1)?,
      book_id:    row.get(2)?,
      user_id:    row.get(3)?,
      text:       row.get(4)?,
      rating:     row.get(5)?,
    })
  }

  pub fn into_review(self) -> Result<Review> {
    let rating = u8::try_from(self.rating)
      .map_err(|_| Error::Decode(format!("rating out of range: {}", self.rating)))?;
    Ok(Review {
      review_id: decode_uuid(&self.review_id)?,
      created_at: decode_dt(&self.created_at)?,
      book_id: decode_uuid(&self.book_id)?,
      user_id: decode_uuid(&self.user_id)?,
      text: self.text,
      rating,
    })
  }
}

pub struct RawProfile {
  pub profile_id: String,
  pub created_at: String,
  pub user_id:    String,
  pub bio:        String,
  pub location:   String,
  pub birth_date: Option<String>,
  pub avatar:     Option<String>,
  pub phone:      String,
  pub telegram:   String,
}

impl RawProfile {
  pub const COLUMNS: &'static str = "profile_id, created_at, user_id, bio, location, \
                                     birth_date, avatar, phone, telegram";

  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      profile_id: row.get(0)?,
      created_at: row.get(1)?,
      user_id:    row.get(2)?,
      bio:        row.get(3)?,
      location:   row.get(4)?,
      birth_date: row.get(5)?,
      avatar:     row.get(6)?,
      phone:      row.get(7)?,
      telegram:   row.get(8)?,
    })
  }

  pub fn into_profile(self) -> Result<Profile> {
    Ok(Profile {
      profile_id: decode_uuid(&self.profile_id)?,
      created_at: decode_dt(&self.created_at)?,
      user_id: decode_uuid(&self.user_id)?,
      bio: self.bio,
      location: self.location,
      birth_date: self.birth_date.as_deref().map(decode_date).transpose()?,
      avatar: self.avatar,
      phone: self.phone,
      telegram: self.telegram,
    })
  }
}

pub struct RawMessage {
  pub message_id:   String,
  pub created_at:   String,
  pub sender_id:    String,
  pub recipient_id: String,
  pub book_id:      String,
  pub subject:      String,
  pub body:         String,
  pub is_read:      bool,
}

impl RawMessage {
  pub const COLUMNS: &'static str = "message_id, created_at, sender_id, recipient_id, \
                                     book_id, subject, body, is_read";

  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      message_id:   row.get(0)?,
      created_at:   row.get(1)?,
      sender_id:    row.get(2)?,
      recipient_id: row.get(3)?,
      book_id:      row.get(4)?,
      subject:      row.get(5)?,
      body:         row.get(6)?,
      is_read:      row.get(7)?,
    })
  }

  pub fn into_message(self) -> Result<Message> {
    Ok(Message {
      message_id: decode_uuid(&self.message_id)?,
      created_at: decode_dt(&self.created_at)?,
      sender_id: decode_uuid(&self.sender_id)?,
      recipient_id: decode_uuid(&self.recipient_id)?,
      book_id: decode_uuid(&self.book_id)?,
      subject: self.subject,
      body: self.body,
      is_read: self.is_read,
    })
  }
}

/// A `history` row left-joined with `history_relations`.
pub struct RawHistory {
  pub history_id:     i64,
  pub entity_kind:    String,
  pub entity_id:      String,
  pub change_type:    String,
  pub recorded_at:    String,
  pub reason:         Option<String>,
  pub actor_id:       Option<String>,
  pub actor_name:     Option<String>,
  pub owner_id:       Option<String>,
  pub fields_version: i64,
  pub snapshot:       String,
  pub relation:       Option<String>,
  pub added:          Option<String>,
  pub removed:        Option<String>,
}

impl RawHistory {
  /// Select list for `history h LEFT JOIN history_relations r`.
  pub const SELECT: &'static str = "SELECT
       h.history_id, h.entity_kind, h.entity_id, h.change_type, h.recorded_at,
       h.reason, h.actor_id, h.actor_name, h.owner_id, h.fields_version,
       h.snapshot, r.relation, r.added, r.removed
     FROM history h
     LEFT JOIN history_relations r ON r.history_id = h.history_id";

  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      history_id:     row.get(0)?,
      entity_kind:    row.get(1)?,
      entity_id:      row.get(2)?,
      change_type:    row.get(3)?,
      recorded_at:    row.get(4)?,
      reason:         row.get(5)?,
      actor_id:       row.get(6)?,
      actor_name:     row.get(7)?,
      owner_id:       row.get(8)?,
      fields_version: row.get(9)?,
      snapshot:       row.get(10)?,
      relation:       row.get(11)?,
      added:          row.get(12)?,
      removed:        row.get(13)?,
    })
  }

  pub fn into_record(self) -> Result<HistoricalRecord> {
    let relation = match (self.relation, self.added, self.removed) {
      (Some(relation), Some(added), Some(removed)) => Some(RelationChange {
        relation,
        added: decode_uuids(&added)?,
        removed: decode_uuids(&removed)?,
      }),
      _ => None,
    };
    let fields_version = u32::try_from(self.fields_version)
      .map_err(|_| Error::Decode(format!("bad fields_version {}", self.fields_version)))?;

    Ok(HistoricalRecord {
      history_id: self.history_id,
      entity_kind: decode_enum("entity kind", &self.entity_kind)?,
      entity_id: decode_uuid(&self.entity_id)?,
      change_type: decode_enum("change type", &self.change_type)?,
      recorded_at: decode_dt(&self.recorded_at)?,
      reason: self.reason,
      actor_id: decode_opt_uuid(self.actor_id)?,
      actor_name: self.actor_name,
      owner_id: decode_opt_uuid(self.owner_id)?,
      fields_version,
      snapshot: serde_json::from_str(&self.snapshot)?,
      relation,
    })
  }
}

pub struct RawActivity {
  pub activity_id: i64,
  pub actor_id:    String,
  pub action:      String,
  pub target_type: Option<String>,
  pub target_id:   Option<String>,
  pub description: Option<String>,
  pub ip_address:  Option<String>,
  pub user_agent:  Option<String>,
  pub occurred_at: String,
}

impl RawActivity {
  pub const COLUMNS: &'static str = "activity_id, actor_id, action, target_type, target_id, \
                                     description, ip_address, user_agent, occurred_at";

  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      activity_id: row.get(0)?,
      actor_id:    row.get(1)?,
      action:      row.get(2)?,
      target_type: row.get(3)?,
      target_id:   row.get(4)?,
      description: row.get(5)?,
      ip_address:  row.get(6)?,
      user_agent:  row.get(7)?,
      occurred_at: row.get(8)?,
    })
  }

  pub fn into_activity(self) -> Result<ActivityRecord> {
    Ok(ActivityRecord {
      activity_id: self.activity_id,
      actor_id: decode_uuid(&self.actor_id)?,
      action: decode_enum("action", &self.action)?,
      target_type: self
        .target_type
        .as_deref()
        .map(|t| decode_enum("entity kind", t))
        .transpose()?,
      target_id: decode_opt_uuid(self.target_id)?,
      description: self.description,
      ip_address: self.ip_address,
      user_agent: self.user_agent,
      occurred_at: decode_dt(&self.occurred_at)?,
    })
  }
}
