//! [`CatalogStore`] for [`SqliteStore`]: entity writes, each paired with its
//! history record inside the same transaction.

use bookshare_core::{
  entity::{
    Book, BookPatch, EntityKind, Genre, Message, NewBook, NewGenre, NewMessage,
    NewReview, Profile, ProfilePatch, Review, ReviewPatch,
  },
  history::{ChangeContext, ChangeType, NewHistoryEntry, RelationChange, Tracked},
  store::CatalogStore,
};
use rusqlite::{params, Connection, OptionalExtension as _};
use uuid::Uuid;

use crate::{
  encode::{
    decode_uuid, encode_date, encode_dt, encode_uuid, now, RawBook, RawGenre,
    RawMessage, RawProfile, RawReview,
  },
  store::{SqliteStore, Writer},
  Error, Result,
};

/// Relation name recorded for book ↔ genre changes.
pub(crate) const GENRES: &str = "genres";

pub(crate) fn not_found(kind: EntityKind, id: Uuid) -> Error {
  bookshare_core::Error::NotFound { kind, id }.into()
}

/// Turn a constraint violation into a domain conflict; pass anything else
/// through.
fn conflict(e: rusqlite::Error, message: &str) -> Error {
  if e.sqlite_error_code() == Some(rusqlite::ErrorCode::ConstraintViolation) {
    bookshare_core::Error::Conflict(message.to_owned()).into()
  } else {
    e.into()
  }
}

// ─── Persistence per entity ──────────────────────────────────────────────────

/// Row-level load and save for a tracked entity. `save` is an upsert keyed
/// on the entity id.
pub(crate) trait Persist: Tracked {
  fn load(conn: &Connection, id: Uuid) -> Result<Option<Self>>;

  fn save(&self, conn: &Connection) -> Result<()>;

  /// Bump bookkeeping fields before a save.
  fn touch(&mut self) {}

  fn require(conn: &Connection, id: Uuid) -> Result<Self> {
    Self::load(conn, id)?.ok_or_else(|| not_found(Self::KIND, id))
  }
}

impl Persist for Genre {
  fn load(conn: &Connection, id: Uuid) -> Result<Option<Self>> {
    conn
      .query_row(
        &format!("SELECT {} FROM genres WHERE genre_id = ?1", RawGenre::COLUMNS),
        params![encode_uuid(id)],
        RawGenre::from_row,
      )
      .optional()?
      .map(RawGenre::into_genre)
      .transpose()
  }

  fn save(&self, conn: &Connection) -> Result<()> {
    conn
      .execute(
        "INSERT INTO genres (genre_id, created_at, name) VALUES (?1, ?2, ?3)
         ON CONFLICT (genre_id) DO UPDATE SET name = excluded.name",
        params![encode_uuid(self.genre_id), encode_dt(self.created_at), self.name],
      )
      .map_err(|e| conflict(e, &format!("genre {:?} already exists", self.name)))?;
    Ok(())
  }
}

impl Persist for Book {
  fn load(conn: &Connection, id: Uuid) -> Result<Option<Self>> {
    let raw = conn
      .query_row(
        &format!("SELECT {} FROM books WHERE book_id = ?1", RawBook::COLUMNS),
        params![encode_uuid(id)],
        RawBook::from_row,
      )
      .optional()?;
    match raw {
      Some(raw) => Ok(Some(raw.into_book(genre_ids_of(conn, id)?)?)),
      None => Ok(None),
    }
  }

  /// Saves the scalar columns only; genres go through [`replace_genres`].
  fn save(&self, conn: &Connection) -> Result<()> {
    conn.execute(
      "INSERT INTO books (
         book_id, created_at, updated_at, title, author,
         description, cover_image, book_file, owner_id
       ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
       ON CONFLICT (book_id) DO UPDATE SET
         updated_at  = excluded.updated_at,
         title       = excluded.title,
         author      = excluded.author,
         description = excluded.description,
         cover_image = excluded.cover_image,
         book_file   = excluded.book_file,
         owner_id    = excluded.owner_id",
      params![
        encode_uuid(self.book_id),
        encode_dt(self.created_at),
        encode_dt(self.updated_at),
        self.title,
        self.author,
        self.description,
        self.cover_image,
        self.book_file,
        encode_uuid(self.owner_id),
      ],
    )?;
    Ok(())
  }

  fn touch(&mut self) { self.updated_at = now(); }
}

impl Persist for Review {
  fn load(conn: &Connection, id: Uuid) -> Result<Option<Self>> {
    conn
      .query_row(
        &format!("SELECT {} FROM reviews WHERE review_id = ?1", RawReview::COLUMNS),
        params![encode_uuid(id)],
        RawReview::from_row,
      )
      .optional()?
      .map(RawReview::into_review)
      .transpose()
  }

  fn save(&self, conn: &Connection) -> Result<()> {
    conn
      .execute(
        "INSERT INTO reviews (review_id, created_at, book_id, user_id, text, rating)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)
         ON CONFLICT (review_id) DO UPDATE SET
           book_id = excluded.book_id,
           user_id = excluded.user_id,
           text    = excluded.text,
           rating  = excluded.rating",
        params![
          encode_uuid(self.review_id),
          encode_dt(self.created_at),
          encode_uuid(self.book_id),
          encode_uuid(self.user_id),
          self.text,
          self.rating,
        ],
      )
      .map_err(|e| conflict(e, "this user has already reviewed this book"))?;
    Ok(())
  }
}

impl Persist for Profile {
  fn load(conn: &Connection, id: Uuid) -> Result<Option<Self>> {
    conn
      .query_row(
        &format!("SELECT {} FROM profiles WHERE profile_id = ?1", RawProfile::COLUMNS),
        params![encode_uuid(id)],
        RawProfile::from_row,
      )
      .optional()?
      .map(RawProfile::into_profile)
      .transpose()
  }

  fn save(&self, conn: &Connection) -> Result<()> {
    conn
      .execute(
        "INSERT INTO profiles (
           profile_id, created_at, user_id, bio, location,
           birth_date, avatar, phone, telegram
         ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
         ON CONFLICT (profile_id) DO UPDATE SET
           user_id    = excluded.user_id,
           bio        = excluded.bio,
           location   = excluded.location,
           birth_date = excluded.birth_date,
           avatar     = excluded.avatar,
           phone      = excluded.phone,
           telegram   = excluded.telegram",
        params![
          encode_uuid(self.profile_id),
          encode_dt(self.created_at),
          encode_uuid(self.user_id),
          self.bio,
          self.location,
          self.birth_date.map(encode_date),
          self.avatar,
          self.phone,
          self.telegram,
        ],
      )
      .map_err(|e| conflict(e, "this user already has a profile"))?;
    Ok(())
  }
}

impl Persist for Message {
  fn load(conn: &Connection, id: Uuid) -> Result<Option<Self>> {
    conn
      .query_row(
        &format!("SELECT {} FROM messages WHERE message_id = ?1", RawMessage::COLUMNS),
        params![encode_uuid(id)],
        RawMessage::from_row,
      )
      .optional()?
      .map(RawMessage::into_message)
      .transpose()
  }

  fn save(&self, conn: &Connection) -> Result<()> {
    conn.execute(
      "INSERT INTO messages (
         message_id, created_at, sender_id, recipient_id,
         book_id, subject, body, is_read
       ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
       ON CONFLICT (message_id) DO UPDATE SET
         sender_id    = excluded.sender_id,
         recipient_id = excluded.recipient_id,
         book_id      = excluded.book_id,
         subject      = excluded.subject,
         body         = excluded.body,
         is_read      = excluded.is_read",
      params![
        encode_uuid(self.message_id),
        encode_dt(self.created_at),
        encode_uuid(self.sender_id),
        encode_uuid(self.recipient_id),
        encode_uuid(self.book_id),
        self.subject,
        self.body,
        self.is_read,
      ],
    )?;
    Ok(())
  }
}

// ─── Query helpers ───────────────────────────────────────────────────────────

fn genre_ids_of(conn: &Connection, book_id: Uuid) -> Result<Vec<Uuid>> {
  let mut stmt =
    conn.prepare("SELECT genre_id FROM book_genres WHERE book_id = ?1 ORDER BY genre_id")?;
  let ids = stmt
    .query_map(params![encode_uuid(book_id)], |row| row.get::<_, String>(0))?
    .collect::<rusqlite::Result<Vec<_>>>()?;
  ids.iter().map(|s| decode_uuid(s)).collect()
}

fn normalize(mut ids: Vec<Uuid>) -> Vec<Uuid> {
  ids.sort();
  ids.dedup();
  ids
}

/// Replace a book's genre set. Every genre must exist.
fn replace_genres(conn: &Connection, book_id: Uuid, genre_ids: &[Uuid]) -> Result<()> {
  for &genre_id in genre_ids {
    Genre::require(conn, genre_id)?;
  }
  let book = encode_uuid(book_id);
  conn.execute("DELETE FROM book_genres WHERE book_id = ?1", params![book])?;
  for &genre_id in genre_ids {
    conn.execute(
      "INSERT INTO book_genres (book_id, genre_id) VALUES (?1, ?2)",
      params![book, encode_uuid(genre_id)],
    )?;
  }
  Ok(())
}

fn query_books(conn: &Connection, owner: Option<Uuid>) -> Result<Vec<Book>> {
  let owner = owner.map(encode_uuid);
  let mut stmt = conn.prepare(&format!(
    "SELECT {} FROM books
     WHERE ?1 IS NULL OR owner_id = ?1
     ORDER BY created_at DESC, book_id",
    RawBook::COLUMNS
  ))?;
  let raws = stmt
    .query_map(params![owner], RawBook::from_row)?
    .collect::<rusqlite::Result<Vec<_>>>()?;

  raws
    .into_iter()
    .map(|raw| {
      let id = decode_uuid(&raw.book_id)?;
      raw.into_book(genre_ids_of(conn, id)?)
    })
    .collect()
}

fn query_reviews(conn: &Connection, book_id: Uuid) -> Result<Vec<Review>> {
  let mut stmt = conn.prepare(&format!(
    "SELECT {} FROM reviews WHERE book_id = ?1 ORDER BY created_at DESC, review_id",
    RawReview::COLUMNS
  ))?;
  let raws = stmt
    .query_map(params![encode_uuid(book_id)], RawReview::from_row)?
    .collect::<rusqlite::Result<Vec<_>>>()?;
  raws.into_iter().map(RawReview::into_review).collect()
}

/// Messages where `column` (sender or recipient) equals `user_id`.
fn query_messages(
  conn: &Connection,
  column: &'static str,
  value: Uuid,
) -> Result<Vec<Message>> {
  let mut stmt = conn.prepare(&format!(
    "SELECT {} FROM messages WHERE {column} = ?1 ORDER BY created_at DESC, message_id",
    RawMessage::COLUMNS
  ))?;
  let raws = stmt
    .query_map(params![encode_uuid(value)], RawMessage::from_row)?
    .collect::<rusqlite::Result<Vec<_>>>()?;
  raws.into_iter().map(RawMessage::into_message).collect()
}

fn profile_by_user(conn: &Connection, user_id: Uuid) -> Result<Option<Profile>> {
  conn
    .query_row(
      &format!("SELECT {} FROM profiles WHERE user_id = ?1", RawProfile::COLUMNS),
      params![encode_uuid(user_id)],
      RawProfile::from_row,
    )
    .optional()?
    .map(RawProfile::into_profile)
    .transpose()
}

// ─── Transactional bodies ────────────────────────────────────────────────────

fn update_book_tx(
  w: &mut Writer<'_>,
  id: Uuid,
  patch: &BookPatch,
  ctx: &ChangeContext,
) -> Result<Book> {
  let mut book = Book::require(w, id)?;
  let before = book.snapshot()?;
  patch.apply(&mut book)?;
  let scalar_changed = book.snapshot()? != before;

  let relation = match &patch.genre_ids {
    Some(ids) => {
      let ids = normalize(ids.clone());
      let change = RelationChange::between(GENRES, &book.genre_ids, &ids);
      replace_genres(w, id, &ids)?;
      book.genre_ids = ids;
      change
    }
    None => None,
  };

  let change_type = if !scalar_changed && relation.is_some() {
    ChangeType::RelationChanged
  } else {
    ChangeType::Update
  };

  book.touch();
  book.save(w)?;
  w.record(NewHistoryEntry::of(&book, change_type, ctx)?.with_relation(relation))?;
  Ok(book)
}

/// Write a `delete` entry for `entity`. The caller removes the row.
fn record_delete<T: Tracked>(w: &mut Writer<'_>, entity: &T, ctx: &ChangeContext) -> Result<()> {
  w.record(NewHistoryEntry::of(entity, ChangeType::Delete, ctx)?)?;
  Ok(())
}

// ─── CatalogStore impl ───────────────────────────────────────────────────────

impl CatalogStore for SqliteStore {
  // ── Genres ────────────────────────────────────────────────────────────────

  async fn create_genre(&self, input: NewGenre, ctx: ChangeContext) -> Result<Genre> {
    ctx.validate()?;
    let input = input.validated()?;

    self
      .transact(move |w| {
        let genre = Genre { genre_id: Uuid::new_v4(), created_at: now(), name: input.name };
        genre.save(w)?;
        w.record(NewHistoryEntry::of(&genre, ChangeType::Create, &ctx)?)?;
        Ok(genre)
      })
      .await
  }

  async fn rename_genre(&self, id: Uuid, name: String, ctx: ChangeContext) -> Result<Genre> {
    ctx.validate()?;
    let input = NewGenre { name }.validated()?;

    self
      .transact(move |w| {
        let mut genre = Genre::require(w, id)?;
        genre.name = input.name;
        genre.save(w)?;
        w.record(NewHistoryEntry::of(&genre, ChangeType::Update, &ctx)?)?;
        Ok(genre)
      })
      .await
  }

  async fn delete_genre(&self, id: Uuid, ctx: ChangeContext) -> Result<()> {
    ctx.validate()?;

    self
      .transact(move |w| {
        let genre = Genre::require(w, id)?;

        let book_ids: Vec<String> = {
          let mut stmt = w.prepare("SELECT book_id FROM book_genres WHERE genre_id = ?1")?;
          stmt
            .query_map(params![encode_uuid(id)], |row| row.get(0))?
            .collect::<rusqlite::Result<_>>()?
        };
        for book_id in book_ids {
          let book = Book::require(w, decode_uuid(&book_id)?)?;
          let after: Vec<Uuid> = book.genre_ids.iter().copied().filter(|g| *g != id).collect();
          let relation = RelationChange::between(GENRES, &book.genre_ids, &after);
          let mut book = book;
          book.genre_ids = after;
          w.record(
            NewHistoryEntry::of(&book, ChangeType::RelationChanged, &ctx)?.with_relation(relation),
          )?;
        }

        record_delete(w, &genre, &ctx)?;
        w.execute("DELETE FROM genres WHERE genre_id = ?1", params![encode_uuid(id)])?;
        tracing::debug!(genre_id = %id, "genre deleted");
        Ok(())
      })
      .await
  }

  async fn list_genres(&self) -> Result<Vec<Genre>> {
    self
      .with_conn(|conn| {
        let mut stmt =
          conn.prepare(&format!("SELECT {} FROM genres ORDER BY name", RawGenre::COLUMNS))?;
        let raws = stmt
          .query_map([], RawGenre::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        raws.into_iter().map(RawGenre::into_genre).collect()
      })
      .await
  }

  // ── Books ─────────────────────────────────────────────────────────────────

  async fn create_book(&self, input: NewBook, ctx: ChangeContext) -> Result<Book> {
    ctx.validate()?;
    let input = input.validated()?;

    self
      .transact(move |w| {
        let at = now();
        let book = Book {
          book_id:     Uuid::new_v4(),
          created_at:  at,
          updated_at:  at,
          title:       input.title,
          author:      input.author,
          description: input.description,
          cover_image: input.cover_image.filter(|s| !s.is_empty()),
          book_file:   input.book_file.filter(|s| !s.is_empty()),
          owner_id:    input.owner_id,
          genre_ids:   normalize(input.genre_ids),
        };
        book.save(w)?;
        replace_genres(w, book.book_id, &book.genre_ids)?;

        let relation = RelationChange::between(GENRES, &[], &book.genre_ids);
        w.record(NewHistoryEntry::of(&book, ChangeType::Create, &ctx)?.with_relation(relation))?;
        tracing::debug!(book_id = %book.book_id, title = %book.title, "book created");
        Ok(book)
      })
      .await
  }

  async fn update_book(&self, id: Uuid, patch: BookPatch, ctx: ChangeContext) -> Result<Book> {
    ctx.validate()?;
    self.transact(move |w| update_book_tx(w, id, &patch, &ctx)).await
  }

  async fn set_book_genres(
    &self,
    id: Uuid,
    genre_ids: Vec<Uuid>,
    ctx: ChangeContext,
  ) -> Result<Book> {
    ctx.validate()?;
    let patch = BookPatch { genre_ids: Some(genre_ids), ..Default::default() };
    self.transact(move |w| update_book_tx(w, id, &patch, &ctx)).await
  }

  async fn delete_book(&self, id: Uuid, ctx: ChangeContext) -> Result<Book> {
    ctx.validate()?;

    self
      .transact(move |w| {
        let book = Book::require(w, id)?;

        for review in query_reviews(w, id)? {
          record_delete(w, &review, &ctx)?;
        }
        let messages: Vec<Message> = {
          let mut stmt = w.prepare(&format!(
            "SELECT {} FROM messages WHERE book_id = ?1",
            RawMessage::COLUMNS
          ))?;
          let raws = stmt
            .query_map(params![encode_uuid(id)], RawMessage::from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
          raws.into_iter().map(RawMessage::into_message).collect::<Result<_>>()?
        };
        for message in &messages {
          record_delete(w, message, &ctx)?;
        }

        record_delete(w, &book, &ctx)?;
        w.execute("DELETE FROM books WHERE book_id = ?1", params![encode_uuid(id)])?;
        tracing::debug!(book_id = %id, "book deleted");
        Ok(book)
      })
      .await
  }

  async fn get_book(&self, id: Uuid) -> Result<Option<Book>> {
    self.with_conn(move |conn| Book::load(conn, id)).await
  }

  async fn list_books(&self, owner: Option<Uuid>) -> Result<Vec<Book>> {
    self.with_conn(move |conn| query_books(conn, owner)).await
  }

  // ── Reviews ───────────────────────────────────────────────────────────────

  async fn create_review(&self, input: NewReview, ctx: ChangeContext) -> Result<Review> {
    ctx.validate()?;
    input.validate()?;

    self
      .transact(move |w| {
        Book::require(w, input.book_id)?;
        let review = Review {
          review_id:  Uuid::new_v4(),
          created_at: now(),
          book_id:    input.book_id,
          user_id:    input.user_id,
          text:       input.text,
          rating:     input.rating,
        };
        review.save(w)?;
        w.record(NewHistoryEntry::of(&review, ChangeType::Create, &ctx)?)?;
        Ok(review)
      })
      .await
  }

  async fn update_review(
    &self,
    id: Uuid,
    patch: ReviewPatch,
    ctx: ChangeContext,
  ) -> Result<Review> {
    ctx.validate()?;

    self
      .transact(move |w| {
        let mut review = Review::require(w, id)?;
        patch.apply(&mut review)?;
        review.save(w)?;
        w.record(NewHistoryEntry::of(&review, ChangeType::Update, &ctx)?)?;
        Ok(review)
      })
      .await
  }

  async fn delete_review(&self, id: Uuid, ctx: ChangeContext) -> Result<Review> {
    ctx.validate()?;

    self
      .transact(move |w| {
        let review = Review::require(w, id)?;
        record_delete(w, &review, &ctx)?;
        w.execute("DELETE FROM reviews WHERE review_id = ?1", params![encode_uuid(id)])?;
        Ok(review)
      })
      .await
  }

  async fn get_review(&self, id: Uuid) -> Result<Option<Review>> {
    self.with_conn(move |conn| Review::load(conn, id)).await
  }

  async fn reviews_for_book(&self, book_id: Uuid) -> Result<Vec<Review>> {
    self.with_conn(move |conn| query_reviews(conn, book_id)).await
  }

  // ── Profiles ──────────────────────────────────────────────────────────────

  async fn upsert_profile(
    &self,
    user_id: Uuid,
    patch: ProfilePatch,
    ctx: ChangeContext,
  ) -> Result<Profile> {
    ctx.validate()?;

    self
      .transact(move |w| {
        let (mut profile, change_type) = match profile_by_user(w, user_id)? {
          Some(existing) => (existing, ChangeType::Update),
          None => (Profile::blank(user_id, now()), ChangeType::Create),
        };
        patch.apply(&mut profile)?;
        profile.save(w)?;
        w.record(NewHistoryEntry::of(&profile, change_type, &ctx)?)?;
        Ok(profile)
      })
      .await
  }

  async fn get_profile(&self, user_id: Uuid) -> Result<Option<Profile>> {
    self.with_conn(move |conn| profile_by_user(conn, user_id)).await
  }

  // ── Messages ──────────────────────────────────────────────────────────────

  async fn send_message(&self, input: NewMessage, ctx: ChangeContext) -> Result<Message> {
    ctx.validate()?;
    input.validate()?;

    self
      .transact(move |w| {
        Book::require(w, input.book_id)?;
        let message = Message {
          message_id:   Uuid::new_v4(),
          created_at:   now(),
          sender_id:    input.sender_id,
          recipient_id: input.recipient_id,
          book_id:      input.book_id,
          subject:      input.subject,
          body:         input.body,
          is_read:      false,
        };
        message.save(w)?;
        w.record(NewHistoryEntry::of(&message, ChangeType::Create, &ctx)?)?;
        Ok(message)
      })
      .await
  }

  async fn mark_message_read(
    &self,
    id: Uuid,
    reader: Uuid,
    ctx: ChangeContext,
  ) -> Result<Message> {
    ctx.validate()?;
    let ctx = match ctx.reason {
      Some(_) => ctx,
      None => ctx.with_reason("marked as read"),
    };

    self
      .transact(move |w| {
        let mut message = Message::require(w, id)?;
        if message.recipient_id != reader {
          return Err(
            bookshare_core::Error::Forbidden("only the recipient can mark a message read".into())
              .into(),
          );
        }
        if message.is_read {
          return Ok(message);
        }
        message.is_read = true;
        message.save(w)?;
        w.record(NewHistoryEntry::of(&message, ChangeType::Update, &ctx)?)?;
        Ok(message)
      })
      .await
  }

  async fn get_message(&self, id: Uuid) -> Result<Option<Message>> {
    self.with_conn(move |conn| Message::load(conn, id)).await
  }

  async fn inbox(&self, user_id: Uuid) -> Result<Vec<Message>> {
    self.with_conn(move |conn| query_messages(conn, "recipient_id", user_id)).await
  }

  async fn sent(&self, user_id: Uuid) -> Result<Vec<Message>> {
    self.with_conn(move |conn| query_messages(conn, "sender_id", user_id)).await
  }

  async fn unread_count(&self, user_id: Uuid) -> Result<u64> {
    self
      .with_conn(move |conn| {
        let n: i64 = conn.query_row(
          "SELECT COUNT(*) FROM messages WHERE recipient_id = ?1 AND is_read = 0",
          params![encode_uuid(user_id)],
          |row| row.get(0),
        )?;
        Ok(n as u64)
      })
      .await
  }
}
