//! SQL schema for the Bookshare SQLite store.
//!
//! Executed once at connection startup. Future migrations will be gated on
//! `PRAGMA user_version`.

/// Full schema DDL; idempotent thanks to `IF NOT EXISTS`.
pub const SCHEMA: &str = "
PRAGMA journal_mode = WAL;
PRAGMA foreign_keys = ON;

CREATE TABLE IF NOT EXISTS genres (
    genre_id    TEXT PRIMARY KEY,
    created_at  TEXT NOT NULL,
    name        TEXT NOT NULL UNIQUE
);

CREATE TABLE IF NOT EXISTS books (
    book_id     TEXT PRIMARY KEY,
    created_at  TEXT NOT NULL,
    updated_at  TEXT NOT NULL,
    title       TEXT NOT NULL,
    author      TEXT NOT NULL,
    description TEXT NOT NULL DEFAULT '',
    cover_image TEXT,               -- blob-store key
    book_file   TEXT,               -- blob-store key
    owner_id    TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS book_genres (
    book_id   TEXT NOT NULL REFERENCES books(book_id)   ON DELETE CASCADE,
    genre_id  TEXT NOT NULL REFERENCES genres(genre_id) ON DELETE CASCADE,
    PRIMARY KEY (book_id, genre_id)
);

CREATE TABLE IF NOT EXISTS reviews (
    review_id   TEXT PRIMARY KEY,
    created_at  TEXT NOT NULL,
    book_id     TEXT NOT NULL REFERENCES books(book_id) ON DELETE CASCADE,
    user_id     TEXT NOT NULL,
    text        TEXT NOT NULL,
    rating      INTEGER NOT NULL CHECK (rating BETWEEN 1 AND 5),
    UNIQUE (book_id, user_id)
);

CREATE TABLE IF NOT EXISTS profiles (
    profile_id  TEXT PRIMARY KEY,
    created_at  TEXT NOT NULL,
    user_id     TEXT NOT NULL UNIQUE,
    bio         TEXT NOT NULL DEFAULT '',
    location    TEXT NOT NULL DEFAULT '',
    birth_date  TEXT,               -- YYYY-MM-DD
    avatar      TEXT,
    phone       TEXT NOT NULL DEFAULT '',
    telegram    TEXT NOT NULL DEFAULT ''
);

CREATE TABLE IF NOT EXISTS messages (
    message_id    TEXT PRIMARY KEY,
    created_at    TEXT NOT NULL,
    sender_id     TEXT NOT NULL,
    recipient_id  TEXT NOT NULL,
    book_id       TEXT NOT NULL REFERENCES books(book_id) ON DELETE CASCADE,
    subject       TEXT NOT NULL,
    body          TEXT NOT NULL,
    is_read       INTEGER NOT NULL DEFAULT 0
);

-- History is strictly append-only; see the triggers below.
-- No foreign keys: records outlive the entities they describe.
CREATE TABLE IF NOT EXISTS history (
    history_id      INTEGER PRIMARY KEY AUTOINCREMENT,
    entity_kind     TEXT NOT NULL,
    entity_id       TEXT NOT NULL,
    change_type     TEXT NOT NULL,  -- 'create' | 'update' | 'delete' | 'relation_changed'
    recorded_at     TEXT NOT NULL,  -- RFC 3339 UTC, microsecond precision
    reason          TEXT,
    actor_id        TEXT,
    actor_name      TEXT,
    owner_id        TEXT,
    fields_version  INTEGER NOT NULL,
    snapshot        TEXT NOT NULL   -- JSON object of tracked fields
);

-- Relation changes (e.g. book genres) recorded alongside a history row.
CREATE TABLE IF NOT EXISTS history_relations (
    history_id  INTEGER PRIMARY KEY REFERENCES history(history_id),
    relation    TEXT NOT NULL,
    added       TEXT NOT NULL,      -- JSON array of UUIDs
    removed     TEXT NOT NULL       -- JSON array of UUIDs
);

CREATE TABLE IF NOT EXISTS activities (
    activity_id  INTEGER PRIMARY KEY AUTOINCREMENT,
    actor_id     TEXT NOT NULL,
    action       TEXT NOT NULL,
    target_type  TEXT,
    target_id    TEXT,
    description  TEXT,
    ip_address   TEXT,
    user_agent   TEXT,
    occurred_at  TEXT NOT NULL
);

CREATE TRIGGER IF NOT EXISTS history_no_update BEFORE UPDATE ON history
BEGIN SELECT RAISE(ABORT, 'history is append-only'); END;
CREATE TRIGGER IF NOT EXISTS history_no_delete BEFORE DELETE ON history
BEGIN SELECT RAISE(ABORT, 'history is append-only'); END;
CREATE TRIGGER IF NOT EXISTS history_relations_no_update BEFORE UPDATE ON history_relations
BEGIN SELECT RAISE(ABORT, 'history is append-only'); END;
CREATE TRIGGER IF NOT EXISTS history_relations_no_delete BEFORE DELETE ON history_relations
BEGIN SELECT RAISE(ABORT, 'history is append-only'); END;
CREATE TRIGGER IF NOT EXISTS activities_no_update BEFORE UPDATE ON activities
BEGIN SELECT RAISE(ABORT, 'activity log is append-only'); END;
CREATE TRIGGER IF NOT EXISTS activities_no_delete BEFORE DELETE ON activities
BEGIN SELECT RAISE(ABORT, 'activity log is append-only'); END;

CREATE INDEX IF NOT EXISTS books_owner_idx       ON books(owner_id);
CREATE INDEX IF NOT EXISTS reviews_book_idx      ON reviews(book_id);
CREATE INDEX IF NOT EXISTS messages_recipient_idx ON messages(recipient_id);
CREATE INDEX IF NOT EXISTS messages_sender_idx   ON messages(sender_id);
CREATE INDEX IF NOT EXISTS history_entity_idx    ON history(entity_kind, entity_id);
CREATE INDEX IF NOT EXISTS history_owner_idx     ON history(owner_id);
CREATE INDEX IF NOT EXISTS history_recorded_idx  ON history(recorded_at);
CREATE INDEX IF NOT EXISTS activities_actor_idx  ON activities(actor_id);
CREATE INDEX IF NOT EXISTS activities_time_idx   ON activities(occurred_at);

PRAGMA user_version = 1;
";
