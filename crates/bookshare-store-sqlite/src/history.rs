//! History persistence: appending records under a [`HistoryPolicy`] and the
//! [`HistoryStore`] read and restore operations.

use bookshare_core::{
  entity::{Book, EntityKind, EntityRef, Genre, Message, Profile, Review},
  history::{
    restore_reason, ChangeContext, ChangeType, HistoricalRecord, HistoryPolicy,
    NewHistoryEntry, VersionDiff, FIELDS_VERSION,
  },
  store::HistoryStore,
};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension as _, Transaction};
use uuid::Uuid;

use crate::{
  catalog::Persist,
  encode::{decode_dt, encode_dt, encode_uuid, encode_uuids, now, RawHistory},
  store::{SqliteStore, Writer},
  Error, Result,
};

// ─── Append ──────────────────────────────────────────────────────────────────

/// Append `entry` inside `tx`.
///
/// Under [`HistoryPolicy::Atomic`] a failure is returned as
/// [`Error::HistoryWrite`] and the caller's transaction rolls back with it.
/// Under [`HistoryPolicy::BestEffort`] the insert runs in a savepoint; a
/// failure rolls back only the savepoint, is logged, and yields `None`.
pub(crate) fn append(
  tx: &mut Transaction<'_>,
  policy: HistoryPolicy,
  entry: &NewHistoryEntry,
) -> Result<Option<HistoricalRecord>> {
  match policy {
    HistoryPolicy::Atomic => {
      insert(tx, entry).map(Some).map_err(|e| Error::HistoryWrite(Box::new(e)))
    }
    HistoryPolicy::BestEffort => {
      let sp = tx.savepoint()?;
      match insert(&sp, entry) {
        Ok(record) => {
          sp.commit()?;
          Ok(Some(record))
        }
        Err(e) => {
          tracing::warn!(
            entity_kind = %entry.entity.kind,
            entity_id = %entry.entity.id,
            change_type = %entry.change_type,
            error = %e,
            "history write failed; keeping entity change"
          );
          Ok(None)
        }
      }
    }
  }
}

fn insert(conn: &Connection, entry: &NewHistoryEntry) -> Result<HistoricalRecord> {
  let kind = entry.entity.kind.as_ref();
  let entity_id = encode_uuid(entry.entity.id);

  // Never let a record sort before an earlier one for the same entity, even
  // if the wall clock steps backwards.
  let latest: Option<String> = conn.query_row(
    "SELECT MAX(recorded_at) FROM history WHERE entity_kind = ?1 AND entity_id = ?2",
    params![kind, entity_id],
    |row| row.get(0),
  )?;
  let mut recorded_at = now();
  if let Some(latest) = latest {
    recorded_at = recorded_at.max(decode_dt(&latest)?);
  }

  conn.execute(
    "INSERT INTO history (
       entity_kind, entity_id, change_type, recorded_at, reason,
       actor_id, actor_name, owner_id, fields_version, snapshot
     ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
    params![
      kind,
      entity_id,
      entry.change_type.as_ref(),
      encode_dt(recorded_at),
      entry.reason,
      entry.actor_id.map(encode_uuid),
      entry.actor_name,
      entry.owner_id.map(encode_uuid),
      FIELDS_VERSION,
      serde_json::to_string(&entry.snapshot)?,
    ],
  )?;
  let history_id = conn.last_insert_rowid();

  if let Some(rel) = &entry.relation {
    conn.execute(
      "INSERT INTO history_relations (history_id, relation, added, removed)
       VALUES (?1, ?2, ?3, ?4)",
      params![history_id, rel.relation, encode_uuids(&rel.added)?, encode_uuids(&rel.removed)?],
    )?;
  }

  Ok(HistoricalRecord {
    history_id,
    entity_kind: entry.entity.kind,
    entity_id: entry.entity.id,
    change_type: entry.change_type,
    recorded_at,
    reason: entry.reason.clone(),
    actor_id: entry.actor_id,
    actor_name: entry.actor_name.clone(),
    owner_id: entry.owner_id,
    fields_version: FIELDS_VERSION,
    snapshot: entry.snapshot.clone(),
    relation: entry.relation.clone(),
  })
}

// ─── Queries ─────────────────────────────────────────────────────────────────

const NEWEST_FIRST: &str = "ORDER BY h.recorded_at DESC, h.history_id DESC";

fn query_history(
  conn: &Connection,
  filter: &str,
  limit: Option<usize>,
  params: impl rusqlite::Params,
) -> Result<Vec<HistoricalRecord>> {
  let mut stmt = conn.prepare(&format!(
    "{} WHERE {filter} {NEWEST_FIRST} LIMIT {}",
    RawHistory::SELECT,
    sql_limit(limit)
  ))?;
  let raws = stmt
    .query_map(params, RawHistory::from_row)?
    .collect::<rusqlite::Result<Vec<_>>>()?;
  raws.into_iter().map(RawHistory::into_record).collect()
}

fn find_record(
  conn: &Connection,
  entity: EntityRef,
  history_id: i64,
) -> Result<Option<HistoricalRecord>> {
  conn
    .query_row(
      &format!(
        "{} WHERE h.entity_kind = ?1 AND h.entity_id = ?2 AND h.history_id = ?3",
        RawHistory::SELECT
      ),
      params![entity.kind.as_ref(), encode_uuid(entity.id), history_id],
      RawHistory::from_row,
    )
    .optional()?
    .map(RawHistory::into_record)
    .transpose()
}

/// SQLite treats a negative LIMIT as "no limit".
fn sql_limit(limit: Option<usize>) -> i64 {
  limit.map_or(-1, |n| i64::try_from(n).unwrap_or(i64::MAX))
}

// ─── Restore ─────────────────────────────────────────────────────────────────

fn restore_entity<T: Persist>(
  w: &mut Writer<'_>,
  id: Uuid,
  record: &HistoricalRecord,
  ctx: &ChangeContext,
) -> Result<Option<HistoricalRecord>> {
  let mut live = T::require(w, id)?;
  live.restore_from(&record.snapshot)?;
  live.touch();
  live.save(w)?;
  w.record(NewHistoryEntry::of(&live, ChangeType::Update, ctx)?)
}

fn restore_tx(
  w: &mut Writer<'_>,
  entity: EntityRef,
  history_id: i64,
  ctx: &ChangeContext,
) -> Result<Option<HistoricalRecord>> {
  let Some(record) = find_record(w, entity, history_id)? else {
    return Ok(None);
  };
  let restored = match entity.kind {
    EntityKind::Book => restore_entity::<Book>(w, entity.id, &record, ctx)?,
    EntityKind::Review => restore_entity::<Review>(w, entity.id, &record, ctx)?,
    EntityKind::Genre => restore_entity::<Genre>(w, entity.id, &record, ctx)?,
    EntityKind::Message => restore_entity::<Message>(w, entity.id, &record, ctx)?,
    EntityKind::Profile => restore_entity::<Profile>(w, entity.id, &record, ctx)?,
  };
  tracing::info!(
    entity_kind = %entity.kind,
    entity_id = %entity.id,
    history_id,
    "entity restored"
  );
  Ok(restored)
}

// ─── HistoryStore impl ───────────────────────────────────────────────────────

impl HistoryStore for SqliteStore {
  async fn history(
    &self,
    entity: EntityRef,
    limit: Option<usize>,
  ) -> Result<Vec<HistoricalRecord>> {
    self
      .with_conn(move |conn| {
        query_history(
          conn,
          "h.entity_kind = ?1 AND h.entity_id = ?2",
          limit,
          params![entity.kind.as_ref(), encode_uuid(entity.id)],
        )
      })
      .await
  }

  async fn history_record(
    &self,
    entity: EntityRef,
    history_id: i64,
  ) -> Result<Option<HistoricalRecord>> {
    self.with_conn(move |conn| find_record(conn, entity, history_id)).await
  }

  async fn compare_versions(
    &self,
    entity: EntityRef,
    version1: i64,
    version2: i64,
  ) -> Result<Option<VersionDiff>> {
    self
      .with_conn(move |conn| {
        let first = find_record(conn, entity, version1)?;
        let second = find_record(conn, entity, version2)?;
        Ok(first.zip(second).map(|(a, b)| VersionDiff::between(a, b)))
      })
      .await
  }

  async fn restore(
    &self,
    entity: EntityRef,
    history_id: i64,
    ctx: ChangeContext,
  ) -> Result<Option<HistoricalRecord>> {
    ctx.validate()?;
    let ctx = match ctx.reason {
      Some(_) => ctx,
      None => ctx.with_reason(restore_reason(history_id)),
    };
    self.transact(move |w| restore_tx(w, entity, history_id, &ctx)).await
  }

  async fn recent_changes(
    &self,
    kind: EntityKind,
    since: DateTime<Utc>,
    limit: usize,
  ) -> Result<Vec<HistoricalRecord>> {
    self
      .with_conn(move |conn| {
        query_history(
          conn,
          "h.entity_kind = ?1 AND h.recorded_at >= ?2",
          Some(limit),
          params![kind.as_ref(), encode_dt(since)],
        )
      })
      .await
  }

  async fn user_timeline(
    &self,
    user_id: Uuid,
    since: DateTime<Utc>,
  ) -> Result<Vec<HistoricalRecord>> {
    self
      .with_conn(move |conn| {
        query_history(
          conn,
          "h.owner_id = ?1 AND h.recorded_at >= ?2",
          None,
          params![encode_uuid(user_id), encode_dt(since)],
        )
      })
      .await
  }
}
