//! [`ActivityLog`] for [`SqliteStore`].

use std::collections::BTreeMap;

use bookshare_core::activity::{
  fill_daily, first_day_start, window_start, ActionKind, ActivityRecord, ActivitySummary,
  NewActivity, SystemActivityStats,
};
use bookshare_core::store::ActivityLog;
use chrono::{DateTime, Utc};
use rusqlite::params;
use uuid::Uuid;

use crate::{
  encode::{decode_date, decode_enum, encode_dt, encode_uuid, now, RawActivity},
  store::SqliteStore,
  Result,
};

impl ActivityLog for SqliteStore {
  async fn record_activity(&self, input: NewActivity) -> Result<ActivityRecord> {
    self
      .with_conn(move |conn| {
        let occurred_at = now();
        let ip_address = input.client.as_ref().and_then(|c| c.ip());
        let user_agent = input.client.as_ref().and_then(|c| c.user_agent.clone());

        conn.execute(
          "INSERT INTO activities (
             actor_id, action, target_type, target_id,
             description, ip_address, user_agent, occurred_at
           ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
          params![
            encode_uuid(input.actor_id),
            input.action.as_ref(),
            input.target.map(|t| t.kind.as_ref().to_owned()),
            input.target.map(|t| encode_uuid(t.id)),
            input.description,
            ip_address,
            user_agent,
            encode_dt(occurred_at),
          ],
        )?;

        Ok(ActivityRecord {
          activity_id: conn.last_insert_rowid(),
          actor_id: input.actor_id,
          action: input.action,
          target_type: input.target.map(|t| t.kind),
          target_id: input.target.map(|t| t.id),
          description: input.description,
          ip_address,
          user_agent,
          occurred_at,
        })
      })
      .await
  }

  async fn activities_for(&self, actor_id: Uuid, limit: usize) -> Result<Vec<ActivityRecord>> {
    let limit = i64::try_from(limit).unwrap_or(i64::MAX);
    self
      .with_conn(move |conn| {
        let mut stmt = conn.prepare(&format!(
          "SELECT {} FROM activities
           WHERE actor_id = ?1
           ORDER BY occurred_at DESC, activity_id DESC
           LIMIT ?2",
          RawActivity::COLUMNS
        ))?;
        let raws = stmt
          .query_map(params![encode_uuid(actor_id), limit], RawActivity::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        raws.into_iter().map(RawActivity::into_activity).collect()
      })
      .await
  }

  async fn activity_summary(
    &self,
    actor_id: Uuid,
    since: DateTime<Utc>,
  ) -> Result<ActivitySummary> {
    self
      .with_conn(move |conn| {
        let mut stmt = conn.prepare(
          "SELECT action, COUNT(*) FROM activities
           WHERE actor_id = ?1 AND occurred_at >= ?2
           GROUP BY action",
        )?;
        let rows = stmt
          .query_map(params![encode_uuid(actor_id), encode_dt(since)], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?))
          })?
          .collect::<rusqlite::Result<Vec<_>>>()?;

        rows
          .into_iter()
          .map(|(action, n)| Ok((decode_enum::<ActionKind>("action", &action)?, n as u64)))
          .collect()
      })
      .await
  }

  async fn system_activity_stats(
    &self,
    days: u32,
    now: DateTime<Utc>,
  ) -> Result<SystemActivityStats> {
    // Window bounds are checked before entering the connection thread.
    let since = encode_dt(window_start(now, days)?);
    let first_day = encode_dt(first_day_start(now, days)?);
    self
      .with_conn(move |conn| {
        let until = encode_dt(now);

        let (total, active, books, reviews, messages): (i64, i64, i64, i64, i64) = conn
          .query_row(
            "SELECT
               COUNT(*),
               COUNT(DISTINCT actor_id),
               COUNT(CASE WHEN action = ?3 THEN 1 END),
               COUNT(CASE WHEN action = ?4 THEN 1 END),
               COUNT(CASE WHEN action = ?5 THEN 1 END)
             FROM activities
             WHERE occurred_at >= ?1 AND occurred_at <= ?2",
            params![
              since,
              until,
              ActionKind::CreateBook.as_ref(),
              ActionKind::CreateReview.as_ref(),
              ActionKind::SendMessage.as_ref(),
            ],
            |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?, row.get(4)?)),
          )?;

        // Daily buckets cover whole calendar days, so they start at midnight
        // of the oldest day rather than at `now - days`.
        let mut stmt = conn.prepare(
          "SELECT substr(occurred_at, 1, 10) AS day, COUNT(*) FROM activities
           WHERE occurred_at >= ?1 AND occurred_at <= ?2
           GROUP BY day",
        )?;
        let rows = stmt
          .query_map(params![first_day, until], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?))
          })?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        let mut per_day = BTreeMap::new();
        for (day, n) in rows {
          per_day.insert(decode_date(&day)?, n as u64);
        }

        Ok(SystemActivityStats {
          window_days:      days,
          total_activities: total as u64,
          active_users:     active as u64,
          books_created:    books as u64,
          reviews_created:  reviews as u64,
          messages_sent:    messages as u64,
          daily:            fill_daily(&per_day, now.date_naive(), days),
        })
      })
      .await
  }
}
