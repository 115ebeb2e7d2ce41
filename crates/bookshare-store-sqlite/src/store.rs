//! [`SqliteStore`]: the SQLite implementation of the Bookshare store traits.

use std::{ops::Deref, path::Path};

use bookshare_core::{
  history::{HistoricalRecord, HistoryPolicy, NewHistoryEntry},
  store::Store,
};
use rusqlite::{Connection, Transaction};

use crate::{history, schema::SCHEMA, Error, Result};

// ─── Store ───────────────────────────────────────────────────────────────────

/// A Bookshare store backed by a single SQLite file.
///
/// Cloning is cheap; the inner connection is reference-counted.
#[derive(Clone)]
pub struct SqliteStore {
  conn:   tokio_rusqlite::Connection,
  policy: HistoryPolicy,
}

impl SqliteStore {
  /// Open (or create) a store at `path` and run schema initialisation.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open(path).await?;
    let store = Self { conn, policy: HistoryPolicy::default() };
    store.init_schema().await?;
    Ok(store)
  }

  /// Open an in-memory store, used by tests.
  pub async fn open_in_memory() -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    let store = Self { conn, policy: HistoryPolicy::default() };
    store.init_schema().await?;
    Ok(store)
  }

  /// Choose how a failed history write affects the entity write it belongs
  /// to. Defaults to [`HistoryPolicy::Atomic`].
  pub fn with_history_policy(mut self, policy: HistoryPolicy) -> Self {
    self.policy = policy;
    self
  }

  pub fn history_policy(&self) -> HistoryPolicy { self.policy }

  async fn init_schema(&self) -> Result<()> {
    self
      .conn
      .call(|conn| {
        conn.execute_batch(SCHEMA)?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  /// Run `f` against the connection outside any explicit transaction.
  pub(crate) async fn with_conn<T, F>(&self, f: F) -> Result<T>
  where
    F: FnOnce(&Connection) -> Result<T> + Send + 'static,
    T: Send + 'static,
  {
    self.conn.call(move |conn| Ok(f(conn))).await?
  }

  /// Run `f` inside one transaction. The transaction commits only if `f`
  /// returns `Ok`; any error rolls back every write made through the
  /// [`Writer`], including history.
  pub(crate) async fn transact<T, F>(&self, f: F) -> Result<T>
  where
    F: FnOnce(&mut Writer<'_>) -> Result<T> + Send + 'static,
    T: Send + 'static,
  {
    let policy = self.policy;
    self.conn.call(move |conn| Ok(run_transaction(conn, policy, f))).await?
  }

  #[cfg(test)]
  pub(crate) async fn execute_batch(&self, sql: &'static str) -> Result<()> {
    self.with_conn(move |conn| Ok(conn.execute_batch(sql)?)).await
  }
}

fn run_transaction<T>(
  conn: &mut Connection,
  policy: HistoryPolicy,
  f: impl FnOnce(&mut Writer<'_>) -> Result<T>,
) -> Result<T> {
  let mut writer = Writer { tx: conn.transaction()?, policy };
  let out = f(&mut writer)?;
  writer.tx.commit()?;
  Ok(out)
}

impl Store for SqliteStore {
  type Error = Error;
}

// ─── Writer ──────────────────────────────────────────────────────────────────

/// An open write transaction plus the history policy that governs it.
/// Derefs to the connection for plain SQL.
pub(crate) struct Writer<'c> {
  tx:     Transaction<'c>,
  policy: HistoryPolicy,
}

impl Writer<'_> {
  /// Append a history record within this transaction. Returns `None` only
  /// under [`HistoryPolicy::BestEffort`] when the write failed.
  pub fn record(&mut self, entry: NewHistoryEntry) -> Result<Option<HistoricalRecord>> {
    history::append(&mut self.tx, self.policy, &entry)
  }
}

impl Deref for Writer<'_> {
  type Target = Connection;

  fn deref(&self) -> &Connection { &self.tx }
}
