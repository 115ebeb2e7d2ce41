//! The history recorder: tracked fields, snapshots, diffs and restoration.
//!
//! Every mutation of an entity produces exactly one [`HistoricalRecord`].
//! Records are append-only. Which fields a snapshot carries is decided by an
//! explicit per-type list ([`Tracked::FIELDS`]) rather than by whatever the
//! struct happens to contain, so the audit format only changes when that list
//! (and [`FIELDS_VERSION`]) changes.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::Value;
use strum::{AsRefStr, Display, EnumString};
use uuid::Uuid;

use crate::{
  entity::{Book, EntityKind, EntityRef, Genre, Message, Profile, Review},
  validate::{check_reason, ValidationErrors},
  Result,
};

/// Version of the tracked-field lists below. Stored on every record.
pub const FIELDS_VERSION: u32 = 1;

/// Tracked field name → JSON value.
pub type Snapshot = BTreeMap<String, Value>;

// ─── Tracked fields ──────────────────────────────────────────────────────────

/// One versioned field of an entity, with its human-readable label.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TrackedField {
  pub name:  &'static str,
  pub label: &'static str,
}

impl TrackedField {
  pub const fn new(name: &'static str, label: &'static str) -> Self {
    Self { name, label }
  }
}

/// An entity whose changes are recorded in history.
///
/// Snapshots go through the entity's serde representation, so every name in
/// `FIELDS` must be a top-level key of the serialised struct. Identity and
/// creation timestamp are never listed.
pub trait Tracked: Serialize + DeserializeOwned {
  const KIND: EntityKind;
  const FIELDS: &'static [TrackedField];

  fn entity_id(&self) -> Uuid;

  /// The user that owns this entity, used for per-user timelines.
  fn owner_id(&self) -> Option<Uuid>;

  fn entity_ref(&self) -> EntityRef { EntityRef::new(Self::KIND, self.entity_id()) }

  /// Capture the current value of every tracked field.
  fn snapshot(&self) -> Result<Snapshot> {
    let value = serde_json::to_value(self)?;
    Ok(
      Self::FIELDS
        .iter()
        .map(|f| {
          (f.name.to_owned(), value.get(f.name).cloned().unwrap_or(Value::Null))
        })
        .collect(),
    )
  }

  /// Overwrite every tracked field present in `snapshot`. Untracked fields
  /// (identity, creation time, relations) are left as they are.
  fn restore_from(&mut self, snapshot: &Snapshot) -> Result<()> {
    let mut value = serde_json::to_value(&*self)?;
    if let Some(obj) = value.as_object_mut() {
      for field in Self::FIELDS {
        if let Some(v) = snapshot.get(field.name) {
          obj.insert(field.name.to_owned(), v.clone());
        }
      }
    }
    *self = serde_json::from_value(value)?;
    Ok(())
  }
}

/// The tracked-field list for `kind`.
pub fn fields_for(kind: EntityKind) -> &'static [TrackedField] {
  match kind {
    EntityKind::Book => Book::FIELDS,
    EntityKind::Review => Review::FIELDS,
    EntityKind::Genre => Genre::FIELDS,
    EntityKind::Message => Message::FIELDS,
    EntityKind::Profile => Profile::FIELDS,
  }
}

// ─── Change metadata ─────────────────────────────────────────────────────────

#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  Serialize,
  Deserialize,
  Display,
  EnumString,
  AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ChangeType {
  Create,
  Update,
  Delete,
  /// Only a multi-valued relation (e.g. a book's genres) changed.
  RelationChanged,
}

/// The acting user, as supplied by the identity provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
  pub user_id:      Uuid,
  pub display_name: Option<String>,
}

impl Actor {
  pub fn new(user_id: Uuid) -> Self { Self { user_id, display_name: None } }

  pub fn named(user_id: Uuid, name: impl Into<String>) -> Self {
    Self { user_id, display_name: Some(name.into()) }
  }
}

/// Who is making a change and why. Passed explicitly into every mutation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChangeContext {
  pub actor:  Option<Actor>,
  pub reason: Option<String>,
}

impl ChangeContext {
  pub fn by(actor: Actor) -> Self { Self { actor: Some(actor), reason: None } }

  /// A change with no attributable user.
  pub fn system() -> Self { Self::default() }

  pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
    self.reason = Some(reason.into());
    self
  }

  pub fn actor_id(&self) -> Option<Uuid> { self.actor.as_ref().map(|a| a.user_id) }

  pub fn validate(&self) -> Result<(), ValidationErrors> {
    check_reason(self.reason.as_deref())
  }
}

/// What to do when the history write fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HistoryPolicy {
  /// Entity and history writes commit or roll back together.
  #[default]
  Atomic,
  /// The entity write commits even if its history write fails; the failure
  /// is logged.
  BestEffort,
}

/// Reason attached to a restoration when the caller gives none.
pub fn restore_reason(history_id: i64) -> String {
  format!("restored to version {history_id}")
}

// ─── Relations ───────────────────────────────────────────────────────────────

/// Change to a multi-valued relation, recorded alongside a history record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelationChange {
  pub relation: String,
  pub added:    Vec<Uuid>,
  pub removed:  Vec<Uuid>,
}

impl RelationChange {
  /// The change from `before` to `after`, or `None` when the sets are equal.
  pub fn between(relation: &str, before: &[Uuid], after: &[Uuid]) -> Option<Self> {
    let before: BTreeSet<Uuid> = before.iter().copied().collect();
    let after: BTreeSet<Uuid> = after.iter().copied().collect();
    let added: Vec<Uuid> = after.difference(&before).copied().collect();
    let removed: Vec<Uuid> = before.difference(&after).copied().collect();
    if added.is_empty() && removed.is_empty() {
      return None;
    }
    Some(Self { relation: relation.to_owned(), added, removed })
  }
}

// ─── Records ─────────────────────────────────────────────────────────────────

/// An immutable snapshot of one entity at one point in time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoricalRecord {
  /// Monotonic sequence id; breaks ties between equal timestamps.
  pub history_id:     i64,
  pub entity_kind:    EntityKind,
  pub entity_id:      Uuid,
  pub change_type:    ChangeType,
  pub recorded_at:    DateTime<Utc>,
  pub reason:         Option<String>,
  pub actor_id:       Option<Uuid>,
  pub actor_name:     Option<String>,
  pub owner_id:       Option<Uuid>,
  pub fields_version: u32,
  pub snapshot:       Snapshot,
  pub relation:       Option<RelationChange>,
}

impl HistoricalRecord {
  pub fn entity(&self) -> EntityRef { EntityRef::new(self.entity_kind, self.entity_id) }
}

/// Everything a store needs to append a [`HistoricalRecord`]; the store
/// assigns `history_id` and `recorded_at`.
#[derive(Debug, Clone)]
pub struct NewHistoryEntry {
  pub entity:      EntityRef,
  pub owner_id:    Option<Uuid>,
  pub change_type: ChangeType,
  pub snapshot:    Snapshot,
  pub relation:    Option<RelationChange>,
  pub reason:      Option<String>,
  pub actor_id:    Option<Uuid>,
  pub actor_name:  Option<String>,
}

impl NewHistoryEntry {
  /// Build an entry capturing the current state of `entity`.
  pub fn of<T: Tracked>(
    entity: &T,
    change_type: ChangeType,
    ctx: &ChangeContext,
  ) -> Result<Self> {
    Ok(Self {
      entity: entity.entity_ref(),
      owner_id: entity.owner_id(),
      change_type,
      snapshot: entity.snapshot()?,
      relation: None,
      reason: ctx.reason.clone(),
      actor_id: ctx.actor_id(),
      actor_name: ctx.actor.as_ref().and_then(|a| a.display_name.clone()),
    })
  }

  pub fn with_relation(mut self, relation: Option<RelationChange>) -> Self {
    self.relation = relation;
    self
  }
}

// ─── Diff ────────────────────────────────────────────────────────────────────

/// One field that differs between two snapshots.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldChange {
  pub field:     String,
  pub label:     String,
  pub old_value: Value,
  pub new_value: Value,
}

/// Result of comparing two records of the same entity.
#[derive(Debug, Clone, Serialize)]
pub struct VersionDiff {
  pub version1: HistoricalRecord,
  pub version2: HistoricalRecord,
  pub changes:  Vec<FieldChange>,
}

impl VersionDiff {
  pub fn between(version1: HistoricalRecord, version2: HistoricalRecord) -> Self {
    let changes = diff_snapshots(
      fields_for(version1.entity_kind),
      &version1.snapshot,
      &version2.snapshot,
    );
    Self { version1, version2, changes }
  }
}

/// Fields in `fields` whose values differ between `old` and `new`, in the
/// order of `fields`. A field absent from a snapshot compares as `null`.
pub fn diff_snapshots(
  fields: &[TrackedField],
  old: &Snapshot,
  new: &Snapshot,
) -> Vec<FieldChange> {
  fields
    .iter()
    .filter_map(|f| {
      let a = old.get(f.name).cloned().unwrap_or(Value::Null);
      let b = new.get(f.name).cloned().unwrap_or(Value::Null);
      (a != b).then(|| FieldChange {
        field:     f.name.to_owned(),
        label:     f.label.to_owned(),
        old_value: a,
        new_value: b,
      })
    })
    .collect()
}
