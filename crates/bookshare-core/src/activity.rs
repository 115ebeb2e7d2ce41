//! Activity log types: discrete user actions with client metadata.
//!
//! Activity records are append-only and are only written after the domain
//! operation they describe has committed.

use std::collections::BTreeMap;

use chrono::{DateTime, Duration, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumIter, EnumString};
use uuid::Uuid;

use crate::{
  entity::{EntityKind, EntityRef},
  validate::ValidationErrors,
};

/// The closed set of loggable actions.
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
pub enum ActionKind {
  CreateBook,
  UpdateBook,
  DeleteBook,
  CreateReview,
  UpdateReview,
  DeleteReview,
  SendMessage,
  ReadMessage,
  UpdateProfile,
  ToggleFavorite,
  Login,
  Logout,
}

/// Request metadata supplied by the HTTP layer.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClientContext {
  /// Raw `X-Forwarded-For` header value (comma-separated chain).
  pub forwarded_for: Option<String>,
  /// Address of the direct peer.
  pub remote_addr:   Option<String>,
  pub user_agent:    Option<String>,
}

impl ClientContext {
  /// The originating IP: first hop of the forwarded-for chain, else the
  /// direct peer.
  pub fn ip(&self) -> Option<String> {
    self
      .forwarded_for
      .as_deref()
      .and_then(|chain| chain.split(',').next())
      .map(str::trim)
      .filter(|ip| !ip.is_empty())
      .map(str::to_owned)
      .or_else(|| self.remote_addr.clone())
  }
}

/// Input to [`crate::store::ActivityLog::record_activity`].
#[derive(Debug, Clone)]
pub struct NewActivity {
  pub actor_id:    Uuid,
  pub action:      ActionKind,
  pub target:      Option<EntityRef>,
  pub description: Option<String>,
  pub client:      Option<ClientContext>,
}

impl NewActivity {
  pub fn new(actor_id: Uuid, action: ActionKind) -> Self {
    Self { actor_id, action, target: None, description: None, client: None }
  }

  pub fn target(mut self, kind: EntityKind, id: Uuid) -> Self {
    self.target = Some(EntityRef::new(kind, id));
    self
  }

  pub fn describe(mut self, description: impl Into<String>) -> Self {
    self.description = Some(description.into());
    self
  }

  pub fn client(mut self, client: Option<ClientContext>) -> Self {
    self.client = client;
    self
  }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActivityRecord {
  pub activity_id: i64,
  pub actor_id:    Uuid,
  pub action:      ActionKind,
  pub target_type: Option<EntityKind>,
  pub target_id:   Option<Uuid>,
  pub description: Option<String>,
  pub ip_address:  Option<String>,
  pub user_agent:  Option<String>,
  pub occurred_at: DateTime<Utc>,
}

/// Per-actor action counts over a window. Kinds with no occurrences are
/// absent rather than zero.
pub type ActivitySummary = BTreeMap<ActionKind, u64>;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DailyCount {
  pub date:       NaiveDate,
  pub activities: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SystemActivityStats {
  pub window_days:      u32,
  pub total_activities: u64,
  pub active_users:     u64,
  pub books_created:    u64,
  pub reviews_created:  u64,
  pub messages_sent:    u64,
  /// One entry per calendar day in the window, today first.
  pub daily:            Vec<DailyCount>,
}

/// Longest accepted lookback window, in days.
pub const MAX_WINDOW_DAYS: u32 = 3650;

/// Require a lookback window of `1..=MAX_WINDOW_DAYS` days.
pub fn check_window(days: u32) -> Result<(), ValidationErrors> {
  let mut errors = ValidationErrors::default();
  if !(1..=MAX_WINDOW_DAYS).contains(&days) {
    errors.push("days", format!("must be between 1 and {MAX_WINDOW_DAYS} (got {days})"));
  }
  errors.finish()
}

fn out_of_range(days: u32) -> ValidationErrors {
  let mut errors = ValidationErrors::default();
  errors.push("days", format!("window of {days} days is out of range"));
  errors
}

/// Start of a trailing window of `days` days ending at `now`.
pub fn window_start(now: DateTime<Utc>, days: u32) -> Result<DateTime<Utc>, ValidationErrors> {
  check_window(days)?;
  now
    .checked_sub_signed(Duration::days(i64::from(days)))
    .ok_or_else(|| out_of_range(days))
}

/// Midnight UTC of the oldest calendar day covered by a `days`-long daily
/// breakdown ending today.
pub fn first_day_start(
  now: DateTime<Utc>,
  days: u32,
) -> Result<DateTime<Utc>, ValidationErrors> {
  check_window(days)?;
  let first = now
    .date_naive()
    .checked_sub_signed(Duration::days(i64::from(days - 1)))
    .ok_or_else(|| out_of_range(days))?;
  Ok(first.and_time(NaiveTime::MIN).and_utc())
}

/// Expand sparse per-day counts into one entry per day, newest first,
/// filling missing days with zero.
pub fn fill_daily(
  counts: &BTreeMap<NaiveDate, u64>,
  today: NaiveDate,
  days: u32,
) -> Vec<DailyCount> {
  (0..days)
    .map(|i| {
      let date = today - Duration::days(i64::from(i));
      DailyCount { date, activities: counts.get(&date).copied().unwrap_or(0) }
    })
    .collect()
}
