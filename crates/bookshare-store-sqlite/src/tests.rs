//! Integration tests for `SqliteStore` against an in-memory database.

use bookshare_core::{
  activity::{ActionKind, ClientContext, NewActivity},
  entity::{
    BookPatch, EntityKind, EntityRef, NewBook, NewGenre, NewMessage, NewReview,
    ProfilePatch, ReviewPatch,
  },
  history::{Actor, ChangeContext, ChangeType, HistoryPolicy},
  store::{ActivityLog, CatalogStore, HistoryStore, StatisticsStore},
};
use chrono::{Duration, SubsecRound as _, Utc};
use serde_json::json;
use uuid::Uuid;

use crate::{
  encode::{encode_dt, encode_uuid},
  Error, SqliteStore,
};

async fn store() -> SqliteStore {
  SqliteStore::open_in_memory()
    .await
    .expect("in-memory store")
}

fn ctx(user: Uuid) -> ChangeContext { ChangeContext::by(Actor::named(user, "alice")) }

fn dune(owner: Uuid) -> NewBook {
  NewBook {
    title:       "Dune".into(),
    author:      "Frank Herbert".into(),
    description: "Desert planet".into(),
    cover_image: None,
    book_file:   None,
    owner_id:    owner,
    genre_ids:   vec![],
  }
}

fn review(book_id: Uuid, user_id: Uuid, rating: u8) -> NewReview {
  NewReview { book_id, user_id, text: "Loved it".into(), rating }
}

fn is_core(e: &Error, check: impl Fn(&bookshare_core::Error) -> bool) -> bool {
  matches!(e, Error::Core(inner) if check(inner))
}

/// Makes every history insert whose reason is `boom` fail.
const FAILING_HISTORY: &str = "
CREATE TRIGGER history_boom BEFORE INSERT ON history
WHEN NEW.reason = 'boom'
BEGIN SELECT RAISE(ABORT, 'history unavailable'); END;
";

// ─── Books & history ─────────────────────────────────────────────────────────

#[tokio::test]
async fn book_lifecycle_records_three_versions() {
  let s = store().await;
  let owner = Uuid::new_v4();

  let book = s.create_book(dune(owner), ctx(owner)).await.unwrap();
  let patch = BookPatch { title: Some("Dune (revised)".into()), ..Default::default() };
  s.update_book(book.book_id, patch, ctx(owner).with_reason("typo fix")).await.unwrap();
  s.delete_book(book.book_id, ctx(owner)).await.unwrap();

  assert!(s.get_book(book.book_id).await.unwrap().is_none());

  let entity = EntityRef::new(EntityKind::Book, book.book_id);
  let history = s.history(entity, None).await.unwrap();
  let kinds: Vec<ChangeType> = history.iter().map(|h| h.change_type).collect();
  assert_eq!(kinds, vec![ChangeType::Delete, ChangeType::Update, ChangeType::Create]);

  let update = &history[1];
  assert_eq!(update.reason.as_deref(), Some("typo fix"));
  assert_eq!(update.actor_id, Some(owner));
  assert_eq!(update.actor_name.as_deref(), Some("alice"));
  assert_eq!(update.snapshot["title"], json!("Dune (revised)"));

  let diff = s
    .compare_versions(entity, history[2].history_id, update.history_id)
    .await
    .unwrap()
    .unwrap();
  assert_eq!(diff.changes.len(), 1);
  assert_eq!(diff.changes[0].field, "title");
  assert_eq!(diff.changes[0].old_value, json!("Dune"));
  assert_eq!(diff.changes[0].new_value, json!("Dune (revised)"));
}

#[tokio::test]
async fn history_is_newest_first_and_limited() {
  let s = store().await;
  let owner = Uuid::new_v4();
  let book = s.create_book(dune(owner), ctx(owner)).await.unwrap();
  for i in 0..4 {
    let patch = BookPatch { description: Some(format!("v{i}")), ..Default::default() };
    s.update_book(book.book_id, patch, ctx(owner)).await.unwrap();
  }

  let entity = EntityRef::new(EntityKind::Book, book.book_id);
  let all = s.history(entity, None).await.unwrap();
  assert_eq!(all.len(), 5);
  assert!(all.windows(2).all(|w| {
    (w[0].recorded_at, w[0].history_id) > (w[1].recorded_at, w[1].history_id)
  }));

  let two = s.history(entity, Some(2)).await.unwrap();
  assert_eq!(two.len(), 2);
  assert_eq!(two[0].snapshot["description"], json!("v3"));
}

#[tokio::test]
async fn recorded_at_never_goes_backwards() {
  let s = store().await;
  let owner = Uuid::new_v4();
  let book = s.create_book(dune(owner), ctx(owner)).await.unwrap();

  // A record stamped an hour ahead, as if written by a clock that ran fast.
  let ahead = (Utc::now() + Duration::hours(1)).trunc_subsecs(6);
  let (stamp, id) = (encode_dt(ahead), encode_uuid(book.book_id));
  s.with_conn(move |conn| {
    conn.execute(
      "INSERT INTO history (
         entity_kind, entity_id, change_type, recorded_at,
         fields_version, snapshot
       ) VALUES ('book', ?1, 'update', ?2, 1, '{}')",
      rusqlite::params![id, stamp],
    )?;
    Ok(())
  })
  .await
  .unwrap();

  let patch = BookPatch { title: Some("Dune Messiah".into()), ..Default::default() };
  s.update_book(book.book_id, patch, ctx(owner)).await.unwrap();

  let records = s.history(EntityRef::new(EntityKind::Book, book.book_id), None).await.unwrap();
  assert_eq!(records.len(), 3);
  assert!(records[0].recorded_at >= ahead);
  assert_eq!(records[1].recorded_at, ahead);
  assert_eq!(records[0].snapshot["title"], json!("Dune Messiah"));
  assert!(records[0].history_id > records[1].history_id);
}

#[tokio::test]
async fn invalid_book_is_rejected_without_history() {
  let s = store().await;
  let owner = Uuid::new_v4();
  let mut input = dune(owner);
  input.title = " x ".into();

  let err = s.create_book(input, ctx(owner)).await.unwrap_err();
  assert!(is_core(&err, |e| matches!(e, bookshare_core::Error::Validation(_))));
  assert!(s.list_books(None).await.unwrap().is_empty());
  assert!(s.user_timeline(owner, Utc::now() - Duration::days(1)).await.unwrap().is_empty());
}

#[tokio::test]
async fn reason_over_cap_is_rejected() {
  let s = store().await;
  let owner = Uuid::new_v4();
  let err = s
    .create_book(dune(owner), ctx(owner).with_reason("r".repeat(501)))
    .await
    .unwrap_err();
  assert!(is_core(&err, |e| matches!(e, bookshare_core::Error::Validation(_))));
}

#[tokio::test]
async fn genre_only_change_records_relation() {
  let s = store().await;
  let owner = Uuid::new_v4();
  let scifi = s.create_genre(NewGenre { name: "Sci-Fi".into() }, ctx(owner)).await.unwrap();
  let book = s.create_book(dune(owner), ctx(owner)).await.unwrap();

  let updated = s
    .set_book_genres(book.book_id, vec![scifi.genre_id], ctx(owner))
    .await
    .unwrap();
  assert_eq!(updated.genre_ids, vec![scifi.genre_id]);

  let entity = EntityRef::new(EntityKind::Book, book.book_id);
  let latest = s.history(entity, Some(1)).await.unwrap().remove(0);
  assert_eq!(latest.change_type, ChangeType::RelationChanged);
  let relation = latest.relation.unwrap();
  assert_eq!(relation.relation, "genres");
  assert_eq!(relation.added, vec![scifi.genre_id]);
  assert!(relation.removed.is_empty());
}

#[tokio::test]
async fn unknown_genre_is_not_found() {
  let s = store().await;
  let owner = Uuid::new_v4();
  let mut input = dune(owner);
  input.genre_ids = vec![Uuid::new_v4()];

  let err = s.create_book(input, ctx(owner)).await.unwrap_err();
  assert!(is_core(&err, |e| matches!(
    e,
    bookshare_core::Error::NotFound { kind: EntityKind::Genre, .. }
  )));
}

#[tokio::test]
async fn deleting_genre_records_relation_on_books() {
  let s = store().await;
  let owner = Uuid::new_v4();
  let genre = s.create_genre(NewGenre { name: "Fantasy".into() }, ctx(owner)).await.unwrap();
  let mut input = dune(owner);
  input.genre_ids = vec![genre.genre_id];
  let book = s.create_book(input, ctx(owner)).await.unwrap();

  s.delete_genre(genre.genre_id, ctx(owner)).await.unwrap();

  let live = s.get_book(book.book_id).await.unwrap().unwrap();
  assert!(live.genre_ids.is_empty());
  let latest = s
    .history(EntityRef::new(EntityKind::Book, book.book_id), Some(1))
    .await
    .unwrap()
    .remove(0);
  assert_eq!(latest.change_type, ChangeType::RelationChanged);
  assert_eq!(latest.relation.unwrap().removed, vec![genre.genre_id]);
}

#[tokio::test]
async fn duplicate_genre_name_conflicts() {
  let s = store().await;
  let actor = Uuid::new_v4();
  s.create_genre(NewGenre { name: "Horror".into() }, ctx(actor)).await.unwrap();
  let err = s
    .create_genre(NewGenre { name: " Horror ".into() }, ctx(actor))
    .await
    .unwrap_err();
  assert!(is_core(&err, |e| matches!(e, bookshare_core::Error::Conflict(_))));
}

#[tokio::test]
async fn deleting_book_records_cascaded_children() {
  let s = store().await;
  let owner = Uuid::new_v4();
  let reader = Uuid::new_v4();
  let book = s.create_book(dune(owner), ctx(owner)).await.unwrap();
  let r = s.create_review(review(book.book_id, reader, 4), ctx(reader)).await.unwrap();
  let m = s
    .send_message(
      NewMessage {
        sender_id:    reader,
        recipient_id: owner,
        book_id:      book.book_id,
        subject:      "Swap?".into(),
        body:         "Would you trade?".into(),
      },
      ctx(reader),
    )
    .await
    .unwrap();

  s.delete_book(book.book_id, ctx(owner)).await.unwrap();

  assert!(s.get_review(r.review_id).await.unwrap().is_none());
  assert!(s.get_message(m.message_id).await.unwrap().is_none());
  for entity in [
    EntityRef::new(EntityKind::Review, r.review_id),
    EntityRef::new(EntityKind::Message, m.message_id),
  ] {
    let latest = s.history(entity, Some(1)).await.unwrap().remove(0);
    assert_eq!(latest.change_type, ChangeType::Delete);
  }
}

// ─── Restore ─────────────────────────────────────────────────────────────────

#[tokio::test]
async fn restore_then_compare_is_empty() {
  let s = store().await;
  let owner = Uuid::new_v4();
  let book = s.create_book(dune(owner), ctx(owner)).await.unwrap();
  let entity = EntityRef::new(EntityKind::Book, book.book_id);
  let created = s.history(entity, None).await.unwrap().remove(0);

  let patch = BookPatch {
    title: Some("Children of Dune".into()),
    book_file: Some("books/cod.epub".into()),
    ..Default::default()
  };
  s.update_book(book.book_id, patch, ctx(owner)).await.unwrap();

  let restored = s
    .restore(entity, created.history_id, ctx(owner))
    .await
    .unwrap()
    .unwrap();
  assert_eq!(restored.change_type, ChangeType::Update);
  assert_eq!(
    restored.reason,
    Some(format!("restored to version {}", created.history_id))
  );

  let live = s.get_book(book.book_id).await.unwrap().unwrap();
  assert_eq!(live.title, "Dune");
  assert_eq!(live.book_file, None);

  let diff = s
    .compare_versions(entity, created.history_id, restored.history_id)
    .await
    .unwrap()
    .unwrap();
  assert!(diff.changes.is_empty());
}

#[tokio::test]
async fn restore_unknown_version_is_none() {
  let s = store().await;
  let owner = Uuid::new_v4();
  let book = s.create_book(dune(owner), ctx(owner)).await.unwrap();
  let entity = EntityRef::new(EntityKind::Book, book.book_id);
  assert!(s.restore(entity, 9_999, ctx(owner)).await.unwrap().is_none());
}

#[tokio::test]
async fn restore_deleted_entity_is_not_found() {
  let s = store().await;
  let owner = Uuid::new_v4();
  let book = s.create_book(dune(owner), ctx(owner)).await.unwrap();
  let entity = EntityRef::new(EntityKind::Book, book.book_id);
  let created = s.history(entity, None).await.unwrap().remove(0);
  s.delete_book(book.book_id, ctx(owner)).await.unwrap();

  let err = s.restore(entity, created.history_id, ctx(owner)).await.unwrap_err();
  assert!(is_core(&err, |e| matches!(e, bookshare_core::Error::NotFound { .. })));
}

#[tokio::test]
async fn versions_of_another_entity_do_not_compare() {
  let s = store().await;
  let owner = Uuid::new_v4();
  let a = s.create_book(dune(owner), ctx(owner)).await.unwrap();
  let b = s.create_book(dune(owner), ctx(owner)).await.unwrap();
  let a_ref = EntityRef::new(EntityKind::Book, a.book_id);
  let b_ref = EntityRef::new(EntityKind::Book, b.book_id);
  let ha = s.history(a_ref, None).await.unwrap().remove(0);
  let hb = s.history(b_ref, None).await.unwrap().remove(0);

  assert!(s.compare_versions(a_ref, ha.history_id, hb.history_id).await.unwrap().is_none());
}

// ─── History policy ──────────────────────────────────────────────────────────

#[tokio::test]
async fn atomic_history_failure_rolls_back_entity() {
  let s = store().await;
  s.execute_batch(FAILING_HISTORY).await.unwrap();
  let owner = Uuid::new_v4();

  let err = s
    .create_book(dune(owner), ctx(owner).with_reason("boom"))
    .await
    .unwrap_err();
  assert!(matches!(err, Error::HistoryWrite(_)));
  assert!(s.list_books(None).await.unwrap().is_empty());
}

#[tokio::test]
async fn best_effort_history_failure_keeps_entity() {
  let s = store().await.with_history_policy(HistoryPolicy::BestEffort);
  s.execute_batch(FAILING_HISTORY).await.unwrap();
  let owner = Uuid::new_v4();

  let book = s
    .create_book(dune(owner), ctx(owner).with_reason("boom"))
    .await
    .unwrap();
  assert!(s.get_book(book.book_id).await.unwrap().is_some());
  let entity = EntityRef::new(EntityKind::Book, book.book_id);
  assert!(s.history(entity, None).await.unwrap().is_empty());
}

#[tokio::test]
async fn history_and_activity_are_append_only() {
  let s = store().await;
  let owner = Uuid::new_v4();
  s.create_book(dune(owner), ctx(owner)).await.unwrap();
  s.record_activity(NewActivity::new(owner, ActionKind::Login)).await.unwrap();

  assert!(s.execute_batch("UPDATE history SET reason = 'x'").await.is_err());
  assert!(s.execute_batch("DELETE FROM history").await.is_err());
  assert!(s.execute_batch("DELETE FROM activities").await.is_err());
}

// ─── Reviews, profiles, messages ─────────────────────────────────────────────

#[tokio::test]
async fn second_review_by_same_user_conflicts() {
  let s = store().await;
  let owner = Uuid::new_v4();
  let reader = Uuid::new_v4();
  let book = s.create_book(dune(owner), ctx(owner)).await.unwrap();
  s.create_review(review(book.book_id, reader, 5), ctx(reader)).await.unwrap();

  let err = s
    .create_review(review(book.book_id, reader, 2), ctx(reader))
    .await
    .unwrap_err();
  assert!(is_core(&err, |e| matches!(e, bookshare_core::Error::Conflict(_))));
}

#[tokio::test]
async fn review_of_missing_book_is_not_found() {
  let s = store().await;
  let reader = Uuid::new_v4();
  let err = s
    .create_review(review(Uuid::new_v4(), reader, 3), ctx(reader))
    .await
    .unwrap_err();
  assert!(is_core(&err, |e| matches!(
    e,
    bookshare_core::Error::NotFound { kind: EntityKind::Book, .. }
  )));
}

#[tokio::test]
async fn profile_is_created_then_updated() {
  let s = store().await;
  let user = Uuid::new_v4();
  let first = s
    .upsert_profile(
      user,
      ProfilePatch { bio: Some("Reader".into()), ..Default::default() },
      ctx(user),
    )
    .await
    .unwrap();
  let second = s
    .upsert_profile(
      user,
      ProfilePatch { location: Some("Lisbon".into()), ..Default::default() },
      ctx(user),
    )
    .await
    .unwrap();
  assert_eq!(first.profile_id, second.profile_id);
  assert_eq!(second.bio, "Reader");

  let entity = EntityRef::new(EntityKind::Profile, first.profile_id);
  let kinds: Vec<ChangeType> =
    s.history(entity, None).await.unwrap().iter().map(|h| h.change_type).collect();
  assert_eq!(kinds, vec![ChangeType::Update, ChangeType::Create]);
}

#[tokio::test]
async fn only_recipient_marks_read_and_repeat_is_noop() {
  let s = store().await;
  let owner = Uuid::new_v4();
  let reader = Uuid::new_v4();
  let book = s.create_book(dune(owner), ctx(owner)).await.unwrap();
  let m = s
    .send_message(
      NewMessage {
        sender_id:    reader,
        recipient_id: owner,
        book_id:      book.book_id,
        subject:      "Hi".into(),
        body:         "Still available?".into(),
      },
      ctx(reader),
    )
    .await
    .unwrap();
  assert_eq!(s.unread_count(owner).await.unwrap(), 1);

  let err = s.mark_message_read(m.message_id, reader, ctx(reader)).await.unwrap_err();
  assert!(is_core(&err, |e| matches!(e, bookshare_core::Error::Forbidden(_))));

  s.mark_message_read(m.message_id, owner, ctx(owner)).await.unwrap();
  s.mark_message_read(m.message_id, owner, ctx(owner)).await.unwrap();
  assert_eq!(s.unread_count(owner).await.unwrap(), 0);
  assert_eq!(s.inbox(owner).await.unwrap().len(), 1);
  assert_eq!(s.sent(reader).await.unwrap().len(), 1);

  let entity = EntityRef::new(EntityKind::Message, m.message_id);
  assert_eq!(s.history(entity, None).await.unwrap().len(), 2);
}

#[tokio::test]
async fn user_timeline_spans_entity_kinds() {
  let s = store().await;
  let user = Uuid::new_v4();
  let other = Uuid::new_v4();
  let book = s.create_book(dune(user), ctx(user)).await.unwrap();
  s.create_review(review(book.book_id, user, 5), ctx(user)).await.unwrap();
  s.create_book(dune(other), ctx(other)).await.unwrap();

  let timeline = s.user_timeline(user, Utc::now() - Duration::hours(1)).await.unwrap();
  let kinds: Vec<EntityKind> = timeline.iter().map(|h| h.entity_kind).collect();
  assert_eq!(kinds, vec![EntityKind::Review, EntityKind::Book]);

  let recent = s
    .recent_changes(EntityKind::Book, Utc::now() - Duration::hours(1), 10)
    .await
    .unwrap();
  assert_eq!(recent.len(), 2);
}

// ─── Statistics ──────────────────────────────────────────────────────────────

#[tokio::test]
async fn average_rating_tracks_current_reviews() {
  let s = store().await;
  let owner = Uuid::new_v4();
  let reader = Uuid::new_v4();
  let book = s.create_book(dune(owner), ctx(owner)).await.unwrap();
  assert_eq!(s.average_rating(book.book_id).await.unwrap(), 0.0);

  let r = s.create_review(review(book.book_id, reader, 5), ctx(reader)).await.unwrap();
  assert_eq!(s.average_rating(book.book_id).await.unwrap(), 5.0);

  let patch = ReviewPatch { rating: Some(3), ..Default::default() };
  s.update_review(r.review_id, patch, ctx(reader)).await.unwrap();
  assert_eq!(s.average_rating(book.book_id).await.unwrap(), 3.0);
}

#[tokio::test]
async fn catalog_statistics_counts_everything() {
  let s = store().await;
  let owner = Uuid::new_v4();
  let reader = Uuid::new_v4();
  let genre = s.create_genre(NewGenre { name: "Sci-Fi".into() }, ctx(owner)).await.unwrap();
  s.create_genre(NewGenre { name: "Poetry".into() }, ctx(owner)).await.unwrap();
  let mut input = dune(owner);
  input.genre_ids = vec![genre.genre_id];
  input.book_file = Some("books/dune.epub".into());
  let book = s.create_book(input, ctx(owner)).await.unwrap();
  s.create_book(dune(owner), ctx(owner)).await.unwrap();
  s.create_review(review(book.book_id, reader, 4), ctx(reader)).await.unwrap();
  s.create_review(review(book.book_id, owner, 2), ctx(owner)).await.unwrap();

  let stats = s.catalog_statistics().await.unwrap();
  assert_eq!(stats.total_books, 2);
  assert_eq!(stats.total_reviews, 2);
  assert_eq!(stats.total_genres, 2);
  assert_eq!(stats.books_with_files, 1);
  assert_eq!(stats.average_rating, 3.0);
  assert_eq!(stats.most_popular_genre.unwrap().name, "Sci-Fi");

  let popular = s.popular_books(None).await.unwrap();
  assert_eq!(popular.len(), 1);
  assert_eq!(popular[0].book_id, book.book_id);

  let genres = s.popular_genres().await.unwrap();
  assert_eq!(genres.len(), 1);
  assert_eq!(genres[0].book_count, 1);
}

#[tokio::test]
async fn trending_requires_high_average() {
  let s = store().await;
  let owner = Uuid::new_v4();
  let good = s.create_book(dune(owner), ctx(owner)).await.unwrap();
  let meh = s.create_book(dune(owner), ctx(owner)).await.unwrap();
  s.create_review(review(good.book_id, Uuid::new_v4(), 5), ctx(owner)).await.unwrap();
  s.create_review(review(meh.book_id, Uuid::new_v4(), 3), ctx(owner)).await.unwrap();

  let trending = s.trending_books(Utc::now()).await.unwrap();
  assert_eq!(trending.len(), 1);
  assert_eq!(trending[0].book_id, good.book_id);
}

// ─── Activity ────────────────────────────────────────────────────────────────

#[tokio::test]
async fn activity_records_client_metadata() {
  let s = store().await;
  let user = Uuid::new_v4();
  let client = ClientContext {
    forwarded_for: Some("203.0.113.9, 10.0.0.1".into()),
    remote_addr:   Some("10.0.0.1".into()),
    user_agent:    Some("curl/8".into()),
  };
  let book_id = Uuid::new_v4();
  s.record_activity(
    NewActivity::new(user, ActionKind::CreateBook)
      .target(EntityKind::Book, book_id)
      .describe("Dune")
      .client(Some(client)),
  )
  .await
  .unwrap();

  let recent = s.activities_for(user, 10).await.unwrap();
  assert_eq!(recent.len(), 1);
  assert_eq!(recent[0].ip_address.as_deref(), Some("203.0.113.9"));
  assert_eq!(recent[0].user_agent.as_deref(), Some("curl/8"));
  assert_eq!(recent[0].target_type, Some(EntityKind::Book));
  assert_eq!(recent[0].target_id, Some(book_id));
}

#[tokio::test]
async fn activity_summary_respects_window() {
  let s = store().await;
  let user = Uuid::new_v4();
  for action in [ActionKind::Login, ActionKind::Login, ActionKind::CreateBook] {
    s.record_activity(NewActivity::new(user, action)).await.unwrap();
  }

  let summary = s.activity_summary(user, Utc::now() - Duration::days(30)).await.unwrap();
  assert_eq!(summary.get(&ActionKind::Login), Some(&2));
  assert_eq!(summary.get(&ActionKind::CreateBook), Some(&1));
  assert_eq!(summary.get(&ActionKind::Logout), None);

  let future = s.activity_summary(user, Utc::now() + Duration::days(1)).await.unwrap();
  assert!(future.is_empty());
}

#[tokio::test]
async fn system_stats_fill_empty_days() {
  let s = store().await;
  let (a, b) = (Uuid::new_v4(), Uuid::new_v4());
  s.record_activity(NewActivity::new(a, ActionKind::CreateBook)).await.unwrap();
  s.record_activity(NewActivity::new(a, ActionKind::SendMessage)).await.unwrap();
  s.record_activity(NewActivity::new(b, ActionKind::CreateReview)).await.unwrap();

  let now = Utc::now() + Duration::seconds(1);
  let stats = s.system_activity_stats(7, now).await.unwrap();
  assert_eq!(stats.window_days, 7);
  assert_eq!(stats.total_activities, 3);
  assert_eq!(stats.active_users, 2);
  assert_eq!(stats.books_created, 1);
  assert_eq!(stats.reviews_created, 1);
  assert_eq!(stats.messages_sent, 1);

  assert_eq!(stats.daily.len(), 7);
  assert_eq!(stats.daily[0].date, now.date_naive());
  let total: u64 = stats.daily.iter().map(|d| d.activities).sum();
  assert_eq!(total, 3);
  assert!(stats.daily.iter().filter(|d| d.activities == 0).count() >= 5);
}

#[tokio::test]
async fn oversized_stats_window_is_rejected_and_store_survives() {
  let s = store().await;
  let user = Uuid::new_v4();

  for days in [0, 3651, 100_000_000] {
    let err = s.system_activity_stats(days, Utc::now()).await.unwrap_err();
    assert!(
      is_core(&err, |e| matches!(e, bookshare_core::Error::Validation(v)
        if v.fields().eq(["days"]))),
      "{err}"
    );
  }

  s.record_activity(NewActivity::new(user, ActionKind::Login)).await.unwrap();
  let stats = s.system_activity_stats(3650, Utc::now() + Duration::seconds(1)).await.unwrap();
  assert_eq!(stats.total_activities, 1);
  assert_eq!(stats.daily.len(), 3650);
}
