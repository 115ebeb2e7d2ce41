//! Router tests against an in-memory SQLite store.

use std::sync::Arc;

use axum::{
  Router,
  body::Body,
  http::{Method, Request, StatusCode, header},
};
use bookshare_store_sqlite::SqliteStore;
use serde_json::{Value, json};
use tower::ServiceExt as _;
use uuid::Uuid;

use crate::{
  api_router,
  context::{CHANGE_REASON, FORWARDED_FOR, USER_ID, USER_NAME, USER_STAFF},
};

async fn app() -> Router {
  let store = SqliteStore::open_in_memory().await.unwrap();
  api_router(Arc::new(store))
}

struct Call<'a> {
  method:  Method,
  uri:     String,
  user:    Option<Uuid>,
  headers: Vec<(&'a str, String)>,
  body:    Option<Value>,
}

impl<'a> Call<'a> {
  fn new(method: Method, uri: impl Into<String>) -> Self {
    Self { method, uri: uri.into(), user: None, headers: vec![], body: None }
  }

  fn get(uri: impl Into<String>) -> Self { Self::new(Method::GET, uri) }

  fn post(uri: impl Into<String>, body: Value) -> Self {
    Self::new(Method::POST, uri).json(body)
  }

  fn as_user(mut self, user: Uuid) -> Self {
    self.user = Some(user);
    self
  }

  fn header(mut self, name: &'a str, value: impl Into<String>) -> Self {
    self.headers.push((name, value.into()));
    self
  }

  fn json(mut self, body: Value) -> Self {
    self.body = Some(body);
    self
  }

  async fn send(self, app: &Router) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(self.method).uri(self.uri);
    if let Some(user) = self.user {
      builder = builder.header(USER_ID, user.to_string()).header(USER_NAME, "tester");
    }
    for (name, value) in self.headers {
      builder = builder.header(name, value);
    }
    let req = match self.body {
      Some(body) => builder
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap(),
      None => builder.body(Body::empty()).unwrap(),
    };

    let resp = app.clone().oneshot(req).await.unwrap();
    let status = resp.status();
    let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    let value = if bytes.is_empty() { Value::Null } else { serde_json::from_slice(&bytes).unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).into())) };
    (status, value)
  }
}

async fn create_dune(app: &Router, owner: Uuid) -> Value {
  let (status, book) = Call::post(
    "/books",
    json!({ "title": "Dune", "author": "Frank Herbert", "description": "Spice" }),
  )
  .as_user(owner)
  .send(app)
  .await;
  assert_eq!(status, StatusCode::CREATED, "{book}");
  book
}

// ─── Books ───────────────────────────────────────────────────────────────────

#[tokio::test]
async fn create_book_requires_user() {
  let app = app().await;
  let (status, body) =
    Call::post("/books", json!({ "title": "Dune", "author": "F. H." })).send(&app).await;
  assert_eq!(status, StatusCode::UNAUTHORIZED);
  assert!(body["error"].is_string());
}

#[tokio::test]
async fn invalid_book_is_422_with_fields_and_not_logged() {
  let app = app().await;
  let owner = Uuid::new_v4();
  let (status, body) = Call::post("/books", json!({ "title": " a ", "author": "" }))
    .as_user(owner)
    .send(&app)
    .await;
  assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
  let fields: Vec<&str> =
    body["fields"].as_array().unwrap().iter().map(|f| f["field"].as_str().unwrap()).collect();
  assert_eq!(fields, vec!["title", "author"]);

  let (_, activity) = Call::get("/activity/me").as_user(owner).send(&app).await;
  assert_eq!(activity, json!([]));
}

#[tokio::test]
async fn book_edit_flow_records_history_and_activity() {
  let app = app().await;
  let owner = Uuid::new_v4();
  let book = create_dune(&app, owner).await;
  let id = book["book_id"].as_str().unwrap();

  let (status, updated) = Call::new(Method::PATCH, format!("/books/{id}"))
    .as_user(owner)
    .header(CHANGE_REASON, "typo fix")
    .header(FORWARDED_FOR, "203.0.113.5, 10.0.0.1")
    .json(json!({ "title": "Dune (revised)" }))
    .send(&app)
    .await;
  assert_eq!(status, StatusCode::OK);
  assert_eq!(updated["title"], "Dune (revised)");

  let (status, history) = Call::get(format!("/books/{id}/history")).as_user(owner).send(&app).await;
  assert_eq!(status, StatusCode::OK);
  assert_eq!(history[0]["change_type"], "update");
  assert_eq!(history[0]["reason"], "typo fix");
  assert_eq!(history[1]["change_type"], "create");

  let (_, activity) = Call::get("/activity/me").as_user(owner).send(&app).await;
  assert_eq!(activity[0]["action"], "update_book");
  assert_eq!(activity[0]["ip_address"], "203.0.113.5");
  assert_eq!(activity[1]["action"], "create_book");

  let (_, summary) = Call::get("/activity/summary?days=7").as_user(owner).send(&app).await;
  assert_eq!(summary, json!({ "create_book": 1, "update_book": 1 }));
}

#[tokio::test]
async fn only_owner_edits_book() {
  let app = app().await;
  let owner = Uuid::new_v4();
  let book = create_dune(&app, owner).await;
  let id = book["book_id"].as_str().unwrap();

  let (status, _) = Call::new(Method::DELETE, format!("/books/{id}"))
    .as_user(Uuid::new_v4())
    .send(&app)
    .await;
  assert_eq!(status, StatusCode::FORBIDDEN);

  let (status, _) = Call::get(format!("/books/{id}/history"))
    .as_user(Uuid::new_v4())
    .send(&app)
    .await;
  assert_eq!(status, StatusCode::FORBIDDEN);

  let (status, _) =
    Call::new(Method::DELETE, format!("/books/{id}")).as_user(owner).send(&app).await;
  assert_eq!(status, StatusCode::NO_CONTENT);
  let (status, _) = Call::get(format!("/books/{id}")).send(&app).await;
  assert_eq!(status, StatusCode::NOT_FOUND);
}

// ─── Reviews & stats ─────────────────────────────────────────────────────────

#[tokio::test]
async fn review_rating_flows_into_average() {
  let app = app().await;
  let owner = Uuid::new_v4();
  let reader = Uuid::new_v4();
  let book = create_dune(&app, owner).await;
  let id = book["book_id"].as_str().unwrap();

  let (status, review) =
    Call::post(format!("/books/{id}/reviews"), json!({ "text": "Great", "rating": 5 }))
      .as_user(reader)
      .send(&app)
      .await;
  assert_eq!(status, StatusCode::CREATED);
  let review_id = review["review_id"].as_str().unwrap();

  let (status, _) =
    Call::post(format!("/books/{id}/reviews"), json!({ "text": "Again", "rating": 4 }))
      .as_user(reader)
      .send(&app)
      .await;
  assert_eq!(status, StatusCode::CONFLICT);

  let (status, _) = Call::new(Method::PATCH, format!("/reviews/{review_id}"))
    .as_user(reader)
    .json(json!({ "rating": 3 }))
    .send(&app)
    .await;
  assert_eq!(status, StatusCode::OK);

  let (_, detail) = Call::get(format!("/books/{id}")).send(&app).await;
  assert_eq!(detail["average_rating"], 3.0);
  assert_eq!(detail["title"], "Dune");

  let (_, stats) = Call::get("/stats").send(&app).await;
  assert_eq!(stats["total_books"], 1);
  assert_eq!(stats["total_reviews"], 1);
  assert_eq!(stats["most_popular_genre"], Value::Null);

  let (_, popular) = Call::get("/stats/popular").send(&app).await;
  assert_eq!(popular[0]["book_id"], id);
}

#[tokio::test]
async fn bad_rating_is_422() {
  let app = app().await;
  let owner = Uuid::new_v4();
  let book = create_dune(&app, owner).await;
  let id = book["book_id"].as_str().unwrap();

  let (status, body) =
    Call::post(format!("/books/{id}/reviews"), json!({ "text": "Meh", "rating": 6 }))
      .as_user(owner)
      .send(&app)
      .await;
  assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
  assert_eq!(body["fields"][0]["field"], "rating");
}

// ─── Messages ────────────────────────────────────────────────────────────────

#[tokio::test]
async fn message_read_by_recipient_only() {
  let app = app().await;
  let owner = Uuid::new_v4();
  let reader = Uuid::new_v4();
  let book = create_dune(&app, owner).await;

  let (status, message) = Call::post(
    "/messages",
    json!({
      "recipient_id": owner,
      "book_id": book["book_id"],
      "subject": "Swap?",
      "body": "Want to trade?"
    }),
  )
  .as_user(reader)
  .send(&app)
  .await;
  assert_eq!(status, StatusCode::CREATED);
  let id = message["message_id"].as_str().unwrap();

  let (_, unread) = Call::get("/messages/unread_count").as_user(owner).send(&app).await;
  assert_eq!(unread["unread_count"], 1);

  let (status, _) =
    Call::post(format!("/messages/{id}/read"), json!({})).as_user(reader).send(&app).await;
  assert_eq!(status, StatusCode::FORBIDDEN);

  let (status, read) =
    Call::post(format!("/messages/{id}/read"), json!({})).as_user(owner).send(&app).await;
  assert_eq!(status, StatusCode::OK);
  assert_eq!(read["is_read"], true);

  let (status, _) = Call::get(format!("/messages/{id}")).as_user(Uuid::new_v4()).send(&app).await;
  assert_eq!(status, StatusCode::NOT_FOUND);
}

// ─── History ─────────────────────────────────────────────────────────────────

#[tokio::test]
async fn compare_and_restore_book() {
  let app = app().await;
  let owner = Uuid::new_v4();
  let book = create_dune(&app, owner).await;
  let id = book["book_id"].as_str().unwrap();

  Call::new(Method::PATCH, format!("/books/{id}"))
    .as_user(owner)
    .json(json!({ "title": "Dune Messiah" }))
    .send(&app)
    .await;

  let (_, history) = Call::get(format!("/history/book/{id}")).as_user(owner).send(&app).await;
  let v_new = history[0]["history_id"].as_i64().unwrap();
  let v_old = history[1]["history_id"].as_i64().unwrap();

  let (status, diff) = Call::get(format!("/history/book/{id}/compare?v1={v_old}&v2={v_new}"))
    .as_user(owner)
    .send(&app)
    .await;
  assert_eq!(status, StatusCode::OK);
  assert_eq!(diff["changes"][0]["field"], "title");
  assert_eq!(diff["changes"][0]["old_value"], "Dune");

  let (status, _) = Call::get(format!("/history/book/{id}/compare?v1={v_old}&v2=999999"))
    .as_user(owner)
    .send(&app)
    .await;
  assert_eq!(status, StatusCode::NOT_FOUND);

  let (status, restored) =
    Call::post(format!("/history/book/{id}/restore"), json!({ "history_id": v_old }))
      .as_user(owner)
      .send(&app)
      .await;
  assert_eq!(status, StatusCode::OK);
  assert_eq!(restored["reason"], format!("restored to version {v_old}"));

  let (_, live) = Call::get(format!("/books/{id}")).send(&app).await;
  assert_eq!(live["title"], "Dune");
}

#[tokio::test]
async fn history_of_others_is_forbidden_unless_staff() {
  let app = app().await;
  let owner = Uuid::new_v4();
  let book = create_dune(&app, owner).await;
  let id = book["book_id"].as_str().unwrap();

  let stranger = Uuid::new_v4();
  let (status, _) = Call::get(format!("/history/book/{id}")).as_user(stranger).send(&app).await;
  assert_eq!(status, StatusCode::FORBIDDEN);

  let (status, records) = Call::get(format!("/history/book/{id}"))
    .as_user(stranger)
    .header(USER_STAFF, "true")
    .send(&app)
    .await;
  assert_eq!(status, StatusCode::OK);
  assert_eq!(records.as_array().unwrap().len(), 1);

  let (status, _) = Call::get(format!("/users/{owner}/timeline")).as_user(stranger).send(&app).await;
  assert_eq!(status, StatusCode::FORBIDDEN);
  let (status, timeline) =
    Call::get(format!("/users/{owner}/timeline")).as_user(owner).send(&app).await;
  assert_eq!(status, StatusCode::OK);
  assert_eq!(timeline[0]["entity_kind"], "book");
}

#[tokio::test]
async fn unknown_entity_kind_is_rejected() {
  let app = app().await;
  let (status, _) = Call::get(format!("/history/user/{}", Uuid::new_v4()))
    .as_user(Uuid::new_v4())
    .send(&app)
    .await;
  assert!(status.is_client_error());
}

// ─── Activity ────────────────────────────────────────────────────────────────

#[tokio::test]
async fn system_stats_are_staff_only_and_fill_days() {
  let app = app().await;
  let owner = Uuid::new_v4();
  create_dune(&app, owner).await;

  let (status, _) = Call::get("/activity/stats?days=7").as_user(owner).send(&app).await;
  assert_eq!(status, StatusCode::FORBIDDEN);

  let (status, stats) = Call::get("/activity/stats?days=7")
    .as_user(owner)
    .header(USER_STAFF, "true")
    .send(&app)
    .await;
  assert_eq!(status, StatusCode::OK);
  assert_eq!(stats["total_activities"], 1);
  assert_eq!(stats["books_created"], 1);
  assert_eq!(stats["daily"].as_array().unwrap().len(), 7);
}

#[tokio::test]
async fn only_session_actions_can_be_reported() {
  let app = app().await;
  let user = Uuid::new_v4();

  let (status, record) =
    Call::post("/activity", json!({ "action": "login" })).as_user(user).send(&app).await;
  assert_eq!(status, StatusCode::CREATED);
  assert_eq!(record["action"], "login");

  let (status, _) =
    Call::post("/activity", json!({ "action": "create_book" })).as_user(user).send(&app).await;
  assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn profile_upsert_logs_update_profile() {
  let app = app().await;
  let user = Uuid::new_v4();

  let (status, _) = Call::get("/profiles/me").as_user(user).send(&app).await;
  assert_eq!(status, StatusCode::NOT_FOUND);

  let (status, profile) = Call::new(Method::PATCH, "/profiles/me")
    .as_user(user)
    .json(json!({ "bio": "Reads a lot", "telegram": "@reader" }))
    .send(&app)
    .await;
  assert_eq!(status, StatusCode::OK);
  assert_eq!(profile["bio"], "Reads a lot");

  let (_, public) = Call::get(format!("/profiles/{user}")).send(&app).await;
  assert_eq!(public["telegram"], "@reader");

  let (_, activity) = Call::get("/activity/me").as_user(user).send(&app).await;
  assert_eq!(activity[0]["action"], "update_profile");
}

#[tokio::test]
async fn birth_date_can_be_cleared() {
  let app = app().await;
  let user = Uuid::new_v4();

  let (_, profile) = Call::new(Method::PATCH, "/profiles/me")
    .as_user(user)
    .json(json!({ "birth_date": "1990-05-17" }))
    .send(&app)
    .await;
  assert_eq!(profile["birth_date"], "1990-05-17");

  let (_, profile) = Call::new(Method::PATCH, "/profiles/me")
    .as_user(user)
    .json(json!({ "location": "Lisbon" }))
    .send(&app)
    .await;
  assert_eq!(profile["birth_date"], "1990-05-17");

  let (status, profile) = Call::new(Method::PATCH, "/profiles/me")
    .as_user(user)
    .json(json!({ "birth_date": null }))
    .send(&app)
    .await;
  assert_eq!(status, StatusCode::OK);
  assert_eq!(profile["birth_date"], Value::Null);
  assert_eq!(profile["location"], "Lisbon");
}

#[tokio::test]
async fn user_activity_is_visible_to_self_and_staff() {
  let app = app().await;
  let owner = Uuid::new_v4();
  create_dune(&app, owner).await;

  let (status, own) = Call::get(format!("/users/{owner}/activity")).as_user(owner).send(&app).await;
  assert_eq!(status, StatusCode::OK);
  assert_eq!(own[0]["action"], "create_book");

  let stranger = Uuid::new_v4();
  let (status, _) =
    Call::get(format!("/users/{owner}/activity")).as_user(stranger).send(&app).await;
  assert_eq!(status, StatusCode::FORBIDDEN);

  let (status, seen) = Call::get(format!("/users/{owner}/activity?limit=1"))
    .as_user(stranger)
    .header(USER_STAFF, "true")
    .send(&app)
    .await;
  assert_eq!(status, StatusCode::OK);
  assert_eq!(seen.as_array().unwrap().len(), 1);
  assert_eq!(seen[0]["actor_id"], owner.to_string());
}

#[tokio::test]
async fn oversized_windows_are_422_and_store_keeps_working() {
  let app = app().await;
  let staff = Uuid::new_v4();

  for uri in [
    "/activity/stats?days=100000000",
    "/activity/stats?days=0",
    "/activity/summary?days=3651",
    "/history/book/recent?days=100000000",
  ] {
    let (status, body) =
      Call::get(uri).as_user(staff).header(USER_STAFF, "true").send(&app).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY, "{uri}");
    assert_eq!(body["fields"][0]["field"], "days", "{uri}");
  }
  let (status, _) = Call::get(format!("/users/{staff}/timeline?days=4294967295"))
    .as_user(staff)
    .send(&app)
    .await;
  assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);

  create_dune(&app, staff).await;
  let (status, stats) = Call::get("/activity/stats?days=3650")
    .as_user(staff)
    .header(USER_STAFF, "true")
    .send(&app)
    .await;
  assert_eq!(status, StatusCode::OK);
  assert_eq!(stats["total_activities"], 1);
}

// ─── Genres ──────────────────────────────────────────────────────────────────

#[tokio::test]
async fn genres_are_managed_by_staff() {
  let app = app().await;
  let user = Uuid::new_v4();

  let (status, _) =
    Call::post("/genres", json!({ "name": "fantasy" })).as_user(user).send(&app).await;
  assert_eq!(status, StatusCode::FORBIDDEN);

  let (status, genre) = Call::post("/genres", json!({ "name": "fantasy" }))
    .as_user(user)
    .header(USER_STAFF, "true")
    .send(&app)
    .await;
  assert_eq!(status, StatusCode::CREATED);
  let id = genre["genre_id"].as_str().unwrap();

  let (status, _) = Call::new(Method::PATCH, format!("/genres/{id}"))
    .as_user(user)
    .json(json!({ "name": "sci-fi" }))
    .send(&app)
    .await;
  assert_eq!(status, StatusCode::FORBIDDEN);

  let (status, _) =
    Call::new(Method::DELETE, format!("/genres/{id}")).as_user(user).send(&app).await;
  assert_eq!(status, StatusCode::FORBIDDEN);

  let (_, genres) = Call::get("/genres").send(&app).await;
  assert_eq!(genres[0]["name"], "fantasy");

  let (status, _) = Call::new(Method::DELETE, format!("/genres/{id}"))
    .as_user(user)
    .header(USER_STAFF, "true")
    .send(&app)
    .await;
  assert_eq!(status, StatusCode::NO_CONTENT);
}
