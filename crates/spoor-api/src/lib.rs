//! JSON REST API for Spoor.
//!
//! Exposes an axum [`Router`] backed by a [`SightingRecorder`]. TLS and
//! process concerns are the caller's responsibility.
//!
//! # Mounting
//!
//! ```rust,ignore
//! .nest("/api", spoor_api::api_router(ApiState::new(recorder)))
//! ```

pub mod auth;
pub mod error;
pub mod observers;
pub mod sightings;
pub mod subjects;

use std::sync::Arc;

use axum::{
  Router,
  extract::DefaultBodyLimit,
  routing::{get, post},
};
use serde::Deserialize;
use spoor_core::{image::ImagePipeline, store::{PageRequest, TrackingStore}};
use spoor_pipeline::SightingRecorder;

pub use error::ApiError;

/// Request bodies carry images inline as base64.
pub const MAX_BODY_BYTES: usize = 16 * 1024 * 1024;

// ─── Application state ────────────────────────────────────────────────────────

/// Shared state threaded through all handlers.
pub struct ApiState<S, I> {
  pub recorder: SightingRecorder<S, I>,
}

impl<S, I> Clone for ApiState<S, I> {
  fn clone(&self) -> Self { Self { recorder: self.recorder.clone() } }
}

impl<S, I> ApiState<S, I>
where
  S: TrackingStore,
  I: ImagePipeline,
{
  pub fn new(recorder: SightingRecorder<S, I>) -> Self { Self { recorder } }

  pub fn store(&self) -> &Arc<S> { self.recorder.store() }
}

/// `?page=<n>&page_size=<n>`, both optional.
#[derive(Debug, Default, Deserialize)]
pub struct PageParams {
  pub page:      Option<u32>,
  pub page_size: Option<u32>,
}

impl From<PageParams> for PageRequest {
  fn from(p: PageParams) -> Self { PageRequest::new(p.page, p.page_size) }
}

// ─── Router ───────────────────────────────────────────────────────────────────

/// Build the API router. Dropping the router (and every clone of `state`)
/// releases the recorder's notifier handle.
pub fn api_router<S, I>(state: ApiState<S, I>) -> Router<()>
where
  S: TrackingStore + 'static,
  I: ImagePipeline + 'static,
{
  Router::new()
    // Observers
    .route("/observers", post(observers::register::<S, I>))
    .route("/observers/me", get(observers::me))
    // Subjects
    .route("/subjects", get(subjects::list::<S, I>).post(subjects::create::<S, I>))
    .route("/subjects/{id}", get(subjects::get_one::<S, I>))
    .route("/subjects/{id}/sightings", get(subjects::sightings::<S, I>))
    // Sightings
    .route("/sightings", post(sightings::create::<S, I>))
    .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
    .with_state(state)
}

// ─── Integration tests ────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
  use super::*;

  use axum::{
    body::Body,
    http::{Request, StatusCode, header},
    response::Response,
  };
  use base64::{Engine as _, engine::general_purpose::STANDARD as B64};
  use serde_json::{Value, json};
  use spoor_pipeline::{
    NotifierConfig, RecorderConfig, mail::LogMailer, image::{ImageConfig, ImageProcessor},
  };
  use spoor_store_sqlite::SqliteStore;
  use tower::ServiceExt as _;

  struct TestApp {
    router: Router,
    _dir:   tempfile::TempDir,
  }

  async fn app() -> TestApp {
    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(SqliteStore::open_in_memory().await.unwrap());
    let images = Arc::new(ImageProcessor::new(ImageConfig {
      directory: dir.path().to_path_buf(),
      ..ImageConfig::default()
    }));
    let (notifier, _tasks) =
      spoor_pipeline::start(Arc::clone(&store), Arc::new(LogMailer), NotifierConfig::default());
    let recorder = SightingRecorder::new(store, images, notifier, RecorderConfig::default());
    TestApp { router: api_router(ApiState::new(recorder)), _dir: dir }
  }

  fn basic(user: &str, pass: &str) -> String {
    format!("Basic {}", B64.encode(format!("{user}:{pass}")))
  }

  async fn send(
    app:    &TestApp,
    method: &str,
    uri:    &str,
    auth:   Option<(&str, &str)>,
    body:   Option<Value>,
  ) -> Response {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some((user, pass)) = auth {
      builder = builder.header(header::AUTHORIZATION, basic(user, pass));
    }
    let req = match body {
      Some(v) => builder
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(v.to_string()))
        .unwrap(),
      None => builder.body(Body::empty()).unwrap(),
    };
    app.router.clone().oneshot(req).await.unwrap()
  }

  async fn json_body(res: Response) -> Value {
    let bytes = axum::body::to_bytes(res.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
  }

  async fn register(app: &TestApp, email: &str) {
    let res = send(
      app,
      "POST",
      "/observers",
      None,
      Some(json!({ "name": "Ranger", "email": email, "password": "secret" })),
    )
    .await;
    assert_eq!(res.status(), StatusCode::CREATED);
  }

  async fn new_subject(app: &TestApp, email: &str, first: Option<(f64, f64)>) -> Value {
    let first = first.map(|(lat, lon)| {
      json!({ "seen_at": "2024-05-01T08:00:00Z", "latitude": lat, "longitude": lon })
    });
    let res = send(
      app,
      "POST",
      "/subjects",
      Some((email, "secret")),
      Some(json!({ "name": "Raja", "date_of_birth": "2018-03-14", "first_sighting": first })),
    )
    .await;
    assert_eq!(res.status(), StatusCode::CREATED);
    json_body(res).await
  }

  // ── Observers ───────────────────────────────────────────────────────────────

  #[tokio::test]
  async fn register_and_fetch_me() {
    let app = app().await;
    register(&app, "ranger@example.com").await;

    let res = send(&app, "GET", "/observers/me", Some(("ranger@example.com", "secret")), None).await;
    assert_eq!(res.status(), StatusCode::OK);
    let me = json_body(res).await;
    assert_eq!(me["email"], "ranger@example.com");
    assert!(me.get("password_hash").is_none());
  }

  #[tokio::test]
  async fn duplicate_email_is_conflict() {
    let app = app().await;
    register(&app, "ranger@example.com").await;

    let res = send(
      &app,
      "POST",
      "/observers",
      None,
      Some(json!({ "name": "Other", "email": "RANGER@example.com", "password": "x" })),
    )
    .await;
    assert_eq!(res.status(), StatusCode::CONFLICT);
    assert_eq!(json_body(res).await["code"], "CONFLICT");
  }

  #[tokio::test]
  async fn me_requires_auth() {
    let app = app().await;
    let res = send(&app, "GET", "/observers/me", None, None).await;
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(json_body(res).await["code"], "UNAUTHORIZED");
  }

  // ── Subjects ────────────────────────────────────────────────────────────────

  #[tokio::test]
  async fn create_and_get_subject() {
    let app = app().await;
    register(&app, "ranger@example.com").await;
    let subject = new_subject(&app, "ranger@example.com", Some((-7.550676, 110.828316))).await;
    assert_eq!(subject["version"], 1);
    assert_eq!(subject["last_seen"]["position"]["latitude"], -7.550676);

    let id = subject["subject_id"].as_str().unwrap();
    let res = send(&app, "GET", &format!("/subjects/{id}"), None, None).await;
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(json_body(res).await["name"], "Raja");

    let res = send(&app, "GET", "/subjects?page=1&page_size=5", None, None).await;
    let page = json_body(res).await;
    assert_eq!(page["total"], 1);
  }

  #[tokio::test]
  async fn unknown_subject_is_404() {
    let app = app().await;
    let id = uuid::Uuid::new_v4();
    let res = send(&app, "GET", &format!("/subjects/{id}"), None, None).await;
    assert_eq!(res.status(), StatusCode::NOT_FOUND);

    let res = send(&app, "GET", &format!("/subjects/{id}/sightings"), None, None).await;
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
    assert_eq!(json_body(res).await["code"], "NOT_FOUND");
  }

  #[tokio::test]
  async fn malformed_body_is_bad_request() {
    let app = app().await;
    register(&app, "ranger@example.com").await;
    let res = send(
      &app,
      "POST",
      "/subjects",
      Some(("ranger@example.com", "secret")),
      Some(json!({ "name": "Raja" })),
    )
    .await;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    assert_eq!(json_body(res).await["code"], "BAD_REQUEST");
  }

  #[tokio::test]
  async fn malformed_path_and_query_render_json_errors() {
    let app = app().await;
    let negative_size = format!("/subjects/{}/sightings?page_size=-1", uuid::Uuid::new_v4());
    for uri in [
      "/subjects/not-a-uuid",
      "/subjects/not-a-uuid/sightings",
      "/subjects?page=abc",
      negative_size.as_str(),
    ] {
      let res = send(&app, "GET", uri, None, None).await;
      assert_eq!(res.status(), StatusCode::BAD_REQUEST, "{uri}");
      let body = json_body(res).await;
      assert_eq!(body["code"], "BAD_REQUEST", "{uri}");
      assert!(body["error"].is_string(), "{uri}");
    }
  }

  // ── Sightings ───────────────────────────────────────────────────────────────

  #[tokio::test]
  async fn create_sighting_and_list() {
    let app = app().await;
    register(&app, "ranger@example.com").await;
    let subject = new_subject(&app, "ranger@example.com", Some((-7.550676, 110.828316))).await;
    let id = subject["subject_id"].as_str().unwrap();

    let res = send(
      &app,
      "POST",
      "/sightings",
      Some(("ranger@example.com", "secret")),
      Some(json!({
        "subject_id": id,
        "seen_at": "2024-05-02T08:00:00Z",
        "latitude": -7.250676,
        "longitude": 111.828316,
      })),
    )
    .await;
    assert_eq!(res.status(), StatusCode::CREATED);

    let res = send(&app, "GET", &format!("/subjects/{id}/sightings"), None, None).await;
    let page = json_body(res).await;
    assert_eq!(page["total"], 2);
    assert_eq!(page["items"][0]["position"]["latitude"], -7.250676);
  }

  #[tokio::test]
  async fn too_close_sighting_is_rejected() {
    let app = app().await;
    register(&app, "ranger@example.com").await;
    let subject = new_subject(&app, "ranger@example.com", Some((-7.550676, 110.828316))).await;

    let res = send(
      &app,
      "POST",
      "/sightings",
      Some(("ranger@example.com", "secret")),
      Some(json!({
        "subject_id": subject["subject_id"],
        "seen_at": "2024-05-02T08:00:00Z",
        "latitude": -7.550676,
        "longitude": 110.828316,
      })),
    )
    .await;
    assert_eq!(res.status(), StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(json_body(res).await["code"], "TOO_CLOSE");
  }

  #[tokio::test]
  async fn invalid_coordinate_and_image_type() {
    let app = app().await;
    register(&app, "ranger@example.com").await;
    let subject = new_subject(&app, "ranger@example.com", None).await;

    let res = send(
      &app,
      "POST",
      "/sightings",
      Some(("ranger@example.com", "secret")),
      Some(json!({
        "subject_id": subject["subject_id"],
        "seen_at": "2024-05-02T08:00:00Z",
        "latitude": 95.0,
        "longitude": 0.0,
      })),
    )
    .await;
    assert_eq!(json_body(res).await["code"], "INVALID_COORDINATE");

    let res = send(
      &app,
      "POST",
      "/sightings",
      Some(("ranger@example.com", "secret")),
      Some(json!({
        "subject_id": subject["subject_id"],
        "seen_at": "2024-05-02T08:00:00Z",
        "latitude": 1.0,
        "longitude": 1.0,
        "image": { "content_type": "image/png", "filename": "raja.jpg", "data": B64.encode(b"x") },
      })),
    )
    .await;
    assert_eq!(res.status(), StatusCode::UNSUPPORTED_MEDIA_TYPE);
    assert_eq!(json_body(res).await["code"], "INVALID_IMAGE_TYPE");
  }

  #[tokio::test]
  async fn sighting_requires_auth() {
    let app = app().await;
    let res = send(
      &app,
      "POST",
      "/sightings",
      Some(("nobody@example.com", "secret")),
      Some(json!({
        "subject_id": uuid::Uuid::new_v4(),
        "seen_at": "2024-05-02T08:00:00Z",
        "latitude": 1.0,
        "longitude": 1.0,
      })),
    )
    .await;
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
  }
}
