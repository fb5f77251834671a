//! Handlers for `/subjects` endpoints.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `GET`  | `/subjects` | `?page&page_size`; most recently seen first |
//! | `POST` | `/subjects` | Basic auth; optional `first_sighting` |
//! | `GET`  | `/subjects/{id}` | 404 if not found |
//! | `GET`  | `/subjects/{id}/sightings` | `?page&page_size`; newest first |

use axum::{
  Json,
  extract::{
    Path, Query, State,
    rejection::{JsonRejection, PathRejection, QueryRejection},
  },
  http::StatusCode,
  response::IntoResponse,
};
use chrono::{DateTime, NaiveDate, Utc};
use serde::Deserialize;
use spoor_core::{
  geofence::Coordinate,
  image::ImagePipeline,
  sighting::Sighting,
  store::{Page, PageRequest, TrackingStore},
  subject::{NewSubject, TrackedSubject},
};
use spoor_pipeline::FirstSighting;
use uuid::Uuid;

use crate::{ApiState, PageParams, auth::AuthenticatedObserver, error::ApiError, sightings::ImageBody};

// ─── List ─────────────────────────────────────────────────────────────────────

/// `GET /subjects[?page=<n>&page_size=<n>]`
pub async fn list<S, I>(
  State(state): State<ApiState<S, I>>,
  params: Result<Query<PageParams>, QueryRejection>,
) -> Result<Json<Page<TrackedSubject>>, ApiError>
where
  S: TrackingStore + 'static,
  I: ImagePipeline + 'static,
{
  let Query(params) = params?;
  let page = state
    .store()
    .list_subjects(params.into())
    .await
    .map_err(ApiError::internal)?;
  Ok(Json(page))
}

// ─── Create ───────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct FirstSightingBody {
  pub seen_at:   DateTime<Utc>,
  pub latitude:  f64,
  pub longitude: f64,
  pub image:     Option<ImageBody>,
}

#[derive(Debug, Deserialize)]
pub struct CreateBody {
  pub name:           String,
  pub date_of_birth:  NaiveDate,
  pub first_sighting: Option<FirstSightingBody>,
}

/// `POST /subjects`
pub async fn create<S, I>(
  State(state): State<ApiState<S, I>>,
  AuthenticatedObserver(observer): AuthenticatedObserver,
  body: Result<Json<CreateBody>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError>
where
  S: TrackingStore + 'static,
  I: ImagePipeline + 'static,
{
  let Json(body) = body?;
  let name = body.name.trim();
  if name.is_empty() {
    return Err(ApiError::BadRequest("name must not be empty".into()));
  }

  let first = match body.first_sighting {
    Some(f) => Some(FirstSighting {
      seen_at:  f.seen_at,
      position: Coordinate { latitude: f.latitude, longitude: f.longitude },
      image:    f.image.map(ImageBody::decode).transpose()?,
    }),
    None => None,
  };

  let subject = state
    .recorder
    .register_subject(
      NewSubject { name: name.to_string(), date_of_birth: body.date_of_birth },
      first,
      observer.observer_id,
    )
    .await?;
  Ok((StatusCode::CREATED, Json(subject)))
}

// ─── Get one ──────────────────────────────────────────────────────────────────

/// `GET /subjects/{id}`
pub async fn get_one<S, I>(
  State(state): State<ApiState<S, I>>,
  id: Result<Path<Uuid>, PathRejection>,
) -> Result<Json<TrackedSubject>, ApiError>
where
  S: TrackingStore + 'static,
  I: ImagePipeline + 'static,
{
  let Path(id) = id?;
  let subject = state
    .store()
    .get_subject(id)
    .await
    .map_err(ApiError::internal)?
    .ok_or_else(|| ApiError::NotFound(format!("subject not found: {id}")))?;
  Ok(Json(subject))
}

// ─── Sightings ───────────────────────────────────────────────────────────────

/// `GET /subjects/{id}/sightings[?page=<n>&page_size=<n>]`
pub async fn sightings<S, I>(
  State(state): State<ApiState<S, I>>,
  id: Result<Path<Uuid>, PathRejection>,
  params: Result<Query<PageParams>, QueryRejection>,
) -> Result<Json<Page<Sighting>>, ApiError>
where
  S: TrackingStore + 'static,
  I: ImagePipeline + 'static,
{
  let (Path(id), Query(params)) = (id?, params?);
  let page: PageRequest = params.into();
  Ok(Json(state.recorder.sightings_by_subject(id, page).await?))
}
