//! Handlers for `/sightings` endpoints.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `POST` | `/sightings` | Basic auth; optional base64 `image` |

use axum::{
  Json,
  extract::{State, rejection::JsonRejection},
  http::StatusCode,
  response::IntoResponse,
};
use base64::{Engine as _, engine::general_purpose::STANDARD as B64};
use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use spoor_core::{
  geofence::Coordinate,
  image::ImagePipeline,
  sighting::{ImageUpload, NewSighting},
  store::TrackingStore,
};
use uuid::Uuid;

use crate::{ApiState, auth::AuthenticatedObserver, error::ApiError};

/// An image attached inline to a JSON request.
#[derive(Debug, Deserialize)]
pub struct ImageBody {
  pub content_type: String,
  pub filename:     String,
  /// Standard base64, padded.
  pub data:         String,
}

impl ImageBody {
  pub fn decode(self) -> Result<ImageUpload, ApiError> {
    let data = B64
      .decode(self.data.trim())
      .map_err(|e| ApiError::BadRequest(format!("image data is not valid base64: {e}")))?;
    Ok(ImageUpload {
      content_type: self.content_type,
      filename:     self.filename,
      data:         Bytes::from(data),
    })
  }
}

#[derive(Debug, Deserialize)]
pub struct CreateBody {
  pub subject_id: Uuid,
  pub seen_at:    DateTime<Utc>,
  pub latitude:   f64,
  pub longitude:  f64,
  pub image:      Option<ImageBody>,
}

/// `POST /sightings`
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
  let candidate = NewSighting {
    subject_id: body.subject_id,
    seen_at:    body.seen_at,
    position:   Coordinate { latitude: body.latitude, longitude: body.longitude },
    image:      body.image.map(ImageBody::decode).transpose()?,
  };

  let sighting = state
    .recorder
    .create_sighting(candidate, observer.observer_id)
    .await?;
  Ok((StatusCode::CREATED, Json(sighting)))
}
