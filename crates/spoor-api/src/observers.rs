//! Handlers for `/observers` endpoints.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `POST` | `/observers` | Body: `{"name","email","password"}`; 409 on a taken email |
//! | `GET`  | `/observers/me` | Basic auth |

use axum::{
  Json,
  extract::{State, rejection::JsonRejection},
  http::StatusCode,
  response::IntoResponse,
};
use serde::Deserialize;
use spoor_core::{
  image::ImagePipeline,
  observer::{NewObserver, Observer},
  store::TrackingStore,
};

use crate::{
  ApiState,
  auth::{AuthenticatedObserver, hash_password},
  error::ApiError,
};

#[derive(Debug, Deserialize)]
pub struct RegisterBody {
  pub name:     String,
  pub email:    String,
  pub password: String,
}

/// `POST /observers`
pub async fn register<S, I>(
  State(state): State<ApiState<S, I>>,
  body: Result<Json<RegisterBody>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError>
where
  S: TrackingStore + 'static,
  I: ImagePipeline + 'static,
{
  let Json(body) = body?;
  let name = body.name.trim();
  let email = body.email.trim();

  if name.is_empty() {
    return Err(ApiError::BadRequest("name must not be empty".into()));
  }
  if !email.contains('@') || email.contains(':') {
    return Err(ApiError::BadRequest(format!("invalid email address {email:?}")));
  }
  if body.password.is_empty() {
    return Err(ApiError::BadRequest("password must not be empty".into()));
  }

  let observer = state
    .store()
    .add_observer(NewObserver {
      name:          name.to_string(),
      email:         email.to_string(),
      password_hash: hash_password(&body.password)?,
    })
    .await
    .map_err(ApiError::internal)?
    .ok_or_else(|| ApiError::Conflict(format!("email {email} is already registered")))?;

  tracing::info!(observer_id = %observer.observer_id, "observer registered");
  Ok((StatusCode::CREATED, Json(observer)))
}

/// `GET /observers/me`
pub async fn me(AuthenticatedObserver(observer): AuthenticatedObserver) -> Json<Observer> {
  Json(observer)
}
