//! HTTP Basic authentication against registered observers.

use argon2::{
  Argon2, PasswordHash, PasswordHasher, PasswordVerifier, password_hash::SaltString,
};
use axum::{
  extract::FromRequestParts,
  http::{HeaderMap, header, request::Parts},
};
use base64::{Engine as _, engine::general_purpose::STANDARD as B64};
use rand_core::OsRng;
use spoor_core::{image::ImagePipeline, observer::Observer, store::TrackingStore};

use crate::{ApiState, error::ApiError};

/// Present in a handler's arguments means the request carried valid
/// credentials for this observer.
#[derive(Debug, Clone)]
pub struct AuthenticatedObserver(pub Observer);

/// Hash `password` into an argon2id PHC string.
pub fn hash_password(password: &str) -> Result<String, ApiError> {
  let salt = SaltString::generate(&mut OsRng);
  Argon2::default()
    .hash_password(password.as_bytes(), &salt)
    .map(|hash| hash.to_string())
    .map_err(|e| ApiError::Internal(format!("cannot hash password: {e}").into()))
}

/// Pull `email:password` out of a `Basic` authorization header.
fn basic_credentials(headers: &HeaderMap) -> Result<(String, String), ApiError> {
  let header_val = headers
    .get(header::AUTHORIZATION)
    .and_then(|v| v.to_str().ok())
    .ok_or(ApiError::Unauthorized)?;

  let encoded = header_val
    .strip_prefix("Basic ")
    .ok_or(ApiError::Unauthorized)?;

  let decoded = B64.decode(encoded).map_err(|_| ApiError::Unauthorized)?;
  let creds   = String::from_utf8(decoded).map_err(|_| ApiError::Unauthorized)?;

  let (email, password) = creds.split_once(':').ok_or(ApiError::Unauthorized)?;
  Ok((email.to_string(), password.to_string()))
}

/// Resolve the observer the request authenticates as.
pub async fn authenticate<S>(headers: &HeaderMap, store: &S) -> Result<Observer, ApiError>
where
  S: TrackingStore,
{
  let (email, password) = basic_credentials(headers)?;

  let creds = store
    .find_credentials(email.trim())
    .await
    .map_err(ApiError::internal)?
    .ok_or(ApiError::Unauthorized)?;

  let parsed_hash = PasswordHash::new(&creds.password_hash)
    .map_err(|_| ApiError::Unauthorized)?;

  Argon2::default()
    .verify_password(password.as_bytes(), &parsed_hash)
    .map_err(|_| ApiError::Unauthorized)?;

  Ok(creds.observer)
}

impl<S, I> FromRequestParts<ApiState<S, I>> for AuthenticatedObserver
where
  S: TrackingStore + 'static,
  I: ImagePipeline + 'static,
{
  type Rejection = ApiError;

  async fn from_request_parts(
    parts: &mut Parts,
    state: &ApiState<S, I>,
  ) -> Result<Self, Self::Rejection> {
    let observer = authenticate(&parts.headers, state.store().as_ref()).await?;
    Ok(AuthenticatedObserver(observer))
  }
}
