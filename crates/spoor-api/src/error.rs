//! API error type and [`axum::response::IntoResponse`] implementation.
//!
//! Every error renders as `{"error": message, "code": CODE}`.

use axum::{
  Json,
  extract::rejection::{JsonRejection, PathRejection, QueryRejection},
  http::{HeaderValue, StatusCode, header},
  response::{IntoResponse, Response},
};
use serde_json::json;
use spoor_pipeline::RecordError;
use thiserror::Error;

/// An error returned by an API handler.
#[derive(Debug, Error)]
pub enum ApiError {
  #[error("{0}")]
  NotFound(String),

  #[error("{0}")]
  TooClose(String),

  #[error("{0}")]
  InvalidImageType(String),

  #[error("{0}")]
  InvalidCoordinate(String),

  #[error("{0}")]
  Conflict(String),

  #[error("unauthorized")]
  Unauthorized,

  #[error("{0}")]
  BadRequest(String),

  #[error("internal error: {0}")]
  Internal(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl ApiError {
  pub fn internal<E: std::error::Error + Send + Sync + 'static>(e: E) -> Self {
    Self::Internal(Box::new(e))
  }

  pub fn code(&self) -> &'static str {
    match self {
      Self::NotFound(_) => "NOT_FOUND",
      Self::TooClose(_) => "TOO_CLOSE",
      Self::InvalidImageType(_) => "INVALID_IMAGE_TYPE",
      Self::InvalidCoordinate(_) => "INVALID_COORDINATE",
      Self::Conflict(_) => "CONFLICT",
      Self::Unauthorized => "UNAUTHORIZED",
      Self::BadRequest(_) => "BAD_REQUEST",
      Self::Internal(_) => "INTERNAL",
    }
  }

  pub fn status(&self) -> StatusCode {
    match self {
      Self::NotFound(_) => StatusCode::NOT_FOUND,
      Self::TooClose(_) | Self::InvalidCoordinate(_) => StatusCode::UNPROCESSABLE_ENTITY,
      Self::InvalidImageType(_) => StatusCode::UNSUPPORTED_MEDIA_TYPE,
      Self::Conflict(_) => StatusCode::CONFLICT,
      Self::Unauthorized => StatusCode::UNAUTHORIZED,
      Self::BadRequest(_) => StatusCode::BAD_REQUEST,
      Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
  }
}

impl From<RecordError> for ApiError {
  fn from(e: RecordError) -> Self {
    match e {
      RecordError::SubjectNotFound(_) | RecordError::ObserverNotFound(_) => {
        Self::NotFound(e.to_string())
      }
      RecordError::TooClose { .. } => Self::TooClose(e.to_string()),
      RecordError::InvalidImageType { .. } => Self::InvalidImageType(e.to_string()),
      RecordError::InvalidCoordinate(_) => Self::InvalidCoordinate(e.to_string()),
      RecordError::Conflict(_) => Self::Conflict(e.to_string()),
      RecordError::Image(inner) | RecordError::Store(inner) => Self::Internal(inner),
    }
  }
}

impl From<JsonRejection> for ApiError {
  fn from(e: JsonRejection) -> Self { Self::BadRequest(e.body_text()) }
}

impl From<PathRejection> for ApiError {
  fn from(e: PathRejection) -> Self { Self::BadRequest(e.body_text()) }
}

impl From<QueryRejection> for ApiError {
  fn from(e: QueryRejection) -> Self { Self::BadRequest(e.body_text()) }
}

impl IntoResponse for ApiError {
  fn into_response(self) -> Response {
    let message = match &self {
      ApiError::Internal(e) => {
        tracing::error!(error = %e, "request failed");
        "internal server error".to_string()
      }
      other => other.to_string(),
    };

    let mut res =
      (self.status(), Json(json!({ "error": message, "code": self.code() }))).into_response();
    if matches!(self, ApiError::Unauthorized) {
      res.headers_mut().insert(
        header::WWW_AUTHENTICATE,
        HeaderValue::from_static("Basic realm=\"spoor\""),
      );
    }
    res
  }
}
