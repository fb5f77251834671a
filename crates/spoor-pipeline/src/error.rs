//! Error types for `spoor-pipeline`.

use thiserror::Error;
use uuid::Uuid;

/// Request-fatal errors returned by the sighting recorder.
///
/// Notification failures never appear here; they are logged by the notifier
/// and the dispatch consumer.
#[derive(Debug, Error)]
pub enum RecordError {
  #[error("invalid coordinate: {0}")]
  InvalidCoordinate(#[from] spoor_core::Error),

  #[error("subject not found: {0}")]
  SubjectNotFound(Uuid),

  #[error("observer not found: {0}")]
  ObserverNotFound(Uuid),

  #[error(
    "sighting is {distance_km:.3} km from the last known position; \
     it must be more than 5 km away"
  )]
  TooClose { distance_km: f64 },

  #[error(
    "invalid image type {content_type:?} for {filename:?}; \
     only image/jpeg (.jpg, .jpeg) and image/png (.png) are allowed"
  )]
  InvalidImageType { content_type: String, filename: String },

  /// The subject kept changing under us; every commit attempt lost the race.
  #[error("subject {0} was updated concurrently; retry the request")]
  Conflict(Uuid),

  #[error("image pipeline error: {0}")]
  Image(#[source] Box<dyn std::error::Error + Send + Sync>),

  #[error("store error: {0}")]
  Store(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl RecordError {
  pub(crate) fn store<E: std::error::Error + Send + Sync + 'static>(e: E) -> Self {
    Self::Store(Box::new(e))
  }

  pub(crate) fn image<E: std::error::Error + Send + Sync + 'static>(e: E) -> Self {
    Self::Image(Box::new(e))
  }
}

/// Errors from [`ImageProcessor`](crate::image::ImageProcessor).
#[derive(Debug, Error)]
pub enum ImageError {
  #[error("image codec error: {0}")]
  Codec(#[from] image::ImageError),

  #[error("image storage error: {0}")]
  Io(#[from] std::io::Error),

  #[error("image worker failed: {0}")]
  Join(#[from] tokio::task::JoinError),
}

/// Errors from the outbound mail transports.
#[derive(Debug, Error)]
pub enum MailError {
  #[error("mail api request failed: {0}")]
  Http(#[from] reqwest::Error),
}
