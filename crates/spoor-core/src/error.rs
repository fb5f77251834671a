//! Error types for `spoor-core`.

use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum Error {
  #[error("latitude must be within [-90, 90], got {0}")]
  Latitude(f64),

  #[error("longitude must be within [-180, 180], got {0}")]
  Longitude(f64),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
