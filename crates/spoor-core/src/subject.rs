//! Tracked subject: the animal a stream of sightings refers to.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::geofence::Coordinate;

/// When and where a subject was most recently sighted.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LastSeen {
  pub at:       DateTime<Utc>,
  pub position: Coordinate,
}

/// An individually identified animal.
///
/// `last_seen` is `None` until the first sighting is recorded and afterwards
/// always mirrors the most recently accepted sighting. `version` increases by
/// one on every accepted sighting and guards that update (compare-and-swap).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackedSubject {
  pub subject_id:    Uuid,
  pub name:          String,
  pub date_of_birth: NaiveDate,
  pub created_at:    DateTime<Utc>,
  pub last_seen:     Option<LastSeen>,
  pub version:       u64,
}

impl TrackedSubject {
  pub fn last_position(&self) -> Option<Coordinate> {
    self.last_seen.map(|ls| ls.position)
  }
}

/// Input to [`TrackingStore::add_subject`](crate::store::TrackingStore::add_subject).
#[derive(Debug, Clone, Deserialize)]
pub struct NewSubject {
  pub name:          String,
  pub date_of_birth: NaiveDate,
}
