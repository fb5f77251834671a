//! Sightings: immutable observation events.

use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{geofence::Coordinate, observer::Observer};

/// One confirmed observation of a subject by an observer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sighting {
  pub sighting_id: Uuid,
  pub subject_id:  Uuid,
  pub observer_id: Uuid,
  /// When the animal was seen (reported by the observer).
  pub seen_at:     DateTime<Utc>,
  pub position:    Coordinate,
  pub image_url:   Option<String>,
  /// When the server persisted the sighting.
  pub recorded_at: DateTime<Utc>,
}

/// A raw image attached to a sighting report, before any processing.
#[derive(Debug, Clone)]
pub struct ImageUpload {
  pub content_type: String,
  pub filename:     String,
  pub data:         Bytes,
}

/// A candidate sighting as submitted by an observer.
#[derive(Debug, Clone)]
pub struct NewSighting {
  pub subject_id: Uuid,
  pub seen_at:    DateTime<Utc>,
  pub position:   Coordinate,
  pub image:      Option<ImageUpload>,
}

/// A historical sighting expanded with the observer who reported it.
#[derive(Debug, Clone)]
pub struct ObservedSighting {
  pub sighting: Sighting,
  pub observer: Observer,
}
