//! Geofence validation: the minimum-distance rule between consecutive
//! sightings of the same subject.
//!
//! Everything in this module is pure: no clocks, no I/O, no shared state.

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Mean Earth radius used by the haversine formula, in kilometres.
pub const EARTH_RADIUS_KM: f64 = 6371.0;

/// A new sighting must be strictly further than this from the subject's
/// last known position.
pub const MIN_SEPARATION_KM: f64 = 5.0;

const DEG_TO_RAD: f64 = std::f64::consts::PI / 180.0;

// ─── Coordinate ──────────────────────────────────────────────────────────────

/// A WGS84 position in decimal degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinate {
  pub latitude:  f64,
  pub longitude: f64,
}

impl Coordinate {
  /// Build a coordinate, rejecting out-of-range (or NaN) components.
  pub fn new(latitude: f64, longitude: f64) -> Result<Self> {
    Self { latitude, longitude }.validated()
  }

  /// Return `self` if both components are in range.
  ///
  /// Deserialised coordinates bypass [`Coordinate::new`], so callers that
  /// accept untrusted input must run this before using the value.
  pub fn validated(self) -> Result<Self> {
    if !(-90.0..=90.0).contains(&self.latitude) {
      return Err(Error::Latitude(self.latitude));
    }
    if !(-180.0..=180.0).contains(&self.longitude) {
      return Err(Error::Longitude(self.longitude));
    }
    Ok(self)
  }

  /// Great-circle distance to `other` in kilometres (haversine).
  pub fn distance_km(&self, other: &Coordinate) -> f64 {
    let lat1 = self.latitude * DEG_TO_RAD;
    let lat2 = other.latitude * DEG_TO_RAD;
    let delta_lat = (other.latitude - self.latitude) * DEG_TO_RAD;
    let delta_lon = (other.longitude - self.longitude) * DEG_TO_RAD;

    let a = (delta_lat / 2.0).sin().powi(2)
      + lat1.cos() * lat2.cos() * (delta_lon / 2.0).sin().powi(2);
    // Rounding can push `a` a hair above 1 for antipodal points.
    let c = 2.0 * a.min(1.0).sqrt().asin();

    EARTH_RADIUS_KM * c
  }
}

// ─── Validation ──────────────────────────────────────────────────────────────

/// Outcome of [`validate`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Verdict {
  Accept,
  /// The candidate lies within [`MIN_SEPARATION_KM`] of the last position.
  Reject { distance_km: f64 },
}

impl Verdict {
  pub fn is_accept(&self) -> bool { matches!(self, Self::Accept) }
}

/// Check `candidate` against the subject's last known position.
///
/// A subject that has never been sighted (`last == None`) accepts any
/// candidate.
pub fn validate(last: Option<Coordinate>, candidate: Coordinate) -> Verdict {
  let Some(last) = last else {
    return Verdict::Accept;
  };

  let distance_km = last.distance_km(&candidate);
  if distance_km <= MIN_SEPARATION_KM {
    Verdict::Reject { distance_km }
  } else {
    Verdict::Accept
  }
}
