//! Encoding and decoding helpers between Rust domain types and the plain-text
//! representations stored in SQLite columns.
//!
//! Timestamps are stored as RFC 3339 UTC strings with a fixed microsecond
//! precision, so lexical order in SQL equals chronological order. Dates are
//! `YYYY-MM-DD`. UUIDs are stored as hyphenated lowercase strings.

use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};
use spoor_core::{
  geofence::Coordinate,
  observer::Observer,
  sighting::Sighting,
  subject::{LastSeen, TrackedSubject},
};
use uuid::Uuid;

use crate::{Error, Result};

// ─── Uuid ─────────────────────────────────────────────────────────────────────

pub fn encode_uuid(id: Uuid) -> String { id.hyphenated().to_string() }

pub fn decode_uuid(s: &str) -> Result<Uuid> { Ok(Uuid::parse_str(s)?) }

// ─── DateTime<Utc> / NaiveDate ───────────────────────────────────────────────

pub fn encode_dt(dt: DateTime<Utc>) -> String {
  dt.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub fn decode_dt(s: &str) -> Result<DateTime<Utc>> {
  DateTime::parse_from_rfc3339(s)
    .map(|dt| dt.with_timezone(&Utc))
    .map_err(|e| Error::DateParse(e.to_string()))
}

pub fn encode_date(d: NaiveDate) -> String { d.format("%Y-%m-%d").to_string() }

pub fn decode_date(s: &str) -> Result<NaiveDate> {
  NaiveDate::parse_from_str(s, "%Y-%m-%d").map_err(|e| Error::DateParse(e.to_string()))
}

// ─── Integers ────────────────────────────────────────────────────────────────

pub fn encode_version(v: u64) -> Result<i64> {
  i64::try_from(v).map_err(|_| Error::Corrupt(format!("version {v} exceeds i64")))
}

pub fn decode_version(v: i64) -> Result<u64> {
  u64::try_from(v).map_err(|_| Error::Corrupt(format!("negative version {v}")))
}

pub fn decode_count(v: i64) -> Result<u64> {
  u64::try_from(v).map_err(|_| Error::Corrupt(format!("negative row count {v}")))
}

// ─── Row types ───────────────────────────────────────────────────────────────

/// Column list matching [`RawSubject::from_row`].
pub const SUBJECT_COLUMNS: &str = "subject_id, name, date_of_birth, created_at, \
                                   last_seen_at, last_latitude, last_longitude, version";

/// Raw values read directly from a `subjects` row.
pub struct RawSubject {
  pub subject_id:     String,
  pub name:           String,
  pub date_of_birth:  String,
  pub created_at:     String,
  pub last_seen_at:   Option<String>,
  pub last_latitude:  Option<f64>,
  pub last_longitude: Option<f64>,
  pub version:        i64,
}

impl RawSubject {
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      subject_id:     row.get(0)?,
      name:           row.get(1)?,
      date_of_birth:  row.get(2)?,
      created_at:     row.get(3)?,
      last_seen_at:   row.get(4)?,
      last_latitude:  row.get(5)?,
      last_longitude: row.get(6)?,
      version:        row.get(7)?,
    })
  }

  pub fn into_subject(self) -> Result<TrackedSubject> {
    let last_seen = match (self.last_seen_at, self.last_latitude, self.last_longitude) {
      (Some(at), Some(latitude), Some(longitude)) => Some(LastSeen {
        at:       decode_dt(&at)?,
        position: Coordinate { latitude, longitude },
      }),
      (None, None, None) => None,
      _ => {
        return Err(Error::Corrupt(format!(
          "subject {} has a partial last-seen state",
          self.subject_id
        )));
      }
    };

    Ok(TrackedSubject {
      subject_id: decode_uuid(&self.subject_id)?,
      name: self.name,
      date_of_birth: decode_date(&self.date_of_birth)?,
      created_at: decode_dt(&self.created_at)?,
      last_seen,
      version: decode_version(self.version)?,
    })
  }
}

/// Column list matching [`RawSighting::from_row`]; every column is qualified
/// with the `s` alias so the list can be used in joins.
pub const SIGHTING_COLUMNS: &str = "s.sighting_id, s.subject_id, s.observer_id, s.seen_at, \
                                    s.latitude, s.longitude, s.image_url, s.recorded_at";

/// Raw values read directly from a `sightings` row.
pub struct RawSighting {
  pub sighting_id: String,
  pub subject_id:  String,
  pub observer_id: String,
  pub seen_at:     String,
  pub latitude:    f64,
  pub longitude:   f64,
  pub image_url:   Option<String>,
  pub recorded_at: String,
}

impl RawSighting {
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      sighting_id: row.get(0)?,
      subject_id:  row.get(1)?,
      observer_id: row.get(2)?,
      seen_at:     row.get(3)?,
      latitude:    row.get(4)?,
      longitude:   row.get(5)?,
      image_url:   row.get(6)?,
      recorded_at: row.get(7)?,
    })
  }

  pub fn into_sighting(self) -> Result<Sighting> {
    Ok(Sighting {
      sighting_id: decode_uuid(&self.sighting_id)?,
      subject_id:  decode_uuid(&self.subject_id)?,
      observer_id: decode_uuid(&self.observer_id)?,
      seen_at:     decode_dt(&self.seen_at)?,
      position:    Coordinate { latitude: self.latitude, longitude: self.longitude },
      image_url:   self.image_url,
      recorded_at: decode_dt(&self.recorded_at)?,
    })
  }
}

/// Column list matching [`RawObserver::from_row`] at the given offset.
pub const OBSERVER_COLUMNS: &str = "o.observer_id, o.name, o.email, o.created_at";

/// Raw values read directly from an `observers` row.
pub struct RawObserver {
  pub observer_id: String,
  pub name:        String,
  pub email:       String,
  pub created_at:  String,
}

impl RawObserver {
  /// Read the four observer columns starting at column `offset`.
  pub fn from_row(row: &rusqlite::Row<'_>, offset: usize) -> rusqlite::Result<Self> {
    Ok(Self {
      observer_id: row.get(offset)?,
      name:        row.get(offset + 1)?,
      email:       row.get(offset + 2)?,
      created_at:  row.get(offset + 3)?,
    })
  }

  pub fn into_observer(self) -> Result<Observer> {
    Ok(Observer {
      observer_id: decode_uuid(&self.observer_id)?,
      name:        self.name,
      email:       self.email,
      created_at:  decode_dt(&self.created_at)?,
    })
  }
}
