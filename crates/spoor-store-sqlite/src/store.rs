//! [`SqliteStore`], the SQLite implementation of [`TrackingStore`].

use std::path::Path;

use chrono::Utc;
use rusqlite::OptionalExtension as _;
use uuid::Uuid;

use spoor_core::{
  observer::{NewObserver, Observer, ObserverCredentials},
  sighting::{ObservedSighting, Sighting},
  store::{CommitOutcome, Page, PageRequest, TrackingStore},
  subject::{NewSubject, TrackedSubject},
};

use crate::{
  encode::{
    decode_count, decode_version, encode_date, encode_dt, encode_uuid, encode_version, RawObserver,
    RawSighting, RawSubject, OBSERVER_COLUMNS, SIGHTING_COLUMNS, SUBJECT_COLUMNS,
  },
  schema::SCHEMA,
  Error, Result,
};

// ─── Store ───────────────────────────────────────────────────────────────────

/// A Spoor store backed by a single SQLite file.
///
/// Cloning is cheap; the inner connection is reference-counted.
#[derive(Clone)]
pub struct SqliteStore {
  conn: tokio_rusqlite::Connection,
}

impl SqliteStore {
  /// Open (or create) a store at `path` and run schema initialisation.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open(path).await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  /// Open an in-memory store, mostly for tests.
  pub async fn open_in_memory() -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  async fn init_schema(&self) -> Result<()> {
    self
      .conn
      .call(|conn| {
        conn.execute_batch(SCHEMA)?;
        Ok(())
      })
      .await?;
    Ok(())
  }
}

// ─── TrackingStore impl ──────────────────────────────────────────────────────

impl TrackingStore for SqliteStore {
  type Error = Error;

  // ── Observers ─────────────────────────────────────────────────────────────

  async fn add_observer(&self, input: NewObserver) -> Result<Option<Observer>> {
    let observer = Observer {
      observer_id: Uuid::new_v4(),
      name:        input.name,
      email:       input.email.trim().to_owned(),
      created_at:  Utc::now(),
    };

    let id_str = encode_uuid(observer.observer_id);
    let name   = observer.name.clone();
    let email  = observer.email.clone();
    let hash   = input.password_hash;
    let at_str = encode_dt(observer.created_at);

    let inserted: bool = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        let taken = tx
          .query_row(
            "SELECT 1 FROM observers WHERE email = ?1",
            rusqlite::params![email],
            |_| Ok(true),
          )
          .optional()?
          .unwrap_or(false);
        if taken {
          return Ok(false);
        }
        tx.execute(
          "INSERT INTO observers (observer_id, name, email, password_hash, created_at)
           VALUES (?1, ?2, ?3, ?4, ?5)",
          rusqlite::params![id_str, name, email, hash, at_str],
        )?;
        tx.commit()?;
        Ok(true)
      })
      .await?;

    Ok(inserted.then_some(observer))
  }

  async fn get_observer(&self, id: Uuid) -> Result<Option<Observer>> {
    let id_str = encode_uuid(id);

    let raw: Option<RawObserver> = self
      .conn
      .call(move |conn| {
        Ok(conn
          .query_row(
            &format!("SELECT {OBSERVER_COLUMNS} FROM observers o WHERE o.observer_id = ?1"),
            rusqlite::params![id_str],
            |row| RawObserver::from_row(row, 0),
          )
          .optional()?)
      })
      .await?;

    raw.map(RawObserver::into_observer).transpose()
  }

  async fn find_credentials(&self, email: &str) -> Result<Option<ObserverCredentials>> {
    let email = email.trim().to_owned();

    let raw: Option<(RawObserver, String)> = self
      .conn
      .call(move |conn| {
        Ok(conn
          .query_row(
            &format!(
              "SELECT {OBSERVER_COLUMNS}, o.password_hash FROM observers o WHERE o.email = ?1"
            ),
            rusqlite::params![email],
            |row| Ok((RawObserver::from_row(row, 0)?, row.get(4)?)),
          )
          .optional()?)
      })
      .await?;

    raw
      .map(|(observer, password_hash)| {
        Ok(ObserverCredentials { observer: observer.into_observer()?, password_hash })
      })
      .transpose()
  }

  // ── Subjects ──────────────────────────────────────────────────────────────

  async fn add_subject(&self, input: NewSubject) -> Result<TrackedSubject> {
    let subject = TrackedSubject {
      subject_id:    Uuid::new_v4(),
      name:          input.name,
      date_of_birth: input.date_of_birth,
      created_at:    Utc::now(),
      last_seen:     None,
      version:       0,
    };

    let id_str  = encode_uuid(subject.subject_id);
    let name    = subject.name.clone();
    let dob_str = encode_date(subject.date_of_birth);
    let at_str  = encode_dt(subject.created_at);

    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO subjects (subject_id, name, date_of_birth, created_at, version)
           VALUES (?1, ?2, ?3, ?4, 0)",
          rusqlite::params![id_str, name, dob_str, at_str],
        )?;
        Ok(())
      })
      .await?;

    Ok(subject)
  }

  async fn get_subject(&self, id: Uuid) -> Result<Option<TrackedSubject>> {
    let id_str = encode_uuid(id);

    let raw: Option<RawSubject> = self
      .conn
      .call(move |conn| {
        Ok(conn
          .query_row(
            &format!("SELECT {SUBJECT_COLUMNS} FROM subjects WHERE subject_id = ?1"),
            rusqlite::params![id_str],
            RawSubject::from_row,
          )
          .optional()?)
      })
      .await?;

    raw.map(RawSubject::into_subject).transpose()
  }

  async fn list_subjects(&self, page: PageRequest) -> Result<Page<TrackedSubject>> {
    let limit_val  = page.limit() as i64;
    let offset_val = page.offset() as i64;

    let (raws, total): (Vec<RawSubject>, i64) = self
      .conn
      .call(move |conn| {
        let total: i64 = conn.query_row("SELECT COUNT(*) FROM subjects", [], |r| r.get(0))?;

        let mut stmt = conn.prepare(&format!(
          "SELECT {SUBJECT_COLUMNS}
           FROM subjects
           ORDER BY last_seen_at IS NULL, last_seen_at DESC, created_at DESC
           LIMIT ?1 OFFSET ?2"
        ))?;
        let rows = stmt
          .query_map(rusqlite::params![limit_val, offset_val], RawSubject::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;

        Ok((rows, total))
      })
      .await?;

    Ok(Page {
      items: raws.into_iter().map(RawSubject::into_subject).collect::<Result<_>>()?,
      total: decode_count(total)?,
    })
  }

  // ── Sightings ─────────────────────────────────────────────────────────────

  async fn record_sighting(
    &self,
    sighting:         Sighting,
    expected_version: u64,
  ) -> Result<CommitOutcome> {
    let sighting_id_str = encode_uuid(sighting.sighting_id);
    let subject_id_str  = encode_uuid(sighting.subject_id);
    let observer_id_str = encode_uuid(sighting.observer_id);
    let seen_at_str     = encode_dt(sighting.seen_at);
    let recorded_at_str = encode_dt(sighting.recorded_at);
    let latitude        = sighting.position.latitude;
    let longitude       = sighting.position.longitude;
    let image_url       = sighting.image_url;
    let expected        = encode_version(expected_version)?;

    // Ok(subject) on commit, Err(current version) on conflict.
    let outcome: std::result::Result<RawSubject, Option<i64>> = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;

        let updated = tx.execute(
          "UPDATE subjects
           SET last_seen_at = ?1, last_latitude = ?2, last_longitude = ?3,
               version = version + 1
           WHERE subject_id = ?4 AND version = ?5",
          rusqlite::params![seen_at_str, latitude, longitude, subject_id_str, expected],
        )?;

        if updated == 0 {
          let current: Option<i64> = tx
            .query_row(
              "SELECT version FROM subjects WHERE subject_id = ?1",
              rusqlite::params![subject_id_str],
              |r| r.get(0),
            )
            .optional()?;
          // Dropping `tx` rolls back; nothing was written anyway.
          return Ok(Err(current));
        }

        tx.execute(
          "INSERT INTO sightings (
             sighting_id, subject_id, observer_id, seen_at,
             latitude, longitude, image_url, recorded_at
           ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
          rusqlite::params![
            sighting_id_str,
            subject_id_str,
            observer_id_str,
            seen_at_str,
            latitude,
            longitude,
            image_url,
            recorded_at_str,
          ],
        )?;

        let subject = tx.query_row(
          &format!("SELECT {SUBJECT_COLUMNS} FROM subjects WHERE subject_id = ?1"),
          rusqlite::params![subject_id_str],
          RawSubject::from_row,
        )?;

        tx.commit()?;
        Ok(Ok(subject))
      })
      .await?;

    match outcome {
      Ok(raw) => Ok(CommitOutcome::Committed(raw.into_subject()?)),
      Err(current) => Ok(CommitOutcome::Conflict {
        current_version: current.map(decode_version).transpose()?,
      }),
    }
  }

  async fn list_sightings(&self, subject_id: Uuid, page: PageRequest) -> Result<Page<Sighting>> {
    let subject_id_str = encode_uuid(subject_id);
    let limit_val      = page.limit() as i64;
    let offset_val     = page.offset() as i64;

    let (raws, total): (Vec<RawSighting>, i64) = self
      .conn
      .call(move |conn| {
        let total: i64 = conn.query_row(
          "SELECT COUNT(*) FROM sightings WHERE subject_id = ?1",
          rusqlite::params![subject_id_str],
          |r| r.get(0),
        )?;

        let mut stmt = conn.prepare(&format!(
          "SELECT {SIGHTING_COLUMNS}
           FROM sightings s
           WHERE s.subject_id = ?1
           ORDER BY s.seen_at DESC, s.recorded_at DESC
           LIMIT ?2 OFFSET ?3"
        ))?;
        let rows = stmt
          .query_map(
            rusqlite::params![subject_id_str, limit_val, offset_val],
            RawSighting::from_row,
          )?
          .collect::<rusqlite::Result<Vec<_>>>()?;

        Ok((rows, total))
      })
      .await?;

    Ok(Page {
      items: raws.into_iter().map(RawSighting::into_sighting).collect::<Result<_>>()?,
      total: decode_count(total)?,
    })
  }

  async fn sighting_history(&self, subject_id: Uuid, limit: u32) -> Result<Vec<ObservedSighting>> {
    let subject_id_str = encode_uuid(subject_id);
    let limit_val      = i64::from(limit);

    let raws: Vec<(RawSighting, RawObserver)> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&format!(
          "SELECT {SIGHTING_COLUMNS}, {OBSERVER_COLUMNS}
           FROM sightings s
           JOIN observers o ON o.observer_id = s.observer_id
           WHERE s.subject_id = ?1
           ORDER BY s.seen_at DESC, s.recorded_at DESC
           LIMIT ?2"
        ))?;
        let rows = stmt
          .query_map(rusqlite::params![subject_id_str, limit_val], |row| {
            Ok((RawSighting::from_row(row)?, RawObserver::from_row(row, 8)?))
          })?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws
      .into_iter()
      .map(|(sighting, observer)| {
        Ok(ObservedSighting {
          sighting: sighting.into_sighting()?,
          observer: observer.into_observer()?,
        })
      })
      .collect()
  }
}
