//! Test doubles shared by the pipeline's unit tests.

use std::{
  collections::HashSet,
  sync::{
    atomic::{AtomicBool, AtomicUsize, Ordering},
    Arc, Mutex,
  },
};

use bytes::Bytes;
use chrono::{Duration, NaiveDate, SubsecRound, Utc};
use spoor_core::{
  geofence::Coordinate,
  image::ImagePipeline,
  mail::MailSender,
  notification::NotificationMessage,
  observer::{NewObserver, Observer, ObserverCredentials},
  sighting::{ObservedSighting, Sighting},
  store::{CommitOutcome, Page, PageRequest, TrackingStore},
  subject::{NewSubject, TrackedSubject},
};
use spoor_store_sqlite::SqliteStore;
use uuid::Uuid;

// ─── Mail ────────────────────────────────────────────────────────────────────

#[derive(Debug, thiserror::Error)]
#[error("recipient refused: {0}")]
pub struct Refused(pub String);

/// Records every delivered message; refuses the configured addresses.
#[derive(Debug, Default)]
pub struct RecordingMailer {
  refuse:   HashSet<String>,
  sent:     Mutex<Vec<NotificationMessage>>,
  attempts: AtomicUsize,
}

impl RecordingMailer {
  pub fn failing_for<'a>(addresses: impl IntoIterator<Item = &'a str>) -> Self {
    Self {
      refuse: addresses.into_iter().map(str::to_owned).collect(),
      ..Self::default()
    }
  }

  pub fn sent(&self) -> Vec<NotificationMessage> { self.sent.lock().unwrap().clone() }

  pub fn attempts(&self) -> usize { self.attempts.load(Ordering::SeqCst) }
}

impl MailSender for RecordingMailer {
  type Error = Refused;

  async fn send(&self, message: &NotificationMessage) -> Result<(), Refused> {
    self.attempts.fetch_add(1, Ordering::SeqCst);
    if self.refuse.contains(&message.destination) {
      return Err(Refused(message.destination.clone()));
    }
    self.sent.lock().unwrap().push(message.clone());
    Ok(())
  }
}

pub fn message(destination: &str) -> NotificationMessage {
  NotificationMessage {
    destination:  destination.into(),
    subject_name: "Raja".into(),
    seen_at:      "2024-01-01 12:00:00".into(),
    latitude:     "-7.250676".into(),
    longitude:    "111.828316".into(),
    image_url:    None,
  }
}

// ─── Images ──────────────────────────────────────────────────────────────────

/// Accepts the real content-type rules and "uploads" to `memory://{filename}`.
#[derive(Debug, Default)]
pub struct CountingImages {
  pub resizes: AtomicUsize,
  pub uploads: AtomicUsize,
}

impl ImagePipeline for CountingImages {
  type Error = std::io::Error;

  fn is_content_type_valid(&self, content_type: &str, filename: &str) -> bool {
    crate::image::is_content_type_valid(content_type, filename)
  }

  async fn resize(&self, data: Bytes, _filename: &str) -> Result<Bytes, Self::Error> {
    self.resizes.fetch_add(1, Ordering::SeqCst);
    Ok(data)
  }

  async fn upload(&self, _data: Bytes, filename: &str) -> Result<String, Self::Error> {
    self.uploads.fetch_add(1, Ordering::SeqCst);
    Ok(format!("memory://{filename}"))
  }
}

/// Which step of [`FailingImages`] reports an error.
#[derive(Debug, Clone, Copy)]
pub enum FailAt {
  Resize,
  Upload,
}

/// An image pipeline whose object store (or codec) is down.
#[derive(Debug)]
pub struct FailingImages {
  fail_at: FailAt,
}

impl FailingImages {
  pub fn new(fail_at: FailAt) -> Self { Self { fail_at } }
}

impl ImagePipeline for FailingImages {
  type Error = std::io::Error;

  fn is_content_type_valid(&self, content_type: &str, filename: &str) -> bool {
    crate::image::is_content_type_valid(content_type, filename)
  }

  async fn resize(&self, data: Bytes, _filename: &str) -> Result<Bytes, Self::Error> {
    match self.fail_at {
      FailAt::Resize => Err(std::io::Error::other("codec unavailable")),
      FailAt::Upload => Ok(data),
    }
  }

  async fn upload(&self, _data: Bytes, _filename: &str) -> Result<String, Self::Error> {
    Err(std::io::Error::other("object store unavailable"))
  }
}

// ─── Stores ──────────────────────────────────────────────────────────────────

/// An in-memory store holding one subject sighted once by each entry of
/// `emails`, oldest first. Repeated addresses reuse the same observer.
pub async fn seeded_store(emails: &[&str]) -> (Arc<SqliteStore>, TrackedSubject, Vec<Sighting>) {
  let store = SqliteStore::open_in_memory().await.unwrap();
  let mut subject = store
    .add_subject(NewSubject {
      name:          "Raja".into(),
      date_of_birth: NaiveDate::from_ymd_opt(2018, 3, 14).unwrap(),
    })
    .await
    .unwrap();

  let start = Utc::now().trunc_subsecs(6) - Duration::days(1);
  let mut sightings = Vec::new();
  for (i, email) in emails.iter().enumerate() {
    let observer_id = match store.find_credentials(email).await.unwrap() {
      Some(c) => c.observer.observer_id,
      None => {
        store
          .add_observer(NewObserver {
            name:          format!("Observer {i}"),
            email:         (*email).into(),
            password_hash: "hash".into(),
          })
          .await
          .unwrap()
          .unwrap()
          .observer_id
      }
    };

    let sighting = Sighting {
      sighting_id: Uuid::new_v4(),
      subject_id: subject.subject_id,
      observer_id,
      seen_at: start + Duration::minutes(i as i64),
      position: Coordinate::new(-60.0 + 10.0 * i as f64, 100.0).unwrap(),
      image_url: None,
      recorded_at: start + Duration::minutes(i as i64),
    };
    match store.record_sighting(sighting.clone(), subject.version).await.unwrap() {
      CommitOutcome::Committed(updated) => subject = updated,
      CommitOutcome::Conflict { .. } => panic!("unexpected conflict while seeding"),
    }
    sightings.push(sighting);
  }

  (Arc::new(store), subject, sightings)
}

#[derive(Debug, thiserror::Error)]
#[error("history unavailable")]
pub struct Unavailable;

/// A store whose only working method is `sighting_history`, which always fails.
pub struct FailingHistoryStore;

impl TrackingStore for FailingHistoryStore {
  type Error = Unavailable;

  async fn add_observer(&self, _: NewObserver) -> Result<Option<Observer>, Unavailable> {
    unimplemented!()
  }

  async fn get_observer(&self, _: Uuid) -> Result<Option<Observer>, Unavailable> {
    unimplemented!()
  }

  async fn find_credentials(&self, _: &str) -> Result<Option<ObserverCredentials>, Unavailable> {
    unimplemented!()
  }

  async fn add_subject(&self, _: NewSubject) -> Result<TrackedSubject, Unavailable> {
    unimplemented!()
  }

  async fn get_subject(&self, _: Uuid) -> Result<Option<TrackedSubject>, Unavailable> {
    unimplemented!()
  }

  async fn list_subjects(&self, _: PageRequest) -> Result<Page<TrackedSubject>, Unavailable> {
    unimplemented!()
  }

  async fn record_sighting(&self, _: Sighting, _: u64) -> Result<CommitOutcome, Unavailable> {
    unimplemented!()
  }

  async fn list_sightings(&self, _: Uuid, _: PageRequest) -> Result<Page<Sighting>, Unavailable> {
    unimplemented!()
  }

  async fn sighting_history(&self, _: Uuid, _: u32) -> Result<Vec<ObservedSighting>, Unavailable> {
    Err(Unavailable)
  }
}

/// Wraps a [`SqliteStore`] and, on the first `record_sighting`, commits a
/// competing sighting at `rival` just before forwarding the caller's commit.
pub struct RacingStore {
  inner:       Arc<SqliteStore>,
  observer_id: Uuid,
  rival:       Coordinate,
  raced:       AtomicBool,
}

impl RacingStore {
  pub fn new(inner: Arc<SqliteStore>, observer_id: Uuid, rival: Coordinate) -> Self {
    Self { inner, observer_id, rival, raced: AtomicBool::new(false) }
  }
}

impl TrackingStore for RacingStore {
  type Error = spoor_store_sqlite::Error;

  async fn add_observer(&self, input: NewObserver) -> Result<Option<Observer>, Self::Error> {
    self.inner.add_observer(input).await
  }

  async fn get_observer(&self, id: Uuid) -> Result<Option<Observer>, Self::Error> {
    self.inner.get_observer(id).await
  }

  async fn find_credentials(&self, email: &str) -> Result<Option<ObserverCredentials>, Self::Error> {
    self.inner.find_credentials(email).await
  }

  async fn add_subject(&self, input: NewSubject) -> Result<TrackedSubject, Self::Error> {
    self.inner.add_subject(input).await
  }

  async fn get_subject(&self, id: Uuid) -> Result<Option<TrackedSubject>, Self::Error> {
    self.inner.get_subject(id).await
  }

  async fn list_subjects(&self, page: PageRequest) -> Result<Page<TrackedSubject>, Self::Error> {
    self.inner.list_subjects(page).await
  }

  async fn record_sighting(
    &self,
    sighting: Sighting,
    expected_version: u64,
  ) -> Result<CommitOutcome, Self::Error> {
    if !self.raced.swap(true, Ordering::SeqCst) {
      let now = Utc::now().trunc_subsecs(6);
      let rival = Sighting {
        sighting_id: Uuid::new_v4(),
        subject_id:  sighting.subject_id,
        observer_id: self.observer_id,
        seen_at:     now,
        position:    self.rival,
        image_url:   None,
        recorded_at: now,
      };
      let outcome = self.inner.record_sighting(rival, expected_version).await?;
      assert!(matches!(outcome, CommitOutcome::Committed(_)));
    }
    self.inner.record_sighting(sighting, expected_version).await
  }

  async fn list_sightings(&self, id: Uuid, page: PageRequest) -> Result<Page<Sighting>, Self::Error> {
    self.inner.list_sightings(id, page).await
  }

  async fn sighting_history(&self, id: Uuid, limit: u32) -> Result<Vec<ObservedSighting>, Self::Error> {
    self.inner.sighting_history(id, limit).await
  }
}

