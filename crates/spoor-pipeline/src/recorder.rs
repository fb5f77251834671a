//! The sighting recorder: the request-side half of the pipeline.
//!
//! [`SightingRecorder::create_sighting`] validates a candidate against the
//! geofence, attaches its image, commits it with a compare-and-swap on the
//! subject's version and hands the accepted sighting to the notifier.

use std::sync::Arc;

use chrono::{SubsecRound, Utc};
use serde::Deserialize;
use spoor_core::{
  geofence::{self, Coordinate, Verdict},
  image::ImagePipeline,
  sighting::{ImageUpload, NewSighting, Sighting},
  store::{CommitOutcome, Page, PageRequest, TrackingStore},
  subject::{NewSubject, TrackedSubject},
};
use uuid::Uuid;

use crate::{
  error::RecordError,
  notifier::{NotifierHandle, NotifyJob},
};

pub type Result<T, E = RecordError> = std::result::Result<T, E>;

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(default)]
pub struct RecorderConfig {
  /// Commit attempts before giving up with [`RecordError::Conflict`].
  pub max_commit_attempts: u32,
}

impl Default for RecorderConfig {
  fn default() -> Self { Self { max_commit_attempts: 3 } }
}

/// The optional first sighting supplied when a subject is registered.
#[derive(Debug, Clone)]
pub struct FirstSighting {
  pub seen_at:  chrono::DateTime<Utc>,
  pub position: Coordinate,
  pub image:    Option<ImageUpload>,
}

pub struct SightingRecorder<S, I> {
  store:    Arc<S>,
  images:   Arc<I>,
  notifier: NotifierHandle,
  config:   RecorderConfig,
}

impl<S, I> Clone for SightingRecorder<S, I> {
  fn clone(&self) -> Self {
    Self {
      store:    Arc::clone(&self.store),
      images:   Arc::clone(&self.images),
      notifier: self.notifier.clone(),
      config:   self.config,
    }
  }
}

impl<S, I> SightingRecorder<S, I>
where
  S: TrackingStore,
  I: ImagePipeline,
{
  pub fn new(
    store: Arc<S>,
    images: Arc<I>,
    notifier: NotifierHandle,
    config: RecorderConfig,
  ) -> Self {
    Self { store, images, notifier, config }
  }

  pub fn store(&self) -> &Arc<S> { &self.store }

  /// Validate, persist and announce one sighting.
  ///
  /// Returns as soon as the sighting is committed; notification runs on the
  /// notifier's own tasks.
  pub async fn create_sighting(&self, input: NewSighting, observer_id: Uuid) -> Result<Sighting> {
    let position = input.position.validated()?;
    self.require_observer(observer_id).await?;
    let subject = self.require_subject(input.subject_id).await?;

    check_distance(&subject, position)?;

    let image_url = match input.image {
      Some(image) => Some(self.attach(image).await?),
      None => None,
    };

    let sighting = Sighting {
      sighting_id: Uuid::new_v4(),
      subject_id: subject.subject_id,
      observer_id,
      seen_at: input.seen_at.trunc_subsecs(6),
      position,
      image_url,
      recorded_at: Utc::now().trunc_subsecs(6),
    };

    let subject = self.commit(subject, &sighting).await?;
    tracing::info!(
      subject_id = %subject.subject_id,
      sighting_id = %sighting.sighting_id,
      version = subject.version,
      "sighting recorded",
    );

    self.notifier.trigger(NotifyJob {
      subject_id:   subject.subject_id,
      subject_name: subject.name,
      sighting:     sighting.clone(),
    });
    Ok(sighting)
  }

  /// Create a subject, optionally recording its first sighting straight away.
  /// Registration never notifies anyone.
  ///
  /// The first sighting's image is processed and uploaded before the subject
  /// is written, so a collaborator failure leaves nothing behind.
  pub async fn register_subject(
    &self,
    input: NewSubject,
    first: Option<FirstSighting>,
    observer_id: Uuid,
  ) -> Result<TrackedSubject> {
    if let Some(first) = &first {
      first.position.validated()?;
      if let Some(image) = &first.image {
        self.check_image_type(image)?;
      }
    }
    self.require_observer(observer_id).await?;

    let first = match first {
      Some(first) => {
        let image_url = match first.image {
          Some(image) => Some(self.attach(image).await?),
          None => None,
        };
        Some((first.seen_at, first.position, image_url))
      }
      None => None,
    };

    let subject = self.store.add_subject(input).await.map_err(RecordError::store)?;
    tracing::info!(subject_id = %subject.subject_id, name = %subject.name, "subject registered");

    let Some((seen_at, position, image_url)) = first else { return Ok(subject) };

    let sighting = Sighting {
      sighting_id: Uuid::new_v4(),
      subject_id: subject.subject_id,
      observer_id,
      seen_at: seen_at.trunc_subsecs(6),
      position,
      image_url,
      recorded_at: Utc::now().trunc_subsecs(6),
    };
    self.commit(subject, &sighting).await
  }

  /// Sightings of a subject, newest first.
  pub async fn sightings_by_subject(
    &self,
    subject_id: Uuid,
    page: PageRequest,
  ) -> Result<Page<Sighting>> {
    self.require_subject(subject_id).await?;
    self
      .store
      .list_sightings(subject_id, page)
      .await
      .map_err(RecordError::store)
  }

  // ── Helpers ───────────────────────────────────────────────────────────

  async fn require_observer(&self, id: Uuid) -> Result<()> {
    match self.store.get_observer(id).await.map_err(RecordError::store)? {
      Some(_) => Ok(()),
      None => Err(RecordError::ObserverNotFound(id)),
    }
  }

  async fn require_subject(&self, id: Uuid) -> Result<TrackedSubject> {
    self
      .store
      .get_subject(id)
      .await
      .map_err(RecordError::store)?
      .ok_or(RecordError::SubjectNotFound(id))
  }

  fn check_image_type(&self, image: &ImageUpload) -> Result<()> {
    if self.images.is_content_type_valid(&image.content_type, &image.filename) {
      Ok(())
    } else {
      Err(RecordError::InvalidImageType {
        content_type: image.content_type.clone(),
        filename:     image.filename.clone(),
      })
    }
  }

  async fn attach(&self, image: ImageUpload) -> Result<String> {
    self.check_image_type(&image)?;
    let resized = self
      .images
      .resize(image.data, &image.filename)
      .await
      .map_err(RecordError::image)?;
    self
      .images
      .upload(resized, &image.filename)
      .await
      .map_err(RecordError::image)
  }

  /// Commit `sighting` against `subject`'s version. On a lost race the
  /// subject is reloaded and the geofence re-run against its fresh position.
  async fn commit(&self, subject: TrackedSubject, sighting: &Sighting) -> Result<TrackedSubject> {
    let result = self.try_commit(subject, sighting).await;
    if let (Err(e), Some(url)) = (&result, &sighting.image_url) {
      tracing::warn!(
        subject_id = %sighting.subject_id,
        sighting_id = %sighting.sighting_id,
        %url,
        error = %e,
        "sighting not committed; uploaded image is orphaned",
      );
    }
    result
  }

  async fn try_commit(&self, mut subject: TrackedSubject, sighting: &Sighting) -> Result<TrackedSubject> {
    let subject_id = subject.subject_id;

    for attempt in 1..=self.config.max_commit_attempts.max(1) {
      let outcome = self
        .store
        .record_sighting(sighting.clone(), subject.version)
        .await
        .map_err(RecordError::store)?;

      match outcome {
        CommitOutcome::Committed(updated) => return Ok(updated),
        CommitOutcome::Conflict { current_version: None } => {
          return Err(RecordError::SubjectNotFound(subject_id));
        }
        CommitOutcome::Conflict { current_version: Some(current) } => {
          tracing::debug!(
            %subject_id,
            attempt,
            expected = subject.version,
            current,
            "subject changed during commit; reloading",
          );
          subject = self.require_subject(subject_id).await?;
          check_distance(&subject, sighting.position)?;
        }
      }
    }

    tracing::warn!(%subject_id, "commit attempts exhausted");
    Err(RecordError::Conflict(subject_id))
  }
}

fn check_distance(subject: &TrackedSubject, candidate: Coordinate) -> Result<()> {
  match geofence::validate(subject.last_position(), candidate) {
    Verdict::Accept => Ok(()),
    Verdict::Reject { distance_km } => Err(RecordError::TooClose { distance_km }),
  }
}
