//! The `TrackingStore` trait and supporting query types.
//!
//! The trait is implemented by storage backends (e.g. `spoor-store-sqlite`).
//! Higher layers (`spoor-pipeline`, `spoor-api`) depend on this abstraction,
//! not on any concrete backend.

use std::future::Future;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
  observer::{NewObserver, Observer, ObserverCredentials},
  sighting::{ObservedSighting, Sighting},
  subject::{NewSubject, TrackedSubject},
};

// ─── Pagination ──────────────────────────────────────────────────────────────

/// A 1-based page request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageRequest {
  pub page:      u32,
  pub page_size: u32,
}

impl PageRequest {
  pub const DEFAULT_PAGE_SIZE: u32 = 20;
  pub const MAX_PAGE_SIZE: u32 = 100;

  /// Build a request from optional query parameters, clamping both values
  /// into their valid ranges.
  pub fn new(page: Option<u32>, page_size: Option<u32>) -> Self {
    Self {
      page:      page.unwrap_or(1).max(1),
      page_size: page_size
        .unwrap_or(Self::DEFAULT_PAGE_SIZE)
        .clamp(1, Self::MAX_PAGE_SIZE),
    }
  }

  pub fn offset(&self) -> u64 { u64::from(self.page - 1) * u64::from(self.page_size) }

  pub fn limit(&self) -> u64 { u64::from(self.page_size) }
}

impl Default for PageRequest {
  fn default() -> Self { Self::new(None, None) }
}

/// One page of results plus the total number of matching rows.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Page<T> {
  pub items: Vec<T>,
  pub total: u64,
}

// ─── Commit outcome ──────────────────────────────────────────────────────────

/// Result of [`TrackingStore::record_sighting`].
#[derive(Debug, Clone)]
pub enum CommitOutcome {
  /// The sighting was inserted and the subject now reflects it.
  Committed(TrackedSubject),
  /// The subject's version did not match; nothing was written.
  /// `current_version` is `None` if the subject no longer exists.
  Conflict { current_version: Option<u64> },
}

// ─── Trait ───────────────────────────────────────────────────────────────────

/// Abstraction over a Spoor storage backend.
///
/// Sightings are append-only. The only mutable state is each subject's
/// last-seen position, which changes exclusively through
/// [`record_sighting`](Self::record_sighting).
///
/// All methods return `Send` futures so the trait can be used in multi-threaded
/// async runtimes (e.g. tokio with `axum`).
pub trait TrackingStore: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  // ── Observers ─────────────────────────────────────────────────────────

  /// Register a new observer. Returns `None` if the email address is already
  /// taken (compared case-insensitively).
  fn add_observer(
    &self,
    input: NewObserver,
  ) -> impl Future<Output = Result<Option<Observer>, Self::Error>> + Send + '_;

  fn get_observer(
    &self,
    id: Uuid,
  ) -> impl Future<Output = Result<Option<Observer>, Self::Error>> + Send + '_;

  /// Look up an observer and their password hash by email address.
  fn find_credentials<'a>(
    &'a self,
    email: &'a str,
  ) -> impl Future<Output = Result<Option<ObserverCredentials>, Self::Error>> + Send + 'a;

  // ── Subjects ──────────────────────────────────────────────────────────

  /// Create and persist a subject that has never been sighted.
  fn add_subject(
    &self,
    input: NewSubject,
  ) -> impl Future<Output = Result<TrackedSubject, Self::Error>> + Send + '_;

  fn get_subject(
    &self,
    id: Uuid,
  ) -> impl Future<Output = Result<Option<TrackedSubject>, Self::Error>> + Send + '_;

  /// Subjects ordered by most recent sighting first; never-sighted last.
  fn list_subjects(
    &self,
    page: PageRequest,
  ) -> impl Future<Output = Result<Page<TrackedSubject>, Self::Error>> + Send + '_;

  // ── Sightings ─────────────────────────────────────────────────────────

  /// Insert `sighting` and move its subject's last-seen state to it, as one
  /// atomic unit of work.
  ///
  /// The subject update only applies while the stored version equals
  /// `expected_version`; otherwise nothing is written and
  /// [`CommitOutcome::Conflict`] is returned.
  fn record_sighting(
    &self,
    sighting: Sighting,
    expected_version: u64,
  ) -> impl Future<Output = Result<CommitOutcome, Self::Error>> + Send + '_;

  /// Sightings of a subject, newest (`seen_at`) first.
  fn list_sightings(
    &self,
    subject_id: Uuid,
    page: PageRequest,
  ) -> impl Future<Output = Result<Page<Sighting>, Self::Error>> + Send + '_;

  /// Up to `limit` sightings of a subject, newest first, each expanded with
  /// the reporting observer.
  fn sighting_history(
    &self,
    subject_id: Uuid,
    limit: u32,
  ) -> impl Future<Output = Result<Vec<ObservedSighting>, Self::Error>> + Send + '_;
}
