//! The observer notifier: fans a newly accepted sighting out to every distinct
//! observer of the subject.
//!
//! The notifier is an actor. The creation path only holds a [`NotifierHandle`]
//! and submits [`NotifyJob`]s to it; the actor runs each job on its own tokio
//! task, at most `max_concurrent_jobs` at a time. Jobs are detached from the
//! request that produced them, so a cancelled or timed-out request never
//! cancels its notification batch.

use std::{collections::HashSet, sync::Arc};

use serde::Deserialize;
use spoor_core::{
  notification::{recipient_key, NotificationMessage},
  sighting::{ObservedSighting, Sighting},
  store::TrackingStore,
};
use tokio::{
  sync::{mpsc, Semaphore},
  task::{JoinHandle, JoinSet},
};
use uuid::Uuid;

use crate::dispatch::DispatchSender;

// ─── Configuration ───────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(default)]
pub struct NotifierConfig {
  /// Maximum number of history rows scanned per job.
  pub history_limit:       u32,
  /// Size of the worker pool.
  pub max_concurrent_jobs: usize,
}

impl Default for NotifierConfig {
  fn default() -> Self {
    Self { history_limit: 1000, max_concurrent_jobs: 4 }
  }
}

// ─── Jobs ────────────────────────────────────────────────────────────────────

/// One accepted sighting to announce.
#[derive(Debug, Clone)]
pub struct NotifyJob {
  pub subject_id:   Uuid,
  pub subject_name: String,
  pub sighting:     Sighting,
}

/// The producer side of the notifier, held by the sighting recorder.
///
/// Cloning is cheap. When the last handle is dropped the actor finishes its
/// in-flight jobs and exits.
#[derive(Debug, Clone)]
pub struct NotifierHandle {
  tx: mpsc::UnboundedSender<NotifyJob>,
}

impl NotifierHandle {
  /// Fire-and-forget: hand `job` to the actor and return immediately.
  pub fn trigger(&self, job: NotifyJob) {
    if let Err(e) = self.tx.send(job) {
      tracing::error!(
        subject_id = %e.0.subject_id,
        sighting_id = %e.0.sighting.sighting_id,
        "notifier has shut down; notification batch dropped",
      );
    }
  }
}

// ─── Fan-out ─────────────────────────────────────────────────────────────────

/// Build one message per distinct observer address found in `history`, in
/// first-seen order.
pub fn build_messages(
  history: &[ObservedSighting],
  subject_name: &str,
  sighting: &Sighting,
) -> Vec<NotificationMessage> {
  let mut seen = HashSet::new();
  history
    .iter()
    .filter(|h| seen.insert(recipient_key(&h.observer.email)))
    .map(|h| NotificationMessage::for_sighting(h.observer.email.trim(), subject_name, sighting))
    .collect()
}

// ─── Notifier ────────────────────────────────────────────────────────────────

pub struct ObserverNotifier<S> {
  store:  Arc<S>,
  queue:  DispatchSender,
  config: NotifierConfig,
}

impl<S> Clone for ObserverNotifier<S> {
  fn clone(&self) -> Self {
    Self { store: Arc::clone(&self.store), queue: self.queue.clone(), config: self.config }
  }
}

impl<S> ObserverNotifier<S>
where
  S: TrackingStore + 'static,
{
  pub fn new(store: Arc<S>, queue: DispatchSender, config: NotifierConfig) -> Self {
    Self { store, queue, config }
  }

  /// Start the actor. Returns the handle to give to producers and the actor's
  /// task, which completes once every handle is dropped and all jobs are done.
  pub fn spawn(self) -> (NotifierHandle, JoinHandle<()>) {
    let (tx, rx) = mpsc::unbounded_channel();
    let task = tokio::spawn(self.run(rx));
    (NotifierHandle { tx }, task)
  }

  async fn run(self, mut rx: mpsc::UnboundedReceiver<NotifyJob>) {
    let permits = Arc::new(Semaphore::new(self.config.max_concurrent_jobs.max(1)));
    let mut jobs = JoinSet::new();

    loop {
      tokio::select! {
        job = rx.recv() => {
          let Some(job) = job else { break };
          // The semaphore is never closed.
          let Ok(permit) = Arc::clone(&permits).acquire_owned().await else { break };
          let this = self.clone();
          jobs.spawn(async move {
            let _permit = permit;
            this.run_job(job).await;
          });
        }
        Some(done) = jobs.join_next(), if !jobs.is_empty() => {
          if let Err(e) = done {
            tracing::error!(error = %e, "notification job panicked");
          }
        }
      }
    }

    while let Some(done) = jobs.join_next().await {
      if let Err(e) = done {
        tracing::error!(error = %e, "notification job panicked");
      }
    }
    tracing::info!("observer notifier stopped");
  }

  async fn run_job(&self, job: NotifyJob) {
    match self.notify(&job).await {
      Ok(queued) => tracing::info!(
        subject_id = %job.subject_id,
        sighting_id = %job.sighting.sighting_id,
        queued,
        "queued sighting notifications",
      ),
      Err(e) => tracing::error!(
        subject_id = %job.subject_id,
        sighting_id = %job.sighting.sighting_id,
        error = %e,
        "failed to load sighting history; notification batch abandoned",
      ),
    }
  }

  /// Load the subject's history and queue one message per distinct observer.
  /// Returns the number of messages queued.
  pub async fn notify(&self, job: &NotifyJob) -> Result<usize, S::Error> {
    let history = self
      .store
      .sighting_history(job.subject_id, self.config.history_limit)
      .await?;

    let mut queued = 0;
    for message in build_messages(&history, &job.subject_name, &job.sighting) {
      if let Err(e) = self.queue.submit(message) {
        tracing::error!(
          subject_id = %job.subject_id,
          to = %e.0.destination,
          "dispatch queue closed; remaining notifications dropped",
        );
        break;
      }
      queued += 1;
    }
    Ok(queued)
  }
}
