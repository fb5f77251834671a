//! The sighting ingestion and notification pipeline.
//!
//! ```text
//! request ──▶ SightingRecorder ──trigger──▶ ObserverNotifier ──submit──▶ dispatch queue ──▶ MailSender
//!               (geofence, CAS)               (worker pool)                (one consumer)
//! ```
//!
//! Build the background half with [`start`], give the returned
//! [`NotifierHandle`] to a [`SightingRecorder`], and call
//! [`PipelineTasks::drain`] after the last recorder is dropped.

pub mod dispatch;
pub mod error;
pub mod image;
pub mod mail;
pub mod notifier;
pub mod recorder;

#[cfg(test)]
mod testing;

use std::sync::Arc;

use spoor_core::{mail::MailSender, store::TrackingStore};
use tokio::task::JoinHandle;

pub use dispatch::DispatchReport;
pub use error::{ImageError, MailError, RecordError};
pub use notifier::{NotifierConfig, NotifierHandle};
pub use recorder::{FirstSighting, RecorderConfig, SightingRecorder};

/// The background tasks started by [`start`].
#[derive(Debug)]
pub struct PipelineTasks {
  notifier:   JoinHandle<()>,
  dispatcher: JoinHandle<DispatchReport>,
}

impl PipelineTasks {
  /// Wait for the notifier to finish its jobs and the dispatch queue to empty.
  ///
  /// Only completes once every [`NotifierHandle`] has been dropped.
  pub async fn drain(self) -> DispatchReport {
    if let Err(e) = self.notifier.await {
      tracing::error!(error = %e, "observer notifier task failed");
    }
    match self.dispatcher.await {
      Ok(report) => report,
      Err(e) => {
        tracing::error!(error = %e, "dispatch consumer task failed");
        DispatchReport::default()
      }
    }
  }
}

/// Start the dispatch consumer and the notifier actor.
pub fn start<S, M>(store: Arc<S>, mailer: Arc<M>, config: NotifierConfig) -> (NotifierHandle, PipelineTasks)
where
  S: TrackingStore + 'static,
  M: MailSender + 'static,
{
  let (queue, consumer) = dispatch::channel();
  let dispatcher = consumer.spawn(mailer);
  let (handle, notifier) = notifier::ObserverNotifier::new(store, queue, config).spawn();
  tracing::info!(
    max_concurrent_jobs = config.max_concurrent_jobs,
    history_limit = config.history_limit,
    "notification pipeline started",
  );
  (handle, PipelineTasks { notifier, dispatcher })
}
