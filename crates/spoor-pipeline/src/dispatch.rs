//! The dispatch queue: an unbounded hand-off from notification producers to a
//! single mail-sending consumer.
//!
//! The queue is built once at startup with [`channel`]. Every
//! [`DispatchSender`] clone is a producer; the lone [`DispatchConsumer`] drains
//! messages strictly in submission order. The consumer stops once every sender
//! has been dropped and the backlog is empty, which is the shutdown protocol:
//! drop the producers, then await the consumer.

use std::sync::Arc;

use spoor_core::{mail::MailSender, notification::NotificationMessage};
use tokio::{sync::mpsc, task::JoinHandle};

/// Build a new queue.
pub fn channel() -> (DispatchSender, DispatchConsumer) {
  let (tx, rx) = mpsc::unbounded_channel();
  (DispatchSender { tx }, DispatchConsumer { rx })
}

// ─── Producer ────────────────────────────────────────────────────────────────

/// The producer half. Cloning is cheap.
#[derive(Debug, Clone)]
pub struct DispatchSender {
  tx: mpsc::UnboundedSender<NotificationMessage>,
}

/// The consumer has already shut down; the message was not queued.
#[derive(Debug, thiserror::Error)]
#[error("dispatch queue is closed")]
pub struct QueueClosed(pub NotificationMessage);

impl DispatchSender {
  /// Queue `message` for delivery. Never blocks and never drops a message
  /// while the consumer is alive.
  pub fn submit(&self, message: NotificationMessage) -> Result<(), QueueClosed> {
    self.tx.send(message).map_err(|e| QueueClosed(e.0))
  }
}

// ─── Consumer ────────────────────────────────────────────────────────────────

/// Counters reported by the consumer when it stops.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchReport {
  pub sent:   u64,
  pub failed: u64,
}

/// The single consumer half.
#[derive(Debug)]
pub struct DispatchConsumer {
  rx: mpsc::UnboundedReceiver<NotificationMessage>,
}

impl DispatchConsumer {
  /// Deliver messages one at a time until every sender is gone.
  ///
  /// A failed send is logged and the message discarded; there is no retry.
  pub async fn run<M: MailSender>(mut self, mailer: Arc<M>) -> DispatchReport {
    let mut report = DispatchReport::default();

    while let Some(message) = self.rx.recv().await {
      match mailer.send(&message).await {
        Ok(()) => {
          report.sent += 1;
          tracing::debug!(to = %message.destination, subject = %message.subject_name, "notification sent");
        }
        Err(e) => {
          report.failed += 1;
          tracing::warn!(
            to = %message.destination,
            subject = %message.subject_name,
            error = %e,
            "failed to send notification",
          );
        }
      }
    }

    tracing::info!(sent = report.sent, failed = report.failed, "dispatch queue drained");
    report
  }

  /// Run the consumer on its own task.
  pub fn spawn<M: MailSender + 'static>(self, mailer: Arc<M>) -> JoinHandle<DispatchReport> {
    tokio::spawn(self.run(mailer))
  }
}
