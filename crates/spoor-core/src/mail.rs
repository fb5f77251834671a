//! The outbound mail collaborator drained by the dispatch queue consumer.

use std::future::Future;

use crate::notification::NotificationMessage;

/// Delivers one [`NotificationMessage`].
///
/// Implementations make a single attempt; the caller logs failures and never
/// retries.
pub trait MailSender: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  fn send<'a>(
    &'a self,
    message: &'a NotificationMessage,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + 'a;
}
