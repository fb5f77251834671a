//! The image attachment collaborator consumed by the sighting recorder.

use std::future::Future;

use bytes::Bytes;

/// Validates, resizes and uploads images attached to sighting reports.
pub trait ImagePipeline: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  /// Whether `content_type` is accepted and agrees with `filename`'s
  /// extension. Called before any processing or upload.
  fn is_content_type_valid(&self, content_type: &str, filename: &str) -> bool;

  /// Decode, resize and re-encode `data`.
  fn resize<'a>(
    &'a self,
    data: Bytes,
    filename: &'a str,
  ) -> impl Future<Output = Result<Bytes, Self::Error>> + Send + 'a;

  /// Store the processed image and return its public URL.
  fn upload<'a>(
    &'a self,
    data: Bytes,
    filename: &'a str,
  ) -> impl Future<Output = Result<String, Self::Error>> + Send + 'a;
}
