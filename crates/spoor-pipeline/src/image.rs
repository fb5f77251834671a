//! The image attachment pipeline: content-type validation, resize and
//! re-encode, and upload to a local directory that serves as object storage.

use std::{
  io::Cursor,
  path::{Path, PathBuf},
};

use bytes::Bytes;
use chrono::{DateTime, Utc};
use image::{imageops::FilterType, DynamicImage, ImageFormat};
use serde::Deserialize;
use sha2::{Digest, Sha256};
use spoor_core::image::ImagePipeline;

use crate::error::ImageError;

// ─── Configuration ───────────────────────────────────────────────────────────

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ImageConfig {
  /// Directory processed images are written to.
  pub directory:       PathBuf,
  /// Public URL prefix under which `directory` is served.
  pub public_base_url: String,
  pub max_width:       u32,
  pub max_height:      u32,
}

impl Default for ImageConfig {
  fn default() -> Self {
    Self {
      directory:       PathBuf::from("images"),
      public_base_url: "http://localhost:8080/images".to_string(),
      max_width:       250,
      max_height:      200,
    }
  }
}

// ─── Validation ──────────────────────────────────────────────────────────────

/// Accept JPEG and PNG only, and require the filename extension to agree with
/// the declared content type.
pub fn is_content_type_valid(content_type: &str, filename: &str) -> bool {
  let ext = Path::new(filename)
    .extension()
    .and_then(|e| e.to_str())
    .map(str::to_ascii_lowercase);

  match (content_type, ext.as_deref()) {
    ("image/jpeg", Some("jpg" | "jpeg")) => true,
    ("image/png", Some("png")) => true,
    _ => false,
  }
}

// ─── Processing ──────────────────────────────────────────────────────────────

/// Decode `data`, shrink it to fit within `max_width` × `max_height` (aspect
/// ratio kept, never enlarged) and re-encode it as JPEG.
pub fn fit_to_jpeg(data: &[u8], max_width: u32, max_height: u32) -> Result<Vec<u8>, ImageError> {
  let src = image::load_from_memory(data)?;
  let fitted = if src.width() > max_width || src.height() > max_height {
    src.resize(max_width, max_height, FilterType::Lanczos3)
  } else {
    src
  };

  // JPEG has no alpha channel.
  let rgb = DynamicImage::ImageRgb8(fitted.to_rgb8());
  let mut out = Cursor::new(Vec::new());
  rgb.write_to(&mut out, ImageFormat::Jpeg)?;
  Ok(out.into_inner())
}

/// Object key for a processed image: sanitised stem, upload timestamp and a
/// short content hash, always with a `.jpg` extension.
pub fn object_key(filename: &str, at: DateTime<Utc>, data: &[u8]) -> String {
  let stem: String = Path::new(filename)
    .file_stem()
    .and_then(|s| s.to_str())
    .unwrap_or_default()
    .chars()
    .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '-' })
    .collect();
  let stem = if stem.is_empty() { "image".to_string() } else { stem };

  let digest = hex::encode(Sha256::digest(data));
  format!("{stem}-{}-{}.jpg", at.format("%Y%m%d%H%M%S"), &digest[..8])
}

// ─── ImageProcessor ──────────────────────────────────────────────────────────

/// [`ImagePipeline`] backed by the `image` crate and the local filesystem.
#[derive(Debug, Clone)]
pub struct ImageProcessor {
  config: ImageConfig,
}

impl ImageProcessor {
  pub fn new(config: ImageConfig) -> Self { Self { config } }
}

impl ImagePipeline for ImageProcessor {
  type Error = ImageError;

  fn is_content_type_valid(&self, content_type: &str, filename: &str) -> bool {
    is_content_type_valid(content_type, filename)
  }

  async fn resize(&self, data: Bytes, _filename: &str) -> Result<Bytes, ImageError> {
    let (w, h) = (self.config.max_width, self.config.max_height);
    let jpeg = tokio::task::spawn_blocking(move || fit_to_jpeg(&data, w, h)).await??;
    Ok(Bytes::from(jpeg))
  }

  async fn upload(&self, data: Bytes, filename: &str) -> Result<String, ImageError> {
    let key = object_key(filename, Utc::now(), &data);
    tokio::fs::create_dir_all(&self.config.directory).await?;
    tokio::fs::write(self.config.directory.join(&key), &data).await?;

    tracing::debug!(%key, bytes = data.len(), "stored sighting image");
    Ok(format!("{}/{key}", self.config.public_base_url.trim_end_matches('/')))
  }
}
