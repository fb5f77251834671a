//! Process wiring for the Spoor server: configuration, the HTTP application,
//! and the serve-then-drain lifecycle.

use std::{
  future::Future,
  path::{Path, PathBuf},
  sync::Arc,
  time::Duration,
};

use anyhow::Context as _;
use axum::{Router, routing::get};
use serde::Deserialize;
use spoor_api::{ApiState, api_router};
use spoor_core::{image::ImagePipeline, store::TrackingStore};
use spoor_pipeline::{
  DispatchReport, NotifierConfig, RecorderConfig, SightingRecorder,
  image::{ImageConfig, ImageProcessor},
  mail::{MailConfig, Mailer},
};
use spoor_store_sqlite::SqliteStore;
use tokio::net::TcpListener;
use tower_http::{services::ServeDir, trace::TraceLayer};

// ─── Configuration ────────────────────────────────────────────────────────────

/// Runtime server configuration, deserialised from `config.toml` and
/// `SPOOR_*` environment variables.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
  pub host:       String,
  pub port:       u16,
  pub store_path: PathBuf,
  /// Emit logs as JSON lines instead of the human-readable format.
  pub log_json:   bool,
  pub images:     ImageConfig,
  pub mail:       MailConfig,
  pub pipeline:   PipelineConfig,
}

impl Default for ServerConfig {
  fn default() -> Self {
    Self {
      host:       "127.0.0.1".to_string(),
      port:       8080,
      store_path: PathBuf::from("spoor.db"),
      log_json:   false,
      images:     ImageConfig::default(),
      mail:       MailConfig::default(),
      pipeline:   PipelineConfig::default(),
    }
  }
}

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
  pub history_limit:       u32,
  pub max_concurrent_jobs: usize,
  pub max_commit_attempts: u32,
  /// How long shutdown waits for queued notifications.
  pub drain_timeout_secs:  u64,
}

impl Default for PipelineConfig {
  fn default() -> Self {
    let notifier = NotifierConfig::default();
    Self {
      history_limit:       notifier.history_limit,
      max_concurrent_jobs: notifier.max_concurrent_jobs,
      max_commit_attempts: RecorderConfig::default().max_commit_attempts,
      drain_timeout_secs:  30,
    }
  }
}

impl PipelineConfig {
  pub fn notifier(&self) -> NotifierConfig {
    NotifierConfig {
      history_limit:       self.history_limit,
      max_concurrent_jobs: self.max_concurrent_jobs,
    }
  }

  pub fn recorder(&self) -> RecorderConfig {
    RecorderConfig { max_commit_attempts: self.max_commit_attempts }
  }
}

/// Layer `path` (optional) under `SPOOR_`-prefixed environment variables.
/// Nested keys use `__`, e.g. `SPOOR_MAIL__API_KEY`.
pub fn load_config(path: &Path) -> anyhow::Result<ServerConfig> {
  config::Config::builder()
    .add_source(config::File::from(path).required(false))
    .add_source(
      config::Environment::with_prefix("SPOOR")
        .prefix_separator("_")
        .separator("__"),
    )
    .build()
    .context("failed to read config file")?
    .try_deserialize()
    .context("failed to deserialise ServerConfig")
}

/// Expand a leading `~` to the user's home directory.
pub fn expand_tilde(path: &Path) -> PathBuf {
  let s = path.to_string_lossy();
  if let Some(rest) = s.strip_prefix("~/")
    && let Ok(home) = std::env::var("HOME")
  {
    return PathBuf::from(home).join(rest);
  }
  path.to_path_buf()
}

// ─── Application ──────────────────────────────────────────────────────────────

async fn health() -> &'static str { "ok" }

/// The full HTTP application: the API under `/api`, processed images under
/// `/images`, and `/health`.
pub fn app<S, I>(state: ApiState<S, I>, images_dir: &Path) -> Router
where
  S: TrackingStore + 'static,
  I: ImagePipeline + 'static,
{
  Router::new()
    .route("/health", get(health))
    .nest("/api", api_router(state))
    .nest_service("/images", ServeDir::new(images_dir))
    .layer(TraceLayer::new_for_http())
}

/// Serve on `listener` until `shutdown` resolves, then drain the notification
/// pipeline for at most `pipeline.drain_timeout_secs`.
pub async fn run(
  config: ServerConfig,
  listener: TcpListener,
  shutdown: impl Future<Output = ()> + Send + 'static,
) -> anyhow::Result<DispatchReport> {
  let store_path = expand_tilde(&config.store_path);
  let store = SqliteStore::open(&store_path)
    .await
    .with_context(|| format!("failed to open store at {store_path:?}"))?;
  let store = Arc::new(store);

  let images_dir = expand_tilde(&config.images.directory);
  tokio::fs::create_dir_all(&images_dir)
    .await
    .with_context(|| format!("failed to create image directory {images_dir:?}"))?;
  let images = Arc::new(ImageProcessor::new(ImageConfig {
    directory: images_dir.clone(),
    ..config.images.clone()
  }));

  let mailer = Mailer::from_config(&config.mail).context("failed to build mail transport")?;
  let mailer = Arc::new(mailer);
  tracing::info!(provider = ?config.mail.provider, "mail transport configured");

  let (notifier, tasks) =
    spoor_pipeline::start(Arc::clone(&store), mailer, config.pipeline.notifier());
  let recorder = SightingRecorder::new(store, images, notifier, config.pipeline.recorder());

  let app = app(ApiState::new(recorder), &images_dir);

  let address = listener.local_addr().context("listener has no local address")?;
  tracing::info!("Listening on http://{address}");
  axum::serve(listener, app)
    .with_graceful_shutdown(shutdown)
    .await
    .context("server error")?;

  // The router, and with it the last notifier handle, is gone now.
  let timeout = Duration::from_secs(config.pipeline.drain_timeout_secs);
  match tokio::time::timeout(timeout, tasks.drain()).await {
    Ok(report) => {
      tracing::info!(sent = report.sent, failed = report.failed, "notification pipeline drained");
      Ok(report)
    }
    Err(_) => {
      tracing::warn!(
        timeout_secs = config.pipeline.drain_timeout_secs,
        "notification pipeline did not drain in time; queued messages dropped",
      );
      Ok(DispatchReport::default())
    }
  }
}

/// Waits for SIGINT (Ctrl+C) or SIGTERM.
pub async fn shutdown_signal() {
  let ctrl_c = async {
    if let Err(e) = tokio::signal::ctrl_c().await {
      tracing::error!(error = %e, "failed to install Ctrl+C handler");
      std::future::pending::<()>().await;
    }
  };

  #[cfg(unix)]
  let terminate = async {
    match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
      Ok(mut sig) => {
        sig.recv().await;
      }
      Err(e) => {
        tracing::error!(error = %e, "failed to install SIGTERM handler");
        std::future::pending::<()>().await;
      }
    }
  };

  #[cfg(not(unix))]
  let terminate = std::future::pending::<()>();

  tokio::select! {
    () = ctrl_c => tracing::info!("received SIGINT, initiating graceful shutdown"),
    () = terminate => tracing::info!("received SIGTERM, initiating graceful shutdown"),
  }
}
