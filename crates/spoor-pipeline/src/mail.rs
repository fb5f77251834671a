//! Outbound mail transports and message rendering.

use std::{convert::Infallible, time::Duration};

use serde::Deserialize;
use serde_json::json;
use spoor_core::{mail::MailSender, notification::NotificationMessage};

use crate::error::MailError;

// ─── Configuration ───────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MailProvider {
  /// Write messages to the log instead of sending them.
  Log,
  /// POST to a SendGrid-v3-compatible HTTP API.
  Http,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MailConfig {
  pub provider:       MailProvider,
  pub api_url:        String,
  pub api_key:        String,
  pub sender_address: String,
  pub sender_name:    String,
  /// Upper bound on one mail API request, connect included.
  pub timeout_secs:   u64,
}

impl Default for MailConfig {
  fn default() -> Self {
    Self {
      provider:       MailProvider::Log,
      api_url:        "https://api.sendgrid.com/v3/mail/send".to_string(),
      api_key:        String::new(),
      sender_address: "sightings@localhost".to_string(),
      sender_name:    "Spoor".to_string(),
      timeout_secs:   30,
    }
  }
}

// ─── Rendering ───────────────────────────────────────────────────────────────

pub fn render_subject(m: &NotificationMessage) -> String {
  format!("New sighting of {}!", m.subject_name)
}

pub fn render_text(m: &NotificationMessage) -> String {
  let mut body = format!(
    "A new sighting of {name} has been confirmed.\n\n\
     Name: {name}\n\
     Seen at: {seen_at} UTC\n\
     Latitude: {lat}\n\
     Longitude: {lon}\n",
    name = m.subject_name,
    seen_at = m.seen_at,
    lat = m.latitude,
    lon = m.longitude,
  );
  if let Some(url) = &m.image_url {
    body.push_str(&format!("Photo: {url}\n"));
  }
  body
}

pub fn render_html(m: &NotificationMessage) -> String {
  let name = escape_html(&m.subject_name);
  let image = m
    .image_url
    .as_deref()
    .map(|url| format!("<p><img src=\"{}\" alt=\"{name}\"></p>", escape_html(url)))
    .unwrap_or_default();

  format!(
    "<h2>New sighting of {name} confirmed!</h2>\
     <table>\
     <tr><th>Seen at</th><td>{seen_at} UTC</td></tr>\
     <tr><th>Latitude</th><td>{lat}</td></tr>\
     <tr><th>Longitude</th><td>{lon}</td></tr>\
     </table>{image}",
    seen_at = escape_html(&m.seen_at),
    lat = escape_html(&m.latitude),
    lon = escape_html(&m.longitude),
  )
}

fn escape_html(s: &str) -> String {
  let mut out = String::with_capacity(s.len());
  for c in s.chars() {
    match c {
      '&' => out.push_str("&amp;"),
      '<' => out.push_str("&lt;"),
      '>' => out.push_str("&gt;"),
      '"' => out.push_str("&quot;"),
      '\'' => out.push_str("&#39;"),
      c => out.push(c),
    }
  }
  out
}

// ─── Transports ──────────────────────────────────────────────────────────────

/// Logs each message at `INFO`. Never fails.
#[derive(Debug, Clone, Default)]
pub struct LogMailer;

impl MailSender for LogMailer {
  type Error = Infallible;

  async fn send(&self, message: &NotificationMessage) -> Result<(), Infallible> {
    tracing::info!(
      to = %message.destination,
      subject = %render_subject(message),
      body = %render_text(message),
      "notification (log transport)",
    );
    Ok(())
  }
}

/// Sends each message with one POST to a SendGrid-v3-compatible endpoint.
#[derive(Debug, Clone)]
pub struct HttpMailer {
  client: reqwest::Client,
  config: MailConfig,
}

impl HttpMailer {
  pub fn new(config: MailConfig) -> Result<Self, MailError> {
    let client = reqwest::Client::builder()
      .timeout(Duration::from_secs(config.timeout_secs))
      .build()?;
    Ok(Self { client, config })
  }

  fn payload(&self, m: &NotificationMessage) -> serde_json::Value {
    json!({
      "personalizations": [{ "to": [{ "email": m.destination }] }],
      "from": { "email": self.config.sender_address, "name": self.config.sender_name },
      "subject": render_subject(m),
      "content": [
        { "type": "text/plain", "value": render_text(m) },
        { "type": "text/html",  "value": render_html(m) },
      ],
    })
  }
}

impl MailSender for HttpMailer {
  type Error = MailError;

  async fn send(&self, message: &NotificationMessage) -> Result<(), MailError> {
    self
      .client
      .post(&self.config.api_url)
      .bearer_auth(&self.config.api_key)
      .json(&self.payload(message))
      .send()
      .await?
      .error_for_status()?;
    Ok(())
  }
}

/// The transport selected by [`MailConfig::provider`].
#[derive(Debug, Clone)]
pub enum Mailer {
  Log(LogMailer),
  Http(HttpMailer),
}

impl Mailer {
  pub fn from_config(config: &MailConfig) -> Result<Self, MailError> {
    Ok(match config.provider {
      MailProvider::Log => Self::Log(LogMailer),
      MailProvider::Http => Self::Http(HttpMailer::new(config.clone())?),
    })
  }
}

impl MailSender for Mailer {
  type Error = MailError;

  async fn send(&self, message: &NotificationMessage) -> Result<(), MailError> {
    match self {
      Self::Log(m) => match m.send(message).await {
        Ok(()) => Ok(()),
        Err(never) => match never {},
      },
      Self::Http(m) => m.send(message).await,
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn msg(image_url: Option<&str>) -> NotificationMessage {
    NotificationMessage {
      destination:  "ranger@example.com".into(),
      subject_name: "Raja <the Great>".into(),
      seen_at:      "2024-01-01 12:00:00".into(),
      latitude:     "-7.250676".into(),
      longitude:    "111.828316".into(),
      image_url:    image_url.map(Into::into),
    }
  }

  #[test]
  fn text_body_contains_all_fields() {
    let text = render_text(&msg(Some("https://img.example/raja.jpg")));
    assert!(text.contains("Seen at: 2024-01-01 12:00:00 UTC"));
    assert!(text.contains("Latitude: -7.250676"));
    assert!(text.contains("Longitude: 111.828316"));
    assert!(text.contains("Photo: https://img.example/raja.jpg"));

    assert!(!render_text(&msg(None)).contains("Photo:"));
  }

  #[test]
  fn html_body_is_escaped() {
    let html = render_html(&msg(None));
    assert!(html.contains("Raja &lt;the Great&gt;"));
    assert!(!html.contains("<the Great>"));
    assert!(!html.contains("<img"));
  }

  #[test]
  fn http_payload_shape() {
    let mailer = HttpMailer::new(MailConfig {
      provider: MailProvider::Http,
      ..MailConfig::default()
    })
    .unwrap();
    let payload = mailer.payload(&msg(None));
    assert_eq!(payload["personalizations"][0]["to"][0]["email"], "ranger@example.com");
    assert_eq!(payload["subject"], "New sighting of Raja <the Great>!");
    assert_eq!(payload["content"][0]["type"], "text/plain");
    assert_eq!(payload["from"]["name"], "Spoor");
  }

  #[tokio::test]
  async fn log_mailer_never_fails() {
    assert!(LogMailer.send(&msg(None)).await.is_ok());
  }

  #[tokio::test]
  async fn hung_mail_api_times_out() {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    // Accept connections and never answer.
    let server = tokio::spawn(async move {
      let mut held = Vec::new();
      while let Ok((socket, _)) = listener.accept().await {
        held.push(socket);
      }
    });

    let mailer = HttpMailer::new(MailConfig {
      provider: MailProvider::Http,
      api_url: format!("http://{addr}/v3/mail/send"),
      timeout_secs: 1,
      ..MailConfig::default()
    })
    .unwrap();

    let sent = tokio::time::timeout(Duration::from_secs(10), mailer.send(&msg(None)))
      .await
      .expect("request should be cut off by the client timeout");
    match sent {
      Err(MailError::Http(e)) => assert!(e.is_timeout(), "{e}"),
      Ok(()) => panic!("hung server cannot accept mail"),
    }
    server.abort();
  }

  #[test]
  fn from_config_selects_transport() {
    assert!(matches!(Mailer::from_config(&MailConfig::default()).unwrap(), Mailer::Log(_)));
    let http = MailConfig { provider: MailProvider::Http, ..MailConfig::default() };
    assert!(matches!(Mailer::from_config(&http).unwrap(), Mailer::Http(_)));
  }
}
