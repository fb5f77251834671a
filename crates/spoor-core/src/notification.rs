//! Notification messages emitted for every distinct prior observer of a
//! subject when a new sighting is accepted.

use serde::{Deserialize, Serialize};

use crate::sighting::Sighting;

/// `strftime` pattern for the sighting timestamp in a notification.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// One outbound message, fully formatted and ready for the mail sender.
///
/// Never persisted; it lives only as long as it sits in the dispatch queue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationMessage {
  pub destination:  String,
  pub subject_name: String,
  pub seen_at:      String,
  pub latitude:     String,
  pub longitude:    String,
  pub image_url:    Option<String>,
}

impl NotificationMessage {
  pub fn for_sighting(
    destination: impl Into<String>,
    subject_name: impl Into<String>,
    sighting: &Sighting,
  ) -> Self {
    Self {
      destination:  destination.into(),
      subject_name: subject_name.into(),
      seen_at:      sighting.seen_at.format(TIMESTAMP_FORMAT).to_string(),
      latitude:     format!("{:.6}", sighting.position.latitude),
      longitude:    format!("{:.6}", sighting.position.longitude),
      image_url:    sighting.image_url.clone(),
    }
  }
}

/// Key under which two contact addresses count as the same recipient.
pub fn recipient_key(address: &str) -> String { address.trim().to_lowercase() }

#[cfg(test)]
mod tests {
  use chrono::{TimeZone, Utc};
  use uuid::Uuid;

  use super::*;
  use crate::geofence::Coordinate;

  #[test]
  fn formats_timestamp_and_coordinates() {
    let sighting = Sighting {
      sighting_id: Uuid::new_v4(),
      subject_id:  Uuid::new_v4(),
      observer_id: Uuid::new_v4(),
      seen_at:     Utc.with_ymd_and_hms(2024, 3, 9, 7, 5, 1).unwrap(),
      position:    Coordinate::new(-7.25, 111.828316).unwrap(),
      image_url:   Some("https://img.example/tiger.jpg".into()),
      recorded_at: Utc::now(),
    };

    let msg = NotificationMessage::for_sighting("a@example.com", "Shere Khan", &sighting);
    assert_eq!(msg.seen_at, "2024-03-09 07:05:01");
    assert_eq!(msg.latitude, "-7.250000");
    assert_eq!(msg.longitude, "111.828316");
    assert_eq!(msg.image_url.as_deref(), Some("https://img.example/tiger.jpg"));
  }

  #[test]
  fn recipient_key_ignores_case_and_whitespace() {
    assert_eq!(recipient_key(" Ranger@Example.COM "), recipient_key("ranger@example.com"));
  }
}
