//! Observers: the people who report sightings.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Public view of an observer. Credential material is never serialised.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Observer {
  pub observer_id: Uuid,
  pub name:        String,
  /// Contact address used for sighting notifications.
  pub email:       String,
  pub created_at:  DateTime<Utc>,
}

/// Input to [`TrackingStore::add_observer`](crate::store::TrackingStore::add_observer).
#[derive(Debug, Clone)]
pub struct NewObserver {
  pub name:          String,
  pub email:         String,
  /// argon2 PHC string, e.g. `$argon2id$v=19$…`
  pub password_hash: String,
}

/// An observer together with the stored password hash, for authentication.
#[derive(Debug, Clone)]
pub struct ObserverCredentials {
  pub observer:      Observer,
  pub password_hash: String,
}
