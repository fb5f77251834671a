//! Core types and trait definitions for the Spoor sighting tracker.
//!
//! No HTTP, database, image or mail dependencies live here. Every other
//! crate depends on this one.

// We intentionally use native `async fn` in traits (stabilised in Rust 1.75).
// Suppress the advisory lint about `Send` bounds on the returned futures.
#![allow(async_fn_in_trait)]

pub mod error;
pub mod geofence;
pub mod image;
pub mod mail;
pub mod notification;
pub mod observer;
pub mod sighting;
pub mod store;
pub mod subject;

pub use error::{Error, Result};
pub use geofence::Coordinate;
