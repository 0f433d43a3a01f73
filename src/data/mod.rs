//! Data access
//!
//! SQLite event store and the court spot catalog.

pub mod database;
pub mod spots;

pub use database::EventStore;
pub use spots::{ShotSpot, SpotCatalog};
