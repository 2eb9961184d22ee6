//! SQLite storage module for historical match data
//!
//! Provides the historical stats the probability engine reads: team lists,
//! player appearances, team try distributions and outcome bins.

pub mod repository;
pub mod schema;

pub use repository::{Dataset, MatchRepository};
