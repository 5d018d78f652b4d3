//! Database module for the SLA monitor.
//!
//! Provides SQLite storage with automatic migrations.

mod models;
mod store;

pub use models::*;
pub use store::*;
