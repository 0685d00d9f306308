//! Domain types used across the application.
//!
//! These are shared between ingest, fitting, reporting, plotting, and exports.

pub mod types;

pub use types::*;
