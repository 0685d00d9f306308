//! Reaction-rate model implementation.
//!
//! The model is implemented as small, pure functions so that fitting, plotting
//! and simulation code can share it.

pub mod model;

pub use model::*;
