//! Model fitting.
//!
//! Responsibilities:
//!
//! - derive `T_K`, `Δq` and `α` from an experiment
//! - express loss and residuals in unit-box coordinates
//! - dispatch to one of three bounded solvers
//! - keep the latest result for rendering

pub mod bounds;
pub mod derived;
pub mod engine;
pub mod evolution;
pub mod least_squares;
pub mod objective;
pub mod solve;
pub mod tnc;

pub use derived::*;
pub use engine::*;
pub use objective::*;
