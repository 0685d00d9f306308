//! Mathematical utilities: integration, finite differences, and damped least squares.

pub mod diff;
pub mod integrate;
pub mod ols;

pub use diff::*;
pub use integrate::*;
pub use ols::*;
