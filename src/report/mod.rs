//! Reporting utilities: header, fit summary and residual tables.

pub mod format;

pub use format::*;
