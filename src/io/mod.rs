//! Input/output helpers.
//!
//! - experiment file ingest (`ingest`)
//! - rendered curve CSV export (`export`)
//! - fit result JSON read/write (`result`)
//! - synthetic experiment files (`simulate`)

pub mod export;
pub mod ingest;
pub mod result;
pub mod simulate;

pub use export::*;
pub use ingest::*;
pub use result::*;
pub use simulate::*;
