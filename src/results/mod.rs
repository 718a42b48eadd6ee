//! Results module
//!
//! Exports run summaries for other tools.

mod storage;

pub use storage::save_summary;
