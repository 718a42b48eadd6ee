//! Output formatting module
//!
//! Provides various output formats for run results.

mod formatter;

pub use formatter::{summary_csv, OutputFormat, ResultFormatter};
