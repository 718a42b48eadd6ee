//! Data models for payment API test runs
//!
//! This module contains the descriptors, per-run values and results used
//! throughout the application.

mod dynamic;
mod test_case;
mod test_result;

pub use dynamic::DynamicValues;
pub use test_case::{
    value_text, DateRange, ErrorExpectation, SuiteEntry, TestCase, WorkflowKind,
    WorkflowSpec,
};
pub use test_result::{Exchange, RunSummary, Stage, TestResult, TestStatus};
