//! Test result models
//!
//! Defines per-case results, the workflow stages a case moves through and
//! the run summary.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// Test execution status
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TestStatus {
    Pass,
    Fail,
    Skip,
    Error,
}

impl TestStatus {
    pub fn symbol(&self) -> &'static str {
        match self {
            TestStatus::Pass => "✓",
            TestStatus::Fail => "✗",
            TestStatus::Skip => "○",
            TestStatus::Error => "!",
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, TestStatus::Pass)
    }
}

impl fmt::Display for TestStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TestStatus::Pass => write!(f, "PASS"),
            TestStatus::Fail => write!(f, "FAIL"),
            TestStatus::Skip => write!(f, "SKIP"),
            TestStatus::Error => write!(f, "ERROR"),
        }
    }
}

/// Workflow state machine stage
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    Build,
    Sign,
    Send,
    Wait,
    Query,
    Validate,
    Passed,
    Failed,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Build => "BUILD",
            Stage::Sign => "SIGN",
            Stage::Send => "SEND",
            Stage::Wait => "WAIT",
            Stage::Query => "QUERY",
            Stage::Validate => "VALIDATE",
            Stage::Passed => "PASSED",
            Stage::Failed => "FAILED",
        };
        write!(f, "{name}")
    }
}

/// One captured request/response pair
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Exchange {
    pub label: String,
    pub request: Option<Value>,
    pub status_code: u16,
    pub response: Value,
    pub duration_ms: u64,
}

/// Result of a single test case
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TestResult {
    pub case_id: String,
    pub name: String,
    pub workflow: String,
    pub status: TestStatus,
    pub duration_ms: u64,
    pub message: Option<String>,
    pub failed_stage: Option<Stage>,
    pub error_kind: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub diagnostics: Vec<Exchange>,
}

impl TestResult {
    fn new(case_id: &str, name: &str, workflow: &str, status: TestStatus) -> Self {
        Self {
            case_id: case_id.to_string(),
            name: name.to_string(),
            workflow: workflow.to_string(),
            status,
            duration_ms: 0,
            message: None,
            failed_stage: None,
            error_kind: None,
            diagnostics: Vec::new(),
        }
    }

    pub fn pass(case_id: &str, name: &str, workflow: &str, duration_ms: u64) -> Self {
        Self {
            duration_ms,
            ..Self::new(case_id, name, workflow, TestStatus::Pass)
        }
    }

    pub fn fail(
        case_id: &str,
        name: &str,
        workflow: &str,
        duration_ms: u64,
        message: impl Into<String>,
    ) -> Self {
        Self {
            duration_ms,
            message: Some(message.into()),
            ..Self::new(case_id, name, workflow, TestStatus::Fail)
        }
    }

    pub fn skip(case_id: &str, name: &str, workflow: &str, reason: impl Into<String>) -> Self {
        Self {
            message: Some(reason.into()),
            ..Self::new(case_id, name, workflow, TestStatus::Skip)
        }
    }

    pub fn error(
        case_id: &str,
        name: &str,
        workflow: &str,
        duration_ms: u64,
        error: impl Into<String>,
    ) -> Self {
        Self {
            duration_ms,
            message: Some(error.into()),
            ..Self::new(case_id, name, workflow, TestStatus::Error)
        }
    }

    pub fn with_stage(mut self, stage: Stage) -> Self {
        self.failed_stage = Some(stage);
        self
    }

    pub fn with_error_kind(mut self, kind: impl Into<String>) -> Self {
        self.error_kind = Some(kind.into());
        self
    }

    pub fn with_diagnostics(mut self, diagnostics: Vec<Exchange>) -> Self {
        self.diagnostics = diagnostics;
        self
    }
}

impl fmt::Display for TestResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} {} ({}) [{}ms]",
            self.status.symbol(),
            self.case_id,
            self.name,
            self.workflow,
            self.duration_ms
        )?;
        if let Some(stage) = &self.failed_stage {
            write!(f, " at {stage}")?;
        }
        if let Some(msg) = &self.message {
            write!(f, " - {msg}")?;
        }
        Ok(())
    }
}

/// Summary of one suite run
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RunSummary {
    pub environment: String,
    pub total: usize,
    pub passed: usize,
    pub failed: usize,
    pub skipped: usize,
    pub errors: usize,
    pub total_duration_ms: u64,
    pub results: Vec<TestResult>,
}

impl RunSummary {
    pub fn new(environment: impl Into<String>, results: Vec<TestResult>, total_duration_ms: u64) -> Self {
        let count = |status: TestStatus| results.iter().filter(|r| r.status == status).count();

        Self {
            environment: environment.into(),
            total: results.len(),
            passed: count(TestStatus::Pass),
            failed: count(TestStatus::Fail),
            skipped: count(TestStatus::Skip),
            errors: count(TestStatus::Error),
            total_duration_ms,
            results,
        }
    }

    pub fn pass_rate(&self) -> f64 {
        let executed = self.total - self.skipped;
        if executed == 0 {
            0.0
        } else {
            (self.passed as f64 / executed as f64) * 100.0
        }
    }

    /// True when nothing failed or errored
    pub fn is_all_passed(&self) -> bool {
        self.failed == 0 && self.errors == 0
    }
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Payment API run - {}", self.environment)?;
        writeln!(f, "━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━")?;
        for result in &self.results {
            writeln!(f, "  {result}")?;
        }
        writeln!(f, "━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━")?;
        writeln!(
            f,
            "Total: {} | Pass: {} | Fail: {} | Skip: {} | Error: {}",
            self.total, self.passed, self.failed, self.skipped, self.errors
        )?;
        writeln!(
            f,
            "Pass Rate: {:.1}% | Duration: {}ms",
            self.pass_rate(),
            self.total_duration_ms
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_result_creation() {
        let result = TestResult::pass("TC001", "Create", "SINGLE_CALL", 100);
        assert!(result.status.is_success());
        assert_eq!(result.duration_ms, 100);
        assert!(result.failed_stage.is_none());
    }

    #[test]
    fn test_failure_display() {
        let result = TestResult::fail("TC002", "Query", "CREATE_AND_QUERY", 40, "status mismatch")
            .with_stage(Stage::Validate)
            .with_error_kind("AssertionMismatch");

        let text = result.to_string();
        assert!(text.contains("TC002"));
        assert!(text.contains("at VALIDATE"));
        assert!(text.contains("status mismatch"));
    }

    #[test]
    fn test_run_summary() {
        let results = vec![
            TestResult::pass("TC001", "a", "SINGLE_CALL", 100),
            TestResult::fail("TC002", "b", "SINGLE_CALL", 50, "Field not found"),
            TestResult::skip("TC003", "c", "GET_TRANSACTION", "skipped by filter"),
            TestResult::error("TC004", "d", "INVALID", 0, "Unknown workflow type: X"),
        ];

        let summary = RunSummary::new("default", results, 150);
        assert_eq!(summary.total, 4);
        assert_eq!(summary.passed, 1);
        assert_eq!(summary.failed, 1);
        assert_eq!(summary.skipped, 1);
        assert_eq!(summary.errors, 1);
        assert!((summary.pass_rate() - 33.333).abs() < 0.01);
        assert!(!summary.is_all_passed());
    }

    #[test]
    fn test_stage_serializes_lowercase() {
        assert_eq!(serde_json::to_string(&Stage::Wait).unwrap(), "\"wait\"");
    }
}
