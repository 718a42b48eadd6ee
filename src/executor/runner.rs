//! Test execution runner
//!
//! Runs the selected suite entries one after another.

use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::info;

use super::{execute_entry, Selection};
use crate::engine::RunContext;
use crate::models::{RunSummary, SuiteEntry, TestResult};
use crate::workflows::HandlerRegistry;

const DEFAULT_CASE_TIMEOUT_SECS: u64 = 300;

/// Sequential suite runner
pub struct TestRunner {
    ctx: RunContext,
    registry: Arc<HandlerRegistry>,
    selection: Selection,
    case_timeout: Duration,
    environment: String,
}

impl TestRunner {
    pub fn new(ctx: RunContext, registry: HandlerRegistry) -> Self {
        Self {
            ctx,
            registry: Arc::new(registry),
            selection: Selection::default(),
            case_timeout: Duration::from_secs(DEFAULT_CASE_TIMEOUT_SECS),
            environment: "default".to_string(),
        }
    }

    pub fn with_selection(mut self, selection: Selection) -> Self {
        self.selection = selection;
        self
    }

    pub fn with_case_timeout(mut self, secs: u64) -> Self {
        self.case_timeout = Duration::from_secs(secs);
        self
    }

    pub fn with_environment(mut self, name: impl Into<String>) -> Self {
        self.environment = name.into();
        self
    }

    pub fn context(&self) -> &RunContext {
        &self.ctx
    }

    pub fn registry(&self) -> Arc<HandlerRegistry> {
        Arc::clone(&self.registry)
    }

    pub fn selection(&self) -> &Selection {
        &self.selection
    }

    pub fn case_timeout(&self) -> Duration {
        self.case_timeout
    }

    pub fn environment(&self) -> &str {
        &self.environment
    }

    /// Run a single entry
    pub async fn run_entry(&self, entry: &SuiteEntry) -> TestResult {
        let skip = self.selection.skips(entry);
        execute_entry(&self.ctx, &self.registry, entry, skip, self.case_timeout).await
    }

    /// Run all selected entries sequentially
    pub async fn run_all(&self, entries: &[SuiteEntry]) -> RunSummary {
        let selected = self.selection.apply(entries);
        info!(
            "Starting run of {} cases against {}",
            selected.len(),
            self.environment
        );

        let start = Instant::now();
        let mut results = Vec::with_capacity(selected.len());
        for entry in selected {
            let result = self.run_entry(entry).await;
            info!("  {}", result);
            results.push(result);
        }

        let summary = RunSummary::new(&self.environment, results, start.elapsed().as_millis() as u64);
        info!(
            "Run completed in {}ms - Pass: {}/{} ({:.1}%)",
            summary.total_duration_ms,
            summary.passed,
            summary.total,
            summary.pass_rate()
        );
        summary
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Stage, TestStatus};
    use crate::test_support::{context, MockPaymentApi};
    use serde_json::json;

    fn suite() -> Vec<SuiteEntry> {
        vec![
            SuiteEntry::from_value(json!({
                "testCaseId": "TC001",
                "testName": "Simple inside",
                "requestTemplateKey": "simple-inside",
                "expectedField": "responseData.transaction.status",
                "expectedValue": "ORIG",
                "tags": ["smoke"]
            })),
            SuiteEntry::from_value(json!({
                "testCaseId": "TC002",
                "requestTemplateKey": "simple-ibft",
                "expectedField": "responseData.transaction.status",
                "expectedValue": "TRAN"
            })),
            SuiteEntry::from_value(json!({ "testCaseId": "TC003", "apiType": "REFUND" })),
            SuiteEntry::from_value(json!({
                "testCaseId": "TC004",
                "requestTemplateKey": "missing-template"
            })),
        ]
    }

    fn api() -> MockPaymentApi {
        MockPaymentApi::new().on_create(200, json!({ "responseData": { "transaction": { "status": "ORIG" } } }))
    }

    #[tokio::test]
    async fn test_run_all_isolates_failures() {
        let api = api();
        let runner = TestRunner::new(context(api.clone()), HandlerRegistry::standard())
            .with_environment("sandbox");

        let summary = runner.run_all(&suite()).await;
        assert_eq!(summary.environment, "sandbox");
        assert_eq!(summary.total, 4);
        assert_eq!(summary.passed, 1);
        assert_eq!(summary.failed, 1);
        assert_eq!(summary.errors, 2);
        assert!(!summary.is_all_passed());

        let mismatch = &summary.results[1];
        assert_eq!(mismatch.status, TestStatus::Fail);
        assert_eq!(mismatch.failed_stage, Some(Stage::Validate));
        assert_eq!(mismatch.error_kind.as_deref(), Some("AssertionMismatch"));
        assert_eq!(mismatch.diagnostics.len(), 1);

        let unknown = &summary.results[2];
        assert_eq!(unknown.status, TestStatus::Error);
        assert_eq!(unknown.workflow, "INVALID");
        assert_eq!(unknown.error_kind.as_deref(), Some("UnknownWorkflowType"));

        let missing = &summary.results[3];
        assert_eq!(missing.error_kind.as_deref(), Some("TemplateNotFound"));
        assert_eq!(missing.failed_stage, Some(Stage::Build));
        assert_eq!(api.create_calls(), 2);
    }

    #[tokio::test]
    async fn test_case_id_filter() {
        let api = api();
        let runner = TestRunner::new(context(api.clone()), HandlerRegistry::standard())
            .with_selection(Selection {
                case_id: Some("TC001".to_string()),
                ..Selection::default()
            });

        let summary = runner.run_all(&suite()).await;
        assert_eq!(summary.total, 1);
        assert!(summary.is_all_passed());
        assert_eq!(api.create_calls(), 1);
    }

    #[tokio::test]
    async fn test_skip_list() {
        let api = api();
        let selection = Selection {
            skip: vec!["TC002".to_string()],
            tags: Vec::new(),
            case_id: None,
        };
        let runner = TestRunner::new(context(api), HandlerRegistry::standard()).with_selection(selection);

        let summary = runner.run_all(&suite()[..2]).await;
        assert_eq!(summary.skipped, 1);
        assert_eq!(summary.results[1].status, TestStatus::Skip);
        assert!(summary.is_all_passed());
    }

    #[tokio::test(start_paused = true)]
    async fn test_case_timeout() {
        let api = MockPaymentApi::new()
            .on_create(200, json!({ "responseData": { "transaction": { "status": "ORIG" } } }))
            .with_delay(Duration::from_secs(120));
        let runner = TestRunner::new(context(api), HandlerRegistry::standard()).with_case_timeout(5);

        let result = runner.run_entry(&suite()[0]).await;
        assert_eq!(result.status, TestStatus::Error);
        assert_eq!(result.error_kind.as_deref(), Some("Timeout"));
        assert_eq!(result.failed_stage, Some(Stage::Send));
    }
}
