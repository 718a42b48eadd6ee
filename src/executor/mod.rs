//! Test execution engine
//!
//! Provides sequential and parallel suite execution. Both run each case
//! through the same isolation boundary: a case timeout, error
//! classification and diagnostics capture.

mod parallel;
mod runner;

use std::time::{Duration, Instant};
use tracing::{error, info};

use crate::engine::RunContext;
use crate::models::{Stage, SuiteEntry, TestResult};
use crate::workflows::{CaseSession, HandlerRegistry};

pub use parallel::ParallelExecutor;
pub use runner::TestRunner;

/// Which suite entries run
#[derive(Clone, Debug, Default)]
pub struct Selection {
    /// Run only this case id
    pub case_id: Option<String>,
    /// Run only cases carrying one of these tags
    pub tags: Vec<String>,
    /// Case ids reported as skipped
    pub skip: Vec<String>,
}

impl Selection {
    pub fn includes(&self, entry: &SuiteEntry) -> bool {
        if let Some(id) = &self.case_id {
            if entry.id() != id {
                return false;
            }
        }
        self.tags.is_empty() || entry.tags().iter().any(|tag| self.tags.contains(tag))
    }

    pub fn skips(&self, entry: &SuiteEntry) -> bool {
        self.skip.iter().any(|id| id == entry.id())
    }

    /// Entries to report, in suite order
    pub fn apply<'a>(&self, entries: &'a [SuiteEntry]) -> Vec<&'a SuiteEntry> {
        entries.iter().filter(|entry| self.includes(entry)).collect()
    }
}

/// Run one suite entry to a result
///
/// Never fails: handler errors, timeouts and invalid descriptors all become
/// results so sibling cases are unaffected.
pub(crate) async fn execute_entry(
    ctx: &RunContext,
    registry: &HandlerRegistry,
    entry: &SuiteEntry,
    skip: bool,
    case_timeout: Duration,
) -> TestResult {
    let case = match entry {
        SuiteEntry::Invalid(invalid) => {
            error!("{} is not runnable: {}", invalid.id, invalid.reason);
            return TestResult::error(&invalid.id, &invalid.name, entry.workflow_tag(), 0, &invalid.reason)
                .with_error_kind(invalid.error_kind);
        }
        SuiteEntry::Valid(case) => case,
    };
    let workflow = case.kind().tag();

    if skip {
        return TestResult::skip(&case.id, &case.name, workflow, "Skipped by configuration");
    }

    info!("Running {} {} ({})", case.id, case.name, workflow);
    let start = Instant::now();
    let mut session = CaseSession::new();
    let outcome = tokio::time::timeout(case_timeout, registry.run(ctx, case, &mut session)).await;
    let duration_ms = start.elapsed().as_millis() as u64;

    match outcome {
        Ok(Ok(())) => TestResult::pass(&case.id, &case.name, workflow, duration_ms),
        Ok(Err(err)) => {
            let stage = session.stage();
            session.enter(Stage::Failed);
            error!("{} failed at {}: {}", case.id, stage, err);
            let result = if err.is_assertion() {
                TestResult::fail(&case.id, &case.name, workflow, duration_ms, err.to_string())
            } else {
                TestResult::error(&case.id, &case.name, workflow, duration_ms, err.to_string())
            };
            result
                .with_stage(stage)
                .with_error_kind(err.kind())
                .with_diagnostics(session.exchanges)
        }
        Err(_) => {
            error!("{} timed out after {}s", case.id, case_timeout.as_secs());
            TestResult::error(
                &case.id,
                &case.name,
                workflow,
                duration_ms,
                format!("Timed out after {}s", case_timeout.as_secs()),
            )
            .with_stage(session.stage())
            .with_error_kind("Timeout")
            .with_diagnostics(session.exchanges)
        }
    }
}
