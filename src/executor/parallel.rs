//! Parallel test execution
//!
//! Runs suite entries concurrently, bounded by a semaphore.

use futures::future::join_all;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Semaphore;
use tracing::{debug, info};

use super::execute_entry;
use super::runner::TestRunner;
use crate::models::{RunSummary, SuiteEntry, TestResult};

/// Parallel test executor
pub struct ParallelExecutor {
    max_concurrent: usize,
}

impl ParallelExecutor {
    pub fn new(max_concurrent: usize) -> Self {
        Self {
            max_concurrent: max_concurrent.max(1),
        }
    }

    #[cfg(test)]
    pub fn max_concurrent(&self) -> usize {
        self.max_concurrent
    }

    /// Run the runner's selected entries concurrently
    ///
    /// Results keep suite order.
    pub async fn run_all(&self, runner: &TestRunner, entries: &[SuiteEntry]) -> RunSummary {
        let selected = runner.selection().apply(entries);
        info!(
            "Running {} cases in parallel (max {} concurrent) against {}",
            selected.len(),
            self.max_concurrent,
            runner.environment()
        );

        let start = Instant::now();
        let semaphore = Arc::new(Semaphore::new(self.max_concurrent));
        let registry = runner.registry();
        let case_timeout = runner.case_timeout();

        let mut handles = Vec::with_capacity(selected.len());
        let mut labels = Vec::with_capacity(selected.len());
        for entry in selected {
            let semaphore = Arc::clone(&semaphore);
            let registry = Arc::clone(&registry);
            let ctx = runner.context().clone();
            let skip = runner.selection().skips(entry);
            let entry = entry.clone();

            labels.push((
                entry.id().to_string(),
                entry.name().to_string(),
                entry.workflow_tag().to_string(),
            ));
            handles.push(tokio::spawn(async move {
                let _permit = semaphore.acquire_owned().await.ok();
                debug!("Starting parallel execution of {}", entry.id());
                execute_entry(&ctx, &registry, &entry, skip, case_timeout).await
            }));
        }

        let results: Vec<TestResult> = join_all(handles)
            .await
            .into_iter()
            .zip(labels)
            .map(|(joined, (id, name, workflow))| {
                joined.unwrap_or_else(|err| {
                    TestResult::error(&id, &name, &workflow, 0, format!("Case task aborted: {err}"))
                        .with_error_kind("Panic")
                })
            })
            .collect();

        for result in &results {
            info!("  {}", result);
        }

        let summary = RunSummary::new(runner.environment(), results, start.elapsed().as_millis() as u64);
        info!(
            "Parallel execution completed in {}ms - Pass: {}/{} ({:.1}%)",
            summary.total_duration_ms,
            summary.passed,
            summary.total,
            summary.pass_rate()
        );
        summary
    }
}

impl Default for ParallelExecutor {
    fn default() -> Self {
        Self::new(4)
    }
}
