//! Settlement waits
//!
//! Requested waits are clamped into the configured window. The settlement
//! loop either sleeps the whole budget and queries once, or polls at a fixed
//! interval until the settled predicate holds or the budget is spent.

use std::future::Future;
use std::time::Duration;

use tokio::time::{sleep, Instant};
use tracing::{debug, info, warn};

use crate::config::{WaitPolicy, WaitStrategy};
use crate::error::EngineError;
use crate::http::ApiResponse;

/// Resolve a requested wait in seconds against `[min, max]`
pub fn resolve_wait(requested: Option<u64>, default: u64, min: u64, max: u64) -> u64 {
    let wanted = requested.unwrap_or(default);
    let resolved = wanted.max(min).min(max);
    if resolved != wanted {
        warn!(
            "Wait time {}s outside [{}s, {}s], using {}s",
            wanted, min, max, resolved
        );
    }
    resolved
}

impl WaitPolicy {
    pub fn resolve(&self, requested: Option<u64>) -> u64 {
        resolve_wait(requested, self.default_secs, self.min_secs, self.max_secs)
    }
}

/// Last query response of a settlement wait
#[derive(Clone, Debug)]
pub struct PollOutcome {
    pub response: ApiResponse,
    pub attempts: u32,
    pub settled: bool,
}

impl PollOutcome {
    /// Exchange label for the final query, flagging an unsettled wait
    pub fn label(&self, call: &str) -> String {
        if self.settled {
            format!("{} (attempt {})", call, self.attempts)
        } else {
            format!("{} (attempt {}, unsettled)", call, self.attempts)
        }
    }
}

/// Wait for settlement within `budget`, querying at least once
///
/// Query errors end the wait immediately.
pub async fn settle<Q, Fut, P>(
    budget: Duration,
    strategy: WaitStrategy,
    mut query: Q,
    is_settled: P,
) -> Result<PollOutcome, EngineError>
where
    Q: FnMut() -> Fut,
    Fut: Future<Output = Result<ApiResponse, EngineError>>,
    P: Fn(&ApiResponse) -> bool,
{
    match strategy {
        WaitStrategy::Fixed => {
            info!("Waiting {}s before querying", budget.as_secs());
            sleep(budget).await;
            let response = query().await?;
            Ok(PollOutcome {
                settled: is_settled(&response),
                response,
                attempts: 1,
            })
        }
        WaitStrategy::Poll { interval_secs } => {
            let interval = Duration::from_secs(interval_secs.max(1));
            let deadline = Instant::now() + budget;
            let mut attempts = 0;

            info!(
                "Polling every {}s for up to {}s",
                interval.as_secs(),
                budget.as_secs()
            );
            loop {
                let remaining = deadline.saturating_duration_since(Instant::now());
                sleep(interval.min(remaining)).await;

                attempts += 1;
                let response = query().await?;
                let settled = is_settled(&response);
                debug!(
                    "Settlement attempt {}: HTTP {}, settled={}",
                    attempts, response.status_code, settled
                );

                if settled || Instant::now() >= deadline {
                    if !settled {
                        warn!("Not settled after {} attempts", attempts);
                    }
                    return Ok(PollOutcome {
                        response,
                        attempts,
                        settled,
                    });
                }
            }
        }
    }
}
