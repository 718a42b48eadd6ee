//! Create-call memoisation
//!
//! One cell per (template key, case id). Concurrent callers of the same key
//! share a single in-flight computation; a failed computation leaves the
//! cell empty so a later caller may retry.

use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::sync::{Arc, Mutex, PoisonError};

use serde_json::Value;
use tokio::sync::OnceCell;
use tracing::debug;

use crate::error::EngineError;
use crate::http::ApiResponse;
use crate::models::DynamicValues;

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub template_key: String,
    pub case_id: String,
}

impl CacheKey {
    pub fn new(template_key: &str, case_id: &str) -> Self {
        Self {
            template_key: template_key.to_string(),
            case_id: case_id.to_string(),
        }
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}_{}", self.template_key, self.case_id)
    }
}

/// Stored result of a create call
#[derive(Clone, Debug)]
pub struct CachedExchange {
    pub request: Value,
    pub response: ApiResponse,
    pub values: DynamicValues,
}

#[derive(Default)]
pub struct ResponseCache {
    cells: Mutex<HashMap<CacheKey, Arc<OnceCell<CachedExchange>>>>,
}

impl ResponseCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the cached exchange for `key`, computing it at most once
    ///
    /// The flag is true when the value came from the cache.
    pub async fn get_or_try_init<F, Fut>(
        &self,
        key: CacheKey,
        init: F,
    ) -> Result<(CachedExchange, bool), EngineError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<CachedExchange, EngineError>>,
    {
        let cell = {
            let mut cells = self.cells.lock().unwrap_or_else(PoisonError::into_inner);
            Arc::clone(cells.entry(key.clone()).or_default())
        };

        let mut computed = false;
        let exchange = cell
            .get_or_try_init(|| {
                computed = true;
                init()
            })
            .await?;

        if !computed {
            debug!("Response cache hit for {}", key);
        }
        Ok((exchange.clone(), !computed))
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.cells
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .filter(|cell| cell.initialized())
            .count()
    }
}
