//! Configuration module
//!
//! Handles loading and managing configuration.

pub mod env;
pub mod file;

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::signing::IdentityConfig;

pub use env::EnvConfig;
pub use file::ConfigFile;

/// Application configuration
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Payment platform endpoints and client identity
    pub api: ApiConfig,

    /// Where cases and templates are read from
    pub suite: SuiteConfig,

    /// Workflow timing and business status codes
    pub workflows: WorkflowSettings,

    /// Signing identities keyed by authorization id
    pub signing: Vec<IdentityConfig>,

    /// HTTP timeout in seconds
    pub timeout_secs: u64,

    /// Enable parallel execution by default
    pub parallel: bool,

    /// Maximum concurrent cases
    pub max_concurrent: usize,

    /// Upper bound for one case, waits included
    pub case_timeout_secs: u64,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            api: ApiConfig::default(),
            suite: SuiteConfig::default(),
            workflows: WorkflowSettings::default(),
            signing: Vec::new(),
            timeout_secs: 30,
            parallel: false,
            max_concurrent: 4,
            case_timeout_secs: 300,
        }
    }
}

/// Payment platform API settings
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    pub base_url: String,
    pub token_path: String,
    pub transaction_path: String,
    pub bulk_transaction_path: String,
    /// Value of the `X-Channel` header
    pub channel: String,
    pub client_id: String,
    pub client_secret: String,
    pub provider_ids: ProviderIds,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8080".to_string(),
            token_path: "/iam/id/v1/auth/realms/soba/protocol/openid-connect/token".to_string(),
            transaction_path: "/payments/payment-order/v2/transaction".to_string(),
            bulk_transaction_path: "/payments/payment-order/v2/bulk-transaction".to_string(),
            channel: "SOBA".to_string(),
            client_id: String::new(),
            client_secret: String::new(),
            provider_ids: ProviderIds::default(),
        }
    }
}

/// `X-Provider-ID` per endpoint
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderIds {
    pub create: String,
    pub query: String,
    pub bulk_create: String,
    pub bulk_query: String,
}

impl Default for ProviderIds {
    fn default() -> Self {
        Self {
            create: "PIKA".to_string(),
            query: "PIKA".to_string(),
            bulk_create: "PIKA".to_string(),
            bulk_query: "BULK-TRANSACTION".to_string(),
        }
    }
}

/// Suite input locations
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SuiteConfig {
    pub cases_file: PathBuf,
    pub templates_dir: PathBuf,
}

impl Default for SuiteConfig {
    fn default() -> Self {
        Self {
            cases_file: PathBuf::from("all-payment-tests.json"),
            templates_dir: PathBuf::from("requestTemplates"),
        }
    }
}

/// Bounds for a settlement wait, in seconds
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct WaitPolicy {
    pub default_secs: u64,
    pub min_secs: u64,
    pub max_secs: u64,
}

impl WaitPolicy {
    pub const fn new(default_secs: u64, min_secs: u64, max_secs: u64) -> Self {
        Self {
            default_secs,
            min_secs,
            max_secs,
        }
    }
}

/// How create-and-query workflows wait for settlement
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum WaitStrategy {
    /// Sleep the whole budget, then query once
    Fixed,
    /// Query every `interval_secs` until settled or the budget runs out
    Poll { interval_secs: u64 },
}

impl Default for WaitStrategy {
    fn default() -> Self {
        WaitStrategy::Poll { interval_secs: 5 }
    }
}

/// Business status codes asserted by the workflows
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StatusCodes {
    pub originated: String,
    pub settled: String,
    pub bulk_settled: String,
}

impl Default for StatusCodes {
    fn default() -> Self {
        Self {
            originated: "ORIG".to_string(),
            settled: "TRAN".to_string(),
            bulk_settled: "COMP".to_string(),
        }
    }
}

/// Workflow engine settings
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkflowSettings {
    pub single_wait: WaitPolicy,
    pub bulk_wait: WaitPolicy,
    pub wait_strategy: WaitStrategy,
    pub statuses: StatusCodes,
    /// Query with the locally generated trace number when the create
    /// response does not echo one
    pub fallback_to_local_trace: bool,
}

impl Default for WorkflowSettings {
    fn default() -> Self {
        Self {
            single_wait: WaitPolicy::new(20, 5, 60),
            bulk_wait: WaitPolicy::new(40, 5, 60),
            wait_strategy: WaitStrategy::default(),
            statuses: StatusCodes::default(),
            fallback_to_local_trace: false,
        }
    }
}
