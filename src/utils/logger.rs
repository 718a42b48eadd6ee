//! Logging utilities
//!
//! Provides logging configuration and helpers.

use std::str::FromStr;

use tracing::Level;
use tracing_subscriber::EnvFilter;

/// Log level configuration
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl LogLevel {
    pub fn to_tracing_level(self) -> Level {
        match self {
            LogLevel::Trace => Level::TRACE,
            LogLevel::Debug => Level::DEBUG,
            LogLevel::Info => Level::INFO,
            LogLevel::Warn => Level::WARN,
            LogLevel::Error => Level::ERROR,
        }
    }

    /// Level for the `--verbose` flag
    pub fn from_verbose(verbose: bool) -> Self {
        if verbose {
            LogLevel::Debug
        } else {
            LogLevel::Info
        }
    }
}

impl FromStr for LogLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "trace" => Ok(LogLevel::Trace),
            "debug" => Ok(LogLevel::Debug),
            "info" => Ok(LogLevel::Info),
            "warn" | "warning" => Ok(LogLevel::Warn),
            "error" => Ok(LogLevel::Error),
            other => Err(format!("unknown log level: {other}")),
        }
    }
}

/// Filter directive: an explicit override wins over the level
///
/// A bare level in the override (`debug`) applies to this crate only; any
/// other text is used as a full `EnvFilter` directive.
pub fn filter_directive(level: LogLevel, override_filter: Option<&str>) -> String {
    match override_filter.map(str::trim).filter(|f| !f.is_empty()) {
        Some(filter) => match filter.parse::<LogLevel>() {
            Ok(level) => format!("payflow={}", level.to_tracing_level()),
            Err(_) => filter.to_string(),
        },
        None => format!("payflow={}", level.to_tracing_level()),
    }
}

/// Initialize the logger with specified level
pub fn init_logger(level: LogLevel, override_filter: Option<&str>) {
    let filter = EnvFilter::new(filter_directive(level, override_filter));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .compact()
        .init();
}
