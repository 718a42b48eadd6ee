//! Environment variable configuration
//!
//! Provides environment variable overrides for configuration.

use std::env;

use super::AppConfig;

/// Environment variable prefix
const ENV_PREFIX: &str = "PAYFLOW";

/// Unprefixed case filter kept for existing pipelines
const LEGACY_CASE_FILTER: &str = "TEST_CASE_ID";

/// Environment configuration from environment variables
#[derive(Clone, Debug, Default)]
pub struct EnvConfig {
    /// Config file from PAYFLOW_CONFIG
    pub config_file: Option<String>,
    /// Environment name from PAYFLOW_ENV
    pub environment: Option<String>,
    /// API base URL from PAYFLOW_BASE_URL
    pub base_url: Option<String>,
    /// Client id from PAYFLOW_CLIENT_ID
    pub client_id: Option<String>,
    /// Client secret from PAYFLOW_CLIENT_SECRET
    pub client_secret: Option<String>,
    /// Parallel from PAYFLOW_PARALLEL
    pub parallel: Option<bool>,
    /// Log filter from PAYFLOW_LOG
    pub log: Option<String>,
    /// Case filter from PAYFLOW_TEST_CASE_ID or TEST_CASE_ID
    pub test_case_id: Option<String>,
}

impl EnvConfig {
    /// Load configuration from environment variables
    pub fn load() -> Self {
        Self {
            config_file: get_env("CONFIG"),
            environment: get_env("ENV"),
            base_url: get_env("BASE_URL"),
            client_id: get_env("CLIENT_ID"),
            client_secret: get_env("CLIENT_SECRET"),
            parallel: get_env_bool("PARALLEL"),
            log: get_env("LOG"),
            test_case_id: get_env("TEST_CASE_ID").or_else(|| non_empty(env::var(LEGACY_CASE_FILTER).ok())),
        }
    }

    /// Check if any environment variables are set
    pub fn has_any(&self) -> bool {
        self.config_file.is_some()
            || self.environment.is_some()
            || self.base_url.is_some()
            || self.client_id.is_some()
            || self.client_secret.is_some()
            || self.parallel.is_some()
            || self.log.is_some()
            || self.test_case_id.is_some()
    }

    /// Overlay variables onto the app settings
    pub fn apply(&self, config: &mut AppConfig) {
        if let Some(url) = &self.base_url {
            config.api.base_url = url.clone();
        }
        if let Some(id) = &self.client_id {
            config.api.client_id = id.clone();
        }
        if let Some(secret) = &self.client_secret {
            config.api.client_secret = secret.clone();
        }
        if let Some(parallel) = self.parallel {
            config.parallel = parallel;
        }
    }

    /// Print current environment configuration
    pub fn print_summary(&self) {
        println!("Environment Configuration:");
        println!("  {}_CONFIG:        {:?}", ENV_PREFIX, self.config_file);
        println!("  {}_ENV:           {:?}", ENV_PREFIX, self.environment);
        println!("  {}_BASE_URL:      {:?}", ENV_PREFIX, self.base_url);
        println!("  {}_CLIENT_ID:     {:?}", ENV_PREFIX, self.client_id);
        println!(
            "  {}_CLIENT_SECRET: {}",
            ENV_PREFIX,
            if self.client_secret.is_some() { "<set>" } else { "None" }
        );
        println!("  {}_PARALLEL:      {:?}", ENV_PREFIX, self.parallel);
        println!("  {}_LOG:           {:?}", ENV_PREFIX, self.log);
        println!("  {}_TEST_CASE_ID:  {:?}", ENV_PREFIX, self.test_case_id);
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

/// Get environment variable with prefix
fn get_env(name: &str) -> Option<String> {
    non_empty(env::var(format!("{ENV_PREFIX}_{name}")).ok())
}

/// Get environment variable as boolean
fn get_env_bool(name: &str) -> Option<bool> {
    get_env(name).map(|v| {
        matches!(
            v.to_lowercase().as_str(),
            "1" | "true" | "yes" | "on" | "enabled"
        )
    })
}

/// Print all PAYFLOW environment variables
pub fn print_env_help() {
    println!("Environment Variables:");
    println!();
    println!("  {ENV_PREFIX}_CONFIG          Path to configuration file");
    println!("  {ENV_PREFIX}_ENV             Environment name from the config file");
    println!("  {ENV_PREFIX}_BASE_URL        Payment API base URL");
    println!("  {ENV_PREFIX}_CLIENT_ID       OAuth client id");
    println!("  {ENV_PREFIX}_CLIENT_SECRET   OAuth client secret");
    println!("  {ENV_PREFIX}_PARALLEL        Enable parallel execution (true/false)");
    println!("  {ENV_PREFIX}_LOG             Log filter (e.g. debug, payflow=trace)");
    println!("  {ENV_PREFIX}_TEST_CASE_ID    Run only this test case id");
    println!("  {LEGACY_CASE_FILTER}            Same as {ENV_PREFIX}_TEST_CASE_ID");
    println!();
    println!("Example:");
    println!("  export {ENV_PREFIX}_BASE_URL=https://sandbox.example.com/open");
    println!("  export {ENV_PREFIX}_TEST_CASE_ID=TC001");
    println!("  payflow run");
}

/// Builder for setting environment variables in tests
#[cfg(test)]
pub struct EnvBuilder {
    vars: Vec<(String, String)>,
}

#[cfg(test)]
impl EnvBuilder {
    pub fn new() -> Self {
        Self { vars: Vec::new() }
    }

    pub fn var(mut self, name: &str, value: impl Into<String>) -> Self {
        self.vars.push((format!("{ENV_PREFIX}_{name}"), value.into()));
        self
    }

    pub fn raw(mut self, name: &str, value: impl Into<String>) -> Self {
        self.vars.push((name.to_string(), value.into()));
        self
    }

    /// Apply and return guard that restores on drop
    pub fn apply_scoped(self) -> EnvGuard {
        let previous: Vec<_> = self
            .vars
            .iter()
            .map(|(k, _)| (k.clone(), env::var(k).ok()))
            .collect();

        for (key, value) in self.vars {
            env::set_var(key, value);
        }

        EnvGuard { previous }
    }
}

/// Guard that restores environment variables on drop
#[cfg(test)]
pub struct EnvGuard {
    previous: Vec<(String, Option<String>)>,
}

#[cfg(test)]
impl Drop for EnvGuard {
    fn drop(&mut self) {
        for (key, value) in &self.previous {
            match value {
                Some(v) => env::set_var(key, v),
                None => env::remove_var(key),
            }
        }
    }
}
