//! Configuration file management
//!
//! Handles finding, loading, and validating configuration files.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};

use super::{AppConfig, WaitPolicy, WaitStrategy};
use crate::signing::{IdentityConfig, KeySource};

/// Configuration file locations (in order of precedence)
const CONFIG_LOCATIONS: &[&str] = &[
    "./payflow.yaml",
    "./payflow.yml",
    "./.payflow.yaml",
    "./.payflow/config.yaml",
    "~/.config/payflow/config.yaml",
    "~/.payflow.yaml",
];

/// Full configuration file structure
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ConfigFile {
    /// Version of config file format
    #[serde(default = "default_version")]
    pub version: String,

    /// Application settings
    #[serde(default)]
    pub app: AppConfig,

    /// Environment-specific overrides
    #[serde(default)]
    pub environments: Vec<EnvironmentConfig>,
}

fn default_version() -> String {
    "1.0".to_string()
}

impl Default for ConfigFile {
    fn default() -> Self {
        Self {
            version: default_version(),
            app: AppConfig::default(),
            environments: Vec::new(),
        }
    }
}

impl ConfigFile {
    /// Find configuration file in standard locations
    pub fn find() -> Option<PathBuf> {
        CONFIG_LOCATIONS
            .iter()
            .map(|location| expand_path(location))
            .find(|path| path.exists())
    }

    /// Load configuration from default location
    pub fn load_default() -> Result<Self> {
        match Self::find() {
            Some(path) => Self::load(&path),
            None => Ok(Self::default()),
        }
    }

    /// Load configuration from file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Self = if is_yaml_file(path) {
            serde_yaml::from_str(&content)
                .with_context(|| format!("Failed to parse YAML config: {}", path.display()))?
        } else {
            serde_json::from_str(&content)
                .with_context(|| format!("Failed to parse JSON config: {}", path.display()))?
        };

        config.validate()?;
        Ok(config)
    }

    /// Save configuration to file
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let content = if is_yaml_file(path) {
            serde_yaml::to_string(self).context("Failed to serialize config")?
        } else {
            serde_json::to_string_pretty(self).context("Failed to serialize config")?
        };

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
        }

        std::fs::write(path, content)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;

        Ok(())
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if !["1.0"].contains(&self.version.as_str()) {
            anyhow::bail!("Unsupported config version: {}", self.version);
        }

        let app = &self.app;
        validate_wait("single_wait", &app.workflows.single_wait)?;
        validate_wait("bulk_wait", &app.workflows.bulk_wait)?;

        if let WaitStrategy::Poll { interval_secs: 0 } = app.workflows.wait_strategy {
            anyhow::bail!("Poll interval must be at least 1 second");
        }
        if app.max_concurrent == 0 {
            anyhow::bail!("max_concurrent must be positive");
        }
        if app.timeout_secs == 0 || app.case_timeout_secs == 0 {
            anyhow::bail!("Timeouts must be positive");
        }

        let mut seen = HashSet::new();
        for identity in &app.signing {
            if identity.authorization_id.trim().is_empty() {
                anyhow::bail!("Signing identity with empty authorization_id");
            }
            if !seen.insert(identity.authorization_id.as_str()) {
                anyhow::bail!(
                    "Duplicate signing identity: {}",
                    identity.authorization_id
                );
            }
        }

        let mut names = HashSet::new();
        for env in &self.environments {
            if !names.insert(env.name.as_str()) {
                anyhow::bail!("Duplicate environment: {}", env.name);
            }
        }

        Ok(())
    }

    /// Generate example configuration
    pub fn example() -> Self {
        let mut app = AppConfig::default();
        app.api.base_url = "https://sandbox.example.com/open".to_string();
        app.api.client_id = "<client-id>".to_string();
        app.api.client_secret = "<client-secret>".to_string();
        app.signing = vec![
            IdentityConfig {
                authorization_id: "approver-primary".to_string(),
                source: KeySource::Pem {
                    certificate: PathBuf::from("certs/approver-primary.cer"),
                    chain: Vec::new(),
                    private_key: PathBuf::from("certs/approver-primary.key"),
                    password: Some("<key-password>".to_string()),
                },
            },
            IdentityConfig {
                authorization_id: "approver-secondary".to_string(),
                source: KeySource::Pkcs12 {
                    keystore: PathBuf::from("certs/approver-secondary.p12"),
                    password: "<keystore-password>".to_string(),
                },
            },
        ];

        Self {
            version: default_version(),
            app,
            environments: vec![
                EnvironmentConfig::new("development").with_base_url("http://localhost:8080"),
                EnvironmentConfig::new("sandbox").with_base_url("https://sandbox.example.com/open"),
            ],
        }
    }

    /// Get environment by name
    pub fn environment(&self, name: &str) -> Option<&EnvironmentConfig> {
        self.environments.iter().find(|e| e.name == name)
    }

    /// Apply the named environment's overrides to the app settings
    pub fn apply_environment(&mut self, name: &str) -> Result<()> {
        let env = self
            .environment(name)
            .cloned()
            .with_context(|| format!("Unknown environment: {name}"))?;

        if let Some(url) = env.base_url {
            self.app.api.base_url = url;
        }
        if let Some(id) = env.client_id {
            self.app.api.client_id = id;
        }
        if let Some(secret) = env.client_secret {
            self.app.api.client_secret = secret;
        }
        Ok(())
    }
}

fn validate_wait(name: &str, policy: &WaitPolicy) -> Result<()> {
    if policy.min_secs > policy.max_secs {
        anyhow::bail!(
            "{}: min_secs {} exceeds max_secs {}",
            name,
            policy.min_secs,
            policy.max_secs
        );
    }
    if policy.default_secs < policy.min_secs || policy.default_secs > policy.max_secs {
        anyhow::bail!(
            "{}: default_secs {} outside [{}, {}]",
            name,
            policy.default_secs,
            policy.min_secs,
            policy.max_secs
        );
    }
    Ok(())
}

/// Environment-specific configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct EnvironmentConfig {
    /// Environment name (e.g., "development", "sandbox")
    pub name: String,
    #[serde(default)]
    pub base_url: Option<String>,
    #[serde(default)]
    pub client_id: Option<String>,
    #[serde(default)]
    pub client_secret: Option<String>,
}

impl EnvironmentConfig {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            base_url: None,
            client_id: None,
            client_secret: None,
        }
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }
}

/// Expand ~ to home directory
fn expand_path(path: &str) -> PathBuf {
    if let Some(stripped) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(stripped);
        }
    }
    PathBuf::from(path)
}

/// Check if file is YAML based on extension
fn is_yaml_file(path: &Path) -> bool {
    path.extension()
        .map(|e| e == "yaml" || e == "yml")
        .unwrap_or(false)
}
