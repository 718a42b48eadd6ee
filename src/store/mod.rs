//! Template and case storage
//!
//! Request templates are JSON documents addressed by key. The file store
//! reads `<dir>/<key>.json`; the memory store backs tests.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde_json::Value;
use tracing::{debug, info};

use crate::error::EngineError;
use crate::models::SuiteEntry;

/// Source of request templates
pub trait TemplateStore: Send + Sync {
    /// Fresh copy of the template stored under `key`
    fn template(&self, key: &str) -> Result<Value, EngineError>;
}

/// Templates stored as `<key>.json` files in one directory
#[derive(Debug, Clone)]
pub struct FsTemplateStore {
    dir: PathBuf,
}

impl FsTemplateStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, key: &str) -> Option<PathBuf> {
        let valid = !key.is_empty()
            && !key.contains(['/', '\\'])
            && key != "."
            && key != "..";
        valid.then(|| self.dir.join(format!("{key}.json")))
    }
}

impl TemplateStore for FsTemplateStore {
    fn template(&self, key: &str) -> Result<Value, EngineError> {
        let path = self
            .path_for(key)
            .ok_or_else(|| EngineError::TemplateNotFound(key.to_string()))?;

        debug!("Reading request template {}", path.display());
        let content = std::fs::read_to_string(&path).map_err(|e| match e.kind() {
            ErrorKind::NotFound => EngineError::TemplateNotFound(key.to_string()),
            _ => EngineError::TemplateUnreadable {
                key: key.to_string(),
                source: e,
            },
        })?;

        serde_json::from_str(&content).map_err(|e| EngineError::InvalidTemplate {
            key: key.to_string(),
            reason: e.to_string(),
        })
    }
}

/// In-memory templates
#[cfg(test)]
#[derive(Debug, Default)]
pub struct MemoryTemplateStore {
    templates: std::sync::RwLock<std::collections::HashMap<String, Value>>,
}

#[cfg(test)]
impl MemoryTemplateStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_template(self, key: &str, template: Value) -> Self {
        self.insert(key, template);
        self
    }

    pub fn insert(&self, key: &str, template: Value) {
        self.templates
            .write()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .insert(key.to_string(), template);
    }
}

#[cfg(test)]
impl TemplateStore for MemoryTemplateStore {
    fn template(&self, key: &str) -> Result<Value, EngineError> {
        self.templates
            .read()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .get(key)
            .cloned()
            .ok_or_else(|| EngineError::TemplateNotFound(key.to_string()))
    }
}

/// Load every descriptor of a cases file
///
/// The file must hold a JSON array. Entries that fail conversion are kept as
/// invalid entries.
pub fn load_cases(path: &Path) -> Result<Vec<SuiteEntry>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read cases file: {}", path.display()))?;
    let raw: Vec<Value> = serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse cases file: {}", path.display()))?;

    let entries: Vec<SuiteEntry> = raw.into_iter().map(SuiteEntry::from_value).collect();
    let invalid = entries
        .iter()
        .filter(|e| matches!(e, SuiteEntry::Invalid(_)))
        .count();
    info!(
        "Loaded {} test cases from {} ({} invalid)",
        entries.len(),
        path.display(),
        invalid
    );
    Ok(entries)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_fs_store_reads_template() {
        let dir = TempDir::new().unwrap();
        fs::write(
            dir.path().join("simple-inside.json"),
            r#"{"requestParameters":{"data":{"transaction":{}}}}"#,
        )
        .unwrap();

        let store = FsTemplateStore::new(dir.path());
        let template = store.template("simple-inside").unwrap();
        assert!(template.pointer("/requestParameters/data/transaction").is_some());
    }

    #[test]
    fn test_fs_store_missing_and_invalid() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("broken.json"), "{not json").unwrap();
        let store = FsTemplateStore::new(dir.path());

        assert!(matches!(store.template("absent"), Err(EngineError::TemplateNotFound(_))));
        assert!(matches!(store.template("broken"), Err(EngineError::InvalidTemplate { .. })));
        assert!(matches!(store.template("../etc"), Err(EngineError::TemplateNotFound(_))));
    }

    #[test]
    fn test_fs_store_keeps_read_failure_cause() {
        let dir = TempDir::new().unwrap();
        fs::create_dir(dir.path().join("nested.json")).unwrap();
        let store = FsTemplateStore::new(dir.path());

        let err = store.template("nested").unwrap_err();
        assert!(matches!(err, EngineError::TemplateUnreadable { ref key, .. } if key == "nested"));
        assert_eq!(err.kind(), "TemplateUnreadable");
    }

    #[test]
    fn test_memory_store_returns_copies() {
        let store = MemoryTemplateStore::new().with_template("t", json!({"a": 1}));
        let mut copy = store.template("t").unwrap();
        copy["a"] = json!(2);
        assert_eq!(store.template("t").unwrap(), json!({"a": 1}));
    }

    #[test]
    fn test_load_cases() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("cases.json");
        fs::write(
            &path,
            json!([
                {"testCaseId": "TC001", "requestTemplateKey": "simple-inside"},
                {"testCaseId": "TC002", "apiType": "NOPE", "requestTemplateKey": "x"}
            ])
            .to_string(),
        )
        .unwrap();

        let entries = load_cases(&path).unwrap();
        assert_eq!(entries.len(), 2);
        assert!(matches!(entries[0], SuiteEntry::Valid(_)));
        assert!(matches!(entries[1], SuiteEntry::Invalid(_)));
    }

    #[test]
    fn test_load_cases_not_an_array() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("cases.json");
        fs::write(&path, r#"{"testCaseId": "TC001"}"#).unwrap();
        assert!(load_cases(&path).is_err());
    }
}
