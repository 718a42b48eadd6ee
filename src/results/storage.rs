//! Results export
//!
//! Writes run summaries to disk as pretty JSON or CSV.

use anyhow::{Context, Result};
use std::fs::{self, File};
use std::io::BufWriter;
use std::path::Path;
use std::str::FromStr;
use tracing::info;

use crate::models::RunSummary;
use crate::output::summary_csv;

/// Export format
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ExportFormat {
    Json,
    Csv,
}

impl FromStr for ExportFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "json" => Ok(ExportFormat::Json),
            "csv" => Ok(ExportFormat::Csv),
            other => Err(format!("unknown export format: {other}")),
        }
    }
}

impl ExportFormat {
    /// Format implied by a file extension, JSON when unknown
    pub fn from_extension(path: &Path) -> Self {
        path.extension()
            .and_then(|e| e.to_str())
            .and_then(|e| e.parse().ok())
            .unwrap_or(ExportFormat::Json)
    }
}

/// Write a run summary to `path` in the format its extension names
pub fn save_summary(summary: &RunSummary, path: &Path) -> Result<()> {
    export(summary, path, ExportFormat::from_extension(path))
}

/// Write a run summary to `path`
pub fn export(summary: &RunSummary, path: &Path, format: ExportFormat) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }

    match format {
        ExportFormat::Json => {
            let file = File::create(path)
                .with_context(|| format!("Failed to create {}", path.display()))?;
            serde_json::to_writer_pretty(BufWriter::new(file), summary)?;
        }
        ExportFormat::Csv => {
            fs::write(path, summary_csv(summary)?)
                .with_context(|| format!("Failed to write {}", path.display()))?;
        }
    }

    info!("Exported results to {}", path.display());
    Ok(())
}
