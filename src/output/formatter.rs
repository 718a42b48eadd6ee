//! Output formatters for run results
//!
//! Provides table, JSON, CSV and summary output formats.

use std::str::FromStr;

use anyhow::Result;

use crate::models::{RunSummary, TestResult, TestStatus};

/// Output format options
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OutputFormat {
    Table,
    Json,
    JsonPretty,
    Csv,
    Summary,
}

impl FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "table" => Ok(OutputFormat::Table),
            "json" => Ok(OutputFormat::Json),
            "json-pretty" | "jsonpretty" => Ok(OutputFormat::JsonPretty),
            "csv" => Ok(OutputFormat::Csv),
            "summary" => Ok(OutputFormat::Summary),
            other => Err(format!("unknown output format: {other}")),
        }
    }
}

const CSV_HEADER: [&str; 8] = [
    "case_id",
    "name",
    "workflow",
    "status",
    "duration_ms",
    "failed_stage",
    "error_kind",
    "message",
];

fn csv_record(result: &TestResult) -> [String; 8] {
    [
        result.case_id.clone(),
        result.name.clone(),
        result.workflow.clone(),
        result.status.to_string(),
        result.duration_ms.to_string(),
        result.failed_stage.map(|s| s.to_string()).unwrap_or_default(),
        result.error_kind.clone().unwrap_or_default(),
        result.message.clone().unwrap_or_default(),
    ]
}

/// Render a run summary as CSV, one row per case
pub fn summary_csv(summary: &RunSummary) -> Result<String> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record(CSV_HEADER)?;
    for result in &summary.results {
        writer.write_record(csv_record(result))?;
    }
    let bytes = writer.into_inner().map_err(|e| anyhow::anyhow!("{}", e.error()))?;
    Ok(String::from_utf8(bytes)?)
}

/// Result formatter
pub struct ResultFormatter {
    format: OutputFormat,
    colorize: bool,
}

impl ResultFormatter {
    pub fn new(format: OutputFormat) -> Self {
        Self {
            format,
            colorize: true,
        }
    }

    pub fn no_color(mut self) -> Self {
        self.colorize = false;
        self
    }

    fn status_label(&self, status: TestStatus) -> &'static str {
        match (status, self.colorize) {
            (TestStatus::Pass, true) => "\x1b[32m✓ PASS \x1b[0m",
            (TestStatus::Fail, true) => "\x1b[31m✗ FAIL \x1b[0m",
            (TestStatus::Skip, true) => "\x1b[33m○ SKIP \x1b[0m",
            (TestStatus::Error, true) => "\x1b[31m! ERROR\x1b[0m",
            (TestStatus::Pass, false) => "✓ PASS ",
            (TestStatus::Fail, false) => "✗ FAIL ",
            (TestStatus::Skip, false) => "○ SKIP ",
            (TestStatus::Error, false) => "! ERROR",
        }
    }

    fn format_result_table(&self, result: &TestResult) -> String {
        let mut line = format!(
            "{:10} {:32} {:22} {} [{:>7}ms]",
            result.case_id,
            truncate(&result.name, 32),
            result.workflow,
            self.status_label(result.status),
            result.duration_ms
        );
        if !result.status.is_success() {
            if let Some(stage) = result.failed_stage {
                line.push_str(&format!(" at {stage}"));
            }
            if let Some(message) = &result.message {
                line.push_str(&format!("\n           └─ {message}"));
            }
        }
        line
    }

    /// Format a run summary
    pub fn format_summary(&self, summary: &RunSummary) -> String {
        match self.format {
            OutputFormat::Table => self.format_summary_table(summary),
            OutputFormat::Json => serde_json::to_string(summary).unwrap_or_default(),
            OutputFormat::JsonPretty => serde_json::to_string_pretty(summary).unwrap_or_default(),
            OutputFormat::Csv => summary_csv(summary).unwrap_or_default(),
            OutputFormat::Summary => self.format_summary_brief(summary),
        }
    }

    fn format_summary_table(&self, summary: &RunSummary) -> String {
        let rule = "═".repeat(86);
        let mut output = String::new();

        output.push_str(&format!("\n╔{rule}╗\n"));
        output.push_str(&format!("  Payment API run - {}\n", summary.environment));
        output.push_str(&format!("╠{rule}╣\n"));

        for result in &summary.results {
            output.push_str(&format!("  {}\n", self.format_result_table(result)));
        }

        output.push_str(&format!("╠{rule}╣\n"));

        let pass_str = if self.colorize {
            format!("\x1b[32m{}\x1b[0m", summary.passed)
        } else {
            summary.passed.to_string()
        };
        let fail_str = if self.colorize && summary.failed + summary.errors > 0 {
            format!("\x1b[31m{}\x1b[0m", summary.failed)
        } else {
            summary.failed.to_string()
        };

        output.push_str(&format!(
            "  Total: {} | Pass: {} | Fail: {} | Skip: {} | Error: {}\n",
            summary.total, pass_str, fail_str, summary.skipped, summary.errors
        ));
        output.push_str(&format!(
            "  Pass Rate: {:5.1}% | Duration: {}ms\n",
            summary.pass_rate(),
            summary.total_duration_ms
        ));
        output.push_str(&format!("╚{rule}╝\n"));

        output
    }

    fn format_summary_brief(&self, summary: &RunSummary) -> String {
        format!(
            "{}: {}/{} passed, {} failed, {} errors, {} skipped ({:.1}%) in {}ms",
            summary.environment,
            summary.passed,
            summary.total,
            summary.failed,
            summary.errors,
            summary.skipped,
            summary.pass_rate(),
            summary.total_duration_ms
        )
    }
}

impl Default for ResultFormatter {
    fn default() -> Self {
        Self::new(OutputFormat::Table)
    }
}

fn truncate(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        text.to_string()
    } else {
        let cut: String = text.chars().take(max.saturating_sub(1)).collect();
        format!("{cut}…")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Stage;

    fn summary() -> RunSummary {
        RunSummary::new(
            "sandbox",
            vec![
                TestResult::pass("TC001", "Simple inside", "SINGLE_CALL", 120),
                TestResult::fail("TC002", "Bulk, \"mixed\"", "BULK_TRANSACTION", 80, "Expected ORIG")
                    .with_stage(Stage::Validate)
                    .with_error_kind("AssertionMismatch"),
            ],
            200,
        )
    }

    #[test]
    fn test_output_format_from_str() {
        assert_eq!("json".parse::<OutputFormat>(), Ok(OutputFormat::Json));
        assert_eq!("TABLE".parse::<OutputFormat>(), Ok(OutputFormat::Table));
        assert_eq!("json-pretty".parse::<OutputFormat>(), Ok(OutputFormat::JsonPretty));
        assert!("unknown".parse::<OutputFormat>().is_err());
    }

    #[test]
    fn test_csv_quotes_fields() {
        let csv = summary_csv(&summary()).unwrap();
        let lines: Vec<_> = csv.lines().collect();
        assert_eq!(lines[0], "case_id,name,workflow,status,duration_ms,failed_stage,error_kind,message");
        assert!(lines[2].contains("\"Bulk, \"\"mixed\"\"\""));
        assert!(lines[2].contains("VALIDATE"));
    }

    #[test]
    fn test_table_shows_failure_detail() {
        let output = ResultFormatter::new(OutputFormat::Table)
            .no_color()
            .format_summary(&summary());
        assert!(output.contains("sandbox"));
        assert!(output.contains("✗ FAIL"));
        assert!(output.contains("└─ Expected ORIG"));
        assert!(output.contains("Pass: 1 | Fail: 1"));
    }

    #[test]
    fn test_json_summary_round_trips() {
        let json = ResultFormatter::new(OutputFormat::Json).format_summary(&summary());
        let parsed: RunSummary = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.failed, 1);
        assert_eq!(parsed.results[1].failed_stage, Some(Stage::Validate));
    }

    #[test]
    fn test_brief_summary() {
        let line = ResultFormatter::new(OutputFormat::Summary).format_summary(&summary());
        assert!(line.starts_with("sandbox: 1/2 passed"));
    }
}
