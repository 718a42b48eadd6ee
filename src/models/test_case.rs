//! Test case descriptors
//!
//! Descriptors are read as loosely typed JSON and converted into a typed
//! `TestCase` at load time. A descriptor that fails conversion stays in the
//! suite as an invalid entry so it can be reported without affecting others.

use chrono::{Local, NaiveDate};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

use crate::error::EngineError;

/// Expected HTTP status when a descriptor does not declare one
pub const DEFAULT_EXPECTED_STATUS: u16 = 200;

/// Date format used by query endpoints and descriptors
pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// Descriptor exactly as stored in the cases file
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawTestCase {
    #[serde(default)]
    pub test_case_id: Option<String>,
    #[serde(default)]
    pub test_name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub api_type: Option<String>,
    #[serde(default)]
    pub request_template_key: Option<String>,
    #[serde(default)]
    pub expected_status_code: Option<u16>,
    #[serde(default)]
    pub expected_field: Option<String>,
    #[serde(default)]
    pub expected_value: Option<Value>,
    #[serde(default)]
    pub expected_error_field: Option<String>,
    #[serde(default)]
    pub expected_error_message: Option<String>,
    #[serde(default)]
    pub tags: Option<Vec<String>>,
    #[serde(default)]
    pub wait_time: Option<u64>,
    #[serde(default)]
    pub from_date: Option<String>,
    #[serde(default)]
    pub to_date: Option<String>,
    #[serde(default)]
    pub transaction_trace_number: Option<String>,
    #[serde(default)]
    pub bulk_trace_number: Option<String>,
}

/// Workflow type tag
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum WorkflowKind {
    #[serde(rename = "SINGLE_CALL")]
    SingleCall,
    #[serde(rename = "CREATE_AND_QUERY")]
    CreateAndQuery,
    #[serde(rename = "BULK_TRANSACTION")]
    BulkCreate,
    #[serde(rename = "CREATE_AND_QUERY_BULK")]
    BulkCreateAndQuery,
    #[serde(rename = "GET_TRANSACTION")]
    ReadOnlyQuery,
    #[serde(rename = "GET_BULK_TRANSACTION")]
    ReadOnlyBulkQuery,
}

impl WorkflowKind {
    pub fn tag(&self) -> &'static str {
        match self {
            WorkflowKind::SingleCall => "SINGLE_CALL",
            WorkflowKind::CreateAndQuery => "CREATE_AND_QUERY",
            WorkflowKind::BulkCreate => "BULK_TRANSACTION",
            WorkflowKind::BulkCreateAndQuery => "CREATE_AND_QUERY_BULK",
            WorkflowKind::ReadOnlyQuery => "GET_TRANSACTION",
            WorkflowKind::ReadOnlyBulkQuery => "GET_BULK_TRANSACTION",
        }
    }

    /// Exact, case-sensitive tag lookup
    pub fn from_tag(tag: &str) -> Option<WorkflowKind> {
        Self::all().into_iter().find(|kind| kind.tag() == tag)
    }

    pub fn all() -> [WorkflowKind; 6] {
        [
            WorkflowKind::SingleCall,
            WorkflowKind::CreateAndQuery,
            WorkflowKind::BulkCreate,
            WorkflowKind::BulkCreateAndQuery,
            WorkflowKind::ReadOnlyQuery,
            WorkflowKind::ReadOnlyBulkQuery,
        ]
    }
}

impl fmt::Display for WorkflowKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.tag())
    }
}

/// Query window; missing bounds default to the current local date
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct DateWindow {
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
}

/// Concrete query date range
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DateRange {
    pub from: NaiveDate,
    pub to: NaiveDate,
}

impl DateWindow {
    pub fn resolve(&self) -> DateRange {
        let today = Local::now().date_naive();
        DateRange {
            from: self.from.unwrap_or(today),
            to: self.to.unwrap_or(today),
        }
    }
}

impl DateRange {
    pub fn from_param(&self) -> String {
        self.from.format(DATE_FORMAT).to_string()
    }

    pub fn to_param(&self) -> String {
        self.to.format(DATE_FORMAT).to_string()
    }
}

/// Per-workflow parameters
#[derive(Clone, Debug, PartialEq)]
pub enum WorkflowSpec {
    SingleCall {
        template_key: String,
    },
    CreateAndQuery {
        template_key: String,
        wait_secs: Option<u64>,
        window: DateWindow,
    },
    BulkCreate {
        template_key: String,
    },
    BulkCreateAndQuery {
        template_key: String,
        wait_secs: Option<u64>,
        window: DateWindow,
    },
    ReadOnlyQuery {
        trace_number: String,
        window: DateWindow,
    },
    ReadOnlyBulkQuery {
        bulk_trace_number: String,
        window: DateWindow,
    },
}

impl WorkflowSpec {
    pub fn kind(&self) -> WorkflowKind {
        match self {
            WorkflowSpec::SingleCall { .. } => WorkflowKind::SingleCall,
            WorkflowSpec::CreateAndQuery { .. } => WorkflowKind::CreateAndQuery,
            WorkflowSpec::BulkCreate { .. } => WorkflowKind::BulkCreate,
            WorkflowSpec::BulkCreateAndQuery { .. } => WorkflowKind::BulkCreateAndQuery,
            WorkflowSpec::ReadOnlyQuery { .. } => WorkflowKind::ReadOnlyQuery,
            WorkflowSpec::ReadOnlyBulkQuery { .. } => WorkflowKind::ReadOnlyBulkQuery,
        }
    }

    pub fn template_key(&self) -> Option<&str> {
        match self {
            WorkflowSpec::SingleCall { template_key }
            | WorkflowSpec::CreateAndQuery { template_key, .. }
            | WorkflowSpec::BulkCreate { template_key }
            | WorkflowSpec::BulkCreateAndQuery { template_key, .. } => Some(template_key),
            WorkflowSpec::ReadOnlyQuery { .. } | WorkflowSpec::ReadOnlyBulkQuery { .. } => None,
        }
    }
}

/// Expected error field in the response
#[derive(Clone, Debug, PartialEq)]
pub struct ErrorExpectation {
    pub field: String,
    pub message: Option<String>,
}

/// Validated test case
#[derive(Clone, Debug, PartialEq)]
pub struct TestCase {
    pub id: String,
    pub name: String,
    pub description: Option<String>,
    pub tags: Vec<String>,
    pub expected_status: u16,
    pub expected_field: Option<String>,
    pub expected_value: Option<String>,
    pub expected_error: Option<ErrorExpectation>,
    pub workflow: WorkflowSpec,
}

impl TestCase {
    pub fn kind(&self) -> WorkflowKind {
        self.workflow.kind()
    }
}

fn non_blank(value: &Option<String>) -> Option<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

/// Text form of an expected value as it is compared against responses
pub fn value_text(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

fn parse_date(id: &str, field: &str, value: &Option<String>) -> Result<Option<NaiveDate>, EngineError> {
    match non_blank(value) {
        None => Ok(None),
        Some(text) => NaiveDate::parse_from_str(&text, DATE_FORMAT)
            .map(Some)
            .map_err(|_| EngineError::InvalidTestCase {
                id: id.to_string(),
                reason: format!("{} '{}' is not a YYYY-MM-DD date", field, text),
            }),
    }
}

fn require(id: &str, kind: WorkflowKind, field: &str, value: &Option<String>) -> Result<String, EngineError> {
    non_blank(value).ok_or_else(|| EngineError::InvalidTestCase {
        id: id.to_string(),
        reason: format!("{} is required for {}", field, kind),
    })
}

impl RawTestCase {
    /// Display name, `Test_<id>` when blank
    pub fn display_name(&self, id: &str) -> String {
        non_blank(&self.test_name).unwrap_or_else(|| format!("Test_{}", id))
    }
}

impl TryFrom<RawTestCase> for TestCase {
    type Error = EngineError;

    fn try_from(raw: RawTestCase) -> Result<Self, Self::Error> {
        let id = non_blank(&raw.test_case_id).ok_or_else(|| EngineError::InvalidTestCase {
            id: "<unknown>".to_string(),
            reason: "testCaseId is required".to_string(),
        })?;

        let kind = match non_blank(&raw.api_type) {
            None => WorkflowKind::SingleCall,
            Some(tag) => {
                WorkflowKind::from_tag(&tag).ok_or(EngineError::UnknownWorkflowType(tag))?
            }
        };

        let window = DateWindow {
            from: parse_date(&id, "fromDate", &raw.from_date)?,
            to: parse_date(&id, "toDate", &raw.to_date)?,
        };
        if let (Some(from), Some(to)) = (window.from, window.to) {
            if from > to {
                return Err(EngineError::InvalidTestCase {
                    id,
                    reason: format!("fromDate {} is after toDate {}", from, to),
                });
            }
        }

        let template_key = || require(&id, kind, "requestTemplateKey", &raw.request_template_key);
        let workflow = match kind {
            WorkflowKind::SingleCall => WorkflowSpec::SingleCall {
                template_key: template_key()?,
            },
            WorkflowKind::CreateAndQuery => WorkflowSpec::CreateAndQuery {
                template_key: template_key()?,
                wait_secs: raw.wait_time,
                window,
            },
            WorkflowKind::BulkCreate => WorkflowSpec::BulkCreate {
                template_key: template_key()?,
            },
            WorkflowKind::BulkCreateAndQuery => WorkflowSpec::BulkCreateAndQuery {
                template_key: template_key()?,
                wait_secs: raw.wait_time,
                window,
            },
            WorkflowKind::ReadOnlyQuery => WorkflowSpec::ReadOnlyQuery {
                trace_number: require(&id, kind, "transactionTraceNumber", &raw.transaction_trace_number)?,
                window,
            },
            WorkflowKind::ReadOnlyBulkQuery => WorkflowSpec::ReadOnlyBulkQuery {
                bulk_trace_number: require(&id, kind, "bulkTraceNumber", &raw.bulk_trace_number)?,
                window,
            },
        };

        let expected_error = non_blank(&raw.expected_error_field).map(|field| ErrorExpectation {
            field,
            message: non_blank(&raw.expected_error_message),
        });

        Ok(TestCase {
            name: raw.display_name(&id),
            description: non_blank(&raw.description),
            tags: raw.tags.unwrap_or_default(),
            expected_status: raw.expected_status_code.unwrap_or(DEFAULT_EXPECTED_STATUS),
            expected_field: non_blank(&raw.expected_field),
            expected_value: raw.expected_value.as_ref().and_then(value_text),
            expected_error,
            workflow,
            id,
        })
    }
}

/// Descriptor that could not be converted
#[derive(Clone, Debug, PartialEq)]
pub struct InvalidCase {
    pub id: String,
    pub name: String,
    pub tags: Vec<String>,
    pub error_kind: &'static str,
    pub reason: String,
}

/// One entry of a loaded suite
#[derive(Clone, Debug, PartialEq)]
pub enum SuiteEntry {
    Valid(TestCase),
    Invalid(InvalidCase),
}

impl SuiteEntry {
    /// Convert one JSON descriptor, never failing
    pub fn from_value(value: Value) -> SuiteEntry {
        let fallback_id = value
            .get("testCaseId")
            .and_then(value_text)
            .unwrap_or_else(|| "<unknown>".to_string());

        let raw: RawTestCase = match serde_json::from_value(value) {
            Ok(raw) => raw,
            Err(err) => {
                return SuiteEntry::Invalid(InvalidCase {
                    name: format!("Test_{}", fallback_id),
                    id: fallback_id,
                    tags: Vec::new(),
                    error_kind: "InvalidTestCase",
                    reason: err.to_string(),
                })
            }
        };

        let id = non_blank(&raw.test_case_id).unwrap_or(fallback_id);
        let name = raw.display_name(&id);
        let tags = raw.tags.clone().unwrap_or_default();

        match TestCase::try_from(raw) {
            Ok(case) => SuiteEntry::Valid(case),
            Err(err) => SuiteEntry::Invalid(InvalidCase {
                id,
                name,
                tags,
                error_kind: err.kind(),
                reason: err.to_string(),
            }),
        }
    }

    pub fn id(&self) -> &str {
        match self {
            SuiteEntry::Valid(case) => &case.id,
            SuiteEntry::Invalid(invalid) => &invalid.id,
        }
    }

    pub fn name(&self) -> &str {
        match self {
            SuiteEntry::Valid(case) => &case.name,
            SuiteEntry::Invalid(invalid) => &invalid.name,
        }
    }

    pub fn tags(&self) -> &[String] {
        match self {
            SuiteEntry::Valid(case) => &case.tags,
            SuiteEntry::Invalid(invalid) => &invalid.tags,
        }
    }

    /// Workflow tag for display
    pub fn workflow_tag(&self) -> &str {
        match self {
            SuiteEntry::Valid(case) => case.kind().tag(),
            SuiteEntry::Invalid(_) => "INVALID",
        }
    }
}
