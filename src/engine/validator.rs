//! Response field validation
//!
//! Paths are dotted with optional `[n]` indices (`responseData.transactions[0].status`).
//! A field step applied to a list projects over its elements, so
//! `responseData.bulkTransactions.bulkStatus` yields a list of statuses.

use serde_json::Value;
use tracing::{debug, info};

use crate::error::EngineError;
use crate::models::{value_text, DynamicValues, ErrorExpectation};

#[derive(Debug, Clone, PartialEq)]
enum Step {
    Field(String),
    Index(i64),
}

fn parse_path(path: &str) -> Option<Vec<Step>> {
    let mut steps = Vec::new();
    for segment in path.split('.') {
        let (name, mut rest) = match segment.find('[') {
            Some(pos) => segment.split_at(pos),
            None => (segment, ""),
        };
        if !name.is_empty() {
            steps.push(Step::Field(name.to_string()));
        }
        while !rest.is_empty() {
            let close = rest.find(']')?;
            let index = rest.get(1..close)?.trim().parse().ok()?;
            steps.push(Step::Index(index));
            rest = &rest[close + 1..];
            if !rest.is_empty() && !rest.starts_with('[') {
                return None;
            }
        }
    }
    (!steps.is_empty()).then_some(steps)
}

fn apply(value: &Value, step: &Step) -> Option<Value> {
    match (step, value) {
        (Step::Field(name), Value::Object(map)) => map.get(name).cloned(),
        (Step::Field(name), Value::Array(items)) => Some(Value::Array(
            items
                .iter()
                .map(|item| item.get(name).cloned().unwrap_or(Value::Null))
                .collect(),
        )),
        (Step::Index(i), Value::Array(items)) => {
            let len = items.len() as i64;
            let index = if *i < 0 { len + i } else { *i };
            usize::try_from(index).ok().and_then(|ix| items.get(ix)).cloned()
        }
        _ => None,
    }
}

/// Resolve a dotted path; `None` when any step is absent
pub fn resolve(body: &Value, path: &str) -> Option<Value> {
    let steps = parse_path(path)?;
    let mut current = body.clone();
    for step in &steps {
        current = apply(&current, step)?;
    }
    Some(current)
}

/// Extract a field as text, taking the first element when it is a list
pub fn extract(body: &Value, path: &str) -> Result<String, EngineError> {
    let not_found = || EngineError::FieldNotFound(path.to_string());
    match resolve(body, path) {
        Some(Value::Array(items)) => {
            debug!("Field {} resolved to a list of {}", path, items.len());
            items.first().and_then(value_text).ok_or_else(not_found)
        }
        Some(value) => value_text(&value).ok_or_else(not_found),
        None => Err(not_found()),
    }
}

/// Fail unless `path` is a non-empty list
pub fn require_non_empty_list(body: &Value, path: &str) -> Result<usize, EngineError> {
    match resolve(body, path) {
        Some(Value::Array(items)) if !items.is_empty() => Ok(items.len()),
        _ => Err(EngineError::FieldNotFound(path.to_string())),
    }
}

/// Assert the HTTP status of a stage
pub fn expect_status(stage: &str, expected: u16, actual: u16) -> Result<(), EngineError> {
    if expected == actual {
        Ok(())
    } else {
        Err(EngineError::UnexpectedStatusCode {
            stage: stage.to_string(),
            expected,
            actual,
        })
    }
}

/// Assert that a field equals a fixed value
pub fn expect_value(body: &Value, path: &str, expected: &str) -> Result<(), EngineError> {
    let actual = extract(body, path)?;
    if actual == expected {
        Ok(())
    } else {
        Err(EngineError::AssertionMismatch {
            path: path.to_string(),
            expected: expected.to_string(),
            actual,
        })
    }
}

/// Validate a declared field
///
/// The field must exist. A value generated during the run for the same path
/// takes precedence over the static expectation; with neither, presence is
/// the whole check. Returns the actual value.
pub fn validate_field(
    body: &Value,
    path: &str,
    dynamic: &DynamicValues,
    expected: Option<&str>,
) -> Result<String, EngineError> {
    let actual = extract(body, path)?;

    let (expected, source) = match (dynamic.get(path), expected) {
        (Some(generated), _) => (generated, "request value"),
        (None, Some(fixed)) => (fixed, "expected value"),
        (None, None) => {
            info!("Field {} present with value '{}'", path, actual);
            return Ok(actual);
        }
    };

    if actual != expected {
        return Err(EngineError::AssertionMismatch {
            path: path.to_string(),
            expected: expected.to_string(),
            actual,
        });
    }
    info!("Field {} matches {} '{}'", path, source, actual);
    Ok(actual)
}

/// Validate an expected error field and, when declared, its message
pub fn validate_error(body: &Value, expectation: &ErrorExpectation) -> Result<(), EngineError> {
    match &expectation.message {
        Some(message) => expect_value(body, &expectation.field, message),
        None => extract(body, &expectation.field).map(|_| ()),
    }
}
