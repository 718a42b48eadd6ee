//! Request builder
//!
//! Turns a stored template into an outgoing request document: stamps the
//! run identifiers, derives trace numbers and fills every authorization
//! entry with a signature. Each generated value is also recorded in the
//! case's `DynamicValues` under the dotted path it occupies.

use chrono::Local;
use rand::Rng;
use serde_json::{Map, Value};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::EngineError;
use crate::models::DynamicValues;
use crate::signing::SignatureService;
use crate::store::TemplateStore;

pub const REQUEST_TRACE: &str = "requestTrace";
pub const REQUEST_DATE_TIME: &str = "requestDateTime";
pub const SINGLE_TRACE_PATH: &str = "requestParameters.data.transaction.transactionTraceNumber";
pub const BULK_TRACE_PATH: &str = "requestParameters.data.bulkTraceNumber";

const BULK_TRACE_PREFIX: &str = "pika";
const TRACE_DIGITS: usize = 10;

/// Which transaction layout a template must have
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TemplateShape {
    /// Bulk when `requestParameters.data.transactions` exists
    Auto,
    Single,
    Bulk,
}

/// Request document ready to be signed
#[derive(Clone, Debug)]
pub struct BuiltRequest {
    pub document: Value,
    pub values: DynamicValues,
    pub bulk: bool,
}

/// Trace number prefix for a transaction type
pub fn trace_prefix(transaction_type: &str) -> &'static str {
    match transaction_type.to_lowercase().as_str() {
        "insidebank" => "inside",
        "ibft" => "ibft",
        "citad" => "citad",
        _ => {
            warn!(
                "Unknown transactionType: '{}', using default prefix 'unknown'",
                transaction_type
            );
            "unknown"
        }
    }
}

/// Fixed-length string of random decimal digits
pub fn random_digits(len: usize) -> String {
    let mut rng = rand::rng();
    (0..len)
        .map(|_| char::from(b'0' + rng.random_range(0..10u8)))
        .collect()
}

fn timestamp() -> String {
    Local::now().format("%Y-%m-%dT%H:%M:%S%.3f%:z").to_string()
}

fn object_at<'v>(value: &'v mut Value, path: &str) -> Result<&'v mut Map<String, Value>, EngineError> {
    value
        .as_object_mut()
        .ok_or_else(|| EngineError::MissingTemplateField(path.to_string()))
}

fn child_object<'v>(
    parent: &'v mut Map<String, Value>,
    key: &str,
    path: &str,
) -> Result<&'v mut Map<String, Value>, EngineError> {
    parent
        .get_mut(key)
        .and_then(Value::as_object_mut)
        .ok_or_else(|| EngineError::MissingTemplateField(path.to_string()))
}

fn transaction_type(transaction: &Map<String, Value>) -> &str {
    transaction
        .get("transactionType")
        .and_then(Value::as_str)
        .unwrap_or("")
}

/// Builds signed request documents from templates
pub struct RequestBuilder<'a> {
    templates: &'a dyn TemplateStore,
    signer: &'a SignatureService,
}

impl<'a> RequestBuilder<'a> {
    pub fn new(templates: &'a dyn TemplateStore, signer: &'a SignatureService) -> Self {
        Self { templates, signer }
    }

    /// Copy the template and stamp identifiers and trace numbers
    pub fn build(&self, template_key: &str, shape: TemplateShape) -> Result<BuiltRequest, EngineError> {
        let mut document = self.templates.template(template_key)?;
        let mut values = DynamicValues::new();

        let root = document
            .as_object_mut()
            .ok_or_else(|| EngineError::InvalidTemplate {
                key: template_key.to_string(),
                reason: "template root is not an object".to_string(),
            })?;

        let request_trace = Uuid::new_v4().to_string();
        let request_date_time = timestamp();
        root.insert(REQUEST_TRACE.to_string(), Value::String(request_trace.clone()));
        root.insert(REQUEST_DATE_TIME.to_string(), Value::String(request_date_time.clone()));
        values.insert(REQUEST_TRACE, request_trace);
        values.insert(REQUEST_DATE_TIME, request_date_time);

        let params = child_object(root, "requestParameters", "requestParameters")?;
        let data = child_object(params, "data", "requestParameters.data")?;

        let bulk = match shape {
            TemplateShape::Auto => data.contains_key("transactions"),
            TemplateShape::Single => false,
            TemplateShape::Bulk => true,
        };

        if bulk {
            stamp_bulk(data, &mut values)?;
        } else {
            stamp_single(data, &mut values)?;
        }

        info!(
            "Built request from template {} ({})",
            template_key,
            if bulk { "bulk" } else { "single" }
        );
        Ok(BuiltRequest {
            document,
            values,
            bulk,
        })
    }

    /// Fill `authorizationString` of every authorization entry
    ///
    /// Returns the number of signatures written.
    pub fn authorize(&self, document: &mut Value) -> Result<usize, EngineError> {
        let ids = authorization_ids(document)?;

        let mut signatures = Vec::with_capacity(ids.len());
        for id in &ids {
            info!("Generating authorizationString for authorizationId: {}", id);
            let signature = self
                .signer
                .sign(document, id)
                .map_err(|e| EngineError::signing(id.as_str(), e))?;
            signatures.push(signature);
        }

        if let Some(Value::Array(entries)) = document.pointer_mut("/requestParameters/authorizations") {
            for (entry, signature) in entries.iter_mut().zip(signatures) {
                if let Value::Object(entry) = entry {
                    entry.insert("authorizationString".to_string(), Value::String(signature));
                }
            }
        }

        debug!("Signed request document: {}", document);
        Ok(ids.len())
    }
}

fn authorization_ids(document: &Value) -> Result<Vec<String>, EngineError> {
    let entries = document
        .pointer("/requestParameters/authorizations")
        .and_then(Value::as_array)
        .ok_or_else(|| EngineError::MissingTemplateField("requestParameters.authorizations".to_string()))?;

    entries
        .iter()
        .enumerate()
        .map(|(i, entry)| {
            entry
                .get("authorizationId")
                .and_then(Value::as_str)
                .map(str::to_string)
                .ok_or_else(|| {
                    EngineError::MissingTemplateField(format!(
                        "requestParameters.authorizations[{i}].authorizationId"
                    ))
                })
        })
        .collect()
}

fn stamp_single(data: &mut Map<String, Value>, values: &mut DynamicValues) -> Result<(), EngineError> {
    let transaction = child_object(data, "transaction", "requestParameters.data.transaction")?;
    let trace = format!(
        "{}{}",
        trace_prefix(transaction_type(transaction)),
        random_digits(TRACE_DIGITS)
    );
    transaction.insert("transactionTraceNumber".to_string(), Value::String(trace.clone()));
    debug!("Generated transactionTraceNumber: {}", trace);
    values.insert(SINGLE_TRACE_PATH, trace);
    Ok(())
}

fn stamp_bulk(data: &mut Map<String, Value>, values: &mut DynamicValues) -> Result<(), EngineError> {
    let bulk_trace = format!("{}{}", BULK_TRACE_PREFIX, random_digits(TRACE_DIGITS));
    data.insert("bulkTraceNumber".to_string(), Value::String(bulk_trace.clone()));
    info!("Generated bulkTraceNumber: {}", bulk_trace);
    values.insert(BULK_TRACE_PATH, bulk_trace);

    let transactions = data
        .get_mut("transactions")
        .and_then(Value::as_array_mut)
        .ok_or_else(|| EngineError::MissingTemplateField("requestParameters.data.transactions".to_string()))?;

    for (i, entry) in transactions.iter_mut().enumerate() {
        let path = format!("requestParameters.data.transactions[{i}]");
        let transaction = object_at(entry, &path)?;
        let trace = format!(
            "{}{}",
            trace_prefix(transaction_type(transaction)),
            random_digits(TRACE_DIGITS)
        );
        transaction.insert("transactionTraceNumber".to_string(), Value::String(trace.clone()));
        debug!("Generated transactionTraceNumber: {}", trace);
        values.insert(format!("{path}.transactionTraceNumber"), trace);
    }
    Ok(())
}
