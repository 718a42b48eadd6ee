//! Workflow handlers
//!
//! Every workflow kind has one handler with two operations: `execute` drives
//! the case through BUILD, SIGN, SEND and, for create-and-query kinds, WAIT
//! and QUERY; `validate` asserts the final response. The registry maps each
//! kind to its handler and runs a case end to end.

mod bulk;
mod create_query;
mod read_only;
mod single;

use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

use crate::engine::builder::TemplateShape;
use crate::engine::{validator, CachedExchange, RunContext};
use crate::error::EngineError;
use crate::http::{ApiCall, ApiResponse};
use crate::models::{DynamicValues, Exchange, Stage, TestCase, WorkflowKind};

pub use bulk::{BulkCreateAndQueryHandler, BulkCreateHandler};
pub use create_query::CreateAndQueryHandler;
pub use read_only::{ReadOnlyBulkQueryHandler, ReadOnlyQueryHandler};
pub use single::SingleCallHandler;

pub(crate) const TRANSACTION_STATUS: &str = "responseData.transaction.status";
pub(crate) const TRANSACTION_TRACE: &str = "responseData.transaction.transactionTraceNumber";
pub(crate) const TRANSACTIONS: &str = "responseData.transactions";
pub(crate) const FIRST_TRANSACTION_STATUS: &str = "responseData.transactions[0].status";
pub(crate) const BULK_STATUS: &str = "responseData.bulkTransaction.bulkStatus";
pub(crate) const BULK_TRACE: &str = "responseData.bulkTransaction.bulkTraceNumber";
pub(crate) const BULK_TRANSACTIONS: &str = "responseData.bulkTransactions";
pub(crate) const FIRST_BULK_STATUS: &str = "responseData.bulkTransactions[0].bulkStatus";

/// Mutable state of one case run
#[derive(Debug)]
pub struct CaseSession {
    pub values: DynamicValues,
    pub exchanges: Vec<Exchange>,
    stage: Stage,
}

impl Default for CaseSession {
    fn default() -> Self {
        Self {
            values: DynamicValues::new(),
            exchanges: Vec::new(),
            stage: Stage::Build,
        }
    }
}

impl CaseSession {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stage(&self) -> Stage {
        self.stage
    }

    pub fn enter(&mut self, stage: Stage) {
        debug!("{} -> {}", self.stage, stage);
        self.stage = stage;
    }

    /// Capture a request/response pair for diagnostics
    pub fn record(&mut self, label: impl Into<String>, request: Option<Value>, response: &ApiResponse) {
        let body = match (&response.body, response.raw_body.is_empty()) {
            (Value::Null, false) => Value::String(response.raw_body.clone()),
            (body, _) => body.clone(),
        };
        self.exchanges.push(Exchange {
            label: label.into(),
            request,
            status_code: response.status_code,
            response: body,
            duration_ms: response.duration_ms,
        });
    }

    /// Send a call and capture the exchange
    pub async fn send(&mut self, ctx: &RunContext, call: ApiCall) -> Result<ApiResponse, EngineError> {
        let response = ctx.api.execute(&ctx.token, &call).await?;
        self.record(call.label(), Some(call.describe()), &response);
        Ok(response)
    }
}

/// Handler contract shared by every workflow kind
#[async_trait]
pub trait WorkflowHandler: Send + Sync {
    fn kind(&self) -> WorkflowKind;

    /// Run the case up to the response that gets validated
    async fn execute(
        &self,
        ctx: &RunContext,
        case: &TestCase,
        session: &mut CaseSession,
    ) -> Result<ApiResponse, EngineError>;

    /// Assert the final response
    fn validate(
        &self,
        _ctx: &RunContext,
        case: &TestCase,
        session: &CaseSession,
        response: &ApiResponse,
    ) -> Result<(), EngineError> {
        validate_declared(case, session, response)
    }
}

/// Expected status, declared field and declared error field
pub fn validate_declared(
    case: &TestCase,
    session: &CaseSession,
    response: &ApiResponse,
) -> Result<(), EngineError> {
    validator::expect_status("final response", case.expected_status, response.status_code)?;

    if let Some(path) = &case.expected_field {
        validator::validate_field(
            &response.body,
            path,
            &session.values,
            case.expected_value.as_deref(),
        )?;
    }
    if let Some(expectation) = &case.expected_error {
        validator::validate_error(&response.body, expectation)?;
    }
    Ok(())
}

/// Build, sign and send a create call for a template
pub(crate) async fn submit_template(
    ctx: &RunContext,
    session: &mut CaseSession,
    template_key: &str,
    shape: TemplateShape,
) -> Result<CachedExchange, EngineError> {
    session.enter(Stage::Build);
    let builder = ctx.builder();
    let mut built = builder.build(template_key, shape)?;
    session.values.extend_from(&built.values);

    session.enter(Stage::Sign);
    builder.authorize(&mut built.document)?;

    session.enter(Stage::Send);
    let call = if built.bulk {
        ApiCall::CreateBulk(built.document.clone())
    } else {
        ApiCall::CreateTransaction(built.document.clone())
    };
    let response = session.send(ctx, call).await?;

    Ok(CachedExchange {
        request: built.document,
        response,
        values: built.values,
    })
}

/// Trace number echoed by a create response
///
/// Falls back to the locally generated number only when configured to.
pub(crate) fn created_trace(
    ctx: &RunContext,
    response: &ApiResponse,
    response_path: &str,
    local: Option<&str>,
) -> Result<String, EngineError> {
    match validator::extract(&response.body, response_path) {
        Ok(trace) => Ok(trace),
        Err(err) => match local {
            Some(local) if ctx.settings.fallback_to_local_trace => {
                debug!("{} missing, using local trace {}", response_path, local);
                Ok(local.to_string())
            }
            _ => Err(err),
        },
    }
}

pub(crate) fn spec_mismatch(case: &TestCase, expected: WorkflowKind) -> EngineError {
    EngineError::InvalidTestCase {
        id: case.id.clone(),
        reason: format!("{} handler cannot run a {} case", expected, case.kind()),
    }
}

/// Workflow kind to handler mapping
#[derive(Clone, Default)]
pub struct HandlerRegistry {
    handlers: HashMap<WorkflowKind, Arc<dyn WorkflowHandler>>,
}

impl HandlerRegistry {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Registry with one handler per workflow kind
    pub fn standard() -> Self {
        let mut registry = Self::empty();
        registry.register(Arc::new(SingleCallHandler));
        registry.register(Arc::new(CreateAndQueryHandler));
        registry.register(Arc::new(BulkCreateHandler));
        registry.register(Arc::new(BulkCreateAndQueryHandler));
        registry.register(Arc::new(ReadOnlyQueryHandler));
        registry.register(Arc::new(ReadOnlyBulkQueryHandler));
        registry
    }

    pub fn register(&mut self, handler: Arc<dyn WorkflowHandler>) {
        self.handlers.insert(handler.kind(), handler);
    }

    pub fn resolve(&self, kind: WorkflowKind) -> Result<Arc<dyn WorkflowHandler>, EngineError> {
        self.handlers
            .get(&kind)
            .cloned()
            .ok_or_else(|| EngineError::UnknownWorkflowType(kind.tag().to_string()))
    }

    /// Execute and validate one case
    pub async fn run(
        &self,
        ctx: &RunContext,
        case: &TestCase,
        session: &mut CaseSession,
    ) -> Result<(), EngineError> {
        let handler = self.resolve(case.kind())?;
        let response = handler.execute(ctx, case, session).await?;

        session.enter(Stage::Validate);
        handler.validate(ctx, case, session, &response)?;
        session.enter(Stage::Passed);
        Ok(())
    }
}
