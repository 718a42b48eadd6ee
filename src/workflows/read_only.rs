//! Queries for transactions created outside the run

use async_trait::async_trait;

use super::bulk::QUERIED_BULK_TRACE;
use super::create_query::QUERIED_TRACE;
use super::{spec_mismatch, CaseSession, WorkflowHandler};
use crate::engine::RunContext;
use crate::error::EngineError;
use crate::http::{ApiCall, ApiResponse};
use crate::models::{Stage, TestCase, WorkflowKind, WorkflowSpec};

pub struct ReadOnlyQueryHandler;

#[async_trait]
impl WorkflowHandler for ReadOnlyQueryHandler {
    fn kind(&self) -> WorkflowKind {
        WorkflowKind::ReadOnlyQuery
    }

    async fn execute(
        &self,
        ctx: &RunContext,
        case: &TestCase,
        session: &mut CaseSession,
    ) -> Result<ApiResponse, EngineError> {
        let WorkflowSpec::ReadOnlyQuery {
            trace_number,
            window,
        } = &case.workflow
        else {
            return Err(spec_mismatch(case, self.kind()));
        };

        session.values.insert(QUERIED_TRACE, trace_number.as_str());
        session.enter(Stage::Send);
        let call = ApiCall::QueryTransactions {
            trace_number: trace_number.clone(),
            range: window.resolve(),
        };
        session.send(ctx, call).await
    }
}

pub struct ReadOnlyBulkQueryHandler;

#[async_trait]
impl WorkflowHandler for ReadOnlyBulkQueryHandler {
    fn kind(&self) -> WorkflowKind {
        WorkflowKind::ReadOnlyBulkQuery
    }

    async fn execute(
        &self,
        ctx: &RunContext,
        case: &TestCase,
        session: &mut CaseSession,
    ) -> Result<ApiResponse, EngineError> {
        let WorkflowSpec::ReadOnlyBulkQuery {
            bulk_trace_number,
            window,
        } = &case.workflow
        else {
            return Err(spec_mismatch(case, self.kind()));
        };

        session.values.insert(QUERIED_BULK_TRACE, bulk_trace_number.as_str());
        session.enter(Stage::Send);
        let call = ApiCall::QueryBulk {
            bulk_trace_number: bulk_trace_number.clone(),
            range: window.resolve(),
        };
        session.send(ctx, call).await
    }
}
