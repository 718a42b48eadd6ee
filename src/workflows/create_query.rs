//! Create a transaction, wait for settlement, validate the history query

use std::time::Duration;

use async_trait::async_trait;
use tracing::info;

use super::{
    created_trace, spec_mismatch, submit_template, validate_declared, CaseSession,
    WorkflowHandler, FIRST_TRANSACTION_STATUS, TRANSACTIONS, TRANSACTION_STATUS,
    TRANSACTION_TRACE,
};
use crate::engine::builder::SINGLE_TRACE_PATH;
use crate::engine::{validator, wait, RunContext, TemplateShape};
use crate::error::EngineError;
use crate::http::{ApiCall, ApiResponse};
use crate::models::{Stage, TestCase, WorkflowKind, WorkflowSpec};

/// Dynamic key holding the trace number the query was issued for
pub const QUERIED_TRACE: &str = "transactionTraceNumber";

pub struct CreateAndQueryHandler;

#[async_trait]
impl WorkflowHandler for CreateAndQueryHandler {
    fn kind(&self) -> WorkflowKind {
        WorkflowKind::CreateAndQuery
    }

    async fn execute(
        &self,
        ctx: &RunContext,
        case: &TestCase,
        session: &mut CaseSession,
    ) -> Result<ApiResponse, EngineError> {
        let WorkflowSpec::CreateAndQuery {
            template_key,
            wait_secs,
            window,
        } = &case.workflow
        else {
            return Err(spec_mismatch(case, self.kind()));
        };

        let created = submit_template(ctx, session, template_key, TemplateShape::Single).await?;
        let create = &created.response;
        validator::expect_status("create", 200, create.status_code)?;
        validator::expect_value(&create.body, TRANSACTION_STATUS, &ctx.settings.statuses.originated)?;

        let trace = created_trace(
            ctx,
            create,
            TRANSACTION_TRACE,
            created.values.get(SINGLE_TRACE_PATH),
        )?;
        info!("Created transaction {}", trace);
        session.values.insert(QUERIED_TRACE, trace.clone());

        session.enter(Stage::Wait);
        let budget = ctx.settings.single_wait.resolve(*wait_secs);
        let call = ApiCall::QueryTransactions {
            trace_number: trace,
            range: window.resolve(),
        };
        let settled = &ctx.settings.statuses.settled;

        let outcome = wait::settle(
            Duration::from_secs(budget),
            ctx.settings.wait_strategy,
            || ctx.api.execute(&ctx.token, &call),
            |response| {
                validator::extract(&response.body, FIRST_TRANSACTION_STATUS)
                    .is_ok_and(|status| &status == settled)
            },
        )
        .await
        .inspect_err(|_| session.enter(Stage::Query))?;

        session.enter(Stage::Query);
        session.record(
            outcome.label(call.label()),
            Some(call.describe()),
            &outcome.response,
        );
        Ok(outcome.response)
    }

    fn validate(
        &self,
        ctx: &RunContext,
        case: &TestCase,
        session: &CaseSession,
        response: &ApiResponse,
    ) -> Result<(), EngineError> {
        validator::expect_status("query", case.expected_status, response.status_code)?;
        validator::require_non_empty_list(&response.body, TRANSACTIONS)?;
        validator::expect_value(&response.body, FIRST_TRANSACTION_STATUS, &ctx.settings.statuses.settled)?;
        validate_declared(case, session, response)
    }
}
