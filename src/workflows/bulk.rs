//! Bulk transaction workflows

use std::time::Duration;

use async_trait::async_trait;
use tracing::info;

use super::single::memoised_create;
use super::{
    created_trace, spec_mismatch, submit_template, validate_declared, CaseSession,
    WorkflowHandler, BULK_STATUS, BULK_TRACE, BULK_TRANSACTIONS, FIRST_BULK_STATUS,
};
use crate::engine::builder::BULK_TRACE_PATH;
use crate::engine::{validator, wait, RunContext, TemplateShape};
use crate::error::EngineError;
use crate::http::{ApiCall, ApiResponse};
use crate::models::{Stage, TestCase, WorkflowKind, WorkflowSpec};

/// Dynamic key holding the bulk trace number the query was issued for
pub const QUERIED_BULK_TRACE: &str = "bulkTraceNumber";

/// Single bulk create call
pub struct BulkCreateHandler;

#[async_trait]
impl WorkflowHandler for BulkCreateHandler {
    fn kind(&self) -> WorkflowKind {
        WorkflowKind::BulkCreate
    }

    async fn execute(
        &self,
        ctx: &RunContext,
        case: &TestCase,
        session: &mut CaseSession,
    ) -> Result<ApiResponse, EngineError> {
        let WorkflowSpec::BulkCreate { template_key } = &case.workflow else {
            return Err(spec_mismatch(case, self.kind()));
        };
        let response = memoised_create(ctx, case, session, template_key, TemplateShape::Bulk).await?;
        validator::expect_status("bulk create", 200, response.status_code)?;
        validator::expect_value(&response.body, BULK_STATUS, &ctx.settings.statuses.originated)?;
        Ok(response)
    }
}

/// Bulk create, wait for completion, validate the bulk history query
pub struct BulkCreateAndQueryHandler;

#[async_trait]
impl WorkflowHandler for BulkCreateAndQueryHandler {
    fn kind(&self) -> WorkflowKind {
        WorkflowKind::BulkCreateAndQuery
    }

    async fn execute(
        &self,
        ctx: &RunContext,
        case: &TestCase,
        session: &mut CaseSession,
    ) -> Result<ApiResponse, EngineError> {
        let WorkflowSpec::BulkCreateAndQuery {
            template_key,
            wait_secs,
            window,
        } = &case.workflow
        else {
            return Err(spec_mismatch(case, self.kind()));
        };

        let created = submit_template(ctx, session, template_key, TemplateShape::Bulk).await?;
        let create = &created.response;
        validator::expect_status("bulk create", 200, create.status_code)?;
        validator::expect_value(&create.body, BULK_STATUS, &ctx.settings.statuses.originated)?;

        let trace = created_trace(ctx, create, BULK_TRACE, created.values.get(BULK_TRACE_PATH))?;
        info!("Created bulk transaction {}", trace);
        session.values.insert(QUERIED_BULK_TRACE, trace.clone());

        session.enter(Stage::Wait);
        let budget = ctx.settings.bulk_wait.resolve(*wait_secs);
        let call = ApiCall::QueryBulk {
            bulk_trace_number: trace,
            range: window.resolve(),
        };
        let completed = &ctx.settings.statuses.bulk_settled;

        let outcome = wait::settle(
            Duration::from_secs(budget),
            ctx.settings.wait_strategy,
            || ctx.api.execute(&ctx.token, &call),
            |response| {
                validator::extract(&response.body, FIRST_BULK_STATUS)
                    .is_ok_and(|status| &status == completed)
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
        validator::expect_status("bulk query", case.expected_status, response.status_code)?;
        validator::require_non_empty_list(&response.body, BULK_TRANSACTIONS)?;
        validator::expect_value(&response.body, FIRST_BULK_STATUS, &ctx.settings.statuses.bulk_settled)?;
        validate_declared(case, session, response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::builder::REQUEST_TRACE;
    use crate::test_support::{bulk_template, case, context_with_store, MockPaymentApi};
    use crate::store::MemoryTemplateStore;
    use crate::workflows::HandlerRegistry;
    use serde_json::json;

    fn bulk_created(trace: &str) -> serde_json::Value {
        json!({ "responseData": { "bulkTransaction": { "bulkStatus": "ORIG", "bulkTraceNumber": trace } } })
    }

    #[tokio::test]
    async fn test_bulk_create_passes_and_checks_echo() {
        let store = MemoryTemplateStore::new()
            .with_template("bulk-mixed", bulk_template(&["insidebank", "ibft"]));
        let api = MockPaymentApi::new().on_bulk_create(
            200,
            json!({ "responseData": { "bulkTransaction": { "bulkStatus": "ORIG" } } }),
        );
        let ctx = context_with_store(api.clone(), store);
        let case = case(json!({
            "testCaseId": "TC020",
            "apiType": "BULK_TRANSACTION",
            "requestTemplateKey": "bulk-mixed",
            "expectedField": "responseData.bulkTransaction.bulkStatus",
            "expectedValue": "ORIG"
        }));
        let mut session = CaseSession::new();

        HandlerRegistry::standard().run(&ctx, &case, &mut session).await.unwrap();
        assert_eq!(api.bulk_create_calls(), 1);
        assert_eq!(session.stage(), Stage::Passed);

        let sent = api.last_bulk_create().unwrap();
        assert!(sent["requestParameters"]["data"]["bulkTraceNumber"]
            .as_str()
            .is_some_and(|t| t.starts_with("pika")));
        assert!(session.values.contains(REQUEST_TRACE));
    }

    #[tokio::test]
    async fn test_bulk_create_echo_mismatch() {
        let store = MemoryTemplateStore::new()
            .with_template("bulk-mixed", bulk_template(&["citad"]));
        let api = MockPaymentApi::new().on_bulk_create(
            200,
            json!({
                "requestTrace": "not-what-we-sent",
                "responseData": { "bulkTransaction": { "bulkStatus": "ORIG" } }
            }),
        );
        let ctx = context_with_store(api, store);
        let case = case(json!({
            "testCaseId": "TC021",
            "apiType": "BULK_TRANSACTION",
            "requestTemplateKey": "bulk-mixed",
            "expectedField": "requestTrace"
        }));
        let mut session = CaseSession::new();

        let err = HandlerRegistry::standard().run(&ctx, &case, &mut session).await.unwrap_err();
        assert!(matches!(err, EngineError::AssertionMismatch { ref path, .. } if path == "requestTrace"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_bulk_create_and_query() {
        let store = MemoryTemplateStore::new()
            .with_template("bulk-mixed", bulk_template(&["insidebank", "insidebank"]));
        let api = MockPaymentApi::new()
            .on_bulk_create(200, bulk_created("pika0123456789"))
            .on_bulk_query(200, json!({ "responseData": { "bulkTransactions": [{ "bulkStatus": "PROC" }] } }))
            .on_bulk_query(200, json!({ "responseData": { "bulkTransactions": [{ "bulkStatus": "COMP" }] } }));
        let ctx = context_with_store(api.clone(), store);
        let case = case(json!({
            "testCaseId": "TC030",
            "apiType": "CREATE_AND_QUERY_BULK",
            "requestTemplateKey": "bulk-mixed",
            "waitTime": 30
        }));
        let mut session = CaseSession::new();

        HandlerRegistry::standard().run(&ctx, &case, &mut session).await.unwrap();
        assert_eq!(api.bulk_query_calls(), 2);
        assert_eq!(api.last_queried_trace().as_deref(), Some("pika0123456789"));
        assert_eq!(session.values.get(QUERIED_BULK_TRACE), Some("pika0123456789"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_bulk_never_completes() {
        let store = MemoryTemplateStore::new()
            .with_template("bulk-mixed", bulk_template(&["ibft"]));
        let api = MockPaymentApi::new()
            .on_bulk_create(200, bulk_created("pika0123456789"))
            .on_bulk_query(200, json!({ "responseData": { "bulkTransactions": [{ "bulkStatus": "PROC" }] } }));
        let ctx = context_with_store(api.clone(), store);
        let case = case(json!({
            "testCaseId": "TC031",
            "apiType": "CREATE_AND_QUERY_BULK",
            "requestTemplateKey": "bulk-mixed",
            "waitTime": 10
        }));
        let mut session = CaseSession::new();

        let err = HandlerRegistry::standard().run(&ctx, &case, &mut session).await.unwrap_err();
        assert!(matches!(err, EngineError::AssertionMismatch { ref actual, .. } if actual == "PROC"));
        assert_eq!(api.bulk_query_calls(), 2);
    }
}
