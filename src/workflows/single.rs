//! Single create call; its response is the one validated

use async_trait::async_trait;
use tracing::info;

use super::{spec_mismatch, submit_template, CaseSession, WorkflowHandler};
use crate::engine::{CacheKey, RunContext, TemplateShape};
use crate::error::EngineError;
use crate::http::ApiResponse;
use crate::models::{TestCase, WorkflowKind, WorkflowSpec};

/// Memoised create call for `template_key`
///
/// The cache is keyed by template and case id, so repeated runs of the same
/// case within one run share a single network call.
pub(crate) async fn memoised_create(
    ctx: &RunContext,
    case: &TestCase,
    session: &mut CaseSession,
    template_key: &str,
    shape: TemplateShape,
) -> Result<ApiResponse, EngineError> {
    let key = CacheKey::new(template_key, &case.id);
    let (exchange, hit) = ctx
        .cache
        .get_or_try_init(key.clone(), || submit_template(ctx, session, template_key, shape))
        .await?;

    if hit {
        info!("Reusing response for {}", key);
        session.values.extend_from(&exchange.values);
        session.record(
            format!("create {} (memoised)", key),
            Some(exchange.request.clone()),
            &exchange.response,
        );
    }
    Ok(exchange.response)
}

pub struct SingleCallHandler;

#[async_trait]
impl WorkflowHandler for SingleCallHandler {
    fn kind(&self) -> WorkflowKind {
        WorkflowKind::SingleCall
    }

    async fn execute(
        &self,
        ctx: &RunContext,
        case: &TestCase,
        session: &mut CaseSession,
    ) -> Result<ApiResponse, EngineError> {
        let WorkflowSpec::SingleCall { template_key } = &case.workflow else {
            return Err(spec_mismatch(case, self.kind()));
        };
        memoised_create(ctx, case, session, template_key, TemplateShape::Auto).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Stage;
    use crate::test_support::{case, context, context_with_store, single_template, MockPaymentApi};
    use crate::store::MemoryTemplateStore;
    use crate::workflows::HandlerRegistry;
    use serde_json::json;

    fn simple_case() -> TestCase {
        case(json!({
            "testCaseId": "TC001",
            "testName": "Simple inside transfer",
            "apiType": "SINGLE_CALL",
            "requestTemplateKey": "simple-inside",
            "expectedStatusCode": 200,
            "expectedField": "responseData.transaction.status",
            "expectedValue": "ORIG"
        }))
    }

    #[tokio::test]
    async fn test_single_call_passes() {
        let api = MockPaymentApi::new().on_create(
            200,
            json!({ "responseData": { "transaction": { "status": "ORIG" } } }),
        );
        let ctx = context(api.clone());
        let mut session = CaseSession::new();

        HandlerRegistry::standard()
            .run(&ctx, &simple_case(), &mut session)
            .await
            .unwrap();

        assert_eq!(session.stage(), Stage::Passed);
        assert_eq!(api.create_calls(), 1);
        assert_eq!(session.exchanges.len(), 1);

        let sent = api.last_create().unwrap();
        let auth = &sent["requestParameters"]["authorizations"][0]["authorizationString"];
        assert!(auth.as_str().is_some_and(|s| !s.is_empty()));
        assert!(session.values.contains("requestTrace"));
    }

    #[tokio::test]
    async fn test_status_mismatch_fails_at_validate() {
        let api = MockPaymentApi::new().on_create(
            200,
            json!({ "responseData": { "transaction": { "status": "REJT" } } }),
        );
        let ctx = context(api);
        let mut session = CaseSession::new();

        let err = HandlerRegistry::standard()
            .run(&ctx, &simple_case(), &mut session)
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::AssertionMismatch { ref actual, .. } if actual == "REJT"));
        assert_eq!(session.stage(), Stage::Validate);
    }

    #[tokio::test]
    async fn test_missing_authorizations_fails_before_network() {
        let mut template = single_template("insidebank");
        template["requestParameters"]
            .as_object_mut()
            .unwrap()
            .remove("authorizations");
        let store = MemoryTemplateStore::new().with_template("simple-inside", template);

        let api = MockPaymentApi::new();
        let ctx = context_with_store(api.clone(), store);
        let mut session = CaseSession::new();

        let err = HandlerRegistry::standard()
            .run(&ctx, &simple_case(), &mut session)
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::MissingTemplateField(_)));
        assert_eq!(session.stage(), Stage::Sign);
        assert_eq!(api.total_calls(), 0);
    }

    #[tokio::test]
    async fn test_repeat_is_memoised() {
        let api = MockPaymentApi::new().on_create(
            200,
            json!({ "responseData": { "transaction": { "status": "ORIG" } } }),
        );
        let ctx = context(api.clone());
        let handler = SingleCallHandler;
        let case = simple_case();

        let mut first = CaseSession::new();
        handler.execute(&ctx, &case, &mut first).await.unwrap();
        let mut second = CaseSession::new();
        handler.execute(&ctx, &case, &mut second).await.unwrap();

        assert_eq!(api.create_calls(), 1);
        assert_eq!(first.values, second.values);
        assert!(second.exchanges[0].label.ends_with("(memoised)"));
    }
}
