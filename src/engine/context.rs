//! Per-run shared state

use std::sync::Arc;

use super::builder::RequestBuilder;
use super::cache::ResponseCache;
use crate::config::WorkflowSettings;
use crate::http::{BearerToken, PaymentApi};
use crate::signing::SignatureService;
use crate::store::TemplateStore;

/// Everything a handler needs, shared by all cases of one run
#[derive(Clone)]
pub struct RunContext {
    pub token: BearerToken,
    pub api: Arc<dyn PaymentApi>,
    pub templates: Arc<dyn TemplateStore>,
    pub signer: Arc<SignatureService>,
    pub cache: Arc<ResponseCache>,
    pub settings: Arc<WorkflowSettings>,
}

impl RunContext {
    pub fn new(
        token: BearerToken,
        api: Arc<dyn PaymentApi>,
        templates: Arc<dyn TemplateStore>,
        signer: Arc<SignatureService>,
        settings: WorkflowSettings,
    ) -> Self {
        Self {
            token,
            api,
            templates,
            signer,
            cache: Arc::new(ResponseCache::new()),
            settings: Arc::new(settings),
        }
    }

    pub fn builder(&self) -> RequestBuilder<'_> {
        RequestBuilder::new(self.templates.as_ref(), self.signer.as_ref())
    }
}
