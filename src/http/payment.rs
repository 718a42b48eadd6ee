//! Payment platform API
//!
//! Four logical calls: create a transaction, query transaction history,
//! create a bulk transaction and query bulk history. Every call carries the
//! bearer token and the channel, client, provider and request id headers.

use async_trait::async_trait;
use serde_json::Value;
use tracing::{debug, warn};
use uuid::Uuid;

use super::client::{HttpClient, HttpRequest, HttpResponse};
use super::token::BearerToken;
use crate::config::ApiConfig;
use crate::error::EngineError;
use crate::models::DateRange;

/// One logical call to the payment platform
#[derive(Clone, Debug, PartialEq)]
pub enum ApiCall {
    CreateTransaction(Value),
    QueryTransactions {
        trace_number: String,
        range: DateRange,
    },
    CreateBulk(Value),
    QueryBulk {
        bulk_trace_number: String,
        range: DateRange,
    },
}

impl ApiCall {
    pub fn label(&self) -> &'static str {
        match self {
            ApiCall::CreateTransaction(_) => "create transaction",
            ApiCall::QueryTransactions { .. } => "query transactions",
            ApiCall::CreateBulk(_) => "create bulk transaction",
            ApiCall::QueryBulk { .. } => "query bulk transactions",
        }
    }

    /// Request document or query parameters, for diagnostics
    pub fn describe(&self) -> Value {
        match self {
            ApiCall::CreateTransaction(doc) | ApiCall::CreateBulk(doc) => doc.clone(),
            ApiCall::QueryTransactions {
                trace_number,
                range,
            } => serde_json::json!({
                "transactionTraceNumber": trace_number,
                "fromDate": range.from_param(),
                "toDate": range.to_param(),
            }),
            ApiCall::QueryBulk {
                bulk_trace_number,
                range,
            } => serde_json::json!({
                "bulkTraceNumber": bulk_trace_number,
                "fromDate": range.from_param(),
                "toDate": range.to_param(),
            }),
        }
    }
}

/// Response of a payment platform call
#[derive(Clone, Debug, PartialEq)]
pub struct ApiResponse {
    pub status_code: u16,
    /// Parsed body; `Null` when the body is not JSON
    pub body: Value,
    pub raw_body: String,
    pub duration_ms: u64,
}

impl ApiResponse {
    #[cfg(test)]
    pub fn new(status_code: u16, body: Value) -> Self {
        Self {
            status_code,
            raw_body: body.to_string(),
            body,
            duration_ms: 0,
        }
    }

    pub fn from_http(response: HttpResponse) -> Self {
        let body = serde_json::from_str(&response.body).unwrap_or(Value::Null);
        Self {
            status_code: response.status_code,
            body,
            raw_body: response.body,
            duration_ms: response.duration_ms,
        }
    }
}

/// Remote payment platform
#[async_trait]
pub trait PaymentApi: Send + Sync {
    async fn execute(&self, token: &BearerToken, call: &ApiCall) -> Result<ApiResponse, EngineError>;
}

/// reqwest-backed payment platform client
pub struct PaymentClient {
    http: HttpClient,
    api: ApiConfig,
}

impl PaymentClient {
    pub fn new(http: HttpClient, api: ApiConfig) -> Self {
        Self { http, api }
    }

    /// HTTP request for a call, headers included
    pub fn request_for(&self, call: &ApiCall, token: &BearerToken) -> HttpRequest {
        let api = &self.api;
        let ids = &api.provider_ids;

        let (request, provider) = match call {
            ApiCall::CreateTransaction(document) => (
                HttpRequest::post(&api.transaction_path).json(document.to_string()),
                &ids.create,
            ),
            ApiCall::QueryTransactions {
                trace_number,
                range,
            } => (
                HttpRequest::get(&api.transaction_path)
                    .query("transactionTraceNumber", trace_number)
                    .query("fromDate", range.from_param())
                    .query("toDate", range.to_param()),
                &ids.query,
            ),
            ApiCall::CreateBulk(document) => (
                HttpRequest::post(&api.bulk_transaction_path).json(document.to_string()),
                &ids.bulk_create,
            ),
            ApiCall::QueryBulk {
                bulk_trace_number,
                range,
            } => (
                HttpRequest::get(&api.bulk_transaction_path)
                    .query("bulkTraceNumber", bulk_trace_number)
                    .query("fromDate", range.from_param())
                    .query("toDate", range.to_param()),
                &ids.bulk_query,
            ),
        };

        request
            .header("Authorization", format!("Bearer {}", token.secret()))
            .header("X-Channel", &api.channel)
            .header("X-Client-ID", &api.client_id)
            .header("X-Provider-ID", provider)
            .header("X-Request-ID", Uuid::new_v4().to_string())
    }
}

#[async_trait]
impl PaymentApi for PaymentClient {
    async fn execute(&self, token: &BearerToken, call: &ApiCall) -> Result<ApiResponse, EngineError> {
        let request = self.request_for(call, token);
        let endpoint = format!("{} {}", request.method, self.http.build_url(&request.url));
        debug!("Calling {} ({})", call.label(), endpoint);

        let response = self
            .http
            .send(request)
            .await
            .map_err(|e| EngineError::NetworkFailure {
                endpoint,
                message: e.to_string(),
            })?;

        debug!(
            "{} returned HTTP {}: {}",
            call.label(),
            response.status_code,
            response.body
        );
        if !response.is_success() {
            warn!(
                "{} returned HTTP {} ({})",
                call.label(),
                response.status_code,
                response.get_header("content-type").map(String::as_str).unwrap_or("no content type")
            );
        }
        Ok(ApiResponse::from_http(response))
    }
}
