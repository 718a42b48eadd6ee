//! HTTP transport
//!
//! Thin wrapper over reqwest that sends `HttpRequest` values and captures
//! status, headers, body and timing.

use reqwest::{Client, Method};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::debug;

/// HTTP transport errors
#[derive(Error, Debug)]
pub enum HttpError {
    #[error("Request failed: {0}")]
    RequestFailed(String),

    #[error("Timeout after {0} seconds")]
    Timeout(u64),

    #[error("Connection refused to {0}")]
    ConnectionRefused(String),

    #[error("Invalid URL: {0}")]
    InvalidUrl(String),
}

/// Request body
#[derive(Clone, Debug, PartialEq)]
pub enum HttpBody {
    Json(String),
    Form(Vec<(String, String)>),
}

/// HTTP request builder
#[derive(Clone, Debug)]
pub struct HttpRequest {
    pub method: String,
    pub url: String,
    pub headers: HashMap<String, String>,
    pub query: Vec<(String, String)>,
    pub body: Option<HttpBody>,
}

impl HttpRequest {
    pub fn new(method: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            method: method.into(),
            url: url.into(),
            headers: HashMap::new(),
            query: Vec::new(),
            body: None,
        }
    }

    pub fn get(url: impl Into<String>) -> Self {
        Self::new("GET", url)
    }

    pub fn post(url: impl Into<String>) -> Self {
        Self::new("POST", url)
    }

    pub fn header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(key.into(), value.into());
        self
    }

    pub fn query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((key.into(), value.into()));
        self
    }

    pub fn json(mut self, body: impl Into<String>) -> Self {
        self.body = Some(HttpBody::Json(body.into()));
        self
    }

    pub fn form(mut self, fields: Vec<(String, String)>) -> Self {
        self.body = Some(HttpBody::Form(fields));
        self
    }
}

/// HTTP response
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct HttpResponse {
    pub status_code: u16,
    pub headers: HashMap<String, String>,
    pub body: String,
    pub duration_ms: u64,
}

impl HttpResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status_code)
    }

    pub fn get_header(&self, name: &str) -> Option<&String> {
        self.headers.get(&name.to_lowercase())
    }
}

/// HTTP client bound to a base URL
#[derive(Clone)]
pub struct HttpClient {
    client: Client,
    base_url: Option<String>,
    timeout_secs: u64,
}

impl HttpClient {
    /// Create client with custom timeout
    pub fn with_timeout(timeout_secs: u64) -> Result<Self, HttpError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| HttpError::RequestFailed(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url: None,
            timeout_secs,
        })
    }

    /// Set base URL for requests
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    /// Build full URL
    pub fn build_url(&self, path: &str) -> String {
        match &self.base_url {
            Some(base) if !(path.starts_with("http://") || path.starts_with("https://")) => {
                format!("{}{}", base.trim_end_matches('/'), path)
            }
            _ => path.to_string(),
        }
    }

    /// Send HTTP request
    pub async fn send(&self, request: HttpRequest) -> Result<HttpResponse, HttpError> {
        let url = self.build_url(&request.url);
        debug!("Sending {} request to {}", request.method, url);

        let method = Method::from_bytes(request.method.as_bytes())
            .map_err(|_| HttpError::RequestFailed(format!("Invalid HTTP method {}", request.method)))?;

        let mut req_builder = self.client.request(method, &url);

        for (key, value) in &request.headers {
            req_builder = req_builder.header(key.as_str(), value.as_str());
        }

        if !request.query.is_empty() {
            req_builder = req_builder.query(&request.query);
        }

        match &request.body {
            Some(HttpBody::Json(body)) => {
                req_builder = req_builder
                    .header("Content-Type", "application/json")
                    .body(body.clone());
            }
            Some(HttpBody::Form(fields)) => {
                req_builder = req_builder.form(fields);
            }
            None => {}
        }

        let start = Instant::now();

        let response = req_builder.send().await.map_err(|e| {
            if e.is_timeout() {
                HttpError::Timeout(self.timeout_secs)
            } else if e.is_connect() {
                HttpError::ConnectionRefused(url.clone())
            } else if e.is_builder() {
                HttpError::InvalidUrl(url.clone())
            } else {
                HttpError::RequestFailed(e.to_string())
            }
        })?;

        let status = response.status();

        let mut response_headers = HashMap::new();
        for (key, value) in response.headers().iter() {
            if let Ok(v) = value.to_str() {
                response_headers.insert(key.to_string(), v.to_string());
            }
        }

        let body = response
            .text()
            .await
            .map_err(|e| HttpError::RequestFailed(format!("Failed to read response body: {e}")))?;
        let duration_ms = start.elapsed().as_millis() as u64;

        debug!(
            "Response: {} {} in {}ms",
            status.as_u16(),
            status.canonical_reason().unwrap_or(""),
            duration_ms
        );

        Ok(HttpResponse {
            status_code: status.as_u16(),
            headers: response_headers,
            body,
            duration_ms,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_http_request_builder() {
        let req = HttpRequest::get("/payments/payment-order/v2/transaction")
            .header("X-Channel", "SOBA")
            .header("X-Client-ID", "client")
            .query("fromDate", "2025-01-01");

        assert_eq!(req.method, "GET");
        assert_eq!(req.headers.len(), 2);
        assert_eq!(req.query, vec![("fromDate".to_string(), "2025-01-01".to_string())]);
        assert!(req.body.is_none());
    }

    #[test]
    fn test_json_and_form_bodies() {
        let req = HttpRequest::post("/x").json(r#"{"a":1}"#);
        assert_eq!(req.body, Some(HttpBody::Json(r#"{"a":1}"#.to_string())));

        let req = HttpRequest::post("/token").form(vec![("grant_type".into(), "client_credentials".into())]);
        assert!(matches!(req.body, Some(HttpBody::Form(ref f)) if f.len() == 1));
    }

    #[test]
    fn test_build_url() {
        let client = HttpClient::with_timeout(5)
            .unwrap()
            .base_url("https://sandbox.example.com/open/");
        assert_eq!(
            client.build_url("/payments/payment-order/v2/transaction"),
            "https://sandbox.example.com/open/payments/payment-order/v2/transaction"
        );
        assert_eq!(client.build_url("http://other/x"), "http://other/x");
    }

    #[test]
    fn test_http_response() {
        let mut headers = HashMap::new();
        headers.insert("content-type".to_string(), "application/json".to_string());
        let resp = HttpResponse {
            status_code: 200,
            headers,
            body: "{}".to_string(),
            duration_ms: 100,
        };

        assert!(resp.is_success());
        assert_eq!(resp.get_header("Content-Type").map(String::as_str), Some("application/json"));
    }

    #[tokio::test]
    async fn test_connection_refused_maps_to_error() {
        let client = HttpClient::with_timeout(2).unwrap().base_url("http://127.0.0.1:9");
        let err = client.send(HttpRequest::get("/")).await.unwrap_err();
        assert!(matches!(
            err,
            HttpError::ConnectionRefused(_) | HttpError::RequestFailed(_) | HttpError::Timeout(_)
        ));
    }
}
