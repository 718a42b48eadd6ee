//! Bearer token acquisition
//!
//! The token is fetched once per run through an OAuth client-credentials
//! grant and shared read-only by every case.

use async_trait::async_trait;
use serde_json::Value;
use std::fmt;
use std::sync::Arc;
use tracing::info;

use super::client::{HttpClient, HttpRequest};
use crate::config::ApiConfig;
use crate::error::EngineError;

/// Access token shared across a run
#[derive(Clone, PartialEq, Eq)]
pub struct BearerToken(Arc<str>);

impl BearerToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(Arc::from(token.into()))
    }

    pub fn secret(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for BearerToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "BearerToken(***)")
    }
}

/// Source of the run's bearer token
#[async_trait]
pub trait TokenSource: Send + Sync {
    async fn fetch(&self) -> Result<BearerToken, EngineError>;
}

/// OAuth client-credentials token endpoint
pub struct OAuthTokenClient {
    http: HttpClient,
    token_path: String,
    client_id: String,
    client_secret: String,
}

impl OAuthTokenClient {
    pub fn new(http: HttpClient, api: &ApiConfig) -> Self {
        Self {
            http,
            token_path: api.token_path.clone(),
            client_id: api.client_id.clone(),
            client_secret: api.client_secret.clone(),
        }
    }

    fn request(&self) -> HttpRequest {
        HttpRequest::post(&self.token_path).form(vec![
            ("client_id".to_string(), self.client_id.clone()),
            ("client_secret".to_string(), self.client_secret.clone()),
            ("grant_type".to_string(), "client_credentials".to_string()),
        ])
    }
}

/// Extract the access token from a token endpoint response
pub fn parse_token_response(status_code: u16, body: &str) -> Result<BearerToken, EngineError> {
    if status_code != 200 {
        return Err(EngineError::TokenUnavailable(format!(
            "token endpoint returned HTTP {status_code}"
        )));
    }

    let json: Value = serde_json::from_str(body)
        .map_err(|e| EngineError::TokenUnavailable(format!("invalid token response: {e}")))?;

    json.get("access_token")
        .and_then(Value::as_str)
        .filter(|token| !token.is_empty())
        .map(BearerToken::new)
        .ok_or_else(|| EngineError::TokenUnavailable("access_token missing from response".to_string()))
}

#[async_trait]
impl TokenSource for OAuthTokenClient {
    async fn fetch(&self) -> Result<BearerToken, EngineError> {
        info!("Requesting access token from {}", self.token_path);
        let response = self
            .http
            .send(self.request())
            .await
            .map_err(|e| EngineError::TokenUnavailable(e.to_string()))?;

        let token = parse_token_response(response.status_code, &response.body)?;
        info!("Access token acquired");
        Ok(token)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::client::HttpBody;

    #[test]
    fn test_parse_token_response() {
        let token = parse_token_response(200, r#"{"access_token":"abc","expires_in":300}"#).unwrap();
        assert_eq!(token.secret(), "abc");
        assert_eq!(format!("{:?}", token), "BearerToken(***)");
    }

    #[test]
    fn test_parse_token_failures() {
        assert!(matches!(
            parse_token_response(401, r#"{"error":"unauthorized_client"}"#),
            Err(EngineError::TokenUnavailable(_))
        ));
        assert!(matches!(
            parse_token_response(200, r#"{"token_type":"bearer"}"#),
            Err(EngineError::TokenUnavailable(_))
        ));
        assert!(matches!(
            parse_token_response(200, "<html>"),
            Err(EngineError::TokenUnavailable(_))
        ));
    }

    #[test]
    fn test_token_request_is_form_grant() {
        let api = ApiConfig {
            client_id: "id".to_string(),
            client_secret: "secret".to_string(),
            ..ApiConfig::default()
        };
        let client = OAuthTokenClient::new(HttpClient::with_timeout(5).unwrap(), &api);
        let request = client.request();

        assert_eq!(request.method, "POST");
        assert_eq!(request.url, api.token_path);
        match request.body {
            Some(HttpBody::Form(fields)) => {
                assert!(fields.contains(&("grant_type".to_string(), "client_credentials".to_string())));
                assert!(fields.contains(&("client_id".to_string(), "id".to_string())));
            }
            other => panic!("unexpected body {:?}", other),
        }
    }
}
