//! Engine error taxonomy
//!
//! Every failure that can abort a test case is one of these variants.

use thiserror::Error;

use crate::signing::SigningError;

/// Errors raised while building, sending or validating a test case
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("Request template not found: {0}")]
    TemplateNotFound(String),

    #[error("Cannot read request template '{key}': {source}")]
    TemplateUnreadable {
        key: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Request template '{key}' is not valid JSON: {reason}")]
    InvalidTemplate { key: String, reason: String },

    #[error("Missing template field: {0}")]
    MissingTemplateField(String),

    #[error("Unknown signing identity: {0}")]
    UnknownSigningIdentity(String),

    #[error("Signing failed for authorization {identity}: {source}")]
    SigningFailure {
        identity: String,
        #[source]
        source: SigningError,
    },

    #[error("Network failure calling {endpoint}: {message}")]
    NetworkFailure { endpoint: String, message: String },

    #[error("Access token unavailable: {0}")]
    TokenUnavailable(String),

    #[error("Unexpected status code at {stage}: expected {expected}, got {actual}")]
    UnexpectedStatusCode {
        stage: String,
        expected: u16,
        actual: u16,
    },

    #[error("Field {0} not found in response")]
    FieldNotFound(String),

    #[error("Field {path} mismatch: expected '{expected}', got '{actual}'")]
    AssertionMismatch {
        path: String,
        expected: String,
        actual: String,
    },

    #[error("Unknown workflow type: {0}")]
    UnknownWorkflowType(String),

    #[error("Invalid test case {id}: {reason}")]
    InvalidTestCase { id: String, reason: String },
}

impl EngineError {
    /// Build a signing error, lifting unknown identities into their own variant
    pub fn signing(identity: impl Into<String>, source: SigningError) -> Self {
        match source {
            SigningError::UnknownIdentity(id) => EngineError::UnknownSigningIdentity(id),
            SigningError::MissingField(path) => EngineError::MissingTemplateField(path),
            other => EngineError::SigningFailure {
                identity: identity.into(),
                source: other,
            },
        }
    }

    /// Whether the error is a failed assertion rather than an execution error
    pub fn is_assertion(&self) -> bool {
        matches!(
            self,
            EngineError::UnexpectedStatusCode { .. }
                | EngineError::FieldNotFound(_)
                | EngineError::AssertionMismatch { .. }
        )
    }

    /// Short stable name of the variant, used in reports
    pub fn kind(&self) -> &'static str {
        match self {
            EngineError::TemplateNotFound(_) => "TemplateNotFound",
            EngineError::TemplateUnreadable { .. } => "TemplateUnreadable",
            EngineError::InvalidTemplate { .. } => "InvalidTemplate",
            EngineError::MissingTemplateField(_) => "MissingTemplateField",
            EngineError::UnknownSigningIdentity(_) => "UnknownSigningIdentity",
            EngineError::SigningFailure { .. } => "SigningFailure",
            EngineError::NetworkFailure { .. } => "NetworkFailure",
            EngineError::TokenUnavailable(_) => "TokenUnavailable",
            EngineError::UnexpectedStatusCode { .. } => "UnexpectedStatusCode",
            EngineError::FieldNotFound(_) => "FieldNotFound",
            EngineError::AssertionMismatch { .. } => "AssertionMismatch",
            EngineError::UnknownWorkflowType(_) => "UnknownWorkflowType",
            EngineError::InvalidTestCase { .. } => "InvalidTestCase",
        }
    }
}
