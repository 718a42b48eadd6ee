//! Request payload signing
//!
//! The signed plaintext is the lowercase hex SHA-256 of the base64 encoded
//! canonical `requestParameters.data` JSON. The plaintext is encoded as
//! UTF-16LE and wrapped in a CMS SignedData envelope.

pub mod der;
pub mod envelope;
pub mod identity;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use chrono::Utc;
use serde_json::Value;
use sha2::{Digest, Sha256};
use thiserror::Error;
use tracing::debug;

pub use identity::{IdentityConfig, IdentityRegistry, KeySource};

/// Signing errors
#[derive(Error, Debug)]
pub enum SigningError {
    #[error("Missing field {0} in request document")]
    MissingField(String),

    #[error("Unknown authorization identity: {0}")]
    UnknownIdentity(String),

    #[error("Invalid key material: {0}")]
    KeyMaterial(String),

    #[error("Cannot read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Cryptographic operation failed: {0}")]
    Crypto(#[from] openssl::error::ErrorStack),

    #[error("Cannot serialize request data: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Canonical JSON text of `requestParameters.data`, keys in document order
pub fn canonical_data(document: &Value) -> Result<String, SigningError> {
    let data = document
        .pointer("/requestParameters/data")
        .ok_or_else(|| SigningError::MissingField("requestParameters.data".to_string()))?;
    Ok(serde_json::to_string(data)?)
}

/// Text that gets signed for a request document
pub fn signing_plaintext(document: &Value) -> Result<String, SigningError> {
    let canonical = canonical_data(document)?;
    let encoded = STANDARD.encode(canonical.as_bytes());
    let digest = Sha256::digest(encoded.as_bytes());
    Ok(format!("{:x}", digest))
}

fn utf16_le(text: &str) -> Vec<u8> {
    text.encode_utf16().flat_map(u16::to_le_bytes).collect()
}

/// Signs request documents with configured identities
pub struct SignatureService {
    identities: IdentityRegistry,
}

impl SignatureService {
    pub fn new(identities: IdentityRegistry) -> Self {
        Self { identities }
    }

    pub fn from_configs(configs: &[IdentityConfig]) -> Self {
        Self::new(IdentityRegistry::from_configs(configs))
    }

    pub fn identities(&self) -> &IdentityRegistry {
        &self.identities
    }

    /// Produce the base64 signature string for `document`
    pub fn sign(&self, document: &Value, authorization_id: &str) -> Result<String, SigningError> {
        let plaintext = signing_plaintext(document)?;
        let identity = self.identities.resolve(authorization_id)?;

        let envelope = envelope::signed_data(&utf16_le(&plaintext), &identity, Utc::now())?;
        debug!(
            "Signed payload for {} ({} byte envelope)",
            authorization_id,
            envelope.len()
        );
        Ok(STANDARD.encode(envelope))
    }
}
