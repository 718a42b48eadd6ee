//! Signing identities
//!
//! An identity is a certificate, its optional chain and the matching private
//! key. Identities are declared in configuration under their authorization id
//! and loaded lazily on first use.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

use openssl::pkcs12::Pkcs12;
use openssl::pkey::{PKey, Private};
use openssl::x509::X509;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::SigningError;

/// Where an identity's key material lives
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum KeySource {
    /// Certificate (PEM or DER) plus a PEM private key
    Pem {
        certificate: PathBuf,
        #[serde(default)]
        chain: Vec<PathBuf>,
        private_key: PathBuf,
        #[serde(default)]
        password: Option<String>,
    },
    /// PKCS#12 keystore holding key, certificate and chain
    Pkcs12 { keystore: PathBuf, password: String },
}

/// Configured identity
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct IdentityConfig {
    pub authorization_id: String,
    pub source: KeySource,
}

/// Key material ready for signing
#[derive(Clone)]
pub struct LoadedIdentity {
    pub certificate: X509,
    pub chain: Vec<X509>,
    pub private_key: PKey<Private>,
}

impl std::fmt::Debug for LoadedIdentity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoadedIdentity")
            .field("subject", &self.certificate.subject_name())
            .field("chain", &self.chain.len())
            .finish_non_exhaustive()
    }
}

fn read_file(path: &Path) -> Result<Vec<u8>, SigningError> {
    std::fs::read(path).map_err(|source| SigningError::Io {
        path: path.display().to_string(),
        source,
    })
}

fn read_certificates(path: &Path) -> Result<Vec<X509>, SigningError> {
    let bytes = read_file(path)?;
    if bytes.windows(11).any(|w| w == b"-----BEGIN ") {
        Ok(X509::stack_from_pem(&bytes)?)
    } else {
        Ok(vec![X509::from_der(&bytes)?])
    }
}

impl KeySource {
    /// Load and cross-check the key material
    pub fn load(&self) -> Result<LoadedIdentity, SigningError> {
        let identity = match self {
            KeySource::Pem {
                certificate,
                chain,
                private_key,
                password,
            } => {
                let mut certs = read_certificates(certificate)?.into_iter();
                let leaf = certs.next().ok_or_else(|| {
                    SigningError::KeyMaterial(format!(
                        "no certificate in {}",
                        certificate.display()
                    ))
                })?;
                let mut extra: Vec<X509> = certs.collect();
                for path in chain {
                    extra.extend(read_certificates(path)?);
                }

                let key_bytes = read_file(private_key)?;
                let key = match password {
                    Some(pass) => PKey::private_key_from_pem_passphrase(&key_bytes, pass.as_bytes())?,
                    None => PKey::private_key_from_pem(&key_bytes)?,
                };

                LoadedIdentity {
                    certificate: leaf,
                    chain: extra,
                    private_key: key,
                }
            }
            KeySource::Pkcs12 { keystore, password } => {
                let bytes = read_file(keystore)?;
                let parsed = Pkcs12::from_der(&bytes)?.parse2(password)?;
                let certificate = parsed.cert.ok_or_else(|| {
                    SigningError::KeyMaterial(format!(
                        "keystore {} has no certificate",
                        keystore.display()
                    ))
                })?;
                let private_key = parsed.pkey.ok_or_else(|| {
                    SigningError::KeyMaterial(format!(
                        "keystore {} has no private key",
                        keystore.display()
                    ))
                })?;
                let chain = parsed
                    .ca
                    .map(|stack| stack.into_iter().collect())
                    .unwrap_or_default();

                LoadedIdentity {
                    certificate,
                    chain,
                    private_key,
                }
            }
        };

        let public = identity.certificate.public_key()?;
        if !public.public_eq(&identity.private_key) {
            return Err(SigningError::KeyMaterial(
                "private key does not match certificate".to_string(),
            ));
        }

        Ok(identity)
    }
}

/// Authorization id to identity mapping with a load-once cache
#[derive(Default)]
pub struct IdentityRegistry {
    sources: HashMap<String, KeySource>,
    loaded: Mutex<HashMap<String, Arc<LoadedIdentity>>>,
}

impl IdentityRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_configs(configs: &[IdentityConfig]) -> Self {
        let mut registry = Self::new();
        for config in configs {
            registry.register(&config.authorization_id, config.source.clone());
        }
        registry
    }

    /// Declare an identity; it is loaded on first use
    pub fn register(&mut self, authorization_id: &str, source: KeySource) {
        self.sources.insert(authorization_id.to_string(), source);
    }

    /// Insert already loaded key material
    #[cfg(test)]
    pub fn insert_loaded(&self, authorization_id: &str, identity: LoadedIdentity) {
        self.loaded
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(authorization_id.to_string(), Arc::new(identity));
    }

    /// Known authorization ids, sorted
    pub fn ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.sources.keys().cloned().collect();
        for id in self
            .loaded
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
        {
            if !self.sources.contains_key(id) {
                ids.push(id.clone());
            }
        }
        ids.sort();
        ids
    }

    pub fn contains(&self, authorization_id: &str) -> bool {
        self.sources.contains_key(authorization_id)
            || self
                .loaded
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .contains_key(authorization_id)
    }

    /// Look up the identity, loading it if needed
    pub fn resolve(&self, authorization_id: &str) -> Result<Arc<LoadedIdentity>, SigningError> {
        let mut loaded = self.loaded.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(identity) = loaded.get(authorization_id) {
            return Ok(Arc::clone(identity));
        }

        let source = self
            .sources
            .get(authorization_id)
            .ok_or_else(|| SigningError::UnknownIdentity(authorization_id.to_string()))?;

        debug!("Loading signing identity {}", authorization_id);
        let identity = Arc::new(source.load()?);
        info!(
            "Loaded signing identity {} ({} chain certificates)",
            authorization_id,
            identity.chain.len()
        );
        loaded.insert(authorization_id.to_string(), Arc::clone(&identity));
        Ok(identity)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::generate_identity;
    use openssl::pkcs12::Pkcs12;
    use std::fs;
    use tempfile::TempDir;

    fn write_pem_identity(dir: &TempDir, password: Option<&str>) -> KeySource {
        let identity = generate_identity();
        let cert_path = dir.path().join("signer.cer");
        let key_path = dir.path().join("signer.key");

        fs::write(&cert_path, identity.certificate.to_pem().unwrap()).unwrap();
        let key_pem = match password {
            Some(pass) => identity
                .private_key
                .private_key_to_pem_pkcs8_passphrase(
                    openssl::symm::Cipher::aes_256_cbc(),
                    pass.as_bytes(),
                )
                .unwrap(),
            None => identity.private_key.private_key_to_pem_pkcs8().unwrap(),
        };
        fs::write(&key_path, key_pem).unwrap();

        KeySource::Pem {
            certificate: cert_path,
            chain: Vec::new(),
            private_key: key_path,
            password: password.map(str::to_string),
        }
    }

    #[test]
    fn test_load_pem_identity() {
        let dir = TempDir::new().unwrap();
        let source = write_pem_identity(&dir, None);
        let identity = source.load().unwrap();
        assert!(identity.chain.is_empty());
    }

    #[test]
    fn test_load_encrypted_pem_identity() {
        let dir = TempDir::new().unwrap();
        let source = write_pem_identity(&dir, Some("12345678"));
        assert!(source.load().is_ok());
    }

    #[test]
    fn test_load_der_certificate() {
        let dir = TempDir::new().unwrap();
        let identity = generate_identity();
        let cert_path = dir.path().join("signer.der");
        let key_path = dir.path().join("signer.key");
        fs::write(&cert_path, identity.certificate.to_der().unwrap()).unwrap();
        fs::write(&key_path, identity.private_key.private_key_to_pem_pkcs8().unwrap()).unwrap();

        let source = KeySource::Pem {
            certificate: cert_path,
            chain: Vec::new(),
            private_key: key_path,
            password: None,
        };
        assert!(source.load().is_ok());
    }

    #[test]
    fn test_load_pkcs12_identity() {
        let dir = TempDir::new().unwrap();
        let identity = generate_identity();
        let keystore = Pkcs12::builder()
            .name("signer")
            .pkey(&identity.private_key)
            .cert(&identity.certificate)
            .build2("changeit")
            .unwrap();
        let path = dir.path().join("signer.p12");
        fs::write(&path, keystore.to_der().unwrap()).unwrap();

        let source = KeySource::Pkcs12 {
            keystore: path,
            password: "changeit".to_string(),
        };
        let loaded = source.load().unwrap();
        assert_eq!(
            loaded.certificate.to_der().unwrap(),
            identity.certificate.to_der().unwrap()
        );
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let source = KeySource::Pkcs12 {
            keystore: PathBuf::from("/nonexistent/signer.p12"),
            password: "x".to_string(),
        };
        assert!(matches!(source.load(), Err(SigningError::Io { .. })));
    }

    #[test]
    fn test_registry_unknown_identity() {
        let registry = IdentityRegistry::new();
        let err = registry.resolve("not-configured").unwrap_err();
        assert!(matches!(err, SigningError::UnknownIdentity(ref id) if id == "not-configured"));
    }

    #[test]
    fn test_registry_loads_once() {
        let dir = TempDir::new().unwrap();
        let source = write_pem_identity(&dir, None);

        let mut registry = IdentityRegistry::new();
        registry.register("auth-1", source);
        let first = registry.resolve("auth-1").unwrap();

        // Removing the files proves the second lookup is served from cache
        drop(dir);
        let second = registry.resolve("auth-1").unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(registry.ids(), vec!["auth-1".to_string()]);
    }

    #[test]
    fn test_identity_config_yaml() {
        let yaml = r#"
authorization_id: approver-primary
source:
  kind: pem
  certificate: certs/approver-primary.cer
  private_key: certs/approver-primary.key
  password: "12345678"
"#;
        let config: IdentityConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.authorization_id, "approver-primary");
        match config.source {
            KeySource::Pem { chain, password, .. } => {
                assert!(chain.is_empty());
                assert_eq!(password.as_deref(), Some("12345678"));
            }
            other => panic!("unexpected source {:?}", other),
        }
    }
}
