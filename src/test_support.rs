//! Shared fixtures for unit tests

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, OnceLock};
use std::time::Duration;

use async_trait::async_trait;
use openssl::asn1::Asn1Time;
use openssl::bn::BigNum;
use openssl::hash::MessageDigest;
use openssl::pkcs7::{Pkcs7, Pkcs7Flags};
use openssl::pkey::PKey;
use openssl::rsa::Rsa;
use openssl::stack::Stack;
use openssl::x509::store::X509StoreBuilder;
use openssl::x509::{X509Builder, X509NameBuilder, X509};
use serde_json::{json, Value};

use crate::config::WorkflowSettings;
use crate::engine::RunContext;
use crate::error::EngineError;
use crate::http::{ApiCall, ApiResponse, BearerToken, PaymentApi};
use crate::models::{SuiteEntry, TestCase};
use crate::signing::identity::LoadedIdentity;
use crate::signing::{IdentityRegistry, SignatureService};
use crate::store::MemoryTemplateStore;

pub const AUTH_ID: &str = "test-signer";

fn build_identity(common_name: &str, serial: u32) -> LoadedIdentity {
    let key = PKey::from_rsa(Rsa::generate(2048).unwrap()).unwrap();

    let mut name = X509NameBuilder::new().unwrap();
    name.append_entry_by_text("CN", common_name).unwrap();
    let name = name.build();

    let mut builder = X509Builder::new().unwrap();
    builder.set_version(2).unwrap();
    let serial = BigNum::from_u32(serial).unwrap().to_asn1_integer().unwrap();
    builder.set_serial_number(&serial).unwrap();
    builder.set_subject_name(&name).unwrap();
    builder.set_issuer_name(&name).unwrap();
    builder.set_pubkey(&key).unwrap();
    builder.set_not_before(&Asn1Time::days_from_now(0).unwrap()).unwrap();
    builder.set_not_after(&Asn1Time::days_from_now(365).unwrap()).unwrap();
    builder.sign(&key, MessageDigest::sha256()).unwrap();

    LoadedIdentity {
        certificate: builder.build(),
        chain: Vec::new(),
        private_key: key,
    }
}

/// Self-signed RSA identity, generated once per test binary
pub fn generate_identity() -> LoadedIdentity {
    static IDENTITY: OnceLock<LoadedIdentity> = OnceLock::new();
    IDENTITY
        .get_or_init(|| build_identity("payflow test signer", 4242))
        .clone()
}

pub fn generate_identity_named(common_name: &str) -> LoadedIdentity {
    build_identity(common_name, 7)
}

/// Verify a SignedData envelope and return its content and signer certificates
pub fn verify_envelope(der: &[u8]) -> (Vec<u8>, Vec<Vec<u8>>) {
    let pkcs7 = Pkcs7::from_der(der).unwrap();
    let certs = Stack::<X509>::new().unwrap();
    let store = X509StoreBuilder::new().unwrap().build();

    let mut content = Vec::new();
    pkcs7
        .verify(&certs, &store, None, Some(&mut content), Pkcs7Flags::NOVERIFY)
        .unwrap();

    let signers = pkcs7.signers(&certs, Pkcs7Flags::empty()).unwrap();
    let signer_ders = signers.iter().map(|cert| cert.to_der().unwrap()).collect();
    (content, signer_ders)
}

pub fn single_template(transaction_type: &str) -> Value {
    json!({
        "requestParameters": {
            "data": {
                "transaction": {
                    "transactionType": transaction_type,
                    "amount": "150000",
                    "currency": "VND",
                    "debitAccount": "0011001234567",
                    "creditAccount": "0011007654321"
                }
            },
            "authorizations": [
                { "authorizationId": AUTH_ID, "authorizationString": "" }
            ]
        }
    })
}

pub fn bulk_template(transaction_types: &[&str]) -> Value {
    let transactions: Vec<Value> = transaction_types
        .iter()
        .map(|kind| json!({ "transactionType": kind, "amount": "50000", "currency": "VND" }))
        .collect();
    json!({
        "requestParameters": {
            "data": {
                "debitAccount": "0011001234567",
                "transactions": transactions
            },
            "authorizations": [
                { "authorizationId": AUTH_ID, "authorizationString": "" }
            ]
        }
    })
}

/// Typed case from a raw JSON descriptor
pub fn case(raw: Value) -> TestCase {
    match SuiteEntry::from_value(raw) {
        SuiteEntry::Valid(case) => case,
        SuiteEntry::Invalid(invalid) => panic!("invalid test case {}: {}", invalid.id, invalid.reason),
    }
}

fn signer() -> SignatureService {
    let registry = IdentityRegistry::new();
    registry.insert_loaded(AUTH_ID, generate_identity());
    SignatureService::new(registry)
}

fn default_store() -> MemoryTemplateStore {
    MemoryTemplateStore::new()
        .with_template("simple-inside", single_template("insidebank"))
        .with_template("simple-ibft", single_template("ibft"))
        .with_template("bulk-mixed", bulk_template(&["insidebank", "ibft", "citad"]))
}

pub fn context(api: MockPaymentApi) -> RunContext {
    context_with(api, default_store(), WorkflowSettings::default())
}

pub fn context_with_store(api: MockPaymentApi, store: MemoryTemplateStore) -> RunContext {
    context_with(api, store, WorkflowSettings::default())
}

pub fn context_with_settings(api: MockPaymentApi, settings: WorkflowSettings) -> RunContext {
    context_with(api, default_store(), settings)
}

pub fn context_with(
    api: MockPaymentApi,
    store: MemoryTemplateStore,
    settings: WorkflowSettings,
) -> RunContext {
    RunContext::new(
        BearerToken::new("test-token"),
        Arc::new(api),
        Arc::new(store),
        Arc::new(signer()),
        settings,
    )
}

/// Responses for one endpoint; the last one repeats once the queue drains
#[derive(Default)]
struct Script {
    queued: VecDeque<ApiResponse>,
    last: Option<ApiResponse>,
    calls: usize,
}

impl Script {
    fn next(&mut self) -> Option<ApiResponse> {
        self.calls += 1;
        if let Some(response) = self.queued.pop_front() {
            self.last = Some(response.clone());
        }
        self.last.clone()
    }
}

#[derive(Default)]
struct MockState {
    create: Script,
    query: Script,
    bulk_create: Script,
    bulk_query: Script,
    created: Vec<Value>,
    bulk_created: Vec<Value>,
    queried: Vec<String>,
}

/// Scripted payment API that records every call
#[derive(Clone, Default)]
pub struct MockPaymentApi {
    state: Arc<Mutex<MockState>>,
    delay: Option<Duration>,
}

impl MockPaymentApi {
    pub fn new() -> Self {
        Self::default()
    }

    fn script(self, pick: impl FnOnce(&mut MockState) -> &mut Script, response: ApiResponse) -> Self {
        pick(&mut self.state.lock().unwrap()).queued.push_back(response);
        self
    }

    pub fn on_create(self, status: u16, body: Value) -> Self {
        self.script(|s| &mut s.create, ApiResponse::new(status, body))
    }

    pub fn on_query(self, status: u16, body: Value) -> Self {
        self.script(|s| &mut s.query, ApiResponse::new(status, body))
    }

    pub fn on_bulk_create(self, status: u16, body: Value) -> Self {
        self.script(|s| &mut s.bulk_create, ApiResponse::new(status, body))
    }

    pub fn on_bulk_query(self, status: u16, body: Value) -> Self {
        self.script(|s| &mut s.bulk_query, ApiResponse::new(status, body))
    }

    /// Delay every response, simulating a slow backend
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn create_calls(&self) -> usize {
        self.state.lock().unwrap().create.calls
    }

    pub fn query_calls(&self) -> usize {
        self.state.lock().unwrap().query.calls
    }

    pub fn bulk_create_calls(&self) -> usize {
        self.state.lock().unwrap().bulk_create.calls
    }

    pub fn bulk_query_calls(&self) -> usize {
        self.state.lock().unwrap().bulk_query.calls
    }

    pub fn total_calls(&self) -> usize {
        let state = self.state.lock().unwrap();
        state.create.calls + state.query.calls + state.bulk_create.calls + state.bulk_query.calls
    }

    pub fn last_create(&self) -> Option<Value> {
        self.state.lock().unwrap().created.last().cloned()
    }

    pub fn last_bulk_create(&self) -> Option<Value> {
        self.state.lock().unwrap().bulk_created.last().cloned()
    }

    pub fn last_queried_trace(&self) -> Option<String> {
        self.state.lock().unwrap().queried.last().cloned()
    }
}

#[async_trait]
impl PaymentApi for MockPaymentApi {
    async fn execute(&self, _token: &BearerToken, call: &ApiCall) -> Result<ApiResponse, EngineError> {
        let response = {
            let mut state = self.state.lock().unwrap();
            match call {
                ApiCall::CreateTransaction(doc) => {
                    state.created.push(doc.clone());
                    state.create.next()
                }
                ApiCall::QueryTransactions { trace_number, .. } => {
                    state.queried.push(trace_number.clone());
                    state.query.next()
                }
                ApiCall::CreateBulk(doc) => {
                    state.bulk_created.push(doc.clone());
                    state.bulk_create.next()
                }
                ApiCall::QueryBulk {
                    bulk_trace_number, ..
                } => {
                    state.queried.push(bulk_trace_number.clone());
                    state.bulk_query.next()
                }
            }
        };

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        response.ok_or_else(|| EngineError::NetworkFailure {
            endpoint: call.label().to_string(),
            message: "no scripted response".to_string(),
        })
    }
}
