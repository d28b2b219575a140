//! Common test utilities for nanotdf integration tests
//!
//! [`StubKas`] answers the two KAS endpoints in-process: the public key
//! lookup and rewrap. Rewrap does what a real KAS does with a NanoTDF
//! header: derive the DEK from the header's ephemeral key, then wrap it for
//! the client's session key.

#![allow(dead_code)]

use async_trait::async_trait;
use base64::engine::general_purpose::{STANDARD as BASE64, URL_SAFE_NO_PAD};
use base64::Engine as _;
use nanotdf::nanotdf_crypto::{
    kas_derive_key, parse_public_key_pem, public_key_to_pem, EcKeyPair, EcdhKem, KeyEncapsulation,
    WrappedKeyIv,
};
use nanotdf::nanotdf_protocol::{Header, SignedRewrapRequest, UnsignedRewrapRequest};
use nanotdf::{
    BearerAuthProvider, ClientConfig, HttpRequest, HttpResponse, KasPublicKeyInfo, KasTransport,
    NanoTdfError, RequestSigner, RewrapClient,
};
use serde_json::{json, Value};
use std::sync::atomic::{AtomicU16, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

pub const KAS_URL: &str = "https://kas.example.com/kas";
pub const KAS_ORIGIN: &str = "https://kas.example.com";

/// Test data for encryption/decryption
pub const TEST_PLAINTEXT: &[u8] = b"Hello, NanoTDF! This is test data for encryption.";

/// In-process KAS
pub struct StubKas {
    pub key_pair: EcKeyPair,
    pub kid: Option<String>,
    wrapped_key_iv: WrappedKeyIv,
    /// Status returned for rewrap instead of a key; 0 for none
    fail_status: AtomicU16,
    deny: Mutex<Option<(String, Vec<String>)>>,
    pub public_key_calls: AtomicUsize,
    pub rewrap_calls: AtomicUsize,
    pub requests: Mutex<Vec<HttpRequest>>,
}

impl StubKas {
    pub fn new() -> Arc<Self> {
        Self::build(WrappedKeyIv::Standard)
    }

    /// KAS answering with 3-byte wrapped-key IVs
    pub fn legacy() -> Arc<Self> {
        Self::build(WrappedKeyIv::Legacy)
    }

    fn build(wrapped_key_iv: WrappedKeyIv) -> Arc<Self> {
        Arc::new(Self {
            key_pair: EcKeyPair::generate(),
            kid: Some("e1".to_string()),
            wrapped_key_iv,
            fail_status: AtomicU16::new(0),
            deny: Mutex::new(None),
            public_key_calls: AtomicUsize::new(0),
            rewrap_calls: AtomicUsize::new(0),
            requests: Mutex::new(Vec::new()),
        })
    }

    pub fn fail_with(&self, status: u16) {
        self.fail_status.store(status, Ordering::SeqCst);
    }

    pub fn recover(&self) {
        self.fail_status.store(0, Ordering::SeqCst);
    }

    /// Answer rewraps with a `fail` result carrying required obligations
    pub fn deny(&self, reason: &str, obligations: &[&str]) {
        *self.deny.lock().unwrap() = Some((
            reason.to_string(),
            obligations.iter().map(|o| o.to_string()).collect(),
        ));
    }

    pub fn rewraps(&self) -> usize {
        self.rewrap_calls.load(Ordering::SeqCst)
    }

    pub fn public_key_info(&self) -> KasPublicKeyInfo {
        KasPublicKeyInfo {
            url: KAS_URL.to_string(),
            algorithm: "ec:secp256r1".to_string(),
            kid: self.kid.clone(),
            public_key_pem: self.key_pair.public_key_pem().unwrap(),
        }
    }

    fn rewrap(&self, request: &HttpRequest) -> HttpResponse {
        let status = self.fail_status.load(Ordering::SeqCst);
        if status != 0 {
            return HttpResponse {
                status,
                body: json!({"code": status, "message": "stub failure"}).to_string(),
            };
        }

        let signed: SignedRewrapRequest =
            serde_json::from_str(request.body.as_deref().unwrap()).unwrap();
        let claims = signed.signed_request_token.split('.').nth(1).unwrap();
        let claims: Value = serde_json::from_slice(&URL_SAFE_NO_PAD.decode(claims).unwrap()).unwrap();
        let unsigned: UnsignedRewrapRequest =
            serde_json::from_str(claims["requestBody"].as_str().unwrap()).unwrap();

        let header_b64 = &unsigned.requests[0].key_access_objects[0]
            .key_access_object
            .header;
        let (header, _) = Header::parse(&BASE64.decode(header_b64).unwrap()).unwrap();

        if let Some((reason, obligations)) = self.deny.lock().unwrap().clone() {
            let body = json!({
                "sessionPublicKey": "",
                "responses": [{
                    "policyId": "policy",
                    "results": [{
                        "keyAccessObjectId": "kao-0",
                        "status": "fail",
                        "error": reason,
                        "metadata": {"X-Required-Obligations": obligations}
                    }]
                }]
            });
            return HttpResponse {
                status: 200,
                body: body.to_string(),
            };
        }

        let dek = kas_derive_key(self.key_pair.secret_key(), &header).unwrap();
        let client_key = parse_public_key_pem(&unsigned.client_public_key).unwrap();
        let wrapped = EcdhKem::new(header.magic_number_and_version.as_bytes(), self.wrapped_key_iv)
            .wrap(dek.as_slice(), &client_key)
            .unwrap();
        let body = json!({
            "sessionPublicKey": public_key_to_pem(&wrapped.session_public_key).unwrap(),
            "responses": [{
                "policyId": "policy",
                "results": [{
                    "keyAccessObjectId": "kao-0",
                    "status": "permit",
                    "kasWrappedKey": BASE64.encode(&wrapped.wrapped)
                }]
            }]
        });
        HttpResponse {
            status: 200,
            body: body.to_string(),
        }
    }
}

#[async_trait]
impl KasTransport for StubKas {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, NanoTdfError> {
        self.requests.lock().unwrap().push(request.clone());
        if request.url.contains("/v2/kas_public_key") {
            self.public_key_calls.fetch_add(1, Ordering::SeqCst);
            let body = json!({
                "publicKey": self.key_pair.public_key_pem().unwrap(),
                "kid": self.kid,
            });
            return Ok(HttpResponse {
                status: 200,
                body: body.to_string(),
            });
        }
        if request.url.ends_with("/v2/rewrap") {
            self.rewrap_calls.fetch_add(1, Ordering::SeqCst);
            return Ok(self.rewrap(&request));
        }
        Ok(HttpResponse {
            status: 404,
            body: String::new(),
        })
    }
}

/// Rewrap client talking to `kas`, signing with a fast EC key
pub fn rewrap_client(config: ClientConfig, kas: Arc<StubKas>) -> RewrapClient {
    RewrapClient::new(config, Arc::new(BearerAuthProvider::new("test-token")), kas)
        .unwrap()
        .with_signer(RequestSigner::generate_ec().unwrap())
}

pub fn config() -> ClientConfig {
    ClientConfig::new(KAS_URL)
}

/// Route `tracing` output through the test harness; `RUST_LOG` filters it
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}
