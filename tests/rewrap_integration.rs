//! Rewrap protocol tests against the in-process stub KAS

mod common;

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use common::{config, rewrap_client, StubKas, KAS_ORIGIN, KAS_URL, TEST_PLAINTEXT};
use nanotdf::kas::REWRAP_ADDITIONAL_CONTEXT_HEADER;
use nanotdf::nanotdf_crypto::tdf::encrypt;
use nanotdf::nanotdf_crypto::{build_header, EcKeyPair, HeaderOptions, TagSize};
use nanotdf::nanotdf_protocol::{NanoTdf, Payload, ResourceLocator};
use nanotdf::{
    AuthProvider, EncryptOptions, HttpRequest, NanoTdfClient, NanoTdfError, RequestSigner,
    RewrapClient, CLIENT_VERSION,
};
use serde_json::Value;
use std::sync::{Arc, Mutex};

async fn encrypted(kas: &Arc<StubKas>) -> Vec<u8> {
    let mut client = NanoTdfClient::from_rewrap_client(rewrap_client(config(), kas.clone()));
    client
        .encrypt(TEST_PLAINTEXT, &EncryptOptions::default())
        .await
        .unwrap()
}

/// Scenario C: an untrusted KAS is rejected before any request goes out
#[tokio::test]
async fn test_untrusted_kas_rejected_without_network() {
    common::init_tracing();
    let kas = StubKas::new();
    let client = rewrap_client(config().with_allowed_kases([KAS_ORIGIN]), kas.clone());

    let err = client
        .rewrap_key(
            b"header",
            "https://attacker.example.net/kas/v2/rewrap",
            b"L1L",
            CLIENT_VERSION,
        )
        .await
        .unwrap_err();

    match &err {
        NanoTdfError::UntrustedKas { url, allowed } => {
            assert_eq!(url, "https://attacker.example.net/kas/v2/rewrap");
            assert_eq!(allowed, &vec![KAS_ORIGIN.to_string()]);
        }
        other => panic!("expected UntrustedKas, got {other:?}"),
    }
    assert!(err.is_fatal());
    assert!(kas.requests.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_default_allow_list_is_kas_endpoint_origin() {
    let kas = StubKas::new();
    let client = rewrap_client(config(), kas.clone());

    let allow_list = client.allow_list().await.unwrap();
    assert_eq!(allow_list.origins(), &[KAS_ORIGIN.to_string()]);
    assert!(allow_list.allows("https://kas.example.com/other/v2/rewrap"));
    assert!(!allow_list.allows("http://kas.example.com/kas/v2/rewrap"));
    assert!(!allow_list.allows("https://kas.example.com:8443/kas/v2/rewrap"));
}

#[tokio::test]
async fn test_ignore_allow_list() {
    let kas = StubKas::new();
    let container = encrypted(&kas).await;

    let client = rewrap_client(
        config()
            .with_allowed_kases(["https://elsewhere.example.com"])
            .with_ignore_allow_list(true),
        kas.clone(),
    );
    let tdf = NanoTdf::from_bytes(&container).unwrap();
    let result = client.rewrap_header(&tdf.header, CLIENT_VERSION).await.unwrap();
    assert!(result.required_obligations.is_empty());
    assert_eq!(kas.rewraps(), 1);
}

#[tokio::test]
async fn test_denied_rewrap_reports_obligations() {
    let kas = StubKas::new();
    let container = encrypted(&kas).await;
    kas.deny(
        "obligations not fulfilled",
        &["https://example.com/obl/drm/value/watermark"],
    );

    let client = NanoTdfClient::from_rewrap_client(rewrap_client(config(), kas.clone()));
    let err = client.decrypt(&container).await.unwrap_err();
    match err {
        NanoTdfError::PermissionDenied {
            reason,
            required_obligations,
        } => {
            assert_eq!(reason, "obligations not fulfilled");
            assert_eq!(
                required_obligations,
                vec!["https://example.com/obl/drm/value/watermark".to_string()]
            );
        }
        other => panic!("expected PermissionDenied, got {other:?}"),
    }
}

#[tokio::test]
async fn test_service_failure_is_retryable_and_not_sticky() {
    let kas = StubKas::new();
    let container = encrypted(&kas).await;
    let client = NanoTdfClient::from_rewrap_client(rewrap_client(config(), kas.clone()));

    kas.fail_with(503);
    let err = client.decrypt(&container).await.unwrap_err();
    assert!(matches!(err, NanoTdfError::Service { status: 503, .. }));
    assert!(err.is_retryable());

    kas.recover();
    assert_eq!(client.decrypt(&container).await.unwrap(), TEST_PLAINTEXT);
    assert_eq!(kas.rewraps(), 2);
}

#[tokio::test]
async fn test_status_mapping() {
    let kas = StubKas::new();
    let container = encrypted(&kas).await;
    let client = NanoTdfClient::from_rewrap_client(rewrap_client(config(), kas.clone()));

    kas.fail_with(400);
    assert!(matches!(
        client.decrypt(&container).await,
        Err(NanoTdfError::BadRequest(_))
    ));
    kas.fail_with(401);
    assert!(matches!(
        client.decrypt(&container).await,
        Err(NanoTdfError::Unauthenticated(_))
    ));
    kas.fail_with(403);
    assert!(matches!(
        client.decrypt(&container).await,
        Err(NanoTdfError::PermissionDenied { .. })
    ));
    kas.fail_with(418);
    assert!(matches!(
        client.decrypt(&container).await,
        Err(NanoTdfError::Network(_))
    ));
}

#[tokio::test]
async fn test_request_shape() {
    let kas = StubKas::new();
    let container = encrypted(&kas).await;
    let client = NanoTdfClient::from_rewrap_client(rewrap_client(
        config().with_fulfillable_obligations(["https://example.com/obl/drm/value/watermark"]),
        kas.clone(),
    ));
    client.decrypt(&container).await.unwrap();

    let requests = kas.requests.lock().unwrap();
    let rewrap = requests
        .iter()
        .find(|r| r.url.ends_with("/v2/rewrap"))
        .unwrap();
    assert_eq!(rewrap.url, format!("{KAS_URL}/v2/rewrap"));
    assert_eq!(rewrap.headers["Authorization"], "Bearer test-token");

    let context = BASE64
        .decode(&rewrap.headers[REWRAP_ADDITIONAL_CONTEXT_HEADER])
        .unwrap();
    let context: Value = serde_json::from_slice(&context).unwrap();
    assert_eq!(
        context["obligations"]["fulfillableFQNs"][0],
        "https://example.com/obl/drm/value/watermark"
    );

    let body: Value = serde_json::from_str(rewrap.body.as_deref().unwrap()).unwrap();
    let token = body["signedRequestToken"].as_str().unwrap();
    assert_eq!(token.split('.').count(), 3);
}

#[derive(Default)]
struct RecordingAuth {
    keys: Mutex<Vec<String>>,
}

#[async_trait]
impl AuthProvider for RecordingAuth {
    async fn update_client_public_key(&self, signing_public_key: &str) -> Result<(), NanoTdfError> {
        self.keys.lock().unwrap().push(signing_public_key.to_string());
        Ok(())
    }

    async fn with_creds(&self, request: HttpRequest) -> Result<HttpRequest, NanoTdfError> {
        Ok(request.with_header("Authorization", "DPoP test"))
    }
}

#[tokio::test]
async fn test_signer_key_registered_before_each_request() {
    let kas = StubKas::new();
    let container = encrypted(&kas).await;
    let auth = Arc::new(RecordingAuth::default());
    let signer = RequestSigner::generate_ec().unwrap();
    let expected_key = signer.public_key_pem().to_string();
    let rewrap = RewrapClient::new(config(), auth.clone(), kas.clone())
        .unwrap()
        .with_signer(signer);
    let client = NanoTdfClient::from_rewrap_client(rewrap);

    client.decrypt(&container).await.unwrap();
    client.decrypt(&container).await.unwrap();

    assert_eq!(*auth.keys.lock().unwrap(), vec![expected_key.clone(), expected_key]);
}

fn legacy_container(kas: &StubKas) -> Vec<u8> {
    let (header, dek) = build_header(
        ResourceLocator::from_url(KAS_URL, None).unwrap(),
        kas.key_pair.public_key(),
        &EcKeyPair::generate(),
        br#"{"uuid":"legacy","body":{"dataAttributes":[],"dissem":["x"]}}"#,
        &HeaderOptions::default(),
    )
    .unwrap();
    let iv = Payload::iv_from_counter(1);
    let sealed = encrypt(&dek, &iv, TEST_PLAINTEXT, TagSize::Bits128).unwrap();
    let payload = Payload::from_sealed(iv, sealed, 16).unwrap();
    NanoTdf::new(header, payload, None).unwrap().to_bytes().unwrap()
}

#[tokio::test]
async fn test_legacy_container() {
    let kas = StubKas::legacy();
    let container = legacy_container(&kas);
    let client = NanoTdfClient::from_rewrap_client(rewrap_client(config(), kas.clone()));

    assert_eq!(client.decrypt_legacy(&container).await.unwrap(), TEST_PLAINTEXT);

    // A 3-byte wrapped-key IV read as 12 bytes cannot unwrap
    assert!(matches!(
        client.decrypt(&container).await,
        Err(NanoTdfError::Decrypt(_))
    ));
}
