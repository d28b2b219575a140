//! KAS rewrap client
//!
//! # Protocol Flow
//!
//! 1. Check the rewrap URL against the allow-list (no I/O happens before this)
//! 2. Build the unsigned request: base64 header, ephemeral public key PEM
//! 3. Sign it as a JWT with the request signer key
//! 4. POST `{signedRequestToken}` through the auth provider and transport
//! 5. Read the wrapped key and KAS session public key from the response
//! 6. ECDH(ephemeral private, session public) + HKDF salted with the
//!    container's magic bytes → unwrap key; AES-GCM decrypt → DEK
//!
//! Nothing is cached on failure; a failed call can simply be repeated and
//! produces a fresh signature each time.

use crate::allowlist::{fetch_key_access_servers, origin, OriginAllowList};
use crate::auth::AuthProvider;
use crate::config::ClientConfig;
use crate::error::{error_from_status, NanoTdfError};
use crate::jws::RequestSigner;
use crate::transport::{HttpRequest, HttpResponse, KasTransport};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use nanotdf_crypto::{
    derive_key, parse_public_key_pem, unwrap_wrapped_key, AesKey, EcKeyPair, WrappedKeyIv,
};
use nanotdf_protocol::binary::BinaryWrite;
use nanotdf_protocol::{
    Header, RewrapOutcome, RewrapResponse, SignedRewrapRequest, UnsignedRewrapRequest,
};
use serde_json::json;
use std::fmt;
use std::sync::Arc;
use tokio::sync::OnceCell;
use tracing::debug;

/// Client version reported for current containers (12-byte wrapped-key IV)
pub const CLIENT_VERSION: &str = "0.0.1";

/// Header carrying the obligations this client can fulfil
pub const REWRAP_ADDITIONAL_CONTEXT_HEADER: &str = "X-Rewrap-Additional-Context";

/// An unwrapped DEK and the obligations attached to it
#[derive(Debug, Clone)]
pub struct RewrapKeyResult {
    pub key: AesKey,
    pub required_obligations: Vec<String>,
}

/// Exchanges NanoTDF headers for DEKs
///
/// Holds one ephemeral ECDH key pair for its whole life and a request signer,
/// generated on first use unless supplied.
pub struct RewrapClient {
    config: ClientConfig,
    auth: Arc<dyn AuthProvider>,
    transport: Arc<dyn KasTransport>,
    ephemeral: EcKeyPair,
    signer: OnceCell<RequestSigner>,
    allow_list: OnceCell<OriginAllowList>,
}

impl RewrapClient {
    pub fn new(
        config: ClientConfig,
        auth: Arc<dyn AuthProvider>,
        transport: Arc<dyn KasTransport>,
    ) -> Result<Self, NanoTdfError> {
        config.validate()?;
        crate::allowlist::validate_secure_url(&config.kas_endpoint);

        let allow_list = OnceCell::new();
        if config.ignore_allow_list {
            let _ = allow_list.set(OriginAllowList::allow_all());
        } else if !config.allowed_kases.is_empty() {
            let _ = allow_list.set(OriginAllowList::new(&config.allowed_kases)?);
        }

        Ok(Self {
            config,
            auth,
            transport,
            ephemeral: EcKeyPair::generate(),
            signer: OnceCell::new(),
            allow_list,
        })
    }

    /// Use a caller-provided ephemeral key pair
    #[must_use]
    pub fn with_ephemeral_key_pair(mut self, key_pair: EcKeyPair) -> Self {
        self.ephemeral = key_pair;
        self
    }

    /// Use a caller-provided request signer
    #[must_use]
    pub fn with_signer(self, signer: RequestSigner) -> Self {
        let _ = self.signer.set(signer);
        self
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn ephemeral_key_pair(&self) -> &EcKeyPair {
        &self.ephemeral
    }

    pub fn transport(&self) -> &dyn KasTransport {
        self.transport.as_ref()
    }

    async fn signer(&self) -> Result<&RequestSigner, NanoTdfError> {
        self.signer
            .get_or_try_init(|| async { RequestSigner::generate() })
            .await
    }

    /// Trusted KAS origins
    ///
    /// Configured lists win; otherwise the platform's registry is fetched
    /// once; without a platform URL only the configured KAS is trusted.
    pub async fn allow_list(&self) -> Result<&OriginAllowList, NanoTdfError> {
        self.allow_list
            .get_or_try_init(|| async {
                match &self.config.platform_url {
                    Some(platform_url) => {
                        fetch_key_access_servers(
                            platform_url,
                            self.auth.as_ref(),
                            self.transport.as_ref(),
                        )
                        .await
                    }
                    None => {
                        let kas_origin = origin(&self.config.kas_endpoint).ok_or_else(|| {
                            NanoTdfError::Configuration(format!(
                                "invalid kas_endpoint [{}]",
                                self.config.kas_endpoint
                            ))
                        })?;
                        OriginAllowList::new([kas_origin])
                    }
                }
            })
            .await
    }

    /// Send a request with credentials, after telling the auth provider
    /// which key signs requests
    pub async fn send_authenticated(
        &self,
        request: HttpRequest,
    ) -> Result<HttpResponse, NanoTdfError> {
        let signer = self.signer().await?;
        self.auth
            .update_client_public_key(signer.public_key_pem())
            .await?;
        let request = self.auth.with_creds(request).await?;
        self.transport.send(request).await
    }

    fn additional_context(&self) -> Option<String> {
        if self.config.fulfillable_obligation_fqns.is_empty() {
            return None;
        }
        let context = json!({
            "obligations": { "fulfillableFQNs": self.config.fulfillable_obligation_fqns }
        });
        Some(BASE64.encode(context.to_string()))
    }

    /// Rewrap the DEK of a header
    ///
    /// `client_version` selects the wrapped-key IV width: `"0.0.0"` means
    /// 3 bytes, anything else 12.
    pub async fn rewrap_key(
        &self,
        header_bytes: &[u8],
        kas_rewrap_url: &str,
        magic_number_and_version: &[u8],
        client_version: &str,
    ) -> Result<RewrapKeyResult, NanoTdfError> {
        self.allow_list().await?.check(kas_rewrap_url)?;
        debug!(url = kas_rewrap_url, client_version, "rewrap request");

        let signer = self.signer().await?;
        let unsigned = UnsignedRewrapRequest::for_nanotdf(
            BASE64.encode(header_bytes),
            self.ephemeral.public_key_pem()?,
        );
        let request_body = serde_json::to_string(&unsigned)
            .map_err(|e| NanoTdfError::Internal(format!("rewrap request: {}", e)))?;
        let signed = SignedRewrapRequest {
            signed_request_token: signer.sign_request(&request_body)?,
        };
        let body = serde_json::to_string(&signed)
            .map_err(|e| NanoTdfError::Internal(format!("rewrap request: {}", e)))?;

        let mut request = HttpRequest::post_json(kas_rewrap_url, body);
        if let Some(context) = self.additional_context() {
            request = request.with_header(REWRAP_ADDITIONAL_CONTEXT_HEADER, context);
        }

        let response = self.send_authenticated(request).await?;
        if !response.is_success() {
            return Err(error_from_status(
                response.status,
                kas_rewrap_url,
                &response.body,
            ));
        }

        let mut rewrap: RewrapResponse = serde_json::from_str(&response.body).map_err(|e| {
            NanoTdfError::Network(format!("invalid rewrap response from [{}]: {}", kas_rewrap_url, e))
        })?;
        rewrap.upgrade_v1();

        let result = rewrap.first_result().ok_or_else(|| {
            NanoTdfError::Decrypt("KAS rewrap response missing expected response or result".to_string())
        })?;
        let required_obligations = result.required_obligations();
        let wrapped = match result.outcome() {
            RewrapOutcome::WrappedKey(encoded) => BASE64
                .decode(encoded)
                .map_err(|e| NanoTdfError::Decrypt(format!("wrapped key is not base64: {}", e)))?,
            RewrapOutcome::Error(reason) => {
                return Err(NanoTdfError::PermissionDenied {
                    reason: reason.to_string(),
                    required_obligations,
                });
            }
            RewrapOutcome::Missing => {
                return Err(NanoTdfError::Decrypt(
                    "KAS rewrap response missing wrapped key".to_string(),
                ));
            }
        };

        let session_public_key = parse_public_key_pem(&rewrap.session_public_key).map_err(|e| {
            NanoTdfError::Configuration(format!(
                "[{}] session public key is not a P-256 PEM: {}",
                kas_rewrap_url, e
            ))
        })?;
        let unwrap_key = derive_key(
            self.ephemeral.secret_key(),
            &session_public_key,
            magic_number_and_version,
        )
        .map_err(|e| NanoTdfError::Decrypt(format!("unable to solve key agreement: {}", e)))?;

        let key = unwrap_wrapped_key(
            &wrapped,
            WrappedKeyIv::for_client_version(client_version),
            &unwrap_key,
        )
        .map_err(|e| {
            NanoTdfError::Decrypt(format!(
                "unable to decrypt key; is this the right KAS and salt? ({})",
                e
            ))
        })?;

        debug!(url = kas_rewrap_url, "rewrap complete");
        Ok(RewrapKeyResult {
            key,
            required_obligations,
        })
    }

    /// Rewrap using the KAS URL and magic bytes a header carries
    pub async fn rewrap_header(
        &self,
        header: &Header,
        client_version: &str,
    ) -> Result<RewrapKeyResult, NanoTdfError> {
        let header_bytes = header.to_bytes()?;
        let url = header.kas_rewrap_url()?;
        self.rewrap_key(
            &header_bytes,
            &url,
            header.magic_number_and_version.as_bytes(),
            client_version,
        )
        .await
    }
}

impl fmt::Debug for RewrapClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RewrapClient")
            .field("config", &self.config)
            .field("ephemeral", &self.ephemeral)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::BearerAuthProvider;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct CountingTransport {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl KasTransport for CountingTransport {
        async fn send(&self, _request: HttpRequest) -> Result<HttpResponse, NanoTdfError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(HttpResponse {
                status: 500,
                body: "unexpected".to_string(),
            })
        }
    }

    fn client(config: ClientConfig, transport: Arc<CountingTransport>) -> RewrapClient {
        RewrapClient::new(config, Arc::new(BearerAuthProvider::new("t")), transport)
            .unwrap()
            .with_signer(RequestSigner::generate_ec().unwrap())
    }

    #[tokio::test]
    async fn test_untrusted_kas_makes_no_calls() {
        let transport = Arc::new(CountingTransport::default());
        let config = ClientConfig::new("https://kas.example.com/kas")
            .with_allowed_kases(["https://kas.example.com"]);
        let client = client(config, transport.clone());

        let result = client
            .rewrap_key(b"header", "https://evil.example.com/kas/v2/rewrap", b"L1L", CLIENT_VERSION)
            .await;
        assert!(matches!(result, Err(NanoTdfError::UntrustedKas { .. })));
        assert_eq!(transport.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_fallback_allow_list_is_kas_endpoint() {
        let transport = Arc::new(CountingTransport::default());
        let client = client(ClientConfig::new("https://kas.example.com/kas"), transport.clone());

        let list = client.allow_list().await.unwrap();
        assert_eq!(list.origins(), ["https://kas.example.com".to_string()]);
        assert_eq!(transport.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_service_error_is_propagated() {
        let transport = Arc::new(CountingTransport::default());
        let client = client(ClientConfig::new("https://kas.example.com/kas"), transport.clone());

        let result = client
            .rewrap_key(b"header", "https://kas.example.com/kas/v2/rewrap", b"L1L", CLIENT_VERSION)
            .await;
        assert!(matches!(result, Err(NanoTdfError::Service { status: 500, .. })));
        assert_eq!(transport.calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_additional_context() {
        let transport = Arc::new(CountingTransport::default());
        let config = ClientConfig::new("https://kas.example.com/kas")
            .with_fulfillable_obligations(["https://example.com/obl/drm/value/watermark"]);
        let client = client(config, transport);
        let context = client.additional_context().unwrap();
        let decoded: serde_json::Value =
            serde_json::from_slice(&BASE64.decode(context).unwrap()).unwrap();
        assert_eq!(
            decoded["obligations"]["fulfillableFQNs"][0],
            "https://example.com/obl/drm/value/watermark"
        );
    }
}
