//! Authentication collaborator
//!
//! Token acquisition (OIDC, DPoP proofs) lives outside this crate. Clients
//! only need something that can attach credentials to a request and learn
//! which public key signs rewrap requests.

use crate::error::NanoTdfError;
use crate::transport::HttpRequest;
use async_trait::async_trait;
use std::fmt;
use tracing::debug;

/// Adds credentials to outgoing requests
#[async_trait]
pub trait AuthProvider: Send + Sync {
    /// Told the PEM public key of the request signer before each
    /// authenticated request, so bound tokens can name it
    async fn update_client_public_key(&self, signer_public_key_pem: &str)
        -> Result<(), NanoTdfError>;

    /// Return `request` with auth headers attached
    async fn with_creds(&self, request: HttpRequest) -> Result<HttpRequest, NanoTdfError>;
}

/// Static bearer token
pub struct BearerAuthProvider {
    token: String,
}

impl BearerAuthProvider {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
        }
    }
}

impl fmt::Debug for BearerAuthProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BearerAuthProvider")
            .field("token", &"[REDACTED]")
            .finish()
    }
}

#[async_trait]
impl AuthProvider for BearerAuthProvider {
    async fn update_client_public_key(&self, _signer_public_key_pem: &str) -> Result<(), NanoTdfError> {
        debug!("bearer tokens are not key bound; ignoring signer key update");
        Ok(())
    }

    async fn with_creds(&self, request: HttpRequest) -> Result<HttpRequest, NanoTdfError> {
        Ok(request.with_header("Authorization", format!("Bearer {}", self.token)))
    }
}
