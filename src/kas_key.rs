//! KAS public key retrieval
//!
//! Encryption needs the KAS EC public key to derive the DEK. It is served
//! unauthenticated from `<kas>/v2/kas_public_key`.

use crate::allowlist::validate_secure_url;
use crate::error::NanoTdfError;
use crate::transport::{HttpRequest, KasTransport};
use nanotdf_crypto::p256::PublicKey;
use nanotdf_crypto::parse_public_key_pem;
use nanotdf_protocol::kas::algorithm;
use nanotdf_protocol::KasPublicKeyResponse;
use reqwest::Url;

/// A KAS public key and where it came from
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KasPublicKeyInfo {
    /// KAS base URL the key belongs to
    pub url: String,
    pub algorithm: String,
    /// Key identifier, written into the header's KAS locator
    pub kid: Option<String>,
    pub public_key_pem: String,
}

impl KasPublicKeyInfo {
    /// Parsed P-256 public key
    pub fn key(&self) -> Result<PublicKey, NanoTdfError> {
        parse_public_key_pem(&self.public_key_pem).map_err(|e| {
            NanoTdfError::Configuration(format!("invalid public key from [{}]: {}", self.url, e))
        })
    }
}

/// Public key endpoint for a KAS URL
///
/// Appends `v2/kas_public_key` unless the path already ends with
/// `kas_public_key`, sets `algorithm`, and defaults `v` to 2.
pub fn public_key_url(kas_url: &str, algorithm: &str) -> Result<String, NanoTdfError> {
    let mut url = Url::parse(kas_url)
        .map_err(|e| NanoTdfError::Configuration(format!("KAS definition invalid: [{}]: {}", kas_url, e)))?;

    if !url.path().ends_with("kas_public_key") {
        let mut path = url.path().to_string();
        if !path.ends_with('/') {
            path.push('/');
        }
        path.push_str("v2/kas_public_key");
        url.set_path(&path);
    }

    let mut pairs: Vec<(String, String)> = url
        .query_pairs()
        .filter(|(name, _)| name != "algorithm")
        .map(|(name, value)| (name.into_owned(), value.into_owned()))
        .collect();
    pairs.push(("algorithm".to_string(), algorithm.to_string()));
    if !pairs.iter().any(|(name, _)| name == "v") {
        pairs.push(("v".to_string(), "2".to_string()));
    }
    url.query_pairs_mut().clear().extend_pairs(pairs);

    Ok(url.to_string())
}

/// Fetch the EC (P-256) public key of a KAS
pub async fn fetch_ec_kas_pub_key(
    transport: &dyn KasTransport,
    kas_url: &str,
) -> Result<KasPublicKeyInfo, NanoTdfError> {
    if kas_url.is_empty() {
        return Err(NanoTdfError::Configuration(
            "KAS definition not found".to_string(),
        ));
    }
    validate_secure_url(kas_url);

    let endpoint = public_key_url(kas_url, algorithm::EC_P256)?;
    let response = transport.send(HttpRequest::get(&endpoint)).await?;
    if !response.is_success() {
        return Err(match response.status {
            404 => NanoTdfError::Configuration(format!("404 for [{}]", endpoint)),
            401 => NanoTdfError::Unauthenticated(format!("401 for [{}]", endpoint)),
            403 => NanoTdfError::PermissionDenied {
                reason: format!("403 for [{}]", endpoint),
                required_obligations: Vec::new(),
            },
            status => NanoTdfError::Network(format!("{} => {}", endpoint, status)),
        });
    }

    let parsed: KasPublicKeyResponse = serde_json::from_str(&response.body).map_err(|e| {
        NanoTdfError::Network(format!(
            "invalid response from public key endpoint [{}]: {}",
            endpoint, e
        ))
    })?;
    if parsed.public_key.is_empty() {
        return Err(NanoTdfError::Network(format!(
            "invalid response from public key endpoint [{}]",
            endpoint
        )));
    }

    let info = KasPublicKeyInfo {
        url: kas_url.to_string(),
        algorithm: algorithm::EC_P256.to_string(),
        kid: parsed.kid.filter(|kid| !kid.is_empty()),
        public_key_pem: parsed.public_key,
    };
    info.key()?;
    Ok(info)
}
