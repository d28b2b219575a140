//! KAS (Key Access Service) protocol types
//!
//! Request and response bodies for the NanoTDF rewrap exchange, the KAS
//! public key endpoint, and the platform's key access server registry.
//! The unsigned request carries both the v1 top-level `keyAccess` field and
//! the v2 `requests` list so either generation of KAS can serve it.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Algorithm identifiers used in KAS requests
pub mod algorithm {
    /// EC P-256 algorithm for NanoTDF key agreement
    pub const EC_P256: &str = "ec:secp256r1";
}

/// Key access type for NanoTDF requests
pub const KEY_ACCESS_REMOTE: &str = "remote";

/// Key access protocol name
pub const KAS_PROTOCOL: &str = "kas";

/// Identifier of the single key access object in a NanoTDF request
pub const KEY_ACCESS_OBJECT_ID: &str = "kao-0";

/// Result metadata key listing obligations the caller must fulfil
pub const REQUIRED_OBLIGATIONS_METADATA_KEY: &str = "X-Required-Obligations";

/// NanoTDF key access object: the whole header travels base64-encoded
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NanoKeyAccess {
    #[serde(rename = "type")]
    pub key_type: String,
    pub url: String,
    pub protocol: String,
    /// Base64-encoded NanoTDF header bytes
    pub header: String,
}

impl NanoKeyAccess {
    /// Remote key access for a base64-encoded header
    pub fn remote(header_b64: impl Into<String>) -> Self {
        Self {
            key_type: KEY_ACCESS_REMOTE.to_string(),
            url: String::new(),
            protocol: KAS_PROTOCOL.to_string(),
            header: header_b64.into(),
        }
    }
}

/// Key access object wrapper
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KeyAccessObjectWrapper {
    #[serde(rename = "keyAccessObjectId")]
    pub key_access_object_id: String,
    #[serde(rename = "keyAccessObject")]
    pub key_access_object: NanoKeyAccess,
}

/// Individual policy request entry
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PolicyRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub algorithm: Option<String>,
    #[serde(rename = "keyAccessObjects")]
    pub key_access_objects: Vec<KeyAccessObjectWrapper>,
}

/// Unsigned rewrap request structure (before JWT signing)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UnsignedRewrapRequest {
    #[serde(rename = "clientPublicKey")]
    pub client_public_key: String,
    pub requests: Vec<PolicyRequest>,
    #[serde(rename = "keyAccess")]
    pub key_access: NanoKeyAccess,
    pub algorithm: String,
}

impl UnsignedRewrapRequest {
    /// Request for a single NanoTDF header
    pub fn for_nanotdf(header_b64: impl Into<String>, client_public_key_pem: impl Into<String>) -> Self {
        let key_access = NanoKeyAccess::remote(header_b64);
        Self {
            client_public_key: client_public_key_pem.into(),
            requests: vec![PolicyRequest {
                algorithm: Some(algorithm::EC_P256.to_string()),
                key_access_objects: vec![KeyAccessObjectWrapper {
                    key_access_object_id: KEY_ACCESS_OBJECT_ID.to_string(),
                    key_access_object: key_access.clone(),
                }],
            }],
            key_access,
            algorithm: algorithm::EC_P256.to_string(),
        }
    }
}

/// Signed rewrap request wrapper
///
/// `signed_request_token` is a compact JWS whose `requestBody` claim is the
/// JSON-encoded [`UnsignedRewrapRequest`].
#[derive(Debug, Serialize, Deserialize)]
pub struct SignedRewrapRequest {
    #[serde(rename = "signedRequestToken")]
    pub signed_request_token: String,
}

/// Individual key access rewrap result
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct KeyAccessRewrapResult {
    #[serde(rename = "keyAccessObjectId", default)]
    pub key_access_object_id: String,
    #[serde(default)]
    pub status: String,
    #[serde(rename = "kasWrappedKey", skip_serializing_if = "Option::is_none")]
    pub kas_wrapped_key: Option<String>,
    #[serde(rename = "entityWrappedKey", skip_serializing_if = "Option::is_none")]
    pub entity_wrapped_key: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub metadata: Map<String, Value>,
}

/// What a single rewrap result carries
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RewrapOutcome<'a> {
    /// Base64 wrapped key
    WrappedKey(&'a str),
    /// KAS-reported error
    Error(&'a str),
    /// Neither key nor error
    Missing,
}

impl KeyAccessRewrapResult {
    /// Classify the result
    pub fn outcome(&self) -> RewrapOutcome<'_> {
        if let Some(error) = self.error.as_deref().filter(|e| !e.is_empty()) {
            return RewrapOutcome::Error(error);
        }
        if self.status == "fail" {
            return RewrapOutcome::Error("rewrap failed");
        }
        match self
            .kas_wrapped_key
            .as_deref()
            .or(self.entity_wrapped_key.as_deref())
        {
            Some(key) => RewrapOutcome::WrappedKey(key),
            None => RewrapOutcome::Missing,
        }
    }

    /// Obligation FQNs the KAS requires the caller to fulfil
    pub fn required_obligations(&self) -> Vec<String> {
        self.metadata
            .get(REQUIRED_OBLIGATIONS_METADATA_KEY)
            .and_then(Value::as_array)
            .map(|values| {
                values
                    .iter()
                    .filter_map(Value::as_str)
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default()
    }
}

/// Policy rewrap result
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PolicyRewrapResult {
    #[serde(rename = "policyId", default)]
    pub policy_id: String,
    #[serde(default)]
    pub results: Vec<KeyAccessRewrapResult>,
}

/// Rewrap response covering both the v1 and v2 shapes
///
/// v1: `{metadata, entityWrappedKey, sessionPublicKey, schemaVersion}`.
/// v2: `{sessionPublicKey, responses: [{policyId, results: [...]}]}`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RewrapResponse {
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub metadata: Map<String, Value>,
    #[serde(rename = "entityWrappedKey", skip_serializing_if = "Option::is_none")]
    pub entity_wrapped_key: Option<String>,
    #[serde(rename = "sessionPublicKey", default)]
    pub session_public_key: String,
    #[serde(rename = "schemaVersion", skip_serializing_if = "Option::is_none")]
    pub schema_version: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub responses: Vec<PolicyRewrapResult>,
}

impl RewrapResponse {
    /// Rewrite a v1 response into the v2 `responses` shape; v2 responses
    /// are left as they are
    pub fn upgrade_v1(&mut self) {
        if !self.responses.is_empty() {
            return;
        }
        if let Some(key) = self.entity_wrapped_key.take() {
            self.responses.push(PolicyRewrapResult {
                policy_id: "policy".to_string(),
                results: vec![KeyAccessRewrapResult {
                    key_access_object_id: KEY_ACCESS_OBJECT_ID.to_string(),
                    status: "permit".to_string(),
                    kas_wrapped_key: Some(key),
                    metadata: self.metadata.clone(),
                    ..Default::default()
                }],
            });
        }
    }

    /// First result of the first response
    pub fn first_result(&self) -> Option<&KeyAccessRewrapResult> {
        self.responses.first()?.results.first()
    }
}

/// Response from `/v2/kas_public_key`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KasPublicKeyResponse {
    #[serde(rename = "publicKey")]
    pub public_key: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kid: Option<String>,
}

/// Registered key access server
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KeyAccessServer {
    pub uri: String,
}

/// Pagination cursor in registry listings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Pagination {
    #[serde(rename = "nextOffset", default)]
    pub next_offset: u64,
}

/// One page of `/key-access-servers`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct KeyAccessServerList {
    #[serde(rename = "keyAccessServers", default)]
    pub key_access_servers: Vec<KeyAccessServer>,
    #[serde(default)]
    pub pagination: Pagination,
}
