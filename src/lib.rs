//! NanoTDF client
//!
//! Encrypts data into NanoTDF containers and decrypts them by asking a Key
//! Access Service (KAS) to rewrap the container key:
//! - [`NanoTdfClient`]: single-use client, one container per ephemeral key
//! - [`DatasetSession`]: many records under one header with a rotating IV
//! - [`RewrapClient`]: signed rewrap requests against an allow-listed KAS
//! - [`RewrapCache`]: DEK reuse across containers sharing an ephemeral key
//!
//! Wire types live in [`nanotdf_protocol`], cryptography in [`nanotdf_crypto`].

pub mod allowlist;
pub mod auth;
pub mod cache;
pub mod client;
pub mod config;
pub mod dataset;
pub mod error;
pub mod jws;
pub mod kas;
pub mod kas_key;
pub mod policy;
pub mod prelude;
pub mod transport;

pub use allowlist::OriginAllowList;
pub use auth::{AuthProvider, BearerAuthProvider};
pub use cache::RewrapCache;
pub use client::NanoTdfClient;
pub use config::{CacheConfig, ClientConfig, DatasetConfig, EncryptOptions, MAX_KEY_ITERATIONS};
pub use dataset::{DatasetSession, SessionState};
pub use error::{error_from_status, ErrorCategory, NanoTdfError};
pub use jws::RequestSigner;
pub use kas::{RewrapClient, RewrapKeyResult, CLIENT_VERSION};
pub use kas_key::{fetch_ec_kas_pub_key, KasPublicKeyInfo};
pub use policy::{AttributeObject, Policy, PolicyBuilder};
pub use transport::{HttpMethod, HttpRequest, HttpResponse, KasTransport, ReqwestTransport};

pub use nanotdf_crypto;
pub use nanotdf_protocol;
