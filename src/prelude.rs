//! NanoTDF prelude
//!
//! ```rust
//! use nanotdf::prelude::*;
//!
//! let config = ClientConfig::new("https://kas.example.com/kas");
//! let options = EncryptOptions::default().with_ecdsa_binding(true);
//! # let _ = (config, options);
//! ```

pub use crate::{
    AuthProvider, BearerAuthProvider, CacheConfig, ClientConfig, DatasetConfig, DatasetSession,
    EncryptOptions, KasTransport, NanoTdfClient, NanoTdfError, PolicyBuilder, ReqwestTransport,
    RewrapCache, RewrapClient,
};

pub use nanotdf_crypto::{AesKey, EcKeyPair, TagSize};
pub use nanotdf_protocol::{NanoTdf, PolicyType, SymmetricCipher};
