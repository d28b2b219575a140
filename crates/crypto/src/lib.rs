//! NanoTDF Cryptographic Operations
//!
//! This crate provides the cryptography behind NanoTDF:
//! - Zeroizing key types that automatically clear memory
//! - ECDH (P-256) + HKDF key agreement salted with the container version
//! - AES-256-GCM with 96-128 bit tags and 3-byte IVs
//! - GMAC-digest and ECDSA policy bindings
//! - Unwrapping of KAS-wrapped DEKs
//!
//! # Security Features
//!
//! - **Zeroization**: All key material uses `zeroize` to clear memory on drop
//! - **Constant-time comparison**: binding verification uses `subtle::ConstantTimeEq`
//!
//! # Example
//!
//! ```
//! use nanotdf_crypto::{decrypt_payload, encrypt_single, kas_derive_key, EcKeyPair, HeaderOptions};
//! use nanotdf_protocol::ResourceLocator;
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let kas = EcKeyPair::generate();
//! let ephemeral = EcKeyPair::generate();
//! let locator = ResourceLocator::from_url("https://kas.example.com/kas", None)?;
//!
//! let tdf = encrypt_single(
//!     locator,
//!     kas.public_key(),
//!     &ephemeral,
//!     br#"{"uuid":"example"}"#,
//!     &HeaderOptions::default(),
//!     b"sensitive information",
//! )?;
//!
//! // The KAS derives the same DEK from the header
//! let dek = kas_derive_key(kas.secret_key(), &tdf.header)?;
//! assert_eq!(decrypt_payload(&dek, &tdf)?, b"sensitive information");
//! # Ok(())
//! # }
//! ```

pub mod helpers;
pub mod kem;
pub mod tdf;
pub mod types;

// Re-export commonly used types
pub use helpers::{generate_key_32, generate_nonce, CryptoError};
pub use kem::ec::{
    derive_key, hkdf_salt, parse_public_key_pem, parse_public_key_sec1, public_key_to_pem,
    unwrap_wrapped_key, EcKeyPair, EcWrappedKey, EcdhKem, WrappedKeyIv, SDK_INITIAL_RELEASE,
};
pub use kem::KeyEncapsulation;
pub use tdf::{
    build_header, decrypt_payload, decrypt_policy, encrypt_payload, encrypt_single,
    encrypt_with_header, kas_derive_key, HeaderOptions, TagSize,
};
pub use types::AesKey;

// Re-export underlying crypto libraries
pub use p256;
