//! Cryptographic helper functions
//!
//! The crate error type plus random key and IV generation.

use nanotdf_protocol::ProtocolError;
use rand::{rngs::OsRng, RngCore};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CryptoError {
    #[error("incomplete key pair: {0}")]
    IncompleteKey(&'static str),

    #[error("invalid public key: {0}")]
    InvalidPublicKey(String),

    #[error("invalid private key: {0}")]
    InvalidPrivateKey(String),

    #[error("key agreement failed")]
    KeyAgreement,

    #[error("invalid key length: expected {expected}, got {actual}")]
    InvalidKeyLength { expected: usize, actual: usize },

    #[error("encryption failed")]
    EncryptionFailed,

    #[error("decryption failed")]
    DecryptionFailed,

    #[error("ciphertext too short: {len} bytes cannot hold a {tag_size}-byte tag")]
    CiphertextTooShort { len: usize, tag_size: usize },

    #[error("unsupported cipher: {0}")]
    UnsupportedCipher(String),

    #[error("unsupported policy type: {0}")]
    UnsupportedPolicyType(String),

    #[error("invalid IV length: {0}")]
    InvalidIvLength(usize),

    #[error("IV counter {0} outside 1..=0xFFFFFF")]
    InvalidIvCounter(u32),

    #[error("invalid tag length: expected {expected}, got {actual}")]
    InvalidTagLength { expected: usize, actual: usize },

    #[error("PEM error: {0}")]
    Pem(String),

    #[error("signature error: {0}")]
    Signature(String),

    #[error(transparent)]
    Protocol(#[from] ProtocolError),
}

/// Generate a random 32-byte key
pub fn generate_key_32() -> [u8; 32] {
    let mut key = [0u8; 32];
    OsRng.fill_bytes(&mut key);
    key
}

/// Generate `len` random bytes for an AES-GCM nonce
pub fn generate_nonce(len: usize) -> Vec<u8> {
    let mut nonce = vec![0u8; len];
    OsRng.fill_bytes(&mut nonce);
    nonce
}
