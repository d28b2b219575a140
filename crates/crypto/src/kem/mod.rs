//! Key Encapsulation Mechanisms (KEM)
//!
//! NanoTDF wraps keys with ECDH on P-256: both the per-container DEK
//! derivation and the KAS returning a DEK to a client are key agreements
//! followed by HKDF and AES-GCM.

use crate::helpers::CryptoError;

pub mod ec;

/// Trait for key encapsulation mechanisms
pub trait KeyEncapsulation {
    /// Public key type
    type PublicKey;

    /// Private key type
    type PrivateKey;

    /// Wrapped key type (ciphertext)
    type WrappedKey;

    /// Wrap a symmetric key with a public key
    fn wrap(&self, key: &[u8], public_key: &Self::PublicKey)
        -> Result<Self::WrappedKey, CryptoError>;

    /// Unwrap a symmetric key with a private key
    fn unwrap(
        &self,
        wrapped: &Self::WrappedKey,
        private_key: &Self::PrivateKey,
    ) -> Result<Vec<u8>, CryptoError>;
}
