//! Zeroizing cryptographic key types
//!
//! Key material is cleared from memory on drop and never shows up in `Debug`
//! output.

use crate::helpers::CryptoError;
use std::fmt;
use zeroize::{Zeroize, ZeroizeOnDrop};

/// AES-256 key (32 bytes) that zeroizes on drop
#[derive(Clone, Zeroize, ZeroizeOnDrop, PartialEq, Eq)]
pub struct AesKey(pub(crate) [u8; 32]);

impl AesKey {
    /// Create a new AES key from a 32-byte slice
    pub fn from_slice(bytes: &[u8]) -> Result<Self, CryptoError> {
        if bytes.len() != 32 {
            return Err(CryptoError::InvalidKeyLength {
                expected: 32,
                actual: bytes.len(),
            });
        }
        let mut key = [0u8; 32];
        key.copy_from_slice(bytes);
        Ok(AesKey(key))
    }

    /// Generate a random key
    pub fn generate() -> Self {
        AesKey(crate::helpers::generate_key_32())
    }

    /// Get a reference to the key bytes
    pub fn as_slice(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Debug for AesKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("AesKey([REDACTED])")
    }
}
