//! NanoTDF AES-256-GCM
//!
//! AES-256-GCM with the tag lengths NanoTDF cipher ids name and the two nonce
//! widths that appear in practice: 12 bytes (standard) and 3 bytes (pre-1.0
//! payloads and legacy wrapped keys).
//!
//! RustCrypto's `aes-gcm` only supports 96-128 bit tags, so the 64-bit cipher
//! id is rejected as unsupported.

use crate::helpers::CryptoError;
use crate::types::AesKey;
use aes_gcm::aead::generic_array::{ArrayLength, GenericArray};
use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::AesGcm;
use nanotdf_protocol::nanotdf::SymmetricCipher;
use typenum::{Unsigned, U12, U13, U14, U15, U16, U3};

/// Tag size for AES-256-GCM
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TagSize {
    /// 96-bit tag (12 bytes)
    Bits96 = 12,
    /// 104-bit tag (13 bytes)
    Bits104 = 13,
    /// 112-bit tag (14 bytes)
    Bits112 = 14,
    /// 120-bit tag (15 bytes)
    Bits120 = 15,
    /// 128-bit tag (16 bytes) - standard GCM
    Bits128 = 16,
}

impl TagSize {
    /// Get tag size in bytes
    pub fn bytes(self) -> usize {
        self as usize
    }

    /// Create from byte count
    pub fn from_bytes(bytes: usize) -> Result<Self, CryptoError> {
        match bytes {
            12 => Ok(TagSize::Bits96),
            13 => Ok(TagSize::Bits104),
            14 => Ok(TagSize::Bits112),
            15 => Ok(TagSize::Bits120),
            16 => Ok(TagSize::Bits128),
            _ => Err(CryptoError::InvalidTagLength {
                expected: 16,
                actual: bytes,
            }),
        }
    }

    /// Tag size a header cipher id calls for
    pub fn for_cipher(cipher: SymmetricCipher) -> Result<Self, CryptoError> {
        match cipher {
            SymmetricCipher::Aes256Gcm64 => Err(CryptoError::UnsupportedCipher(
                "AES-256-GCM with a 64-bit tag".to_string(),
            )),
            other => Self::from_bytes(other.tag_size()),
        }
    }
}

fn seal<N, T>(key: &AesKey, nonce: &[u8], plaintext: &[u8]) -> Result<Vec<u8>, CryptoError>
where
    N: ArrayLength<u8>,
    T: aes_gcm::TagSize,
{
    let cipher = AesGcm::<aes::Aes256, N, T>::new_from_slice(key.as_slice()).map_err(|_| {
        CryptoError::InvalidKeyLength {
            expected: 32,
            actual: key.as_slice().len(),
        }
    })?;
    cipher
        .encrypt(GenericArray::from_slice(nonce), plaintext)
        .map_err(|_| CryptoError::EncryptionFailed)
}

fn open<N, T>(key: &AesKey, nonce: &[u8], sealed: &[u8]) -> Result<Vec<u8>, CryptoError>
where
    N: ArrayLength<u8>,
    T: aes_gcm::TagSize,
{
    let cipher = AesGcm::<aes::Aes256, N, T>::new_from_slice(key.as_slice()).map_err(|_| {
        CryptoError::InvalidKeyLength {
            expected: 32,
            actual: key.as_slice().len(),
        }
    })?;
    cipher
        .decrypt(GenericArray::from_slice(nonce), sealed)
        .map_err(|_| CryptoError::DecryptionFailed)
}

fn seal_with_nonce<N: ArrayLength<u8>>(
    key: &AesKey,
    nonce: &[u8],
    plaintext: &[u8],
    tag_size: TagSize,
) -> Result<Vec<u8>, CryptoError> {
    if nonce.len() != N::USIZE {
        return Err(CryptoError::InvalidIvLength(nonce.len()));
    }
    match tag_size {
        TagSize::Bits96 => seal::<N, U12>(key, nonce, plaintext),
        TagSize::Bits104 => seal::<N, U13>(key, nonce, plaintext),
        TagSize::Bits112 => seal::<N, U14>(key, nonce, plaintext),
        TagSize::Bits120 => seal::<N, U15>(key, nonce, plaintext),
        TagSize::Bits128 => seal::<N, U16>(key, nonce, plaintext),
    }
}

fn open_with_nonce<N: ArrayLength<u8>>(
    key: &AesKey,
    nonce: &[u8],
    sealed: &[u8],
    tag_size: TagSize,
) -> Result<Vec<u8>, CryptoError> {
    if nonce.len() != N::USIZE {
        return Err(CryptoError::InvalidIvLength(nonce.len()));
    }
    match tag_size {
        TagSize::Bits96 => open::<N, U12>(key, nonce, sealed),
        TagSize::Bits104 => open::<N, U13>(key, nonce, sealed),
        TagSize::Bits112 => open::<N, U14>(key, nonce, sealed),
        TagSize::Bits120 => open::<N, U15>(key, nonce, sealed),
        TagSize::Bits128 => open::<N, U16>(key, nonce, sealed),
    }
}

/// Encrypt with AES-256-GCM
///
/// # Returns
/// Ciphertext || Tag (tag is appended to ciphertext)
pub fn encrypt(
    key: &AesKey,
    nonce: &[u8],
    plaintext: &[u8],
    tag_size: TagSize,
) -> Result<Vec<u8>, CryptoError> {
    match nonce.len() {
        3 => seal_with_nonce::<U3>(key, nonce, plaintext, tag_size),
        12 => seal_with_nonce::<U12>(key, nonce, plaintext, tag_size),
        other => Err(CryptoError::InvalidIvLength(other)),
    }
}

/// Decrypt AES-256-GCM output (ciphertext with appended tag)
///
/// Input shorter than the tag is rejected before the cipher runs.
pub fn decrypt(
    key: &AesKey,
    nonce: &[u8],
    ciphertext_and_tag: &[u8],
    tag_size: TagSize,
) -> Result<Vec<u8>, CryptoError> {
    if ciphertext_and_tag.len() < tag_size.bytes() {
        return Err(CryptoError::CiphertextTooShort {
            len: ciphertext_and_tag.len(),
            tag_size: tag_size.bytes(),
        });
    }
    match nonce.len() {
        3 => open_with_nonce::<U3>(key, nonce, ciphertext_and_tag, tag_size),
        12 => open_with_nonce::<U12>(key, nonce, ciphertext_and_tag, tag_size),
        other => Err(CryptoError::InvalidIvLength(other)),
    }
}
