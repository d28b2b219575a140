//! Elliptic Curve key agreement for NanoTDF
//!
//! # Protocol Flow
//!
//! 1. ECDH: private × peer public → shared secret (x-coordinate)
//! 2. HKDF-SHA256 with salt = SHA256(magic number and version), empty info
//! 3. The 32-byte output is an AES-256-GCM key
//!
//! The same derivation protects the payload DEK (ephemeral key × KAS key) and
//! the DEK the KAS returns to a client (client key × KAS session key).

use super::KeyEncapsulation;
use crate::helpers::{generate_nonce, CryptoError};
use crate::tdf::nanotdf_crypto::{decrypt, encrypt, TagSize};
use crate::types::AesKey;
use hkdf::Hkdf;
use p256::ecdsa::SigningKey;
use p256::elliptic_curve::sec1::ToEncodedPoint;
use p256::pkcs8::{DecodePrivateKey, DecodePublicKey, EncodePublicKey, LineEnding};
use p256::{PublicKey, SecretKey};
use rand::rngs::OsRng;
use sha2::{Digest, Sha256};
use std::fmt;
use zeroize::Zeroizing;

/// Client version whose KAS responses use a 3-byte wrapped-key IV
pub const SDK_INITIAL_RELEASE: &str = "0.0.0";

/// Length of the DEK inside a wrapped key
const WRAPPED_DEK_LENGTH: usize = 32;

/// HKDF salt for a container version: SHA256 of its magic bytes
pub fn hkdf_salt(magic: &[u8]) -> [u8; 32] {
    Sha256::digest(magic).into()
}

/// Derive an AES-256-GCM key from an ECDH agreement
pub fn derive_key(
    private_key: &SecretKey,
    peer_public_key: &PublicKey,
    salt_input: &[u8],
) -> Result<AesKey, CryptoError> {
    let shared_secret = p256::elliptic_curve::ecdh::diffie_hellman(
        private_key.to_nonzero_scalar(),
        peer_public_key.as_affine(),
    );
    let salt = hkdf_salt(salt_input);
    let hkdf = Hkdf::<Sha256>::new(Some(&salt), shared_secret.raw_secret_bytes());
    let mut okm = Zeroizing::new([0u8; 32]);
    hkdf.expand(&[], &mut okm[..])
        .map_err(|_| CryptoError::KeyAgreement)?;
    AesKey::from_slice(&okm[..])
}

/// Parse a SPKI PEM public key
pub fn parse_public_key_pem(pem: &str) -> Result<PublicKey, CryptoError> {
    PublicKey::from_public_key_pem(pem).map_err(|e| CryptoError::Pem(e.to_string()))
}

/// Parse a SEC1 (compressed or uncompressed) public key
pub fn parse_public_key_sec1(bytes: &[u8]) -> Result<PublicKey, CryptoError> {
    PublicKey::from_sec1_bytes(bytes).map_err(|_| {
        CryptoError::InvalidPublicKey(format!("{} bytes are not a P-256 point", bytes.len()))
    })
}

/// Encode a public key as SPKI PEM
pub fn public_key_to_pem(public_key: &PublicKey) -> Result<String, CryptoError> {
    public_key
        .to_public_key_pem(LineEnding::LF)
        .map_err(|e| CryptoError::Pem(e.to_string()))
}

/// P-256 key pair used for ECDH (and, for ECDSA policy bindings, signing)
#[derive(Clone)]
pub struct EcKeyPair {
    secret: SecretKey,
    public: PublicKey,
}

impl EcKeyPair {
    /// Generate a fresh key pair
    pub fn generate() -> Self {
        Self::from_secret(SecretKey::random(&mut OsRng))
    }

    /// Key pair for an existing private key
    pub fn from_secret(secret: SecretKey) -> Self {
        let public = secret.public_key();
        Self { secret, public }
    }

    /// Assemble a key pair from optional halves
    pub fn from_parts(
        secret: Option<SecretKey>,
        public: Option<PublicKey>,
    ) -> Result<Self, CryptoError> {
        let secret = secret.ok_or(CryptoError::IncompleteKey("private key missing"))?;
        let public = public.ok_or(CryptoError::IncompleteKey("public key missing"))?;
        if secret.public_key() != public {
            return Err(CryptoError::InvalidPrivateKey(
                "private key does not match public key".to_string(),
            ));
        }
        Ok(Self { secret, public })
    }

    /// Load a PKCS#8 PEM private key
    pub fn from_pkcs8_pem(pem: &str) -> Result<Self, CryptoError> {
        let secret =
            SecretKey::from_pkcs8_pem(pem).map_err(|e| CryptoError::InvalidPrivateKey(e.to_string()))?;
        Ok(Self::from_secret(secret))
    }

    pub fn secret_key(&self) -> &SecretKey {
        &self.secret
    }

    pub fn public_key(&self) -> &PublicKey {
        &self.public
    }

    /// SEC1 compressed public key, as carried in NanoTDF headers
    pub fn public_key_compressed(&self) -> Vec<u8> {
        self.public.to_encoded_point(true).as_bytes().to_vec()
    }

    pub fn public_key_pem(&self) -> Result<String, CryptoError> {
        public_key_to_pem(&self.public)
    }

    /// ECDSA signing key over the same scalar
    pub fn signing_key(&self) -> SigningKey {
        SigningKey::from(&self.secret)
    }

    /// Derive the AES key shared with `peer`
    pub fn derive_key(&self, peer: &PublicKey, salt_input: &[u8]) -> Result<AesKey, CryptoError> {
        derive_key(&self.secret, peer, salt_input)
    }
}

impl fmt::Debug for EcKeyPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EcKeyPair")
            .field("public", &self.public_key_compressed())
            .field("secret", &"[REDACTED]")
            .finish()
    }
}

/// IV width at the front of a KAS-wrapped key
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WrappedKeyIv {
    /// 3 bytes, for clients reporting the initial SDK release
    Legacy,
    /// 12 bytes
    Standard,
}

impl WrappedKeyIv {
    /// IV width a KAS uses for a given client version
    pub fn for_client_version(client_version: &str) -> Self {
        if client_version == SDK_INITIAL_RELEASE {
            WrappedKeyIv::Legacy
        } else {
            WrappedKeyIv::Standard
        }
    }

    pub fn byte_length(self) -> usize {
        match self {
            WrappedKeyIv::Legacy => 3,
            WrappedKeyIv::Standard => 12,
        }
    }
}

/// Decrypt a KAS-wrapped DEK: `iv || ciphertext(32) || tag`
///
/// The tag length is whatever follows the 32 DEK bytes.
pub fn unwrap_wrapped_key(
    wrapped: &[u8],
    iv: WrappedKeyIv,
    unwrap_key: &AesKey,
) -> Result<AesKey, CryptoError> {
    let iv_len = iv.byte_length();
    if wrapped.len() < iv_len + WRAPPED_DEK_LENGTH {
        return Err(CryptoError::CiphertextTooShort {
            len: wrapped.len(),
            tag_size: iv_len + WRAPPED_DEK_LENGTH,
        });
    }
    let (nonce, sealed) = wrapped.split_at(iv_len);
    let tag_size = TagSize::from_bytes(sealed.len() - WRAPPED_DEK_LENGTH)?;
    let dek = Zeroizing::new(decrypt(unwrap_key, nonce, sealed, tag_size)?);
    AesKey::from_slice(&dek)
}

/// A DEK wrapped for a client together with the wrapping session key
#[derive(Debug, Clone)]
pub struct EcWrappedKey {
    pub session_public_key: PublicKey,
    pub wrapped: Vec<u8>,
}

/// ECDH key encapsulation as a KAS performs it when answering a rewrap
#[derive(Debug, Clone)]
pub struct EcdhKem {
    salt_input: Vec<u8>,
    iv: WrappedKeyIv,
}

impl EcdhKem {
    /// KEM salted with a container's magic bytes
    pub fn new(salt_input: &[u8], iv: WrappedKeyIv) -> Self {
        Self {
            salt_input: salt_input.to_vec(),
            iv,
        }
    }
}

impl KeyEncapsulation for EcdhKem {
    type PublicKey = PublicKey;
    type PrivateKey = SecretKey;
    type WrappedKey = EcWrappedKey;

    fn wrap(&self, key: &[u8], public_key: &PublicKey) -> Result<EcWrappedKey, CryptoError> {
        let session = EcKeyPair::generate();
        let wrapping_key = session.derive_key(public_key, &self.salt_input)?;
        let mut wrapped = generate_nonce(self.iv.byte_length());
        let sealed = encrypt(&wrapping_key, &wrapped, key, TagSize::Bits128)?;
        wrapped.extend_from_slice(&sealed);
        Ok(EcWrappedKey {
            session_public_key: *session.public_key(),
            wrapped,
        })
    }

    fn unwrap(&self, wrapped: &EcWrappedKey, private_key: &SecretKey) -> Result<Vec<u8>, CryptoError> {
        let unwrap_key = derive_key(private_key, &wrapped.session_public_key, &self.salt_input)?;
        let dek = unwrap_wrapped_key(&wrapped.wrapped, self.iv, &unwrap_key)?;
        Ok(dek.as_slice().to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nanotdf_protocol::nanotdf::{HKDF_SALT, MAGIC_NUMBER_AND_VERSION};

    #[test]
    fn test_salt_matches_constant() {
        assert_eq!(hkdf_salt(&MAGIC_NUMBER_AND_VERSION), HKDF_SALT);
    }

    #[test]
    fn test_key_agreement_symmetry() {
        let alice = EcKeyPair::generate();
        let bob = EcKeyPair::generate();
        let ab = alice.derive_key(bob.public_key(), b"L1L").unwrap();
        let ba = bob.derive_key(alice.public_key(), b"L1L").unwrap();
        assert_eq!(ab, ba);

        let other_version = alice.derive_key(bob.public_key(), b"L1M").unwrap();
        assert_ne!(ab, other_version);
    }

    #[test]
    fn test_compressed_key_and_pem() {
        let pair = EcKeyPair::generate();
        let compressed = pair.public_key_compressed();
        assert_eq!(compressed.len(), 33);
        assert_eq!(&parse_public_key_sec1(&compressed).unwrap(), pair.public_key());

        let pem = pair.public_key_pem().unwrap();
        assert!(pem.starts_with("-----BEGIN PUBLIC KEY-----"));
        assert_eq!(&parse_public_key_pem(&pem).unwrap(), pair.public_key());
    }

    #[test]
    fn test_from_parts() {
        let pair = EcKeyPair::generate();
        let other = EcKeyPair::generate();
        assert!(matches!(
            EcKeyPair::from_parts(None, Some(*pair.public_key())),
            Err(CryptoError::IncompleteKey(_))
        ));
        assert!(matches!(
            EcKeyPair::from_parts(Some(pair.secret_key().clone()), None),
            Err(CryptoError::IncompleteKey(_))
        ));
        assert!(EcKeyPair::from_parts(
            Some(pair.secret_key().clone()),
            Some(*other.public_key())
        )
        .is_err());
        assert!(
            EcKeyPair::from_parts(Some(pair.secret_key().clone()), Some(*pair.public_key())).is_ok()
        );
    }

    #[test]
    fn test_kem_wrap_unwrap_both_iv_widths() {
        let client = EcKeyPair::generate();
        let dek = AesKey::generate();

        for iv in [WrappedKeyIv::Standard, WrappedKeyIv::Legacy] {
            let kem = EcdhKem::new(&MAGIC_NUMBER_AND_VERSION, iv);
            let wrapped = kem.wrap(dek.as_slice(), client.public_key()).unwrap();
            assert_eq!(wrapped.wrapped.len(), iv.byte_length() + 32 + 16);
            let unwrapped = kem.unwrap(&wrapped, client.secret_key()).unwrap();
            assert_eq!(unwrapped, dek.as_slice());
        }
    }

    #[test]
    fn test_wrapped_key_too_short() {
        let key = AesKey::generate();
        assert!(matches!(
            unwrap_wrapped_key(&[0u8; 20], WrappedKeyIv::Standard, &key),
            Err(CryptoError::CiphertextTooShort { .. })
        ));
    }

    #[test]
    fn test_client_version_iv() {
        assert_eq!(WrappedKeyIv::for_client_version("0.0.0"), WrappedKeyIv::Legacy);
        assert_eq!(WrappedKeyIv::for_client_version("0.0.1"), WrappedKeyIv::Standard);
    }
}
