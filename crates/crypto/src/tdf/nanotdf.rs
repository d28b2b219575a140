//! NanoTDF encryption engine
//!
//! # Process
//!
//! 1. ECDH between the ephemeral key pair and the KAS public key, HKDF with
//!    salt = SHA256(magic number and version) → DEK
//! 2. Encrypt the policy under the DEK with an all-zero nonce
//! 3. Bind the policy (GMAC digest or ECDSA signature)
//! 4. Assemble the header
//! 5. Encrypt the payload under the DEK with nonce = 9 zero bytes || 3-byte IV
//!
//! A single-use container runs all five steps with IV 1. A dataset runs
//! steps 1-4 once and then step 5 per record with increasing IVs.

use crate::helpers::CryptoError;
use crate::kem::ec::{derive_key, parse_public_key_sec1, EcKeyPair};
use crate::tdf::binding::policy_binding;
use crate::tdf::nanotdf_crypto::{decrypt, encrypt, TagSize};
use crate::types::AesKey;
use nanotdf_protocol::nanotdf::{
    EccAndBindingMode, EccMode, Header, NanoTdf, Payload, PayloadSignatureMode, Policy,
    PolicyBody, PolicyType, ResourceLocator, SymmetricAndPayloadConfig, SymmetricCipher,
    IV_LENGTH, MAGIC_NUMBER_AND_VERSION, MAX_PAYLOAD_LENGTH,
};
use nanotdf_protocol::ProtocolError;
use p256::{PublicKey, SecretKey};

/// GCM nonce for policy encryption
const POLICY_NONCE: [u8; 12] = [0u8; 12];

/// Header construction choices
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HeaderOptions {
    /// Sign the policy with ECDSA instead of the GMAC digest
    pub use_ecdsa_binding: bool,
    /// Payload and policy cipher
    pub symmetric_cipher: SymmetricCipher,
    /// Embedded encrypted or embedded plaintext
    pub policy_type: PolicyType,
}

impl Default for HeaderOptions {
    fn default() -> Self {
        Self {
            use_ecdsa_binding: false,
            symmetric_cipher: SymmetricCipher::Aes256Gcm128,
            policy_type: PolicyType::EmbeddedEncrypted,
        }
    }
}

/// Derive the DEK and build a header for it
///
/// `policy` is the plaintext policy JSON.
pub fn build_header(
    kas: ResourceLocator,
    kas_public_key: &PublicKey,
    ephemeral: &EcKeyPair,
    policy: &[u8],
    options: &HeaderOptions,
) -> Result<(Header, AesKey), CryptoError> {
    let tag_size = TagSize::for_cipher(options.symmetric_cipher)?;
    let dek = ephemeral.derive_key(kas_public_key, &MAGIC_NUMBER_AND_VERSION)?;

    let content = match options.policy_type {
        PolicyType::EmbeddedEncrypted => encrypt(&dek, &POLICY_NONCE, policy, tag_size)?,
        PolicyType::EmbeddedPlaintext => policy.to_vec(),
        other => {
            return Err(CryptoError::UnsupportedPolicyType(format!("{:?}", other)));
        }
    };
    let binding = policy_binding(options.use_ecdsa_binding, ephemeral, &content);
    let body = if options.policy_type == PolicyType::EmbeddedEncrypted {
        PolicyBody::EmbeddedEncrypted(content)
    } else {
        PolicyBody::EmbeddedPlaintext(content)
    };

    let header = Header::new(
        kas,
        EccAndBindingMode::new(options.use_ecdsa_binding, EccMode::Secp256r1),
        SymmetricAndPayloadConfig::new(PayloadSignatureMode::none(), options.symmetric_cipher),
        Policy::new(body, binding),
        ephemeral.public_key_compressed(),
    )?;
    Ok((header, dek))
}

/// Encrypt one record under `dek` with the given IV counter
pub fn encrypt_payload(
    dek: &AesKey,
    iv_counter: u32,
    plaintext: &[u8],
    cipher: SymmetricCipher,
) -> Result<Payload, CryptoError> {
    if iv_counter == 0 || iv_counter > MAX_PAYLOAD_LENGTH {
        return Err(CryptoError::InvalidIvCounter(iv_counter));
    }
    let tag_size = TagSize::for_cipher(cipher)?;
    let len = IV_LENGTH + plaintext.len() + tag_size.bytes();
    if len > MAX_PAYLOAD_LENGTH as usize {
        return Err(ProtocolError::PayloadTooLarge { len }.into());
    }

    let iv = Payload::iv_from_counter(iv_counter);
    let mut nonce = [0u8; 12];
    nonce[12 - IV_LENGTH..].copy_from_slice(&iv);
    let sealed = encrypt(dek, &nonce, plaintext, tag_size)?;
    Ok(Payload::from_sealed(iv, sealed, tag_size.bytes())?)
}

/// Encrypt one record into a container that reuses `header`
pub fn encrypt_with_header(
    dek: &AesKey,
    header: &Header,
    iv_counter: u32,
    plaintext: &[u8],
) -> Result<NanoTdf, CryptoError> {
    let payload = encrypt_payload(dek, iv_counter, plaintext, header.symmetric_cipher())?;
    Ok(NanoTdf::new(header.clone(), payload, None)?)
}

/// Full single-use encryption with IV 1
pub fn encrypt_single(
    kas: ResourceLocator,
    kas_public_key: &PublicKey,
    ephemeral: &EcKeyPair,
    policy: &[u8],
    options: &HeaderOptions,
    plaintext: &[u8],
) -> Result<NanoTdf, CryptoError> {
    let (header, dek) = build_header(kas, kas_public_key, ephemeral, policy, options)?;
    encrypt_with_header(&dek, &header, 1, plaintext)
}

/// Decrypt a container's payload with its DEK
pub fn decrypt_payload(dek: &AesKey, tdf: &NanoTdf) -> Result<Vec<u8>, CryptoError> {
    let tag_size = TagSize::for_cipher(tdf.header.symmetric_cipher())?;
    decrypt(dek, &tdf.payload.nonce(), &tdf.payload.sealed(), tag_size)
}

/// Recover the plaintext policy from a header
pub fn decrypt_policy(dek: &AesKey, header: &Header) -> Result<Vec<u8>, CryptoError> {
    match &header.policy.body {
        PolicyBody::EmbeddedPlaintext(content) => Ok(content.clone()),
        PolicyBody::EmbeddedEncrypted(content) => {
            let tag_size = TagSize::for_cipher(header.symmetric_cipher())?;
            decrypt(dek, &POLICY_NONCE, content, tag_size)
        }
        other => Err(CryptoError::UnsupportedPolicyType(format!(
            "{:?}",
            other.policy_type()
        ))),
    }
}

/// DEK of a header as the KAS holding `kas_private_key` derives it
pub fn kas_derive_key(kas_private_key: &SecretKey, header: &Header) -> Result<AesKey, CryptoError> {
    let ephemeral = parse_public_key_sec1(&header.ephemeral_public_key)?;
    derive_key(
        kas_private_key,
        &ephemeral,
        header.magic_number_and_version.as_bytes(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tdf::binding::{gmac_binding, verify_header_binding};
    use nanotdf_protocol::nanotdf::IvConvention;

    fn kas() -> ResourceLocator {
        ResourceLocator::from_url("https://kas.example.com/kas", None).unwrap()
    }

    #[test]
    fn test_single_use_roundtrip_through_kas_derivation() {
        let kas_keys = EcKeyPair::generate();
        let ephemeral = EcKeyPair::generate();
        let policy = br#"{"uuid":"u","body":{"dataAttributes":[],"dissem":[]}}"#;

        let tdf = encrypt_single(
            kas(),
            kas_keys.public_key(),
            &ephemeral,
            policy,
            &HeaderOptions::default(),
            b"hello world",
        )
        .unwrap();
        assert_eq!(tdf.payload.iv, [0, 0, 1]);
        assert_eq!(tdf.header.ephemeral_public_key.len(), 33);

        let bytes = tdf.to_bytes().unwrap();
        let parsed = NanoTdf::from_bytes(&bytes).unwrap();
        let dek = kas_derive_key(kas_keys.secret_key(), &parsed.header).unwrap();
        assert_eq!(decrypt_payload(&dek, &parsed).unwrap(), b"hello world");
        assert_eq!(decrypt_policy(&dek, &parsed.header).unwrap(), policy);
    }

    #[test]
    fn test_gmac_binding_over_encrypted_policy() {
        let kas_keys = EcKeyPair::generate();
        let ephemeral = EcKeyPair::generate();
        let (header, _) = build_header(
            kas(),
            kas_keys.public_key(),
            &ephemeral,
            b"{}",
            &HeaderOptions::default(),
        )
        .unwrap();
        let content = header.policy.content().unwrap();
        assert_eq!(content.len(), 2 + 16);
        assert_eq!(header.policy.binding, gmac_binding(content));
        assert!(verify_header_binding(&header).unwrap());
    }

    #[test]
    fn test_ecdsa_binding_header() {
        let kas_keys = EcKeyPair::generate();
        let ephemeral = EcKeyPair::generate();
        let options = HeaderOptions {
            use_ecdsa_binding: true,
            ..HeaderOptions::default()
        };
        let (header, _) =
            build_header(kas(), kas_keys.public_key(), &ephemeral, b"{}", &options).unwrap();
        assert!(header.use_ecdsa_binding());

        let reparsed = Header::parse(&nanotdf_protocol::binary::BinaryWrite::to_bytes(&header).unwrap())
            .unwrap()
            .0;
        assert_eq!(reparsed, header);
        assert!(verify_header_binding(&reparsed).unwrap());
    }

    #[test]
    fn test_plaintext_policy() {
        let kas_keys = EcKeyPair::generate();
        let options = HeaderOptions {
            policy_type: PolicyType::EmbeddedPlaintext,
            ..HeaderOptions::default()
        };
        let (header, dek) = build_header(
            kas(),
            kas_keys.public_key(),
            &EcKeyPair::generate(),
            b"{\"uuid\":\"x\"}",
            &options,
        )
        .unwrap();
        assert_eq!(header.policy.content().unwrap(), b"{\"uuid\":\"x\"}");
        assert_eq!(decrypt_policy(&dek, &header).unwrap(), b"{\"uuid\":\"x\"}");
    }

    #[test]
    fn test_remote_policy_type_unsupported() {
        let kas_keys = EcKeyPair::generate();
        let options = HeaderOptions {
            policy_type: PolicyType::Remote,
            ..HeaderOptions::default()
        };
        assert!(matches!(
            build_header(kas(), kas_keys.public_key(), &EcKeyPair::generate(), b"{}", &options),
            Err(CryptoError::UnsupportedPolicyType(_))
        ));
    }

    #[test]
    fn test_iv_counter_range() {
        let dek = AesKey::generate();
        let cipher = SymmetricCipher::Aes256Gcm128;
        assert!(matches!(
            encrypt_payload(&dek, 0, b"x", cipher),
            Err(CryptoError::InvalidIvCounter(0))
        ));
        assert!(matches!(
            encrypt_payload(&dek, 0x0100_0000, b"x", cipher),
            Err(CryptoError::InvalidIvCounter(_))
        ));
        let payload = encrypt_payload(&dek, 0x00FF_FFFF, b"x", cipher).unwrap();
        assert_eq!(payload.iv, [0xFF, 0xFF, 0xFF]);
    }

    #[test]
    fn test_dataset_records_share_header() {
        let kas_keys = EcKeyPair::generate();
        let (header, dek) = build_header(
            kas(),
            kas_keys.public_key(),
            &EcKeyPair::generate(),
            b"{}",
            &HeaderOptions::default(),
        )
        .unwrap();
        let first = encrypt_with_header(&dek, &header, 1, b"one").unwrap();
        let second = encrypt_with_header(&dek, &header, 2, b"two").unwrap();
        assert_eq!(first.header, second.header);
        assert_ne!(first.payload.iv, second.payload.iv);
        assert_eq!(decrypt_payload(&dek, &second).unwrap(), b"two");
    }

    #[test]
    fn test_legacy_payload_nonce() {
        let dek = AesKey::generate();
        let sealed = encrypt(&dek, &[0, 0, 1], b"old", TagSize::Bits128).unwrap();
        let mut payload = Payload::from_sealed([0, 0, 1], sealed, 16).unwrap();
        payload.convention = IvConvention::Legacy;

        let kas_keys = EcKeyPair::generate();
        let (header, _) = build_header(
            kas(),
            kas_keys.public_key(),
            &EcKeyPair::generate(),
            b"{}",
            &HeaderOptions::default(),
        )
        .unwrap();
        let tdf = NanoTdf::new(header, payload, None).unwrap();
        assert_eq!(decrypt_payload(&dek, &tdf).unwrap(), b"old");
    }
}
