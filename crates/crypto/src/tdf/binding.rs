//! Policy binding
//!
//! - GMAC mode: last 8 bytes of SHA256 over the policy content
//! - ECDSA mode: P-256 signature over the policy content with the header's
//!   ephemeral key, encoded as `len(r) | r | len(s) | s`
//!
//! Verification is exposed for policy-trust layers; parsing never calls it.

use crate::helpers::CryptoError;
use crate::kem::ec::{parse_public_key_sec1, EcKeyPair};
use nanotdf_protocol::binary::BinaryWrite;
use nanotdf_protocol::nanotdf::{Header, Policy, PolicyBody, GMAC_BINDING_LENGTH};
use p256::ecdsa::signature::{Signer, Verifier};
use p256::ecdsa::{Signature, VerifyingKey};
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;

/// Width of each ECDSA scalar on P-256
const P256_SCALAR_LENGTH: usize = 32;

/// Bytes a binding covers: embedded content, or the encoded remote locator
pub fn bound_content(policy: &Policy) -> Result<Vec<u8>, CryptoError> {
    match &policy.body {
        PolicyBody::Remote(locator) => Ok(locator.to_bytes()?),
        PolicyBody::EmbeddedPlaintext(content)
        | PolicyBody::EmbeddedEncrypted(content)
        | PolicyBody::EmbeddedEncryptedWithKeyAccess { content, .. } => Ok(content.clone()),
    }
}

/// GMAC-mode binding digest
pub fn gmac_binding(content: &[u8]) -> Vec<u8> {
    let digest = Sha256::digest(content);
    digest[digest.len() - GMAC_BINDING_LENGTH..].to_vec()
}

/// ECDSA-mode binding
pub fn ecdsa_binding(key_pair: &EcKeyPair, content: &[u8]) -> Vec<u8> {
    let signature: Signature = key_pair.signing_key().sign(content);
    let (r, s) = signature.split_bytes();

    let mut binding = Vec::with_capacity(2 + r.len() + s.len());
    binding.push(r.len() as u8);
    binding.extend_from_slice(&r);
    binding.push(s.len() as u8);
    binding.extend_from_slice(&s);
    binding
}

/// Binding for `content` in the requested mode
pub fn policy_binding(
    use_ecdsa_binding: bool,
    key_pair: &EcKeyPair,
    content: &[u8],
) -> Vec<u8> {
    if use_ecdsa_binding {
        ecdsa_binding(key_pair, content)
    } else {
        gmac_binding(content)
    }
}

/// Check a GMAC-mode binding in constant time
pub fn verify_gmac_binding(policy: &Policy) -> Result<bool, CryptoError> {
    let expected = gmac_binding(&bound_content(policy)?);
    Ok(expected.as_slice().ct_eq(policy.binding.as_slice()).into())
}

/// Check an ECDSA-mode binding against the signer's SEC1 public key
pub fn verify_ecdsa_binding(public_key: &[u8], policy: &Policy) -> Result<bool, CryptoError> {
    let (r, s) = policy
        .ecdsa_components()
        .ok_or_else(|| CryptoError::Signature("malformed ECDSA binding".to_string()))?;
    if r.len() > P256_SCALAR_LENGTH || s.len() > P256_SCALAR_LENGTH {
        return Ok(false);
    }

    let mut raw = [0u8; 2 * P256_SCALAR_LENGTH];
    raw[P256_SCALAR_LENGTH - r.len()..P256_SCALAR_LENGTH].copy_from_slice(r);
    raw[2 * P256_SCALAR_LENGTH - s.len()..].copy_from_slice(s);
    let signature = match Signature::from_slice(&raw) {
        Ok(signature) => signature,
        Err(_) => return Ok(false),
    };

    let verifying_key = VerifyingKey::from(&parse_public_key_sec1(public_key)?);
    Ok(verifying_key
        .verify(&bound_content(policy)?, &signature)
        .is_ok())
}

/// Verify a header's binding in whichever mode the header declares
pub fn verify_header_binding(header: &Header) -> Result<bool, CryptoError> {
    if header.use_ecdsa_binding() {
        verify_ecdsa_binding(&header.ephemeral_public_key, &header.policy)
    } else {
        verify_gmac_binding(&header.policy)
    }
}
