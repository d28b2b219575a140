//! NanoTDF Policy Structures

use crate::binary::{
    read_bytes, read_u16_be, read_u8, write_u16_be, write_u8, BinaryRead, BinaryReadWith,
    BinaryWrite,
};
use crate::error::ProtocolError;
use crate::nanotdf::header::EccMode;
use crate::nanotdf::resource_locator::ResourceLocator;
use std::io::{Read, Write};

/// Length of a GMAC policy binding in bytes
pub const GMAC_BINDING_LENGTH: usize = 8;

/// Policy type indicator
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum PolicyType {
    /// Remote policy (reference via Resource Locator)
    Remote = 0x00,
    /// Embedded policy (plaintext)
    EmbeddedPlaintext = 0x01,
    /// Embedded policy (encrypted)
    EmbeddedEncrypted = 0x02,
    /// Embedded policy (encrypted, with its own key access and ephemeral key)
    EmbeddedEncryptedPolicyKeyAccess = 0x03,
}

impl PolicyType {
    /// Parse from byte
    pub fn from_byte(byte: u8) -> Result<Self, ProtocolError> {
        match byte {
            0x00 => Ok(PolicyType::Remote),
            0x01 => Ok(PolicyType::EmbeddedPlaintext),
            0x02 => Ok(PolicyType::EmbeddedEncrypted),
            0x03 => Ok(PolicyType::EmbeddedEncryptedPolicyKeyAccess),
            other => Err(ProtocolError::InvalidPolicyType(other)),
        }
    }

    /// Convert to byte
    pub fn to_byte(self) -> u8 {
        self as u8
    }
}

/// Policy body variants
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PolicyBody {
    /// Remote policy reference
    Remote(ResourceLocator),
    /// Embedded plaintext policy
    EmbeddedPlaintext(Vec<u8>),
    /// Embedded encrypted policy (uses reserved IV 0)
    EmbeddedEncrypted(Vec<u8>),
    /// Embedded encrypted policy with separate key access
    EmbeddedEncryptedWithKeyAccess {
        /// Encrypted policy content
        content: Vec<u8>,
        /// KAS resource locator for policy key
        key_access: ResourceLocator,
        /// Ephemeral public key for policy key derivation
        ephemeral_key: Vec<u8>,
    },
}

impl PolicyBody {
    /// Get the policy type
    pub fn policy_type(&self) -> PolicyType {
        match self {
            PolicyBody::Remote(_) => PolicyType::Remote,
            PolicyBody::EmbeddedPlaintext(_) => PolicyType::EmbeddedPlaintext,
            PolicyBody::EmbeddedEncrypted(_) => PolicyType::EmbeddedEncrypted,
            PolicyBody::EmbeddedEncryptedWithKeyAccess { .. } => {
                PolicyType::EmbeddedEncryptedPolicyKeyAccess
            }
        }
    }
}

/// Header values a policy needs to know its own extent
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BindingContext {
    /// ECDSA (`true`) or GMAC binding
    pub use_ecdsa_binding: bool,
    /// Curve of the header's ephemeral key
    pub curve: EccMode,
}

/// Policy with cryptographic binding
///
/// Exactly one of a remote locator or embedded content is present, chosen by
/// the body variant. The binding always trails the body on the wire.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Policy {
    /// Policy content
    pub body: PolicyBody,
    /// Raw binding bytes as they appear on the wire:
    /// - GMAC: 8 bytes
    /// - ECDSA: `len(r) | r | len(s) | s`
    pub binding: Vec<u8>,
}

impl Policy {
    /// Create a new policy
    pub fn new(body: PolicyBody, binding: Vec<u8>) -> Self {
        Self { body, binding }
    }

    /// Create a remote policy
    pub fn remote(locator: ResourceLocator, binding: Vec<u8>) -> Self {
        Self::new(PolicyBody::Remote(locator), binding)
    }

    /// Create an embedded plaintext policy
    pub fn embedded_plaintext(content: Vec<u8>, binding: Vec<u8>) -> Self {
        Self::new(PolicyBody::EmbeddedPlaintext(content), binding)
    }

    /// Create an embedded encrypted policy
    pub fn embedded_encrypted(content: Vec<u8>, binding: Vec<u8>) -> Self {
        Self::new(PolicyBody::EmbeddedEncrypted(content), binding)
    }

    /// Policy type byte
    pub fn policy_type(&self) -> PolicyType {
        self.body.policy_type()
    }

    /// Embedded content (plaintext or ciphertext), if any
    pub fn content(&self) -> Option<&[u8]> {
        match &self.body {
            PolicyBody::Remote(_) => None,
            PolicyBody::EmbeddedPlaintext(content)
            | PolicyBody::EmbeddedEncrypted(content)
            | PolicyBody::EmbeddedEncryptedWithKeyAccess { content, .. } => Some(content),
        }
    }

    /// Remote policy locator, if any
    pub fn remote_locator(&self) -> Option<&ResourceLocator> {
        match &self.body {
            PolicyBody::Remote(locator) => Some(locator),
            _ => None,
        }
    }

    /// Replace the binding, leaving the encoded body untouched
    pub fn set_binding(&mut self, binding: Vec<u8>) {
        self.binding = binding;
    }

    /// Split an ECDSA binding into its `r` and `s` components
    pub fn ecdsa_components(&self) -> Option<(&[u8], &[u8])> {
        let r_len = *self.binding.first()? as usize;
        let r = self.binding.get(1..1 + r_len)?;
        let s_len = *self.binding.get(1 + r_len)? as usize;
        let s = self.binding.get(2 + r_len..2 + r_len + s_len)?;
        Some((r, s))
    }

    /// Number of bytes the body occupies, excluding type byte and binding
    fn body_size(&self) -> usize {
        match &self.body {
            PolicyBody::Remote(locator) => locator.serialized_size(),
            PolicyBody::EmbeddedPlaintext(content) | PolicyBody::EmbeddedEncrypted(content) => {
                2 + content.len()
            }
            PolicyBody::EmbeddedEncryptedWithKeyAccess {
                content,
                key_access,
                ephemeral_key,
            } => 2 + content.len() + key_access.serialized_size() + ephemeral_key.len(),
        }
    }
}

fn read_content<R: Read>(reader: &mut R) -> Result<Vec<u8>, ProtocolError> {
    let content_len = read_u16_be(reader)? as usize;
    Ok(read_bytes(reader, content_len)?)
}

fn write_content<W: Write>(writer: &mut W, content: &[u8]) -> Result<(), ProtocolError> {
    let len = u16::try_from(content.len())
        .map_err(|_| ProtocolError::ContentTooLarge { len: content.len() })?;
    write_u16_be(writer, len)?;
    writer.write_all(content)?;
    Ok(())
}

fn read_binding<R: Read>(reader: &mut R, ctx: BindingContext) -> Result<Vec<u8>, ProtocolError> {
    if !ctx.use_ecdsa_binding {
        return Ok(read_bytes(reader, GMAC_BINDING_LENGTH)?);
    }
    let r_len = read_u8(reader)?;
    let mut binding = vec![r_len];
    binding.extend(read_bytes(reader, r_len as usize)?);
    let s_len = read_u8(reader)?;
    binding.push(s_len);
    binding.extend(read_bytes(reader, s_len as usize)?);
    Ok(binding)
}

impl BinaryReadWith<BindingContext> for Policy {
    fn read_with<R: Read>(reader: &mut R, ctx: BindingContext) -> Result<Self, ProtocolError> {
        let policy_type = PolicyType::from_byte(read_u8(reader)?)?;

        let body = match policy_type {
            PolicyType::Remote => PolicyBody::Remote(ResourceLocator::read_from(reader)?),
            PolicyType::EmbeddedPlaintext => PolicyBody::EmbeddedPlaintext(read_content(reader)?),
            PolicyType::EmbeddedEncrypted => PolicyBody::EmbeddedEncrypted(read_content(reader)?),
            PolicyType::EmbeddedEncryptedPolicyKeyAccess => {
                let content = read_content(reader)?;
                let key_access = ResourceLocator::read_from(reader)?;
                let ephemeral_key = read_bytes(reader, ctx.curve.public_key_size())?;
                PolicyBody::EmbeddedEncryptedWithKeyAccess {
                    content,
                    key_access,
                    ephemeral_key,
                }
            }
        };

        let binding = read_binding(reader, ctx)?;
        Ok(Self { body, binding })
    }
}

impl BinaryWrite for Policy {
    fn write_to<W: Write>(&self, writer: &mut W) -> Result<(), ProtocolError> {
        write_u8(writer, self.body.policy_type().to_byte())?;

        match &self.body {
            PolicyBody::Remote(locator) => locator.write_to(writer)?,
            PolicyBody::EmbeddedPlaintext(content) | PolicyBody::EmbeddedEncrypted(content) => {
                write_content(writer, content)?
            }
            PolicyBody::EmbeddedEncryptedWithKeyAccess {
                content,
                key_access,
                ephemeral_key,
            } => {
                write_content(writer, content)?;
                key_access.write_to(writer)?;
                writer.write_all(ephemeral_key)?;
            }
        }

        writer.write_all(&self.binding)?;
        Ok(())
    }

    fn serialized_size(&self) -> usize {
        1 + self.body_size() + self.binding.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::nanotdf::resource_locator::Protocol;

    const GMAC: BindingContext = BindingContext {
        use_ecdsa_binding: false,
        curve: EccMode::Secp256r1,
    };

    const ECDSA: BindingContext = BindingContext {
        use_ecdsa_binding: true,
        curve: EccMode::Secp256r1,
    };

    fn read(bytes: &[u8], ctx: BindingContext) -> Result<(Policy, usize), ProtocolError> {
        let mut reader = bytes;
        let policy = Policy::read_with(&mut reader, ctx)?;
        Ok((policy, bytes.len() - reader.len()))
    }

    #[test]
    fn test_remote_policy_roundtrip() {
        let locator = ResourceLocator::new(Protocol::Https, b"kas.example.com/policy/123").unwrap();
        let policy = Policy::remote(locator, vec![7u8; 8]);

        let bytes = policy.to_bytes().unwrap();
        assert_eq!(bytes[0], 0x00);
        let (decoded, consumed) = read(&bytes, GMAC).unwrap();
        assert_eq!(consumed, bytes.len());
        assert_eq!(decoded, policy);
        assert!(decoded.content().is_none());
    }

    #[test]
    fn test_embedded_plaintext_layout() {
        let policy = Policy::embedded_plaintext(b"abc".to_vec(), vec![1, 2, 3, 4, 5, 6, 7, 8]);
        let bytes = policy.to_bytes().unwrap();
        assert_eq!(
            bytes,
            vec![0x01, 0x00, 0x03, b'a', b'b', b'c', 1, 2, 3, 4, 5, 6, 7, 8]
        );
        assert_eq!(policy.serialized_size(), bytes.len());
    }

    #[test]
    fn test_embedded_encrypted_roundtrip() {
        let policy = Policy::embedded_encrypted(vec![0xAB; 40], vec![0xCD; 8]);
        let bytes = policy.to_bytes().unwrap();
        let (decoded, _) = read(&bytes, GMAC).unwrap();
        assert_eq!(decoded, policy);
    }

    #[test]
    fn test_key_access_policy_uses_curve_key_size() {
        let policy = Policy::new(
            PolicyBody::EmbeddedEncryptedWithKeyAccess {
                content: vec![1, 2, 3],
                key_access: ResourceLocator::from_url("https://kas", None).unwrap(),
                ephemeral_key: vec![0x02; 33],
            },
            vec![0u8; 8],
        );
        let bytes = policy.to_bytes().unwrap();
        let (decoded, consumed) = read(&bytes, GMAC).unwrap();
        assert_eq!(consumed, bytes.len());
        assert_eq!(decoded, policy);
    }

    #[test]
    fn test_ecdsa_binding_is_length_prefixed() {
        let mut binding = vec![32u8];
        binding.extend([0x11; 32]);
        binding.push(31);
        binding.extend([0x22; 31]);
        let policy = Policy::embedded_encrypted(vec![9; 4], binding.clone());

        let mut bytes = policy.to_bytes().unwrap();
        bytes.extend([0xEE; 5]);
        let (decoded, consumed) = read(&bytes, ECDSA).unwrap();
        assert_eq!(consumed, 1 + 2 + 4 + 2 + 32 + 31);
        assert_eq!(decoded.binding, binding);

        let (r, s) = decoded.ecdsa_components().unwrap();
        assert_eq!(r, &[0x11; 32][..]);
        assert_eq!(s, &[0x22; 31][..]);
    }

    #[test]
    fn test_invalid_policy_type() {
        assert!(matches!(
            read(&[0x07, 0x00], GMAC),
            Err(ProtocolError::InvalidPolicyType(0x07))
        ));
    }

    #[test]
    fn test_truncated_binding() {
        let policy = Policy::embedded_plaintext(b"p".to_vec(), vec![0u8; 8]);
        let bytes = policy.to_bytes().unwrap();
        assert!(matches!(
            read(&bytes[..bytes.len() - 1], GMAC),
            Err(ProtocolError::Truncated)
        ));
    }

    #[test]
    fn test_content_too_large() {
        let policy = Policy::embedded_plaintext(vec![0u8; 0x1_0000], vec![0u8; 8]);
        assert!(matches!(
            policy.to_bytes(),
            Err(ProtocolError::ContentTooLarge { len: 0x1_0000 })
        ));
    }

    #[test]
    fn test_set_binding_keeps_body() {
        let mut policy = Policy::embedded_encrypted(vec![1, 2, 3], vec![0u8; 8]);
        let before = policy.to_bytes().unwrap();
        policy.set_binding(vec![0xFF; 8]);
        let after = policy.to_bytes().unwrap();
        assert_eq!(before[..before.len() - 8], after[..after.len() - 8]);
        assert_eq!(&after[after.len() - 8..], &[0xFF; 8]);
    }
}
