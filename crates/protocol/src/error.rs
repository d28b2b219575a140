//! Errors raised while decoding or encoding NanoTDF structures

use std::io;
use thiserror::Error;

/// Codec failures for the NanoTDF binary format
#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("unexpected end of input")]
    Truncated,

    #[error("resource locator body too long: {len} bytes (max 255)")]
    BodyTooLong { len: usize },

    #[error("resource locator body is empty")]
    EmptyBody,

    #[error("unsupported resource locator protocol: 0x{0:X}")]
    UnsupportedProtocol(u8),

    #[error("unsupported resource locator identifier type: 0x{0:X}")]
    UnsupportedIdentifierType(u8),

    #[error("identifier too long: {len} bytes (max 32)")]
    IdentifierTooLong { len: usize },

    #[error("invalid url: {0}")]
    InvalidUrl(String),

    #[error("invalid policy type: 0x{0:02X}")]
    InvalidPolicyType(u8),

    #[error("invalid magic number and version: {0:02X?}")]
    InvalidMagic([u8; 3]),

    #[error("invalid ECC mode: {0}")]
    InvalidEccMode(u8),

    #[error("invalid symmetric cipher: {0}")]
    InvalidCipher(u8),

    #[error("invalid ephemeral public key size: {actual} (expected {expected})")]
    InvalidKeySize { expected: usize, actual: usize },

    #[error("policy content too large: {len} bytes (max 65535)")]
    ContentTooLarge { len: usize },

    #[error("payload too large: {len} bytes (max 16777215)")]
    PayloadTooLarge { len: usize },

    #[error("payload length {length} too short for IV and {tag_size}-byte tag")]
    PayloadTooShort { length: usize, tag_size: usize },

    #[error("invalid file: {0}")]
    InvalidFile(String),

    #[error("base64 decode error: {0}")]
    Base64(#[from] base64::DecodeError),

    #[error("I/O error: {0}")]
    Io(io::Error),
}

impl From<io::Error> for ProtocolError {
    fn from(err: io::Error) -> Self {
        if err.kind() == io::ErrorKind::UnexpectedEof {
            ProtocolError::Truncated
        } else {
            ProtocolError::Io(err)
        }
    }
}

impl ProtocolError {
    /// True for errors caused by the container bytes themselves rather than by
    /// values supplied while building a container.
    pub fn is_malformed_input(&self) -> bool {
        !matches!(
            self,
            ProtocolError::BodyTooLong { .. }
                | ProtocolError::IdentifierTooLong { .. }
                | ProtocolError::InvalidUrl(_)
                | ProtocolError::ContentTooLarge { .. }
                | ProtocolError::PayloadTooLarge { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_eof_maps_to_truncated() {
        let err: ProtocolError = io::Error::new(io::ErrorKind::UnexpectedEof, "eof").into();
        assert!(matches!(err, ProtocolError::Truncated));
        assert!(err.is_malformed_input());
    }

    #[test]
    fn test_builder_errors_are_not_malformed_input() {
        assert!(!ProtocolError::BodyTooLong { len: 300 }.is_malformed_input());
        assert!(ProtocolError::InvalidPolicyType(9).is_malformed_input());
    }
}
