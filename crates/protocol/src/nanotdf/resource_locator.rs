//! Resource Locator for NanoTDF
//!
//! The Resource Locator is the compact `protocol://body` reference used for
//! the KAS endpoint in the header and for remote policies. An optional
//! identifier (typically the KAS key id) trails the body, zero-padded to
//! one of the fixed widths 2, 8 or 32 bytes.

use crate::binary::{read_bytes, read_u8, write_u8, BinaryRead, BinaryWrite};
use crate::error::ProtocolError;
use std::io::{Read, Write};

/// Maximum body length, bounded by the single length byte
pub const MAX_BODY_LENGTH: usize = 255;

/// Protocol type for resource location
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Protocol {
    /// HTTP protocol
    Http = 0x0,
    /// HTTPS protocol
    Https = 0x1,
    /// Shared Resource Directory. Decodable, but has no URL form.
    SharedResourceDirectory = 0xF,
}

impl Protocol {
    /// Parse protocol from the low nibble of the locator's first byte
    pub fn from_bits(bits: u8) -> Result<Self, ProtocolError> {
        match bits & 0x0F {
            0x0 => Ok(Protocol::Http),
            0x1 => Ok(Protocol::Https),
            0xF => Ok(Protocol::SharedResourceDirectory),
            other => Err(ProtocolError::UnsupportedProtocol(other)),
        }
    }

    /// Convert to 4-bit value
    pub fn to_bits(self) -> u8 {
        self as u8
    }

    fn scheme(self) -> Option<&'static str> {
        match self {
            Protocol::Http => Some("http://"),
            Protocol::Https => Some("https://"),
            Protocol::SharedResourceDirectory => None,
        }
    }
}

/// Identifier width selector, stored in the high nibble
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum IdentifierType {
    /// No identifier
    None,
    /// 2-byte identifier
    TwoByte,
    /// 8-byte identifier
    EightByte,
    /// 32-byte identifier
    ThirtyTwoByte,
}

impl IdentifierType {
    /// Parse identifier type from the high nibble of the locator's first byte
    pub fn from_bits(bits: u8) -> Result<Self, ProtocolError> {
        match (bits >> 4) & 0x0F {
            0x0 => Ok(IdentifierType::None),
            0x1 => Ok(IdentifierType::TwoByte),
            0x2 => Ok(IdentifierType::EightByte),
            0x3 => Ok(IdentifierType::ThirtyTwoByte),
            other => Err(ProtocolError::UnsupportedIdentifierType(other)),
        }
    }

    /// Convert to 4-bit value (upper nibble)
    pub fn to_bits(self) -> u8 {
        let value = match self {
            IdentifierType::None => 0x0,
            IdentifierType::TwoByte => 0x1,
            IdentifierType::EightByte => 0x2,
            IdentifierType::ThirtyTwoByte => 0x3,
        };
        value << 4
    }

    /// Get the byte length of this identifier type
    pub fn byte_length(self) -> usize {
        match self {
            IdentifierType::None => 0,
            IdentifierType::TwoByte => 2,
            IdentifierType::EightByte => 8,
            IdentifierType::ThirtyTwoByte => 32,
        }
    }

    /// Smallest identifier width that holds `len` bytes
    pub fn for_length(len: usize) -> Result<Self, ProtocolError> {
        match len {
            0 => Ok(IdentifierType::None),
            1..=2 => Ok(IdentifierType::TwoByte),
            3..=8 => Ok(IdentifierType::EightByte),
            9..=32 => Ok(IdentifierType::ThirtyTwoByte),
            _ => Err(ProtocolError::IdentifierTooLong { len }),
        }
    }
}

/// Resource Locator - compact reference to external resources
///
/// Structure:
/// ```text
/// ┌────────────────┬──────────────┬────────────┬─────────────────────┐
/// │ Protocol (1B)  │ Body Len (1B)│ Body (var) │ Identifier (0-32B)  │
/// └────────────────┴──────────────┴────────────┴─────────────────────┘
/// ```
///
/// The Protocol byte contains:
/// - Bits 7-4: Identifier type
/// - Bits 3-0: Protocol enum
///
/// `identifier` holds the unpadded value; `identifier_type` records the wire
/// width so a decoded locator re-encodes to the same bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceLocator {
    /// Protocol type
    pub protocol: Protocol,
    /// Resource body (e.g., "kas.example.com/kas" for HTTPS)
    pub body: Vec<u8>,
    /// Wire width of the identifier
    pub identifier_type: IdentifierType,
    /// Identifier value without its zero padding
    pub identifier: Vec<u8>,
}

impl ResourceLocator {
    /// Create a new resource locator without identifier
    pub fn new(protocol: Protocol, body: impl Into<Vec<u8>>) -> Result<Self, ProtocolError> {
        let body = body.into();
        if body.len() > MAX_BODY_LENGTH {
            return Err(ProtocolError::BodyTooLong { len: body.len() });
        }
        Ok(Self {
            protocol,
            body,
            identifier_type: IdentifierType::None,
            identifier: Vec::new(),
        })
    }

    /// Attach an identifier, choosing the smallest width that fits
    pub fn with_identifier(mut self, identifier: impl Into<Vec<u8>>) -> Result<Self, ProtocolError> {
        let identifier = identifier.into();
        self.identifier_type = IdentifierType::for_length(identifier.len())?;
        self.identifier = identifier;
        Ok(self)
    }

    /// Build a locator from `http(s)://body` and an optional identifier
    pub fn from_url(url: &str, identifier: Option<&str>) -> Result<Self, ProtocolError> {
        let locator = if let Some(rest) = url.strip_prefix("http://") {
            Self::new(Protocol::Http, rest.as_bytes())?
        } else if let Some(rest) = url.strip_prefix("https://") {
            Self::new(Protocol::Https, rest.as_bytes())?
        } else {
            return Err(ProtocolError::InvalidUrl(format!(
                "{url}: must start with http:// or https://"
            )));
        };
        match identifier {
            Some(id) => locator.with_identifier(id.as_bytes()),
            None => Ok(locator),
        }
    }

    /// Encode a URL and identifier straight to locator bytes
    pub fn encode(url: &str, identifier: Option<&str>) -> Result<Vec<u8>, ProtocolError> {
        Self::from_url(url, identifier)?.to_bytes()
    }

    /// Decode a locator from the front of `bytes`, returning it with the
    /// number of bytes consumed
    pub fn decode(bytes: &[u8]) -> Result<(Self, usize), ProtocolError> {
        let mut reader = bytes;
        let locator = Self::read_from(&mut reader)?;
        Ok((locator, bytes.len() - reader.len()))
    }

    /// Reconstruct the `http(s)://body` URL
    pub fn url(&self) -> Result<String, ProtocolError> {
        let scheme = self.protocol.scheme().ok_or_else(|| {
            ProtocolError::InvalidUrl("shared resource directory has no URL form".to_string())
        })?;
        let body = std::str::from_utf8(&self.body)
            .map_err(|_| ProtocolError::InvalidUrl("body contains invalid UTF-8".to_string()))?;
        Ok(format!("{scheme}{body}"))
    }

    /// Identifier as text, if present and valid UTF-8
    pub fn identifier_str(&self) -> Option<&str> {
        if self.identifier.is_empty() {
            return None;
        }
        std::str::from_utf8(&self.identifier).ok()
    }
}

impl BinaryRead for ResourceLocator {
    fn read_from<R: Read>(reader: &mut R) -> Result<Self, ProtocolError> {
        let first = read_u8(reader)?;
        let protocol = Protocol::from_bits(first)?;
        let identifier_type = IdentifierType::from_bits(first)?;

        let body_len = read_u8(reader)? as usize;
        if body_len == 0 {
            return Err(ProtocolError::EmptyBody);
        }
        let body = read_bytes(reader, body_len)?;

        let mut identifier = read_bytes(reader, identifier_type.byte_length())?;
        if let Some(end) = identifier.iter().position(|b| *b == 0) {
            identifier.truncate(end);
        }

        Ok(Self {
            protocol,
            body,
            identifier_type,
            identifier,
        })
    }
}

impl BinaryWrite for ResourceLocator {
    fn write_to<W: Write>(&self, writer: &mut W) -> Result<(), ProtocolError> {
        if self.body.len() > MAX_BODY_LENGTH {
            return Err(ProtocolError::BodyTooLong {
                len: self.body.len(),
            });
        }
        let width = self.identifier_type.byte_length();
        if self.identifier.len() > width {
            return Err(ProtocolError::IdentifierTooLong {
                len: self.identifier.len(),
            });
        }

        write_u8(writer, self.identifier_type.to_bits() | self.protocol.to_bits())?;
        write_u8(writer, self.body.len() as u8)?;
        writer.write_all(&self.body)?;

        let mut padded = vec![0u8; width];
        padded[..self.identifier.len()].copy_from_slice(&self.identifier);
        writer.write_all(&padded)?;
        Ok(())
    }

    fn serialized_size(&self) -> usize {
        2 + self.body.len() + self.identifier_type.byte_length()
    }
}
