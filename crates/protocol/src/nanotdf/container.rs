//! NanoTDF container: header, payload and optional signature
//!
//! Parsing chains the three codecs by offset and enforces that a signature is
//! present exactly when the header's signature flag is set.

use crate::binary::{BinaryRead, BinaryReadWith, BinaryWrite};
use crate::error::ProtocolError;
use crate::nanotdf::header::Header;
use crate::nanotdf::payload::{IvConvention, Payload, PayloadContext};
use crate::nanotdf::signature::Signature;
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};

/// Complete NanoTDF structure
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NanoTdf {
    /// NanoTDF header (includes magic number and version)
    pub header: Header,
    /// Encrypted payload
    pub payload: Payload,
    /// Trailing signature, present iff the header says so
    pub signature: Option<Signature>,
}

impl NanoTdf {
    /// Assemble a container, checking the signature invariant
    pub fn new(
        header: Header,
        payload: Payload,
        signature: Option<Signature>,
    ) -> Result<Self, ProtocolError> {
        let tdf = Self {
            header,
            payload,
            signature,
        };
        tdf.check_signature_presence()?;
        Ok(tdf)
    }

    /// Parse a container produced by a current client
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, ProtocolError> {
        Self::parse(bytes, IvConvention::Standard)
    }

    /// Parse a pre-1.0 container whose payload nonce is the bare 3-byte IV
    pub fn from_bytes_legacy(bytes: &[u8]) -> Result<Self, ProtocolError> {
        Self::parse(bytes, IvConvention::Legacy)
    }

    /// Parse a base64 string (standard alphabet, padded)
    pub fn from_base64(encoded: &str, convention: IvConvention) -> Result<Self, ProtocolError> {
        let bytes = BASE64.decode(encoded.trim())?;
        Self::parse(&bytes, convention)
    }

    /// Parse header, payload and signature in order
    pub fn parse(bytes: &[u8], convention: IvConvention) -> Result<Self, ProtocolError> {
        let mut reader = bytes;
        let header = Header::read_from(&mut reader)?;
        let payload = Payload::read_with(
            &mut reader,
            PayloadContext {
                tag_size: header.auth_tag_length(),
                convention,
            },
        )?;

        let signature = match (header.has_signature(), reader.is_empty()) {
            (false, false) => {
                return Err(ProtocolError::InvalidFile(
                    "found signature when there shouldn't be one".to_string(),
                ))
            }
            (false, true) => None,
            (true, true) => {
                return Err(ProtocolError::InvalidFile(
                    "could not find signature".to_string(),
                ))
            }
            (true, false) => {
                let curve = header
                    .symmetric_and_payload_config
                    .signature_mode
                    .signature_ecc_mode
                    .ok_or_else(|| {
                        ProtocolError::InvalidFile("signature curve missing".to_string())
                    })?;
                let signature = Signature::read_with(&mut reader, curve)?;
                if !reader.is_empty() {
                    return Err(ProtocolError::InvalidFile(format!(
                        "{} unexpected bytes after signature",
                        reader.len()
                    )));
                }
                Some(signature)
            }
        };

        Ok(Self {
            header,
            payload,
            signature,
        })
    }

    /// Serialize header, payload and signature in order
    pub fn to_bytes(&self) -> Result<Vec<u8>, ProtocolError> {
        self.check_signature_presence()?;
        let mut buf = Vec::with_capacity(self.serialized_size());
        self.write_to(&mut buf)?;
        Ok(buf)
    }

    /// Serialize and base64-encode
    pub fn to_base64(&self) -> Result<String, ProtocolError> {
        Ok(BASE64.encode(self.to_bytes()?))
    }

    /// Bytes covered by the payload signature
    pub fn signed_content(&self) -> Result<Vec<u8>, ProtocolError> {
        let mut buf = self.header.to_bytes()?;
        self.payload.write_to(&mut buf)?;
        Ok(buf)
    }

    fn check_signature_presence(&self) -> Result<(), ProtocolError> {
        match (self.header.has_signature(), self.signature.is_some()) {
            (true, false) => Err(ProtocolError::InvalidFile(
                "could not find signature".to_string(),
            )),
            (false, true) => Err(ProtocolError::InvalidFile(
                "found signature when there shouldn't be one".to_string(),
            )),
            _ => Ok(()),
        }
    }
}

impl BinaryWrite for NanoTdf {
    fn write_to<W: std::io::Write>(&self, writer: &mut W) -> Result<(), ProtocolError> {
        self.header.write_to(writer)?;
        self.payload.write_to(writer)?;
        if let Some(signature) = &self.signature {
            signature.write_to(writer)?;
        }
        Ok(())
    }

    fn serialized_size(&self) -> usize {
        self.header.serialized_size()
            + self.payload.serialized_size()
            + self.signature.as_ref().map_or(0, |s| s.serialized_size())
    }
}
