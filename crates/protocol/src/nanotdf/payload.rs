//! NanoTDF payload block
//!
//! ```text
//! ┌──────────────┬─────────┬──────────────────┬───────────────────┐
//! │ Length (3B)  │ IV (3B) │ Ciphertext (var) │ Auth tag (8-16B)  │
//! └──────────────┴─────────┴──────────────────┴───────────────────┘
//! ```
//!
//! `Length` counts the IV, ciphertext and tag.

use crate::binary::{read_bytes, read_u24_be, write_u24_be, BinaryReadWith, BinaryWrite};
use crate::error::ProtocolError;
use crate::nanotdf::{IV_LENGTH, MAX_PAYLOAD_LENGTH};
use std::io::{Read, Write};

/// How the 3-byte IV becomes an AES-GCM nonce
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum IvConvention {
    /// 12-byte nonce: nine zero bytes followed by the IV
    #[default]
    Standard,
    /// Pre-1.0 containers: the 3-byte IV is the nonce
    Legacy,
}

/// Values from the header needed to split a payload
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PayloadContext {
    /// Tag length of the header's cipher
    pub tag_size: usize,
    /// Nonce convention to record on the decoded payload
    pub convention: IvConvention,
}

/// Encrypted payload of a NanoTDF container
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Payload {
    /// Low three bytes of the IV, big-endian
    pub iv: [u8; IV_LENGTH],
    /// AES-GCM ciphertext without tag
    pub ciphertext: Vec<u8>,
    /// AES-GCM authentication tag
    pub tag: Vec<u8>,
    /// Nonce convention; not part of the wire encoding
    pub convention: IvConvention,
}

impl Payload {
    /// Create a payload from its parts
    pub fn new(iv: [u8; IV_LENGTH], ciphertext: Vec<u8>, tag: Vec<u8>) -> Self {
        Self {
            iv,
            ciphertext,
            tag,
            convention: IvConvention::Standard,
        }
    }

    /// Split AEAD output (ciphertext with appended tag) into a payload
    pub fn from_sealed(
        iv: [u8; IV_LENGTH],
        mut sealed: Vec<u8>,
        tag_size: usize,
    ) -> Result<Self, ProtocolError> {
        if sealed.len() < tag_size {
            return Err(ProtocolError::PayloadTooShort {
                length: sealed.len() + IV_LENGTH,
                tag_size,
            });
        }
        let tag = sealed.split_off(sealed.len() - tag_size);
        Ok(Self::new(iv, sealed, tag))
    }

    /// Encode a counter value as the 3-byte IV
    pub fn iv_from_counter(counter: u32) -> [u8; IV_LENGTH] {
        let bytes = counter.to_be_bytes();
        [bytes[1], bytes[2], bytes[3]]
    }

    /// The IV as an integer counter
    pub fn iv_counter(&self) -> u32 {
        u32::from_be_bytes([0, self.iv[0], self.iv[1], self.iv[2]])
    }

    /// AES-GCM nonce for this payload under its IV convention
    pub fn nonce(&self) -> Vec<u8> {
        match self.convention {
            IvConvention::Standard => {
                let mut nonce = vec![0u8; 12];
                nonce[9..].copy_from_slice(&self.iv);
                nonce
            }
            IvConvention::Legacy => self.iv.to_vec(),
        }
    }

    /// Ciphertext with the tag appended, as AEAD decryption expects it
    pub fn sealed(&self) -> Vec<u8> {
        let mut sealed = Vec::with_capacity(self.ciphertext.len() + self.tag.len());
        sealed.extend_from_slice(&self.ciphertext);
        sealed.extend_from_slice(&self.tag);
        sealed
    }

    /// Value of the length field
    pub fn length(&self) -> usize {
        IV_LENGTH + self.ciphertext.len() + self.tag.len()
    }
}

impl BinaryReadWith<PayloadContext> for Payload {
    fn read_with<R: Read>(reader: &mut R, ctx: PayloadContext) -> Result<Self, ProtocolError> {
        let length = read_u24_be(reader)? as usize;
        if length < IV_LENGTH + ctx.tag_size {
            return Err(ProtocolError::PayloadTooShort {
                length,
                tag_size: ctx.tag_size,
            });
        }

        let mut iv = [0u8; IV_LENGTH];
        reader.read_exact(&mut iv)?;
        let ciphertext = read_bytes(reader, length - IV_LENGTH - ctx.tag_size)?;
        let tag = read_bytes(reader, ctx.tag_size)?;

        Ok(Self {
            iv,
            ciphertext,
            tag,
            convention: ctx.convention,
        })
    }
}

impl BinaryWrite for Payload {
    fn write_to<W: Write>(&self, writer: &mut W) -> Result<(), ProtocolError> {
        let length = self.length();
        if length > MAX_PAYLOAD_LENGTH as usize {
            return Err(ProtocolError::PayloadTooLarge { len: length });
        }
        write_u24_be(writer, length as u32)?;
        writer.write_all(&self.iv)?;
        writer.write_all(&self.ciphertext)?;
        writer.write_all(&self.tag)?;
        Ok(())
    }

    fn serialized_size(&self) -> usize {
        3 + self.length()
    }
}
