//! Optional trailing payload signature

use crate::binary::{read_bytes, BinaryReadWith, BinaryWrite};
use crate::error::ProtocolError;
use crate::nanotdf::header::EccMode;
use std::io::{Read, Write};

/// ECDSA signature over header and payload, preceded by the signer's
/// compressed public key
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Signature {
    /// Signing public key (compressed EC point)
    pub public_key: Vec<u8>,
    /// Fixed-width `r || s`
    pub signature: Vec<u8>,
}

impl Signature {
    /// Total encoded length for a curve
    pub fn encoded_length(curve: EccMode) -> usize {
        curve.public_key_size() + curve.signature_size()
    }
}

impl BinaryReadWith<EccMode> for Signature {
    fn read_with<R: Read>(reader: &mut R, curve: EccMode) -> Result<Self, ProtocolError> {
        let public_key = read_bytes(reader, curve.public_key_size())?;
        let signature = read_bytes(reader, curve.signature_size())?;
        Ok(Self {
            public_key,
            signature,
        })
    }
}

impl BinaryWrite for Signature {
    fn write_to<W: Write>(&self, writer: &mut W) -> Result<(), ProtocolError> {
        writer.write_all(&self.public_key)?;
        writer.write_all(&self.signature)?;
        Ok(())
    }

    fn serialized_size(&self) -> usize {
        self.public_key.len() + self.signature.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_signature_sizes_follow_curve() {
        assert_eq!(Signature::encoded_length(EccMode::Secp256r1), 33 + 64);
        assert_eq!(Signature::encoded_length(EccMode::Secp384r1), 49 + 96);

        let bytes = vec![0x03; 97];
        let sig = Signature::read_with(&mut bytes.as_slice(), EccMode::Secp256r1).unwrap();
        assert_eq!(sig.public_key.len(), 33);
        assert_eq!(sig.signature.len(), 64);
        assert_eq!(sig.to_bytes().unwrap(), bytes);
    }
}
