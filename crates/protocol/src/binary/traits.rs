//! Traits for binary serialization and deserialization

use crate::error::ProtocolError;
use std::io::{Read, Write};

/// Types that can be read from the NanoTDF binary format without outside context
pub trait BinaryRead: Sized {
    /// Read this type from a binary reader
    fn read_from<R: Read>(reader: &mut R) -> Result<Self, ProtocolError>;
}

/// Types whose encoding depends on values decoded earlier in the stream,
/// such as a policy binding whose width follows the header's binding mode.
pub trait BinaryReadWith<C>: Sized {
    /// Read this type using the supplied decoding context
    fn read_with<R: Read>(reader: &mut R, ctx: C) -> Result<Self, ProtocolError>;
}

/// Types that can be written to binary format
pub trait BinaryWrite {
    /// Write this type to a binary writer
    fn write_to<W: Write>(&self, writer: &mut W) -> Result<(), ProtocolError>;

    /// Get the size in bytes when serialized
    fn serialized_size(&self) -> usize;

    /// Serialize into a freshly allocated buffer
    fn to_bytes(&self) -> Result<Vec<u8>, ProtocolError> {
        let mut buf = Vec::with_capacity(self.serialized_size());
        self.write_to(&mut buf)?;
        Ok(buf)
    }
}

/// Types that support both context-free reading and writing
pub trait BinarySerialize: BinaryRead + BinaryWrite {}

impl<T: BinaryRead + BinaryWrite> BinarySerialize for T {}
