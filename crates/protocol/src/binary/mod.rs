//! Big-endian primitives shared by the NanoTDF codecs
//!
//! The helpers return `io::Result` so they compose with any `Read`/`Write`;
//! codec implementations lift the errors into `ProtocolError` with `?`,
//! which turns a short read into `ProtocolError::Truncated`.

use std::io::{self, Read, Write};

pub mod traits;

pub use traits::{BinaryRead, BinaryReadWith, BinarySerialize, BinaryWrite};

/// Read a u8 from a reader
pub fn read_u8<R: Read>(reader: &mut R) -> io::Result<u8> {
    let mut buf = [0u8; 1];
    reader.read_exact(&mut buf)?;
    Ok(buf[0])
}

/// Read a u16 (big-endian) from a reader
pub fn read_u16_be<R: Read>(reader: &mut R) -> io::Result<u16> {
    let mut buf = [0u8; 2];
    reader.read_exact(&mut buf)?;
    Ok(u16::from_be_bytes(buf))
}

/// Read a u24 (big-endian, 3 bytes) from a reader
/// Returns as u32 since Rust doesn't have a u24 type
pub fn read_u24_be<R: Read>(reader: &mut R) -> io::Result<u32> {
    let mut buf = [0u8; 3];
    reader.read_exact(&mut buf)?;
    Ok(u32::from_be_bytes([0, buf[0], buf[1], buf[2]]))
}

/// Read exactly n bytes from a reader
pub fn read_bytes<R: Read>(reader: &mut R, n: usize) -> io::Result<Vec<u8>> {
    let mut buf = vec![0u8; n];
    reader.read_exact(&mut buf)?;
    Ok(buf)
}

/// Write a u8 to a writer
pub fn write_u8<W: Write>(writer: &mut W, value: u8) -> io::Result<()> {
    writer.write_all(&[value])
}

/// Write a u16 (big-endian) to a writer
pub fn write_u16_be<W: Write>(writer: &mut W, value: u16) -> io::Result<()> {
    writer.write_all(&value.to_be_bytes())
}

/// Write a u24 (big-endian, 3 bytes) to a writer
/// Takes u32 but only writes the lower 24 bits
pub fn write_u24_be<W: Write>(writer: &mut W, value: u32) -> io::Result<()> {
    if value > 0x00FF_FFFF {
        return Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            "Value too large for u24",
        ));
    }
    let bytes = value.to_be_bytes();
    writer.write_all(&bytes[1..4])
}

/// Write bytes to a writer
pub fn write_bytes<W: Write>(writer: &mut W, bytes: &[u8]) -> io::Result<()> {
    writer.write_all(bytes)
}
