//! Frame layer
//!
//! Every message on the wire is:
//! [1 byte: opcode] [4 bytes: payload length, little-endian] [payload...]

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use std::io::{self, Read, Write};

/// Largest payload accepted from a peer (256 MiB)
pub const MAX_FRAME_LEN: usize = 256 * 1024 * 1024;

/// Frame opcodes
///
/// A successful response carries the opcode of the request it answers;
/// a failure is always a `Failure` frame.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Opcode {
    WriteFile = 0x01,
    ReadFile = 0x02,
    DeleteFile = 0x03,
    ListFiles = 0x04,
    Ping = 0x05,
    ListNodes = 0x10,
    AddNode = 0x11,
    RemoveNode = 0x12,
    Failure = 0xFF,
}

impl TryFrom<u8> for Opcode {
    type Error = io::Error;

    fn try_from(value: u8) -> Result<Self, io::Error> {
        match value {
            0x01 => Ok(Opcode::WriteFile),
            0x02 => Ok(Opcode::ReadFile),
            0x03 => Ok(Opcode::DeleteFile),
            0x04 => Ok(Opcode::ListFiles),
            0x05 => Ok(Opcode::Ping),
            0x10 => Ok(Opcode::ListNodes),
            0x11 => Ok(Opcode::AddNode),
            0x12 => Ok(Opcode::RemoveNode),
            0xFF => Ok(Opcode::Failure),
            _ => Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("unknown opcode: 0x{:02x}", value),
            )),
        }
    }
}

/// Read a frame from the stream
pub fn read_frame<R: Read>(reader: &mut R) -> io::Result<(Opcode, Vec<u8>)> {
    let opcode = Opcode::try_from(reader.read_u8()?)?;

    let length = reader.read_u32::<LittleEndian>()? as usize;
    if length > MAX_FRAME_LEN {
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            format!("frame too large: {} bytes (max {})", length, MAX_FRAME_LEN),
        ));
    }

    let mut payload = vec![0u8; length];
    if length > 0 {
        reader.read_exact(&mut payload)?;
    }

    Ok((opcode, payload))
}

/// Write a frame to the stream and flush it
pub fn write_frame<W: Write>(writer: &mut W, opcode: Opcode, payload: &[u8]) -> io::Result<()> {
    if payload.len() > MAX_FRAME_LEN {
        return Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("frame too large: {} bytes (max {})", payload.len(), MAX_FRAME_LEN),
        ));
    }

    writer.write_u8(opcode as u8)?;
    writer.write_u32::<LittleEndian>(payload.len() as u32)?;
    if !payload.is_empty() {
        writer.write_all(payload)?;
    }

    writer.flush()
}
