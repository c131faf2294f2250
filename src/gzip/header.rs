use crate::config::{MAX_RECURSION, NAME_CHUNK_SIZE};
use crate::crc32::crc32;
use crate::error::{Error, Result};
use crate::source::Source;

const SIGNATURE: [u8; 2] = [0x1f, 0x8b];
const DEFLATE_METHOD: u8 = 8;

const FTEXT: u8 = 0x01;
const FHCRC: u8 = 0x02;
const FEXTRA: u8 = 0x04;
const FNAME: u8 = 0x08;
const FCOMMENT: u8 = 0x10;
const RECOGNIZED_FLAGS: u8 = FTEXT | FHCRC | FEXTRA | FNAME | FCOMMENT;

/// Everything parsed out of a GZIP member's 10-byte fixed header plus its
/// optional variable-length fields.
pub struct MemberHeader {
    pub flags: u8,
    pub modification_time: u32,
    pub operating_system: u8,
    pub name: Option<Vec<u8>>,
    pub comments: Option<Vec<u8>>,
    /// Bytes occupied by the fixed header plus every variable field.
    pub container_header_size: u64,
}

/// Parses a member header starting at `offset`. Does not touch the
/// DEFLATE stream or footer that follow.
pub fn parse(source: &dyn Source, offset: u64) -> Result<MemberHeader> {
    let mut fixed = [0u8; 10];
    read_exact(source, offset, &mut fixed)?;

    if fixed[0..2] != SIGNATURE {
        return Err(Error::InvalidSignature);
    }
    if fixed[2] != DEFLATE_METHOD {
        return Err(Error::UnsupportedCompressionMethod(fixed[2]));
    }
    let flags = fixed[3];
    if flags & !RECOGNIZED_FLAGS != 0 {
        return Err(Error::UnsupportedFlag(flags));
    }
    let modification_time = u32::from_le_bytes([fixed[4], fixed[5], fixed[6], fixed[7]]);
    let operating_system = fixed[9];

    let mut header_bytes = fixed.to_vec();
    let mut cursor = offset + 10;

    if flags & FEXTRA != 0 {
        let mut xlen_bytes = [0u8; 2];
        read_exact(source, cursor, &mut xlen_bytes)?;
        header_bytes.extend_from_slice(&xlen_bytes);
        cursor += 2;

        let xlen = u16::from_le_bytes(xlen_bytes) as usize;
        let mut extra = vec![0u8; xlen];
        read_exact(source, cursor, &mut extra)?;
        header_bytes.extend_from_slice(&extra);
        cursor += xlen as u64;
    }

    let name = if flags & FNAME != 0 {
        let bytes = read_nul_terminated(source, cursor)?;
        header_bytes.extend_from_slice(&bytes);
        cursor += bytes.len() as u64;
        Some(bytes)
    } else {
        None
    };

    let comments = if flags & FCOMMENT != 0 {
        let bytes = read_nul_terminated(source, cursor)?;
        header_bytes.extend_from_slice(&bytes);
        cursor += bytes.len() as u64;
        Some(bytes)
    } else {
        None
    };

    if flags & FHCRC != 0 {
        let mut crc_bytes = [0u8; 2];
        read_exact(source, cursor, &mut crc_bytes)?;
        cursor += 2;

        let recorded = u16::from_le_bytes(crc_bytes);
        let computed = (crc32(&header_bytes) & 0xffff) as u16;
        if recorded != computed {
            return Err(Error::InvalidDeflate("header checksum mismatch"));
        }
    }

    Ok(MemberHeader {
        flags,
        modification_time,
        operating_system,
        name,
        comments,
        container_header_size: cursor - offset,
    })
}

/// Parses the 8-byte footer at `offset`: `(crc32, isize)`.
pub fn parse_footer(source: &dyn Source, offset: u64) -> Result<(u32, u32)> {
    let mut bytes = [0u8; 8];
    read_exact(source, offset, &mut bytes)?;
    let crc32 = u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]);
    let isize_ = u32::from_le_bytes([bytes[4], bytes[5], bytes[6], bytes[7]]);
    Ok((crc32, isize_))
}

pub(crate) fn read_exact(source: &dyn Source, offset: u64, buf: &mut [u8]) -> Result<()> {
    let mut filled = 0usize;
    while filled < buf.len() {
        let n = source.read_at(offset + filled as u64, &mut buf[filled..])?;
        if n == 0 {
            return Err(Error::TruncatedInput);
        }
        filled += n;
    }
    Ok(())
}

/// Reads a NUL-terminated byte string in [`NAME_CHUNK_SIZE`]-byte chunks,
/// returning the bytes including the terminating NUL. Gives up with
/// `TruncatedInput` after [`MAX_RECURSION`] chunks without finding one.
fn read_nul_terminated(source: &dyn Source, start: u64) -> Result<Vec<u8>> {
    let mut result = Vec::new();
    let mut chunk = [0u8; NAME_CHUNK_SIZE];
    for _ in 0..MAX_RECURSION {
        let n = source.read_at(start + result.len() as u64, &mut chunk)?;
        if n == 0 {
            return Err(Error::TruncatedInput);
        }
        match chunk[..n].iter().position(|&b| b == 0) {
            Some(nul) => {
                result.extend_from_slice(&chunk[..=nul]);
                return Ok(result);
            }
            None => result.extend_from_slice(&chunk[..n]),
        }
    }
    Err(Error::TruncatedInput)
}
