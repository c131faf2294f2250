//! Member header/footer parsing (C5) plus the per-member indexing pass that
//! drives the DEFLATE stream driver (C4) across one member and hands the
//! resulting segments to the caller.

pub mod header;

use std::sync::atomic::{AtomicBool, Ordering};

use log::{debug, trace, warn};

use crate::config::{DICTIONARY_SIZE, SEGMENT_SIZE, UNCOMPRESSED_BLOCK_SIZE};
use crate::crc32::Crc32;
use crate::deflate::BlockDriver;
use crate::error::{Error, Result};
use crate::index::SegmentDescriptor;
use crate::source::Source;

/// One GZIP member's metadata, independent of where its segments live.
#[derive(Debug, Clone)]
pub struct MemberDescriptor {
    pub flags: u8,
    pub modification_time: u32,
    pub operating_system: u8,
    pub name: Option<Vec<u8>>,
    pub comments: Option<Vec<u8>>,
    pub container_header_size: u64,
    pub compressed_data_offset: u64,
    pub compressed_data_size: u64,
    pub uncompressed_data_size: u32,
    pub calculated_crc32: u32,
    pub decompression_error: bool,
}

/// Result of attempting to index one member starting at a given offset.
pub enum MemberOutcome {
    /// The header itself did not parse (bad signature, unsupported method
    /// or flag bits, or truncated before the header was complete). Carries
    /// the specific error so the first-member probe in `File::open` can
    /// surface it directly.
    InvalidHeader(Error),
    Member {
        descriptor: MemberDescriptor,
        segments: Vec<SegmentDescriptor>,
    },
}

/// Parses the member header at `offset`, drives the DEFLATE stream across
/// its body, and validates the footer. Only `Io` and `Aborted` are
/// returned as `Err`; every other failure is folded into the returned
/// [`MemberDescriptor::decompression_error`] (or, if the header itself
/// didn't parse, into [`MemberOutcome::InvalidHeader`]).
pub fn index_member(
    source: &dyn Source,
    offset: u64,
    member_index: usize,
    abort: &AtomicBool,
) -> Result<MemberOutcome> {
    let parsed_header = match header::parse(source, offset) {
        Ok(header) => header,
        Err(Error::Io(err)) => return Err(Error::Io(err)),
        Err(Error::Aborted) => return Err(Error::Aborted),
        Err(other) => return Ok(MemberOutcome::InvalidHeader(other)),
    };

    let compressed_data_offset = offset + parsed_header.container_header_size;
    let available = source.size().saturating_sub(compressed_data_offset);
    let mut compressed = vec![0u8; available as usize];
    header::read_exact(source, compressed_data_offset, &mut compressed)?;

    let mut driver = BlockDriver::new(&compressed, 0)?;
    let mut crc = Crc32::new();
    let mut segments = Vec::new();
    let mut segment_start_output_len = 0usize;
    let mut segment_start_pos = driver.consumed_position();
    let mut decompression_error = false;

    loop {
        if abort.load(Ordering::SeqCst) {
            return Err(Error::Aborted);
        }
        let final_block = match driver.decode_block() {
            Ok(final_block) => final_block,
            Err(err) => {
                warn!("member {member_index}: DEFLATE decode failed: {err}");
                decompression_error = true;
                if driver.produced_len(segment_start_output_len) > 0 {
                    segments.push(emit_segment(
                        &driver,
                        &mut crc,
                        member_index,
                        compressed_data_offset,
                        segment_start_pos,
                        segment_start_output_len,
                    ));
                }
                break;
            }
        };

        let (byte_off, bit_rem) = driver.consumed_position();
        let segment_compressed_bytes = byte_off as u64 - segment_start_pos.0 as u64;
        let segment_uncompressed_bytes = driver.produced_len(segment_start_output_len);

        if final_block
            || segment_compressed_bytes >= SEGMENT_SIZE
            || segment_uncompressed_bytes >= UNCOMPRESSED_BLOCK_SIZE
        {
            segments.push(emit_segment(
                &driver,
                &mut crc,
                member_index,
                compressed_data_offset,
                segment_start_pos,
                segment_start_output_len,
            ));
            segment_start_output_len = driver.output().len();
            segment_start_pos = (byte_off, bit_rem);
        }

        if final_block {
            break;
        }
    }

    let compressed_data_size: u64 = segments.iter().map(|s| s.compressed_size).sum();
    // ISIZE is defined mod 2^32 (RFC 1952 §2.3.1); a member may legitimately
    // decode to more than u32::MAX bytes, so sum in u64 and truncate once
    // rather than let a per-segment u32 sum panic on overflow.
    let uncompressed_data_size =
        segments.iter().map(|s| s.uncompressed_size as u64).sum::<u64>() as u32;

    let mut descriptor = MemberDescriptor {
        flags: parsed_header.flags,
        modification_time: parsed_header.modification_time,
        operating_system: parsed_header.operating_system,
        name: parsed_header.name,
        comments: parsed_header.comments,
        container_header_size: parsed_header.container_header_size,
        compressed_data_offset,
        compressed_data_size,
        uncompressed_data_size,
        calculated_crc32: crc.finalize(),
        decompression_error,
    };

    if !descriptor.decompression_error {
        let footer_offset = compressed_data_offset + descriptor.compressed_data_size;
        match header::parse_footer(source, footer_offset) {
            Ok((crc_recorded, isize_recorded)) => {
                if crc_recorded != descriptor.calculated_crc32
                    || isize_recorded != descriptor.uncompressed_data_size
                {
                    warn!("member {member_index}: footer CRC-32/ISIZE mismatch");
                    descriptor.decompression_error = true;
                }
            }
            Err(Error::Io(err)) => return Err(Error::Io(err)),
            Err(_) => descriptor.decompression_error = true,
        }
    }

    debug!(
        "indexed member {member_index}: {} compressed bytes, {} uncompressed bytes, {} segments, error={}",
        descriptor.compressed_data_size,
        descriptor.uncompressed_data_size,
        segments.len(),
        descriptor.decompression_error
    );

    Ok(MemberOutcome::Member {
        descriptor,
        segments,
    })
}

fn emit_segment(
    driver: &BlockDriver,
    crc: &mut Crc32,
    member_index: usize,
    compressed_data_offset: u64,
    segment_start_pos: (usize, u8),
    segment_start_output_len: usize,
) -> SegmentDescriptor {
    let (end_byte, _) = driver.consumed_position();
    let output = driver.output();

    let dict_start = segment_start_output_len.saturating_sub(DICTIONARY_SIZE);
    let dict_bytes = &output[dict_start..segment_start_output_len];
    let mut dictionary = Box::new([0u8; DICTIONARY_SIZE]);
    dictionary[..dict_bytes.len()].copy_from_slice(dict_bytes);

    crc.update(&output[segment_start_output_len..]);

    let compressed_offset = compressed_data_offset + segment_start_pos.0 as u64;
    let compressed_size = end_byte as u64 - segment_start_pos.0 as u64;
    let uncompressed_size = output.len() - segment_start_output_len;

    trace!(
        "member {member_index}: emitting segment at compressed offset {compressed_offset} \
         ({compressed_size} compressed bytes, {uncompressed_size} uncompressed bytes)"
    );

    SegmentDescriptor {
        compressed_offset,
        compressed_size,
        uncompressed_size,
        member_index,
        starting_bit_count: segment_start_pos.1,
        dictionary_len: dict_bytes.len() as u16,
        dictionary,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crc32::crc32;
    use crate::source::SliceSource;
    use std::sync::atomic::AtomicBool;

    fn stored_deflate(payload: &[u8]) -> Vec<u8> {
        let mut bytes = vec![1u8]; // BFINAL=1, BTYPE=00
        bytes.extend_from_slice(&(payload.len() as u16).to_le_bytes());
        bytes.extend_from_slice(&(!(payload.len() as u16)).to_le_bytes());
        bytes.extend_from_slice(payload);
        bytes
    }

    fn gzip_member(name: Option<&str>, payload: &[u8]) -> Vec<u8> {
        let flags = if name.is_some() { 0x08 } else { 0 };
        let mut bytes = vec![0x1f, 0x8b, 8, flags, 0, 0, 0, 0, 0, 0xff];
        if let Some(name) = name {
            bytes.extend_from_slice(name.as_bytes());
            bytes.push(0);
        }
        bytes.extend_from_slice(&stored_deflate(payload));
        bytes.extend_from_slice(&crc32(payload).to_le_bytes());
        bytes.extend_from_slice(&(payload.len() as u32).to_le_bytes());
        bytes
    }

    #[test]
    fn indexes_a_well_formed_member() {
        let data = gzip_member(Some("a.txt"), b"hello");
        let source = SliceSource::new(data);
        let abort = AtomicBool::new(false);

        match index_member(&source, 0, 0, &abort).unwrap() {
            MemberOutcome::Member {
                descriptor,
                segments,
            } => {
                assert!(!descriptor.decompression_error);
                assert_eq!(descriptor.name.as_deref(), Some(&b"a.txt\0"[..]));
                assert_eq!(descriptor.uncompressed_data_size, 5);
                assert_eq!(descriptor.calculated_crc32, crc32(b"hello"));
                assert_eq!(segments.len(), 1);
                assert_eq!(segments[0].uncompressed_size, 5);
                assert_eq!(segments[0].starting_bit_count, 0);
                assert_eq!(segments[0].dictionary_len, 0);
            }
            MemberOutcome::InvalidHeader(_) => panic!("expected a valid member"),
        }
    }

    #[test]
    fn flags_footer_crc_mismatch() {
        let mut data = gzip_member(None, b"abc");
        let last = data.len() - 1;
        data[last] ^= 0xff; // corrupt ISIZE
        let source = SliceSource::new(data);
        let abort = AtomicBool::new(false);

        match index_member(&source, 0, 0, &abort).unwrap() {
            MemberOutcome::Member { descriptor, .. } => {
                assert!(descriptor.decompression_error);
            }
            MemberOutcome::InvalidHeader(_) => panic!("header itself is valid"),
        }
    }

    #[test]
    fn bad_signature_is_reported_as_invalid_header() {
        let mut data = gzip_member(None, b"abc");
        data[0] = 0;
        let source = SliceSource::new(data);
        let abort = AtomicBool::new(false);

        assert!(matches!(
            index_member(&source, 0, 0, &abort).unwrap(),
            MemberOutcome::InvalidHeader(Error::InvalidSignature)
        ));
    }

    #[test]
    fn second_member_starts_at_first_members_end() {
        let mut data = gzip_member(None, b"hello\n");
        let second_offset = data.len() as u64;
        data.extend_from_slice(&gzip_member(None, b"world\n"));
        let source = SliceSource::new(data);
        let abort = AtomicBool::new(false);

        let MemberOutcome::Member { descriptor, .. } =
            index_member(&source, second_offset, 1, &abort).unwrap()
        else {
            panic!("expected a valid member");
        };
        assert_eq!(descriptor.uncompressed_data_size, 6);
        assert_eq!(descriptor.calculated_crc32, crc32(b"world\n"));
    }
}
