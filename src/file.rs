//! File facade (C9): the core's public surface.
//!
//! Drives lazy indexing, maintains a virtual read cursor over the
//! concatenation of every member's uncompressed bytes, and serves random
//! access through the segment cache (C8). Every externally visible
//! operation that can mutate shared state takes a single exclusive lock,
//! does its work, and releases it on all exit paths.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};

use log::warn;

use crate::cache::SegmentCache;
use crate::config::DEFAULT_CACHE_CAPACITY;
use crate::deflate::BlockDriver;
use crate::error::{Error, Result};
use crate::gzip::{self, MemberDescriptor, MemberOutcome};
use crate::index::{OffsetIndex, SegmentDescriptor};
use crate::source::Source;

/// Where a [`File::seek`] measures its offset from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Whence {
    Start,
    Current,
    End,
}

struct FileInner {
    members: Vec<MemberDescriptor>,
    segments: Vec<SegmentDescriptor>,
    offsets: OffsetIndex,
    indexer_cursor: u64,
    current_offset: u64,
    is_corrupted: bool,
}

/// A GZIP source opened for random-access reading.
pub struct File {
    source: Box<dyn Source>,
    source_size: u64,
    inner: RwLock<FileInner>,
    cache: SegmentCache,
    abort: AtomicBool,
}

impl File {
    /// Opens `source`, probing the first member immediately so malformed
    /// input is rejected up front rather than on the first read.
    pub fn open(source: Box<dyn Source>) -> Result<Self> {
        let source_size = source.size();
        if source_size < 10 {
            return Err(Error::InvalidSource);
        }

        let file = File {
            source,
            source_size,
            inner: RwLock::new(FileInner {
                members: Vec::new(),
                segments: Vec::new(),
                offsets: OffsetIndex::new(),
                indexer_cursor: 0,
                current_offset: 0,
                is_corrupted: false,
            }),
            cache: SegmentCache::new(DEFAULT_CACHE_CAPACITY),
            abort: AtomicBool::new(false),
        };

        let mut inner = file.inner.write().unwrap();
        match file.index_next_member(&mut inner)? {
            IndexStep::Progressed | IndexStep::Done => {}
        }
        drop(inner);

        Ok(file)
    }

    /// Drops cached segment buffers, zeroes each segment's dictionary bytes,
    /// and drops all indexed member/segment state. Safe to call more than
    /// once.
    pub fn close(&self) {
        self.cache.clear();

        let mut inner = self.inner.write().unwrap();
        for segment in inner.segments.iter_mut() {
            segment.dictionary.iter_mut().for_each(|b| *b = 0);
        }
        inner.segments.clear();
        inner.members.clear();
    }

    pub fn signal_abort(&self) {
        self.abort.store(true, Ordering::SeqCst);
    }

    pub fn is_corrupted(&self) -> bool {
        self.inner.read().unwrap().is_corrupted
    }

    pub fn current_offset(&self) -> u64 {
        self.inner.read().unwrap().current_offset
    }

    /// Total uncompressed bytes across every member. Forces full indexing.
    pub fn uncompressed_size(&self) -> Result<u64> {
        let mut inner = self.inner.write().unwrap();
        self.extend_index_to_end(&mut inner)?;
        Ok(inner.offsets.total())
    }

    /// Number of members. Forces full indexing.
    pub fn member_count(&self) -> Result<usize> {
        let mut inner = self.inner.write().unwrap();
        self.extend_index_to_end(&mut inner)?;
        Ok(inner.members.len())
    }

    /// Metadata for member `index`. Forces full indexing.
    pub fn member(&self, index: usize) -> Result<MemberHandle> {
        let mut inner = self.inner.write().unwrap();
        self.extend_index_to_end(&mut inner)?;
        inner
            .members
            .get(index)
            .cloned()
            .map(MemberHandle)
            .ok_or(Error::InvalidOffset)
    }

    /// Moves the virtual cursor and returns its new absolute position.
    /// `End` forces full indexing so the total size is known.
    pub fn seek(&self, whence: Whence, offset: i64) -> Result<u64> {
        let mut inner = self.inner.write().unwrap();
        let base = match whence {
            Whence::Start => 0,
            Whence::Current => inner.current_offset as i64,
            Whence::End => {
                self.extend_index_to_end(&mut inner)?;
                inner.offsets.total() as i64
            }
        };
        let absolute = base
            .checked_add(offset)
            .ok_or(Error::InvalidOffset)?;
        if absolute < 0 {
            return Err(Error::InvalidOffset);
        }
        inner.current_offset = absolute as u64;
        Ok(inner.current_offset)
    }

    /// Reads at the current cursor, advancing it by the number of bytes
    /// returned. Returns 0 at or past the end of the uncompressed stream.
    pub fn read(&self, buf: &mut [u8]) -> Result<usize> {
        let mut inner = self.inner.write().unwrap();
        self.read_locked(&mut inner, buf)
    }

    /// Equivalent to `seek(Start, offset)` followed by `read(buf)` under the
    /// same lock.
    pub fn read_at(&self, offset: u64, buf: &mut [u8]) -> Result<usize> {
        let mut inner = self.inner.write().unwrap();
        inner.current_offset = offset;
        self.read_locked(&mut inner, buf)
    }

    fn read_locked(&self, inner: &mut FileInner, buf: &mut [u8]) -> Result<usize> {
        let mut filled = 0;
        while filled < buf.len() {
            if self.abort.load(Ordering::SeqCst) {
                return Err(Error::Aborted);
            }

            self.extend_index_past(inner, inner.current_offset)?;

            let Some((segment_index, intra)) = inner.offsets.resolve(inner.current_offset) else {
                break;
            };

            let bytes = self.load_segment(&inner.segments[segment_index])?;
            let available = bytes.len() - intra;
            let to_copy = available.min(buf.len() - filled);
            buf[filled..filled + to_copy].copy_from_slice(&bytes[intra..intra + to_copy]);

            filled += to_copy;
            inner.current_offset += to_copy as u64;
        }
        Ok(filled)
    }

    fn load_segment(&self, descriptor: &SegmentDescriptor) -> Result<Arc<Vec<u8>>> {
        let source = &self.source;
        self.cache.get_or_load(
            segment_cache_key(descriptor),
            || -> Result<Vec<u8>> {
                let available = source
                    .size()
                    .saturating_sub(descriptor.compressed_offset) as usize;
                let to_read = available.min(descriptor.compressed_size as usize);
                let mut compressed = vec![0u8; to_read];
                read_exact_at(source.as_ref(), descriptor.compressed_offset, &mut compressed)?;

                let mut driver =
                    BlockDriver::new(&compressed, descriptor.starting_bit_count)?;
                driver.seed_dictionary(descriptor.dictionary_bytes());
                let dict_len = descriptor.dictionary_bytes().len();

                loop {
                    if self.abort.load(Ordering::SeqCst) {
                        return Err(Error::Aborted);
                    }
                    if driver.produced_len(dict_len) >= descriptor.uncompressed_size {
                        break;
                    }
                    let final_block = driver.decode_block()?;
                    if final_block {
                        break;
                    }
                }

                let mut output = driver.output()[dict_len..].to_vec();
                output.truncate(descriptor.uncompressed_size);
                Ok(output)
            },
        )
    }

    /// Ensures the index covers every member of the source.
    fn extend_index_to_end(&self, inner: &mut FileInner) -> Result<()> {
        while inner.indexer_cursor < self.source_size {
            if let IndexStep::Done = self.index_next_member(inner)? {
                break;
            }
        }
        Ok(())
    }

    /// Indexes one member at a time until `offset` falls within the index
    /// or indexing reaches the end of the source.
    fn extend_index_past(&self, inner: &mut FileInner, offset: u64) -> Result<()> {
        while offset >= inner.offsets.total() && inner.indexer_cursor < self.source_size {
            if let IndexStep::Done = self.index_next_member(inner)? {
                break;
            }
        }
        Ok(())
    }

    fn index_next_member(&self, inner: &mut FileInner) -> Result<IndexStep> {
        if inner.is_corrupted || inner.indexer_cursor >= self.source_size {
            return Ok(IndexStep::Done);
        }

        let member_index = inner.members.len();
        let outcome = gzip::index_member(
            self.source.as_ref(),
            inner.indexer_cursor,
            member_index,
            &self.abort,
        )?;

        match outcome {
            MemberOutcome::InvalidHeader(err) => {
                if member_index == 0 {
                    return Err(err);
                }
                warn!("member {member_index}: marked corrupt, invalid header: {err}");
                inner.is_corrupted = true;
                Ok(IndexStep::Done)
            }
            MemberOutcome::Member {
                descriptor,
                segments,
            } => {
                if descriptor.decompression_error {
                    inner.is_corrupted = true;
                }
                let member_end = descriptor.compressed_data_offset
                    + descriptor.compressed_data_size
                    + 8;
                for segment in &segments {
                    inner.offsets.push(segment.uncompressed_size);
                }
                inner.segments.extend(segments);
                inner.members.push(descriptor);

                if inner.is_corrupted {
                    Ok(IndexStep::Done)
                } else {
                    inner.indexer_cursor = member_end;
                    Ok(IndexStep::Progressed)
                }
            }
        }
    }
}

enum IndexStep {
    Progressed,
    Done,
}

fn segment_cache_key(descriptor: &SegmentDescriptor) -> usize {
    descriptor.compressed_offset as usize
}

fn read_exact_at(source: &dyn Source, offset: u64, buf: &mut [u8]) -> Result<()> {
    let mut filled = 0;
    while filled < buf.len() {
        let n = source.read_at(offset + filled as u64, &mut buf[filled..])?;
        if n == 0 {
            return Err(Error::TruncatedInput);
        }
        filled += n;
    }
    Ok(())
}

/// A borrowed view of one member's metadata.
pub struct MemberHandle(MemberDescriptor);

impl MemberHandle {
    pub fn modification_time(&self) -> u32 {
        self.0.modification_time
    }

    pub fn operating_system(&self) -> u8 {
        self.0.operating_system
    }

    /// Decodes the stored name as Latin-1 and re-encodes it to UTF-8,
    /// dropping the trailing NUL.
    pub fn name_utf8(&self) -> Option<String> {
        self.0.name.as_deref().map(latin1_to_utf8_trim_nul)
    }

    pub fn comments_utf8(&self) -> Option<String> {
        self.0.comments.as_deref().map(latin1_to_utf8_trim_nul)
    }

    pub fn decompression_error(&self) -> bool {
        self.0.decompression_error
    }
}

fn latin1_to_utf8_trim_nul(bytes: &[u8]) -> String {
    let bytes = bytes.strip_suffix(&[0]).unwrap_or(bytes);
    bytes.iter().map(|&b| b as char).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crc32::crc32;
    use crate::source::SliceSource;

    fn stored_deflate(payload: &[u8]) -> Vec<u8> {
        let mut bytes = vec![1u8];
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

    fn open_slice(data: Vec<u8>) -> File {
        File::open(Box::new(SliceSource::new(data))).unwrap()
    }

    #[test]
    fn empty_content_single_member() {
        let file = open_slice(gzip_member(Some("a.txt"), b""));
        assert_eq!(file.member_count().unwrap(), 1);
        assert_eq!(
            file.member(0).unwrap().name_utf8().as_deref(),
            Some("a.txt")
        );
        assert_eq!(file.uncompressed_size().unwrap(), 0);
        let mut buf = [0u8; 10];
        assert_eq!(file.read_at(0, &mut buf).unwrap(), 0);
        assert!(!file.is_corrupted());
    }

    #[test]
    fn two_member_concatenation() {
        let mut data = gzip_member(None, b"hello\n");
        data.extend_from_slice(&gzip_member(None, b"world\n"));
        let file = open_slice(data);

        assert_eq!(file.member_count().unwrap(), 2);
        assert_eq!(file.uncompressed_size().unwrap(), 12);

        let mut buf = [0u8; 12];
        assert_eq!(file.read_at(0, &mut buf).unwrap(), 12);
        assert_eq!(&buf, b"hello\nworld\n");

        let mut buf = [0u8; 2];
        assert_eq!(file.read_at(5, &mut buf).unwrap(), 2);
        assert_eq!(&buf, b"\nw");
    }

    #[test]
    fn crc_corruption_still_serves_bytes() {
        let mut data = gzip_member(None, b"abc");
        // header(10) + stored-block body(1 + 2 + 2 + 3) = 18, where the
        // 4-byte CRC-32 footer field starts.
        let crc_byte = 18;
        data[crc_byte] ^= 0x01;
        let file = open_slice(data);

        file.uncompressed_size().unwrap();
        assert!(file.is_corrupted());

        let mut buf = [0u8; 3];
        assert_eq!(file.read_at(0, &mut buf).unwrap(), 3);
        assert_eq!(&buf, b"abc");
        assert!(file.member(0).unwrap().decompression_error());
    }

    #[test]
    fn unsupported_flag_fails_open() {
        let mut data = gzip_member(None, b"abc");
        data[3] = 0x20;
        let result = File::open(Box::new(SliceSource::new(data)));
        assert!(matches!(result, Err(Error::UnsupportedFlag(0x20))));
    }

    #[test]
    fn read_past_end_returns_zero_and_reseek_recovers() {
        let file = open_slice(gzip_member(None, b"hi"));
        let mut buf = [0u8; 4];
        assert_eq!(file.read_at(100, &mut buf).unwrap(), 0);

        assert_eq!(file.seek(Whence::Start, 0).unwrap(), 0);
        let mut buf = [0u8; 2];
        assert_eq!(file.read(&mut buf).unwrap(), 2);
        assert_eq!(&buf, b"hi");
    }

    #[test]
    fn large_member_is_split_into_multiple_segments() {
        let payload = vec![b'A'; 4 * 1024 * 1024];
        let mut data = vec![0x1f, 0x8b, 8, 0, 0, 0, 0, 0, 0, 0xff];
        // Build a multi-block stored stream manually: several non-final
        // stored blocks followed by one final empty stored block.
        let mut body = Vec::new();
        for chunk in payload.chunks(60_000) {
            body.extend_from_slice(&stored_block_non_final(chunk));
        }
        body.extend_from_slice(&stored_deflate(b""));
        data.extend_from_slice(&body);
        data.extend_from_slice(&crc32(&payload).to_le_bytes());
        data.extend_from_slice(&(payload.len() as u32).to_le_bytes());

        let file = open_slice(data);
        assert_eq!(file.uncompressed_size().unwrap(), payload.len() as u64);
        assert!(file.inner.read().unwrap().segments.len() >= 4);

        let mut buf = [0u8; 16];
        assert_eq!(file.read_at(3_000_000, &mut buf).unwrap(), 16);
        assert_eq!(&buf, b"AAAAAAAAAAAAAAAA");

        // Re-reading the same bytes must not re-run the DEFLATE driver: the
        // second read should come back from the cache and return the same
        // content.
        let mut buf2 = [0u8; 16];
        assert_eq!(file.read_at(3_000_000, &mut buf2).unwrap(), 16);
        assert_eq!(buf, buf2);
    }

    fn stored_block_non_final(payload: &[u8]) -> Vec<u8> {
        let mut bytes = vec![0u8];
        bytes.extend_from_slice(&(payload.len() as u16).to_le_bytes());
        bytes.extend_from_slice(&(!(payload.len() as u16)).to_le_bytes());
        bytes.extend_from_slice(payload);
        bytes
    }

    #[test]
    fn signal_abort_interrupts_in_flight_read() {
        let file = open_slice(gzip_member(None, b"hello"));
        file.signal_abort();
        let mut buf = [0u8; 5];
        assert!(matches!(file.read_at(0, &mut buf), Err(Error::Aborted)));
    }
}
