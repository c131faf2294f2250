//! The minimal positioned-read capability the engine needs from whatever is
//! backing a [`crate::file::File`].
//!
//! A single `&dyn Source` is carried by value through the indexer, the
//! cache loader, and the header parser, rather than threading a generic
//! `R: Read + Seek` through every function.

use std::fs::File;
use std::io;
use std::path::Path;

/// A positioned, cursor-free read source. `read_at` must not share or
/// advance any internal file cursor between calls, so concurrent reads at
/// different offsets never race with each other.
pub trait Source: Send + Sync {
    /// Total size of the underlying data in bytes.
    fn size(&self) -> u64;

    /// Reads into `buf` starting at `offset`. Returns the number of bytes
    /// actually written, which is less than `buf.len()` only at end of
    /// data, never mid-stream.
    fn read_at(&self, offset: u64, buf: &mut [u8]) -> io::Result<usize>;
}

/// [`Source`] backed by an open [`std::fs::File`], using the platform's
/// positioned-read syscall so no shared cursor is involved.
pub struct FileSource {
    file: File,
    size: u64,
}

impl FileSource {
    pub fn open(path: impl AsRef<Path>) -> io::Result<Self> {
        let file = File::open(path)?;
        let size = file.metadata()?.len();
        Ok(FileSource { file, size })
    }

    pub fn from_file(file: File) -> io::Result<Self> {
        let size = file.metadata()?.len();
        Ok(FileSource { file, size })
    }
}

impl Source for FileSource {
    fn size(&self) -> u64 {
        self.size
    }

    #[cfg(unix)]
    fn read_at(&self, offset: u64, buf: &mut [u8]) -> io::Result<usize> {
        use std::os::unix::fs::FileExt;
        self.file.read_at(buf, offset)
    }

    #[cfg(windows)]
    fn read_at(&self, offset: u64, buf: &mut [u8]) -> io::Result<usize> {
        use std::os::windows::fs::FileExt;
        self.file.seek_read(buf, offset)
    }
}

/// [`Source`] backed by an in-memory byte buffer, used by tests and by
/// callers that already have the whole GZIP file resident.
pub struct SliceSource {
    data: Vec<u8>,
}

impl SliceSource {
    pub fn new(data: Vec<u8>) -> Self {
        SliceSource { data }
    }
}

impl Source for SliceSource {
    fn size(&self) -> u64 {
        self.data.len() as u64
    }

    fn read_at(&self, offset: u64, buf: &mut [u8]) -> io::Result<usize> {
        let offset = offset as usize;
        if offset >= self.data.len() {
            return Ok(0);
        }
        let available = &self.data[offset..];
        let n = available.len().min(buf.len());
        buf[..n].copy_from_slice(&available[..n]);
        Ok(n)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slice_source_reads_at_offset() {
        let source = SliceSource::new(b"hello world".to_vec());
        let mut buf = [0u8; 5];
        assert_eq!(source.read_at(6, &mut buf).unwrap(), 5);
        assert_eq!(&buf, b"world");
    }

    #[test]
    fn slice_source_short_read_at_eof() {
        let source = SliceSource::new(b"hi".to_vec());
        let mut buf = [0u8; 5];
        assert_eq!(source.read_at(1, &mut buf).unwrap(), 1);
        assert_eq!(buf[0], b'i');
    }

    #[test]
    fn slice_source_past_end_returns_zero() {
        let source = SliceSource::new(b"hi".to_vec());
        let mut buf = [0u8; 5];
        assert_eq!(source.read_at(10, &mut buf).unwrap(), 0);
    }

    /// `FileSource` and `SliceSource` must agree byte-for-byte on every
    /// offset/length combination, including the short read at end of data.
    #[test]
    fn file_source_matches_slice_source() {
        use std::io::Write;

        let bytes = b"\x1f\x8b\x08\x00\x00\x00\x00\x00\x00\xffhello world".to_vec();

        let mut tmp = tempfile::NamedTempFile::new().unwrap();
        tmp.write_all(&bytes).unwrap();
        tmp.flush().unwrap();

        let file_source = FileSource::open(tmp.path()).unwrap();
        let slice_source = SliceSource::new(bytes.clone());

        assert_eq!(file_source.size(), slice_source.size());

        for (offset, len) in [(0u64, 4usize), (10, 5), (bytes.len() as u64 - 2, 5), (100, 5)] {
            let mut file_buf = vec![0u8; len];
            let mut slice_buf = vec![0u8; len];
            let file_n = file_source.read_at(offset, &mut file_buf).unwrap();
            let slice_n = slice_source.read_at(offset, &mut slice_buf).unwrap();
            assert_eq!(file_n, slice_n);
            assert_eq!(file_buf, slice_buf);
        }
    }
}
