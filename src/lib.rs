//! gzipf — a random-access, seekable reader for concatenated GZIP members.
//!
//! Parses the chain of member headers/footers, drives a DEFLATE decoder
//! across them, carves the output into cache-friendly segments, and serves
//! random-access reads of the virtual uncompressed stream through a bounded
//! LRU of decompressed segments.

pub mod bitio;
pub mod cache;
pub mod config;
pub mod crc32;
pub mod deflate;
pub mod error;
pub mod file;
pub mod gzip;
pub mod huffman;
pub mod index;
pub mod source;

pub use error::{Error, Result};
pub use file::{File, MemberHandle, Whence};
pub use source::{FileSource, SliceSource, Source};
