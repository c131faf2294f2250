//! Error taxonomy for the indexing/decoding engine.
//!
//! A single enum covers every failure kind a caller of the public API can
//! observe: malformed GZIP containers, malformed DEFLATE streams, footer
//! mismatches, and the handful of caller-misuse cases (bad seek offsets,
//! abort). A plain enum, a hand-written `Display`, and an `std::error::Error`
//! impl, rather than reaching for a derive-macro error crate.

use std::fmt;
use std::io;

/// Errors produced by opening, indexing, seeking, or reading a [`crate::file::File`].
#[derive(Debug)]
pub enum Error {
    /// The underlying [`crate::source::Source`] returned an I/O error.
    Io(io::Error),
    /// The source is too small to hold even a minimal GZIP member (< 10 bytes).
    InvalidSource,
    /// A member header did not begin with the GZIP magic `0x1f 0x8b`.
    InvalidSignature,
    /// Byte 2 of a member header named a compression method other than 8 (DEFLATE).
    UnsupportedCompressionMethod(u8),
    /// Byte 3 of a member header set a reserved flag bit (outside `0x1f`).
    UnsupportedFlag(u8),
    /// The source was exhausted before a field, block, or name/comment could
    /// be fully read.
    TruncatedInput,
    /// The DEFLATE bitstream was malformed: a reserved block type, an invalid
    /// Huffman code, an out-of-range length/distance pair, or a stored-block
    /// `LEN`/`NLEN` mismatch. The payload names which check failed.
    InvalidDeflate(&'static str),
    /// A member's footer CRC-32 or ISIZE did not match the bytes actually
    /// decoded for that member.
    MemberFooterMismatch {
        /// Index into [`crate::file::File::member`] of the offending member.
        member_index: usize,
    },
    /// `seek` was asked to move to a negative absolute offset.
    InvalidOffset,
    /// The operation was interrupted by [`crate::file::File::signal_abort`].
    Aborted,
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Io(e) => write!(f, "I/O error: {e}"),
            Error::InvalidSource => write!(f, "source is smaller than a minimal GZIP member"),
            Error::InvalidSignature => write!(f, "member header signature mismatch"),
            Error::UnsupportedCompressionMethod(m) => {
                write!(f, "unsupported compression method {m}")
            }
            Error::UnsupportedFlag(flags) => write!(f, "unsupported header flag bits {flags:#04x}"),
            Error::TruncatedInput => write!(f, "input ended before the expected field was read"),
            Error::InvalidDeflate(what) => write!(f, "malformed DEFLATE stream: {what}"),
            Error::MemberFooterMismatch { member_index } => {
                write!(f, "member {member_index} footer CRC-32/ISIZE mismatch")
            }
            Error::InvalidOffset => write!(f, "seek produced a negative absolute offset"),
            Error::Aborted => write!(f, "operation aborted"),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<io::Error> for Error {
    fn from(e: io::Error) -> Self {
        Error::Io(e)
    }
}

pub type Result<T> = std::result::Result<T, Error>;
