//! Bit-level cursor over a borrowed DEFLATE byte stream.
//!
//! A byte slice, a byte offset into it, and a small bit buffer refilled one
//! byte at a time. RFC 1951 packs bits LSB-first within each byte, so bits
//! are pulled out of the low end of the buffer and new bytes are shifted in
//! above whatever is left.

mod reader;

pub use reader::BitReader;
