//! Canonical Huffman code construction and bit-by-bit decoding, per
//! RFC 1951 §3.2.2's code-length-to-code algorithm and the companion
//! decoding scheme described in the same RFC's appendix.

mod decoder;
pub mod tables;

pub use decoder::Huffman;
