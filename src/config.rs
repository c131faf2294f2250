//! Compile-time tunables for the indexing/decoding engine.
//!
//! Centralizes the constants that drive segmentation, caching, and the
//! defensive bounds used while parsing member headers.

/// Size, in compressed bytes consumed, at which the indexer closes the
/// current segment and starts a new one. Also the trigger checked after
/// every DEFLATE block.
pub const SEGMENT_SIZE: u64 = 1 << 20;

/// Soft cap on the number of uncompressed bytes held by a single segment.
/// A segment may end earlier (end of DEFLATE stream, decompression error),
/// but never carries more than this many decoded bytes.
pub const UNCOMPRESSED_BLOCK_SIZE: usize = 1 << 20;

/// Width of the sliding-window dictionary preserved at each segment
/// boundary, per RFC 1951's 32 KiB back-reference window.
pub const DICTIONARY_SIZE: usize = 32 * 1024;

/// Default number of decoded segments kept resident in the LRU cache.
pub const DEFAULT_CACHE_CAPACITY: usize = 8;

/// Chunk size used when scanning NUL-terminated FNAME/FCOMMENT fields.
pub const NAME_CHUNK_SIZE: usize = 64;

/// Maximum number of [`NAME_CHUNK_SIZE`]-byte chunks read while scanning a
/// single FNAME/FCOMMENT field before giving up with `TruncatedInput`. Bounds
/// worst-case name/comment scanning work to `MAX_RECURSION * NAME_CHUNK_SIZE`
/// bytes.
pub const MAX_RECURSION: usize = 256;
