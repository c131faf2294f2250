use crate::config::DICTIONARY_SIZE;

/// Descriptor for one resumable chunk of a member's DEFLATE output, carrying
/// everything needed to decode it independently of any other segment.
#[derive(Debug, Clone)]
pub struct SegmentDescriptor {
    /// File offset of the segment's first compressed byte. Already
    /// adjusted to include the partially-consumed byte when
    /// `starting_bit_count > 0` (see [`crate::bitio::BitReader::consumed_position`]).
    pub compressed_offset: u64,
    /// Compressed bytes consumed decoding this segment.
    pub compressed_size: u64,
    /// Uncompressed bytes produced by this segment.
    pub uncompressed_size: usize,
    /// Index of this member within `File::members`.
    pub member_index: usize,
    /// High bits of `compressed_offset`'s first byte already consumed by
    /// the preceding segment's final block.
    pub starting_bit_count: u8,
    /// Valid length of `dictionary`.
    pub dictionary_len: u16,
    /// The last `dictionary_len` bytes of output preceding this segment,
    /// boxed to keep `SegmentDescriptor` itself off the stack.
    pub dictionary: Box<[u8; DICTIONARY_SIZE]>,
}

impl SegmentDescriptor {
    pub fn dictionary_bytes(&self) -> &[u8] {
        &self.dictionary[..self.dictionary_len as usize]
    }
}
