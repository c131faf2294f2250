use crate::bitio::BitReader;
use crate::error::Result;

use super::block::decode_block;

/// Drives [`decode_block`] across a borrowed compressed-byte slice,
/// accumulating decoded output in a single growing buffer so that
/// back-references can reach across block boundaries within the slice.
///
/// Used both to decode a single cached segment down to its known
/// `uncompressed_size` (the segment cache's miss loader) and, one block at
/// a time, to drive the indexer across a whole member while it decides
/// where to cut segments (§4.3's "stream driver" contract applied
/// incrementally rather than to a fixed target length).
pub struct BlockDriver<'a> {
    bits: BitReader<'a>,
    output: Vec<u8>,
}

impl<'a> BlockDriver<'a> {
    /// `data` is the compressed byte slice to decode from, `starting_bit_count`
    /// the number of leading bits of `data[0]` already consumed by a prior
    /// block (0 at the start of a member's DEFLATE stream).
    pub fn new(data: &'a [u8], starting_bit_count: u8) -> Result<Self> {
        Ok(BlockDriver {
            bits: BitReader::resume(data, starting_bit_count)?,
            output: Vec::new(),
        })
    }

    /// Pre-seeds the output buffer with a segment's sliding-window
    /// dictionary, so that early back-references in this slice resolve
    /// against it exactly as they would against real preceding output.
    pub fn seed_dictionary(&mut self, dictionary: &[u8]) {
        self.output.extend_from_slice(dictionary);
    }

    /// Decodes exactly one block, returning whether it was the final block.
    pub fn decode_block(&mut self) -> Result<bool> {
        decode_block(&mut self.bits, &mut self.output)
    }

    /// The byte offset into `data` and bit-remainder of the next undecoded
    /// bit, per [`BitReader::consumed_position`].
    pub fn consumed_position(&self) -> (usize, u8) {
        self.bits.consumed_position()
    }

    /// All output produced so far, including any seeded dictionary prefix.
    pub fn output(&self) -> &[u8] {
        &self.output
    }

    /// Number of bytes produced since `dict_len` bytes of dictionary (or
    /// earlier segments' output) were already present.
    pub fn produced_len(&self, dict_len: usize) -> usize {
        self.output.len() - dict_len
    }

    /// The last up-to-`max` bytes of output, to seed the next segment's
    /// dictionary.
    pub fn tail(&self, max: usize) -> Vec<u8> {
        let start = self.output.len().saturating_sub(max);
        self.output[start..].to_vec()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stored_block_bytes(bfinal: bool, payload: &[u8]) -> Vec<u8> {
        let mut bytes = vec![if bfinal { 1 } else { 0 }];
        bytes.extend_from_slice(&(payload.len() as u16).to_le_bytes());
        bytes.extend_from_slice(&(!(payload.len() as u16)).to_le_bytes());
        bytes.extend_from_slice(payload);
        bytes
    }

    #[test]
    fn drives_a_single_stored_block_to_completion() {
        let bytes = stored_block_bytes(true, b"hello");
        let mut driver = BlockDriver::new(&bytes, 0).unwrap();
        let final_block = driver.decode_block().unwrap();
        assert!(final_block);
        assert_eq!(driver.output(), b"hello");
        assert_eq!(driver.produced_len(0), 5);
    }

    #[test]
    fn dictionary_seed_is_visible_to_back_references() {
        let bytes = stored_block_bytes(true, b"world");
        let mut driver = BlockDriver::new(&bytes, 0).unwrap();
        driver.seed_dictionary(b"hello ");
        driver.decode_block().unwrap();
        assert_eq!(driver.output(), b"hello world");
        assert_eq!(driver.produced_len(6), 5);
    }

    #[test]
    fn tail_returns_bounded_suffix() {
        let bytes = stored_block_bytes(true, b"abcdef");
        let mut driver = BlockDriver::new(&bytes, 0).unwrap();
        driver.decode_block().unwrap();
        assert_eq!(driver.tail(3), b"def");
        assert_eq!(driver.tail(100), b"abcdef");
    }
}
