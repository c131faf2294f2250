use std::sync::OnceLock;

use crate::bitio::BitReader;
use crate::error::{Error, Result};
use crate::huffman::tables::{
    fixed_distance_lengths, fixed_literal_lengths, CODE_LENGTH_ORDER, DISTANCE_BASE,
    DISTANCE_EXTRA_BITS, LENGTH_BASE, LENGTH_EXTRA_BITS,
};
use crate::huffman::Huffman;

const END_OF_BLOCK: u16 = 256;
const MAX_DISTANCE: usize = 32768;

static FIXED_LITERAL: OnceLock<Huffman> = OnceLock::new();
static FIXED_DISTANCE: OnceLock<Huffman> = OnceLock::new();

fn fixed_literal() -> &'static Huffman {
    FIXED_LITERAL.get_or_init(|| Huffman::build(&fixed_literal_lengths()).expect("fixed literal lengths are always valid"))
}

fn fixed_distance() -> &'static Huffman {
    FIXED_DISTANCE.get_or_init(|| Huffman::build(&fixed_distance_lengths()).expect("fixed distance lengths are always valid"))
}

/// Decodes exactly one DEFLATE block from `bits`, appending its output to
/// `output`. `output` must already hold whatever preceding bytes
/// back-references in this block may need (dictionary plus anything
/// decoded earlier in the same stream). Returns whether this was the final
/// block (`BFINAL`).
pub fn decode_block(bits: &mut BitReader, output: &mut Vec<u8>) -> Result<bool> {
    let bfinal = bits.get(1)? != 0;
    let btype = bits.get(2)?;

    match btype {
        0b00 => decode_stored(bits, output)?,
        0b01 => decode_huffman(bits, output, fixed_literal(), fixed_distance())?,
        0b10 => {
            let (literal, distance) = build_dynamic_trees(bits)?;
            decode_huffman(bits, output, &literal, &distance)?;
        }
        _ => return Err(Error::InvalidDeflate("reserved block type 11")),
    }

    Ok(bfinal)
}

fn decode_stored(bits: &mut BitReader, output: &mut Vec<u8>) -> Result<()> {
    bits.align_to_byte();
    let len = bits.get(16)? as u16;
    let nlen = bits.get(16)? as u16;
    if len != !nlen {
        return Err(Error::InvalidDeflate("stored block LEN/NLEN mismatch"));
    }
    output.reserve(len as usize);
    for _ in 0..len {
        output.push(bits.get(8)? as u8);
    }
    Ok(())
}

fn decode_huffman(
    bits: &mut BitReader,
    output: &mut Vec<u8>,
    literal: &Huffman,
    distance: &Huffman,
) -> Result<()> {
    loop {
        let symbol = literal.decode(bits)?;
        match symbol {
            0..=255 => output.push(symbol as u8),
            s if s == END_OF_BLOCK => return Ok(()),
            257..=285 => {
                let index = (symbol - 257) as usize;
                let extra = LENGTH_EXTRA_BITS[index];
                let length = LENGTH_BASE[index] as usize
                    + if extra > 0 { bits.get(extra)? as usize } else { 0 };

                let dist_symbol = distance.decode(bits)?;
                if dist_symbol as usize >= DISTANCE_BASE.len() {
                    return Err(Error::InvalidDeflate("distance symbol out of range"));
                }
                let dist_index = dist_symbol as usize;
                let dist_extra = DISTANCE_EXTRA_BITS[dist_index];
                let dist = DISTANCE_BASE[dist_index] as usize
                    + if dist_extra > 0 {
                        bits.get(dist_extra)? as usize
                    } else {
                        0
                    };

                if dist == 0 || dist > MAX_DISTANCE || dist > output.len() {
                    return Err(Error::InvalidDeflate("back-reference distance out of range"));
                }

                let mut src = output.len() - dist;
                for _ in 0..length {
                    let byte = output[src];
                    output.push(byte);
                    src += 1;
                }
            }
            _ => return Err(Error::InvalidDeflate("invalid length symbol")),
        }
    }
}

fn build_dynamic_trees(bits: &mut BitReader) -> Result<(Huffman, Huffman)> {
    let hlit = bits.get(5)? as usize + 257;
    let hdist = bits.get(5)? as usize + 1;
    let hclen = bits.get(4)? as usize + 4;

    let mut code_length_lengths = [0u8; 19];
    for i in 0..hclen {
        code_length_lengths[CODE_LENGTH_ORDER[i]] = bits.get(3)? as u8;
    }
    let code_length_tree = Huffman::build(&code_length_lengths)?;

    let mut lengths = Vec::with_capacity(hlit + hdist);
    while lengths.len() < hlit + hdist {
        let symbol = code_length_tree.decode(bits)?;
        match symbol {
            0..=15 => lengths.push(symbol as u8),
            16 => {
                let &prev = lengths
                    .last()
                    .ok_or(Error::InvalidDeflate("repeat code 16 with no previous length"))?;
                let repeat = 3 + bits.get(2)?;
                for _ in 0..repeat {
                    lengths.push(prev);
                }
            }
            17 => {
                let repeat = 3 + bits.get(3)?;
                for _ in 0..repeat {
                    lengths.push(0);
                }
            }
            18 => {
                let repeat = 11 + bits.get(7)?;
                for _ in 0..repeat {
                    lengths.push(0);
                }
            }
            _ => return Err(Error::InvalidDeflate("invalid code-length symbol")),
        }
    }
    if lengths.len() != hlit + hdist {
        return Err(Error::InvalidDeflate("code-length run overshot HLIT+HDIST"));
    }

    let literal_tree = Huffman::build(&lengths[..hlit])?;
    let distance_tree = Huffman::build(&lengths[hlit..])?;
    Ok((literal_tree, distance_tree))
}
