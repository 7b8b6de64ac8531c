//! Tier-2 packet header coding (ISO/IEC 15444-1 B.9/B.10).
//!
//! A packet carries, for one (layer, resolution, component, precinct), the
//! inclusion state, zero-bitplane counts, pass counts and codeword-segment
//! lengths of every code-block in the precinct, bit-packed with the
//! stuff-bit rule, followed by the concatenated segment bytes.

use super::bit_io::{PacketBitReader, PacketBitWriter};
use super::bit_plane_coder::{pass_is_raw, CBLK_STYLE_TERMALL};
use super::tag_tree::TagTree;
use crate::error::CodecError;

/// Progression orders, SGcod values 0-4.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(u8)]
pub enum ProgressionOrder {
    #[default]
    Lrcp = 0,
    Rlcp = 1,
    Rpcl = 2,
    Pcrl = 3,
    Cprl = 4,
}

impl ProgressionOrder {
    pub fn from_u8(value: u8) -> Result<Self, CodecError> {
        match value {
            0 => Ok(Self::Lrcp),
            1 => Ok(Self::Rlcp),
            2 => Ok(Self::Rpcl),
            3 => Ok(Self::Pcrl),
            4 => Ok(Self::Cprl),
            _ => Err(CodecError::InvalidCodSegment),
        }
    }
}

/// The (layer, resolution, component) visit order for a single-tile,
/// single-precinct codestream.
pub fn progression_sequence(
    order: ProgressionOrder,
    layers: usize,
    resolutions: usize,
    components: usize,
) -> Vec<(usize, usize, usize)> {
    let mut sequence = Vec::with_capacity(layers * resolutions * components);
    match order {
        ProgressionOrder::Lrcp => {
            for l in 0..layers {
                for r in 0..resolutions {
                    for c in 0..components {
                        sequence.push((l, r, c));
                    }
                }
            }
        }
        ProgressionOrder::Rlcp => {
            for r in 0..resolutions {
                for l in 0..layers {
                    for c in 0..components {
                        sequence.push((l, r, c));
                    }
                }
            }
        }
        ProgressionOrder::Rpcl => {
            for r in 0..resolutions {
                for c in 0..components {
                    for l in 0..layers {
                        sequence.push((l, r, c));
                    }
                }
            }
        }
        ProgressionOrder::Pcrl | ProgressionOrder::Cprl => {
            for c in 0..components {
                for r in 0..resolutions {
                    for l in 0..layers {
                        sequence.push((l, r, c));
                    }
                }
            }
        }
    }
    sequence
}

/// Per-precinct, per-band packet coding state persisted across layers.
#[derive(Debug)]
pub struct PrecinctBandState {
    pub grid_width: usize,
    pub grid_height: usize,
    pub inclusion: TagTree,
    pub zero_bitplanes: TagTree,
    pub included: Vec<bool>,
    pub lblock: Vec<u8>,
}

impl PrecinctBandState {
    pub fn new(grid_width: usize, grid_height: usize) -> Self {
        let count = grid_width * grid_height;
        Self {
            grid_width,
            grid_height,
            inclusion: TagTree::new(grid_width, grid_height),
            zero_bitplanes: TagTree::new(grid_width, grid_height),
            included: vec![false; count],
            lblock: vec![3; count],
        }
    }
}

/// Table B.4 pass-count code.
pub fn write_pass_count(writer: &mut PacketBitWriter, passes: usize) {
    debug_assert!((1..=164).contains(&passes));
    match passes {
        1 => writer.put_bit(0),
        2 => {
            writer.put_bits(0b10, 2);
        }
        3..=5 => {
            writer.put_bits(0b11, 2);
            writer.put_bits((passes - 3) as u32, 2);
        }
        6..=36 => {
            writer.put_bits(0b1111, 4);
            writer.put_bits((passes - 6) as u32, 5);
        }
        _ => {
            writer.put_bits(0b1_1111_1111, 9);
            writer.put_bits((passes - 37) as u32, 7);
        }
    }
}

pub fn read_pass_count(reader: &mut PacketBitReader) -> Result<usize, CodecError> {
    if reader.get_bit()? == 0 {
        return Ok(1);
    }
    if reader.get_bit()? == 0 {
        return Ok(2);
    }
    let two = reader.get_bits(2)?;
    if two < 3 {
        return Ok(3 + two as usize);
    }
    let five = reader.get_bits(5)?;
    if five < 31 {
        return Ok(6 + five as usize);
    }
    let seven = reader.get_bits(7)?;
    Ok(37 + seven as usize)
}

fn floor_log2(value: usize) -> u8 {
    (usize::BITS - 1 - value.leading_zeros()) as u8
}

/// Split a layer's pass range of one code-block into the codeword-segment
/// portions signalled in this packet. Boundaries fall where the block style
/// terminates inside the chunk (every pass under TERMALL, MQ/raw switches
/// under BYPASS).
pub fn chunk_segment_passes(style: u8, first_pass: usize, count: usize) -> Vec<usize> {
    let mut spans = Vec::new();
    let mut run = 0usize;
    for pass in first_pass..first_pass + count {
        run += 1;
        let boundary = style & CBLK_STYLE_TERMALL != 0
            || pass_is_raw(style, pass) != pass_is_raw(style, pass + 1);
        if boundary {
            spans.push(run);
            run = 0;
        }
    }
    if run > 0 {
        spans.push(run);
    }
    spans
}

/// Emit the LBlock update and one length per segment portion.
/// `segment_lengths` pairs each portion's pass count with its byte length.
pub fn write_segment_lengths(
    writer: &mut PacketBitWriter,
    lblock: &mut u8,
    segments: &[(usize, usize)],
) {
    let mut needed = *lblock;
    for &(passes, len) in segments {
        let value_bits = if len == 0 {
            1
        } else {
            (usize::BITS - len.leading_zeros()) as u8
        };
        let have = floor_log2(passes);
        needed = needed.max(value_bits.saturating_sub(have));
    }
    for _ in *lblock..needed {
        writer.put_bit(1);
    }
    writer.put_bit(0);
    *lblock = needed;
    for &(passes, len) in segments {
        writer.put_bits(len as u32, *lblock + floor_log2(passes));
    }
}

/// Mirror of `write_segment_lengths`: returns the byte length of each
/// portion given its pass count.
pub fn read_segment_lengths(
    reader: &mut PacketBitReader,
    lblock: &mut u8,
    segment_passes: &[usize],
) -> Result<Vec<usize>, CodecError> {
    while reader.get_bit()? == 1 {
        *lblock = lblock.checked_add(1).ok_or(CodecError::InvalidPacketHeader)?;
        if *lblock > 32 {
            return Err(CodecError::InvalidPacketHeader);
        }
    }
    let mut lengths = Vec::with_capacity(segment_passes.len());
    for &passes in segment_passes {
        let bits = *lblock + floor_log2(passes);
        if bits > 32 {
            return Err(CodecError::InvalidPacketHeader);
        }
        lengths.push(reader.get_bits(bits)? as usize);
    }
    Ok(lengths)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::jpeg2000::bit_plane_coder::CBLK_STYLE_BYPASS;

    #[test]
    fn pass_count_code_roundtrip() {
        for passes in [1usize, 2, 3, 4, 5, 6, 7, 36, 37, 91, 164] {
            let mut writer = PacketBitWriter::new();
            write_pass_count(&mut writer, passes);
            let bytes = writer.finish();
            let mut reader = PacketBitReader::new(&bytes);
            assert_eq!(read_pass_count(&mut reader).unwrap(), passes);
        }
    }

    #[test]
    fn segment_lengths_roundtrip() {
        let segments = [(1usize, 0usize), (2, 513), (3, 17)];
        let mut lblock_w = 3u8;
        let mut writer = PacketBitWriter::new();
        write_segment_lengths(&mut writer, &mut lblock_w, &segments);
        let bytes = writer.finish();

        let mut lblock_r = 3u8;
        let mut reader = PacketBitReader::new(&bytes);
        let passes: Vec<usize> = segments.iter().map(|&(p, _)| p).collect();
        let lengths = read_segment_lengths(&mut reader, &mut lblock_r, &passes).unwrap();
        assert_eq!(lengths, vec![0, 513, 17]);
        assert_eq!(lblock_w, lblock_r);
    }

    #[test]
    fn chunk_segments_default_style_is_one_span() {
        assert_eq!(chunk_segment_passes(0, 0, 7), vec![7]);
        assert_eq!(chunk_segment_passes(0, 4, 3), vec![3]);
    }

    #[test]
    fn chunk_segments_termall_is_one_per_pass() {
        assert_eq!(chunk_segment_passes(CBLK_STYLE_TERMALL, 2, 4), vec![1, 1, 1, 1]);
    }

    #[test]
    fn chunk_segments_bypass_splits_at_coder_switches() {
        // Passes 9..=12: cleanup(9, MQ) | sigprop(10, raw) magref(11, raw) |
        // cleanup(12, MQ).
        assert_eq!(
            chunk_segment_passes(CBLK_STYLE_BYPASS, 9, 4),
            vec![1, 2, 1]
        );
    }

    #[test]
    fn progression_orders_cover_all_packets() {
        for order in [
            ProgressionOrder::Lrcp,
            ProgressionOrder::Rlcp,
            ProgressionOrder::Rpcl,
            ProgressionOrder::Pcrl,
            ProgressionOrder::Cprl,
        ] {
            let seq = progression_sequence(order, 2, 3, 2);
            assert_eq!(seq.len(), 12);
            let mut seen = std::collections::BTreeSet::new();
            for item in seq {
                assert!(seen.insert(item));
            }
        }
    }

    #[test]
    fn lrcp_orders_layers_outermost() {
        let seq = progression_sequence(ProgressionOrder::Lrcp, 2, 2, 1);
        assert_eq!(seq, vec![(0, 0, 0), (0, 1, 0), (1, 0, 0), (1, 1, 0)]);
    }
}
