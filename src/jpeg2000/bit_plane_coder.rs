//! EBCOT Tier-1 code-block coding (ISO/IEC 15444-1 Annex D).
//!
//! Three passes per bitplane (significance propagation, magnitude
//! refinement, cleanup) over the 19-context model of Tables D-1..D-5, in
//! stripe order (columns of four rows). Code-block styles: BYPASS (raw
//! significance/refinement passes from the fifth bitplane), RESET, TERMALL,
//! vertically-causal is rejected upstream, PTERM and SEGMARK.

use super::mq_coder::{MqDecoder, MqEncoder, RawDecoder, RawEncoder, CTX_RUN, CTX_UNIFORM};
use crate::error::CodecError;

pub const CBLK_STYLE_BYPASS: u8 = 0x01;
pub const CBLK_STYLE_RESET: u8 = 0x02;
pub const CBLK_STYLE_TERMALL: u8 = 0x04;
pub const CBLK_STYLE_VSC: u8 = 0x08;
pub const CBLK_STYLE_PTERM: u8 = 0x10;
pub const CBLK_STYLE_SEGMARK: u8 = 0x20;

const SIG: u8 = 1;
const VISITED: u8 = 2;
const REFINED: u8 = 4;
const SIGN_NEG: u8 = 8;

/// Pass kind within a bitplane.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PassKind {
    SignificancePropagation,
    MagnitudeRefinement,
    Cleanup,
}

/// Kind of the pass at global index `pass` (0-based; the first pass is the
/// cleanup of the most significant plane).
pub fn pass_kind(pass: usize) -> PassKind {
    match (pass + 2) % 3 {
        0 => PassKind::SignificancePropagation,
        1 => PassKind::MagnitudeRefinement,
        _ => PassKind::Cleanup,
    }
}

/// Bitplane (counted from the top, 0 = most significant coded plane) the
/// pass at `pass` works on.
pub fn pass_plane(pass: usize) -> usize {
    (pass + 2) / 3
}

/// Whether the pass is raw-coded under the lazy (BYPASS) style: from the
/// fifth bitplane on, significance propagation and refinement bypass the MQ
/// coder.
pub fn pass_is_raw(style: u8, pass: usize) -> bool {
    style & CBLK_STYLE_BYPASS != 0
        && pass_plane(pass) >= 4
        && pass_kind(pass) != PassKind::Cleanup
}

/// Whether a codeword segment terminates after this pass.
pub fn pass_terminates(style: u8, pass: usize, total_passes: usize) -> bool {
    if pass + 1 == total_passes {
        return true;
    }
    if style & CBLK_STYLE_TERMALL != 0 {
        return true;
    }
    pass_is_raw(style, pass) != pass_is_raw(style, pass + 1)
}

/// Split `total_passes` into codeword segments: (first pass, pass count).
pub fn segment_spans(style: u8, total_passes: usize) -> Vec<(usize, usize)> {
    let mut spans = Vec::new();
    let mut start = 0;
    for pass in 0..total_passes {
        if pass_terminates(style, pass, total_passes) {
            spans.push((start, pass + 1 - start));
            start = pass + 1;
        }
    }
    spans
}

/// Per-sample coding state shared by encoder and decoder.
struct BlockState {
    width: usize,
    height: usize,
    orientation: usize,
    state: Vec<u8>,
}

impl BlockState {
    fn new(width: usize, height: usize, orientation: usize) -> Self {
        Self {
            width,
            height,
            orientation,
            state: vec![0; width * height],
        }
    }

    #[inline]
    fn flags(&self, x: i64, y: i64) -> u8 {
        if x < 0 || y < 0 || x >= self.width as i64 || y >= self.height as i64 {
            0
        } else {
            self.state[y as usize * self.width + x as usize]
        }
    }

    #[inline]
    fn sig(&self, x: i64, y: i64) -> u8 {
        (self.flags(x, y) & SIG != 0) as u8
    }

    /// Counts of significant horizontal, vertical and diagonal neighbours.
    fn neighbour_counts(&self, x: usize, y: usize) -> (u8, u8, u8) {
        let (x, y) = (x as i64, y as i64);
        let h = self.sig(x - 1, y) + self.sig(x + 1, y);
        let v = self.sig(x, y - 1) + self.sig(x, y + 1);
        let d = self.sig(x - 1, y - 1)
            + self.sig(x + 1, y - 1)
            + self.sig(x - 1, y + 1)
            + self.sig(x + 1, y + 1);
        (h, v, d)
    }

    /// Zero-coding context, Table D-1.
    fn zc_context(&self, x: usize, y: usize) -> usize {
        let (h, v, d) = self.neighbour_counts(x, y);
        // HL transposes the roles of horizontal and vertical neighbours.
        let (h, v) = if self.orientation == 1 { (v, h) } else { (h, v) };
        if self.orientation == 3 {
            match (d, h + v) {
                (d, _) if d >= 3 => 8,
                (2, hv) if hv >= 1 => 7,
                (2, _) => 6,
                (1, hv) if hv >= 2 => 5,
                (1, 1) => 4,
                (1, _) => 3,
                (0, hv) if hv >= 2 => 2,
                (0, 1) => 1,
                _ => 0,
            }
        } else {
            match (h, v, d) {
                (2, _, _) => 8,
                (1, v, _) if v >= 1 => 7,
                (1, 0, d) if d >= 1 => 6,
                (1, 0, 0) => 5,
                (0, 2, _) => 4,
                (0, 1, _) => 3,
                (0, 0, d) if d >= 2 => 2,
                (0, 0, 1) => 1,
                _ => 0,
            }
        }
    }

    /// Sign contribution of one neighbour: +1 significant positive,
    /// -1 significant negative, 0 otherwise.
    #[inline]
    fn sign_contribution(&self, x: i64, y: i64) -> i32 {
        let flags = self.flags(x, y);
        if flags & SIG == 0 {
            0
        } else if flags & SIGN_NEG != 0 {
            -1
        } else {
            1
        }
    }

    /// Sign-coding context and XOR predictor, Table D-3.
    fn sc_context(&self, x: usize, y: usize) -> (usize, u8) {
        let (x, y) = (x as i64, y as i64);
        let h = (self.sign_contribution(x - 1, y) + self.sign_contribution(x + 1, y)).clamp(-1, 1);
        let v = (self.sign_contribution(x, y - 1) + self.sign_contribution(x, y + 1)).clamp(-1, 1);
        match (h, v) {
            (1, 1) => (13, 0),
            (1, 0) => (12, 0),
            (1, -1) => (11, 0),
            (0, 1) => (10, 0),
            (0, 0) => (9, 0),
            (0, -1) => (10, 1),
            (-1, 1) => (11, 1),
            (-1, 0) => (12, 1),
            (-1, -1) => (13, 1),
            _ => unreachable!(),
        }
    }

    /// Magnitude-refinement context, Table D-4.
    fn mr_context(&self, x: usize, y: usize) -> usize {
        let flags = self.state[y * self.width + x];
        if flags & REFINED != 0 {
            16
        } else {
            let (h, v, d) = self.neighbour_counts(x, y);
            if h + v + d > 0 {
                15
            } else {
                14
            }
        }
    }

    /// Run-length mode applies when a whole stripe column of four is
    /// insignificant, unvisited and without significant neighbours.
    fn run_candidate(&self, x: usize, y0: usize) -> bool {
        if y0 + 4 > self.height {
            return false;
        }
        for y in y0..y0 + 4 {
            if self.state[y * self.width + x] & (SIG | VISITED) != 0 {
                return false;
            }
            let (h, v, d) = self.neighbour_counts(x, y);
            if h + v + d != 0 {
                return false;
            }
        }
        true
    }

    fn clear_visited(&mut self) {
        for flags in &mut self.state {
            *flags &= !VISITED;
        }
    }
}

/// Result of Tier-1 encoding one code-block.
#[derive(Debug, Clone, Default)]
pub struct EncodedCodeBlock {
    pub data: Vec<u8>,
    pub num_passes: usize,
    /// Magnitude bitplanes actually coded.
    pub num_bitplanes: u8,
    /// Cumulative committed byte count after each pass; valid truncation
    /// points for layer assembly.
    pub pass_ends: Vec<usize>,
}

pub fn encode_code_block(
    coefficients: &[i32],
    width: usize,
    height: usize,
    orientation: usize,
    style: u8,
) -> EncodedCodeBlock {
    debug_assert_eq!(coefficients.len(), width * height);
    let max_magnitude = coefficients.iter().map(|c| c.unsigned_abs()).max().unwrap_or(0);
    if max_magnitude == 0 {
        return EncodedCodeBlock::default();
    }
    let num_bitplanes = (32 - max_magnitude.leading_zeros()) as usize;
    let total_passes = 3 * num_bitplanes - 2;

    let mut magnitudes = vec![0u32; coefficients.len()];
    let mut block = BlockState::new(width, height, orientation);
    for (i, &c) in coefficients.iter().enumerate() {
        magnitudes[i] = c.unsigned_abs();
        if c < 0 {
            block.state[i] |= SIGN_NEG;
        }
    }

    let mut mq = MqEncoder::new();
    let mut raw = RawEncoder::new();
    let mut data = Vec::new();
    let mut pass_ends = Vec::with_capacity(total_passes);

    for pass in 0..total_passes {
        let plane = (num_bitplanes - 1 - pass_plane(pass)) as u32;
        let is_raw = pass_is_raw(style, pass);
        match pass_kind(pass) {
            PassKind::SignificancePropagation => {
                encode_sig_prop(&mut block, &magnitudes, plane, &mut mq, &mut raw, is_raw)
            }
            PassKind::MagnitudeRefinement => {
                encode_mag_ref(&mut block, &magnitudes, plane, &mut mq, &mut raw, is_raw)
            }
            PassKind::Cleanup => {
                encode_cleanup(&mut block, &magnitudes, plane, &mut mq);
                if style & CBLK_STYLE_SEGMARK != 0 {
                    mq.segmark();
                }
                block.clear_visited();
            }
        }

        if pass_terminates(style, pass, total_passes) {
            let segment = if is_raw {
                raw.flush()
            } else if style & CBLK_STYLE_PTERM != 0 {
                mq.flush_predictable()
            } else {
                mq.flush()
            };
            data.extend_from_slice(&segment);
            pass_ends.push(data.len());
        } else {
            let committed = if is_raw {
                raw.committed_len()
            } else {
                mq.committed_len()
            };
            pass_ends.push(data.len() + committed);
        }
        if style & CBLK_STYLE_RESET != 0 {
            mq.reset_contexts();
        }
    }

    EncodedCodeBlock {
        data,
        num_passes: total_passes,
        num_bitplanes: num_bitplanes as u8,
        pass_ends,
    }
}

fn encode_sig_prop(
    block: &mut BlockState,
    magnitudes: &[u32],
    plane: u32,
    mq: &mut MqEncoder,
    raw: &mut RawEncoder,
    is_raw: bool,
) {
    let (w, h) = (block.width, block.height);
    for y0 in (0..h).step_by(4) {
        for x in 0..w {
            for y in y0..(y0 + 4).min(h) {
                let i = y * w + x;
                if block.state[i] & (SIG | VISITED) != 0 {
                    continue;
                }
                let ctx = block.zc_context(x, y);
                if ctx == 0 {
                    continue;
                }
                let bit = ((magnitudes[i] >> plane) & 1) as u8;
                if is_raw {
                    raw.put(bit);
                } else {
                    mq.encode(bit, ctx);
                }
                if bit == 1 {
                    let negative = block.state[i] & SIGN_NEG != 0;
                    if is_raw {
                        raw.put(negative as u8);
                    } else {
                        let (sc, xor) = block.sc_context(x, y);
                        mq.encode(negative as u8 ^ xor, sc);
                    }
                    block.state[i] |= SIG;
                }
                block.state[i] |= VISITED;
            }
        }
    }
}

fn encode_mag_ref(
    block: &mut BlockState,
    magnitudes: &[u32],
    plane: u32,
    mq: &mut MqEncoder,
    raw: &mut RawEncoder,
    is_raw: bool,
) {
    let (w, h) = (block.width, block.height);
    for y0 in (0..h).step_by(4) {
        for x in 0..w {
            for y in y0..(y0 + 4).min(h) {
                let i = y * w + x;
                if block.state[i] & SIG == 0 || block.state[i] & VISITED != 0 {
                    continue;
                }
                let bit = ((magnitudes[i] >> plane) & 1) as u8;
                if is_raw {
                    raw.put(bit);
                } else {
                    let ctx = block.mr_context(x, y);
                    mq.encode(bit, ctx);
                }
                block.state[i] |= REFINED | VISITED;
            }
        }
    }
}

fn encode_cleanup(block: &mut BlockState, magnitudes: &[u32], plane: u32, mq: &mut MqEncoder) {
    let (w, h) = (block.width, block.height);
    for y0 in (0..h).step_by(4) {
        for x in 0..w {
            let mut y = y0;
            let stripe_end = (y0 + 4).min(h);
            if block.run_candidate(x, y0) {
                let mut run = 0;
                while run < 4 && (magnitudes[(y0 + run) * w + x] >> plane) & 1 == 0 {
                    run += 1;
                }
                if run == 4 {
                    mq.encode(0, CTX_RUN);
                    continue;
                }
                mq.encode(1, CTX_RUN);
                mq.encode((run >> 1) as u8 & 1, CTX_UNIFORM);
                mq.encode(run as u8 & 1, CTX_UNIFORM);
                y = y0 + run;
                let i = y * w + x;
                let negative = block.state[i] & SIGN_NEG != 0;
                let (sc, xor) = block.sc_context(x, y);
                mq.encode(negative as u8 ^ xor, sc);
                block.state[i] |= SIG;
                y += 1;
            }
            while y < stripe_end {
                let i = y * w + x;
                if block.state[i] & VISITED == 0 {
                    let bit = ((magnitudes[i] >> plane) & 1) as u8;
                    let ctx = block.zc_context(x, y);
                    mq.encode(bit, ctx);
                    if bit == 1 {
                        let negative = block.state[i] & SIGN_NEG != 0;
                        let (sc, xor) = block.sc_context(x, y);
                        mq.encode(negative as u8 ^ xor, sc);
                        block.state[i] |= SIG;
                    }
                }
                y += 1;
            }
        }
    }
}

/// One codeword segment handed to the decoder by Tier-2.
#[derive(Debug, Clone, Default)]
pub struct CodeSegment {
    pub data: Vec<u8>,
    pub passes: usize,
}

/// Decode a code-block from its codeword segments. `num_bitplanes` is the
/// number of magnitude planes actually coded (Mb minus the signalled
/// missing bitplanes); decoding stops after `total_passes` and leaves the
/// remaining planes zero.
pub fn decode_code_block(
    segments: &[CodeSegment],
    width: usize,
    height: usize,
    orientation: usize,
    num_bitplanes: usize,
    style: u8,
) -> Result<Vec<i32>, CodecError> {
    let total_passes: usize = segments.iter().map(|s| s.passes).sum();
    if total_passes == 0 || num_bitplanes == 0 {
        return Ok(vec![0; width * height]);
    }
    if num_bitplanes > 31 {
        return Err(CodecError::InvalidPacketHeader);
    }
    let max_passes = 3 * num_bitplanes - 2;
    let total_passes = total_passes.min(max_passes);

    let mut block = BlockState::new(width, height, orientation);
    let mut magnitudes = vec![0u32; width * height];

    let mut seg_iter = segments.iter();
    let empty: &[u8] = &[];
    let mut current: &CodeSegment = seg_iter.next().ok_or(CodecError::InvalidPacketHeader)?;
    let mut passes_left_in_seg = current.passes;
    let mut mq = MqDecoder::new(&current.data);
    let mut raw = RawDecoder::new(empty);
    let mut raw_active = false;

    for pass in 0..total_passes {
        if passes_left_in_seg == 0 {
            current = seg_iter.next().ok_or(CodecError::InvalidPacketHeader)?;
            passes_left_in_seg = current.passes;
            if pass_is_raw(style, pass) {
                raw = RawDecoder::new(&current.data);
                raw_active = true;
            } else {
                mq.restart(&current.data);
                raw_active = false;
            }
        }
        let is_raw = pass_is_raw(style, pass);
        if is_raw != raw_active {
            // Segment boundaries must line up with coder switches.
            return Err(CodecError::InvalidPacketHeader);
        }
        let plane = (num_bitplanes - 1 - pass_plane(pass)) as u32;
        match pass_kind(pass) {
            PassKind::SignificancePropagation => {
                decode_sig_prop(&mut block, &mut magnitudes, plane, &mut mq, &mut raw, is_raw)
            }
            PassKind::MagnitudeRefinement => {
                decode_mag_ref(&mut block, &mut magnitudes, plane, &mut mq, &mut raw, is_raw)
            }
            PassKind::Cleanup => {
                decode_cleanup(&mut block, &mut magnitudes, plane, &mut mq);
                if style & CBLK_STYLE_SEGMARK != 0 && !mq.check_segmark() {
                    log::warn!("segmentation mark mismatch in code-block decode");
                }
                block.clear_visited();
            }
        }
        passes_left_in_seg -= 1;
        if style & CBLK_STYLE_RESET != 0 {
            mq.reset_contexts();
        }
    }

    let mut coefficients = vec![0i32; width * height];
    for (i, &m) in magnitudes.iter().enumerate() {
        coefficients[i] = if block.state[i] & SIGN_NEG != 0 {
            -(m as i32)
        } else {
            m as i32
        };
    }
    Ok(coefficients)
}

fn decode_sig_prop(
    block: &mut BlockState,
    magnitudes: &mut [u32],
    plane: u32,
    mq: &mut MqDecoder,
    raw: &mut RawDecoder,
    is_raw: bool,
) {
    let (w, h) = (block.width, block.height);
    for y0 in (0..h).step_by(4) {
        for x in 0..w {
            for y in y0..(y0 + 4).min(h) {
                let i = y * w + x;
                if block.state[i] & (SIG | VISITED) != 0 {
                    continue;
                }
                let ctx = block.zc_context(x, y);
                if ctx == 0 {
                    continue;
                }
                let bit = if is_raw { raw.get() } else { mq.decode(ctx) };
                if bit == 1 {
                    let negative = if is_raw {
                        raw.get() == 1
                    } else {
                        let (sc, xor) = block.sc_context(x, y);
                        mq.decode(sc) ^ xor == 1
                    };
                    magnitudes[i] |= 1 << plane;
                    block.state[i] |= SIG;
                    if negative {
                        block.state[i] |= SIGN_NEG;
                    }
                }
                block.state[i] |= VISITED;
            }
        }
    }
}

fn decode_mag_ref(
    block: &mut BlockState,
    magnitudes: &mut [u32],
    plane: u32,
    mq: &mut MqDecoder,
    raw: &mut RawDecoder,
    is_raw: bool,
) {
    let (w, h) = (block.width, block.height);
    for y0 in (0..h).step_by(4) {
        for x in 0..w {
            for y in y0..(y0 + 4).min(h) {
                let i = y * w + x;
                if block.state[i] & SIG == 0 || block.state[i] & VISITED != 0 {
                    continue;
                }
                let bit = if is_raw {
                    raw.get()
                } else {
                    let ctx = block.mr_context(x, y);
                    mq.decode(ctx)
                };
                if bit == 1 {
                    magnitudes[i] |= 1 << plane;
                }
                block.state[i] |= REFINED | VISITED;
            }
        }
    }
}

fn decode_cleanup(block: &mut BlockState, magnitudes: &mut [u32], plane: u32, mq: &mut MqDecoder) {
    let (w, h) = (block.width, block.height);
    for y0 in (0..h).step_by(4) {
        for x in 0..w {
            let mut y = y0;
            let stripe_end = (y0 + 4).min(h);
            if block.run_candidate(x, y0) {
                if mq.decode(CTX_RUN) == 0 {
                    continue;
                }
                let run = ((mq.decode(CTX_UNIFORM) << 1) | mq.decode(CTX_UNIFORM)) as usize;
                y = y0 + run;
                let i = y * w + x;
                let (sc, xor) = block.sc_context(x, y);
                let negative = mq.decode(sc) ^ xor == 1;
                magnitudes[i] |= 1 << plane;
                block.state[i] |= SIG;
                if negative {
                    block.state[i] |= SIGN_NEG;
                }
                y += 1;
            }
            while y < stripe_end {
                let i = y * w + x;
                if block.state[i] & VISITED == 0 {
                    let ctx = block.zc_context(x, y);
                    if mq.decode(ctx) == 1 {
                        let (sc, xor) = block.sc_context(x, y);
                        let negative = mq.decode(sc) ^ xor == 1;
                        magnitudes[i] |= 1 << plane;
                        block.state[i] |= SIG;
                        if negative {
                            block.state[i] |= SIGN_NEG;
                        }
                    }
                }
                y += 1;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn roundtrip(coefficients: &[i32], width: usize, height: usize, orientation: usize, style: u8) {
        let encoded = encode_code_block(coefficients, width, height, orientation, style);
        let spans = segment_spans(style, encoded.num_passes);
        let mut segments = Vec::new();
        let mut start = 0usize;
        for &(first, count) in &spans {
            let end = encoded.pass_ends[first + count - 1];
            segments.push(CodeSegment {
                data: encoded.data[start..end].to_vec(),
                passes: count,
            });
            start = end;
        }
        let decoded = decode_code_block(
            &segments,
            width,
            height,
            orientation,
            encoded.num_bitplanes as usize,
            style,
        )
        .unwrap();
        assert_eq!(decoded, coefficients, "style {style:#x}");
    }

    fn test_pattern(width: usize, height: usize) -> Vec<i32> {
        let mut v = Vec::with_capacity(width * height);
        let mut state = 0x1234_5678u32;
        for _ in 0..width * height {
            state = state.wrapping_mul(1103515245).wrapping_add(12345);
            let mag = (state >> 20) as i32 % 512;
            v.push(if state & 0x8000 != 0 { -mag } else { mag });
        }
        v
    }

    #[test]
    fn empty_block_produces_no_passes() {
        let encoded = encode_code_block(&[0; 16], 4, 4, 0, 0);
        assert_eq!(encoded.num_passes, 0);
        assert!(encoded.data.is_empty());
    }

    #[test]
    fn pass_schedule() {
        assert_eq!(pass_kind(0), PassKind::Cleanup);
        assert_eq!(pass_kind(1), PassKind::SignificancePropagation);
        assert_eq!(pass_kind(2), PassKind::MagnitudeRefinement);
        assert_eq!(pass_kind(3), PassKind::Cleanup);
        assert_eq!(pass_plane(0), 0);
        assert_eq!(pass_plane(1), 1);
        assert_eq!(pass_plane(3), 1);
        assert_eq!(pass_plane(4), 2);
    }

    #[test]
    fn roundtrip_all_orientations_default_style() {
        let coefficients = test_pattern(16, 16);
        for orientation in 0..4 {
            roundtrip(&coefficients, 16, 16, orientation, 0);
        }
    }

    #[test]
    fn roundtrip_odd_sizes() {
        for (w, h) in [(1, 1), (3, 5), (7, 2), (5, 11), (64, 3)] {
            let coefficients = test_pattern(w, h);
            roundtrip(&coefficients, w, h, 0, 0);
        }
    }

    #[test]
    fn roundtrip_sparse_block() {
        let mut coefficients = vec![0i32; 64 * 64];
        coefficients[0] = 1000;
        coefficients[64 * 64 - 1] = -3;
        coefficients[32 * 64 + 17] = -77;
        roundtrip(&coefficients, 64, 64, 2, 0);
    }

    #[test]
    fn roundtrip_termall() {
        let coefficients = test_pattern(12, 12);
        roundtrip(&coefficients, 12, 12, 0, CBLK_STYLE_TERMALL);
    }

    #[test]
    fn roundtrip_bypass() {
        // Deep values force more than four bitplanes so raw passes engage.
        let coefficients: Vec<i32> = test_pattern(16, 16)
            .into_iter()
            .map(|c| c * 64)
            .collect();
        roundtrip(&coefficients, 16, 16, 1, CBLK_STYLE_BYPASS);
    }

    #[test]
    fn roundtrip_bypass_termall_reset() {
        let coefficients: Vec<i32> = test_pattern(8, 8).into_iter().map(|c| c * 128).collect();
        roundtrip(
            &coefficients,
            8,
            8,
            3,
            CBLK_STYLE_BYPASS | CBLK_STYLE_TERMALL | CBLK_STYLE_RESET,
        );
    }

    #[test]
    fn roundtrip_segmark_and_pterm() {
        let coefficients = test_pattern(10, 10);
        roundtrip(&coefficients, 10, 10, 0, CBLK_STYLE_SEGMARK);
        roundtrip(
            &coefficients,
            10,
            10,
            0,
            CBLK_STYLE_TERMALL | CBLK_STYLE_PTERM,
        );
    }

    #[test]
    fn truncated_passes_leave_low_planes_zero() {
        let coefficients = test_pattern(8, 8);
        let encoded = encode_code_block(&coefficients, 8, 8, 0, 0);
        // Only the first pass of data, as a single unterminated segment.
        let segments = [CodeSegment {
            data: encoded.data.clone(),
            passes: 1,
        }];
        let decoded =
            decode_code_block(&segments, 8, 8, 0, encoded.num_bitplanes as usize, 0).unwrap();
        let top = 1i32 << (encoded.num_bitplanes - 1);
        for (d, &c) in decoded.iter().zip(&coefficients) {
            // Each decoded coefficient is the top bit of the original or 0.
            assert!(d.abs() == 0 || d.abs() == top);
            if d.abs() == top {
                assert_eq!(d.signum(), c.signum());
            }
        }
    }
}
