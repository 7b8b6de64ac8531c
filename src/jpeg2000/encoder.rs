//! JPEG 2000 encoder: tile pipeline and packet assembly.
//!
//! Single tile anchored at the origin. Level shift, optional component
//! transform, N-level DWT, subband quantization, Tier-1 per code-block,
//! then layer assignment and Tier-2 packet emission in the configured
//! progression order.

use super::bit_plane_coder::{encode_code_block, EncodedCodeBlock};
use super::dwt::{decompose_53, decompose_97, Band, Decomposition};
use super::image::{
    band_step_index, codeblock_grid, resolution_bands, BandGeometry, Cod, ComponentInfo, Part2Mct,
    Qcd, Siz,
};
use super::mct::{ict_forward, level_shift_forward, rct_forward};
use super::packet::{
    chunk_segment_passes, progression_sequence, write_pass_count, write_segment_lengths,
    PrecinctBandState, ProgressionOrder,
};
use super::quantization::{band_gain, dwt97_norm, quantize, StepSize, GUARD_BITS};
use super::writer::J2kWriter;
use crate::error::CodecError;
use crate::jpeg2000::bit_io::PacketBitWriter;
use crate::jpeg_stream_writer::JpegStreamWriter;
use crate::pixel_data::unpack_planes;
use crate::FrameInfo;

const COMMENT: &[u8] = b"jpegmed-rs";

pub struct J2kEncoder {
    pub reversible: bool,
    /// Quality 1-100 for the irreversible path; maps to the base
    /// quantization step.
    pub rate: u8,
    pub num_levels: u8,
    pub num_layers: u16,
    pub allow_mct: bool,
    /// Desired compression ratio; 0 disables the mapping. Best effort via
    /// quality, never an iterative re-encode.
    pub target_ratio: f32,
    pub quant_step_scale: f32,
    /// Explicit per-subband steps (3 * levels + 1 entries) overriding the
    /// derived ones.
    pub subband_steps: Vec<f32>,
    /// Per-layer weights for pass distribution; empty means equal split.
    pub rate_levels: Vec<u32>,
    pub progression: ProgressionOrder,
    pub cblk_style: u8,
    pub use_sop: bool,
    pub use_eph: bool,
    /// Part-2 multi-component segments emitted verbatim after QCD.
    pub part2_segments: Vec<Part2Mct>,
}

impl Default for J2kEncoder {
    fn default() -> Self {
        Self {
            reversible: true,
            rate: 20,
            num_levels: 5,
            num_layers: 1,
            allow_mct: false,
            target_ratio: 0.0,
            quant_step_scale: 1.0,
            subband_steps: Vec::new(),
            rate_levels: Vec::new(),
            progression: ProgressionOrder::Lrcp,
            cblk_style: 0,
            use_sop: false,
            use_eph: false,
            part2_segments: Vec::new(),
        }
    }
}

/// One code-block scheduled for emission.
struct BlockPlan {
    encoded: EncodedCodeBlock,
    zero_bitplanes: usize,
    first_layer: usize,
    layer_passes: Vec<usize>,
}

/// One subband of one component with its blocks.
struct BandPlan {
    grid: (usize, usize),
    blocks: Vec<BlockPlan>,
}

impl J2kEncoder {
    pub fn encode(
        &self,
        source: &[u8],
        frame_info: &FrameInfo,
        destination: &mut [u8],
    ) -> Result<usize, CodecError> {
        frame_info.validate()?;
        let comps = frame_info.samples_per_pixel as usize;
        if comps != 1 && comps != 3 {
            return Err(CodecError::InvalidParameterComponentCount);
        }
        if self.num_levels > 6 {
            return Err(CodecError::InvalidParameterLevels);
        }
        if self.num_layers == 0 {
            return Err(CodecError::InvalidParameterLayers);
        }
        if !self.subband_steps.is_empty()
            && self.subband_steps.len() != 3 * self.num_levels as usize + 1
        {
            return Err(CodecError::InvalidParameterQuantization);
        }
        let width = frame_info.width as usize;
        let height = frame_info.height as usize;
        let precision = frame_info.bits_stored as u8;
        let signed = frame_info.pixel_representation == 1;
        let levels = self.num_levels;
        let layers = self.num_layers as usize;
        let mct = self.allow_mct && comps == 3;

        let rate = self.effective_rate();
        log::debug!(
            "j2k encode {}x{}x{} P={} levels={} layers={} reversible={} rate={}",
            width,
            height,
            comps,
            precision,
            levels,
            layers,
            self.reversible,
            rate
        );

        let mut planes = unpack_planes(source, frame_info)?;
        for plane in &mut planes {
            level_shift_forward(plane, precision, signed);
        }

        // Transform and quantize into per-band integer coefficients.
        let mut component_bands: Vec<Vec<(BandGeometry, Vec<i32>)>> = Vec::with_capacity(comps);
        if self.reversible {
            if mct {
                rct_forward(&mut planes);
            }
            for plane in &planes {
                let decomposition = decompose_53(plane, width, height, levels as usize);
                component_bands.push(collect_bands_53(&decomposition, width, height, levels));
            }
        } else {
            let mut planes_f: Vec<Vec<f32>> = planes
                .iter()
                .map(|p| p.iter().map(|&s| s as f32).collect())
                .collect();
            if mct {
                ict_forward(&mut planes_f);
            }
            let steps = self.band_steps(precision, levels);
            for plane in &planes_f {
                let decomposition = decompose_97(plane, width, height, levels as usize);
                component_bands.push(collect_bands_97(&decomposition, width, height, levels, &steps));
            }
        }

        // Guard bits must leave room for every band's actual bitplanes.
        let quant_steps = self.quant_marker_steps(precision, levels);
        let mut guard_bits = GUARD_BITS;
        for bands in &component_bands {
            for (geometry, coefficients) in bands {
                let max_mag = coefficients.iter().map(|c| c.unsigned_abs()).max().unwrap_or(0);
                if max_mag == 0 {
                    continue;
                }
                let needed = (32 - max_mag.leading_zeros()) as u8;
                let eps = quant_steps[band_step_index(levels, geometry)].exponent;
                guard_bits = guard_bits.max(needed + 1 - eps.min(needed));
            }
        }
        if guard_bits > 7 {
            return Err(CodecError::InvalidParameterQuantization);
        }

        // Tier-1 over every code-block, then split passes into layers.
        let cod = self.cod(mct);
        let mut plans: Vec<Vec<Vec<BandPlan>>> = Vec::with_capacity(comps);
        for bands in &component_bands {
            let mut per_resolution: Vec<Vec<BandPlan>> =
                (0..=levels as usize).map(|_| Vec::new()).collect();
            for (geometry, coefficients) in bands {
                let resolution = if geometry.orientation == 0 {
                    0
                } else {
                    (levels - geometry.level + 1) as usize
                };
                let step = quant_steps[band_step_index(levels, geometry)];
                let mb = step.magnitude_bitplanes(guard_bits) as usize;
                let plan = self.plan_band(geometry, coefficients, &cod, mb, layers)?;
                per_resolution[resolution].push(plan);
            }
            plans.push(per_resolution);
        }

        // Markers.
        let mut stream = JpegStreamWriter::new(destination);
        let mut writer = J2kWriter::new(&mut stream);
        writer.write_soc()?;
        writer.write_siz(&Siz {
            width: width as u32,
            height: height as u32,
            x_offset: 0,
            y_offset: 0,
            tile_width: width as u32,
            tile_height: height as u32,
            tile_x_offset: 0,
            tile_y_offset: 0,
            components: (0..comps)
                .map(|_| ComponentInfo {
                    precision,
                    signed,
                    dx: 1,
                    dy: 1,
                })
                .collect(),
        })?;
        writer.write_cod(&cod)?;
        writer.write_qcd(&Qcd {
            style: if self.reversible { 0 } else { 2 },
            guard_bits,
            steps: quant_steps.clone(),
        })?;
        for segment in &self.part2_segments {
            writer.write_part2_mct(segment)?;
        }
        writer.write_com(COMMENT)?;

        let sot_start = writer.len();
        let psot_offset = writer.write_sot(0, 0, 1)?;
        writer.write_sod()?;

        // Packets.
        let mut states: Vec<Vec<Vec<PrecinctBandState>>> = plans
            .iter()
            .map(|per_res| {
                per_res
                    .iter()
                    .map(|bands| {
                        bands
                            .iter()
                            .map(|band| {
                                let mut state =
                                    PrecinctBandState::new(band.grid.0.max(1), band.grid.1.max(1));
                                for (i, block) in band.blocks.iter().enumerate() {
                                    let (gx, gy) = (i % band.grid.0, i / band.grid.0);
                                    state
                                        .inclusion
                                        .set_value(gx, gy, block.first_layer as i32);
                                    state
                                        .zero_bitplanes
                                        .set_value(gx, gy, block.zero_bitplanes as i32);
                                }
                                state.inclusion.finalize();
                                state.zero_bitplanes.finalize();
                                state
                            })
                            .collect()
                    })
                    .collect()
            })
            .collect();

        let mut packet_index: u16 = 0;
        for (l, r, c) in progression_sequence(self.progression, layers, levels as usize + 1, comps)
        {
            let bands = &plans[c][r];
            let band_states = &mut states[c][r];
            if self.use_sop {
                writer.write_sop(packet_index)?;
            }
            packet_index = packet_index.wrapping_add(1);

            let mut header = PacketBitWriter::new();
            let mut body: Vec<(usize, usize, usize, usize)> = Vec::new(); // band, block, start, end
            let nonempty = bands
                .iter()
                .any(|band| band.blocks.iter().any(|b| b.layer_passes[l] > 0));
            if !nonempty {
                header.put_bit(0);
            } else {
                header.put_bit(1);
                for (bi, band) in bands.iter().enumerate() {
                    let state = &mut band_states[bi];
                    for (idx, block) in band.blocks.iter().enumerate() {
                        let (gx, gy) = (idx % band.grid.0, idx / band.grid.0);
                        let passes = block.layer_passes[l];
                        if !state.included[idx] {
                            state.inclusion.encode(&mut header, gx, gy, l as i32 + 1);
                            if block.first_layer == l {
                                state.zero_bitplanes.encode(
                                    &mut header,
                                    gx,
                                    gy,
                                    block.zero_bitplanes as i32 + 1,
                                );
                                state.included[idx] = true;
                            }
                        } else {
                            header.put_bit((passes > 0) as u8);
                        }
                        if passes == 0 {
                            continue;
                        }
                        write_pass_count(&mut header, passes);
                        let first_pass: usize = block.layer_passes[..l].iter().sum();
                        let spans = chunk_segment_passes(cod.cblk_style, first_pass, passes);
                        let mut pairs = Vec::with_capacity(spans.len());
                        let mut p = first_pass;
                        let chunk_start = pass_end(&block.encoded, first_pass);
                        for &span in &spans {
                            let start = pass_end(&block.encoded, p);
                            let end = pass_end(&block.encoded, p + span);
                            pairs.push((span, end - start));
                            p += span;
                        }
                        let chunk_end = pass_end(&block.encoded, p);
                        write_segment_lengths(&mut header, &mut state.lblock[idx], &pairs);
                        body.push((bi, idx, chunk_start, chunk_end));
                    }
                }
            }
            writer.write_bytes(&header.finish())?;
            if self.use_eph {
                writer.write_eph()?;
            }
            for (bi, idx, start, end) in body {
                writer.write_bytes(&bands[bi].blocks[idx].encoded.data[start..end])?;
            }
        }

        let tile_len = writer.len() - sot_start;
        writer.patch_psot(psot_offset, tile_len as u32)?;
        writer.write_eoc()?;
        Ok(stream.len())
    }

    /// Map `target_ratio` to quality: q = 100 - 15 * log2(ratio).
    fn effective_rate(&self) -> u8 {
        if self.target_ratio > 0.0 {
            let q = 100.0 - 15.0 * self.target_ratio.log2();
            q.clamp(1.0, 100.0) as u8
        } else {
            self.rate.clamp(1, 100)
        }
    }

    fn cod(&self, mct: bool) -> Cod {
        Cod {
            use_sop: self.use_sop,
            use_eph: self.use_eph,
            progression: self.progression,
            num_layers: self.num_layers,
            mct,
            levels: self.num_levels,
            cblk_w_exp: 6,
            cblk_h_exp: 6,
            cblk_style: self.cblk_style,
            reversible: self.reversible,
            precincts: Vec::new(),
        }
    }

    /// Marker step sizes for every subband, LL_N first.
    fn quant_marker_steps(&self, precision: u8, levels: u8) -> Vec<StepSize> {
        let count = 3 * levels as usize + 1;
        let mut steps = Vec::with_capacity(count);
        for index in 0..count {
            let (orientation, level) = if index == 0 {
                (0, levels.max(1))
            } else {
                let resolution = (index - 1) / 3 + 1;
                (((index - 1) % 3) + 1, levels - resolution as u8 + 1)
            };
            let range_bits = precision + band_gain(orientation);
            if self.reversible {
                steps.push(StepSize {
                    exponent: range_bits,
                    mantissa: 0,
                });
            } else {
                let step = self.real_step(precision, levels, orientation, level, index);
                steps.push(StepSize::from_step(step, range_bits));
            }
        }
        steps
    }

    /// Real (pre-marker) step for one subband of the irreversible path.
    fn real_step(
        &self,
        _precision: u8,
        _levels: u8,
        orientation: usize,
        level: u8,
        index: usize,
    ) -> f32 {
        if !self.subband_steps.is_empty() {
            return self.subband_steps[index].max(1.0e-6);
        }
        let rate = self.effective_rate();
        // Base step 0.25 at quality 100, doubling every 12 quality points
        // down; divided by the subband synthesis norm for uniform
        // distortion.
        let base = ((100 - rate as i32) as f32 / 12.0).exp2() * 0.25;
        let scale = if self.quant_step_scale > 0.0 {
            self.quant_step_scale
        } else {
            1.0
        };
        base * scale / dwt97_norm(orientation, level as usize)
    }

    /// Per-band real steps in band_step_index order (irreversible path),
    /// reconstructed from the marker representation so the decoder divides
    /// by exactly the same values.
    fn band_steps(&self, precision: u8, levels: u8) -> Vec<f32> {
        self.quant_marker_steps(precision, levels)
            .iter()
            .enumerate()
            .map(|(index, ss)| {
                let orientation = if index == 0 { 0 } else { (index - 1) % 3 + 1 };
                ss.step(precision + band_gain(orientation))
            })
            .collect()
    }

    fn plan_band(
        &self,
        geometry: &BandGeometry,
        coefficients: &[i32],
        cod: &Cod,
        mb: usize,
        layers: usize,
    ) -> Result<BandPlan, CodecError> {
        let grid = codeblock_grid(geometry, cod.cblk_w_exp, cod.cblk_h_exp);
        let cblk_w = 1usize << cod.cblk_w_exp;
        let cblk_h = 1usize << cod.cblk_h_exp;
        let mut blocks = Vec::with_capacity(grid.0 * grid.1);
        for gy in 0..grid.1 {
            for gx in 0..grid.0 {
                let x0 = gx * cblk_w;
                let y0 = gy * cblk_h;
                let w = cblk_w.min(geometry.width - x0);
                let h = cblk_h.min(geometry.height - y0);
                let mut block_coeffs = vec![0i32; w * h];
                for y in 0..h {
                    let src = (y0 + y) * geometry.width + x0;
                    block_coeffs[y * w..(y + 1) * w]
                        .copy_from_slice(&coefficients[src..src + w]);
                }
                let encoded =
                    encode_code_block(&block_coeffs, w, h, geometry.orientation, cod.cblk_style);
                if encoded.num_bitplanes as usize > mb {
                    return Err(CodecError::InvalidParameterQuantization);
                }
                let zero_bitplanes = mb - encoded.num_bitplanes as usize;
                let layer_passes = distribute_passes(encoded.num_passes, layers, &self.rate_levels);
                let first_layer = layer_passes
                    .iter()
                    .position(|&p| p > 0)
                    .unwrap_or(layers);
                blocks.push(BlockPlan {
                    encoded,
                    zero_bitplanes,
                    first_layer,
                    layer_passes,
                });
            }
        }
        Ok(BandPlan { grid, blocks })
    }
}

fn pass_end(encoded: &EncodedCodeBlock, passes: usize) -> usize {
    if passes == 0 {
        0
    } else {
        encoded.pass_ends[passes - 1]
    }
}

/// Spread `total` coding passes over `layers`, earlier layers first; with
/// weights, each layer receives its proportional share.
fn distribute_passes(total: usize, layers: usize, weights: &[u32]) -> Vec<usize> {
    let mut counts = vec![0usize; layers];
    if total == 0 {
        return counts;
    }
    if weights.len() == layers && weights.iter().any(|&w| w > 0) {
        let sum: u64 = weights.iter().map(|&w| w as u64).sum();
        let mut acc = 0u64;
        let mut previous = 0usize;
        for (l, &w) in weights.iter().enumerate() {
            acc += w as u64;
            let target = ((total as u64 * acc) / sum) as usize;
            counts[l] = target - previous;
            previous = target;
        }
        counts[layers - 1] += total - previous;
    } else {
        let base = total / layers;
        let extra = total % layers;
        for (l, count) in counts.iter_mut().enumerate() {
            *count = base + (l < extra) as usize;
        }
    }
    counts
}

fn collect_bands_53(
    decomposition: &Decomposition<i32>,
    width: usize,
    height: usize,
    levels: u8,
) -> Vec<(BandGeometry, Vec<i32>)> {
    let mut bands = Vec::new();
    let ll_geometry = resolution_bands(width, height, levels, 0)[0];
    debug_assert_eq!(
        (ll_geometry.width, ll_geometry.height),
        (decomposition.ll.width, decomposition.ll.height)
    );
    bands.push((ll_geometry, decomposition.ll.data.clone()));
    for resolution in 1..=levels {
        let geometries = resolution_bands(width, height, levels, resolution);
        let level = levels - resolution + 1;
        for (i, geometry) in geometries.iter().enumerate() {
            let band = &decomposition.details[level as usize - 1][i];
            debug_assert_eq!((geometry.width, geometry.height), (band.width, band.height));
            bands.push((*geometry, band.data.clone()));
        }
    }
    bands
}

fn collect_bands_97(
    decomposition: &Decomposition<f32>,
    width: usize,
    height: usize,
    levels: u8,
    steps: &[f32],
) -> Vec<(BandGeometry, Vec<i32>)> {
    let quantize_band = |band: &Band<f32>, geometry: &BandGeometry| -> Vec<i32> {
        let step = steps[band_step_index(levels, geometry)];
        band.data.iter().map(|&c| quantize(c, step)).collect()
    };
    let mut bands = Vec::new();
    let ll_geometry = resolution_bands(width, height, levels, 0)[0];
    bands.push((
        ll_geometry,
        quantize_band(&decomposition.ll, &ll_geometry),
    ));
    for resolution in 1..=levels {
        let geometries = resolution_bands(width, height, levels, resolution);
        let level = levels - resolution + 1;
        for (i, geometry) in geometries.iter().enumerate() {
            let band = &decomposition.details[level as usize - 1][i];
            bands.push((*geometry, quantize_band(band, geometry)));
        }
    }
    bands
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::PhotometricInterpretation;

    fn gray8(width: u32, height: u32) -> FrameInfo {
        FrameInfo {
            width,
            height,
            samples_per_pixel: 1,
            bits_allocated: 8,
            bits_stored: 8,
            high_bit: 7,
            pixel_representation: 0,
            planar_configuration: 0,
            photometric_interpretation: PhotometricInterpretation::Monochrome2,
        }
    }

    #[test]
    fn distribute_passes_even_and_weighted() {
        assert_eq!(distribute_passes(7, 1, &[]), vec![7]);
        assert_eq!(distribute_passes(7, 3, &[]), vec![3, 2, 2]);
        assert_eq!(distribute_passes(0, 2, &[]), vec![0, 0]);
        let weighted = distribute_passes(10, 2, &[1, 4]);
        assert_eq!(weighted.iter().sum::<usize>(), 10);
        assert!(weighted[1] > weighted[0]);
    }

    #[test]
    fn encode_produces_wellformed_codestream() {
        let info = gray8(16, 16);
        let pixels: Vec<u8> = (0..=255).collect();
        let encoder = J2kEncoder {
            num_levels: 3,
            ..Default::default()
        };
        let mut dest = vec![0u8; 1 << 16];
        let len = encoder.encode(&pixels, &info, &mut dest).unwrap();
        let out = &dest[..len];
        assert_eq!(&out[..2], &[0xFF, 0x4F]);
        assert_eq!(&out[2..4], &[0xFF, 0x51]);
        assert_eq!(&out[len - 2..], &[0xFF, 0xD9]);
        // Lossless on a smooth ramp should compress.
        assert!(len < pixels.len() * 2);
    }

    #[test]
    fn rate_mapping_is_monotonic() {
        let mut encoder = J2kEncoder {
            reversible: false,
            ..Default::default()
        };
        encoder.rate = 20;
        let coarse = encoder.real_step(8, 5, 0, 5, 0);
        encoder.rate = 80;
        let fine = encoder.real_step(8, 5, 0, 5, 0);
        assert!(coarse > fine);
    }

    #[test]
    fn target_ratio_maps_to_quality() {
        let encoder = J2kEncoder {
            reversible: false,
            target_ratio: 4.0,
            ..Default::default()
        };
        assert_eq!(encoder.effective_rate(), 70);
    }
}
