//! JPEG 2000 decoder: codestream to component sample planes.

use super::bit_io::PacketBitReader;
use super::bit_plane_coder::{decode_code_block, pass_is_raw, CodeSegment, CBLK_STYLE_TERMALL, CBLK_STYLE_VSC};
use super::dwt::{reconstruct_53, reconstruct_97, Band, Decomposition};
use super::image::{
    band_step_index, codeblock_grid, resolution_bands, BandGeometry, Cod, MainHeader, Qcd,
    TilePart,
};
use super::mct::{ict_inverse, level_shift_inverse, rct_inverse};
use super::packet::{
    chunk_segment_passes, progression_sequence, read_pass_count, read_segment_lengths,
    PrecinctBandState,
};
use super::parser::J2kParser;
use super::quantization::{band_gain, dequantize};
use crate::error::CodecError;
use crate::jpeg2000::image::ComponentInfo;

/// A fully decoded codestream: final sample values per component.
pub struct DecodedImage {
    pub width: usize,
    pub height: usize,
    pub components: Vec<ComponentInfo>,
    pub planes: Vec<Vec<i32>>,
}

/// Decode state of one code-block.
#[derive(Default)]
struct BlockDecodeState {
    width: usize,
    height: usize,
    segments: Vec<CodeSegment>,
    /// Last segment still grows across packets.
    open: bool,
    passes_done: usize,
    /// Set at first inclusion: Mb minus the signalled zero bitplanes.
    num_bitplanes: Option<usize>,
}

struct BandDecodeState {
    geometry: BandGeometry,
    precinct: PrecinctBandState,
    blocks: Vec<BlockDecodeState>,
    coefficients: Vec<i32>,
}

pub struct J2kDecoder;

impl J2kDecoder {
    pub fn decode(source: &[u8]) -> Result<DecodedImage, CodecError> {
        let (header, tile_parts) = J2kParser::new(source).parse()?;
        decode_parsed(&header, &tile_parts)
    }
}

fn decode_parsed(header: &MainHeader, tile_parts: &[TilePart]) -> Result<DecodedImage, CodecError> {
    let siz = &header.siz;
    if siz.num_tiles() != 1 || siz.x_offset != 0 || siz.y_offset != 0 {
        return Err(CodecError::UnsupportedCodestream);
    }
    let cod = header.cod.as_ref().ok_or(CodecError::InvalidCodSegment)?;
    if cod.cblk_style & CBLK_STYLE_VSC != 0 {
        return Err(CodecError::UnsupportedCodestream);
    }
    let comps = siz.components.len();
    for c in 0..comps {
        // Per-component decomposition depth changes are out of scope.
        if header.cod_for(c)?.levels != cod.levels {
            return Err(CodecError::UnsupportedCodestream);
        }
    }
    if cod.mct && comps < 3 {
        return Err(CodecError::InvalidCodSegment);
    }
    let width = siz.width as usize;
    let height = siz.height as usize;
    let levels = cod.levels;
    let layers = cod.num_layers as usize;

    // Concatenate the tile's parts in order.
    let mut parts: Vec<&TilePart> = tile_parts.iter().collect();
    parts.sort_by_key(|p| p.part_index);
    let mut data = Vec::new();
    let mut packed_headers = header.packed_headers.clone();
    for part in parts {
        if part.tile_index != 0 {
            return Err(CodecError::UnsupportedCodestream);
        }
        data.extend_from_slice(&part.data);
        packed_headers.extend_from_slice(&part.packed_headers);
    }

    // Build per-component, per-resolution band states.
    let mut states: Vec<Vec<Vec<BandDecodeState>>> = Vec::with_capacity(comps);
    for c in 0..comps {
        let ccod = header.cod_for(c)?;
        let mut per_resolution = Vec::with_capacity(levels as usize + 1);
        for r in 0..=levels {
            let bands = resolution_bands(width, height, levels, r)
                .into_iter()
                .map(|geometry| {
                    let grid = codeblock_grid(&geometry, ccod.cblk_w_exp, ccod.cblk_h_exp);
                    let cblk_w = 1usize << ccod.cblk_w_exp;
                    let cblk_h = 1usize << ccod.cblk_h_exp;
                    let mut blocks = Vec::with_capacity(grid.0 * grid.1);
                    for gy in 0..grid.1 {
                        for gx in 0..grid.0 {
                            let x0 = gx * cblk_w;
                            let y0 = gy * cblk_h;
                            blocks.push(BlockDecodeState {
                                width: cblk_w.min(geometry.width - x0),
                                height: cblk_h.min(geometry.height - y0),
                                ..Default::default()
                            });
                        }
                    }
                    BandDecodeState {
                        geometry,
                        precinct: PrecinctBandState::new(grid.0.max(1), grid.1.max(1)),
                        blocks,
                        coefficients: vec![0i32; geometry.width * geometry.height],
                    }
                })
                .collect();
            per_resolution.push(bands);
        }
        states.push(per_resolution);
    }

    // Packet iteration order: COD progression, or the first POC change.
    let progression = header
        .poc
        .first()
        .map(|p| {
            log::debug!("using POC progression override");
            p.progression
        })
        .unwrap_or(cod.progression);

    read_packets(
        header,
        cod,
        &data,
        &packed_headers,
        &mut states,
        progression,
        layers,
        levels,
        comps,
    )?;

    // Tier-1 decode every block, then dequantize and inverse-transform.
    let mut planes: Vec<Vec<i32>> = Vec::with_capacity(comps);
    let mut planes_f: Vec<Vec<f32>> = Vec::with_capacity(comps);
    for (c, per_resolution) in states.iter_mut().enumerate() {
        let ccod = header.cod_for(c)?;
        for bands in per_resolution.iter_mut() {
            for band in bands.iter_mut() {
                decode_band_blocks(band, ccod)?;
            }
        }
        if cod.reversible {
            let decomposition = assemble_decomposition_i32(per_resolution, levels);
            planes.push(reconstruct_53(&decomposition).data);
        } else {
            let qcd = header.qcd_for(c)?;
            let precision = siz.components[c].precision;
            let decomposition =
                assemble_decomposition_f32(per_resolution, levels, qcd, precision)?;
            planes_f.push(reconstruct_97(&decomposition).data);
        }
    }

    if !cod.reversible {
        if cod.mct {
            ict_inverse(&mut planes_f);
        }
        for plane_f in &planes_f {
            planes.push(plane_f.iter().map(|&v| v.round() as i32).collect());
        }
    } else if cod.mct {
        rct_inverse(&mut planes);
    }

    for (c, plane) in planes.iter_mut().enumerate() {
        let info = siz.components[c];
        level_shift_inverse(plane, info.precision, info.signed);
        let (lo, hi) = if info.signed {
            (
                -(1i32 << (info.precision - 1)),
                (1i32 << (info.precision - 1)) - 1,
            )
        } else {
            (0, (1i32 << info.precision) - 1)
        };
        for sample in plane.iter_mut() {
            *sample = (*sample).clamp(lo, hi);
        }
    }

    Ok(DecodedImage {
        width,
        height,
        components: siz.components.clone(),
        planes,
    })
}

#[allow(clippy::too_many_arguments)]
fn read_packets(
    header: &MainHeader,
    cod: &Cod,
    data: &[u8],
    packed_headers: &[u8],
    states: &mut [Vec<Vec<BandDecodeState>>],
    progression: super::packet::ProgressionOrder,
    layers: usize,
    levels: u8,
    comps: usize,
) -> Result<(), CodecError> {
    let hoisted = !packed_headers.is_empty();
    let mut body_pos = 0usize;
    let mut header_pos = 0usize;

    for (l, r, c) in progression_sequence(progression, layers, levels as usize + 1, comps) {
        let style = header.cod_for(c)?.cblk_style;
        // Optional SOP before the packet (in the body stream).
        if cod.use_sop
            && data.len() >= body_pos + 6
            && data[body_pos] == 0xFF
            && data[body_pos + 1] == 0x91
        {
            body_pos += 6;
        }

        let header_bytes = if hoisted {
            &packed_headers[header_pos.min(packed_headers.len())..]
        } else {
            &data[body_pos.min(data.len())..]
        };
        let mut reader = PacketBitReader::new(header_bytes);

        // (band index, block index, spans, lengths)
        let mut pending: Vec<(usize, usize, Vec<usize>, Vec<usize>)> = Vec::new();
        if reader.get_bit()? == 1 {
            let bands = &mut states[c][r];
            for (bi, band) in bands.iter_mut().enumerate() {
                let grid_w = band.precinct.grid_width;
                for idx in 0..band.blocks.len() {
                    let (gx, gy) = (idx % grid_w, idx / grid_w);
                    let included_before = band.precinct.included[idx];
                    let passes;
                    if !included_before {
                        if band.precinct.inclusion.decode(&mut reader, gx, gy, l as i32 + 1)? {
                            let zbp =
                                band.precinct.zero_bitplanes.decode_value(&mut reader, gx, gy)?;
                            band.precinct.included[idx] = true;
                            let qcd = header.qcd_for(c)?;
                            let mb = band_mb(qcd, &band.geometry, levels)?;
                            let planes_left = mb
                                .checked_sub(zbp as usize)
                                .ok_or(CodecError::InvalidPacketHeader)?;
                            band.blocks[idx].num_bitplanes = Some(planes_left);
                            passes = read_pass_count(&mut reader)?;
                        } else {
                            continue;
                        }
                    } else {
                        if reader.get_bit()? == 0 {
                            continue;
                        }
                        passes = read_pass_count(&mut reader)?;
                    }
                    let block = &band.blocks[idx];
                    let spans = chunk_segment_passes(style, block.passes_done, passes);
                    let lengths =
                        read_segment_lengths(&mut reader, &mut band.precinct.lblock[idx], &spans)?;
                    pending.push((bi, idx, spans, lengths));
                }
            }
        }
        let consumed = reader.align();
        if hoisted {
            header_pos += consumed;
        } else {
            body_pos += consumed;
        }

        if cod.use_eph {
            let eph_src = if hoisted {
                (&packed_headers[..], &mut header_pos)
            } else {
                (&data[..], &mut body_pos)
            };
            let (buf, pos) = eph_src;
            if buf.len() >= *pos + 2 && buf[*pos] == 0xFF && buf[*pos + 1] == 0x92 {
                *pos += 2;
            }
        }

        // Packet body: chunk bytes in block order.
        let bands = &mut states[c][r];
        for (bi, idx, spans, lengths) in pending {
            let band = &mut bands[bi];
            let block = &mut band.blocks[idx];
            let mut first = block.passes_done;
            for (s, (&span, &len)) in spans.iter().zip(&lengths).enumerate() {
                if body_pos + len > data.len() {
                    return Err(CodecError::UnexpectedEndOfData);
                }
                let bytes = &data[body_pos..body_pos + len];
                body_pos += len;

                if block.open {
                    let segment = block.segments.last_mut().ok_or(CodecError::InvalidPacketHeader)?;
                    segment.data.extend_from_slice(bytes);
                    segment.passes += span;
                } else {
                    block.segments.push(CodeSegment {
                        data: bytes.to_vec(),
                        passes: span,
                    });
                }
                let last_pass = first + span - 1;
                let terminated = if s + 1 < spans.len() {
                    true
                } else {
                    style & CBLK_STYLE_TERMALL != 0
                        || pass_is_raw(style, last_pass) != pass_is_raw(style, last_pass + 1)
                };
                block.open = !terminated;
                first += span;
            }
            block.passes_done = first;
        }
    }
    Ok(())
}

fn band_mb(qcd: &Qcd, geometry: &BandGeometry, levels: u8) -> Result<usize, CodecError> {
    let step = qcd.band_step(band_step_index(levels, geometry), geometry.level, levels)?;
    Ok(step.magnitude_bitplanes(qcd.guard_bits) as usize)
}

fn decode_band_blocks(band: &mut BandDecodeState, cod: &Cod) -> Result<(), CodecError> {
    let grid_w = band.precinct.grid_width;
    let cblk_w = 1usize << cod.cblk_w_exp;
    let cblk_h = 1usize << cod.cblk_h_exp;
    for idx in 0..band.blocks.len() {
        let block = &band.blocks[idx];
        if block.segments.is_empty() {
            continue;
        }
        let num_bitplanes = block.num_bitplanes.unwrap_or(0);
        let coefficients = decode_code_block(
            &block.segments,
            block.width,
            block.height,
            band.geometry.orientation,
            num_bitplanes,
            cod.cblk_style,
        )?;
        let x0 = (idx % grid_w) * cblk_w;
        let y0 = (idx / grid_w) * cblk_h;
        for y in 0..block.height {
            let dst = (y0 + y) * band.geometry.width + x0;
            band.coefficients[dst..dst + block.width]
                .copy_from_slice(&coefficients[y * block.width..(y + 1) * block.width]);
        }
    }
    Ok(())
}

fn assemble_decomposition_i32(
    per_resolution: &[Vec<BandDecodeState>],
    levels: u8,
) -> Decomposition<i32> {
    let ll = &per_resolution[0][0];
    let mut details = Vec::with_capacity(levels as usize);
    for level in 1..=levels {
        let resolution = (levels - level + 1) as usize;
        let bands = &per_resolution[resolution];
        details.push([
            band_to_dwt_i32(&bands[0]),
            band_to_dwt_i32(&bands[1]),
            band_to_dwt_i32(&bands[2]),
        ]);
    }
    Decomposition {
        ll: band_to_dwt_i32(ll),
        details,
    }
}

fn band_to_dwt_i32(band: &BandDecodeState) -> Band<i32> {
    Band {
        width: band.geometry.width,
        height: band.geometry.height,
        data: band.coefficients.clone(),
    }
}

fn assemble_decomposition_f32(
    per_resolution: &[Vec<BandDecodeState>],
    levels: u8,
    qcd: &Qcd,
    precision: u8,
) -> Result<Decomposition<f32>, CodecError> {
    let dequantize_band = |band: &BandDecodeState| -> Result<Band<f32>, CodecError> {
        let step_size = qcd.band_step(
            band_step_index(levels, &band.geometry),
            band.geometry.level,
            levels,
        )?;
        let step = step_size.step(precision + band_gain(band.geometry.orientation));
        Ok(Band {
            width: band.geometry.width,
            height: band.geometry.height,
            data: band.coefficients.iter().map(|&q| dequantize(q, step)).collect(),
        })
    };
    let mut details = Vec::with_capacity(levels as usize);
    for level in 1..=levels {
        let resolution = (levels - level + 1) as usize;
        let bands = &per_resolution[resolution];
        details.push([
            dequantize_band(&bands[0])?,
            dequantize_band(&bands[1])?,
            dequantize_band(&bands[2])?,
        ]);
    }
    Ok(Decomposition {
        ll: dequantize_band(&per_resolution[0][0])?,
        details,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::jpeg2000::encoder::J2kEncoder;
    use crate::{FrameInfo, PhotometricInterpretation};

    fn frame(width: u32, height: u32, comps: u16, bits: u16, signed: bool) -> FrameInfo {
        FrameInfo {
            width,
            height,
            samples_per_pixel: comps,
            bits_allocated: if bits > 8 { 16 } else { 8 },
            bits_stored: bits,
            high_bit: bits - 1,
            pixel_representation: if signed { 1 } else { 0 },
            planar_configuration: 0,
            photometric_interpretation: if comps == 3 {
                PhotometricInterpretation::Rgb
            } else {
                PhotometricInterpretation::Monochrome2
            },
        }
    }

    fn encode(encoder: &J2kEncoder, pixels: &[u8], info: &FrameInfo) -> Vec<u8> {
        let mut dest = vec![0u8; pixels.len() * 8 + (1 << 16)];
        let len = encoder.encode(pixels, info, &mut dest).unwrap();
        dest.truncate(len);
        dest
    }

    #[test]
    fn lossless_roundtrip_ramp() {
        let info = frame(16, 16, 1, 8, false);
        let pixels: Vec<u8> = (0..=255).collect();
        let encoder = J2kEncoder {
            num_levels: 3,
            ..Default::default()
        };
        let stream = encode(&encoder, &pixels, &info);
        let image = J2kDecoder::decode(&stream).unwrap();
        let decoded: Vec<u8> = image.planes[0].iter().map(|&v| v as u8).collect();
        assert_eq!(decoded, pixels);
    }

    #[test]
    fn lossless_roundtrip_rgb_with_rct() {
        let info = frame(8, 8, 3, 8, false);
        let mut pixels = vec![0u8; 8 * 8 * 3];
        for (i, p) in pixels.iter_mut().enumerate() {
            *p = (i * 11 % 256) as u8;
        }
        let encoder = J2kEncoder {
            num_levels: 2,
            allow_mct: true,
            ..Default::default()
        };
        let stream = encode(&encoder, &pixels, &info);
        let image = J2kDecoder::decode(&stream).unwrap();
        let repacked = crate::pixel_data::pack_planes(&image.planes, &info).unwrap();
        assert_eq!(repacked, pixels);
    }

    #[test]
    fn lossless_roundtrip_multiple_layers() {
        let info = frame(32, 32, 1, 8, false);
        let pixels: Vec<u8> = (0..32 * 32).map(|i| (i % 251) as u8).collect();
        let encoder = J2kEncoder {
            num_levels: 2,
            num_layers: 3,
            ..Default::default()
        };
        let stream = encode(&encoder, &pixels, &info);
        let image = J2kDecoder::decode(&stream).unwrap();
        let decoded: Vec<u8> = image.planes[0].iter().map(|&v| v as u8).collect();
        assert_eq!(decoded, pixels);
    }

    #[test]
    fn lossy_roundtrip_high_quality_small_error() {
        let info = frame(64, 64, 1, 8, false);
        let mut pixels = vec![0u8; 64 * 64];
        for y in 0..64usize {
            for x in 0..64usize {
                pixels[y * 64 + x] = ((x + y * 2) % 256) as u8;
            }
        }
        let encoder = J2kEncoder {
            reversible: false,
            rate: 100,
            num_levels: 5,
            ..Default::default()
        };
        let stream = encode(&encoder, &pixels, &info);
        let image = J2kDecoder::decode(&stream).unwrap();
        for (i, &v) in image.planes[0].iter().enumerate() {
            let err = (v - pixels[i] as i32).abs();
            assert!(err <= 3, "pixel {i}: {v} vs {}", pixels[i]);
        }
    }

    #[test]
    fn signed_16bit_lossless_roundtrip() {
        let info = frame(8, 4, 1, 16, true);
        let values: [i16; 8] = [-2000, -1000, -10, 0, 10, 1000, 2000, 30000];
        let mut pixels = Vec::new();
        for i in 0..32 {
            pixels.extend_from_slice(&(values[i % 8] as u16).to_le_bytes());
        }
        let encoder = J2kEncoder {
            num_levels: 1,
            ..Default::default()
        };
        let stream = encode(&encoder, &pixels, &info);
        let image = J2kDecoder::decode(&stream).unwrap();
        let repacked = crate::pixel_data::pack_planes(&image.planes, &info).unwrap();
        assert_eq!(repacked, pixels);
    }

    #[test]
    fn error_resilience_styles_roundtrip_through_packets() {
        use crate::jpeg2000::bit_plane_coder::{
            CBLK_STYLE_BYPASS, CBLK_STYLE_PTERM, CBLK_STYLE_RESET, CBLK_STYLE_SEGMARK,
            CBLK_STYLE_TERMALL,
        };
        let info = frame(16, 16, 1, 16, false);
        let mut pixels = Vec::with_capacity(512);
        for i in 0..256u32 {
            pixels.extend_from_slice(&((i * 253 % 65536) as u16).to_le_bytes());
        }
        for style in [
            CBLK_STYLE_TERMALL,
            CBLK_STYLE_BYPASS,
            CBLK_STYLE_SEGMARK,
            CBLK_STYLE_TERMALL | CBLK_STYLE_PTERM,
            CBLK_STYLE_BYPASS | CBLK_STYLE_TERMALL | CBLK_STYLE_RESET,
        ] {
            let encoder = J2kEncoder {
                num_levels: 2,
                num_layers: 2,
                cblk_style: style,
                ..Default::default()
            };
            let stream = encode(&encoder, &pixels, &info);
            let image = J2kDecoder::decode(&stream).unwrap();
            let repacked = crate::pixel_data::pack_planes(&image.planes, &info).unwrap();
            assert_eq!(repacked, pixels, "style {style:#04x}");
        }
    }

    #[test]
    fn sop_eph_markers_roundtrip() {
        let info = frame(32, 32, 1, 8, false);
        let pixels: Vec<u8> = (0..32 * 32).map(|i| (i % 256) as u8).collect();
        let encoder = J2kEncoder {
            num_levels: 2,
            use_sop: true,
            use_eph: true,
            ..Default::default()
        };
        let stream = encode(&encoder, &pixels, &info);
        assert!(stream.windows(2).any(|w| w == [0xFF, 0x91]));
        assert!(stream.windows(2).any(|w| w == [0xFF, 0x92]));
        let image = J2kDecoder::decode(&stream).unwrap();
        let decoded: Vec<u8> = image.planes[0].iter().map(|&v| v as u8).collect();
        assert_eq!(decoded, pixels);
    }

    #[test]
    fn all_progression_orders_roundtrip() {
        use crate::jpeg2000::packet::ProgressionOrder;
        let info = frame(24, 24, 1, 8, false);
        let pixels: Vec<u8> = (0..24 * 24).map(|i| (i * 3 % 256) as u8).collect();
        for progression in [
            ProgressionOrder::Lrcp,
            ProgressionOrder::Rlcp,
            ProgressionOrder::Rpcl,
            ProgressionOrder::Pcrl,
            ProgressionOrder::Cprl,
        ] {
            let encoder = J2kEncoder {
                num_levels: 2,
                num_layers: 3,
                progression,
                ..Default::default()
            };
            let stream = encode(&encoder, &pixels, &info);
            let image = J2kDecoder::decode(&stream).unwrap();
            let decoded: Vec<u8> = image.planes[0].iter().map(|&v| v as u8).collect();
            assert_eq!(decoded, pixels, "{progression:?}");
        }
    }

    #[test]
    fn truncated_codestream_is_an_error() {
        let info = frame(16, 16, 1, 8, false);
        let pixels: Vec<u8> = (0..=255).collect();
        let stream = encode(&J2kEncoder::default(), &pixels, &info);
        assert!(J2kDecoder::decode(&stream[..stream.len() / 3]).is_err());
    }
}
