//! JPEG Lossless (process 14) encoder.

use crate::error::CodecError;
use crate::huffman::{category_of, magnitude_bits, JpegBitWriter};
use crate::jpeg_stream_writer::JpegStreamWriter;
use crate::lossless::predictor::{auto_select, predict_at};
use crate::lossless::tables::{build, select_dc_table, DcTableSpec};
use crate::pixel_data::unpack_planes_raw;
use crate::FrameInfo;

/// Encoder for a single lossless frame.
///
/// `predictor` must be a concrete selection value (1-7) or 0 for
/// auto-selection by minimum squared prediction error; the transfer-syntax
/// facade resolves the SV1 forcing policy before constructing this.
pub struct LosslessEncoder {
    pub predictor: u8,
    /// Use the SV1 Huffman table family (affects the escalation threshold).
    pub sv1_tables: bool,
}

impl LosslessEncoder {
    pub fn new(predictor: u8, sv1_tables: bool) -> Self {
        Self {
            predictor,
            sv1_tables,
        }
    }

    pub fn encode(
        &self,
        source: &[u8],
        frame_info: &FrameInfo,
        destination: &mut [u8],
    ) -> Result<usize, CodecError> {
        frame_info.validate()?;
        if self.predictor > 7 {
            return Err(CodecError::InvalidParameterPredictor);
        }
        let width = frame_info.width as usize;
        let height = frame_info.height as usize;
        let comps = frame_info.samples_per_pixel as usize;
        let precision = frame_info.bits_stored as u8;

        let planes = unpack_planes_raw(source, frame_info)?;
        let predictor = if self.predictor == 0 {
            auto_select(&planes, width, height, precision)
        } else {
            self.predictor
        };
        log::debug!(
            "lossless encode {}x{}x{} P={} predictor={}",
            width,
            height,
            comps,
            precision,
            predictor
        );

        // Residuals per component, wrapped into the signed P-bit range.
        let modulo = 1i32 << precision;
        let half = 1i32 << (precision - 1);
        let mut residuals = vec![vec![0i32; width * height]; comps];
        for (c, plane) in planes.iter().enumerate() {
            for y in 0..height {
                for x in 0..width {
                    let predicted = predict_at(plane, width, x, y, precision, predictor);
                    let mut diff = (plane[y * width + x] - predicted) & (modulo - 1);
                    if diff >= half {
                        diff -= modulo;
                    }
                    residuals[c][y * width + x] = diff;
                }
            }
        }

        // Pre-scan the maximum category per table group; component 0 gets
        // table 0, any further components share table 1.
        let max_cat = |group: &[usize]| -> u8 {
            group
                .iter()
                .flat_map(|&c| residuals[c].iter())
                .map(|&d| category_of(d))
                .max()
                .unwrap_or(0)
        };
        let luma_spec = select_dc_table(max_cat(&[0]), self.sv1_tables, false);
        let chroma_spec: Option<DcTableSpec> = if comps > 1 {
            let group: Vec<usize> = (1..comps).collect();
            Some(select_dc_table(max_cat(&group), self.sv1_tables, true))
        } else {
            None
        };
        let luma_table = build(luma_spec);
        let chroma_table = chroma_spec.map(build);

        let mut writer = JpegStreamWriter::new(destination);
        writer.write_start_of_image()?;
        writer.write_sof3_segment(frame_info)?;
        writer.write_dht(0, 0, luma_spec.lengths, luma_spec.values)?;
        if let Some(spec) = chroma_spec {
            writer.write_dht(0, 1, spec.lengths, spec.values)?;
        }
        let component_ids: Vec<(u8, u8)> = (0..comps)
            .map(|c| ((c + 1) as u8, if c == 0 { 0 } else { 1 }))
            .collect();
        writer.write_sos_lossless_segment(&component_ids, predictor)?;

        // Entropy-coded scan: one interleaved scan, MCU = one sample per
        // component in raster order.
        let mut bit_writer = JpegBitWriter::new(writer.remaining_slice());
        for y in 0..height {
            for x in 0..width {
                for c in 0..comps {
                    let diff = residuals[c][y * width + x];
                    let table = if c == 0 {
                        &luma_table
                    } else {
                        chroma_table.as_ref().unwrap_or(&luma_table)
                    };
                    let category = category_of(diff);
                    if category > 16 {
                        return Err(CodecError::ResidualCategoryOutOfRange);
                    }
                    bit_writer.write_code(table.code(category))?;
                    // Category 16 (diff of exactly -2^15 mod 2^16) carries no
                    // magnitude bits per T.81.
                    if category > 0 && category < 16 {
                        bit_writer.write_bits(magnitude_bits(diff, category), category)?;
                    }
                }
            }
        }
        bit_writer.flush()?;
        let scan_len = bit_writer.len();
        writer.advance(scan_len);

        writer.write_end_of_image()?;
        Ok(writer.len())
    }
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
    fn emits_soi_sof3_dht_sos_eoi() {
        let info = gray8(4, 4);
        let pixels: Vec<u8> = (0..16).collect();
        let mut dest = vec![0u8; 1024];
        let encoder = LosslessEncoder::new(1, false);
        let len = encoder.encode(&pixels, &info, &mut dest).unwrap();
        let out = &dest[..len];
        assert_eq!(&out[..2], &[0xFF, 0xD8]);
        assert_eq!(&out[2..4], &[0xFF, 0xC3]);
        assert!(out.windows(2).any(|w| w == [0xFF, 0xC4]));
        assert!(out.windows(2).any(|w| w == [0xFF, 0xDA]));
        assert_eq!(&out[len - 2..], &[0xFF, 0xD9]);
    }

    #[test]
    fn gradient_compresses() {
        let info = gray8(64, 64);
        let mut pixels = vec![0u8; 64 * 64];
        for y in 0..64usize {
            for x in 0..64usize {
                pixels[y * 64 + x] = ((x + y * 2) % 256) as u8;
            }
        }
        let mut dest = vec![0u8; 64 * 64 * 4];
        let encoder = LosslessEncoder::new(4, false);
        let len = encoder.encode(&pixels, &info, &mut dest).unwrap();
        // A smooth gradient under predictor 4 should compress well.
        assert!(len * 3 < pixels.len());
    }
}
