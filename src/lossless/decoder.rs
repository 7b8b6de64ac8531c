//! JPEG Lossless (process 14) decoder.

use crate::error::CodecError;
use crate::huffman::{extend_magnitude, HuffmanTable, JpegBitReader};
use crate::jpeg_marker_code::JpegMarkerCode;
use crate::jpeg_stream_reader::JpegStreamReader;
use crate::lossless::predictor::predict_at;

/// A decoded lossless frame: component planes of stored-bit patterns.
pub struct DecodedFrame {
    pub width: usize,
    pub height: usize,
    pub precision: u8,
    pub planes: Vec<Vec<i32>>,
}

#[derive(Clone, Copy, Default)]
struct FrameComponent {
    id: u8,
    dc_table: usize,
}

pub struct LosslessDecoder<'a> {
    reader: JpegStreamReader<'a>,
    width: usize,
    height: usize,
    precision: u8,
    components: Vec<FrameComponent>,
    dc_tables: [Option<HuffmanTable>; 4],
    restart_interval: u16,
    frame_seen: bool,
}

impl<'a> LosslessDecoder<'a> {
    pub fn new(source: &'a [u8]) -> Self {
        Self {
            reader: JpegStreamReader::new(source),
            width: 0,
            height: 0,
            precision: 0,
            components: Vec::new(),
            dc_tables: [const { None }; 4],
            restart_interval: 0,
            frame_seen: false,
        }
    }

    pub fn decode(mut self) -> Result<DecodedFrame, CodecError> {
        if self.reader.read_marker() != Ok(JpegMarkerCode::StartOfImage) {
            return Err(CodecError::StartOfImageMarkerNotFound);
        }

        let mut planes: Vec<Vec<i32>> = Vec::new();
        loop {
            let marker = self.reader.read_known_marker()?;
            match marker {
                JpegMarkerCode::StartOfFrameLossless => {
                    self.read_sof3()?;
                    planes = vec![vec![0i32; self.width * self.height]; self.components.len()];
                }
                JpegMarkerCode::StartOfFrameBaseline
                | JpegMarkerCode::StartOfFrameExtended
                | JpegMarkerCode::StartOfFrameProgressive => {
                    return Err(CodecError::UnsupportedFrameType);
                }
                JpegMarkerCode::DefineHuffmanTable => self.read_dht()?,
                JpegMarkerCode::DefineRestartInterval => {
                    let payload = self.reader.read_segment_length()?;
                    if payload != 2 {
                        return Err(CodecError::InvalidMarkerSegmentSize);
                    }
                    self.restart_interval = self.reader.read_u16()?;
                }
                JpegMarkerCode::StartOfScan => {
                    if !self.frame_seen {
                        return Err(CodecError::MissingStartOfFrameMarker);
                    }
                    self.decode_scan(&mut planes)?;
                }
                JpegMarkerCode::EndOfImage => break,
                JpegMarkerCode::Comment
                | JpegMarkerCode::DefineNumberOfLines
                | JpegMarkerCode::ApplicationData0
                | JpegMarkerCode::ApplicationData1
                | JpegMarkerCode::ApplicationData2
                | JpegMarkerCode::ApplicationData3
                | JpegMarkerCode::ApplicationData4
                | JpegMarkerCode::ApplicationData5
                | JpegMarkerCode::ApplicationData6
                | JpegMarkerCode::ApplicationData7
                | JpegMarkerCode::ApplicationData8
                | JpegMarkerCode::ApplicationData9
                | JpegMarkerCode::ApplicationData10
                | JpegMarkerCode::ApplicationData11
                | JpegMarkerCode::ApplicationData12
                | JpegMarkerCode::ApplicationData13
                | JpegMarkerCode::ApplicationData14
                | JpegMarkerCode::ApplicationData15 => self.reader.skip_segment()?,
                _ => return Err(CodecError::UnknownStandaloneMarker),
            }
        }

        if !self.frame_seen {
            return Err(CodecError::MissingStartOfFrameMarker);
        }
        Ok(DecodedFrame {
            width: self.width,
            height: self.height,
            precision: self.precision,
            planes,
        })
    }

    fn read_sof3(&mut self) -> Result<(), CodecError> {
        if self.frame_seen {
            return Err(CodecError::DuplicateStartOfFrameMarker);
        }
        let payload = self.reader.read_segment_length()?;
        self.precision = self.reader.read_u8()?;
        self.height = self.reader.read_u16()? as usize;
        self.width = self.reader.read_u16()? as usize;
        let comps = self.reader.read_u8()? as usize;
        if payload != 6 + comps * 3 {
            return Err(CodecError::InvalidMarkerSegmentSize);
        }
        if !(2..=16).contains(&self.precision) {
            return Err(CodecError::InvalidParameterBitsPerSample);
        }
        if self.width == 0 || self.height == 0 {
            return Err(CodecError::InvalidParameterWidth);
        }
        if comps == 0 || comps > 4 {
            return Err(CodecError::InvalidParameterComponentCount);
        }
        for _ in 0..comps {
            let id = self.reader.read_u8()?;
            let sampling = self.reader.read_u8()?;
            let _tq = self.reader.read_u8()?;
            if sampling != 0x11 {
                // Lossless frames in DICOM are always 1x1.
                return Err(CodecError::UnsupportedFrameType);
            }
            if self.components.iter().any(|c| c.id == id) {
                return Err(CodecError::ComponentCountMismatch);
            }
            self.components.push(FrameComponent { id, dc_table: 0 });
        }
        self.frame_seen = true;
        log::debug!(
            "SOF3 {}x{} P={} components={}",
            self.width,
            self.height,
            self.precision,
            comps
        );
        Ok(())
    }

    fn read_dht(&mut self) -> Result<(), CodecError> {
        let mut payload = self.reader.read_segment_length()?;
        while payload > 0 {
            if payload < 17 {
                return Err(CodecError::InvalidHuffmanTable);
            }
            let tc_th = self.reader.read_u8()?;
            let class = tc_th >> 4;
            let id = (tc_th & 0x0F) as usize;
            if class > 1 || id > 3 {
                return Err(CodecError::InvalidHuffmanTable);
            }
            let mut lengths = [0u8; 16];
            for len in lengths.iter_mut() {
                *len = self.reader.read_u8()?;
            }
            let count: usize = lengths.iter().map(|&n| n as usize).sum();
            if payload < 17 + count {
                return Err(CodecError::InvalidHuffmanTable);
            }
            let values = self.reader.read_bytes(count)?;
            if class == 0 {
                // Lossless only uses DC-class tables; residual categories
                // beyond 16 have no meaning here.
                if values.iter().any(|&v| v > 16) {
                    return Err(CodecError::ResidualCategoryOutOfRange);
                }
                self.dc_tables[id] = Some(HuffmanTable::build(&lengths, values)?);
            }
            payload -= 17 + count;
        }
        Ok(())
    }

    fn decode_scan(&mut self, planes: &mut [Vec<i32>]) -> Result<(), CodecError> {
        let payload = self.reader.read_segment_length()?;
        let ns = self.reader.read_u8()? as usize;
        if payload != 4 + ns * 2 || ns == 0 {
            return Err(CodecError::InvalidMarkerSegmentSize);
        }
        // Map scan components back to frame component indices.
        let mut scan_comps: Vec<usize> = Vec::with_capacity(ns);
        for _ in 0..ns {
            let cs = self.reader.read_u8()?;
            let tables = self.reader.read_u8()?;
            let idx = self
                .components
                .iter()
                .position(|c| c.id == cs)
                .ok_or(CodecError::ComponentCountMismatch)?;
            self.components[idx].dc_table = (tables >> 4) as usize;
            scan_comps.push(idx);
        }
        let predictor = self.reader.read_u8()?;
        let _se = self.reader.read_u8()?;
        let ah_al = self.reader.read_u8()?;
        if predictor == 0 || predictor > 7 {
            return Err(CodecError::InvalidPredictorSelection);
        }
        if ah_al & 0x0F != 0 {
            // Point transform is out of scope for DICOM lossless.
            return Err(CodecError::UnsupportedFrameType);
        }

        let width = self.width;
        let precision = self.precision;
        let modulo = 1i32 << precision;
        let mut bits = JpegBitReader::new(self.reader.remaining_data());

        let mut mcus_done: usize = 0;
        let mut restart_index: u8 = 0;
        // Samples decoded immediately after a restart predict from the
        // bit-depth midpoint, as at the start of the scan.
        let mut restart_at: Option<usize> = None;
        let total_mcus = width * self.height;

        for y in 0..self.height {
            for x in 0..width {
                if self.restart_interval > 0
                    && mcus_done > 0
                    && mcus_done % self.restart_interval as usize == 0
                    && mcus_done < total_mcus
                {
                    bits.align_to_byte();
                    self.expect_restart(&mut bits, restart_index)?;
                    restart_index = (restart_index + 1) % 8;
                    restart_at = Some(mcus_done);
                }
                for &c in &scan_comps {
                    let table = self.dc_tables[self.components[c].dc_table]
                        .as_ref()
                        .ok_or(CodecError::InvalidHuffmanTable)?;
                    let category = table.decode(&mut bits)?;
                    if category > 16 {
                        return Err(CodecError::ResidualCategoryOutOfRange);
                    }
                    let diff = if category == 16 {
                        32768
                    } else {
                        let extra = bits.read_bits(category)?;
                        extend_magnitude(extra, category)
                    };
                    let predicted = if restart_at == Some(mcus_done) {
                        1 << (precision - 1)
                    } else {
                        predict_at(&planes[c], width, x, y, precision, predictor)
                    };
                    planes[c][y * width + x] = (predicted + diff) & (modulo - 1);
                }
                mcus_done += 1;
            }
        }

        let consumed = bits.bytes_consumed();
        self.reader.advance(consumed)?;
        Ok(())
    }

    fn expect_restart(&self, bits: &mut JpegBitReader, index: u8) -> Result<(), CodecError> {
        let hi = bits.read_raw_byte()?;
        let lo = bits.read_raw_byte()?;
        if hi != 0xFF || lo != 0xD0 + index {
            return Err(CodecError::RestartMarkerNotFound);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lossless::encoder::LosslessEncoder;
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

    fn roundtrip(pixels: &[u8], info: &FrameInfo, predictor: u8) {
        let encoder = LosslessEncoder::new(predictor, false);
        let mut dest = vec![0u8; pixels.len() * 6 + 4096];
        let len = encoder.encode(pixels, info, &mut dest).unwrap();
        let decoded = LosslessDecoder::new(&dest[..len]).decode().unwrap();
        assert_eq!(decoded.width, info.width as usize);
        assert_eq!(decoded.height, info.height as usize);
        let packed = crate::pixel_data::pack_planes_raw(&decoded.planes, info).unwrap();
        assert_eq!(packed, pixels, "predictor {predictor} roundtrip");
    }

    #[test]
    fn all_selection_values_roundtrip_8bit() {
        let info = frame(16, 16, 1, 8, false);
        let mut pixels = vec![0u8; 256];
        for (i, p) in pixels.iter_mut().enumerate() {
            *p = (i * 7 % 251) as u8;
        }
        for predictor in 1..=7 {
            roundtrip(&pixels, &info, predictor);
        }
    }

    #[test]
    fn rgb_roundtrip_predictor4() {
        let info = frame(32, 32, 3, 8, false);
        let mut pixels = vec![0u8; 32 * 32 * 3];
        for y in 0..32usize {
            for x in 0..32usize {
                let i = (y * 32 + x) * 3;
                pixels[i] = (x * 8) as u8;
                pixels[i + 1] = (y * 8) as u8;
                pixels[i + 2] = ((x + y) * 4) as u8;
            }
        }
        roundtrip(&pixels, &info, 4);
    }

    #[test]
    fn full_range_16bit_roundtrip() {
        let info = frame(16, 16, 1, 16, false);
        let mut pixels = Vec::with_capacity(512);
        for i in 0..256u32 {
            let v = (i * 257) as u16; // spans 0..=65535
            pixels.extend_from_slice(&v.to_le_bytes());
        }
        roundtrip(&pixels, &info, 1);
    }

    #[test]
    fn signed_16bit_roundtrip() {
        let info = frame(8, 4, 1, 16, true);
        let values: [i16; 8] = [-2000, -1000, -10, 0, 10, 1000, 2000, 30000];
        let mut pixels = Vec::with_capacity(64);
        for row in 0..4 {
            for col in 0..8 {
                let v = values[(row + col) % 8];
                pixels.extend_from_slice(&(v as u16).to_le_bytes());
            }
        }
        roundtrip(&pixels, &info, 1);
    }

    #[test]
    fn truncated_stream_is_an_error() {
        let info = frame(16, 16, 1, 8, false);
        let pixels: Vec<u8> = (0..256).map(|i| (i % 256) as u8).collect();
        let encoder = LosslessEncoder::new(1, false);
        let mut dest = vec![0u8; 4096];
        let len = encoder.encode(&pixels, &info, &mut dest).unwrap();
        let result = LosslessDecoder::new(&dest[..len / 2]).decode();
        assert!(result.is_err());
    }

    #[test]
    fn predictor_zero_in_scan_is_rejected() {
        // Hand-build a minimal stream whose SOS carries Ss = 0.
        let info = frame(2, 2, 1, 8, false);
        let encoder = LosslessEncoder::new(1, false);
        let mut dest = vec![0u8; 512];
        let len = encoder.encode(&[1, 2, 3, 4], &info, &mut dest).unwrap();
        // Locate the SOS segment and patch Ss (payload: Ns, 2 bytes per
        // component, then Ss).
        let sos = dest[..len]
            .windows(2)
            .position(|w| w == [0xFF, 0xDA])
            .unwrap();
        dest[sos + 2 + 2 + 1 + 2] = 0;
        let result = LosslessDecoder::new(&dest[..len]).decode();
        assert_eq!(result.err(), Some(CodecError::InvalidPredictorSelection));
    }
}
