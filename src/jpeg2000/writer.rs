//! JPEG 2000 codestream marker writer (ISO/IEC 15444-1 Annex A).

use super::image::{Cod, Part2Mct, Qcd, Siz};
use crate::error::CodecError;
use crate::jpeg_marker_code::JpegMarkerCode;
use crate::jpeg_stream_writer::JpegStreamWriter;

pub struct J2kWriter<'a, 'b> {
    writer: &'a mut JpegStreamWriter<'b>,
}

impl<'a, 'b> J2kWriter<'a, 'b> {
    pub fn new(writer: &'a mut JpegStreamWriter<'b>) -> Self {
        Self { writer }
    }

    pub fn len(&self) -> usize {
        self.writer.len()
    }

    pub fn write_soc(&mut self) -> Result<(), CodecError> {
        self.writer.write_marker(JpegMarkerCode::StartOfCodestream)
    }

    pub fn write_eoc(&mut self) -> Result<(), CodecError> {
        self.writer.write_marker(JpegMarkerCode::EndOfImage)
    }

    pub fn write_siz(&mut self, siz: &Siz) -> Result<(), CodecError> {
        self.writer.write_marker(JpegMarkerCode::ImageAndTileSize)?;
        let length = 38 + 3 * siz.components.len();
        self.writer.write_u16(length as u16)?;
        self.writer.write_u16(0)?; // Rsiz: no restrictions
        self.writer.write_u32(siz.width)?;
        self.writer.write_u32(siz.height)?;
        self.writer.write_u32(siz.x_offset)?;
        self.writer.write_u32(siz.y_offset)?;
        self.writer.write_u32(siz.tile_width)?;
        self.writer.write_u32(siz.tile_height)?;
        self.writer.write_u32(siz.tile_x_offset)?;
        self.writer.write_u32(siz.tile_y_offset)?;
        self.writer.write_u16(siz.components.len() as u16)?;
        for component in &siz.components {
            let ssiz = (component.precision - 1) | if component.signed { 0x80 } else { 0 };
            self.writer.write_byte(ssiz)?;
            self.writer.write_byte(component.dx)?;
            self.writer.write_byte(component.dy)?;
        }
        Ok(())
    }

    pub fn write_cod(&mut self, cod: &Cod) -> Result<(), CodecError> {
        self.writer.write_marker(JpegMarkerCode::CodingStyleDefault)?;
        let precincts = if cod.precincts.is_empty() {
            0
        } else {
            cod.precincts.len()
        };
        self.writer.write_u16((12 + precincts) as u16)?;
        let mut scod = 0u8;
        if !cod.precincts.is_empty() {
            scod |= 0x01;
        }
        if cod.use_sop {
            scod |= 0x02;
        }
        if cod.use_eph {
            scod |= 0x04;
        }
        self.writer.write_byte(scod)?;
        // SGcod
        self.writer.write_byte(cod.progression as u8)?;
        self.writer.write_u16(cod.num_layers)?;
        self.writer.write_byte(cod.mct as u8)?;
        // SPcod
        self.writer.write_byte(cod.levels)?;
        self.writer.write_byte(cod.cblk_w_exp - 2)?;
        self.writer.write_byte(cod.cblk_h_exp - 2)?;
        self.writer.write_byte(cod.cblk_style)?;
        self.writer.write_byte(if cod.reversible { 1 } else { 0 })?;
        for &(ppx, ppy) in &cod.precincts {
            self.writer.write_byte((ppy << 4) | (ppx & 0x0F))?;
        }
        Ok(())
    }

    pub fn write_qcd(&mut self, qcd: &Qcd) -> Result<(), CodecError> {
        self.writer.write_marker(JpegMarkerCode::QuantizationDefault)?;
        let entry_size = if qcd.style == 0 { 1 } else { 2 };
        let length = 3 + entry_size * qcd.steps.len();
        self.writer.write_u16(length as u16)?;
        self.writer.write_byte(qcd.style | (qcd.guard_bits << 5))?;
        for step in &qcd.steps {
            if qcd.style == 0 {
                self.writer.write_byte(step.exponent << 3)?;
            } else {
                self.writer
                    .write_u16(((step.exponent as u16) << 11) | step.mantissa)?;
            }
        }
        Ok(())
    }

    pub fn write_com(&mut self, text: &[u8]) -> Result<(), CodecError> {
        self.writer.write_marker(JpegMarkerCode::J2kComment)?;
        self.writer.write_u16((4 + text.len()) as u16)?;
        self.writer.write_u16(1)?; // Rcom: Latin values
        self.writer.write_bytes(text)
    }

    /// Part-2 multi-component segments pass through unchanged.
    pub fn write_part2_mct(&mut self, segment: &Part2Mct) -> Result<(), CodecError> {
        self.writer.write_byte(0xFF)?;
        self.writer.write_byte(segment.marker)?;
        self.writer.write_u16((2 + segment.payload.len()) as u16)?;
        self.writer.write_bytes(&segment.payload)
    }

    /// Write SOT with a zero Psot; returns the byte offset of the Psot field
    /// for back-patching once the tile-part length is known.
    pub fn write_sot(
        &mut self,
        tile_index: u16,
        part_index: u8,
        num_parts: u8,
    ) -> Result<usize, CodecError> {
        self.writer.write_marker(JpegMarkerCode::StartOfTile)?;
        self.writer.write_u16(10)?;
        self.writer.write_u16(tile_index)?;
        let psot_offset = self.writer.len();
        self.writer.write_u32(0)?;
        self.writer.write_byte(part_index)?;
        self.writer.write_byte(num_parts)?;
        Ok(psot_offset)
    }

    pub fn patch_psot(&mut self, psot_offset: usize, value: u32) -> Result<(), CodecError> {
        self.writer.overwrite_u32(psot_offset, value)
    }

    pub fn write_sod(&mut self) -> Result<(), CodecError> {
        self.writer.write_marker(JpegMarkerCode::StartOfData)
    }

    pub fn write_sop(&mut self, sequence: u16) -> Result<(), CodecError> {
        self.writer.write_marker(JpegMarkerCode::StartOfPacket)?;
        self.writer.write_u16(4)?;
        self.writer.write_u16(sequence)
    }

    pub fn write_eph(&mut self) -> Result<(), CodecError> {
        self.writer.write_marker(JpegMarkerCode::EndOfPacketHeader)
    }

    pub fn write_bytes(&mut self, data: &[u8]) -> Result<(), CodecError> {
        self.writer.write_bytes(data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::jpeg2000::image::ComponentInfo;
    use crate::jpeg2000::quantization::StepSize;

    #[test]
    fn header_sequence_layout() {
        let mut buffer = vec![0u8; 512];
        let mut stream = JpegStreamWriter::new(&mut buffer);
        let mut writer = J2kWriter::new(&mut stream);

        writer.write_soc().unwrap();
        let siz = Siz {
            width: 256,
            height: 256,
            tile_width: 256,
            tile_height: 256,
            components: vec![ComponentInfo {
                precision: 8,
                signed: false,
                dx: 1,
                dy: 1,
            }],
            ..Default::default()
        };
        writer.write_siz(&siz).unwrap();
        writer.write_cod(&Cod::default()).unwrap();
        let qcd = Qcd {
            style: 0,
            guard_bits: 2,
            steps: vec![StepSize {
                exponent: 8,
                mantissa: 0,
            }],
        };
        writer.write_qcd(&qcd).unwrap();
        let psot = writer.write_sot(0, 0, 1).unwrap();
        writer.write_sod().unwrap();
        writer.write_bytes(&[0xAA, 0xBB]).unwrap();
        let tile_len = writer.len() - (psot - 6);
        writer.patch_psot(psot, tile_len as u32).unwrap();
        writer.write_eoc().unwrap();
        let len = stream.len();
        let out = &buffer[..len];

        assert_eq!(&out[..2], &[0xFF, 0x4F]);
        assert_eq!(&out[2..4], &[0xFF, 0x51]);
        assert!(out.windows(2).any(|w| w == [0xFF, 0x52]));
        assert!(out.windows(2).any(|w| w == [0xFF, 0x5C]));
        assert!(out.windows(2).any(|w| w == [0xFF, 0x90]));
        assert!(out.windows(2).any(|w| w == [0xFF, 0x93]));
        assert_eq!(&out[len - 2..], &[0xFF, 0xD9]);
    }
}
