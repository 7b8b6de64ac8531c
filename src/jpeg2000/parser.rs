//! JPEG 2000 codestream parser: main header and tile-part structure.

use super::image::{
    Cod, ComponentInfo, MainHeader, Part2Mct, PocChange, Qcd, Siz, TilePart,
};
use super::packet::ProgressionOrder;
use super::quantization::StepSize;
use crate::error::CodecError;
use crate::jpeg_marker_code::JpegMarkerCode;
use crate::jpeg_stream_reader::JpegStreamReader;

pub struct J2kParser<'a> {
    reader: JpegStreamReader<'a>,
    header: MainHeader,
}

impl<'a> J2kParser<'a> {
    pub fn new(source: &'a [u8]) -> Self {
        Self {
            reader: JpegStreamReader::new(source),
            header: MainHeader::default(),
        }
    }

    /// Parse the complete codestream: main header plus every tile-part up
    /// to EOC.
    pub fn parse(mut self) -> Result<(MainHeader, Vec<TilePart>), CodecError> {
        self.parse_main_header()?;
        let mut tile_parts = Vec::new();
        loop {
            // The main-header loop stops having consumed an SOT marker.
            let (tile_part, next) = self.parse_tile_part()?;
            tile_parts.push(tile_part);
            match next {
                JpegMarkerCode::StartOfTile => continue,
                JpegMarkerCode::EndOfImage => break,
                _ => return Err(CodecError::InvalidTilePartHeader),
            }
        }
        Ok((self.header, tile_parts))
    }

    fn parse_main_header(&mut self) -> Result<(), CodecError> {
        if self.reader.read_marker() != Ok(JpegMarkerCode::StartOfCodestream) {
            return Err(CodecError::StartOfCodestreamNotFound);
        }
        loop {
            let marker = self.reader.read_known_marker()?;
            match marker {
                JpegMarkerCode::ImageAndTileSize => self.parse_siz()?,
                JpegMarkerCode::CodingStyleDefault => {
                    let cod = self.parse_cod()?;
                    self.header.cod = Some(cod);
                }
                JpegMarkerCode::CodingStyleComponent => {
                    let (component, cod) = self.parse_coc()?;
                    self.header.coc.push((component, cod));
                }
                JpegMarkerCode::QuantizationDefault => {
                    let qcd = self.parse_qcd()?;
                    self.header.qcd = Some(qcd);
                }
                JpegMarkerCode::QuantizationComponent => {
                    let (component, qcd) = self.parse_qcc()?;
                    self.header.qcc.push((component, qcd));
                }
                JpegMarkerCode::ProgressionOrderChange => self.parse_poc()?,
                JpegMarkerCode::PackedPacketHeadersMain => {
                    let payload = self.reader.read_segment_length()?;
                    if payload < 1 {
                        return Err(CodecError::InvalidMarkerSegmentSize);
                    }
                    let _zppm = self.reader.read_u8()?;
                    let bytes = self.reader.read_bytes(payload - 1)?;
                    self.header.packed_headers.extend_from_slice(bytes);
                }
                JpegMarkerCode::J2kComment => {
                    let payload = self.reader.read_segment_length()?;
                    if payload < 2 {
                        return Err(CodecError::InvalidMarkerSegmentSize);
                    }
                    let _rcom = self.reader.read_u16()?;
                    let text = self.reader.read_bytes(payload - 2)?;
                    self.header.comments.push(text.to_vec());
                }
                JpegMarkerCode::MultipleComponentTransform
                | JpegMarkerCode::MultipleComponentCollection
                | JpegMarkerCode::MultipleComponentOrdering => {
                    let payload = self.reader.read_segment_length()?;
                    let bytes = self.reader.read_bytes(payload)?;
                    self.header.mct_segments.push(Part2Mct {
                        marker: marker as u8,
                        payload: bytes.to_vec(),
                    });
                }
                JpegMarkerCode::Capability
                | JpegMarkerCode::RegionOfInterest
                | JpegMarkerCode::TilePartLengths
                | JpegMarkerCode::PacketLengthMain
                | JpegMarkerCode::ComponentRegistration => self.reader.skip_segment()?,
                JpegMarkerCode::StartOfTile => {
                    if self.header.siz.components.is_empty() {
                        return Err(CodecError::InvalidSizSegment);
                    }
                    if self.header.cod.is_none() || self.header.qcd.is_none() {
                        return Err(CodecError::InvalidCodSegment);
                    }
                    return Ok(());
                }
                JpegMarkerCode::EndOfImage => return Err(CodecError::InvalidTilePartHeader),
                other if other.is_standalone() => {
                    return Err(CodecError::UnknownStandaloneMarker)
                }
                _ => self.reader.skip_segment()?,
            }
        }
    }

    fn parse_siz(&mut self) -> Result<(), CodecError> {
        let payload = self.reader.read_segment_length()?;
        let _rsiz = self.reader.read_u16()?;
        let mut siz = Siz {
            width: self.reader.read_u32()?,
            height: self.reader.read_u32()?,
            x_offset: self.reader.read_u32()?,
            y_offset: self.reader.read_u32()?,
            tile_width: self.reader.read_u32()?,
            tile_height: self.reader.read_u32()?,
            tile_x_offset: self.reader.read_u32()?,
            tile_y_offset: self.reader.read_u32()?,
            components: Vec::new(),
        };
        let comps = self.reader.read_u16()? as usize;
        if payload != 36 + comps * 3 {
            return Err(CodecError::InvalidSizSegment);
        }
        if siz.width == 0
            || siz.height == 0
            || siz.tile_width == 0
            || siz.tile_height == 0
            || comps == 0
            || comps > 4
        {
            return Err(CodecError::InvalidSizSegment);
        }
        for _ in 0..comps {
            let ssiz = self.reader.read_u8()?;
            let precision = (ssiz & 0x7F) + 1;
            if !(2..=16).contains(&precision) {
                return Err(CodecError::InvalidSizSegment);
            }
            siz.components.push(ComponentInfo {
                precision,
                signed: ssiz & 0x80 != 0,
                dx: self.reader.read_u8()?,
                dy: self.reader.read_u8()?,
            });
        }
        log::debug!(
            "SIZ {}x{} components={} tiles={}x{}",
            siz.width,
            siz.height,
            comps,
            siz.tile_width,
            siz.tile_height
        );
        self.header.siz = siz;
        Ok(())
    }

    fn parse_cod_body(&mut self, payload: usize) -> Result<Cod, CodecError> {
        if payload < 10 {
            return Err(CodecError::InvalidCodSegment);
        }
        let scod = self.reader.read_u8()?;
        let progression = ProgressionOrder::from_u8(self.reader.read_u8()?)?;
        let num_layers = self.reader.read_u16()?;
        if num_layers == 0 {
            return Err(CodecError::InvalidCodSegment);
        }
        let mct = self.reader.read_u8()? != 0;
        let levels = self.reader.read_u8()?;
        if levels > 32 {
            return Err(CodecError::InvalidCodSegment);
        }
        let cblk_w_exp = self.reader.read_u8()? + 2;
        let cblk_h_exp = self.reader.read_u8()? + 2;
        if !(2..=10).contains(&cblk_w_exp)
            || !(2..=10).contains(&cblk_h_exp)
            || cblk_w_exp + cblk_h_exp > 12
        {
            return Err(CodecError::InvalidParameterCodeBlockSize);
        }
        let cblk_style = self.reader.read_u8()?;
        let reversible = match self.reader.read_u8()? {
            0 => false,
            1 => true,
            _ => return Err(CodecError::InvalidCodSegment),
        };
        let mut precincts = Vec::new();
        if scod & 0x01 != 0 {
            let count = levels as usize + 1;
            if payload < 10 + count {
                return Err(CodecError::InvalidCodSegment);
            }
            for _ in 0..count {
                let pp = self.reader.read_u8()?;
                precincts.push((pp & 0x0F, pp >> 4));
            }
        }
        Ok(Cod {
            use_sop: scod & 0x02 != 0,
            use_eph: scod & 0x04 != 0,
            progression,
            num_layers,
            mct,
            levels,
            cblk_w_exp,
            cblk_h_exp,
            cblk_style,
            reversible,
            precincts,
        })
    }

    fn parse_cod(&mut self) -> Result<Cod, CodecError> {
        let payload = self.reader.read_segment_length()?;
        self.parse_cod_body(payload)
    }

    fn parse_coc(&mut self) -> Result<(u16, Cod), CodecError> {
        let payload = self.reader.read_segment_length()?;
        let wide = self.header.siz.components.len() > 256;
        let component = if wide {
            self.reader.read_u16()?
        } else {
            self.reader.read_u8()? as u16
        };
        // COC carries Scoc + SPcoc only: synthesize the SGcod fields from
        // the default COD.
        let base = self
            .header
            .cod
            .clone()
            .ok_or(CodecError::InvalidCodSegment)?;
        let scoc = self.reader.read_u8()?;
        let levels = self.reader.read_u8()?;
        let cblk_w_exp = self.reader.read_u8()? + 2;
        let cblk_h_exp = self.reader.read_u8()? + 2;
        let cblk_style = self.reader.read_u8()?;
        let reversible = self.reader.read_u8()? == 1;
        let mut precincts = Vec::new();
        if scoc & 0x01 != 0 {
            let count = levels as usize + 1;
            let fixed = if wide { 7 } else { 6 };
            if payload < fixed + count {
                return Err(CodecError::InvalidCodSegment);
            }
            for _ in 0..count {
                let pp = self.reader.read_u8()?;
                precincts.push((pp & 0x0F, pp >> 4));
            }
        }
        Ok((
            component,
            Cod {
                levels,
                cblk_w_exp,
                cblk_h_exp,
                cblk_style,
                reversible,
                precincts,
                ..base
            },
        ))
    }

    fn parse_qcd_body(&mut self, payload: usize) -> Result<Qcd, CodecError> {
        if payload < 1 {
            return Err(CodecError::InvalidQcdSegment);
        }
        let sqcd = self.reader.read_u8()?;
        let style = sqcd & 0x1F;
        let guard_bits = sqcd >> 5;
        let remaining = payload - 1;
        let mut steps = Vec::new();
        match style {
            0 => {
                for _ in 0..remaining {
                    let e = self.reader.read_u8()?;
                    steps.push(StepSize {
                        exponent: e >> 3,
                        mantissa: 0,
                    });
                }
            }
            1 | 2 => {
                if remaining % 2 != 0 || (style == 1 && remaining != 2) {
                    return Err(CodecError::InvalidQcdSegment);
                }
                for _ in 0..remaining / 2 {
                    let v = self.reader.read_u16()?;
                    steps.push(StepSize {
                        exponent: (v >> 11) as u8,
                        mantissa: v & 0x7FF,
                    });
                }
            }
            _ => return Err(CodecError::InvalidQcdSegment),
        }
        if steps.is_empty() {
            return Err(CodecError::InvalidQcdSegment);
        }
        Ok(Qcd {
            style,
            guard_bits,
            steps,
        })
    }

    fn parse_qcd(&mut self) -> Result<Qcd, CodecError> {
        let payload = self.reader.read_segment_length()?;
        self.parse_qcd_body(payload)
    }

    fn parse_qcc(&mut self) -> Result<(u16, Qcd), CodecError> {
        let payload = self.reader.read_segment_length()?;
        let wide = self.header.siz.components.len() > 256;
        let component = if wide {
            self.reader.read_u16()?
        } else {
            self.reader.read_u8()? as u16
        };
        let fixed = if wide { 2 } else { 1 };
        let qcd = self.parse_qcd_body(payload - fixed)?;
        Ok((component, qcd))
    }

    fn parse_poc(&mut self) -> Result<(), CodecError> {
        let payload = self.reader.read_segment_length()?;
        let wide = self.header.siz.components.len() > 256;
        let entry = if wide { 9 } else { 7 };
        if payload % entry != 0 {
            return Err(CodecError::InvalidMarkerSegmentSize);
        }
        for _ in 0..payload / entry {
            let res_start = self.reader.read_u8()?;
            let comp_start = if wide {
                self.reader.read_u16()?
            } else {
                self.reader.read_u8()? as u16
            };
            let layer_end = self.reader.read_u16()?;
            let res_end = self.reader.read_u8()?;
            let comp_end = if wide {
                self.reader.read_u16()?
            } else {
                self.reader.read_u8()? as u16
            };
            let progression = ProgressionOrder::from_u8(self.reader.read_u8()?)?;
            self.header.poc.push(PocChange {
                res_start,
                comp_start,
                layer_end,
                res_end,
                comp_end,
                progression,
            });
        }
        Ok(())
    }

    /// Parse one tile-part; the SOT marker itself has been consumed.
    /// Returns the tile-part and the marker that follows it.
    fn parse_tile_part(&mut self) -> Result<(TilePart, JpegMarkerCode), CodecError> {
        let sot_start = self.reader.position() - 2;
        let lsot = self.reader.read_u16()?;
        if lsot != 10 {
            return Err(CodecError::InvalidTilePartHeader);
        }
        let tile_index = self.reader.read_u16()?;
        let psot = self.reader.read_u32()? as usize;
        let part_index = self.reader.read_u8()?;
        let num_parts = self.reader.read_u8()?;

        let mut packed_headers = Vec::new();
        loop {
            let marker = self.reader.read_known_marker()?;
            match marker {
                JpegMarkerCode::StartOfData => break,
                JpegMarkerCode::CodingStyleDefault => {
                    // Tile-part override; with one tile this is equivalent
                    // to replacing the default.
                    let cod = self.parse_cod()?;
                    log::debug!("tile-part COD override");
                    self.header.cod = Some(cod);
                }
                JpegMarkerCode::QuantizationDefault => {
                    let qcd = self.parse_qcd()?;
                    self.header.qcd = Some(qcd);
                }
                JpegMarkerCode::PackedPacketHeadersTile => {
                    let payload = self.reader.read_segment_length()?;
                    if payload < 1 {
                        return Err(CodecError::InvalidMarkerSegmentSize);
                    }
                    let _zppt = self.reader.read_u8()?;
                    let bytes = self.reader.read_bytes(payload - 1)?;
                    packed_headers.extend_from_slice(bytes);
                }
                JpegMarkerCode::PacketLengthTile | JpegMarkerCode::ProgressionOrderChange => {
                    self.reader.skip_segment()?
                }
                JpegMarkerCode::EndOfImage => return Err(CodecError::InvalidTilePartHeader),
                _ => self.reader.skip_segment()?,
            }
        }

        let data = if psot == 0 {
            // Last tile-part with unknown length: the data runs to the next
            // SOT or to EOC.
            self.take_data_until_marker()?
        } else {
            let consumed = self.reader.position() - sot_start;
            let data_len = psot
                .checked_sub(consumed)
                .ok_or(CodecError::InvalidTilePartHeader)?;
            self.reader.read_bytes(data_len)?.to_vec()
        };

        let next = self.reader.read_known_marker()?;
        Ok((
            TilePart {
                tile_index,
                part_index,
                num_parts,
                data,
                packed_headers,
            },
            next,
        ))
    }

    /// Scan forward to the next SOT/EOC marker. Entropy-coded data cannot
    /// contain 0xFF followed by a byte above 0x8F, so the scan is safe.
    fn take_data_until_marker(&mut self) -> Result<Vec<u8>, CodecError> {
        let rest = self.reader.remaining_data();
        let mut end = None;
        for i in 0..rest.len().saturating_sub(1) {
            if rest[i] == 0xFF && (rest[i + 1] == 0x90 || rest[i + 1] == 0xD9) {
                end = Some(i);
                break;
            }
        }
        let end = end.ok_or(CodecError::EndOfImageMarkerNotFound)?;
        let data = rest[..end].to_vec();
        self.reader.advance(end)?;
        Ok(data)
    }
}
