//! JPEG codestream reader utilities.
//!
//! `JpegStreamReader` walks a byte slice marker by marker. It knows which
//! markers are standalone (SOI, EOI/EOC, SOC, SOD, EPH, RST0-7) and validates
//! the length field of every other segment against the bytes that remain.
//! The family-specific parsers (JPEG Lossless scan reader, JPEG 2000
//! codestream parser) sit on top of it and keep their own state.

use crate::error::CodecError;
use crate::jpeg_marker_code::{is_reserved_standalone, JpegMarkerCode, JPEG_MARKER_START_BYTE};

pub struct JpegStreamReader<'a> {
    source: &'a [u8],
    position: usize,
}

impl<'a> JpegStreamReader<'a> {
    pub fn new(source: &'a [u8]) -> Self {
        Self {
            source,
            position: 0,
        }
    }

    pub fn position(&self) -> usize {
        self.position
    }

    pub fn remaining(&self) -> usize {
        self.source.len() - self.position
    }

    pub fn remaining_data(&self) -> &'a [u8] {
        &self.source[self.position..]
    }

    pub fn read_u8(&mut self) -> Result<u8, CodecError> {
        if self.position >= self.source.len() {
            return Err(CodecError::UnexpectedEndOfData);
        }
        let b = self.source[self.position];
        self.position += 1;
        Ok(b)
    }

    pub fn read_u16(&mut self) -> Result<u16, CodecError> {
        let hi = self.read_u8()? as u16;
        let lo = self.read_u8()? as u16;
        Ok((hi << 8) | lo)
    }

    pub fn read_u32(&mut self) -> Result<u32, CodecError> {
        let hi = self.read_u16()? as u32;
        let lo = self.read_u16()? as u32;
        Ok((hi << 16) | lo)
    }

    pub fn read_bytes(&mut self, count: usize) -> Result<&'a [u8], CodecError> {
        if self.remaining() < count {
            return Err(CodecError::UnexpectedEndOfData);
        }
        let slice = &self.source[self.position..self.position + count];
        self.position += count;
        Ok(slice)
    }

    pub fn peek_u8(&self) -> Option<u8> {
        self.source.get(self.position).copied()
    }

    pub fn advance(&mut self, count: usize) -> Result<(), CodecError> {
        if self.remaining() < count {
            return Err(CodecError::UnexpectedEndOfData);
        }
        self.position += count;
        Ok(())
    }

    pub fn seek(&mut self, position: usize) -> Result<(), CodecError> {
        if position > self.source.len() {
            return Err(CodecError::UnexpectedEndOfData);
        }
        self.position = position;
        Ok(())
    }

    /// Read the next marker pair. Fill bytes (repeated 0xFF) before the code
    /// byte are permitted per T.81.
    pub fn read_marker(&mut self) -> Result<JpegMarkerCode, CodecError> {
        let mut b = self.read_u8()?;
        if b != JPEG_MARKER_START_BYTE {
            return Err(CodecError::JpegMarkerStartByteNotFound);
        }
        while b == JPEG_MARKER_START_BYTE {
            b = self.read_u8()?;
        }
        match JpegMarkerCode::try_from(b) {
            Ok(marker) => Ok(marker),
            Err(_) => {
                if is_reserved_standalone(b) {
                    Err(CodecError::UnknownStandaloneMarker)
                } else {
                    // Unknown marker with a length field: the caller decides
                    // whether to skip it via `skip_segment`.
                    Err(CodecError::InvalidMarkerSegmentSize)
                }
            }
        }
    }

    /// Read the next marker, skipping any unknown length-bearing segment.
    /// Unknown standalone markers remain an error.
    pub fn read_known_marker(&mut self) -> Result<JpegMarkerCode, CodecError> {
        loop {
            let start = self.position;
            match self.read_marker() {
                Ok(marker) => return Ok(marker),
                Err(CodecError::InvalidMarkerSegmentSize) => {
                    log::debug!(
                        "skipping unknown marker 0xFF{:02X} at offset {}",
                        self.source[self.position - 1],
                        start
                    );
                    self.skip_segment()?;
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Read a segment length field and validate it against the remaining
    /// bytes. Returns the payload length (the length field minus its own two
    /// bytes).
    pub fn read_segment_length(&mut self) -> Result<usize, CodecError> {
        let length = self.read_u16()? as usize;
        if length < 2 || length - 2 > self.remaining() {
            return Err(CodecError::InvalidMarkerSegmentSize);
        }
        Ok(length - 2)
    }

    pub fn skip_segment(&mut self) -> Result<(), CodecError> {
        let payload = self.read_segment_length()?;
        self.advance(payload)
    }
}
