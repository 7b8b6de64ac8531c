//! Canonical Huffman tables and the stuffed bit I/O used by JPEG scan data.
//!
//! Tables are defined by the canonical T.81 pair `(bits[16], values[])`.
//! Decoding serves codes of up to eight bits from a 256-entry lookup table
//! and falls back to the canonical min/max-code walk for longer codes.

use crate::error::CodecError;

#[derive(Debug, Clone, Copy, Default)]
pub struct HuffmanCode {
    pub value: u16,
    pub length: u8,
}

/// A fast-lookup entry: decoded symbol plus its code length, or `len == 0`
/// when no code of eight bits or fewer matches the prefix.
#[derive(Debug, Clone, Copy, Default)]
struct FastEntry {
    symbol: u8,
    len: u8,
}

#[derive(Clone)]
pub struct HuffmanTable {
    /// Encode side: code for each symbol value.
    codes: [HuffmanCode; 256],
    /// Decode side: one entry per possible 8-bit prefix.
    fast: [FastEntry; 256],
    min_code: [i32; 16],
    max_code: [i32; 16],
    val_ptr: [i32; 16],
    lengths: [u8; 16],
    values: Vec<u8>,
}

impl HuffmanTable {
    /// Build encode and decode structures from a DHT specification.
    pub fn build(lengths: &[u8; 16], values: &[u8]) -> Result<Self, CodecError> {
        let total: usize = lengths.iter().map(|&n| n as usize).sum();
        if total != values.len() || total > 256 {
            return Err(CodecError::InvalidHuffmanTable);
        }

        let mut table = Self {
            codes: [HuffmanCode::default(); 256],
            fast: [FastEntry::default(); 256],
            min_code: [0; 16],
            max_code: [-1; 16],
            val_ptr: [0; 16],
            lengths: *lengths,
            values: values.to_vec(),
        };

        let mut code = 0u32;
        let mut val_idx = 0usize;
        for i in 0..16 {
            let n = lengths[i] as usize;
            let len = (i + 1) as u8;
            if n > 0 {
                if code + n as u32 > (1u32 << len) {
                    return Err(CodecError::InvalidHuffmanTable);
                }
                table.min_code[i] = code as i32;
                table.val_ptr[i] = val_idx as i32;
                for _ in 0..n {
                    let symbol = values[val_idx];
                    table.codes[symbol as usize] = HuffmanCode {
                        value: code as u16,
                        length: len,
                    };
                    if len <= 8 {
                        // Every 8-bit word starting with this code resolves to it.
                        let shift = 8 - len;
                        let base = (code << shift) as usize;
                        for entry in &mut table.fast[base..base + (1 << shift)] {
                            entry.symbol = symbol;
                            entry.len = len;
                        }
                    }
                    code += 1;
                    val_idx += 1;
                }
                table.max_code[i] = (code - 1) as i32;
            }
            code <<= 1;
        }
        Ok(table)
    }

    pub fn lengths(&self) -> &[u8; 16] {
        &self.lengths
    }

    pub fn values(&self) -> &[u8] {
        &self.values
    }

    /// Code for a symbol; length 0 means the symbol is absent from the table.
    pub fn code(&self, symbol: u8) -> HuffmanCode {
        self.codes[symbol as usize]
    }

    pub fn decode(&self, reader: &mut JpegBitReader) -> Result<u8, CodecError> {
        let prefix = reader.peek_bits8()?;
        let entry = self.fast[prefix as usize];
        if entry.len > 0 {
            reader.consume_bits(entry.len)?;
            return Ok(entry.symbol);
        }
        // Long code: restart the canonical walk from the peeked prefix.
        let mut code = 0i32;
        for i in 0..16 {
            code = (code << 1) | reader.read_bits(1)? as i32;
            if self.lengths[i] > 0 && code <= self.max_code[i] {
                let idx = self.val_ptr[i] + (code - self.min_code[i]);
                return Ok(self.values[idx as usize]);
            }
        }
        Err(CodecError::InvalidHuffmanCode)
    }
}

/// Bit length of a residual magnitude, the SSSS category of T.81.
pub fn category_of(diff: i32) -> u8 {
    if diff == 0 {
        0
    } else {
        (32 - diff.unsigned_abs().leading_zeros()) as u8
    }
}

/// Magnitude bits for a residual: positive values verbatim, negative values
/// as `diff - 1` in one's complement (low `category` bits).
pub fn magnitude_bits(diff: i32, category: u8) -> u16 {
    if diff >= 0 {
        diff as u16
    } else {
        (diff - 1) as u16 & ((1u32 << category) - 1) as u16
    }
}

/// Inverse of `magnitude_bits`.
pub fn extend_magnitude(bits: u16, category: u8) -> i32 {
    if category == 0 {
        return 0;
    }
    let threshold = 1u16 << (category - 1);
    if bits >= threshold {
        bits as i32
    } else {
        bits as i32 - (1i32 << category) + 1
    }
}

/// MSB-first bit writer for scan data with JPEG byte stuffing: a zero byte is
/// inserted after every emitted 0xFF. Flush pads the final byte with 1-bits.
pub struct JpegBitWriter<'a> {
    destination: &'a mut [u8],
    position: usize,
    bit_buffer: u32,
    bits_in_buffer: i32,
}

impl<'a> JpegBitWriter<'a> {
    pub fn new(destination: &'a mut [u8]) -> Self {
        Self {
            destination,
            position: 0,
            bit_buffer: 0,
            bits_in_buffer: 0,
        }
    }

    pub fn write_bits(&mut self, value: u16, length: u8) -> Result<(), CodecError> {
        if length == 0 {
            return Ok(());
        }
        debug_assert!(length <= 16);
        let length = length as i32;
        self.bit_buffer = (self.bit_buffer << length) | (value as u32 & ((1 << length) - 1));
        self.bits_in_buffer += length;
        while self.bits_in_buffer >= 8 {
            let shift = self.bits_in_buffer - 8;
            let byte = (self.bit_buffer >> shift) as u8;
            self.emit_byte(byte)?;
            self.bits_in_buffer = shift;
            self.bit_buffer &= (1u32 << shift.max(0)) - 1;
        }
        Ok(())
    }

    pub fn write_code(&mut self, code: HuffmanCode) -> Result<(), CodecError> {
        if code.length == 0 {
            return Err(CodecError::ResidualCategoryOutOfRange);
        }
        self.write_bits(code.value, code.length)
    }

    fn emit_byte(&mut self, byte: u8) -> Result<(), CodecError> {
        if self.position >= self.destination.len() {
            return Err(CodecError::DestinationTooSmall);
        }
        self.destination[self.position] = byte;
        self.position += 1;
        if byte == 0xFF {
            if self.position >= self.destination.len() {
                return Err(CodecError::DestinationTooSmall);
            }
            self.destination[self.position] = 0x00;
            self.position += 1;
        }
        Ok(())
    }

    pub fn flush(&mut self) -> Result<(), CodecError> {
        if self.bits_in_buffer > 0 {
            let pad = 8 - self.bits_in_buffer;
            self.write_bits((1u16 << pad) - 1, pad as u8)?;
        }
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.position
    }

    pub fn is_empty(&self) -> bool {
        self.position == 0
    }
}

/// MSB-first bit reader mirroring `JpegBitWriter`: skips the stuffed zero
/// after 0xFF and reports a marker (0xFF followed by non-zero) as the end of
/// the entropy-coded segment.
pub struct JpegBitReader<'a> {
    source: &'a [u8],
    position: usize,
    bit_buffer: u32,
    bits_in_buffer: i32,
}

impl<'a> JpegBitReader<'a> {
    pub fn new(source: &'a [u8]) -> Self {
        Self {
            source,
            position: 0,
            bit_buffer: 0,
            bits_in_buffer: 0,
        }
    }

    /// Bytes consumed from the source, including stuffed zeros.
    pub fn bytes_consumed(&self) -> usize {
        self.position
    }

    fn fill(&mut self, want: i32) -> Result<(), CodecError> {
        while self.bits_in_buffer < want {
            let byte = self.read_byte_unstuffed()?;
            self.bit_buffer = (self.bit_buffer << 8) | byte as u32;
            self.bits_in_buffer += 8;
        }
        Ok(())
    }

    fn read_byte_unstuffed(&mut self) -> Result<u8, CodecError> {
        if self.position >= self.source.len() {
            return Err(CodecError::UnexpectedEndOfData);
        }
        let byte = self.source[self.position];
        self.position += 1;
        if byte == 0xFF {
            match self.source.get(self.position) {
                Some(0x00) => {
                    self.position += 1;
                }
                // A marker terminates the scan; the caller ran past the
                // entropy-coded data.
                _ => return Err(CodecError::UnexpectedEndOfData),
            }
        }
        Ok(byte)
    }

    fn peek_bits8(&mut self) -> Result<u8, CodecError> {
        if self.fill(8).is_err() {
            // Near the end of the scan fewer than eight bits may remain;
            // pad the view with 1-bits the way the writer pads its tail.
            let have = self.bits_in_buffer;
            if have == 0 {
                return Err(CodecError::UnexpectedEndOfData);
            }
            let padded = ((self.bit_buffer << (8 - have)) | ((1 << (8 - have)) - 1)) as u8;
            return Ok(padded);
        }
        Ok((self.bit_buffer >> (self.bits_in_buffer - 8)) as u8)
    }

    fn consume_bits(&mut self, count: u8) -> Result<(), CodecError> {
        self.fill(count as i32)?;
        self.bits_in_buffer -= count as i32;
        self.bit_buffer &= (1u32 << self.bits_in_buffer) - 1;
        Ok(())
    }

    pub fn read_bits(&mut self, count: u8) -> Result<u16, CodecError> {
        if count == 0 {
            return Ok(0);
        }
        self.fill(count as i32)?;
        let shift = self.bits_in_buffer - count as i32;
        let value = (self.bit_buffer >> shift) & ((1 << count) - 1);
        self.bits_in_buffer = shift;
        self.bit_buffer &= (1u32 << shift) - 1;
        Ok(value as u16)
    }

    /// Drop any partial byte (used before restart markers).
    pub fn align_to_byte(&mut self) {
        self.bits_in_buffer = 0;
        self.bit_buffer = 0;
    }

    /// Read one raw byte without unstuffing. Only meaningful at byte
    /// alignment; used to consume restart markers inside a scan.
    pub fn read_raw_byte(&mut self) -> Result<u8, CodecError> {
        debug_assert_eq!(self.bits_in_buffer, 0);
        if self.position >= self.source.len() {
            return Err(CodecError::UnexpectedEndOfData);
        }
        let byte = self.source[self.position];
        self.position += 1;
        Ok(byte)
    }
}
