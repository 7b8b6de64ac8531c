//! MQ arithmetic coder (ISO/IEC 15444-1 Annex C).
//!
//! Canonical register convention: A holds the 16-bit interval, C the 28-bit
//! code register, CT the bits left before a byte transfer. The encoder's
//! "last byte that may still receive a carry" is simply the final element of
//! the output buffer; the buffer is seeded with one sentinel byte that is
//! dropped when a codeword segment is taken.

/// Number of coding contexts used by the Tier-1 coder.
pub const NUM_CONTEXTS: usize = 19;

/// Run-length context (cleanup pass aggregation).
pub const CTX_RUN: usize = 17;
/// Uniform context (run position bits, segmentation marks).
pub const CTX_UNIFORM: usize = 18;

#[derive(Clone, Copy)]
struct QeRow {
    qe: u16,
    nmps: u8,
    nlps: u8,
    switch: u8,
}

const fn q(qe: u16, nmps: u8, nlps: u8, switch: u8) -> QeRow {
    QeRow {
        qe,
        nmps,
        nlps,
        switch,
    }
}

/// Table C-2: probability estimates and state transitions.
const QE_TABLE: [QeRow; 47] = [
    q(0x5601, 1, 1, 1),
    q(0x3401, 2, 6, 0),
    q(0x1801, 3, 9, 0),
    q(0x0AC1, 4, 12, 0),
    q(0x0521, 5, 29, 0),
    q(0x0221, 38, 33, 0),
    q(0x5601, 7, 6, 1),
    q(0x5401, 8, 14, 0),
    q(0x4801, 9, 14, 0),
    q(0x3801, 10, 14, 0),
    q(0x3001, 11, 17, 0),
    q(0x2401, 12, 18, 0),
    q(0x1C01, 13, 20, 0),
    q(0x1601, 29, 21, 0),
    q(0x5601, 15, 14, 1),
    q(0x5401, 16, 14, 0),
    q(0x5101, 17, 15, 0),
    q(0x4801, 18, 16, 0),
    q(0x3801, 19, 17, 0),
    q(0x3401, 20, 18, 0),
    q(0x3001, 21, 19, 0),
    q(0x2801, 22, 19, 0),
    q(0x2401, 23, 19, 0),
    q(0x2201, 24, 19, 0),
    q(0x1C01, 25, 20, 0),
    q(0x1801, 26, 21, 0),
    q(0x1601, 27, 22, 0),
    q(0x1401, 28, 23, 0),
    q(0x1201, 29, 24, 0),
    q(0x1101, 30, 25, 0),
    q(0x0AC1, 31, 26, 0),
    q(0x09C1, 32, 27, 0),
    q(0x08A1, 33, 28, 0),
    q(0x0521, 34, 29, 0),
    q(0x0441, 35, 30, 0),
    q(0x02A1, 36, 31, 0),
    q(0x0221, 37, 32, 0),
    q(0x0141, 38, 33, 0),
    q(0x0111, 39, 34, 0),
    q(0x0085, 40, 35, 0),
    q(0x0049, 41, 36, 0),
    q(0x0025, 42, 37, 0),
    q(0x0015, 43, 38, 0),
    q(0x0009, 44, 39, 0),
    q(0x0005, 45, 40, 0),
    q(0x0001, 45, 41, 0),
    q(0x5601, 46, 46, 0),
];

/// Expose the table rows for the conformance test against Table C-2.
pub fn qe_table_row(index: usize) -> (u16, u8, u8, u8) {
    let row = QE_TABLE[index];
    (row.qe, row.nmps, row.nlps, row.switch)
}

/// Context byte: low 7 bits state index, bit 7 the current MPS.
pub type ContextSet = [u8; NUM_CONTEXTS];

/// Context states after a T1 reset: everything at state 0 with MPS 0,
/// except the uniform context (46), the run context (3) and the all-zero
/// zero-coding context (4).
pub fn reset_contexts() -> ContextSet {
    let mut contexts = [0u8; NUM_CONTEXTS];
    contexts[CTX_UNIFORM] = 46;
    contexts[CTX_RUN] = 3;
    contexts[0] = 4;
    contexts
}

#[inline]
fn ctx_state(ctx: u8) -> usize {
    (ctx & 0x7F) as usize
}

#[inline]
fn ctx_mps(ctx: u8) -> u8 {
    ctx >> 7
}

#[inline]
fn make_ctx(state: u8, mps: u8) -> u8 {
    state | (mps << 7)
}

pub struct MqEncoder {
    a: u32,
    c: u32,
    ct: i32,
    /// Output bytes; index 0 is the sentinel, `bp` points at the byte a
    /// future carry may still increment.
    buffer: Vec<u8>,
    bp: usize,
    pub contexts: ContextSet,
}

impl Default for MqEncoder {
    fn default() -> Self {
        Self::new()
    }
}

impl MqEncoder {
    pub fn new() -> Self {
        let mut enc = Self {
            a: 0,
            c: 0,
            ct: 0,
            buffer: Vec::new(),
            bp: 0,
            contexts: reset_contexts(),
        };
        enc.restart();
        enc
    }

    /// INITENC. Contexts are left untouched so a terminated segment can be
    /// continued with its probability state intact (TERMALL semantics).
    pub fn restart(&mut self) {
        self.a = 0x8000;
        self.c = 0;
        self.ct = 12;
        self.buffer.clear();
        self.buffer.push(0);
        self.bp = 0;
    }

    pub fn reset_contexts(&mut self) {
        self.contexts = reset_contexts();
    }

    /// Bytes committed to the output so far; a valid truncation point for
    /// layer assembly (the bytes themselves are only final after `flush`).
    pub fn committed_len(&self) -> usize {
        self.bp
    }

    /// ENCODE.
    pub fn encode(&mut self, d: u8, cx: usize) {
        let mps = ctx_mps(self.contexts[cx]);
        if d == mps {
            self.code_mps(cx);
        } else {
            self.code_lps(cx);
        }
    }

    /// CODEMPS with conditional exchange.
    fn code_mps(&mut self, cx: usize) {
        let state = ctx_state(self.contexts[cx]);
        let qe = QE_TABLE[state].qe as u32;
        self.a -= qe;
        if self.a & 0x8000 == 0 {
            if self.a < qe {
                self.a = qe;
            } else {
                self.c += qe;
            }
            self.contexts[cx] = make_ctx(QE_TABLE[state].nmps, ctx_mps(self.contexts[cx]));
            self.renorm();
        } else {
            self.c += qe;
        }
    }

    /// CODELPS with conditional exchange.
    fn code_lps(&mut self, cx: usize) {
        let state = ctx_state(self.contexts[cx]);
        let qe = QE_TABLE[state].qe as u32;
        self.a -= qe;
        if self.a < qe {
            self.c += qe;
        } else {
            self.a = qe;
        }
        let mut mps = ctx_mps(self.contexts[cx]);
        if QE_TABLE[state].switch == 1 {
            mps = 1 - mps;
        }
        self.contexts[cx] = make_ctx(QE_TABLE[state].nlps, mps);
        self.renorm();
    }

    /// RENORME.
    fn renorm(&mut self) {
        loop {
            self.a <<= 1;
            self.c <<= 1;
            self.ct -= 1;
            if self.ct == 0 {
                self.byte_out();
            }
            if self.a & 0x8000 != 0 {
                break;
            }
        }
    }

    /// BYTEOUT with carry propagation into `buffer[bp]`.
    fn byte_out(&mut self) {
        if self.buffer[self.bp] == 0xFF {
            self.stuffed_out();
        } else if self.c < 0x800_0000 {
            self.plain_out();
        } else {
            self.buffer[self.bp] += 1;
            if self.buffer[self.bp] == 0xFF {
                self.c &= 0x7FF_FFFF;
                self.stuffed_out();
            } else {
                self.plain_out();
            }
        }
    }

    fn plain_out(&mut self) {
        self.bp += 1;
        self.push_byte((self.c >> 19) as u8);
        self.c &= 0x7_FFFF;
        self.ct = 8;
    }

    fn stuffed_out(&mut self) {
        self.bp += 1;
        self.push_byte((self.c >> 20) as u8);
        self.c &= 0xF_FFFF;
        self.ct = 7;
    }

    fn push_byte(&mut self, b: u8) {
        if self.bp >= self.buffer.len() {
            self.buffer.push(b);
        } else {
            self.buffer[self.bp] = b;
        }
    }

    /// SETBITS.
    fn set_bits(&mut self) {
        let temp = self.c + self.a;
        self.c |= 0xFFFF;
        if self.c >= temp {
            self.c -= 0x8000;
        }
    }

    /// FLUSH: normal termination. Returns the finished codeword segment and
    /// re-initializes the registers for a possible following segment.
    pub fn flush(&mut self) -> Vec<u8> {
        self.set_bits();
        self.c <<= self.ct;
        self.byte_out();
        self.c <<= self.ct;
        self.byte_out();
        self.take_segment()
    }

    /// Predictable termination (PTERM): pad so the decoder can detect
    /// errors, per the Annex C ERTERM procedure.
    pub fn flush_predictable(&mut self) -> Vec<u8> {
        let mut k = 11 - self.ct + 1;
        while k > 0 {
            self.c <<= self.ct;
            self.ct = 0;
            self.byte_out();
            k -= self.ct;
        }
        if self.buffer[self.bp] != 0xFF {
            self.byte_out();
        }
        self.take_segment()
    }

    /// Encode the segmentation symbol sequence (1, 0, 1, 0) under the
    /// uniform context.
    pub fn segmark(&mut self) {
        for d in [1u8, 0, 1, 0] {
            self.encode(d, CTX_UNIFORM);
        }
    }

    /// Drop the sentinel and any trailing 0xFF (a segment must not end on
    /// 0xFF), then reset the registers keeping context state.
    fn take_segment(&mut self) -> Vec<u8> {
        let mut end = self.bp + 1;
        while end > 1 && self.buffer[end - 1] == 0xFF {
            end -= 1;
        }
        let segment = self.buffer[1..end].to_vec();
        let contexts = self.contexts;
        self.restart();
        self.contexts = contexts;
        segment
    }
}

/// Raw (bypass / lazy mode) bit packer: MSB-first, a byte following 0xFF
/// carries only seven bits.
pub struct RawEncoder {
    out: Vec<u8>,
    byte: u8,
    /// Bit slots left in the current byte.
    ct: u8,
    /// Capacity of the current byte: 7 after an emitted 0xFF, else 8.
    cap: u8,
}

impl Default for RawEncoder {
    fn default() -> Self {
        Self::new()
    }
}

impl RawEncoder {
    pub fn new() -> Self {
        Self {
            out: Vec::new(),
            byte: 0,
            ct: 8,
            cap: 8,
        }
    }

    pub fn put(&mut self, d: u8) {
        self.ct -= 1;
        self.byte |= (d & 1) << self.ct;
        if self.ct == 0 {
            self.out.push(self.byte);
            self.cap = if self.byte == 0xFF { 7 } else { 8 };
            self.ct = self.cap;
            self.byte = 0;
        }
    }

    pub fn committed_len(&self) -> usize {
        self.out.len()
    }

    /// Zero-pad the tail and return the segment. Padding with zeros can
    /// never produce a trailing 0xFF.
    pub fn flush(&mut self) -> Vec<u8> {
        if self.ct < self.cap {
            self.out.push(self.byte);
        }
        self.byte = 0;
        self.ct = 8;
        self.cap = 8;
        std::mem::take(&mut self.out)
    }
}

/// MQ decoder over one codeword segment. Reads past the end of the segment
/// see a synthetic 0xFF sentinel, so truncated input produces a defined
/// (meaningless) symbol stream instead of a panic.
pub struct MqDecoder<'a> {
    a: u32,
    c: u32,
    ct: i32,
    data: &'a [u8],
    bp: usize,
    pub contexts: ContextSet,
}

impl<'a> MqDecoder<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        let mut dec = Self {
            a: 0,
            c: 0,
            ct: 0,
            data,
            bp: 0,
            contexts: reset_contexts(),
        };
        dec.init();
        dec
    }

    /// Continue with a new segment, keeping context state (TERMALL).
    pub fn restart(&mut self, data: &'a [u8]) {
        self.data = data;
        self.init();
    }

    pub fn reset_contexts(&mut self) {
        self.contexts = reset_contexts();
    }

    #[inline]
    fn byte_at(&self, index: usize) -> u32 {
        self.data.get(index).copied().unwrap_or(0xFF) as u32
    }

    /// INITDEC.
    fn init(&mut self) {
        self.bp = 0;
        self.c = self.byte_at(0) << 16;
        self.ct = 0;
        self.byte_in();
        self.c <<= 7;
        self.ct -= 7;
        self.a = 0x8000;
    }

    /// BYTEIN with the bit-stuffing and marker rules.
    fn byte_in(&mut self) {
        if self.byte_at(self.bp) == 0xFF {
            if self.byte_at(self.bp + 1) > 0x8F {
                // Marker or end of data: feed 1-bits from here on.
                self.c += 0xFF00;
                self.ct = 8;
            } else {
                self.bp += 1;
                self.c += self.byte_at(self.bp) << 9;
                self.ct = 7;
            }
        } else {
            self.bp += 1;
            self.c += self.byte_at(self.bp) << 8;
            self.ct = 8;
        }
    }

    /// DECODE.
    pub fn decode(&mut self, cx: usize) -> u8 {
        let state = ctx_state(self.contexts[cx]);
        let qe = QE_TABLE[state].qe as u32;
        self.a -= qe;
        if (self.c >> 16) < qe {
            let d = self.lps_exchange(cx, qe);
            self.renorm();
            d
        } else {
            self.c -= qe << 16;
            if self.a & 0x8000 == 0 {
                let d = self.mps_exchange(cx);
                self.renorm();
                d
            } else {
                ctx_mps(self.contexts[cx])
            }
        }
    }

    fn mps_exchange(&mut self, cx: usize) -> u8 {
        let ctx = self.contexts[cx];
        let state = ctx_state(ctx);
        let mps = ctx_mps(ctx);
        if self.a < QE_TABLE[state].qe as u32 {
            let mut new_mps = mps;
            if QE_TABLE[state].switch == 1 {
                new_mps = 1 - new_mps;
            }
            self.contexts[cx] = make_ctx(QE_TABLE[state].nlps, new_mps);
            1 - mps
        } else {
            self.contexts[cx] = make_ctx(QE_TABLE[state].nmps, mps);
            mps
        }
    }

    fn lps_exchange(&mut self, cx: usize, qe: u32) -> u8 {
        let ctx = self.contexts[cx];
        let state = ctx_state(ctx);
        let mps = ctx_mps(ctx);
        if self.a < qe {
            self.a = qe;
            self.contexts[cx] = make_ctx(QE_TABLE[state].nmps, mps);
            mps
        } else {
            self.a = qe;
            let mut new_mps = mps;
            if QE_TABLE[state].switch == 1 {
                new_mps = 1 - new_mps;
            }
            self.contexts[cx] = make_ctx(QE_TABLE[state].nlps, new_mps);
            1 - mps
        }
    }

    /// RENORMD.
    fn renorm(&mut self) {
        loop {
            if self.ct == 0 {
                self.byte_in();
            }
            self.a <<= 1;
            self.c <<= 1;
            self.ct -= 1;
            if self.a & 0x8000 != 0 {
                break;
            }
        }
    }

    /// Consume a segmentation mark; returns false when the symbols decoded
    /// do not form the expected (1, 0, 1, 0) sequence.
    pub fn check_segmark(&mut self) -> bool {
        let mut ok = true;
        for expected in [1u8, 0, 1, 0] {
            if self.decode(CTX_UNIFORM) != expected {
                ok = false;
            }
        }
        ok
    }
}

/// Raw (bypass) bit reader mirroring `RawEncoder`; end of data feeds 1-bits.
pub struct RawDecoder<'a> {
    data: &'a [u8],
    pos: usize,
    byte: u8,
    ct: u8,
    prev_ff: bool,
}

impl<'a> RawDecoder<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self {
            data,
            pos: 0,
            byte: 0,
            ct: 0,
            prev_ff: false,
        }
    }

    pub fn get(&mut self) -> u8 {
        if self.ct == 0 {
            self.prev_ff = self.byte == 0xFF && self.pos > 0;
            self.byte = self.data.get(self.pos).copied().unwrap_or(0xFF);
            self.pos += 1;
            self.ct = if self.prev_ff { 7 } else { 8 };
        }
        self.ct -= 1;
        (self.byte >> self.ct) & 1
    }
}
