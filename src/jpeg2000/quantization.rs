//! Subband quantization (ISO/IEC 15444-1 Annex E).
//!
//! Irreversible steps are stored as a 5-bit exponent and 11-bit mantissa:
//! delta = 2^(R - eps) * (1 + mu / 2^11). The encoder derives the ideal step
//! from a base step and the subband synthesis norm, rounds it through
//! (eps, mu), and quantizes with the reconstructed step so both ends agree
//! bit-exactly. Dequantization adds the half-step midpoint to every nonzero
//! magnitude (dead-zone reconstruction).

/// Guard bits carried in Sqcd/Sqcc.
pub const GUARD_BITS: u8 = 2;

/// L2 synthesis norms of the 9/7 filter per orientation and decomposition
/// level, indexed [orient][level - 1] with orient 0=LL, 1=HL, 2=LH, 3=HH.
const DWT97_NORMS: [[f32; 10]; 4] = [
    [1.965, 4.177, 8.403, 16.90, 33.84, 67.69, 135.3, 270.6, 540.9, 1081.0],
    [2.022, 3.989, 8.355, 17.04, 34.27, 68.63, 137.3, 274.6, 549.0, 1098.0],
    [2.022, 3.989, 8.355, 17.04, 34.27, 68.63, 137.3, 274.6, 549.0, 1098.0],
    [2.080, 3.865, 8.307, 17.18, 34.71, 69.43, 138.8, 277.6, 555.3, 1110.0],
];

/// Log2 of the nominal dynamic range gain of a subband: 0 for LL, 1 for
/// HL/LH, 2 for HH.
pub fn band_gain(orientation: usize) -> u8 {
    match orientation {
        0 => 0,
        1 | 2 => 1,
        _ => 2,
    }
}

pub fn dwt97_norm(orientation: usize, level: usize) -> f32 {
    let idx = level.clamp(1, 10) - 1;
    DWT97_NORMS[orientation.min(3)][idx]
}

/// A quantization step in its marker representation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StepSize {
    pub exponent: u8,
    pub mantissa: u16,
}

impl StepSize {
    /// Encode a real step for a subband of dynamic range `range_bits`
    /// (sample precision plus band gain).
    pub fn from_step(step: f32, range_bits: u8) -> Self {
        let step = step.max(1.0e-9);
        let mut exponent = range_bits as i32 - step.log2().floor() as i32;
        let mut mantissa;
        loop {
            let base = (range_bits as i32 - exponent) as f32;
            mantissa = (((step / base.exp2()) - 1.0) * 2048.0).round() as i32;
            if mantissa < 2048 {
                break;
            }
            // Rounded up past the mantissa range: bump the magnitude.
            exponent -= 1;
        }
        Self {
            exponent: exponent.clamp(0, 31) as u8,
            mantissa: mantissa.clamp(0, 2047) as u16,
        }
    }

    /// The real step both encoder and decoder use.
    pub fn step(&self, range_bits: u8) -> f32 {
        let scale = (range_bits as i32 - self.exponent as i32) as f32;
        scale.exp2() * (1.0 + self.mantissa as f32 / 2048.0)
    }

    /// Number of magnitude bitplanes the Tier-1 coder signals for this
    /// subband: Mb = guard + exponent - 1.
    pub fn magnitude_bitplanes(&self, guard_bits: u8) -> u8 {
        (guard_bits + self.exponent).saturating_sub(1)
    }
}

/// Dead-zone scalar quantizer: q = sign(x) * floor(|x| / delta).
pub fn quantize(coefficient: f32, step: f32) -> i32 {
    let magnitude = (coefficient.abs() / step) as i32;
    if coefficient < 0.0 {
        -magnitude
    } else {
        magnitude
    }
}

/// Midpoint reconstruction: zero stays zero, everything else lands half a
/// step into its bin.
pub fn dequantize(q: i32, step: f32) -> f32 {
    if q == 0 {
        0.0
    } else if q > 0 {
        (q as f32 + 0.5) * step
    } else {
        (q as f32 - 0.5) * step
    }
}
