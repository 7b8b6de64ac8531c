//! Typed codec parameters with a thin string-keyed view.
//!
//! Each codec family has a strongly typed parameter struct; `validate`
//! silently clamps invalid values to their defaults, matching the behaviour
//! callers of the DICOM facade expect. The string-keyed `set_option` view
//! exists only for the cross-codec `Parameters` boundary.

/// JPEG Lossless options.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LosslessParameters {
    /// Selection value 1-7, or 0 for auto-selection. Invalid values reset
    /// to 0.
    pub predictor: u8,
    /// When set, `predictor = 0` runs true auto-selection for the `…4.57`
    /// transfer syntax instead of the compatibility forcing to 1.
    pub strict_predictor: bool,
}

impl Default for LosslessParameters {
    fn default() -> Self {
        Self {
            predictor: 0,
            strict_predictor: false,
        }
    }
}

impl LosslessParameters {
    pub fn validate(&mut self) {
        if self.predictor > 7 {
            self.predictor = 0;
        }
    }
}

/// JPEG 2000 options shared by the lossless-only and lossy codecs.
#[derive(Debug, Clone, PartialEq)]
pub struct Jpeg2000Parameters {
    /// 9/7 wavelet and quantization; ignored (false) by the lossless-only
    /// codecs.
    pub irreversible: bool,
    /// Quality 1-100 for the irreversible path.
    pub rate: u32,
    pub num_levels: u8,
    pub num_layers: u16,
    pub allow_mct: bool,
    /// Desired compression ratio, 0 = off.
    pub target_ratio: f32,
    pub quant_step_scale: f32,
    /// Explicit per-subband steps; must hold 3 * num_levels + 1 entries
    /// when non-empty.
    pub subband_steps: Vec<f32>,
    /// Per-layer weights for pass distribution.
    pub rate_levels: Vec<u32>,
}

impl Default for Jpeg2000Parameters {
    fn default() -> Self {
        Self {
            irreversible: true,
            rate: 20,
            num_levels: 5,
            num_layers: 1,
            allow_mct: false,
            target_ratio: 0.0,
            quant_step_scale: 1.0,
            subband_steps: Vec::new(),
            rate_levels: Vec::new(),
        }
    }
}

impl Jpeg2000Parameters {
    pub fn validate(&mut self) {
        if self.rate == 0 || self.rate > 100 {
            self.rate = 20;
        }
        if self.num_levels > 6 {
            self.num_levels = 5;
        }
        if self.num_layers == 0 {
            self.num_layers = 1;
        }
        if !(self.target_ratio >= 0.0) {
            self.target_ratio = 0.0;
        }
        if !(self.quant_step_scale > 0.0) {
            self.quant_step_scale = 1.0;
        }
        if !self.subband_steps.is_empty()
            && self.subband_steps.len() != 3 * self.num_levels as usize + 1
        {
            self.subband_steps.clear();
        }
        if !self.rate_levels.is_empty() && self.rate_levels.len() != self.num_layers as usize {
            self.rate_levels.clear();
        }
    }
}

/// Parameter object passed across the codec facade.
#[derive(Debug, Clone, PartialEq)]
pub enum CodecParameters {
    JpegLossless(LosslessParameters),
    Jpeg2000(Jpeg2000Parameters),
}

impl CodecParameters {
    pub fn validate(&mut self) {
        match self {
            Self::JpegLossless(p) => p.validate(),
            Self::Jpeg2000(p) => p.validate(),
        }
    }

    /// String-keyed option view. Unknown keys and malformed values are
    /// ignored; `validate` still applies afterwards.
    pub fn set_option(&mut self, key: &str, value: &str) {
        match self {
            Self::JpegLossless(p) => match key {
                "predictor" => {
                    if let Ok(v) = value.parse() {
                        p.predictor = v;
                    }
                }
                "strict_predictor" => {
                    if let Ok(v) = value.parse() {
                        p.strict_predictor = v;
                    }
                }
                _ => {}
            },
            Self::Jpeg2000(p) => match key {
                "irreversible" => {
                    if let Ok(v) = value.parse() {
                        p.irreversible = v;
                    }
                }
                "rate" => {
                    if let Ok(v) = value.parse() {
                        p.rate = v;
                    }
                }
                "num_levels" => {
                    if let Ok(v) = value.parse() {
                        p.num_levels = v;
                    }
                }
                "num_layers" => {
                    if let Ok(v) = value.parse() {
                        p.num_layers = v;
                    }
                }
                "allow_mct" => {
                    if let Ok(v) = value.parse() {
                        p.allow_mct = v;
                    }
                }
                "target_ratio" => {
                    if let Ok(v) = value.parse() {
                        p.target_ratio = v;
                    }
                }
                "quant_step_scale" => {
                    if let Ok(v) = value.parse() {
                        p.quant_step_scale = v;
                    }
                }
                _ => {}
            },
        }
    }
}
