//! Codestream object model: parsed marker contents and subband geometry.

use super::packet::ProgressionOrder;
use super::quantization::StepSize;
use crate::error::CodecError;

/// Per-component info from SIZ (Ssiz, XRsiz, YRsiz).
#[derive(Debug, Clone, Copy, Default)]
pub struct ComponentInfo {
    pub precision: u8,
    pub signed: bool,
    pub dx: u8,
    pub dy: u8,
}

/// SIZ marker contents.
#[derive(Debug, Clone, Default)]
pub struct Siz {
    pub width: u32,
    pub height: u32,
    pub x_offset: u32,
    pub y_offset: u32,
    pub tile_width: u32,
    pub tile_height: u32,
    pub tile_x_offset: u32,
    pub tile_y_offset: u32,
    pub components: Vec<ComponentInfo>,
}

impl Siz {
    pub fn num_tiles(&self) -> usize {
        if self.tile_width == 0 || self.tile_height == 0 {
            return 0;
        }
        let across = self
            .width
            .saturating_sub(self.tile_x_offset)
            .div_ceil(self.tile_width) as usize;
        let down = self
            .height
            .saturating_sub(self.tile_y_offset)
            .div_ceil(self.tile_height) as usize;
        across * down
    }
}

/// COD / COC marker contents (code-block exponents stored here as the real
/// log2 sizes, not the biased wire values).
#[derive(Debug, Clone)]
pub struct Cod {
    pub use_sop: bool,
    pub use_eph: bool,
    pub progression: ProgressionOrder,
    pub num_layers: u16,
    pub mct: bool,
    pub levels: u8,
    pub cblk_w_exp: u8,
    pub cblk_h_exp: u8,
    pub cblk_style: u8,
    /// 0 = irreversible 9/7, 1 = reversible 5/3 (SPcod transform byte).
    pub reversible: bool,
    /// Per-resolution (PPx, PPy) when custom precincts are signalled.
    pub precincts: Vec<(u8, u8)>,
}

impl Default for Cod {
    fn default() -> Self {
        Self {
            use_sop: false,
            use_eph: false,
            progression: ProgressionOrder::Lrcp,
            num_layers: 1,
            mct: false,
            levels: 5,
            cblk_w_exp: 6,
            cblk_h_exp: 6,
            cblk_style: 0,
            reversible: true,
            precincts: Vec::new(),
        }
    }
}

/// QCD / QCC marker contents.
#[derive(Debug, Clone, Default)]
pub struct Qcd {
    /// 0 = none (reversible), 1 = scalar derived, 2 = scalar expounded.
    pub style: u8,
    pub guard_bits: u8,
    pub steps: Vec<StepSize>,
}

impl Qcd {
    /// Step entry for a subband, resolving the derived-style rule
    /// (one signalled step, per-band exponents offset by level).
    pub fn band_step(&self, band_index: usize, level: u8, levels: u8) -> Result<StepSize, CodecError> {
        match self.style {
            1 => {
                let base = self.steps.first().ok_or(CodecError::InvalidQcdSegment)?;
                let exponent = base
                    .exponent
                    .saturating_sub(levels.saturating_sub(level));
                Ok(StepSize {
                    exponent,
                    mantissa: base.mantissa,
                })
            }
            _ => self
                .steps
                .get(band_index)
                .copied()
                .ok_or(CodecError::InvalidQcdSegment),
        }
    }
}

/// A progression change from POC (single-tile subset of the marker).
#[derive(Debug, Clone, Copy)]
pub struct PocChange {
    pub res_start: u8,
    pub comp_start: u16,
    pub layer_end: u16,
    pub res_end: u8,
    pub comp_end: u16,
    pub progression: ProgressionOrder,
}

/// Opaque Part-2 multi-component marker carried through unchanged.
#[derive(Debug, Clone)]
pub struct Part2Mct {
    pub marker: u8,
    pub payload: Vec<u8>,
}

/// Everything gathered from the main header.
#[derive(Debug, Clone, Default)]
pub struct MainHeader {
    pub siz: Siz,
    pub cod: Option<Cod>,
    pub qcd: Option<Qcd>,
    /// COC / QCC overrides by component index.
    pub coc: Vec<(u16, Cod)>,
    pub qcc: Vec<(u16, Qcd)>,
    pub poc: Vec<PocChange>,
    pub comments: Vec<Vec<u8>>,
    pub mct_segments: Vec<Part2Mct>,
    /// Hoisted packet headers from PPM, concatenated in Zppm order.
    pub packed_headers: Vec<u8>,
}

impl MainHeader {
    pub fn cod_for(&self, component: usize) -> Result<&Cod, CodecError> {
        if let Some((_, cod)) = self.coc.iter().find(|(c, _)| *c as usize == component) {
            return Ok(cod);
        }
        self.cod.as_ref().ok_or(CodecError::InvalidCodSegment)
    }

    pub fn qcd_for(&self, component: usize) -> Result<&Qcd, CodecError> {
        if let Some((_, qcd)) = self.qcc.iter().find(|(c, _)| *c as usize == component) {
            return Ok(qcd);
        }
        self.qcd.as_ref().ok_or(CodecError::InvalidQcdSegment)
    }
}

/// One parsed tile-part: SOT fields plus the bitstream bytes after SOD.
#[derive(Debug, Clone)]
pub struct TilePart {
    pub tile_index: u16,
    pub part_index: u8,
    pub num_parts: u8,
    pub data: Vec<u8>,
    /// Hoisted packet headers from PPT markers in this tile-part.
    pub packed_headers: Vec<u8>,
}

/// Dimensions of one subband.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BandGeometry {
    /// 0 = LL, 1 = HL, 2 = LH, 3 = HH.
    pub orientation: usize,
    /// Decomposition level the band belongs to (LL carries `levels`).
    pub level: u8,
    pub width: usize,
    pub height: usize,
}

/// Subbands present in resolution `resolution` of an image of the given
/// size decomposed `levels` times, in packet order (LL alone at resolution
/// 0; HL, LH, HH above).
pub fn resolution_bands(
    width: usize,
    height: usize,
    levels: u8,
    resolution: u8,
) -> Vec<BandGeometry> {
    // Walk the ceil/floor split down to the level of interest, mirroring
    // the DWT driver so geometry and coefficients always agree.
    let (mut w, mut h) = (width, height);
    let mut splits = Vec::with_capacity(levels as usize);
    for _ in 0..levels {
        let ll_w = w.div_ceil(2);
        let ll_h = h.div_ceil(2);
        splits.push((w - ll_w, h - ll_h, ll_w, ll_h));
        w = ll_w;
        h = ll_h;
    }
    if resolution == 0 {
        return vec![BandGeometry {
            orientation: 0,
            level: levels,
            width: w,
            height: h,
        }];
    }
    let level = levels - resolution + 1;
    let (hi_w, hi_h, lo_w, lo_h) = splits[level as usize - 1];
    vec![
        BandGeometry {
            orientation: 1,
            level,
            width: hi_w,
            height: lo_h,
        },
        BandGeometry {
            orientation: 2,
            level,
            width: lo_w,
            height: hi_h,
        },
        BandGeometry {
            orientation: 3,
            level,
            width: hi_w,
            height: hi_h,
        },
    ]
}

/// Code-block grid over a band: (columns, rows).
pub fn codeblock_grid(band: &BandGeometry, cblk_w_exp: u8, cblk_h_exp: u8) -> (usize, usize) {
    if band.width == 0 || band.height == 0 {
        return (0, 0);
    }
    (
        band.width.div_ceil(1 << cblk_w_exp),
        band.height.div_ceil(1 << cblk_h_exp),
    )
}

/// Index of a band inside the QCD step list: LL first, then per level from
/// the shallowest resolution up (HL, LH, HH), i.e. reverse scanning order
/// with LL_N first.
pub fn band_step_index(levels: u8, band: &BandGeometry) -> usize {
    if band.orientation == 0 {
        0
    } else {
        let resolution = levels - band.level + 1;
        1 + (resolution as usize - 1) * 3 + (band.orientation - 1)
    }
}
