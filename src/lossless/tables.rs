//! Pre-built DC Huffman table specifications for the lossless codec.
//!
//! Three variants exist. The standard table is the Annex K luminance DC
//! table (categories 0-11), sufficient for samples of up to 11 bits. The
//! extended table covers every category up to 16 for deep data. The SV1
//! variant mirrors the table shipped by common selection-value-1 readers:
//! it omits categories 9, 10, 13 and 14, which is why the escalation
//! threshold differs between the two families (see `select_dc_table`).

use crate::huffman::HuffmanTable;

/// Annex K.3.1 luminance DC: categories 0-11.
pub const STD_DC_LENGTHS: [u8; 16] = [0, 1, 5, 1, 1, 1, 1, 1, 1, 0, 0, 0, 0, 0, 0, 0];
pub const STD_DC_VALUES: [u8; 12] = [0, 1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11];

/// Annex K.3.1 chrominance DC: categories 0-11, used as the second table
/// when a three-component frame carries two tables.
pub const STD_DC_CHROMA_LENGTHS: [u8; 16] = [0, 3, 1, 1, 1, 1, 1, 1, 1, 1, 1, 0, 0, 0, 0, 0];
pub const STD_DC_CHROMA_VALUES: [u8; 12] = [0, 1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11];

/// Extended table: all categories 0-16 for 12-16 bit residuals.
pub const EXT_DC_LENGTHS: [u8; 16] = [0, 1, 5, 1, 1, 1, 1, 1, 1, 1, 1, 1, 2, 0, 0, 0];
pub const EXT_DC_VALUES: [u8; 17] = [0, 1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11, 12, 13, 14, 15, 16];

/// Extended SV1 table: categories 0-16 without 9, 10, 13 and 14.
pub const EXT_SV1_DC_LENGTHS: [u8; 16] = [0, 1, 3, 2, 2, 1, 1, 1, 2, 0, 0, 0, 0, 0, 0, 0];
pub const EXT_SV1_DC_VALUES: [u8; 13] = [0, 1, 2, 3, 4, 5, 6, 7, 8, 11, 12, 15, 16];

/// Table specification as stored in a DHT segment.
#[derive(Debug, Clone, Copy)]
pub struct DcTableSpec {
    pub lengths: &'static [u8; 16],
    pub values: &'static [u8],
}

pub const STD_DC: DcTableSpec = DcTableSpec {
    lengths: &STD_DC_LENGTHS,
    values: &STD_DC_VALUES,
};

pub const STD_DC_CHROMA: DcTableSpec = DcTableSpec {
    lengths: &STD_DC_CHROMA_LENGTHS,
    values: &STD_DC_CHROMA_VALUES,
};

pub const EXT_DC: DcTableSpec = DcTableSpec {
    lengths: &EXT_DC_LENGTHS,
    values: &EXT_DC_VALUES,
};

pub const EXT_SV1_DC: DcTableSpec = DcTableSpec {
    lengths: &EXT_SV1_DC_LENGTHS,
    values: &EXT_SV1_DC_VALUES,
};

/// Pick the DC table for a scan from the pre-scanned maximum residual
/// category. The SV1 family escalates at category 9 because its own table
/// has holes from there on; the generic family escalates at 12.
pub fn select_dc_table(max_category: u8, sv1_family: bool, chroma: bool) -> DcTableSpec {
    if sv1_family {
        if max_category >= 9 {
            EXT_DC
        } else {
            EXT_SV1_DC
        }
    } else if max_category >= 12 {
        EXT_DC
    } else if chroma {
        STD_DC_CHROMA
    } else {
        STD_DC
    }
}

pub fn build(spec: DcTableSpec) -> HuffmanTable {
    // The built-in specifications are valid by construction.
    HuffmanTable::build(spec.lengths, spec.values).expect("built-in DC table spec")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_tables_are_valid_prefix_codes() {
        for spec in [STD_DC, STD_DC_CHROMA, EXT_DC, EXT_SV1_DC] {
            let table = HuffmanTable::build(spec.lengths, spec.values).unwrap();
            for &v in spec.values {
                assert!(table.code(v).length > 0, "missing code for category {v}");
            }
        }
    }

    #[test]
    fn sv1_table_omits_documented_categories() {
        let table = build(EXT_SV1_DC);
        for missing in [9u8, 10, 13, 14] {
            assert_eq!(table.code(missing).length, 0);
        }
        for present in [0u8, 8, 11, 12, 15, 16] {
            assert!(table.code(present).length > 0);
        }
    }

    #[test]
    fn escalation_thresholds() {
        assert!(std::ptr::eq(
            select_dc_table(8, true, false).values,
            EXT_SV1_DC.values
        ));
        assert!(std::ptr::eq(
            select_dc_table(9, true, false).values,
            EXT_DC.values
        ));
        assert!(std::ptr::eq(
            select_dc_table(11, false, false).values,
            STD_DC.values
        ));
        assert!(std::ptr::eq(
            select_dc_table(12, false, false).values,
            EXT_DC.values
        ));
    }
}
