//! DICOM transfer-syntax identifiers handled by this crate.

use std::fmt;

/// A DICOM transfer-syntax UID.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TsUid(pub &'static str);

impl fmt::Display for TsUid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.0)
    }
}

/// JPEG Lossless, Non-Hierarchical (Process 14).
pub const JPEG_LOSSLESS_P14: TsUid = TsUid("1.2.840.10008.1.2.4.57");
/// JPEG Lossless, Non-Hierarchical, First-Order Prediction (Selection Value 1).
pub const JPEG_LOSSLESS_SV1: TsUid = TsUid("1.2.840.10008.1.2.4.70");
/// JPEG 2000 Image Compression (Lossless Only).
pub const JPEG_2000_LOSSLESS: TsUid = TsUid("1.2.840.10008.1.2.4.90");
/// JPEG 2000 Image Compression.
pub const JPEG_2000: TsUid = TsUid("1.2.840.10008.1.2.4.91");
/// JPEG 2000 Part 2 Multi-component Image Compression.
pub const JPEG_2000_MC: TsUid = TsUid("1.2.840.10008.1.2.4.93");
