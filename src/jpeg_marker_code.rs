use num_enum::TryFromPrimitive;

/// Marker codes used by the JPEG family codestreams handled in this crate.
///
/// Covers the ITU-T T.81 markers needed by the JPEG Lossless codec and the
/// ISO/IEC 15444-1 (plus the Part 2 multi-component extension) markers needed
/// by the JPEG 2000 codec. Every marker is the second byte of a big-endian
/// `0xFFxx` pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, TryFromPrimitive)]
#[repr(u8)]
pub enum JpegMarkerCode {
    /// SOF0: Baseline DCT frame (parsed only to reject it).
    StartOfFrameBaseline = 0xC0,
    /// SOF1: Extended sequential DCT frame (rejected).
    StartOfFrameExtended = 0xC1,
    /// SOF2: Progressive DCT frame (rejected).
    StartOfFrameProgressive = 0xC2,
    /// SOF3: Lossless (sequential) frame.
    StartOfFrameLossless = 0xC3,
    /// DHT: Define Huffman table(s).
    DefineHuffmanTable = 0xC4,

    /// RST0-RST7: Restart interval markers (standalone).
    Restart0 = 0xD0,
    Restart1 = 0xD1,
    Restart2 = 0xD2,
    Restart3 = 0xD3,
    Restart4 = 0xD4,
    Restart5 = 0xD5,
    Restart6 = 0xD6,
    Restart7 = 0xD7,

    /// SOI: Start of image (standalone).
    StartOfImage = 0xD8,
    /// EOI / EOC: End of image and end of codestream share the code point.
    EndOfImage = 0xD9,
    /// SOS: Start of scan.
    StartOfScan = 0xDA,
    /// DNL: Define number of lines.
    DefineNumberOfLines = 0xDC,
    /// DRI: Define restart interval.
    DefineRestartInterval = 0xDD,

    /// APP0-APP15: Application data segments, skipped on read.
    ApplicationData0 = 0xE0,
    ApplicationData1 = 0xE1,
    ApplicationData2 = 0xE2,
    ApplicationData3 = 0xE3,
    ApplicationData4 = 0xE4,
    ApplicationData5 = 0xE5,
    ApplicationData6 = 0xE6,
    ApplicationData7 = 0xE7,
    ApplicationData8 = 0xE8,
    ApplicationData9 = 0xE9,
    ApplicationData10 = 0xEA,
    ApplicationData11 = 0xEB,
    ApplicationData12 = 0xEC,
    ApplicationData13 = 0xED,
    ApplicationData14 = 0xEE,
    ApplicationData15 = 0xEF,

    /// COM: T.81 comment block.
    Comment = 0xFE,

    // ISO/IEC 15444-1 markers.
    /// SOC: Start of codestream (standalone).
    StartOfCodestream = 0x4F,
    /// CAP: Extended capabilities.
    Capability = 0x50,
    /// SIZ: Image and tile size.
    ImageAndTileSize = 0x51,
    /// COD: Coding style default.
    CodingStyleDefault = 0x52,
    /// COC: Coding style component.
    CodingStyleComponent = 0x53,
    /// TLM: Tile-part lengths (main header).
    TilePartLengths = 0x55,
    /// PLM: Packet lengths (main header).
    PacketLengthMain = 0x57,
    /// PLT: Packet lengths (tile-part header).
    PacketLengthTile = 0x58,
    /// QCD: Quantization default.
    QuantizationDefault = 0x5C,
    /// QCC: Quantization component.
    QuantizationComponent = 0x5D,
    /// RGN: Region of interest.
    RegionOfInterest = 0x5E,
    /// POC: Progression order change.
    ProgressionOrderChange = 0x5F,
    /// PPM: Packed packet headers, main header.
    PackedPacketHeadersMain = 0x60,
    /// PPT: Packed packet headers, tile-part header.
    PackedPacketHeadersTile = 0x61,
    /// CRG: Component registration.
    ComponentRegistration = 0x63,
    /// COM (J2K): Codestream comment.
    J2kComment = 0x64,
    /// MCT: Multiple component transform definition (Part 2, pass-through).
    MultipleComponentTransform = 0x74,
    /// MCC: Multiple component collection (Part 2, pass-through).
    MultipleComponentCollection = 0x75,
    /// MCO: Multiple component ordering (Part 2, pass-through).
    MultipleComponentOrdering = 0x77,
    /// SOT: Start of tile-part.
    StartOfTile = 0x90,
    /// SOP: Start of packet.
    StartOfPacket = 0x91,
    /// EPH: End of packet header (standalone).
    EndOfPacketHeader = 0x92,
    /// SOD: Start of data (standalone).
    StartOfData = 0x93,
}

impl JpegMarkerCode {
    /// Markers that are not followed by a length field.
    pub fn is_standalone(self) -> bool {
        matches!(
            self,
            Self::StartOfImage
                | Self::EndOfImage
                | Self::StartOfCodestream
                | Self::StartOfData
                | Self::EndOfPacketHeader
                | Self::Restart0
                | Self::Restart1
                | Self::Restart2
                | Self::Restart3
                | Self::Restart4
                | Self::Restart5
                | Self::Restart6
                | Self::Restart7
        )
    }

    /// True for the RST0-RST7 range.
    pub fn is_restart(self) -> bool {
        (Self::Restart0 as u8..=Self::Restart7 as u8).contains(&(self as u8))
    }
}

/// Code points that are standalone by construction even when the marker byte
/// itself is unknown to this crate (ISO/IEC 15444-1 reserves 0xFF30-0xFF3F
/// for markers without a segment).
pub fn is_reserved_standalone(marker_byte: u8) -> bool {
    (0x30..=0x3F).contains(&marker_byte)
}

pub const JPEG_MARKER_START_BYTE: u8 = 0xFF;
pub const JPEG_RESTART_MARKER_BASE: u8 = 0xD0;
pub const JPEG_RESTART_MARKER_RANGE: u8 = 8;
