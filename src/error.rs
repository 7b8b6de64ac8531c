use thiserror::Error;

/// Errors produced by the codecs in this crate.
///
/// The variants fall into four groups: caller parameter errors (detected
/// before any data is touched), codestream format errors (malformed or
/// truncated input), consistency errors (decoded stream disagrees with the
/// declared frame info) and destination/buffer errors. None of the codecs
/// panic on malformed input; every failure surfaces as one of these.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum CodecError {
    // Parameter errors
    #[error("Invalid parameter width")]
    InvalidParameterWidth,
    #[error("Invalid parameter height")]
    InvalidParameterHeight,
    #[error("Invalid parameter bits per sample")]
    InvalidParameterBitsPerSample,
    #[error("Invalid parameter component count")]
    InvalidParameterComponentCount,
    #[error("Invalid parameter predictor")]
    InvalidParameterPredictor,
    #[error("Invalid parameter decomposition levels")]
    InvalidParameterLevels,
    #[error("Invalid parameter layer count")]
    InvalidParameterLayers,
    #[error("Invalid parameter quantization steps")]
    InvalidParameterQuantization,
    #[error("Invalid parameter code-block size")]
    InvalidParameterCodeBlockSize,
    #[error("Source buffer too small for declared frame")]
    SourceTooSmall,
    #[error("Destination buffer too small")]
    DestinationTooSmall,

    // Codestream format errors
    #[error("Unexpected end of data")]
    UnexpectedEndOfData,
    #[error("Start of image marker not found")]
    StartOfImageMarkerNotFound,
    #[error("Start of codestream marker not found")]
    StartOfCodestreamNotFound,
    #[error("End of image marker not found")]
    EndOfImageMarkerNotFound,
    #[error("JPEG marker start byte not found")]
    JpegMarkerStartByteNotFound,
    #[error("Unknown standalone marker found")]
    UnknownStandaloneMarker,
    #[error("Invalid marker segment size")]
    InvalidMarkerSegmentSize,
    #[error("Duplicate start of frame marker")]
    DuplicateStartOfFrameMarker,
    #[error("Missing start of frame marker")]
    MissingStartOfFrameMarker,
    #[error("Unsupported start of frame type")]
    UnsupportedFrameType,
    #[error("Invalid Huffman table segment")]
    InvalidHuffmanTable,
    #[error("Invalid Huffman code in scan data")]
    InvalidHuffmanCode,
    #[error("Residual category exceeds Huffman table range")]
    ResidualCategoryOutOfRange,
    #[error("Component count mismatch between frame and scan headers")]
    ComponentCountMismatch,
    #[error("Predictor selection outside 1..7 in scan header")]
    InvalidPredictorSelection,
    #[error("Restart marker not found")]
    RestartMarkerNotFound,
    #[error("Invalid SIZ segment")]
    InvalidSizSegment,
    #[error("Invalid COD segment")]
    InvalidCodSegment,
    #[error("Invalid QCD segment")]
    InvalidQcdSegment,
    #[error("Invalid tile-part header")]
    InvalidTilePartHeader,
    #[error("Invalid packet header")]
    InvalidPacketHeader,
    #[error("Codestream feature not supported")]
    UnsupportedCodestream,

    // Consistency errors
    #[error("Decoded frame does not match declared frame info")]
    FrameInfoMismatch,
    #[error("Frame index out of range")]
    FrameIndexOutOfRange,

    // Registry / facade
    #[error("No codec registered for transfer syntax")]
    UnknownTransferSyntax,
    #[error("Parameter object does not match codec family")]
    ParameterFamilyMismatch,
    #[error("Invalid operation")]
    InvalidOperation,
}
