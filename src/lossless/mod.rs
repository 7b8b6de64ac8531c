//! JPEG Lossless (ISO/IEC 10918-1 / ITU-T T.81, process 14).
//!
//! Predictive coding with the seven H.1 selection values and
//! category-Huffman residuals. The encoder emits SOI, SOF3, DHT, SOS,
//! the stuffed residual stream and EOI; the decoder mirrors it, including
//! restart intervals and multi-scan streams produced by other encoders.

pub mod decoder;
pub mod encoder;
pub mod predictor;
pub mod tables;

pub use decoder::{DecodedFrame, LosslessDecoder};
pub use encoder::LosslessEncoder;
