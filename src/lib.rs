/*!
# jpegmed-rs

`jpegmed-rs` is a pure Rust library implementing the DICOM pixel-data codecs
for JPEG Lossless (ITU-T T.81 process 14) and JPEG 2000 Part 1
(ISO/IEC 15444-1), plus the Part 2 multi-component pass-through flavour.

## Supported transfer syntaxes

| UID | Codec |
|-----|-------|
| `1.2.840.10008.1.2.4.57` | JPEG Lossless, Non-Hierarchical (Process 14) |
| `1.2.840.10008.1.2.4.70` | JPEG Lossless SV1 (fixed predictor 1) |
| `1.2.840.10008.1.2.4.90` | JPEG 2000 Lossless Only (reversible 5/3) |
| `1.2.840.10008.1.2.4.91` | JPEG 2000 (irreversible 9/7) |
| `1.2.840.10008.1.2.4.93` | JPEG 2000 Part 2 Multi-component |

## Usage

```no_run
use jpegmed_rs::codec::CodecRegistry;
use jpegmed_rs::pixel_data::PixelDataBuffer;
use jpegmed_rs::{FrameInfo, PhotometricInterpretation};

let registry = CodecRegistry::with_defaults();
let codec = registry.get("1.2.840.10008.1.2.4.90").unwrap();
let info = FrameInfo {
    width: 512,
    height: 512,
    samples_per_pixel: 1,
    bits_allocated: 16,
    bits_stored: 12,
    high_bit: 11,
    pixel_representation: 0,
    planar_configuration: 0,
    photometric_interpretation: PhotometricInterpretation::Monochrome2,
};
let source = PixelDataBuffer::with_frames(info, vec![vec![0u8; 512 * 512 * 2]]);
let mut encoded = PixelDataBuffer::new(info);
codec.encode(&source, &mut encoded, &codec.default_parameters()).unwrap();
```

Encoding and decoding are pure functions over frame bytes; there is no
global state beyond an explicitly constructed [`codec::CodecRegistry`].
*/

pub mod codec;
pub mod error;
pub mod huffman;
pub mod jpeg2000;
pub mod jpeg_marker_code;
pub mod jpeg_stream_reader;
pub mod jpeg_stream_writer;
pub mod lossless;
pub mod parameters;
pub mod pixel_data;
pub mod transfer_syntax;

pub use error::CodecError;

use error::CodecError as Error;

/// DICOM photometric interpretation hint carried in the frame info.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PhotometricInterpretation {
    Monochrome1,
    #[default]
    Monochrome2,
    PaletteColor,
    Rgb,
    YbrFull,
    YbrFull422,
    YbrIct,
    YbrRct,
}

/// Geometry and sample format of the frames in a pixel-data object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FrameInfo {
    pub width: u32,
    pub height: u32,
    /// 1 (grayscale) or 3 (color).
    pub samples_per_pixel: u16,
    /// Container size per sample: 8 or 16.
    pub bits_allocated: u16,
    /// Stored precision P, 2-16.
    pub bits_stored: u16,
    /// Index of the most significant stored bit (P - 1).
    pub high_bit: u16,
    /// 0 = unsigned, 1 = two's-complement signed.
    pub pixel_representation: u16,
    /// 0 = interleaved (RGBRGB...), 1 = planar (RRR...GGG...BBB...).
    pub planar_configuration: u16,
    pub photometric_interpretation: PhotometricInterpretation,
}

impl FrameInfo {
    pub fn bytes_per_sample(&self) -> usize {
        (self.bits_allocated as usize).div_ceil(8)
    }

    pub fn frame_size_bytes(&self) -> usize {
        self.width as usize
            * self.height as usize
            * self.samples_per_pixel as usize
            * self.bytes_per_sample()
    }

    /// Representable sample value range.
    pub fn sample_range(&self) -> (i32, i32) {
        if self.pixel_representation == 1 {
            (
                -(1i32 << (self.bits_stored - 1)),
                (1i32 << (self.bits_stored - 1)) - 1,
            )
        } else {
            (0, (1i32 << self.bits_stored) - 1)
        }
    }

    pub fn validate(&self) -> Result<(), Error> {
        if self.width == 0 {
            return Err(Error::InvalidParameterWidth);
        }
        if self.height == 0 {
            return Err(Error::InvalidParameterHeight);
        }
        if self.samples_per_pixel != 1 && self.samples_per_pixel != 3 {
            return Err(Error::InvalidParameterComponentCount);
        }
        if !(2..=16).contains(&self.bits_stored)
            || (self.bits_allocated != 8 && self.bits_allocated != 16)
            || self.bits_stored > self.bits_allocated
        {
            return Err(Error::InvalidParameterBitsPerSample);
        }
        if self.high_bit != self.bits_stored - 1 {
            return Err(Error::InvalidParameterBitsPerSample);
        }
        Ok(())
    }
}
