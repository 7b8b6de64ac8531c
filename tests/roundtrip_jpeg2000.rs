//! End-to-end JPEG 2000 scenarios through the codec facade.

use nanorand::{Rng, WyRand};

use jpegmed_rs::codec::{CodecRegistry, PixelDataCodec};
use jpegmed_rs::parameters::{CodecParameters, Jpeg2000Parameters};
use jpegmed_rs::pixel_data::{PixelDataBuffer, PixelDataObject};
use jpegmed_rs::{FrameInfo, PhotometricInterpretation};

fn frame_info(width: u32, height: u32, comps: u16, bits: u16, signed: bool) -> FrameInfo {
    FrameInfo {
        width,
        height,
        samples_per_pixel: comps,
        bits_allocated: if bits > 8 { 16 } else { 8 },
        bits_stored: bits,
        high_bit: bits - 1,
        pixel_representation: if signed { 1 } else { 0 },
        planar_configuration: 0,
        photometric_interpretation: if comps == 3 {
            PhotometricInterpretation::Rgb
        } else {
            PhotometricInterpretation::Monochrome2
        },
    }
}

fn j2k_params(f: impl FnOnce(&mut Jpeg2000Parameters)) -> CodecParameters {
    let mut params = Jpeg2000Parameters::default();
    f(&mut params);
    CodecParameters::Jpeg2000(params)
}

fn transcode(
    codec: &dyn PixelDataCodec,
    info: FrameInfo,
    pixels: &[u8],
    params: &CodecParameters,
) -> (Vec<u8>, Vec<u8>) {
    let source = PixelDataBuffer::with_frames(info, vec![pixels.to_vec()]);
    let mut encoded = PixelDataBuffer::new(info);
    codec.encode(&source, &mut encoded, params).unwrap();
    let stream = encoded.frame(0).unwrap().to_vec();
    let mut decoded = PixelDataBuffer::new(info);
    codec.decode(&encoded, &mut decoded, params).unwrap();
    (stream, decoded.frame(0).unwrap().to_vec())
}

#[test]
fn lossless_ramp_roundtrips_and_compresses() {
    let registry = CodecRegistry::with_defaults();
    let codec = registry.get("1.2.840.10008.1.2.4.90").unwrap();
    let info = frame_info(16, 16, 1, 8, false);
    let pixels: Vec<u8> = (0..=255).collect();
    let params = j2k_params(|p| {
        p.irreversible = false;
        p.num_levels = 3;
    });
    let (stream, decoded) = transcode(codec.as_ref(), info, &pixels, &params);
    assert_eq!(decoded, pixels);
    assert!(stream.len() < pixels.len(), "{} bytes", stream.len());
}

#[test]
fn lossy_gradient_high_rate_is_nearly_exact() {
    let registry = CodecRegistry::with_defaults();
    let codec = registry.get("1.2.840.10008.1.2.4.91").unwrap();
    let info = frame_info(64, 64, 1, 8, false);
    let mut pixels = vec![0u8; 64 * 64];
    for y in 0..64usize {
        for x in 0..64usize {
            pixels[y * 64 + x] = ((x + y * 2) % 256) as u8;
        }
    }
    let params = j2k_params(|p| {
        p.rate = 100;
        p.num_levels = 5;
        p.allow_mct = false;
    });
    let (_, decoded) = transcode(codec.as_ref(), info, &pixels, &params);
    for (i, (&a, &b)) in pixels.iter().zip(&decoded).enumerate() {
        assert!(
            (a as i32 - b as i32).abs() <= 3,
            "pixel {i}: {a} vs {b}"
        );
    }
}

#[test]
fn lossy_mse_is_monotonic_in_rate() {
    let registry = CodecRegistry::with_defaults();
    let codec = registry.get("1.2.840.10008.1.2.4.91").unwrap();
    let info = frame_info(128, 128, 1, 8, false);
    let mut pixels = vec![0u8; 128 * 128];
    for y in 0..128usize {
        for x in 0..128usize {
            pixels[y * 128 + x] = ((x * y) % 256) as u8;
        }
    }
    let mut mses = Vec::new();
    for rate in [20u32, 40, 60, 80, 95] {
        let params = j2k_params(|p| p.rate = rate);
        let (_, decoded) = transcode(codec.as_ref(), info, &pixels, &params);
        let mse: f64 = pixels
            .iter()
            .zip(&decoded)
            .map(|(&a, &b)| {
                let d = a as f64 - b as f64;
                d * d
            })
            .sum::<f64>()
            / pixels.len() as f64;
        mses.push((rate, mse));
    }
    for pair in mses.windows(2) {
        let (low_rate, high_mse) = pair[0];
        let (high_rate, low_mse) = pair[1];
        let slack = if high_rate > 90 { 1.10 } else { 1.0 };
        assert!(
            low_mse <= high_mse * slack + 1e-9,
            "MSE rose from rate {low_rate} ({high_mse}) to {high_rate} ({low_mse})"
        );
    }
}

#[test]
fn rgb_lossless_with_mct_roundtrips() {
    let registry = CodecRegistry::with_defaults();
    let codec = registry.get("1.2.840.10008.1.2.4.90").unwrap();
    let info = frame_info(32, 32, 3, 8, false);
    let mut pixels = vec![0u8; 32 * 32 * 3];
    for y in 0..32usize {
        for x in 0..32usize {
            let i = (y * 32 + x) * 3;
            pixels[i] = (x * 8) as u8;
            pixels[i + 1] = (y * 8) as u8;
            pixels[i + 2] = ((x + y) * 4) as u8;
        }
    }
    let params = j2k_params(|p| {
        p.irreversible = false;
        p.allow_mct = true;
        p.num_levels = 3;
    });
    let (_, decoded) = transcode(codec.as_ref(), info, &pixels, &params);
    assert_eq!(decoded, pixels);
}

#[test]
fn multi_component_syntax_roundtrips_lossless() {
    let registry = CodecRegistry::with_defaults();
    let codec = registry.get("1.2.840.10008.1.2.4.93").unwrap();
    let info = frame_info(16, 16, 3, 8, false);
    let pixels: Vec<u8> = (0..16 * 16 * 3).map(|i| (i % 256) as u8).collect();
    let params = j2k_params(|p| {
        p.irreversible = false;
        p.num_levels = 2;
        p.allow_mct = true;
    });
    let (_, decoded) = transcode(codec.as_ref(), info, &pixels, &params);
    assert_eq!(decoded, pixels);
}

#[test]
fn randomized_lossless_dimensions_and_depths() {
    let registry = CodecRegistry::with_defaults();
    let codec = registry.get("1.2.840.10008.1.2.4.90").unwrap();
    let mut rng = WyRand::new_seed(0xA11CE);
    for _ in 0..8 {
        let width = 8 + rng.generate_range(0..120u32);
        let height = 8 + rng.generate_range(0..120u32);
        let bits = [8u16, 12, 16][rng.generate_range(0..3usize)];
        let signed = bits > 8 && rng.generate::<u8>() & 1 == 1;
        let info = frame_info(width, height, 1, bits, signed);
        let bps = info.bytes_per_sample();
        let mask = if bits == 16 {
            0xFFFFu32
        } else {
            (1u32 << bits) - 1
        };
        let mut pixels = vec![0u8; (width * height) as usize * bps];
        for chunk in pixels.chunks_mut(bps) {
            let v = rng.generate::<u32>() & mask;
            if bps == 2 {
                chunk.copy_from_slice(&(v as u16).to_le_bytes());
            } else {
                chunk[0] = v as u8;
            }
        }
        let params = j2k_params(|p| {
            p.irreversible = false;
            p.num_levels = rng.generate_range(0..=4u8);
        });
        let (_, decoded) = transcode(codec.as_ref(), info, &pixels, &params);
        assert_eq!(
            decoded, pixels,
            "{width}x{height} bits={bits} signed={signed}"
        );
    }
}

#[test]
fn randomized_lossy_error_is_bounded_at_high_rate() {
    let registry = CodecRegistry::with_defaults();
    let codec = registry.get("1.2.840.10008.1.2.4.91").unwrap();
    let mut rng = WyRand::new_seed(0xB0B);
    for _ in 0..4 {
        let width = 16 + rng.generate_range(0..48u32);
        let height = 16 + rng.generate_range(0..48u32);
        let info = frame_info(width, height, 1, 8, false);
        // Smooth field: random low-frequency ramp plus small noise.
        let ax = rng.generate_range(0..4u32) as i32;
        let ay = rng.generate_range(0..4u32) as i32;
        let mut pixels = vec![0u8; (width * height) as usize];
        for y in 0..height as usize {
            for x in 0..width as usize {
                let v = 60 + ax * x as i32 / 2 + ay * y as i32 / 2;
                pixels[y * width as usize + x] = v.clamp(0, 255) as u8;
            }
        }
        let params = j2k_params(|p| p.rate = 100);
        let (_, decoded) = transcode(codec.as_ref(), info, &pixels, &params);
        for (i, (&a, &b)) in pixels.iter().zip(&decoded).enumerate() {
            assert!((a as i32 - b as i32).abs() <= 3, "pixel {i}: {a} vs {b}");
        }
    }
}

#[test]
fn layered_encoding_roundtrips() {
    let registry = CodecRegistry::with_defaults();
    let codec = registry.get("1.2.840.10008.1.2.4.90").unwrap();
    let info = frame_info(48, 48, 1, 8, false);
    let pixels: Vec<u8> = (0..48 * 48).map(|i| (i * 5 % 256) as u8).collect();
    let params = j2k_params(|p| {
        p.irreversible = false;
        p.num_layers = 4;
        p.num_levels = 3;
    });
    let (_, decoded) = transcode(codec.as_ref(), info, &pixels, &params);
    assert_eq!(decoded, pixels);
}
