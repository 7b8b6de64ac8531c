//! Marker-level accounting of generated codestreams: every byte belongs to
//! exactly one marker, length field, segment payload or entropy-coded run,
//! and the canonical MQ table matches ISO/IEC 15444-1 Table C-2.

use jpegmed_rs::codec::{CodecRegistry, PixelDataCodec};
use jpegmed_rs::jpeg2000::mq_coder::qe_table_row;
use jpegmed_rs::parameters::{CodecParameters, Jpeg2000Parameters};
use jpegmed_rs::pixel_data::{PixelDataBuffer, PixelDataObject};
use jpegmed_rs::{FrameInfo, PhotometricInterpretation};

fn gray8(width: u32, height: u32) -> FrameInfo {
    FrameInfo {
        width,
        height,
        samples_per_pixel: 1,
        bits_allocated: 8,
        bits_stored: 8,
        high_bit: 7,
        pixel_representation: 0,
        planar_configuration: 0,
        photometric_interpretation: PhotometricInterpretation::Monochrome2,
    }
}

fn encode_lossy_64x64() -> Vec<u8> {
    let registry = CodecRegistry::with_defaults();
    let codec = registry.get("1.2.840.10008.1.2.4.91").unwrap();
    let info = gray8(64, 64);
    let mut pixels = vec![0u8; 64 * 64];
    for y in 0..64usize {
        for x in 0..64usize {
            pixels[y * 64 + x] = ((x + y * 2) % 256) as u8;
        }
    }
    let params = CodecParameters::Jpeg2000(Jpeg2000Parameters {
        rate: 100,
        ..Default::default()
    });
    let source = PixelDataBuffer::with_frames(info, vec![pixels]);
    let mut encoded = PixelDataBuffer::new(info);
    codec.encode(&source, &mut encoded, &params).unwrap();
    encoded.frame(0).unwrap().to_vec()
}

/// Walk the codestream marker by marker, validating structure counts and
/// that segment lengths line up with their payloads.
#[test]
fn codestream_has_exactly_one_of_each_required_marker() {
    let stream = encode_lossy_64x64();
    assert_eq!(&stream[..2], &[0xFF, 0x4F], "SOC first");

    let mut pos = 2usize;
    let mut counts = std::collections::BTreeMap::new();
    let mut in_tile = false;
    loop {
        assert!(pos + 2 <= stream.len(), "ran off the stream at {pos}");
        assert_eq!(stream[pos], 0xFF, "marker expected at {pos}");
        let code = stream[pos + 1];
        *counts.entry(code).or_insert(0usize) += 1;
        pos += 2;
        match code {
            0xD9 => {
                assert_eq!(pos, stream.len(), "EOC must terminate the stream");
                break;
            }
            0x93 => {
                // SOD: the tile data runs to EOC (single tile-part stream).
                in_tile = true;
                let eoc = stream.len() - 2;
                assert_eq!(&stream[eoc..], &[0xFF, 0xD9]);
                pos = eoc;
            }
            0x90 => {
                // SOT: fixed 10-byte segment; Psot spans to EOC here.
                let lsot = u16::from_be_bytes([stream[pos], stream[pos + 1]]) as usize;
                assert_eq!(lsot, 10);
                let psot = u32::from_be_bytes([
                    stream[pos + 4],
                    stream[pos + 5],
                    stream[pos + 6],
                    stream[pos + 7],
                ]) as usize;
                assert_eq!(pos - 2 + psot, stream.len() - 2, "Psot accounts for the tile");
                pos += lsot;
            }
            _ => {
                assert!(!in_tile, "unexpected marker inside tile data");
                let length = u16::from_be_bytes([stream[pos], stream[pos + 1]]) as usize;
                assert!(length >= 2, "segment length must include itself");
                assert!(pos + length <= stream.len(), "segment overruns stream");
                pos += length;
            }
        }
    }

    assert_eq!(counts.get(&0x51), Some(&1), "one SIZ");
    assert_eq!(counts.get(&0x52), Some(&1), "one COD");
    assert_eq!(counts.get(&0x5C), Some(&1), "one QCD");
    assert_eq!(counts.get(&0x90), Some(&1), "one SOT");
    assert_eq!(counts.get(&0x93), Some(&1), "one SOD");
    assert_eq!(counts.get(&0xD9), Some(&1), "one EOC");
}

#[test]
fn lossless_stream_declares_reversible_transform() {
    let registry = CodecRegistry::with_defaults();
    let codec = registry.get("1.2.840.10008.1.2.4.90").unwrap();
    let info = gray8(16, 16);
    let pixels: Vec<u8> = (0..=255).collect();
    let source = PixelDataBuffer::with_frames(info, vec![pixels]);
    let mut encoded = PixelDataBuffer::new(info);
    codec
        .encode(&source, &mut encoded, &codec.default_parameters())
        .unwrap();
    let stream = encoded.frame(0).unwrap();

    // Find COD and check the SPcod transform byte (offset 11 into the
    // segment: len(2) Scod(1) SGcod(4) levels(1) cbw(1) cbh(1) style(1)).
    let cod = stream.windows(2).position(|w| w == [0xFF, 0x52]).unwrap();
    assert_eq!(stream[cod + 2 + 11], 1, "reversible 5/3 transform");
    // QCD style byte: low five bits 0 (no quantization).
    let qcd = stream.windows(2).position(|w| w == [0xFF, 0x5C]).unwrap();
    assert_eq!(stream[qcd + 4] & 0x1F, 0);
}

#[test]
fn mq_state_table_matches_iso_table_c2() {
    // (Qe, NMPS, NLPS, SWITCH) spot rows plus full switch/terminal rows,
    // per ISO/IEC 15444-1 Table C-2.
    let expected: [(usize, (u16, u8, u8, u8)); 10] = [
        (0, (0x5601, 1, 1, 1)),
        (5, (0x0221, 38, 33, 0)),
        (6, (0x5601, 7, 6, 1)),
        (13, (0x1601, 29, 21, 0)),
        (14, (0x5601, 15, 14, 1)),
        (28, (0x1201, 29, 24, 0)),
        (39, (0x0085, 40, 35, 0)),
        (45, (0x0001, 45, 41, 0)),
        (46, (0x5601, 46, 46, 0)),
        (30, (0x0AC1, 31, 26, 0)),
    ];
    for (index, row) in expected {
        assert_eq!(qe_table_row(index), row, "state {index}");
    }
    // Qe values decrease towards the terminal states within the main chain.
    let (qe_16, ..) = qe_table_row(16);
    let (qe_40, ..) = qe_table_row(40);
    assert!(qe_16 > qe_40);
}
