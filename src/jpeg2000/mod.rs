//! JPEG 2000 Part 1 codestream engine (ISO/IEC 15444-1).
//!
//! - `mq_coder`: MQ arithmetic coder and the raw bypass packer (Annex C).
//! - `bit_io`: packet-header bit packing with the stuff-bit rule.
//! - `tag_tree`: inclusion / zero-bitplane tag trees (B.10.2).
//! - `dwt`: 5/3 reversible and 9/7 irreversible filter banks (Annex F).
//! - `quantization`: step derivation and dead-zone quantization (Annex E).
//! - `bit_plane_coder`: EBCOT Tier-1 three-pass coding (Annex D).
//! - `packet`: Tier-2 packet headers and progression orders (Annex B).
//! - `image` / `writer` / `parser`: codestream object model and markers.
//! - `mct`: level shift, RCT and ICT (Annex G).
//! - `encoder` / `decoder`: the tile pipelines.

pub mod bit_io;
pub mod bit_plane_coder;
pub mod decoder;
pub mod dwt;
pub mod encoder;
pub mod image;
pub mod mct;
pub mod mq_coder;
pub mod packet;
pub mod parser;
pub mod quantization;
pub mod tag_tree;
pub mod writer;

pub use decoder::{DecodedImage, J2kDecoder};
pub use encoder::J2kEncoder;
pub use packet::ProgressionOrder;
