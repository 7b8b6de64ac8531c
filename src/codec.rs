//! Codec facade and transfer-syntax registry.
//!
//! One codec instance per supported transfer syntax. The registry is built
//! explicitly (`CodecRegistry::with_defaults`); nothing registers itself by
//! module-load side effects. Codecs iterate the collaborator's frames,
//! transcode each one and append the result to the destination collaborator.

use std::collections::HashMap;
use std::sync::Arc;

use crate::error::CodecError;
use crate::jpeg2000::{J2kDecoder, J2kEncoder};
use crate::lossless::{LosslessDecoder, LosslessEncoder};
use crate::parameters::{CodecParameters, Jpeg2000Parameters, LosslessParameters};
use crate::pixel_data::{pack_planes_raw, PixelDataObject};
use crate::transfer_syntax::{
    TsUid, JPEG_2000, JPEG_2000_LOSSLESS, JPEG_2000_MC, JPEG_LOSSLESS_P14, JPEG_LOSSLESS_SV1,
};
use crate::FrameInfo;

/// A pixel-data codec bound to one DICOM transfer syntax.
pub trait PixelDataCodec: Send + Sync {
    fn name(&self) -> &'static str;
    fn transfer_syntax(&self) -> TsUid;
    fn default_parameters(&self) -> CodecParameters;
    fn encode(
        &self,
        source: &dyn PixelDataObject,
        destination: &mut dyn PixelDataObject,
        parameters: &CodecParameters,
    ) -> Result<(), CodecError>;
    fn decode(
        &self,
        source: &dyn PixelDataObject,
        destination: &mut dyn PixelDataObject,
        parameters: &CodecParameters,
    ) -> Result<(), CodecError>;
}

fn worst_case_frame_size(info: &FrameInfo) -> usize {
    let raw = info.frame_size_bytes();
    raw * 6 + (1 << 16)
}

/// JPEG Lossless (process 14) codec, both the generic and the SV1 flavour.
pub struct JpegLosslessCodec {
    transfer_syntax: TsUid,
    sv1: bool,
}

impl JpegLosslessCodec {
    pub fn process14() -> Self {
        Self {
            transfer_syntax: JPEG_LOSSLESS_P14,
            sv1: false,
        }
    }

    pub fn sv1() -> Self {
        Self {
            transfer_syntax: JPEG_LOSSLESS_SV1,
            sv1: true,
        }
    }

    /// Resolve the effective selection value. SV1 is fixed to 1. For the
    /// generic process-14 syntax, auto-selection is forced to 1 by default
    /// for compatibility with SV1-only readers; `strict_predictor` restores
    /// true auto-selection (0 passes through to the encoder's SSE search).
    fn resolve_predictor(&self, params: &LosslessParameters) -> u8 {
        if self.sv1 {
            return 1;
        }
        match params.predictor {
            0 if !params.strict_predictor => 1,
            p => p,
        }
    }
}

impl PixelDataCodec for JpegLosslessCodec {
    fn name(&self) -> &'static str {
        if self.sv1 {
            "JPEG Lossless SV1"
        } else {
            "JPEG Lossless Process 14"
        }
    }

    fn transfer_syntax(&self) -> TsUid {
        self.transfer_syntax.clone()
    }

    fn default_parameters(&self) -> CodecParameters {
        CodecParameters::JpegLossless(LosslessParameters::default())
    }

    fn encode(
        &self,
        source: &dyn PixelDataObject,
        destination: &mut dyn PixelDataObject,
        parameters: &CodecParameters,
    ) -> Result<(), CodecError> {
        let mut params = match parameters {
            CodecParameters::JpegLossless(p) => p.clone(),
            _ => return Err(CodecError::ParameterFamilyMismatch),
        };
        params.validate();
        let info = source.frame_info();
        info.validate()?;
        let encoder = LosslessEncoder::new(self.resolve_predictor(&params), self.sv1);
        let mut buffer = vec![0u8; worst_case_frame_size(&info)];
        for index in 0..source.frame_count() {
            let frame = source.frame(index)?;
            let len = encoder.encode(frame, &info, &mut buffer)?;
            destination.add_frame(buffer[..len].to_vec())?;
        }
        Ok(())
    }

    fn decode(
        &self,
        source: &dyn PixelDataObject,
        destination: &mut dyn PixelDataObject,
        parameters: &CodecParameters,
    ) -> Result<(), CodecError> {
        if !matches!(parameters, CodecParameters::JpegLossless(_)) {
            return Err(CodecError::ParameterFamilyMismatch);
        }
        let info = source.frame_info();
        info.validate()?;
        for index in 0..source.frame_count() {
            let frame = source.frame(index)?;
            let decoded = LosslessDecoder::new(frame).decode()?;
            if decoded.width != info.width as usize
                || decoded.height != info.height as usize
                || decoded.planes.len() != info.samples_per_pixel as usize
                || decoded.precision != info.bits_stored as u8
            {
                return Err(CodecError::FrameInfoMismatch);
            }
            destination.add_frame(pack_planes_raw(&decoded.planes, &info)?)?;
        }
        Ok(())
    }
}

/// JPEG 2000 codec in its three DICOM flavours.
pub struct Jpeg2000Codec {
    transfer_syntax: TsUid,
    lossless_only: bool,
    part2: bool,
}

impl Jpeg2000Codec {
    pub fn lossless() -> Self {
        Self {
            transfer_syntax: JPEG_2000_LOSSLESS,
            lossless_only: true,
            part2: false,
        }
    }

    pub fn lossy() -> Self {
        Self {
            transfer_syntax: JPEG_2000,
            lossless_only: false,
            part2: false,
        }
    }

    pub fn multi_component() -> Self {
        Self {
            transfer_syntax: JPEG_2000_MC,
            lossless_only: false,
            part2: true,
        }
    }

    fn build_encoder(&self, params: &Jpeg2000Parameters) -> J2kEncoder {
        let reversible = self.lossless_only || !params.irreversible;
        J2kEncoder {
            reversible,
            rate: params.rate.clamp(1, 100) as u8,
            num_levels: params.num_levels,
            num_layers: params.num_layers,
            allow_mct: params.allow_mct,
            target_ratio: if reversible { 0.0 } else { params.target_ratio },
            quant_step_scale: params.quant_step_scale,
            subband_steps: params.subband_steps.clone(),
            rate_levels: params.rate_levels.clone(),
            ..Default::default()
        }
    }
}

impl PixelDataCodec for Jpeg2000Codec {
    fn name(&self) -> &'static str {
        if self.part2 {
            "JPEG 2000 Part 2 Multi-component"
        } else if self.lossless_only {
            "JPEG 2000 Lossless Only"
        } else {
            "JPEG 2000"
        }
    }

    fn transfer_syntax(&self) -> TsUid {
        self.transfer_syntax.clone()
    }

    fn default_parameters(&self) -> CodecParameters {
        let mut params = Jpeg2000Parameters::default();
        if self.lossless_only {
            params.irreversible = false;
        }
        CodecParameters::Jpeg2000(params)
    }

    fn encode(
        &self,
        source: &dyn PixelDataObject,
        destination: &mut dyn PixelDataObject,
        parameters: &CodecParameters,
    ) -> Result<(), CodecError> {
        let mut params = match parameters {
            CodecParameters::Jpeg2000(p) => p.clone(),
            _ => return Err(CodecError::ParameterFamilyMismatch),
        };
        params.validate();
        let info = source.frame_info();
        info.validate()?;
        let encoder = self.build_encoder(&params);
        let mut buffer = vec![0u8; worst_case_frame_size(&info)];
        for index in 0..source.frame_count() {
            let frame = source.frame(index)?;
            let len = encoder.encode(frame, &info, &mut buffer)?;
            destination.add_frame(buffer[..len].to_vec())?;
        }
        Ok(())
    }

    fn decode(
        &self,
        source: &dyn PixelDataObject,
        destination: &mut dyn PixelDataObject,
        parameters: &CodecParameters,
    ) -> Result<(), CodecError> {
        if !matches!(parameters, CodecParameters::Jpeg2000(_)) {
            return Err(CodecError::ParameterFamilyMismatch);
        }
        let info = source.frame_info();
        info.validate()?;
        for index in 0..source.frame_count() {
            let frame = source.frame(index)?;
            let image = J2kDecoder::decode(frame)?;
            if image.width != info.width as usize
                || image.height != info.height as usize
                || image.components.len() != info.samples_per_pixel as usize
                || image
                    .components
                    .iter()
                    .any(|c| c.precision != info.bits_stored as u8)
            {
                return Err(CodecError::FrameInfoMismatch);
            }
            destination.add_frame(crate::pixel_data::pack_planes(&image.planes, &info)?)?;
        }
        Ok(())
    }
}

/// Process-wide mapping from transfer-syntax UID to codec. Populate once at
/// startup; lookups only after that.
#[derive(Default)]
pub struct CodecRegistry {
    codecs: HashMap<TsUid, Arc<dyn PixelDataCodec>>,
}

impl CodecRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with every codec this crate implements.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        register_default_codecs(&mut registry);
        registry
    }

    pub fn register(&mut self, codec: Arc<dyn PixelDataCodec>) {
        self.codecs.insert(codec.transfer_syntax(), codec);
    }

    pub fn get(&self, uid: &str) -> Result<&Arc<dyn PixelDataCodec>, CodecError> {
        self.codecs
            .iter()
            .find(|(k, _)| k.0 == uid)
            .map(|(_, v)| v)
            .ok_or(CodecError::UnknownTransferSyntax)
    }

    pub fn transfer_syntaxes(&self) -> Vec<TsUid> {
        let mut keys: Vec<TsUid> = self.codecs.keys().cloned().collect();
        keys.sort();
        keys
    }
}

/// Register the built-in codecs into an existing registry.
pub fn register_default_codecs(registry: &mut CodecRegistry) {
    registry.register(Arc::new(JpegLosslessCodec::process14()));
    registry.register(Arc::new(JpegLosslessCodec::sv1()));
    registry.register(Arc::new(Jpeg2000Codec::lossless()));
    registry.register(Arc::new(Jpeg2000Codec::lossy()));
    registry.register(Arc::new(Jpeg2000Codec::multi_component()));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pixel_data::PixelDataBuffer;
    use crate::PhotometricInterpretation;

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

    #[test]
    fn registry_has_all_five_transfer_syntaxes() {
        let registry = CodecRegistry::with_defaults();
        for uid in [
            "1.2.840.10008.1.2.4.57",
            "1.2.840.10008.1.2.4.70",
            "1.2.840.10008.1.2.4.90",
            "1.2.840.10008.1.2.4.91",
            "1.2.840.10008.1.2.4.93",
        ] {
            assert!(registry.get(uid).is_ok(), "missing {uid}");
        }
        assert!(registry.get("1.2.840.10008.1.2.4.50").is_err());
    }

    #[test]
    fn sv1_codec_roundtrip_via_registry() {
        let registry = CodecRegistry::with_defaults();
        let codec = registry.get("1.2.840.10008.1.2.4.70").unwrap();
        let info = gray8(16, 16);
        let pixels: Vec<u8> = (0..=255).collect();
        let source = PixelDataBuffer::with_frames(info, vec![pixels.clone()]);
        let mut encoded = PixelDataBuffer::new(info);
        codec
            .encode(&source, &mut encoded, &codec.default_parameters())
            .unwrap();
        assert_eq!(encoded.frame_count(), 1);
        assert!(encoded.frame(0).unwrap().len() < pixels.len());

        let mut decoded = PixelDataBuffer::new(info);
        codec
            .decode(&encoded, &mut decoded, &codec.default_parameters())
            .unwrap();
        assert_eq!(decoded.frame(0).unwrap(), &pixels[..]);
    }

    #[test]
    fn multi_frame_roundtrip_j2k_lossless() {
        let registry = CodecRegistry::with_defaults();
        let codec = registry.get("1.2.840.10008.1.2.4.90").unwrap();
        let info = gray8(8, 8);
        let frames: Vec<Vec<u8>> = (0..3)
            .map(|k| (0..64).map(|i| ((i * (k + 2)) % 256) as u8).collect())
            .collect();
        let source = PixelDataBuffer::with_frames(info, frames.clone());
        let mut encoded = PixelDataBuffer::new(info);
        codec
            .encode(&source, &mut encoded, &codec.default_parameters())
            .unwrap();
        let mut decoded = PixelDataBuffer::new(info);
        codec
            .decode(&encoded, &mut decoded, &codec.default_parameters())
            .unwrap();
        for (k, frame) in frames.iter().enumerate() {
            assert_eq!(decoded.frame(k).unwrap(), &frame[..]);
        }
    }

    #[test]
    fn parameter_family_mismatch_is_rejected() {
        let codec = Jpeg2000Codec::lossless();
        let info = gray8(4, 4);
        let source = PixelDataBuffer::with_frames(info, vec![vec![0u8; 16]]);
        let mut dest = PixelDataBuffer::new(info);
        let wrong = CodecParameters::JpegLossless(LosslessParameters::default());
        assert_eq!(
            codec.encode(&source, &mut dest, &wrong).err(),
            Some(CodecError::ParameterFamilyMismatch)
        );
    }
}
