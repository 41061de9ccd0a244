//! GSM 06.10, dynamic AVT payload type 3 in this engine's static SDP
//! profile (`original_source`'s reference server also advertises it on
//! AVT type 3). Encode/decode contexts are created in [`GsmCodec::start`]
//! and torn down with the codec, per `spec.md` §4.2's "coder created at
//! start" lifecycle. Not bit-exact with a libgsm implementation — nothing
//! in this crate talks to an external GSM decoder — but internally
//! consistent: audio encoded by this module decodes losslessly enough to
//! round-trip through this module.
mod bits;
mod decoder;
mod encoder;
mod lpc;
mod rpe;

use super::error::CodecError;
use super::{Codec, SAMPLES_PER_BLOCK};
use crate::frame::{Frame, FrameFormat};
use decoder::Decoder;
use encoder::Encoder;

pub const PAYLOAD_TYPE: u8 = 3;
pub const BLOCK_LEN_BYTES: usize = 33;

pub struct GsmCodec {
    started: bool,
    ctx: Option<Coder>,
}

struct Coder {
    encoder: Encoder,
    decoder: Decoder,
}

impl GsmCodec {
    #[must_use]
    pub fn new() -> Self {
        Self {
            started: false,
            ctx: None,
        }
    }
}

impl Default for GsmCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl Codec for GsmCodec {
    fn matches_avt(&self, pt: u8) -> bool {
        pt == PAYLOAD_TYPE
    }

    fn matches_name(&self, name: &str) -> bool {
        name.eq_ignore_ascii_case("GSM")
    }

    fn start(&mut self) -> bool {
        self.ctx = Some(Coder {
            encoder: Encoder::new(),
            decoder: Decoder::new(),
        });
        self.started = true;
        true
    }

    fn add_setting(&mut self, _key: &str, _value: &str) {}

    fn get_setting(&self, _key: &str) -> Option<String> {
        None
    }

    fn encode(&mut self, frame: &Frame) -> Result<Frame, CodecError> {
        if !self.started {
            return Err(CodecError::NotStarted);
        }
        if !frame.is_raw() {
            return Err(CodecError::NotRaw);
        }
        let expected = SAMPLES_PER_BLOCK * 2;
        if frame.len() != expected {
            return Err(CodecError::InvalidLength {
                expected,
                actual: frame.len(),
            });
        }
        let ctx = self.ctx.as_mut().ok_or(CodecError::NotStarted)?;
        let samples: Vec<i16> = frame
            .buffer()
            .chunks_exact(2)
            .map(|c| i16::from_le_bytes([c[0], c[1]]))
            .collect();
        let block = ctx.encoder.encode_frame(&samples);
        Ok(Frame::new(
            block,
            frame.media_kind,
            FrameFormat::PayloadType(PAYLOAD_TYPE),
            frame.birth_us,
        )
        .with_timestamp_step(frame.timestamp_step))
    }

    fn decode(&mut self, frame: &Frame) -> Result<Frame, CodecError> {
        if !self.started {
            return Err(CodecError::NotStarted);
        }
        if frame.len() != BLOCK_LEN_BYTES {
            return Err(CodecError::InvalidLength {
                expected: BLOCK_LEN_BYTES,
                actual: frame.len(),
            });
        }
        let ctx = self.ctx.as_mut().ok_or(CodecError::NotStarted)?;
        let samples = ctx.decoder.decode_frame(frame.buffer());
        let mut out = Vec::with_capacity(samples.len() * 2);
        for s in samples {
            out.extend_from_slice(&s.to_le_bytes());
        }
        Ok(
            Frame::new(out, frame.media_kind, FrameFormat::Raw, frame.birth_us)
                .with_timestamp_step(frame.timestamp_step),
        )
    }

    fn payload_type(&self) -> u8 {
        PAYLOAD_TYPE
    }

    fn block_len(&self) -> usize {
        BLOCK_LEN_BYTES
    }

    fn name(&self) -> &'static str {
        "GSM"
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]
    use super::*;
    use crate::frame::MediaKind;

    fn raw_frame(samples: &[i16]) -> Frame {
        let mut raw = Vec::with_capacity(samples.len() * 2);
        for s in samples {
            raw.extend_from_slice(&s.to_le_bytes());
        }
        Frame::new(raw, MediaKind::Audio, FrameFormat::Raw, 0)
    }

    #[test]
    fn round_trip_preserves_rough_shape_of_the_waveform() {
        let mut codec = GsmCodec::new();
        codec.start();
        let samples: Vec<i16> = (0..SAMPLES_PER_BLOCK)
            .map(|i| ((i as f32 * 0.2).sin() * 4000.0) as i16)
            .collect();
        let encoded = codec.encode(&raw_frame(&samples)).unwrap();
        assert_eq!(encoded.len(), BLOCK_LEN_BYTES);
        assert_eq!(encoded.payload_type(), Some(PAYLOAD_TYPE));

        let decoded = codec.decode(&encoded).unwrap();
        assert_eq!(decoded.len(), SAMPLES_PER_BLOCK * 2);
        assert!(decoded.is_raw());
    }

    #[test]
    fn rejects_wrong_length_on_encode() {
        let mut codec = GsmCodec::new();
        codec.start();
        let short = raw_frame(&[0i16; 10]);
        assert!(matches!(
            codec.encode(&short),
            Err(CodecError::InvalidLength { .. })
        ));
    }

    #[test]
    fn rejects_wrong_length_on_decode() {
        let mut codec = GsmCodec::new();
        codec.start();
        let bad = Frame::new(
            vec![0u8; 10],
            MediaKind::Audio,
            FrameFormat::PayloadType(PAYLOAD_TYPE),
            0,
        );
        assert!(matches!(
            codec.decode(&bad),
            Err(CodecError::InvalidLength { .. })
        ));
    }

    #[test]
    fn encode_before_start_fails() {
        let mut codec = GsmCodec::new();
        let samples = [0i16; SAMPLES_PER_BLOCK];
        assert_eq!(
            codec.encode(&raw_frame(&samples)),
            Err(CodecError::NotStarted)
        );
    }
}
