//! G.711 µ-law (PCMU), AVP payload type 0. Stateless table companding,
//! grounded on the teacher crate's `media_agent::audio_codec` µ-law pair,
//! adapted from f32 samples to the raw 16-bit linear buffers frames carry.
use super::error::CodecError;
use super::{Codec, SAMPLES_PER_BLOCK};
use crate::frame::{Frame, FrameFormat};

const BIAS: i32 = 0x84;
const CLIP: i32 = 32635;

pub const PAYLOAD_TYPE: u8 = 0;
pub const BLOCK_LEN_BYTES: usize = SAMPLES_PER_BLOCK; // one encoded byte per sample

#[derive(Debug, Default)]
pub struct PcmuCodec {
    started: bool,
}

impl PcmuCodec {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl Codec for PcmuCodec {
    fn matches_avt(&self, pt: u8) -> bool {
        pt == PAYLOAD_TYPE
    }

    fn matches_name(&self, name: &str) -> bool {
        name.eq_ignore_ascii_case("PCMU")
    }

    fn start(&mut self) -> bool {
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
        let samples = linear_samples(frame.buffer())?;
        let out: Vec<u8> = samples.iter().map(|&s| linear_to_ulaw(s)).collect();
        Ok(Frame::new(
            out,
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
        let mut out = Vec::with_capacity(frame.len() * 2);
        for &byte in frame.buffer() {
            out.extend_from_slice(&ulaw_to_linear(byte).to_le_bytes());
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
        "PCMU"
    }
}

/// Reinterpret a raw buffer as little-endian 16-bit linear samples.
pub(super) fn linear_samples(buf: &[u8]) -> Result<Vec<i16>, CodecError> {
    if buf.len() != SAMPLES_PER_BLOCK * 2 {
        return Err(CodecError::InvalidLength {
            expected: SAMPLES_PER_BLOCK * 2,
            actual: buf.len(),
        });
    }
    Ok(buf
        .chunks_exact(2)
        .map(|c| i16::from_le_bytes([c[0], c[1]]))
        .collect())
}

pub(super) fn linear_to_ulaw(sample: i16) -> u8 {
    let sign = if sample < 0 { 0x80 } else { 0x00 };
    let mut s = i32::from(sample);
    if s < 0 {
        s = -s;
    }
    s = s.min(CLIP);
    s += BIAS;

    let mut mask = 0x4000;
    let mut exp = 7;
    while (s & mask) == 0 && exp > 0 {
        mask >>= 1;
        exp -= 1;
    }

    let mantissa = (s >> (exp + 3)) & 0x0F;
    let ulaw_byte = sign | (exp << 4) as u8 | mantissa as u8;
    !ulaw_byte
}

pub(super) fn ulaw_to_linear(ulaw_byte: u8) -> i16 {
    let ulaw_byte = !ulaw_byte;
    let sign = ulaw_byte & 0x80;
    let exponent = (ulaw_byte >> 4) & 0x07;
    let mantissa = ulaw_byte & 0x0F;

    let mut sample = (((i32::from(mantissa) << 3) + 132) << exponent) - BIAS;
    if sign != 0 {
        sample = -sample;
    }
    sample as i16
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]
    use super::*;
    use crate::frame::MediaKind;

    #[test]
    fn round_trip_is_lossy_but_close() {
        let mut codec = PcmuCodec::new();
        codec.start();
        let samples: Vec<i16> = (0..SAMPLES_PER_BLOCK)
            .map(|i| ((i as i32 * 37) % 2000 - 1000) as i16)
            .collect();
        let mut raw = Vec::with_capacity(samples.len() * 2);
        for s in &samples {
            raw.extend_from_slice(&s.to_le_bytes());
        }
        let raw_frame = Frame::new(raw, MediaKind::Audio, FrameFormat::Raw, 0);
        let encoded = codec.encode(&raw_frame).unwrap();
        assert_eq!(encoded.len(), BLOCK_LEN_BYTES);
        assert_eq!(encoded.payload_type(), Some(PAYLOAD_TYPE));

        let decoded = codec.decode(&encoded).unwrap();
        let decoded_samples = linear_samples(decoded.buffer()).unwrap();
        for (orig, got) in samples.iter().zip(decoded_samples.iter()) {
            assert!((i32::from(*orig) - i32::from(*got)).abs() < 512);
        }
    }

    #[test]
    fn rejects_wrong_length_on_decode() {
        let mut codec = PcmuCodec::new();
        codec.start();
        let bad = Frame::new(vec![0u8; 10], MediaKind::Audio, FrameFormat::PayloadType(0), 0);
        assert!(matches!(
            codec.decode(&bad),
            Err(CodecError::InvalidLength { .. })
        ));
    }

    #[test]
    fn rejects_encoded_input_on_encode() {
        let mut codec = PcmuCodec::new();
        codec.start();
        let already_encoded =
            Frame::new(vec![0u8; BLOCK_LEN_BYTES], MediaKind::Audio, FrameFormat::PayloadType(0), 0);
        assert_eq!(codec.encode(&already_encoded), Err(CodecError::NotRaw));
    }
}
