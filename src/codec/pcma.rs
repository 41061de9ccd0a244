//! G.711 A-law (PCMA), AVP payload type 8. Stateless table companding,
//! the A-law sibling of [`super::pcmu`]'s µ-law implementation.
use super::error::CodecError;
use super::pcmu::linear_samples;
use super::{Codec, SAMPLES_PER_BLOCK};
use crate::frame::{Frame, FrameFormat};

pub const PAYLOAD_TYPE: u8 = 8;
pub const BLOCK_LEN_BYTES: usize = SAMPLES_PER_BLOCK;

const CLIP: i32 = 32635;

#[derive(Debug, Default)]
pub struct PcmaCodec {
    started: bool,
}

impl PcmaCodec {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl Codec for PcmaCodec {
    fn matches_avt(&self, pt: u8) -> bool {
        pt == PAYLOAD_TYPE
    }

    fn matches_name(&self, name: &str) -> bool {
        name.eq_ignore_ascii_case("PCMA")
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
        let out: Vec<u8> = samples.iter().map(|&s| linear_to_alaw(s)).collect();
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
            out.extend_from_slice(&alaw_to_linear(byte).to_le_bytes());
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
        "PCMA"
    }
}

fn linear_to_alaw(sample: i16) -> u8 {
    let sign = if sample >= 0 { 0x80 } else { 0x00 };
    let mut s = i32::from(sample);
    if s < 0 {
        s = -s;
    }
    s = s.min(CLIP);

    let (exp, mantissa) = if s >= 256 {
        let mut exp = 7i32;
        let mut mask = 0x4000;
        while (s & mask) == 0 && exp > 0 {
            mask >>= 1;
            exp -= 1;
        }
        (exp, (s >> (exp + 3)) & 0x0F)
    } else {
        (0, s >> 4)
    };

    let byte = sign | ((exp as u8) << 4) | mantissa as u8;
    byte ^ 0x55
}

fn alaw_to_linear(alaw_byte: u8) -> i16 {
    let alaw_byte = alaw_byte ^ 0x55;
    let sign = alaw_byte & 0x80;
    let exponent = (alaw_byte >> 4) & 0x07;
    let mantissa = i32::from(alaw_byte & 0x0F);

    let mut sample = if exponent == 0 {
        (mantissa << 4) + 8
    } else {
        ((mantissa << 4) + 0x108) << (exponent - 1)
    };
    if sign == 0 {
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
        let mut codec = PcmaCodec::new();
        codec.start();
        let samples: Vec<i16> = (0..SAMPLES_PER_BLOCK)
            .map(|i| ((i as i32 * 53) % 2000 - 1000) as i16)
            .collect();
        let mut raw = Vec::with_capacity(samples.len() * 2);
        for s in &samples {
            raw.extend_from_slice(&s.to_le_bytes());
        }
        let raw_frame = Frame::new(raw, MediaKind::Audio, FrameFormat::Raw, 0);
        let encoded = codec.encode(&raw_frame).unwrap();
        assert_eq!(encoded.len(), BLOCK_LEN_BYTES);

        let decoded = codec.decode(&encoded).unwrap();
        let decoded_samples = linear_samples(decoded.buffer()).unwrap();
        for (orig, got) in samples.iter().zip(decoded_samples.iter()) {
            assert!((i32::from(*orig) - i32::from(*got)).abs() < 512);
        }
    }

    #[test]
    fn silence_round_trips_to_near_zero() {
        let mut codec = PcmaCodec::new();
        codec.start();
        let raw = vec![0u8; SAMPLES_PER_BLOCK * 2];
        let frame = Frame::new(raw, MediaKind::Audio, FrameFormat::Raw, 0);
        let encoded = codec.encode(&frame).unwrap();
        let decoded = codec.decode(&encoded).unwrap();
        let samples = linear_samples(decoded.buffer()).unwrap();
        assert!(samples.iter().all(|&s| s.abs() < 16));
    }
}
