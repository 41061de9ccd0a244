//! The inverse of [`super::encoder::Encoder`]: unpack LARc/LTP/RPE fields
//! from a 33-byte block, rebuild the 160-sample short-term residual via the
//! same history update the encoder's local decoder used, then run it
//! through the short-term synthesis filter.
use super::bits::BitReader;
use super::lpc::{self, LAR_BITS, ORDER};
use super::rpe::{self, DP_LEN, LAG_MIN, SUBFRAME_LEN, SUBFRAMES_PER_FRAME};

pub struct Decoder {
    dp: [i32; DP_LEN],
}

impl Decoder {
    pub fn new() -> Self {
        Self { dp: [0i32; DP_LEN] }
    }

    /// Decode a 33-byte GSM block into 160 linear samples.
    pub fn decode_frame(&mut self, block: &[u8]) -> Vec<i16> {
        let mut reader = BitReader::new(block);

        let mut refl = [0f32; ORDER];
        for (i, &bits) in LAR_BITS.iter().enumerate() {
            let code = reader.pull(bits);
            refl[i] = lpc::dequantize_reflection(code, bits);
        }

        let mut residual = Vec::with_capacity(160);
        for _ in 0..SUBFRAMES_PER_FRAME {
            let drp = self.decode_subframe(&mut reader);
            residual.extend_from_slice(&drp);
        }

        lpc::synthesis_filter(&residual, &refl)
    }

    fn decode_subframe(&mut self, reader: &mut BitReader) -> [i32; SUBFRAME_LEN] {
        let lag = reader.pull(7) + LAG_MIN;
        let gain_code = reader.pull(2);
        let grid = reader.pull(2) as usize;
        let xmaxc = reader.pull(6);
        let mut codes = [0u32; rpe::RPE_SAMPLES];
        for c in &mut codes {
            *c = reader.pull(3);
        }

        let gain_f = rpe::dequantize_gain(gain_code);
        let xmax = rpe::decode_xmax(xmaxc);
        let ref_start = DP_LEN - lag as usize;

        let mut decoded_samples = [0i32; rpe::RPE_SAMPLES];
        for (i, &c) in codes.iter().enumerate() {
            decoded_samples[i] = rpe::dequantize_sample(c, xmax);
        }
        let e_hat = rpe::expand_grid(grid, &decoded_samples);

        let mut drp = [0i32; SUBFRAME_LEN];
        for n in 0..SUBFRAME_LEN {
            let predicted = (f64::from(gain_f) * f64::from(self.dp[ref_start + n])).round() as i32;
            drp[n] = e_hat[n] + predicted;
        }
        self.push_history(&drp);
        drp
    }

    fn push_history(&mut self, drp: &[i32; SUBFRAME_LEN]) {
        self.dp.copy_within(SUBFRAME_LEN.., 0);
        let tail = DP_LEN - SUBFRAME_LEN;
        self.dp[tail..].copy_from_slice(drp);
    }
}

impl Default for Decoder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::super::encoder::Encoder;
    use super::*;

    #[test]
    fn decodes_an_encoded_frame_to_160_samples() {
        let mut enc = Encoder::new();
        let mut dec = Decoder::new();
        let samples: Vec<i16> = (0..160)
            .map(|i| ((i as f32 * 0.2).sin() * 4000.0) as i16)
            .collect();
        let block = enc.encode_frame(&samples);
        let out = dec.decode_frame(&block);
        assert_eq!(out.len(), 160);
    }

    #[test]
    fn encoder_and_decoder_histories_stay_in_lockstep_across_frames() {
        let mut enc = Encoder::new();
        let mut dec = Decoder::new();
        let mut max_err = 0i32;
        for frame_idx in 0..5 {
            let samples: Vec<i16> = (0..160)
                .map(|i| {
                    let t = (frame_idx * 160 + i) as f32;
                    ((t * 0.25).sin() * 6000.0) as i16
                })
                .collect();
            let block = enc.encode_frame(&samples);
            let out = dec.decode_frame(&block);
            for (orig, got) in samples.iter().zip(out.iter()) {
                max_err = max_err.max((i32::from(*orig) - i32::from(*got)).abs());
            }
        }
        assert!(max_err < 20_000);
    }
}
