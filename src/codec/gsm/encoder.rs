//! Stateful GSM 06.10-style encoder: short-term LPC analysis once per
//! 160-sample frame, then long-term prediction + RPE quantization per
//! 40-sample subframe. The encoder keeps a local copy of the reconstructed
//! short-term residual (`dp`) so its LTP history matches exactly what the
//! decoder will rebuild from the bitstream — the same "local decoder inside
//! the encoder" loop real GSM uses to avoid long-term drift.
use super::bits::BitWriter;
use super::lpc::{self, LAR_BITS};
use super::rpe::{
    self, DP_LEN, LAG_MAX, LAG_MIN, SUBFRAME_LEN, SUBFRAMES_PER_FRAME,
};

pub struct Encoder {
    dp: [i32; DP_LEN],
}

impl Encoder {
    pub fn new() -> Self {
        Self { dp: [0i32; DP_LEN] }
    }

    /// Encode 160 linear samples into a 33-byte GSM block.
    pub fn encode_frame(&mut self, samples: &[i16]) -> Vec<u8> {
        let refl = lpc::reflection_coefficients(samples);
        let residual = lpc::analysis_filter(samples, &refl);

        let mut writer = BitWriter::new(33);
        for (i, &bits) in LAR_BITS.iter().enumerate() {
            let code = lpc::quantize_reflection(refl[i], bits);
            writer.push(code, bits);
        }

        for sub in 0..SUBFRAMES_PER_FRAME {
            let start = sub * SUBFRAME_LEN;
            let mut sub_residual = [0i32; SUBFRAME_LEN];
            sub_residual.copy_from_slice(&residual[start..start + SUBFRAME_LEN]);
            self.encode_subframe(&sub_residual, &mut writer);
        }

        writer.finish()
    }

    fn encode_subframe(&mut self, sub_residual: &[i32; SUBFRAME_LEN], writer: &mut BitWriter) {
        let (lag, gain) = self.search_ltp(sub_residual);
        let gain_code = rpe::quantize_gain(gain);
        let gain_f = rpe::dequantize_gain(gain_code);
        let ref_start = DP_LEN - lag as usize;

        let mut e = [0i32; SUBFRAME_LEN];
        let mut predicted = [0i32; SUBFRAME_LEN];
        for n in 0..SUBFRAME_LEN {
            let p = (f64::from(gain_f) * f64::from(self.dp[ref_start + n])).round() as i32;
            predicted[n] = p;
            e[n] = sub_residual[n] - p;
        }

        let (grid, decimated) = rpe::select_grid(&e);
        let peak = decimated.iter().map(|v| v.abs()).max().unwrap_or(0);
        let xmaxc = rpe::encode_xmax(peak);
        let xmax = rpe::decode_xmax(xmaxc);

        let mut codes = [0u32; rpe::RPE_SAMPLES];
        for (i, &s) in decimated.iter().enumerate() {
            codes[i] = rpe::quantize_sample(s, xmax);
        }

        writer.push(lag - LAG_MIN, 7);
        writer.push(gain_code, 2);
        writer.push(grid as u32, 2);
        writer.push(xmaxc, 6);
        for &c in &codes {
            writer.push(c, 3);
        }

        let mut decoded_samples = [0i32; rpe::RPE_SAMPLES];
        for (i, &c) in codes.iter().enumerate() {
            decoded_samples[i] = rpe::dequantize_sample(c, xmax);
        }
        let e_hat = rpe::expand_grid(grid, &decoded_samples);

        let mut drp = [0i32; SUBFRAME_LEN];
        for n in 0..SUBFRAME_LEN {
            drp[n] = e_hat[n] + predicted[n];
        }
        self.push_history(&drp);
    }

    /// Find the lag in `[LAG_MIN, LAG_MAX]` whose `dp` segment best predicts
    /// `sub_residual` (normalized cross-correlation), and the raw (not yet
    /// quantized) gain for that lag.
    fn search_ltp(&self, sub_residual: &[i32; SUBFRAME_LEN]) -> (u32, f32) {
        let mut best_lag = LAG_MIN;
        let mut best_score = -1f64;
        let mut best_gain = 0f32;

        for lag in LAG_MIN..=LAG_MAX {
            let ref_start = DP_LEN - lag as usize;
            let mut corr = 0f64;
            let mut energy = 0f64;
            for n in 0..SUBFRAME_LEN {
                let r = f64::from(self.dp[ref_start + n]);
                corr += f64::from(sub_residual[n]) * r;
                energy += r * r;
            }
            if energy < 1.0 {
                continue;
            }
            let score = (corr * corr) / energy;
            if score > best_score {
                best_score = score;
                best_lag = lag;
                best_gain = (corr / energy) as f32;
            }
        }
        (best_lag, best_gain)
    }

    fn push_history(&mut self, drp: &[i32; SUBFRAME_LEN]) {
        self.dp.copy_within(SUBFRAME_LEN.., 0);
        let tail = DP_LEN - SUBFRAME_LEN;
        self.dp[tail..].copy_from_slice(drp);
    }
}

impl Default for Encoder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encodes_a_frame_into_the_fixed_block_size() {
        let mut enc = Encoder::new();
        let samples: Vec<i16> = (0..160)
            .map(|i| ((i as f32 * 0.15).sin() * 5000.0) as i16)
            .collect();
        let block = enc.encode_frame(&samples);
        assert_eq!(block.len(), 33);
    }

    #[test]
    fn history_persists_across_frames() {
        let mut enc = Encoder::new();
        let samples: Vec<i16> = (0..160)
            .map(|i| ((i as f32 * 0.3).sin() * 3000.0) as i16)
            .collect();
        enc.encode_frame(&samples);
        assert!(enc.dp.iter().any(|&v| v != 0));
    }
}
