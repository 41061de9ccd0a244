//! Engine-wide tunables.
//!
//! Actual configuration *loading* (from a file, environment, provisioning
//! service, whatever the deployment uses) is someone else's job; this module
//! only defines the typed values that loader would produce, so every
//! constructor in the crate takes an `&EngineConfig` instead of reaching for
//! a hard-coded constant or a process-global.

use std::time::Duration;

/// Tunables threaded through `FrameCollector`, `RtpChannel`, and the codec
/// registry at construction time.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// How long a `Frame` must be unreferenced before the collector reclaims it.
    pub collector_window: Duration,
    /// How often the collector's background worker wakes up to sweep.
    pub collector_tick: Duration,
    /// Outgoing packet period for an audio channel (20ms for G.711/GSM).
    pub audio_packet_period: Duration,
    /// Target adaptive jitter compensation for audio, per `spec.md` §6.
    pub audio_jitter_target: Duration,
    /// Upper bound on the number of fragments buffered while reassembling a
    /// marker-bit-delimited burst before the whole burst is dropped.
    pub max_pending_fragments: usize,
    /// Size of the scratch buffer the channel's send thread uses to
    /// accumulate contiguous fragments read from the transport.
    pub recv_scratch_bytes: usize,
    /// Dynamic payload type used for RFC 4733 telephone-event.
    pub dtmf_payload_type: u8,
    /// Depth of the per-channel DTMF FIFO queue before oldest tones are dropped.
    pub dtmf_queue_capacity: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            collector_window: Duration::from_micros(3_000_000),
            collector_tick: Duration::from_millis(1_000),
            audio_packet_period: Duration::from_millis(20),
            audio_jitter_target: Duration::from_millis(40),
            max_pending_fragments: 64,
            recv_scratch_bytes: 5_000,
            dtmf_payload_type: 101,
            dtmf_queue_capacity: 32,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_spec_constants() {
        let cfg = EngineConfig::default();
        assert_eq!(cfg.collector_window, Duration::from_secs(3));
        assert_eq!(cfg.recv_scratch_bytes, 5_000);
        assert_eq!(cfg.dtmf_payload_type, 101);
    }
}
