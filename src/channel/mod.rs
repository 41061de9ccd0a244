//! One RTP media stream: a UDP socket, a lazily-attached codec, marker-bit
//! reassembly on the receive side, and RTP-timestamp "tempification" on the
//! send side. Grounded on the teacher crate's `rtp_session::RtpSession`
//! thread-spawn/run-flag pattern, simplified down to one media stream
//! (no RTCP, no SRTP — out of scope per `spec.md`).
pub mod direction;
pub mod error;
pub mod events;
pub mod transport;

pub use direction::Direction;
pub use error::{ChannelRecvError, ChannelSendError};
pub use events::ChannelEvents;

use crate::codec::{Codec, CodecRegistry};
use crate::collector::FrameCollector;
use crate::config::EngineConfig;
use crate::frame::{Frame, FrameFormat, FrameKind, LockOwner, MediaKind};
use crate::log::log_sink::LogSink;
use crate::rtp::{RtpHeader, RtpPacket};
use crate::util::now_micros;
use crate::{sink_trace, sink_warn};
use rand::RngCore;
use rand::rngs::OsRng;
use std::io;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::Duration;
use transport::UdpTransport;

/// Lifecycle phase of a channel, per `spec.md` §4.3.1.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelPhase {
    Unbound,
    Peered,
    Active,
    Idle,
    Closing,
    Closed,
}

/// A DTMF event as carried by RFC 4733, dequeued in arrival order.
#[derive(Debug, Clone, Copy)]
pub struct DtmfEvent {
    pub event: u8,
    pub end_of_event: bool,
    pub volume: u8,
    pub duration: u16,
}

enum LockNotification {
    Locked(LockOwner),
    Unlocked,
}

struct PendingReassembly {
    head: Frame,
    timestamp: u32,
    appended: Vec<Arc<Frame>>,
}

struct ChannelState {
    phase: ChannelPhase,
    media_kind: MediaKind,
    payload_type: Option<u8>,
    direction: Direction,
    label: String,
    clock_rate: u32,
    ssrc: u32,
    next_seq: u16,
    last_incoming_ts: Option<u32>,
    last_incoming_wallclock_us: Option<u64>,
    last_outgoing_ts: u32,
    packets_sent: u64,
    packets_received: u64,
    codec: Option<Box<dyn Codec>>,
    pending: Option<PendingReassembly>,
    dtmf_queue: std::collections::VecDeque<DtmfEvent>,
    locked: bool,
    lock_owner: Option<LockOwner>,
}

pub struct RtpChannel {
    state: Mutex<ChannelState>,
    transport: UdpTransport,
    registry: Arc<CodecRegistry>,
    collector: Option<Arc<FrameCollector>>,
    events: Arc<dyn ChannelEvents>,
    logger: Arc<dyn LogSink>,
    cfg: EngineConfig,
    run: AtomicBool,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl RtpChannel {
    pub fn new(
        cfg: EngineConfig,
        local: SocketAddr,
        media_kind: MediaKind,
        registry: Arc<CodecRegistry>,
        collector: Option<Arc<FrameCollector>>,
        events: Arc<dyn ChannelEvents>,
        logger: Arc<dyn LogSink>,
    ) -> io::Result<Arc<Self>> {
        let transport = UdpTransport::bind(local, Duration::from_millis(200))?;
        let ssrc = OsRng.next_u32();
        let label = random_hex_label();

        let state = ChannelState {
            phase: ChannelPhase::Unbound,
            media_kind,
            payload_type: None,
            direction: Direction::SendRecv,
            label,
            clock_rate: 8_000,
            ssrc,
            next_seq: (OsRng.next_u32() & 0xFFFF) as u16,
            last_incoming_ts: None,
            last_incoming_wallclock_us: None,
            last_outgoing_ts: 0,
            packets_sent: 0,
            packets_received: 0,
            codec: None,
            pending: None,
            dtmf_queue: std::collections::VecDeque::new(),
            locked: false,
            lock_owner: None,
        };

        Ok(Arc::new(Self {
            state: Mutex::new(state),
            transport,
            registry,
            collector,
            events,
            logger,
            cfg,
            run: AtomicBool::new(false),
            worker: Mutex::new(None),
        }))
    }

    #[must_use]
    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.transport.local_addr()
    }

    #[must_use]
    pub fn label(&self) -> String {
        self.locked_state().label.clone()
    }

    #[must_use]
    pub fn media_kind(&self) -> MediaKind {
        self.locked_state().media_kind
    }

    #[must_use]
    pub fn phase(&self) -> ChannelPhase {
        self.locked_state().phase
    }

    pub fn set_peer(&self, peer: SocketAddr) {
        self.transport.set_peer(peer);
        let mut state = self.locked_state();
        if state.phase == ChannelPhase::Unbound {
            state.phase = ChannelPhase::Peered;
        }
    }

    pub fn set_direction(&self, direction: Direction) {
        self.locked_state().direction = direction;
    }

    pub fn set_clock_rate(&self, clock_rate: u32) {
        self.locked_state().clock_rate = clock_rate.max(1);
    }

    /// Bind this channel to a payload type, creating its codec instance on
    /// first use. Returns `false` if the registry has no factory for `pt`,
    /// per `spec.md` §4.2 ("or nil").
    pub fn set_payload_type(&self, pt: u8) -> bool {
        let Ok(codec) = self.registry.instantiate_for_avt(pt) else {
            sink_warn!(self.logger, "[channel] no codec factory for PT {pt}");
            return false;
        };
        let mut state = self.locked_state();
        state.payload_type = Some(pt);
        state.codec = Some(codec);
        true
    }

    fn locked_state(&self) -> std::sync::MutexGuard<'_, ChannelState> {
        self.state.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    /// Bring the channel back from `Idle` to `Active`, per `spec.md` §4.4's
    /// "first increment wakes the channel" reference-counting rule. A no-op
    /// outside the `Idle` phase.
    pub fn wake(&self) {
        let mut state = self.locked_state();
        if state.phase == ChannelPhase::Idle {
            state.phase = ChannelPhase::Active;
        }
    }

    /// Park the channel in `Idle`, per `spec.md` §4.4's "last decrement
    /// returns it to idle" rule. A no-op outside the `Active` phase.
    pub fn idle(&self) {
        let mut state = self.locked_state();
        if state.phase == ChannelPhase::Active {
            state.phase = ChannelPhase::Idle;
        }
    }

    /// Spawn the receive thread. Idempotent.
    pub fn start(self: &Arc<Self>) {
        if self.run.swap(true, Ordering::SeqCst) {
            return;
        }
        {
            let mut state = self.locked_state();
            if state.phase != ChannelPhase::Closed {
                state.phase = ChannelPhase::Active;
            }
        }
        let this = Arc::clone(self);
        let handle = thread::Builder::new()
            .name("rtp-channel-recv".into())
            .spawn(move || this.receive_loop())
            .expect("spawn rtp-channel-recv");
        *self.worker.lock().unwrap_or_else(std::sync::PoisonError::into_inner) = Some(handle);
    }

    pub fn stop(self: &Arc<Self>) {
        if !self.run.swap(false, Ordering::SeqCst) {
            return;
        }
        if let Some(handle) = self
            .worker
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .take()
        {
            let _ = handle.join();
        }
        self.locked_state().phase = ChannelPhase::Closed;
        self.events.channel_closed();
    }

    fn receive_loop(self: Arc<Self>) {
        let mut scratch = vec![0u8; self.cfg.recv_scratch_bytes];
        while self.run.load(Ordering::SeqCst) {
            match self.transport.recv(&mut scratch) {
                Ok(Some((n, _from))) => {
                    if let Err(e) = self.handle_datagram(&scratch[..n]) {
                        sink_trace!(self.logger, "[channel] dropped inbound packet: {e}");
                    }
                }
                Ok(None) => {}
                Err(e) => {
                    sink_warn!(self.logger, "[channel] recv error: {e}");
                }
            }
        }
    }

    fn handle_datagram(&self, buf: &[u8]) -> Result<(), ChannelRecvError> {
        if buf.len() < 12 {
            return Err(ChannelRecvError::TooShort);
        }
        let packet = RtpPacket::decode(buf)?;
        let pt = packet.payload_type();
        let now = now_micros();

        if pt == self.cfg.dtmf_payload_type {
            self.handle_dtmf(&packet);
            return Ok(());
        }

        let mut state = self.locked_state();
        if !state.direction.can_receive() {
            return Ok(());
        }
        self.ensure_codec_for_pt(&mut state, pt);
        state.packets_received += 1;
        state.last_incoming_ts = Some(packet.timestamp());
        state.last_incoming_wallclock_us = Some(now);

        let frame = Frame::new(
            packet.payload.clone(),
            state.media_kind,
            FrameFormat::PayloadType(pt),
            now,
        );

        let marker = packet.marker();
        let same_burst = state
            .pending
            .as_ref()
            .is_some_and(|p| p.timestamp == packet.timestamp());

        // Stale and marker-complete bursts are pulled out here and finalized
        // only after the lock is released below — finalize_reassembly needs
        // the codec, which lives behind the same mutex.
        let mut stale = None;
        if same_burst {
            let pending = state.pending.as_mut().expect("checked by same_burst");
            if pending.appended.len() >= self.cfg.max_pending_fragments {
                state.pending = None;
                return Err(ChannelRecvError::ReassemblyQueueFull);
            }
            pending.appended.push(Arc::new(frame));
        } else {
            stale = state.pending.take();
            state.pending = Some(PendingReassembly {
                head: frame,
                timestamp: packet.timestamp(),
                appended: Vec::new(),
            });
        }
        let complete = if marker { state.pending.take() } else { None };
        drop(state);

        if let Some(pending) = stale {
            self.finalize_reassembly(pending);
        }
        if let Some(pending) = complete {
            self.finalize_reassembly(pending);
        }
        Ok(())
    }

    /// Instantiate (and start) a codec for a newly-seen incoming payload
    /// type, per `spec.md` §4.3.2. A factory lookup or start failure simply
    /// discards the codec reference rather than erroring the receive path.
    fn ensure_codec_for_pt(&self, state: &mut ChannelState, pt: u8) {
        if state.payload_type == Some(pt) && state.codec.is_some() {
            return;
        }
        state.payload_type = Some(pt);
        state.codec = match self.registry.instantiate_for_avt(pt) {
            Ok(codec) => Some(codec),
            Err(e) => {
                sink_warn!(self.logger, "[channel] no usable codec for incoming PT {pt}: {e}");
                None
            }
        };
    }

    /// Decode the assembled encoded Frame and, on success, forward the
    /// decoded raw Frame upstream with a back-pointer to the original —
    /// per `spec.md` §4.3.2. A missing codec or a decode failure drops the
    /// burst silently (logged, never surfaced).
    fn finalize_reassembly(&self, pending: PendingReassembly) {
        let encoded = Arc::new(pending.head.with_appended(pending.appended));
        let mut state = self.locked_state();
        let Some(codec) = state.codec.as_mut() else {
            sink_trace!(self.logger, "[channel] no codec attached, dropping inbound frame");
            return;
        };
        let decoded = match codec.decode(&encoded) {
            Ok(decoded) => decoded,
            Err(e) => {
                sink_trace!(self.logger, "[channel] decode failed, dropping inbound frame: {e}");
                return;
            }
        };
        drop(state);

        let decoded = Arc::new(decoded.with_original(&encoded));
        if let Some(collector) = &self.collector {
            collector.register(Arc::clone(&decoded));
        }
        self.events.incoming_frame(decoded);
    }

    fn handle_dtmf(&self, packet: &RtpPacket) {
        if packet.payload.len() < 4 {
            return;
        }
        let event = DtmfEvent {
            event: packet.payload[0],
            end_of_event: (packet.payload[1] & 0x80) != 0,
            volume: packet.payload[1] & 0x3F,
            duration: u16::from_be_bytes([packet.payload[2], packet.payload[3]]),
        };
        let mut state = self.locked_state();
        if state.dtmf_queue.len() >= self.cfg.dtmf_queue_capacity {
            state.dtmf_queue.pop_front();
        }
        state.dtmf_queue.push_back(event);
        drop(state);
        self.events.incoming_dtmf(event);
    }

    /// Pop the oldest queued DTMF event, if any.
    pub fn next_dtmf(&self) -> Option<DtmfEvent> {
        self.locked_state().dtmf_queue.pop_front()
    }

    /// Send a frame, per `spec.md` §4.3.4's rejection rules: no peer,
    /// locked by a different owner, media-kind mismatch, encoded to the
    /// wrong payload type, or a raw frame with no codec attached.
    ///
    /// Per `spec.md` §4.3.3/Testable Property #8: a single-packet frame's
    /// marker bit reflects whether this send starts a new burst; a frame
    /// carrying an `appended` fragment list is sent as one packet per
    /// fragment under the same RTP timestamp, head and inner fragments
    /// unmarked and only the terminal fragment marked, regardless of burst.
    pub fn send_frame(&self, frame: &Frame) -> Result<(), ChannelSendError> {
        let mut state = self.locked_state();
        if matches!(state.phase, ChannelPhase::Closed | ChannelPhase::Closing) {
            return Err(ChannelSendError::Closed);
        }
        if self.transport.peer().is_none() {
            return Err(ChannelSendError::NoPeer);
        }
        if frame.media_kind != state.media_kind {
            return Err(ChannelSendError::MediaKindMismatch);
        }
        if !state.direction.can_send() {
            return Err(ChannelSendError::Closed);
        }

        let lock_notification = match self.apply_lock_transition(&mut state, frame) {
            Ok(n) => n,
            Err(e) => return Err(e),
        };

        let (ts, is_burst) = self.tempify(&state, frame.timestamp_step);
        let ssrc = state.ssrc;

        let parts: Vec<&Frame> = match &frame.appended {
            Some(children) if !children.is_empty() => std::iter::once(frame)
                .chain(children.iter().map(Arc::as_ref))
                .collect(),
            _ => vec![frame],
        };
        let multi_packet = parts.len() > 1;

        let mut encoded_parts = Vec::with_capacity(parts.len());
        for part in parts {
            encoded_parts.push(self.encode_if_needed(&mut state, part)?);
        }

        for (i, encoded) in encoded_parts.iter().enumerate() {
            let pt = encoded.payload_type().unwrap_or(0);
            let is_last = i + 1 == encoded_parts.len();
            let marker = if multi_packet { is_last } else { is_burst };

            let seq = state.next_seq;
            state.next_seq = state.next_seq.wrapping_add(1);
            let header = RtpHeader::new(pt, seq, ts, ssrc).with_marker(marker);
            let packet = RtpPacket::new(header, encoded.buffer().to_vec());
            let bytes = packet
                .encode()
                .map_err(|e| ChannelSendError::Io(e.to_string()))?;

            self.transport.send(&bytes)?;
            state.packets_sent += 1;
        }
        state.last_outgoing_ts = ts;
        drop(state);
        if let Some(encoded) = encoded_parts.last() {
            self.events.frame_sent(encoded);
        }
        match lock_notification {
            Some(LockNotification::Locked(owner)) => self.events.channel_locked(owner),
            Some(LockNotification::Unlocked) => self.events.channel_unlocked(),
            None => {}
        }
        Ok(())
    }

    /// Handle `Locking`/`Unlocking` frame kinds, updating `state.locked` in
    /// place. The returned notification (if any) must be delivered to
    /// `events` only after the state mutex is released.
    fn apply_lock_transition(
        &self,
        state: &mut ChannelState,
        frame: &Frame,
    ) -> Result<Option<LockNotification>, ChannelSendError> {
        if state.locked {
            match (frame.kind, frame.owner) {
                (FrameKind::Unlocking, Some(owner)) if state.lock_owner == Some(owner) => {
                    state.locked = false;
                    state.lock_owner = None;
                    Ok(Some(LockNotification::Unlocked))
                }
                (_, Some(owner)) if state.lock_owner == Some(owner) => Ok(None),
                _ => Err(ChannelSendError::LockedByOther),
            }
        } else if frame.kind == FrameKind::Locking {
            let owner = frame.owner.unwrap_or(LockOwner::new(0));
            state.locked = true;
            state.lock_owner = Some(owner);
            Ok(Some(LockNotification::Locked(owner)))
        } else {
            Ok(None)
        }
    }

    fn encode_if_needed(
        &self,
        state: &mut ChannelState,
        frame: &Frame,
    ) -> Result<Frame, ChannelSendError> {
        if frame.is_raw() {
            let codec = state.codec.as_mut().ok_or(ChannelSendError::NoCodec)?;
            codec.encode(frame).map_err(|_| ChannelSendError::NoCodec)
        } else {
            match (state.payload_type, frame.payload_type()) {
                (Some(expected), Some(actual)) if expected != actual => {
                    Err(ChannelSendError::WrongPayloadType { expected, actual })
                }
                _ => Ok(frame.clone()),
            }
        }
    }

    /// RTP-timestamp "tempification": while the source keeps pace with the
    /// negotiated packet period we advance by the frame's own step; once
    /// the gap since the last incoming frame exceeds a handful of periods
    /// (a burst, or the very first outgoing frame), we derive the step from
    /// wall-clock elapsed time instead so the outgoing clock doesn't lag.
    /// Returns `(timestamp, is_burst)`; `is_burst` drives the marker bit for
    /// single-packet sends per Testable Property #8.
    fn tempify(&self, state: &ChannelState, frame_step: u32) -> (u32, bool) {
        const BURST_THRESHOLD_PERIODS: u64 = 5;
        let period_us = self.cfg.audio_packet_period.as_micros().max(1) as u64;

        let Some(last_wall) = state.last_incoming_wallclock_us else {
            return (state.last_outgoing_ts.wrapping_add(frame_step.max(1)), true);
        };
        let elapsed_us = now_micros().saturating_sub(last_wall);
        let slots = elapsed_us / period_us;

        if slots <= BURST_THRESHOLD_PERIODS {
            (state.last_outgoing_ts.wrapping_add(frame_step.max(1)), false)
        } else {
            let ticks = ((elapsed_us * u64::from(state.clock_rate)) / 1_000_000) as u32;
            (state.last_outgoing_ts.wrapping_add(ticks.max(frame_step.max(1))), true)
        }
    }
}

fn random_hex_label() -> String {
    let mut bytes = [0u8; 16];
    OsRng.fill_bytes(&mut bytes);
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]
    use super::*;
    use crate::log::noop_log_sink::NoopLogSink;

    struct RecordingEvents {
        frames: Mutex<Vec<Arc<Frame>>>,
    }

    impl ChannelEvents for RecordingEvents {
        fn incoming_frame(&self, frame: Arc<Frame>) {
            self.frames.lock().unwrap_or_else(std::sync::PoisonError::into_inner).push(frame);
        }
        fn incoming_dtmf(&self, _event: DtmfEvent) {}
        fn frame_sent(&self, _frame: &Frame) {}
        fn channel_locked(&self, _owner: LockOwner) {}
        fn channel_unlocked(&self) {}
        fn channel_closed(&self) {}
    }

    fn test_channel() -> Arc<RtpChannel> {
        let cfg = EngineConfig::default();
        let events = Arc::new(RecordingEvents {
            frames: Mutex::new(Vec::new()),
        });
        RtpChannel::new(
            cfg,
            "127.0.0.1:0".parse().unwrap(),
            MediaKind::Audio,
            Arc::new(CodecRegistry::with_defaults()),
            None,
            events,
            Arc::new(NoopLogSink::default()),
        )
        .unwrap()
    }

    #[test]
    fn label_is_32_hex_characters() {
        let ch = test_channel();
        let label = ch.label();
        assert_eq!(label.len(), 32);
        assert!(label.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn send_without_peer_is_rejected() {
        let ch = test_channel();
        ch.set_payload_type(0);
        let frame = Frame::new(vec![0u8; 160], MediaKind::Audio, FrameFormat::PayloadType(0), 0);
        assert_eq!(ch.send_frame(&frame), Err(ChannelSendError::NoPeer));
    }

    #[test]
    fn send_rejects_media_kind_mismatch() {
        let ch = test_channel();
        ch.set_payload_type(0);
        ch.set_peer("127.0.0.1:9".parse().unwrap());
        let frame = Frame::new(vec![0u8; 160], MediaKind::Unknown, FrameFormat::PayloadType(0), 0);
        assert_eq!(ch.send_frame(&frame), Err(ChannelSendError::MediaKindMismatch));
    }

    #[test]
    fn raw_frame_without_codec_is_rejected() {
        let ch = test_channel();
        ch.set_peer("127.0.0.1:9".parse().unwrap());
        let frame = Frame::new(vec![0u8; 320], MediaKind::Audio, FrameFormat::Raw, 0);
        assert_eq!(ch.send_frame(&frame), Err(ChannelSendError::NoCodec));
    }

    /// Testable Property #8: a send starting a new burst (no prior
    /// wall-clock reference, or a gap past the threshold) carries
    /// marker=1; a send that's part of a continuous stream carries
    /// marker=0.
    #[test]
    fn marker_bit_reflects_burst_detection() {
        let ch = test_channel();
        ch.set_payload_type(0);
        let peer = std::net::UdpSocket::bind("127.0.0.1:0").unwrap();
        peer.set_read_timeout(Some(Duration::from_millis(500))).unwrap();
        ch.set_peer(peer.local_addr().unwrap());

        let frame = Frame::new(vec![0u8; 320], MediaKind::Audio, FrameFormat::PayloadType(0), 0)
            .with_timestamp_step(160);
        let mut buf = [0u8; 1500];

        // No prior wall-clock reference: treated as the start of a burst.
        ch.send_frame(&frame).unwrap();
        let (n, _) = peer.recv_from(&mut buf).unwrap();
        assert!(RtpPacket::decode(&buf[..n]).unwrap().marker());

        // A send that "just" happened: continuous, no marker.
        ch.locked_state().last_incoming_wallclock_us = Some(now_micros());
        ch.send_frame(&frame).unwrap();
        let (n, _) = peer.recv_from(&mut buf).unwrap();
        assert!(!RtpPacket::decode(&buf[..n]).unwrap().marker());

        // A send long past the last reference: a new burst again.
        ch.locked_state().last_incoming_wallclock_us = Some(0);
        ch.send_frame(&frame).unwrap();
        let (n, _) = peer.recv_from(&mut buf).unwrap();
        assert!(RtpPacket::decode(&buf[..n]).unwrap().marker());
    }

    /// `spec.md` §4.3.3's multi-packet send contract: a frame with an
    /// `appended` fragment list is sent as one packet per fragment under
    /// the same RTP timestamp, head and inner fragments unmarked, only the
    /// terminal fragment marked.
    #[test]
    fn appended_frames_send_one_packet_each_with_terminal_marker() {
        let ch = test_channel();
        let peer = std::net::UdpSocket::bind("127.0.0.1:0").unwrap();
        peer.set_read_timeout(Some(Duration::from_millis(500))).unwrap();
        ch.set_peer(peer.local_addr().unwrap());

        let child_a = Arc::new(Frame::new(vec![2u8; 4], MediaKind::Audio, FrameFormat::PayloadType(96), 0));
        let child_b = Arc::new(Frame::new(vec![3u8; 4], MediaKind::Audio, FrameFormat::PayloadType(96), 0));
        let head = Frame::new(vec![1u8; 4], MediaKind::Audio, FrameFormat::PayloadType(96), 0)
            .with_appended(vec![child_a, child_b]);

        ch.send_frame(&head).unwrap();

        let mut buf = [0u8; 1500];
        let mut markers = Vec::new();
        let mut timestamps = Vec::new();
        for _ in 0..3 {
            let (n, _) = peer.recv_from(&mut buf).unwrap();
            let packet = RtpPacket::decode(&buf[..n]).unwrap();
            markers.push(packet.marker());
            timestamps.push(packet.timestamp());
        }
        assert_eq!(markers, vec![false, false, true]);
        assert_eq!(timestamps[0], timestamps[1]);
        assert_eq!(timestamps[1], timestamps[2]);
    }
}
