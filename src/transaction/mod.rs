//! The SIP-facing holder for one dialog's RTP channels: allocates a
//! channel per negotiated `(payload type, media kind)`, keeps it reachable
//! by both its local port and its SDP label, and propagates its callbacks
//! to whichever subscriber currently sits on top of that label's stack.
//! See `SPEC_FULL.md` §4.5.
//!
//! Distinct from [`crate::endpoint`]: §4.4's endpoint hierarchy fans events
//! to a single abstract `Connection` per channel, while a `Transaction` is
//! the lower-level per-dialog holder a SIP stack addresses by port or
//! label directly and multiplexes through a per-label subscriber stack.
//! The two are independent call surfaces over the same `RtpChannel`, not
//! layers of one another.
pub mod subscriber;

pub use subscriber::ChannelSubscriber;

use crate::channel::{ChannelEvents, ChannelSendError, Direction, DtmfEvent, RtpChannel};
use crate::codec::CodecRegistry;
use crate::collector::FrameCollector;
use crate::config::EngineConfig;
use crate::frame::{Frame, LockOwner, MediaKind};
use crate::log::log_sink::LogSink;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex, Weak};

struct SubscriberBridge {
    label: String,
    transaction: Mutex<Weak<Transaction>>,
}

impl SubscriberBridge {
    fn transaction(&self) -> Option<Arc<Transaction>> {
        self.transaction
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .upgrade()
    }
}

impl ChannelEvents for SubscriberBridge {
    fn incoming_frame(&self, frame: Arc<Frame>) {
        if let Some(tx) = self.transaction() {
            if let Some(top) = tx.top_subscriber(&self.label) {
                top.on_frame(&self.label, frame);
            }
        }
    }

    fn incoming_dtmf(&self, event: DtmfEvent) {
        if let Some(tx) = self.transaction() {
            if let Some(top) = tx.top_subscriber(&self.label) {
                top.on_dtmf(&self.label, event);
            }
        }
    }

    fn frame_sent(&self, frame: &Frame) {
        if let Some(tx) = self.transaction() {
            if let Some(top) = tx.top_subscriber(&self.label) {
                top.on_frame_sent(&self.label, frame);
            }
        }
    }

    fn channel_locked(&self, owner: LockOwner) {
        if let Some(tx) = self.transaction() {
            if let Some(top) = tx.top_subscriber(&self.label) {
                top.on_locked(&self.label, owner);
            }
        }
    }

    fn channel_unlocked(&self) {
        if let Some(tx) = self.transaction() {
            if let Some(top) = tx.top_subscriber(&self.label) {
                top.on_unlocked(&self.label);
            }
        }
    }

    fn channel_closed(&self) {
        if let Some(tx) = self.transaction() {
            tx.on_channel_closed(&self.label);
        }
    }
}

pub struct Transaction {
    /// `fromTag~toTag`.
    id: String,
    by_label: Mutex<HashMap<String, Arc<RtpChannel>>>,
    by_port: Mutex<HashMap<u16, Arc<RtpChannel>>>,
    /// One stack per label; only the last entry is ever invoked.
    subscribers: Mutex<HashMap<String, Vec<Arc<dyn ChannelSubscriber>>>>,
    registry: Arc<CodecRegistry>,
    collector: Option<Arc<FrameCollector>>,
    cfg: EngineConfig,
    logger: Arc<dyn LogSink>,
}

impl Transaction {
    #[must_use]
    pub fn new(
        id: impl Into<String>,
        cfg: EngineConfig,
        registry: Arc<CodecRegistry>,
        collector: Option<Arc<FrameCollector>>,
        logger: Arc<dyn LogSink>,
    ) -> Arc<Self> {
        Arc::new(Self {
            id: id.into(),
            by_label: Mutex::new(HashMap::new()),
            by_port: Mutex::new(HashMap::new()),
            subscribers: Mutex::new(HashMap::new()),
            registry,
            collector,
            cfg,
            logger,
        })
    }

    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Allocate a new RTP channel for `label`, bound to `pt` on `local`.
    pub fn allocate_channel(
        self: &Arc<Self>,
        label: impl Into<String>,
        media_kind: MediaKind,
        pt: u8,
        local: SocketAddr,
    ) -> std::io::Result<Arc<RtpChannel>> {
        let label = label.into();
        let bridge = Arc::new(SubscriberBridge {
            label: label.clone(),
            transaction: Mutex::new(Weak::new()),
        });
        *bridge.transaction.lock().unwrap_or_else(std::sync::PoisonError::into_inner) =
            Arc::downgrade(self);

        let channel = RtpChannel::new(
            self.cfg.clone(),
            local,
            media_kind,
            Arc::clone(&self.registry),
            self.collector.clone(),
            bridge,
            Arc::clone(&self.logger),
        )?;
        channel.set_payload_type(pt);
        let port = channel.local_addr()?.port();

        self.by_label
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .insert(label, Arc::clone(&channel));
        self.by_port
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .insert(port, Arc::clone(&channel));
        channel.start();
        Ok(channel)
    }

    #[must_use]
    pub fn channel_by_label(&self, label: &str) -> Option<Arc<RtpChannel>> {
        self.by_label
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .get(label)
            .cloned()
    }

    #[must_use]
    pub fn channel_by_port(&self, port: u16) -> Option<Arc<RtpChannel>> {
        self.by_port
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .get(&port)
            .cloned()
    }

    pub fn set_peer(&self, label: &str, peer: SocketAddr) -> bool {
        let Some(channel) = self.channel_by_label(label) else {
            return false;
        };
        channel.set_peer(peer);
        true
    }

    pub fn set_direction(&self, label: &str, direction: Direction) -> bool {
        let Some(channel) = self.channel_by_label(label) else {
            return false;
        };
        channel.set_direction(direction);
        true
    }

    pub fn set_clock_rate(&self, label: &str, clock_rate: u32) -> bool {
        let Some(channel) = self.channel_by_label(label) else {
            return false;
        };
        channel.set_clock_rate(clock_rate);
        true
    }

    pub fn send_frame(&self, label: &str, frame: &Frame) -> Result<(), ChannelSendError> {
        let channel = self.channel_by_label(label).ok_or(ChannelSendError::NoPeer)?;
        channel.send_frame(frame)
    }

    /// Push `subscriber` onto `label`'s stack without disturbing whatever
    /// is already registered underneath it.
    pub fn register_subscriber(&self, label: &str, subscriber: Arc<dyn ChannelSubscriber>) {
        self.subscribers
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .entry(label.to_string())
            .or_default()
            .push(subscriber);
    }

    /// Push `subscriber` onto every currently-known label's stack.
    pub fn register_subscriber_all(&self, subscriber: Arc<dyn ChannelSubscriber>) {
        let labels: Vec<String> = self
            .by_label
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .keys()
            .cloned()
            .collect();
        for label in labels {
            self.register_subscriber(&label, Arc::clone(&subscriber));
        }
    }

    /// Clears the ENTIRE stack for `label`, not just the top — this is the
    /// explicit, preserved behavior: unregistering doesn't pop one
    /// subscriber back to the next one underneath, it drops the whole
    /// stack for that label.
    pub fn unregister_subscriber(&self, label: &str) {
        self.subscribers
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .remove(label);
    }

    pub fn unregister_all(&self) {
        self.subscribers
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .clear();
    }

    fn top_subscriber(&self, label: &str) -> Option<Arc<dyn ChannelSubscriber>> {
        self.subscribers
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .get(label)
            .and_then(|stack| stack.last())
            .cloned()
    }

    fn on_channel_closed(&self, label: &str) {
        if let Some(top) = self.top_subscriber(label) {
            top.on_closed(label);
        }
        self.unregister_subscriber(label);
        let channel = self
            .by_label
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .remove(label);
        if let Some(channel) = channel {
            if let Ok(addr) = channel.local_addr() {
                self.by_port
                    .lock()
                    .unwrap_or_else(std::sync::PoisonError::into_inner)
                    .remove(&addr.port());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]
    use super::*;
    use crate::codec::CodecRegistry;
    use crate::frame::FrameFormat;
    use crate::log::NoopLogSink;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[derive(Default)]
    struct RecordingSubscriber {
        frames: Mutex<Vec<(String, Arc<Frame>)>>,
        dtmf: Mutex<Vec<(String, DtmfEvent)>>,
        locked: Mutex<Vec<(String, LockOwner)>>,
        unlocked: Mutex<Vec<String>>,
        sent: Mutex<usize>,
        closed: Mutex<Vec<String>>,
    }

    impl ChannelSubscriber for RecordingSubscriber {
        fn on_frame(&self, label: &str, frame: Arc<Frame>) {
            self.frames
                .lock()
                .unwrap_or_else(std::sync::PoisonError::into_inner)
                .push((label.to_string(), frame));
        }
        fn on_dtmf(&self, label: &str, event: DtmfEvent) {
            self.dtmf
                .lock()
                .unwrap_or_else(std::sync::PoisonError::into_inner)
                .push((label.to_string(), event));
        }
        fn on_locked(&self, label: &str, owner: LockOwner) {
            self.locked
                .lock()
                .unwrap_or_else(std::sync::PoisonError::into_inner)
                .push((label.to_string(), owner));
        }
        fn on_unlocked(&self, label: &str) {
            self.unlocked
                .lock()
                .unwrap_or_else(std::sync::PoisonError::into_inner)
                .push(label.to_string());
        }
        fn on_frame_sent(&self, _label: &str, _frame: &Frame) {
            *self.sent.lock().unwrap_or_else(std::sync::PoisonError::into_inner) += 1;
        }
        fn on_closed(&self, label: &str) {
            self.closed
                .lock()
                .unwrap_or_else(std::sync::PoisonError::into_inner)
                .push(label.to_string());
        }
    }

    fn test_transaction() -> Arc<Transaction> {
        Transaction::new(
            "from~to",
            EngineConfig::default(),
            Arc::new(CodecRegistry::with_defaults()),
            None,
            Arc::new(NoopLogSink::default()),
        )
    }

    fn localhost() -> SocketAddr {
        "127.0.0.1:0".parse().expect("valid loopback addr")
    }

    #[test]
    fn allocate_channel_is_reachable_by_label_and_port() {
        let tx = test_transaction();
        let channel = tx
            .allocate_channel("audio", MediaKind::Audio, 0, localhost())
            .unwrap();
        let port = channel.local_addr().unwrap().port();

        assert!(tx.channel_by_label("audio").is_some());
        assert!(tx.channel_by_port(port).is_some());
        assert!(tx.channel_by_label("video").is_none());

        tx.channel_by_label("audio").unwrap().stop();
    }

    #[test]
    fn only_the_top_subscriber_is_notified() {
        let tx = test_transaction();
        tx.allocate_channel("audio", MediaKind::Audio, 0, localhost()).unwrap();

        let first = Arc::new(RecordingSubscriber::default());
        let second = Arc::new(RecordingSubscriber::default());
        tx.register_subscriber("audio", first.clone());
        tx.register_subscriber("audio", second.clone());

        let frame = Arc::new(Frame::new(vec![0u8; 4], MediaKind::Audio, FrameFormat::Raw, 0));
        if let Some(top) = tx.top_subscriber("audio") {
            top.on_frame("audio", frame);
        }

        assert_eq!(first.frames.lock().unwrap().len(), 0);
        assert_eq!(second.frames.lock().unwrap().len(), 1);

        tx.channel_by_label("audio").unwrap().stop();
    }

    #[test]
    fn unregister_clears_the_whole_stack() {
        let tx = test_transaction();
        tx.allocate_channel("audio", MediaKind::Audio, 0, localhost()).unwrap();

        tx.register_subscriber("audio", Arc::new(RecordingSubscriber::default()));
        tx.register_subscriber("audio", Arc::new(RecordingSubscriber::default()));
        assert!(tx.top_subscriber("audio").is_some());

        tx.unregister_subscriber("audio");
        assert!(tx.top_subscriber("audio").is_none());

        tx.channel_by_label("audio").unwrap().stop();
    }

    #[test]
    fn send_frame_routes_by_label() {
        let tx = test_transaction();
        let channel = tx
            .allocate_channel("audio", MediaKind::Audio, 0, localhost())
            .unwrap();
        channel.set_peer("127.0.0.1:9".parse().unwrap());

        let frame = Frame::new(vec![0u8; 320], MediaKind::Audio, FrameFormat::PayloadType(0), 0);
        assert!(tx.send_frame("audio", &frame).is_ok());
        assert_eq!(
            tx.send_frame("missing", &frame),
            Err(ChannelSendError::NoPeer)
        );

        channel.stop();
    }

    #[test]
    fn closing_a_channel_notifies_the_top_subscriber_and_forgets_it() {
        let tx = test_transaction();
        let channel = tx
            .allocate_channel("audio", MediaKind::Audio, 0, localhost())
            .unwrap();
        let port = channel.local_addr().unwrap().port();

        let subscriber = Arc::new(RecordingSubscriber::default());
        tx.register_subscriber("audio", subscriber.clone());

        channel.stop();
        let deadline = std::time::Instant::now() + Duration::from_secs(2);
        while subscriber.closed.lock().unwrap().is_empty() && std::time::Instant::now() < deadline {
            std::thread::sleep(Duration::from_millis(5));
        }

        assert_eq!(subscriber.closed.lock().unwrap().as_slice(), ["audio"]);
        assert!(tx.channel_by_label("audio").is_none());
        assert!(tx.channel_by_port(port).is_none());
        assert!(tx.top_subscriber("audio").is_none());
    }

    #[test]
    fn register_subscriber_all_covers_every_known_label() {
        let tx = test_transaction();
        tx.allocate_channel("audio", MediaKind::Audio, 0, localhost()).unwrap();
        tx.allocate_channel("video", MediaKind::Unknown, 96, localhost())
            .unwrap();

        let count = Arc::new(AtomicUsize::new(0));
        struct CountingSubscriber(Arc<AtomicUsize>);
        impl ChannelSubscriber for CountingSubscriber {
            fn on_frame(&self, _label: &str, _frame: Arc<Frame>) {}
            fn on_dtmf(&self, _label: &str, _event: DtmfEvent) {}
            fn on_locked(&self, _label: &str, _owner: LockOwner) {}
            fn on_unlocked(&self, _label: &str) {}
            fn on_frame_sent(&self, _label: &str, _frame: &Frame) {
                self.0.fetch_add(1, Ordering::SeqCst);
            }
            fn on_closed(&self, _label: &str) {}
        }
        tx.register_subscriber_all(Arc::new(CountingSubscriber(count)));

        assert!(tx.top_subscriber("audio").is_some());
        assert!(tx.top_subscriber("video").is_some());

        tx.channel_by_label("audio").unwrap().stop();
        tx.channel_by_label("video").unwrap().stop();
    }
}
