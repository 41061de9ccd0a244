//! One `label`'s worth of media within a dialog: owns exactly one
//! [`RtpChannel`] and fans its callbacks out to both the owning
//! [`super::TransactionEndpoint`] and whatever abstract [`Connection`] is
//! currently attached, per `spec.md` §4.4.
use crate::channel::{ChannelEvents, DtmfEvent, RtpChannel};
use crate::config::EngineConfig;
use crate::frame::{Frame, LockOwner, MediaKind};
use crate::log::log_sink::LogSink;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, Weak};

use super::connection::Connection;
use super::transaction_endpoint::TransactionEndpoint;

/// Bridges [`ChannelEvents`] callbacks from an [`RtpChannel`] back to its
/// owning [`ChannelEndpoint`], which can only be named once the endpoint
/// itself exists — the two are constructed in two phases for that reason.
struct ChannelEventBridge {
    endpoint: Mutex<Weak<ChannelEndpoint>>,
}

impl ChannelEventBridge {
    fn endpoint(&self) -> Option<Arc<ChannelEndpoint>> {
        self.endpoint
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .upgrade()
    }
}

impl ChannelEvents for ChannelEventBridge {
    fn incoming_frame(&self, frame: Arc<Frame>) {
        if let Some(ep) = self.endpoint() {
            ep.on_incoming_frame(frame);
        }
    }

    fn incoming_dtmf(&self, event: DtmfEvent) {
        if let Some(ep) = self.endpoint() {
            ep.on_incoming_dtmf(event);
        }
    }

    fn frame_sent(&self, frame: &Frame) {
        if let Some(ep) = self.endpoint() {
            ep.on_frame_sent(frame);
        }
    }

    fn channel_locked(&self, owner: LockOwner) {
        if let Some(ep) = self.endpoint() {
            ep.on_channel_locked(owner);
        }
    }

    fn channel_unlocked(&self) {
        if let Some(ep) = self.endpoint() {
            ep.on_channel_unlocked();
        }
    }

    fn channel_closed(&self) {
        if let Some(ep) = self.endpoint() {
            ep.on_channel_closed();
        }
    }
}

pub struct ChannelEndpoint {
    /// `fromTag~toTag/label`.
    key: String,
    channel: Arc<RtpChannel>,
    connection: Mutex<Option<Arc<dyn Connection>>>,
    transaction: Mutex<Option<Weak<TransactionEndpoint>>>,
    ref_count: AtomicUsize,
}

impl ChannelEndpoint {
    pub fn new(
        key: impl Into<String>,
        cfg: EngineConfig,
        local: SocketAddr,
        media_kind: MediaKind,
        registry: Arc<crate::codec::CodecRegistry>,
        collector: Option<Arc<crate::collector::FrameCollector>>,
        logger: Arc<dyn LogSink>,
    ) -> std::io::Result<Arc<Self>> {
        let bridge = Arc::new(ChannelEventBridge {
            endpoint: Mutex::new(Weak::new()),
        });
        let channel = RtpChannel::new(cfg, local, media_kind, registry, collector, bridge.clone(), logger)?;
        let endpoint = Arc::new(Self {
            key: key.into(),
            channel,
            connection: Mutex::new(None),
            transaction: Mutex::new(None),
            ref_count: AtomicUsize::new(1),
        });
        *bridge.endpoint.lock().unwrap_or_else(std::sync::PoisonError::into_inner) =
            Arc::downgrade(&endpoint);
        Ok(endpoint)
    }

    #[must_use]
    pub fn key(&self) -> &str {
        &self.key
    }

    #[must_use]
    pub fn channel(&self) -> &Arc<RtpChannel> {
        &self.channel
    }

    #[must_use]
    pub fn media_kind(&self) -> MediaKind {
        self.channel.media_kind()
    }

    pub fn attach_connection(&self, connection: Arc<dyn Connection>) {
        *self.connection.lock().unwrap_or_else(std::sync::PoisonError::into_inner) = Some(connection);
    }

    pub fn detach_connection(&self) {
        *self.connection.lock().unwrap_or_else(std::sync::PoisonError::into_inner) = None;
    }

    pub(super) fn set_transaction(&self, transaction: Weak<TransactionEndpoint>) {
        *self.transaction.lock().unwrap_or_else(std::sync::PoisonError::into_inner) = Some(transaction);
    }

    fn transaction(&self) -> Option<Arc<TransactionEndpoint>> {
        self.transaction
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .as_ref()
            .and_then(Weak::upgrade)
    }

    fn connection(&self) -> Option<Arc<dyn Connection>> {
        self.connection.lock().unwrap_or_else(std::sync::PoisonError::into_inner).clone()
    }

    /// The first increment (0 -> 1) wakes the underlying RTP channel, per
    /// `spec.md` §4.4.
    pub fn retain(&self) {
        if self.ref_count.fetch_add(1, Ordering::SeqCst) == 0 {
            self.channel.wake();
        }
    }

    /// Returns `true` if this was the last reference (caller should close).
    /// The last decrement (1 -> 0) idles the underlying RTP channel, per
    /// `spec.md` §4.4.
    pub fn release(&self) -> bool {
        let previous = self.ref_count.fetch_sub(1, Ordering::SeqCst);
        if previous == 1 {
            self.channel.idle();
        }
        previous == 1
    }

    pub fn close(self: &Arc<Self>) {
        self.channel.stop();
    }

    fn on_incoming_frame(&self, frame: Arc<Frame>) {
        if let Some(tx) = self.transaction() {
            tx.on_channel_frame(&self.key, Arc::clone(&frame));
        }
        if let Some(conn) = self.connection() {
            conn.on_frame(frame);
        }
    }

    fn on_incoming_dtmf(&self, event: DtmfEvent) {
        if let Some(tx) = self.transaction() {
            tx.on_channel_dtmf(&self.key, event);
        }
        if let Some(conn) = self.connection() {
            conn.on_dtmf(event);
        }
    }

    fn on_frame_sent(&self, frame: &Frame) {
        if let Some(tx) = self.transaction() {
            tx.on_channel_frame_sent(&self.key, frame);
        }
        if let Some(conn) = self.connection() {
            conn.on_frame_sent(frame);
        }
    }

    fn on_channel_locked(&self, owner: LockOwner) {
        if let Some(tx) = self.transaction() {
            tx.on_channel_locked(&self.key, owner);
        }
        if let Some(conn) = self.connection() {
            conn.on_channel_locked(owner);
        }
    }

    fn on_channel_unlocked(&self) {
        if let Some(tx) = self.transaction() {
            tx.on_channel_unlocked(&self.key);
        }
        if let Some(conn) = self.connection() {
            conn.on_channel_unlocked();
        }
    }

    fn on_channel_closed(&self) {
        if let Some(tx) = self.transaction() {
            tx.on_channel_closed(&self.key);
        }
        if let Some(conn) = self.connection() {
            conn.on_closed();
        }
    }
}
