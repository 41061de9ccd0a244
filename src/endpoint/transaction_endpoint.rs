//! Owns every [`ChannelEndpoint`] belonging to one dialog leg (keyed
//! `fromTag~toTag`), dispatches outbound frames to whichever owned channel
//! matches the frame's media kind, and fans retain/release across all of
//! them so the dialog's channels share one lifetime.
use crate::channel::{ChannelSendError, DtmfEvent};
use crate::frame::{Frame, LockOwner, MediaKind};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use super::channel_endpoint::ChannelEndpoint;

pub struct TransactionEndpoint {
    /// `fromTag~toTag`.
    key: String,
    channels: Mutex<HashMap<String, Arc<ChannelEndpoint>>>,
    ref_count: AtomicUsize,
}

impl TransactionEndpoint {
    #[must_use]
    pub fn new(key: impl Into<String>) -> Arc<Self> {
        Arc::new(Self {
            key: key.into(),
            channels: Mutex::new(HashMap::new()),
            ref_count: AtomicUsize::new(1),
        })
    }

    #[must_use]
    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn add_channel(self: &Arc<Self>, endpoint: Arc<ChannelEndpoint>) {
        endpoint.set_transaction(Arc::downgrade(self));
        self.channels
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .insert(endpoint.key().to_string(), endpoint);
    }

    pub fn remove_channel(&self, label: &str) -> Option<Arc<ChannelEndpoint>> {
        self.channels
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .remove(label)
    }

    #[must_use]
    pub fn channel(&self, label: &str) -> Option<Arc<ChannelEndpoint>> {
        self.channels
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .get(label)
            .cloned()
    }

    fn channel_for_media(&self, kind: MediaKind) -> Option<Arc<ChannelEndpoint>> {
        self.channels
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .values()
            .find(|c| c.media_kind() == kind)
            .cloned()
    }

    /// Route a frame to whichever owned channel matches its media kind.
    pub fn send_frame(&self, frame: &Frame) -> Result<(), ChannelSendError> {
        let endpoint = self
            .channel_for_media(frame.media_kind)
            .ok_or(ChannelSendError::MediaKindMismatch)?;
        endpoint.channel().send_frame(frame)
    }

    /// Pop the oldest queued DTMF tone from the first audio channel, per
    /// `spec.md` §4.4 ("DTMF query returns the tone from the first audio
    /// channel").
    #[must_use]
    pub fn next_dtmf(&self) -> Option<DtmfEvent> {
        self.channel_for_media(MediaKind::Audio)
            .and_then(|c| c.channel().next_dtmf())
    }

    pub(super) fn on_channel_frame(&self, _label: &str, _frame: Arc<crate::frame::Frame>) {
        // Per-channel frames are already fanned to the attached Connection
        // by ChannelEndpoint; the transaction itself doesn't need to react
        // beyond being the routing table, so there's nothing to do here
        // yet. Kept as a seam for dialog-level frame accounting.
    }

    pub(super) fn on_channel_dtmf(&self, _label: &str, _event: DtmfEvent) {
        // Seam for dialog-level DTMF accounting; see `on_channel_frame`.
    }

    pub(super) fn on_channel_frame_sent(&self, _label: &str, _frame: &Frame) {
        // Seam for dialog-level frame accounting; see `on_channel_frame`.
    }

    pub(super) fn on_channel_locked(&self, _label: &str, _owner: LockOwner) {
        // Seam for dialog-level lock accounting; see `on_channel_frame`.
    }

    pub(super) fn on_channel_unlocked(&self, _label: &str) {
        // Seam for dialog-level lock accounting; see `on_channel_frame`.
    }

    pub(super) fn on_channel_closed(&self, label: &str) {
        self.remove_channel(label);
    }

    pub fn retain(self: &Arc<Self>) {
        self.ref_count.fetch_add(1, Ordering::SeqCst);
        for ch in self
            .channels
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .values()
        {
            ch.retain();
        }
    }

    /// Releases this transaction's reference and fans the release across
    /// every owned channel; closes the transaction once its count hits zero.
    pub fn release(self: &Arc<Self>) {
        let to_close: Vec<Arc<ChannelEndpoint>> = self
            .channels
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .values()
            .cloned()
            .collect();
        for ch in &to_close {
            if ch.release() {
                ch.close();
            }
        }
        if self.ref_count.fetch_sub(1, Ordering::SeqCst) == 1 {
            self.close();
        }
    }

    fn close(self: &Arc<Self>) {
        let channels: Vec<Arc<ChannelEndpoint>> = self
            .channels
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .drain()
            .map(|(_, v)| v)
            .collect();
        for ch in channels {
            ch.close();
        }
    }
}
