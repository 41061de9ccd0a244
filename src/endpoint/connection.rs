//! The abstract side of a [`super::ChannelEndpoint`]: whatever business
//! logic (call control, an announcement player, a recorder) wants to react
//! to a channel's traffic implements this instead of talking to
//! [`crate::channel::RtpChannel`] directly.
use crate::channel::DtmfEvent;
use crate::frame::{Frame, LockOwner};
use std::sync::Arc;

pub trait Connection: Send + Sync {
    fn on_frame(&self, frame: Arc<Frame>);
    fn on_dtmf(&self, event: DtmfEvent);
    fn on_channel_locked(&self, owner: LockOwner);
    fn on_channel_unlocked(&self);
    fn on_frame_sent(&self, frame: &Frame);
    fn on_closed(&self);
}
