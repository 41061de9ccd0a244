//! Callback surface an `RtpChannel` drives, mirroring
//! `original_source`'s `MediaCtrlRtpManager` listener interface
//! (`incomingFrame`, `incomingDtmf`, `frameSent`, `channelLocked`,
//! `channelUnlocked`, `channelClosed`) minus `createCodec`/`getBlockLen`,
//! which this crate resolves through [`crate::codec::CodecRegistry`]
//! instead of delegating back to the listener.
use crate::channel::DtmfEvent;
use crate::frame::{Frame, LockOwner};
use std::sync::Arc;

pub trait ChannelEvents: Send + Sync {
    fn incoming_frame(&self, frame: Arc<Frame>);
    fn incoming_dtmf(&self, event: DtmfEvent);
    fn frame_sent(&self, frame: &Frame);
    fn channel_locked(&self, owner: LockOwner);
    fn channel_unlocked(&self);
    fn channel_closed(&self);
}
