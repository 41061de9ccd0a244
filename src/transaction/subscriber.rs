//! The listener interface a [`super::Transaction`] drives per label. Only
//! the subscriber on top of a label's stack is ever invoked — see
//! `SPEC_FULL.md` §4.5's Open Question #1 for why registering a new
//! subscriber doesn't evict the ones beneath it, but unregistering does.
use crate::channel::DtmfEvent;
use crate::frame::{Frame, LockOwner};
use std::sync::Arc;

pub trait ChannelSubscriber: Send + Sync {
    fn on_frame(&self, label: &str, frame: Arc<Frame>);
    fn on_dtmf(&self, label: &str, event: DtmfEvent);
    fn on_locked(&self, label: &str, owner: LockOwner);
    fn on_unlocked(&self, label: &str);
    fn on_frame_sent(&self, label: &str, frame: &Frame);
    fn on_closed(&self, label: &str);
}
