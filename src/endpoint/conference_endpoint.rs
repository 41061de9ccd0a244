//! Degenerate endpoint variant for a conference leg that has an abstract
//! [`Connection`] but no RTP channel of its own — media for it arrives and
//! leaves through whatever mixer/bridge owns the real channels. Most
//! channel-shaped operations are no-ops here, per `spec.md` §4.4.
use super::connection::Connection;
use crate::channel::{ChannelSendError, DtmfEvent};
use crate::frame::Frame;
use std::sync::{Arc, Mutex};

pub struct ConferenceEndpoint {
    key: String,
    connection: Mutex<Option<Arc<dyn Connection>>>,
}

impl ConferenceEndpoint {
    #[must_use]
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            connection: Mutex::new(None),
        }
    }

    #[must_use]
    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn attach_connection(&self, connection: Arc<dyn Connection>) {
        *self.connection.lock().unwrap_or_else(std::sync::PoisonError::into_inner) = Some(connection);
    }

    pub fn deliver_frame(&self, frame: Arc<Frame>) {
        if let Some(conn) = self.connection.lock().unwrap_or_else(std::sync::PoisonError::into_inner).clone() {
            conn.on_frame(frame);
        }
    }

    /// Always fails: a conference endpoint has no RTP channel to send on.
    pub fn send_frame(&self, _frame: &Frame) -> Result<(), ChannelSendError> {
        Err(ChannelSendError::NoPeer)
    }

    #[must_use]
    pub fn next_dtmf(&self) -> Option<DtmfEvent> {
        None
    }

    pub fn close(&self) {
        if let Some(conn) = self.connection.lock().unwrap_or_else(std::sync::PoisonError::into_inner).take() {
            conn.on_closed();
        }
    }
}
