use std::fmt;

/// Reasons `RtpChannel::send_frame` can refuse a frame, per `spec.md`
/// §4.3.4's rejection rules.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChannelSendError {
    NoPeer,
    LockedByOther,
    MediaKindMismatch,
    WrongPayloadType { expected: u8, actual: u8 },
    NoCodec,
    Closed,
    Io(String),
}

impl fmt::Display for ChannelSendError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoPeer => write!(f, "channel has no peer to send to"),
            Self::LockedByOther => write!(f, "channel is locked by another owner"),
            Self::MediaKindMismatch => write!(f, "frame media kind does not match channel"),
            Self::WrongPayloadType { expected, actual } => {
                write!(f, "frame encoded to PT {actual}, channel expects {expected}")
            }
            Self::NoCodec => write!(f, "channel has no codec attached for a raw frame"),
            Self::Closed => write!(f, "channel is closed"),
            Self::Io(e) => write!(f, "I/O error: {e}"),
        }
    }
}

impl std::error::Error for ChannelSendError {}

impl From<std::io::Error> for ChannelSendError {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e.to_string())
    }
}

/// Reasons the receive path drops an inbound packet without surfacing it,
/// per `spec.md` §7 (logged, never propagated to the caller).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChannelRecvError {
    TooShort,
    Rtp(crate::rtp::RtpError),
    ReassemblyQueueFull,
    PayloadTypeMismatch { expected: Option<u8>, actual: u8 },
}

impl fmt::Display for ChannelRecvError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TooShort => write!(f, "packet too short to be RTP"),
            Self::Rtp(e) => write!(f, "RTP decode error: {e}"),
            Self::ReassemblyQueueFull => write!(f, "reassembly queue exceeded its bound"),
            Self::PayloadTypeMismatch { expected, actual } => {
                write!(f, "unexpected payload type {actual:?}, channel bound to {expected:?}")
            }
        }
    }
}

impl std::error::Error for ChannelRecvError {}

impl From<crate::rtp::RtpError> for ChannelRecvError {
    fn from(e: crate::rtp::RtpError) -> Self {
        Self::Rtp(e)
    }
}
