//! Per-channel send/receive direction, mirrored from SDP `a=sendrecv` /
//! `a=sendonly` / `a=recvonly` / `a=inactive` attributes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    SendRecv,
    SendOnly,
    RecvOnly,
    Inactive,
}

impl Direction {
    #[must_use]
    pub fn can_send(self) -> bool {
        matches!(self, Self::SendRecv | Self::SendOnly)
    }

    #[must_use]
    pub fn can_receive(self) -> bool {
        matches!(self, Self::SendRecv | Self::RecvOnly)
    }
}

impl Default for Direction {
    fn default() -> Self {
        Self::SendRecv
    }
}
