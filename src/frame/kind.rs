/// Coarse media category. Video is deliberately absent: `spec.md`'s
/// Non-goals exclude video beyond packetization structure, and nothing in
/// this crate decodes or encodes it, so there is no `Video` variant to
/// half-implement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MediaKind {
    Audio,
    Unknown,
}

/// What a frame's buffer contains: decoded linear samples, or payload
/// encoded for a specific RTP payload type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FrameFormat {
    Raw,
    PayloadType(u8),
}

/// Ordinary media, or one half of the advisory locking protocol described
/// in `spec.md` §4.3.4 / §5: a `Locking` frame still carries real payload
/// and is still transmitted, but it also claims the channel lock for its
/// `owner`; `Unlocking` releases it. Both still flow through encode/decode
/// like any other frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FrameKind {
    Normal,
    Locking,
    Unlocking,
}
