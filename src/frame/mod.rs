//! The typed byte buffer that flows through every other module: one RTP
//! payload (or reassembled burst of them) plus the metadata the codec
//! registry, RTP channel, and endpoint layers need to route it.
mod kind;
mod lock_owner;

pub use kind::{FrameFormat, FrameKind, MediaKind};
pub use lock_owner::LockOwner;

use bytes::Bytes;
use std::sync::{Arc, Weak};

/// A tiny hand-rolled bitflags so the crate doesn't need to pull in the
/// `bitflags` crate for four bits; mirrors the plain-struct-of-consts style
/// the teacher crate already uses for its own flag-ish enums.
macro_rules! bitflags_like {
    (
        $(#[$meta:meta])*
        pub struct $name:ident($repr:ty) {
            $(const $variant:ident = $value:expr;)*
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
        pub struct $name(pub $repr);

        impl $name {
            $(pub const $variant: $name = $name($value);)*

            #[must_use]
            pub fn contains(self, other: $name) -> bool {
                (self.0 & other.0) == other.0
            }
        }

        impl std::ops::BitOr for $name {
            type Output = $name;
            fn bitor(self, rhs: $name) -> $name {
                $name(self.0 | rhs.0)
            }
        }

        impl std::ops::BitOrAssign for $name {
            fn bitor_assign(&mut self, rhs: $name) {
                self.0 |= rhs.0;
            }
        }
    };
}

bitflags_like! {
    /// Bit flags carried alongside a frame. Currently only a handful of bits
    /// are meaningful; the mask exists so callers above this crate can stash
    /// their own without a schema change.
    pub struct FrameFlags(u32) {
        const NONE = 0;
        const SILENCE = 1 << 0;
        const DISCONTINUITY = 1 << 1;
    }
}

/// One unit of media data moving through the engine.
///
/// A `Frame` owns its buffer. Frames produced by the RTP channel's receive
/// path are registered with a [`crate::collector::FrameCollector`] so they
/// are reclaimed a bounded time after creation even if nothing downstream
/// ever calls `release`; callers that need a frame to outlive that window
/// must keep their own `Arc` clone (see `SPEC_FULL.md` §3).
#[derive(Clone)]
pub struct Frame {
    buffer: Bytes,
    /// RTP clock ticks this frame advances the stream by (e.g. 160 for a
    /// 20ms/8kHz audio frame). Zero for frames that don't carry a time step
    /// of their own (appended fragments reuse the head's `num`).
    pub timestamp_step: u32,
    pub media_kind: MediaKind,
    pub format: FrameFormat,
    pub kind: FrameKind,
    pub flags: FrameFlags,
    /// True when the buffer was handed in from outside this crate (e.g. a
    /// caller-owned scratch buffer) rather than allocated by a codec.
    pub allocated_externally: bool,
    /// Microsecond timestamp this frame was constructed, used by the
    /// collector to decide when it is eligible for reclamation.
    pub birth_us: u64,
    /// Set by `sendFrame` when `kind` is `Locking`/`Unlocking`; identifies
    /// the caller who currently holds (or is releasing) the channel lock.
    pub owner: Option<LockOwner>,
    /// Opaque dialog/transaction correlation string, threaded through for
    /// logging and fan-out; not interpreted by this module.
    pub transaction_id: Option<String>,
    /// Fragments appended after this one in arrival order. Only ever set on
    /// the head frame of a marker-bit-delimited reassembly burst.
    pub appended: Option<Vec<Arc<Frame>>>,
    /// Non-owning back-link to the encoded frame a decoded frame came from.
    /// A `Weak` reference per `SPEC_FULL.md` §3: the collector/arena is the
    /// sole owner, so this link can never keep a frame alive past its window.
    pub original: Option<Weak<Frame>>,
}

impl Frame {
    /// Construct a frame from an owned or borrowed byte slice. `birth_us`
    /// should come from [`crate::util::now_micros`] at the call site so
    /// callers that synthesize frames for tests can control it.
    pub fn new(
        buffer: impl Into<Bytes>,
        media_kind: MediaKind,
        format: FrameFormat,
        birth_us: u64,
    ) -> Self {
        Self {
            buffer: buffer.into(),
            timestamp_step: 0,
            media_kind,
            format,
            kind: FrameKind::Normal,
            flags: FrameFlags::NONE,
            allocated_externally: false,
            birth_us,
            owner: None,
            transaction_id: None,
            appended: None,
            original: None,
        }
    }

    pub fn with_timestamp_step(mut self, step: u32) -> Self {
        self.timestamp_step = step;
        self
    }

    pub fn with_kind(mut self, kind: FrameKind) -> Self {
        self.kind = kind;
        self
    }

    pub fn with_owner(mut self, owner: LockOwner) -> Self {
        self.owner = Some(owner);
        self
    }

    pub fn with_transaction_id(mut self, id: impl Into<String>) -> Self {
        self.transaction_id = Some(id.into());
        self
    }

    pub fn with_original(mut self, original: &Arc<Frame>) -> Self {
        self.original = Some(Arc::downgrade(original));
        self
    }

    pub fn with_appended(mut self, appended: Vec<Arc<Frame>>) -> Self {
        self.appended = if appended.is_empty() {
            None
        } else {
            Some(appended)
        };
        self
    }

    #[must_use]
    pub fn buffer(&self) -> &[u8] {
        &self.buffer
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    #[must_use]
    pub fn is_raw(&self) -> bool {
        matches!(self.format, FrameFormat::Raw)
    }

    #[must_use]
    pub fn payload_type(&self) -> Option<u8> {
        match self.format {
            FrameFormat::PayloadType(pt) => Some(pt),
            FrameFormat::Raw => None,
        }
    }

    /// Number of fragments this frame represents once `appended` is counted:
    /// 1 for an ordinary frame, `1 + appended.len()` for a reassembled head.
    #[must_use]
    pub fn fragment_count(&self) -> usize {
        1 + self.appended.as_ref().map_or(0, Vec::len)
    }

    /// `now - birth_us >= window`, the collector's reclamation predicate.
    #[must_use]
    pub fn reclaimable_at(&self, now_us: u64, window_us: u64) -> bool {
        now_us.saturating_sub(self.birth_us) >= window_us
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]
    use super::*;

    #[test]
    fn reclaimable_after_window() {
        let f = Frame::new(vec![0u8; 4], MediaKind::Audio, FrameFormat::Raw, 1_000_000);
        assert!(!f.reclaimable_at(3_999_999, 3_000_000));
        assert!(f.reclaimable_at(4_000_000, 3_000_000));
    }

    #[test]
    fn appended_only_counted_when_non_empty() {
        let head = Arc::new(Frame::new(vec![1], MediaKind::Audio, FrameFormat::Raw, 0));
        let child = Arc::new(Frame::new(vec![2], MediaKind::Audio, FrameFormat::Raw, 0));
        let with_children =
            Frame::new(vec![1], MediaKind::Audio, FrameFormat::Raw, 0).with_appended(vec![child]);
        assert_eq!(with_children.fragment_count(), 2);
        assert_eq!(head.fragment_count(), 1);
    }

    #[test]
    fn original_back_link_is_non_owning() {
        let encoded = Arc::new(Frame::new(
            vec![9],
            MediaKind::Audio,
            FrameFormat::PayloadType(0),
            0,
        ));
        let decoded = Frame::new(vec![0; 160], MediaKind::Audio, FrameFormat::Raw, 0)
            .with_original(&encoded);
        drop(encoded);
        assert!(decoded.original.unwrap().upgrade().is_none());
    }
}
