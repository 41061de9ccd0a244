use std::fmt;

/// Failures a codec instance or the registry can report. Per `spec.md` §7
/// these are almost all "silently dropped at the call site, logged at
/// debug" kinds rather than propagated errors — the enum exists so the
/// RTP channel can tell which drop happened for its own logging, not so
/// callers must handle each variant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CodecError {
    /// `encode`/`decode` got a buffer whose length doesn't match the
    /// codec's fixed block length (e.g. GSM given anything but 160
    /// samples / 320 bytes).
    InvalidLength { expected: usize, actual: usize },
    /// `encode` was asked to transcode a frame that was already encoded.
    NotRaw,
    /// `start()` was never called, or failed and left no usable context.
    NotStarted,
    /// No factory in the registry matches the requested name or payload type.
    NoMatchingFactory,
}

impl fmt::Display for CodecError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidLength { expected, actual } => {
                write!(f, "invalid buffer length: expected {expected}, got {actual}")
            }
            Self::NotRaw => write!(f, "encode requires a raw frame"),
            Self::NotStarted => write!(f, "codec not started"),
            Self::NoMatchingFactory => write!(f, "no codec factory matches"),
        }
    }
}

impl std::error::Error for CodecError {}
