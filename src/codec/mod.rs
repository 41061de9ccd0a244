//! Codec instances and the registry that creates them from an RTP payload
//! type or an SDP `rtpmap` name. See `SPEC_FULL.md` §4.2.
pub mod error;
pub mod fmtp;
pub mod gsm;
pub mod pcma;
pub mod pcmu;
pub mod registry;

pub use error::CodecError;
pub use registry::{CodecFactory, CodecKind, CodecRegistry};

use crate::frame::Frame;

/// Audio frames in this crate are always 20ms @ 8kHz: 160 linear samples.
pub const SAMPLES_PER_BLOCK: usize = 160;

/// Contract a codec instance implements, per `spec.md` §4.2. `encode` and
/// `decode` return `Err` instead of a C-style `nullptr`; the RTP channel
/// treats every `Err` as a silent drop (logged, never surfaced), which is
/// the same behavior the "or nil" language describes.
pub trait Codec: Send {
    /// Does this codec own the given dynamic/static AVT payload type?
    fn matches_avt(&self, pt: u8) -> bool;
    /// Does this codec's name match an SDP `rtpmap` encoding name
    /// (case-insensitive)?
    fn matches_name(&self, name: &str) -> bool;
    /// Initialize any stateful encode/decode context. Must be called before
    /// `encode`/`decode`; returns `false` on failure (e.g. GSM's coder
    /// construction failing), which detaches the codec per `spec.md` §7.
    fn start(&mut self) -> bool;
    /// Apply a pre-startup setting extracted from an SDP `fmtp` attribute.
    fn add_setting(&mut self, key: &str, value: &str);
    fn get_setting(&self, key: &str) -> Option<String>;
    /// Encode a raw frame. Fails if the codec hasn't started or the frame
    /// isn't raw (no encoded-to-encoded transcoding, ever).
    fn encode(&mut self, frame: &Frame) -> Result<Frame, CodecError>;
    /// Decode an encoded frame back to raw linear samples.
    fn decode(&mut self, frame: &Frame) -> Result<Frame, CodecError>;
    fn payload_type(&self) -> u8;
    fn block_len(&self) -> usize;
    fn name(&self) -> &'static str;
}
