//! `mediacore` is the media-plane engine sitting behind a SIP stack: it
//! turns negotiated SDP into live RTP channels, decodes/encodes the codecs
//! a deployment actually carries (PCMU, PCMA, GSM), and exposes a small
//! endpoint hierarchy a signaling layer drives without touching sockets
//! directly.
//!
//! The crate is structured bottom-up: wire format, then the codec plugins,
//! then frame lifetime management, then the RTP channel, then the endpoint
//! and transaction layers that a SIP stack actually calls into.

/// Engine-wide configuration: timing, buffer, and capacity knobs threaded
/// through every constructor instead of read from globals.
pub mod config;
/// The typed byte buffer (`Frame`) that flows through every other module.
pub mod frame;
/// Deferred reclamation for frames that outlive a single call stack.
pub mod collector;
/// Codec plugins (PCMU, PCMA, GSM) and the registry that selects one.
pub mod codec;
/// RTP wire format: header, packet, and their errors.
pub mod rtp;
/// The RTP channel: transport, reassembly, DTMF, locking, tempification.
pub mod channel;
/// The two-level endpoint hierarchy a control package drives.
pub mod endpoint;
/// The SIP-facing per-dialog transaction holding a set of RTP channels.
pub mod transaction;
/// Logging utilities shared by every module above.
pub mod log;
/// Small free functions (clock access, hex ids) with no other home.
pub mod util;
