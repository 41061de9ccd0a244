//! RTP (Real-time Transport Protocol) wire format: header, packet, and the
//! errors decoding one can produce. No session or channel logic lives here.
pub mod config;
pub mod rtp_error;
pub mod rtp_header;
pub mod rtp_header_extension;
pub mod rtp_packet;

pub use rtp_error::RtpError;
pub use rtp_header::RtpHeader;
pub use rtp_header_extension::RtpHeaderExtension;
pub use rtp_packet::RtpPacket;
