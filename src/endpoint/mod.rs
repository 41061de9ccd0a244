//! Two-level endpoint hierarchy sitting above the RTP channel layer: a
//! [`TransactionEndpoint`] per dialog leg owns one [`ChannelEndpoint`] per
//! media label, each fanning channel events out to an abstract
//! [`Connection`]. See `SPEC_FULL.md` §4.4.
mod channel_endpoint;
mod conference_endpoint;
mod connection;
mod transaction_endpoint;

pub use channel_endpoint::ChannelEndpoint;
pub use conference_endpoint::ConferenceEndpoint;
pub use connection::Connection;
pub use transaction_endpoint::TransactionEndpoint;
