//! The `envelope` module defines the versioned, compressed payload that
//! travels over the feed.
//!
//! On the wire an envelope is a zlib-compressed JSON object with exactly
//! three fields: `channel_type`, `version` and `value`. Every outbound
//! envelope is stamped with the local minimum version and every inbound one
//! older than that minimum is refused.

pub mod codec;
pub mod message;
pub mod version;

pub use codec::EnvelopeCodec;
pub use message::{ChannelType, Envelope, is_empty_value};
pub use version::{DEFAULT_MINIMUM_VERSION, MinimumVersion};

#[cfg(test)]
mod tests;
