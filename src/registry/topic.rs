//! Topic mapping
//!
//! A `Topic` is the broker routing key for a `(channel type, identifier)`
//! pair. `topic` is the only function that builds one, so subscribe, publish
//! and callback lookup always agree on the exact string.
//!
//! No validation or escaping happens here: separator characters inside an
//! identifier end up in the topic as-is.

use std::borrow::Borrow;
use std::fmt;

use crate::envelope::ChannelType;

/// Segment used when a callback or message is not scoped to an identifier.
pub const ABSENT_IDENTIFIER: &str = "";

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Topic(String);

impl Topic {
    /// Returns the topic string sent to the broker.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Topic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Borrow<str> for Topic {
    fn borrow(&self) -> &str {
        &self.0
    }
}

/// Derives the topic `"{channel_type}/{identifier}"`.
pub fn topic(channel_type: &ChannelType, identifier: Option<&str>) -> Topic {
    Topic(format!(
        "{}/{}",
        channel_type.as_str(),
        identifier.unwrap_or(ABSENT_IDENTIFIER)
    ))
}
