//! Envelope definitions
//!
//! `Envelope` is the wire representation exchanged over the feed. It wraps the
//! caller's value with the channel type it was sent on and the version of the
//! producer's envelope format.
//!
//! Notes on fields:
//! - `channel_type`: the logical category the value belongs to
//! - `version`: semantic version string, compared against the local minimum
//! - `value`: arbitrary JSON value supplied by the sender

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Logical message category chosen by the application.
///
/// The feed never interprets it beyond building topics and tagging envelopes.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChannelType(String);

impl ChannelType {
    /// Creates a channel type from its name, used verbatim in topics.
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// Returns the channel name.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ChannelType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ChannelType {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

impl From<String> for ChannelType {
    fn from(name: String) -> Self {
        Self(name)
    }
}

/// A decoded feed message.
///
/// ```rust
/// use popfeed::envelope::{ChannelType, Envelope};
/// use serde_json::json;
///
/// let envelope = Envelope {
///     channel_type: ChannelType::new("signal"),
///     version: "1.0.0".to_string(),
///     value: json!({ "symbol": "BTC/USDT" }),
/// };
/// assert_eq!(envelope.channel_type().as_str(), "signal");
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    pub channel_type: ChannelType,
    pub version: String,
    pub value: Value,
}

impl Envelope {
    pub fn channel_type(&self) -> &ChannelType {
        &self.channel_type
    }
}

/// Borrowed form used when encoding so the caller's value is not cloned.
#[derive(Serialize)]
pub(crate) struct OutboundEnvelope<'a> {
    pub channel_type: &'a ChannelType,
    pub version: &'a str,
    pub value: &'a Value,
}

/// Returns `true` for values that carry nothing worth sending:
/// `null`, `""`, `[]` and `{}`.
///
/// `0` and `false` are deliberately *not* empty, unlike a plain truthiness
/// check: they are meaningful feed values and are sent.
pub fn is_empty_value(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.is_empty(),
        Value::Array(items) => items.is_empty(),
        Value::Object(fields) => fields.is_empty(),
        Value::Bool(_) | Value::Number(_) => false,
    }
}
