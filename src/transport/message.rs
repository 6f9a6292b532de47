//! Transport-level vocabulary shared by the feed and transport implementations.
//!
//! QoS values follow the broker protocol:
//! - `0` at most once
//! - `1` at least once (feed default)
//! - `2` exactly once

use std::fmt;

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender};

/// Identifier a transport assigns to one subscribe request, echoed back in
/// the matching acknowledgment.
pub type RequestId = u16;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum QoS {
    AtMostOnce,
    #[default]
    AtLeastOnce,
    ExactlyOnce,
}

impl TryFrom<u8> for QoS {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(QoS::AtMostOnce),
            1 => Ok(QoS::AtLeastOnce),
            2 => Ok(QoS::ExactlyOnce),
            other => Err(format!("invalid QoS level {other}, expected 0, 1 or 2")),
        }
    }
}

impl From<QoS> for u8 {
    fn from(qos: QoS) -> Self {
        match qos {
            QoS::AtMostOnce => 0,
            QoS::AtLeastOnce => 1,
            QoS::ExactlyOnce => 2,
        }
    }
}

/// Broker protocol revision requested on connect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum ProtocolVersion {
    #[default]
    V311,
    V5,
}

impl TryFrom<String> for ProtocolVersion {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        match value.as_str() {
            "3.1.1" | "311" | "4" => Ok(ProtocolVersion::V311),
            "5" | "5.0" => Ok(ProtocolVersion::V5),
            other => Err(format!("unsupported protocol version '{other}'")),
        }
    }
}

impl From<ProtocolVersion> for String {
    fn from(version: ProtocolVersion) -> Self {
        version.to_string()
    }
}

impl fmt::Display for ProtocolVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProtocolVersion::V311 => f.write_str("3.1.1"),
            ProtocolVersion::V5 => f.write_str("5"),
        }
    }
}

/// A single topic filter requested at a given QoS.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Subscription {
    pub topic: String,
    pub qos: QoS,
}

impl Subscription {
    pub fn new(topic: impl Into<String>, qos: QoS) -> Self {
        Self {
            topic: topic.into(),
            qos,
        }
    }
}

/// Per-subscription result carried by a subscribe acknowledgment: either the
/// granted QoS (`0..=2`) or a reason code. Codes from `0x80` upwards are
/// failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubAckCode(pub u8);

impl SubAckCode {
    pub const UNSPECIFIED_ERROR: SubAckCode = SubAckCode(0x80);

    pub fn granted(qos: QoS) -> Self {
        Self(qos.into())
    }

    pub fn is_error(&self) -> bool {
        self.0 >= Self::UNSPECIFIED_ERROR.0
    }
}

impl fmt::Display for SubAckCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#04x}", self.0)
    }
}

/// Lifecycle notifications a transport pushes to its owner.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    Connected,
    Message {
        topic: String,
        payload: Vec<u8>,
        qos: QoS,
    },
    Disconnected {
        reason: Option<String>,
    },
    SubscribeAck {
        request_id: RequestId,
        codes: Vec<SubAckCode>,
    },
}

pub type EventSender = UnboundedSender<TransportEvent>;
pub type EventReceiver = UnboundedReceiver<TransportEvent>;
