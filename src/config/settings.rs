use serde::Deserialize;

use crate::envelope::DEFAULT_MINIMUM_VERSION;
use crate::transport::{ProtocolVersion, QoS};

/// Top-level configuration of a feed client.
#[derive(Debug, Deserialize, Clone)]
pub struct Settings {
    pub broker: BrokerSettings,
    pub feed: FeedSettings,
    pub credential: CredentialSettings,
}

/// Where and how to reach the broker.
#[derive(Debug, Deserialize, Clone)]
pub struct BrokerSettings {
    pub host: String,
    pub port: u16,
    pub protocol_version: ProtocolVersion,
    /// Client ids are `{client_id_prefix}-{uuid}`.
    pub client_id_prefix: String,
}

/// Behaviour of the feed itself.
#[derive(Debug, Deserialize, Clone)]
pub struct FeedSettings {
    pub default_qos: QoS,
    /// Lowest envelope version accepted on receive.
    pub minimum_version: String,
    /// Allowed channel types. Empty means any channel type is accepted.
    pub channel_types: Vec<String>,
}

/// Source of the device credential. A fixed `device_credential` wins over
/// fetching it from `url`.
#[derive(Debug, Deserialize, Clone, Default, PartialEq, Eq)]
pub struct CredentialSettings {
    pub url: Option<String>,
    pub token: Option<String>,
    pub device_credential: Option<String>,
}

/// Partial configuration as loaded from files or environment.
///
/// Missing values are filled from `Settings::default()`.
#[derive(Debug, Deserialize)]
pub struct PartialSettings {
    pub broker: Option<PartialBrokerSettings>,
    pub feed: Option<PartialFeedSettings>,
    pub credential: Option<CredentialSettings>,
}

#[derive(Debug, Deserialize)]
pub struct PartialBrokerSettings {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub protocol_version: Option<ProtocolVersion>,
    pub client_id_prefix: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct PartialFeedSettings {
    pub default_qos: Option<QoS>,
    pub minimum_version: Option<String>,
    pub channel_types: Option<Vec<String>>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            broker: BrokerSettings {
                host: "localhost".to_string(),
                port: 1883,
                protocol_version: ProtocolVersion::V311,
                client_id_prefix: "popfeed".to_string(),
            },
            feed: FeedSettings {
                default_qos: QoS::AtLeastOnce,
                minimum_version: DEFAULT_MINIMUM_VERSION.to_string(),
                channel_types: Vec::new(),
            },
            credential: CredentialSettings::default(),
        }
    }
}
