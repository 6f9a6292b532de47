//! The `config` module loads `Settings` for a feed client.
//!
//! Sources, later ones overriding earlier ones:
//! - built-in defaults (`Settings::default()`)
//! - a TOML/YAML/JSON file (`config/default.*` unless a path is given)
//! - environment variables prefixed with `POPFEED`, sections separated by
//!   `__`, e.g. `POPFEED__BROKER__PORT=8883`
//!
//! `POPFEED__FEED__CHANNEL_TYPES` takes a comma-separated list.

mod settings;

use std::path::Path;

use config::builder::DefaultState;
use config::{Config, ConfigBuilder, ConfigError, Environment, File};

use settings::PartialSettings;

pub use settings::{BrokerSettings, CredentialSettings, FeedSettings, Settings};

const ENV_PREFIX: &str = "POPFEED";

/// Loads the configuration from the optional `config/default` file and the
/// environment, merged over the default values.
pub fn load_config() -> Result<Settings, ConfigError> {
    let builder = Config::builder().add_source(File::with_name("config/default").required(false));
    build(builder)
}

/// Same as `load_config`, reading the file at `path`, which must exist.
pub fn load_config_from(path: &Path) -> Result<Settings, ConfigError> {
    let builder = Config::builder().add_source(File::from(path).required(true));
    build(builder)
}

fn build(builder: ConfigBuilder<DefaultState>) -> Result<Settings, ConfigError> {
    let config = builder
        .add_source(
            Environment::with_prefix(ENV_PREFIX)
                .separator("__")
                .try_parsing(true)
                .list_separator(",")
                .with_list_parse_key("feed.channel_types"),
        )
        .build()?;

    let partial: PartialSettings = config.try_deserialize()?;
    Ok(merge(partial))
}

fn merge(partial: PartialSettings) -> Settings {
    let default = Settings::default();
    let broker = partial.broker.as_ref();
    let feed = partial.feed.as_ref();

    Settings {
        broker: BrokerSettings {
            host: broker
                .and_then(|b| b.host.clone())
                .unwrap_or(default.broker.host),
            port: broker.and_then(|b| b.port).unwrap_or(default.broker.port),
            protocol_version: broker
                .and_then(|b| b.protocol_version)
                .unwrap_or(default.broker.protocol_version),
            client_id_prefix: broker
                .and_then(|b| b.client_id_prefix.clone())
                .unwrap_or(default.broker.client_id_prefix),
        },
        feed: FeedSettings {
            default_qos: feed
                .and_then(|f| f.default_qos)
                .unwrap_or(default.feed.default_qos),
            minimum_version: feed
                .and_then(|f| f.minimum_version.clone())
                .unwrap_or(default.feed.minimum_version),
            channel_types: feed
                .and_then(|f| f.channel_types.clone())
                .unwrap_or(default.feed.channel_types),
        },
        credential: partial.credential.unwrap_or(default.credential),
    }
}
