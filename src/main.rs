use std::sync::Arc;
use std::time::Duration;

use popfeed::client::{FeedSession, SessionState, callback};
use popfeed::config::load_config;
use popfeed::credential;
use popfeed::envelope::ChannelType;
use popfeed::transport::MemoryConnector;
use popfeed::utils::logging;
use serde_json::json;
use tracing::{error, info};

/// Runs one session against the in-memory loopback broker: registers a
/// callback, sends a value to itself and stops.
#[tokio::main]
async fn main() -> popfeed::Result<()> {
    dotenvy::dotenv().ok();
    logging::init_from_env();

    let settings = load_config()?;
    let credentials = credential::from_settings_or_static(&settings.credential, "local-device");
    let connector = Arc::new(MemoryConnector::new().with_loopback());
    let session = FeedSession::new(settings, connector, credentials)?;

    let channel = ChannelType::new("signal");
    session
        .register_feed_callback(
            &channel,
            callback(|envelope| async move {
                info!(
                    "Received {} v{}: {}",
                    envelope.channel_type, envelope.version, envelope.value
                );
                Ok(())
            }),
            Some("smoke"),
        )
        .await?;

    session.start().await?;
    let mut changes = session.state_changes();
    if tokio::time::timeout(
        Duration::from_secs(5),
        changes.wait_for(|state| *state == SessionState::Connected),
    )
    .await
    .is_err()
    {
        error!("Session did not connect in time");
        session.stop().await?;
        return Ok(());
    }

    session
        .send(&json!({ "hello": "feed" }), &channel, Some("smoke"))
        .await?;
    tokio::time::sleep(Duration::from_millis(100)).await;

    session.stop().await
}
