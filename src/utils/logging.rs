//! Logging setup for binaries and tests embedding `popfeed`.

/// Environment variable read by `init_from_env`.
pub const LOG_LEVEL_ENV: &str = "POPFEED_LOG";

/// Installs a `tracing` fmt subscriber at `default_level`.
///
/// `default_level` is one of `error`, `warn`, `info`, `debug` or `trace`;
/// anything else falls back to `info`. Calling it again is a no-op.
pub fn init(default_level: &str) {
    let _ = tracing_subscriber::fmt()
        .with_max_level(parse_level(default_level))
        .with_target(false)
        .try_init();
}

/// Same as `init`, with the level taken from `POPFEED_LOG` (`info` if unset).
pub fn init_from_env() {
    let level = std::env::var(LOG_LEVEL_ENV).unwrap_or_else(|_| "info".to_string());
    init(&level);
}

pub(crate) fn parse_level(level: &str) -> tracing::Level {
    match level.trim().to_lowercase().as_str() {
        "error" => tracing::Level::ERROR,
        "warn" | "warning" => tracing::Level::WARN,
        "debug" => tracing::Level::DEBUG,
        "trace" => tracing::Level::TRACE,
        _ => tracing::Level::INFO,
    }
}
