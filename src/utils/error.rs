//! The `error` module defines the error types used within `popfeed`.
//!
//! Each layer has its own enum (`EnvelopeError`, `CredentialError`,
//! `TransportError`) and the session surfaces them through `FeedError`.

use thiserror::Error;

/// Result alias used by the session-facing API.
pub type Result<T> = std::result::Result<T, FeedError>;

/// Top-level error returned by `FeedSession` operations.
#[derive(Debug, Error)]
pub enum FeedError {
    #[error("Credential error: {0}")]
    Credential(#[from] CredentialError),

    #[error("Envelope error: {0}")]
    Envelope(#[from] EnvelopeError),

    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("Invalid minimum version '{version}': {reason}")]
    InvalidMinimumVersion { version: String, reason: String },

    #[error("Unknown channel type: {0}")]
    UnknownChannelType(String),

    #[error("Feed session is not started")]
    NotStarted,

    #[error("Feed session is already started")]
    AlreadyStarted,
}

/// Failures while building, reading or vetting an envelope.
#[derive(Debug, Error)]
pub enum EnvelopeError {
    #[error("Failed to serialize envelope: {0}")]
    Serialize(#[source] serde_json::Error),

    #[error("Failed to compress envelope: {0}")]
    Compress(#[source] std::io::Error),

    #[error("Failed to decompress envelope: {0}")]
    Decompress(#[source] std::io::Error),

    #[error("Failed to parse envelope: {0}")]
    Parse(#[source] serde_json::Error),

    #[error("Invalid envelope version '{version}': {reason}")]
    InvalidVersion { version: String, reason: String },

    #[error("Unsupported envelope version {version}, minimum version: {minimum}")]
    Unsupported { version: String, minimum: String },
}

/// Failures while obtaining the device credential.
#[derive(Debug, Error)]
pub enum CredentialError {
    #[error("Error when fetching device creds: status: {status}, text: {body}")]
    Rejected { status: u16, body: String },

    #[error("Device credential request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("Malformed device credential: {0}")]
    Malformed(String),
}

/// Failures reported by a transport implementation.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("Failed to connect to {address}:{port}: {reason}")]
    Connect {
        address: String,
        port: u16,
        reason: String,
    },

    #[error("Failed to disconnect: {0}")]
    Disconnect(String),

    #[error("Transport is not connected")]
    NotConnected,
}
