//! The `credential` module obtains the device credential a feed session
//! authenticates with.
//!
//! The credential is the only auth factor sent to the broker (no password).
//! A session fetches it once and keeps it for its whole lifetime.
//!
//! Providers:
//! - `StaticCredential`: a credential known up front (configuration, tests)
//! - `HttpCredentialProvider`: fetched from a remote endpoint; any status
//!   other than `200 OK` is a fatal error carrying the status and body

use std::sync::Arc;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use tracing::{debug, warn};

use crate::config::CredentialSettings;
use crate::utils::error::{CredentialError, FeedError};

#[async_trait]
pub trait CredentialProvider: Send + Sync {
    async fn fetch(&self) -> Result<String, CredentialError>;
}

#[derive(Debug, Clone)]
pub struct StaticCredential {
    credential: String,
}

impl StaticCredential {
    /// Always yields `credential`.
    pub fn new(credential: impl Into<String>) -> Self {
        Self {
            credential: credential.into(),
        }
    }
}

#[async_trait]
impl CredentialProvider for StaticCredential {
    async fn fetch(&self) -> Result<String, CredentialError> {
        Ok(self.credential.clone())
    }
}

/// Fetches the device credential with an HTTP `GET`.
///
/// The response body must be a JSON string holding the credential.
pub struct HttpCredentialProvider {
    client: Client,
    url: String,
    token: Option<String>,
}

impl HttpCredentialProvider {
    /// `token`, when given, is sent as a bearer token.
    pub fn new(url: impl Into<String>, token: Option<String>) -> Self {
        Self {
            client: Client::new(),
            url: url.into(),
            token,
        }
    }
}

#[async_trait]
impl CredentialProvider for HttpCredentialProvider {
    async fn fetch(&self) -> Result<String, CredentialError> {
        let mut req = self.client.get(&self.url);
        if let Some(ref token) = self.token {
            req = req.bearer_auth(token);
        }

        debug!("Fetching device credential from {}", self.url);
        let resp = req.send().await?;

        if resp.status() != StatusCode::OK {
            let status = resp.status().as_u16();
            let body = match resp.text().await {
                Ok(body) => body,
                Err(e) => {
                    debug!("Could not read rejection body: {}", e);
                    String::new()
                }
            };
            return Err(CredentialError::Rejected { status, body });
        }

        let credential: String = resp
            .json()
            .await
            .map_err(|e| CredentialError::Malformed(e.to_string()))?;
        if credential.is_empty() {
            return Err(CredentialError::Malformed(
                "empty device credential".to_string(),
            ));
        }
        Ok(credential)
    }
}

impl std::fmt::Debug for HttpCredentialProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpCredentialProvider")
            .field("url", &self.url)
            .field("has_token", &self.token.is_some())
            .finish()
    }
}

/// Picks a provider from configuration: a fixed `device_credential` wins
/// over `url`.
pub fn from_settings(settings: &CredentialSettings) -> Result<Arc<dyn CredentialProvider>, FeedError> {
    if let Some(ref credential) = settings.device_credential {
        return Ok(Arc::new(StaticCredential::new(credential.clone())));
    }
    if let Some(ref url) = settings.url {
        return Ok(Arc::new(HttpCredentialProvider::new(
            url.clone(),
            settings.token.clone(),
        )));
    }
    Err(FeedError::Config(config::ConfigError::NotFound(
        "credential.device_credential or credential.url".to_string(),
    )))
}

/// Like `from_settings`, but falls back to a fixed `default_credential`
/// when the configuration names no usable source.
pub fn from_settings_or_static(
    settings: &CredentialSettings,
    default_credential: &str,
) -> Arc<dyn CredentialProvider> {
    match from_settings(settings) {
        Ok(provider) => provider,
        Err(e) => {
            warn!(
                "No usable credential configuration ({}), using a fixed device credential",
                e
            );
            Arc::new(StaticCredential::new(default_credential))
        }
    }
}
