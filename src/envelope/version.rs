//! Envelope version gate.
//!
//! Versions are strict semantic versions. Comparison follows semver precedence
//! (major, minor, patch, then pre-release); build metadata is ignored.

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use semver::Version;

use crate::utils::error::{EnvelopeError, FeedError};

/// Minimum envelope version produced and accepted when nothing is configured.
pub const DEFAULT_MINIMUM_VERSION: &str = "1.0.0";

/// The oldest envelope version this process accepts, which is also the
/// version stamped on every outbound envelope.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MinimumVersion {
    raw: String,
    version: Version,
}

impl MinimumVersion {
    /// Parses a configured minimum version. Anything that is not a
    /// `major.minor.patch` semantic version is refused.
    pub fn parse(raw: &str) -> Result<Self, FeedError> {
        let version = Version::parse(raw).map_err(|e| FeedError::InvalidMinimumVersion {
            version: raw.to_string(),
            reason: e.to_string(),
        })?;
        Ok(Self {
            raw: raw.to_string(),
            version,
        })
    }

    /// The version exactly as configured.
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// Accepts `version` when it is greater than or equal to the minimum.
    pub fn check(&self, version: &str) -> Result<(), EnvelopeError> {
        let candidate = Version::parse(version).map_err(|e| EnvelopeError::InvalidVersion {
            version: version.to_string(),
            reason: e.to_string(),
        })?;

        if precedence(&candidate, &self.version) == Ordering::Less {
            return Err(EnvelopeError::Unsupported {
                version: version.to_string(),
                minimum: self.raw.clone(),
            });
        }
        Ok(())
    }
}

fn precedence(a: &Version, b: &Version) -> Ordering {
    (a.major, a.minor, a.patch, &a.pre).cmp(&(b.major, b.minor, b.patch, &b.pre))
}

impl Default for MinimumVersion {
    fn default() -> Self {
        Self {
            raw: DEFAULT_MINIMUM_VERSION.to_string(),
            version: Version::new(1, 0, 0),
        }
    }
}

impl FromStr for MinimumVersion {
    type Err = FeedError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for MinimumVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}
