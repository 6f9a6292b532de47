//! Envelope codec
//!
//! Outbound values are wrapped in an `Envelope`, serialized to JSON and
//! zlib-compressed. Inbound payloads go through the inverse and are then
//! vetted against the minimum supported version.

use std::io::{Read, Write};

use flate2::Compression;
use flate2::read::ZlibDecoder;
use flate2::write::ZlibEncoder;
use serde_json::Value;

use crate::envelope::message::{ChannelType, Envelope, OutboundEnvelope, is_empty_value};
use crate::envelope::version::MinimumVersion;
use crate::utils::error::EnvelopeError;

#[derive(Debug, Clone, Default)]
pub struct EnvelopeCodec {
    minimum: MinimumVersion,
}

impl EnvelopeCodec {
    /// Creates a codec that stamps and enforces `minimum`.
    pub fn new(minimum: MinimumVersion) -> Self {
        Self { minimum }
    }

    /// The version stamped on outbound envelopes and required inbound.
    pub fn minimum_version(&self) -> &MinimumVersion {
        &self.minimum
    }

    /// Builds the compressed envelope for `value`.
    ///
    /// Empty values produce an empty byte vector and no envelope at all.
    pub fn encode(
        &self,
        channel_type: &ChannelType,
        value: &Value,
    ) -> Result<Vec<u8>, EnvelopeError> {
        if is_empty_value(value) {
            return Ok(Vec::new());
        }

        let json = serde_json::to_vec(&OutboundEnvelope {
            channel_type,
            version: self.minimum.as_str(),
            value,
        })
        .map_err(EnvelopeError::Serialize)?;

        let mut encoder = ZlibEncoder::new(Vec::with_capacity(json.len()), Compression::default());
        encoder.write_all(&json).map_err(EnvelopeError::Compress)?;
        encoder.finish().map_err(EnvelopeError::Compress)
    }

    /// Decompresses and parses an inbound payload. Does not check the version.
    pub fn decode(&self, payload: &[u8]) -> Result<Envelope, EnvelopeError> {
        let mut json = Vec::new();
        ZlibDecoder::new(payload)
            .read_to_end(&mut json)
            .map_err(EnvelopeError::Decompress)?;
        serde_json::from_slice(&json).map_err(EnvelopeError::Parse)
    }

    /// Rejects envelopes older than the configured minimum version.
    pub fn check_version(&self, envelope: &Envelope) -> Result<(), EnvelopeError> {
        self.minimum.check(&envelope.version)
    }
}
