use std::io::Write;

use flate2::Compression;
use flate2::write::ZlibEncoder;
use serde_json::json;

use super::{ChannelType, Envelope, EnvelopeCodec, MinimumVersion, is_empty_value};
use crate::utils::error::{EnvelopeError, FeedError};

fn codec(minimum: &str) -> EnvelopeCodec {
    EnvelopeCodec::new(MinimumVersion::parse(minimum).unwrap())
}

fn compress(raw: &[u8]) -> Vec<u8> {
    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(raw).unwrap();
    encoder.finish().unwrap()
}

fn envelope_with_version(version: &str) -> Envelope {
    Envelope {
        channel_type: ChannelType::new("signal"),
        version: version.to_string(),
        value: json!({ "side": "buy" }),
    }
}

#[test]
fn test_encode_decode_roundtrip() {
    let codec = codec("1.0.0");
    let channel = ChannelType::new("signal");
    let value = json!({ "symbol": "BTC/USDT", "amounts": [1, 2, 3] });

    let bytes = codec.encode(&channel, &value).unwrap();
    let decoded = codec.decode(&bytes).unwrap();

    assert_eq!(
        decoded,
        Envelope {
            channel_type: channel,
            version: "1.0.0".to_string(),
            value,
        }
    );
}

#[test]
fn test_encoded_payload_is_zlib_json_with_three_fields() {
    let codec = codec("1.2.3");
    let bytes = codec
        .encode(&ChannelType::new("price"), &json!("up"))
        .unwrap();

    let mut raw = String::new();
    std::io::Read::read_to_string(&mut flate2::read::ZlibDecoder::new(&bytes[..]), &mut raw)
        .unwrap();
    let parsed: serde_json::Value = serde_json::from_str(&raw).unwrap();
    let fields = parsed.as_object().unwrap();

    assert_eq!(fields.len(), 3);
    assert_eq!(parsed["channel_type"], "price");
    assert_eq!(parsed["version"], "1.2.3");
    assert_eq!(parsed["value"], "up");
}

#[test]
fn test_encode_is_deterministic() {
    let codec = codec("1.0.0");
    let channel = ChannelType::new("signal");
    let value = json!({ "a": 1 });
    assert_eq!(
        codec.encode(&channel, &value).unwrap(),
        codec.encode(&channel, &value).unwrap()
    );
}

#[test]
fn test_empty_values_short_circuit() {
    let codec = codec("1.0.0");
    let channel = ChannelType::new("signal");

    assert!(codec.encode(&channel, &json!(null)).unwrap().is_empty());
    assert!(codec.encode(&channel, &json!({})).unwrap().is_empty());
    assert!(codec.encode(&channel, &json!([])).unwrap().is_empty());
    assert!(codec.encode(&channel, &json!("")).unwrap().is_empty());
    assert_eq!(
        codec.encode(&channel, &json!(null)).unwrap(),
        codec.encode(&channel, &json!({})).unwrap()
    );
}

#[test]
fn test_scalars_are_not_empty() {
    assert!(!is_empty_value(&json!(0)));
    assert!(!is_empty_value(&json!(false)));
    assert!(!is_empty_value(&json!(" ")));
    assert!(is_empty_value(&json!({})));
}

#[test]
fn test_decode_rejects_uncompressed_payload() {
    let codec = codec("1.0.0");
    let err = codec.decode(b"{\"channel_type\":\"signal\"}").unwrap_err();
    assert!(matches!(err, EnvelopeError::Decompress(_)));
}

#[test]
fn test_decode_rejects_invalid_json() {
    let codec = codec("1.0.0");
    let err = codec.decode(&compress(b"not json at all")).unwrap_err();
    assert!(matches!(err, EnvelopeError::Parse(_)));
}

#[test]
fn test_decode_rejects_missing_fields() {
    let codec = codec("1.0.0");
    let payload = compress(br#"{"channel_type":"signal","value":1}"#);
    assert!(matches!(
        codec.decode(&payload).unwrap_err(),
        EnvelopeError::Parse(_)
    ));
}

#[test]
fn test_version_gate() {
    let codec = codec("1.0.0");

    let err = codec
        .check_version(&envelope_with_version("0.0.1"))
        .unwrap_err();
    assert!(matches!(err, EnvelopeError::Unsupported { .. }));

    assert!(codec.check_version(&envelope_with_version("1.0.0")).is_ok());
    assert!(codec.check_version(&envelope_with_version("2.0.0")).is_ok());
}

#[test]
fn test_version_gate_is_numeric_not_lexical() {
    let codec = codec("1.9.0");
    assert!(codec.check_version(&envelope_with_version("1.10.0")).is_ok());
    assert!(codec.check_version(&envelope_with_version("1.8.99")).is_err());
}

#[test]
fn test_version_gate_prerelease_and_build_metadata() {
    let codec = codec("1.0.0");
    assert!(
        codec
            .check_version(&envelope_with_version("1.0.0-rc.1"))
            .is_err()
    );
    assert!(
        codec
            .check_version(&envelope_with_version("1.0.0+build.7"))
            .is_ok()
    );
}

#[test]
fn test_malformed_versions_are_rejected() {
    let codec = codec("1.0.0");
    for raw in ["1.0", "v1.0.0", "latest", ""] {
        let err = codec.check_version(&envelope_with_version(raw)).unwrap_err();
        assert!(
            matches!(err, EnvelopeError::InvalidVersion { .. }),
            "expected {raw:?} to be invalid"
        );
    }
}

#[test]
fn test_minimum_version_must_be_strict_semver() {
    let err = MinimumVersion::parse("1.0").unwrap_err();
    assert!(matches!(err, FeedError::InvalidMinimumVersion { .. }));
    assert_eq!(MinimumVersion::default().as_str(), "1.0.0");
    assert_eq!("2.1.0".parse::<MinimumVersion>().unwrap().to_string(), "2.1.0");
}

#[test]
fn test_channel_type_serializes_transparently() {
    let channel = ChannelType::from("signal");
    assert_eq!(serde_json::to_string(&channel).unwrap(), "\"signal\"");
    assert_eq!(channel.to_string(), "signal");
}
