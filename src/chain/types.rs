use super::metadata::MethodMetadata;
use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Deserializer};

/// One block as supplied by the chain data source
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawBlock {
    pub header: RawHeader,
    pub spec_version: u32,
    #[serde(deserialize_with = "deserialize_timestamp")]
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub extrinsics: Vec<RawExtrinsic>,
    #[serde(default)]
    pub events: Vec<RawEvent>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawHeader {
    /// Number comes as a plain integer or a hex string like "0x1a2b"
    #[serde(deserialize_with = "deserialize_block_number")]
    pub number: u64,
    pub hash: String,
    pub parent_hash: String,
    pub state_root: String,
    pub extrinsics_root: String,
    #[serde(default)]
    pub digest: Digest,
    #[serde(default)]
    pub extension: Option<serde_json::Value>,
}

/// Block digest containing SCALE-encoded log hex strings
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Digest {
    pub logs: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawExtrinsic {
    pub hash: String,
    /// Full encoded extrinsic, passed to the fee oracle
    #[serde(default)]
    pub hex: Option<String>,
    pub section: String,
    pub method: String,
    #[serde(default)]
    pub args: Vec<serde_json::Value>,
    #[serde(default)]
    pub signature: Option<SignaturePayload>,
    #[serde(default)]
    pub meta: MethodMetadata,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignaturePayload {
    pub signer: String,
    pub signature: String,
    #[serde(default)]
    pub nonce: u64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawEvent {
    pub phase: Phase,
    pub section: String,
    pub method: String,
    #[serde(default)]
    pub data: Vec<serde_json::Value>,
    #[serde(default)]
    pub meta: MethodMetadata,
}

/// Dispatch phase of an event record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Phase {
    #[serde(alias = "ApplyExtrinsic")]
    ApplyExtrinsic(u32),
    #[serde(alias = "Finalization")]
    Finalization,
    #[serde(alias = "Initialization")]
    Initialization,
}

impl Phase {
    /// Index of the call this event was emitted under, if any
    pub fn extrinsic_index(&self) -> Option<u32> {
        match self {
            Phase::ApplyExtrinsic(index) => Some(*index),
            _ => None,
        }
    }
}

impl RawBlock {
    /// Events emitted while applying the call at `index`
    pub fn events_for_extrinsic(&self, index: u32) -> impl Iterator<Item = &RawEvent> {
        self.events
            .iter()
            .filter(move |e| e.phase.extrinsic_index() == Some(index))
    }
}

/// Render a decoded argument value: strings verbatim, anything else as compact JSON
pub fn arg_to_string(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Parse a hex string (with or without 0x prefix) to u64
pub fn parse_hex_number(s: &str) -> Option<u64> {
    let hex_str = s.trim_start_matches("0x");
    u64::from_str_radix(hex_str, 16).ok()
}

#[derive(Deserialize)]
#[serde(untagged)]
enum NumberOrString {
    Number(u64),
    String(String),
}

fn deserialize_block_number<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u64, D::Error> {
    match NumberOrString::deserialize(deserializer)? {
        NumberOrString::Number(n) => Ok(n),
        NumberOrString::String(s) if s.starts_with("0x") => parse_hex_number(&s)
            .ok_or_else(|| serde::de::Error::custom(format!("invalid block number: {}", s))),
        NumberOrString::String(s) => s
            .parse()
            .map_err(|_| serde::de::Error::custom(format!("invalid block number: {}", s))),
    }
}

/// Timestamps arrive as milliseconds since the Unix epoch or RFC 3339 text
fn deserialize_timestamp<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<DateTime<Utc>, D::Error> {
    match NumberOrString::deserialize(deserializer)? {
        NumberOrString::Number(ms) => Utc
            .timestamp_millis_opt(ms as i64)
            .single()
            .ok_or_else(|| serde::de::Error::custom(format!("timestamp out of range: {}", ms))),
        NumberOrString::String(s) => DateTime::parse_from_rfc3339(&s)
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(serde::de::Error::custom),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_hex_number() {
        assert_eq!(parse_hex_number("0x332534"), Some(3351860));
        assert_eq!(parse_hex_number("0x0"), Some(0));
        assert_eq!(parse_hex_number("332534"), Some(3351860));
    }

    #[test]
    fn test_arg_to_string() {
        assert_eq!(arg_to_string(&json!("0xabc")), "0xabc");
        assert_eq!(arg_to_string(&json!(1000)), "1000");
        assert_eq!(arg_to_string(&json!({"id": "0x01"})), r#"{"id":"0x01"}"#);
    }

    #[test]
    fn test_phase_shapes() {
        let apply: Phase = serde_json::from_value(json!({"applyExtrinsic": 2})).unwrap();
        assert_eq!(apply.extrinsic_index(), Some(2));

        let finalization: Phase = serde_json::from_value(json!({"finalization": null})).unwrap();
        assert_eq!(finalization, Phase::Finalization);

        let init: Phase = serde_json::from_value(json!("Initialization")).unwrap();
        assert_eq!(init.extrinsic_index(), None);
    }

    #[test]
    fn test_raw_block_deserialize() {
        let block: RawBlock = serde_json::from_value(json!({
            "header": {
                "number": "0x64",
                "hash": "0xaa",
                "parentHash": "0xbb",
                "stateRoot": "0xcc",
                "extrinsicsRoot": "0xdd",
                "digest": {"logs": ["0x066175726120778c911100000000"]}
            },
            "specVersion": 12,
            "timestamp": 1700000000000u64,
            "extrinsics": [{
                "hash": "0x01",
                "section": "timestamp",
                "method": "set",
                "args": [1700000000000u64],
                "meta": {"docs": ["Set the current time."], "fields": [{"name": "now"}]}
            }],
            "events": [{
                "phase": {"applyExtrinsic": 0},
                "section": "system",
                "method": "ExtrinsicSuccess",
                "data": [{"weight": 1}]
            }]
        }))
        .unwrap();

        assert_eq!(block.header.number, 100);
        assert_eq!(block.timestamp.timestamp_millis(), 1700000000000);
        assert!(block.header.extension.is_none());
        assert!(block.extrinsics[0].signature.is_none());
        assert_eq!(block.events_for_extrinsic(0).count(), 1);
        assert_eq!(block.events_for_extrinsic(1).count(), 0);
    }
}
