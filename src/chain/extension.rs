//! Versioned data-availability header extension
//!
//! Avail headers carry an `extension` object with exactly one populated
//! version key:
//!
//! ```json
//! {"v2": {"appLookup": {"size": 3, "index": [{"appId": 1, "start": 0}]},
//!         "commitment": {"rows": 1, "cols": 4, "commitment": "0x..", "dataRoot": "0x.."}}}
//! ```
//!
//! Some RPC layers hand the extension over as a JSON-encoded string; both
//! forms decode to the same [`HeaderExtension`].

use super::scale::bytes_to_hex;
use super::DecodeError;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HeaderExtension {
    V1(v1::Extension),
    V2(v2::Extension),
}

/// Commitment fields common to every extension version
#[derive(Debug, Clone, PartialEq)]
pub struct CommitmentFields {
    pub rows: u16,
    pub cols: u16,
    pub data_root: Option<String>,
    pub commitment: String,
}

/// One application's first chunk index in the block's data matrix
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppLookupEntry {
    pub app_id: u32,
    pub start: u32,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct DataLookup {
    pub size: u32,
    #[serde(default)]
    pub index: Vec<AppLookupEntry>,
}

/// Decode contract shared by every extension version
pub trait ExtensionPayload {
    fn commitment(&self) -> CommitmentFields;
    fn app_lookup(&self) -> &DataLookup;
}

/// Commitment bytes as either a hex string or a raw byte array
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum CommitmentBytes {
    Hex(String),
    Raw(Vec<u8>),
}

impl CommitmentBytes {
    fn to_hex(&self) -> String {
        match self {
            CommitmentBytes::Hex(s) if s.starts_with("0x") => s.to_lowercase(),
            CommitmentBytes::Hex(s) => format!("0x{}", s.to_lowercase()),
            CommitmentBytes::Raw(bytes) => bytes_to_hex(bytes),
        }
    }
}

pub mod v1 {
    use super::{CommitmentBytes, CommitmentFields, DataLookup, ExtensionPayload};
    use serde::Deserialize;

    #[derive(Debug, Clone, PartialEq, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct KateCommitment {
        pub rows: u16,
        pub cols: u16,
        pub data_root: String,
        pub commitment: CommitmentBytes,
    }

    #[derive(Debug, Clone, PartialEq, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct Extension {
        pub commitment: KateCommitment,
        pub app_lookup: DataLookup,
    }

    impl ExtensionPayload for Extension {
        fn commitment(&self) -> CommitmentFields {
            CommitmentFields {
                rows: self.commitment.rows,
                cols: self.commitment.cols,
                data_root: Some(self.commitment.data_root.clone()),
                commitment: self.commitment.commitment.to_hex(),
            }
        }

        fn app_lookup(&self) -> &DataLookup {
            &self.app_lookup
        }
    }
}

pub mod v2 {
    use super::{CommitmentBytes, CommitmentFields, DataLookup, ExtensionPayload};
    use serde::Deserialize;

    /// v2 commitments may omit the data root for blocks without app data
    #[derive(Debug, Clone, PartialEq, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct KateCommitment {
        pub rows: u16,
        pub cols: u16,
        pub commitment: CommitmentBytes,
        #[serde(default)]
        pub data_root: Option<String>,
    }

    #[derive(Debug, Clone, PartialEq, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct Extension {
        pub app_lookup: DataLookup,
        pub commitment: KateCommitment,
    }

    impl ExtensionPayload for Extension {
        fn commitment(&self) -> CommitmentFields {
            CommitmentFields {
                rows: self.commitment.rows,
                cols: self.commitment.cols,
                data_root: self.commitment.data_root.clone(),
                commitment: self.commitment.commitment.to_hex(),
            }
        }

        fn app_lookup(&self) -> &DataLookup {
            &self.app_lookup
        }
    }
}

impl HeaderExtension {
    /// Decode the raw `extension` value of a header
    ///
    /// Returns `Ok(None)` when the header carries no extension payload.
    pub fn from_value(raw: Option<&serde_json::Value>) -> Result<Option<Self>, DecodeError> {
        let value = match raw {
            None | Some(serde_json::Value::Null) => return Ok(None),
            Some(serde_json::Value::String(s)) if s.trim().is_empty() => return Ok(None),
            Some(serde_json::Value::String(s)) => serde_json::from_str::<serde_json::Value>(s)
                .map_err(|e| DecodeError::Extension(e.to_string()))?,
            Some(v) => v.clone(),
        };

        serde_json::from_value(value)
            .map(Some)
            .map_err(|e| DecodeError::Extension(e.to_string()))
    }

    pub fn version(&self) -> &'static str {
        match self {
            HeaderExtension::V1(_) => "v1",
            HeaderExtension::V2(_) => "v2",
        }
    }

    pub fn payload(&self) -> &dyn ExtensionPayload {
        match self {
            HeaderExtension::V1(ext) => ext,
            HeaderExtension::V2(ext) => ext,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn v2_value() -> serde_json::Value {
        json!({
            "v2": {
                "appLookup": {"size": 3, "index": [{"appId": 1, "start": 0}, {"appId": 4, "start": 2}]},
                "commitment": {
                    "rows": 1,
                    "cols": 4,
                    "commitment": "0xA1B2",
                    "dataRoot": "0x0000000000000000000000000000000000000000000000000000000000000000"
                }
            }
        })
    }

    #[test]
    fn test_no_extension() {
        assert!(HeaderExtension::from_value(None).unwrap().is_none());
        assert!(HeaderExtension::from_value(Some(&serde_json::Value::Null))
            .unwrap()
            .is_none());
    }

    #[test]
    fn test_decode_v2_object() {
        let value = v2_value();
        let ext = HeaderExtension::from_value(Some(&value)).unwrap().unwrap();
        assert_eq!(ext.version(), "v2");

        let commitment = ext.payload().commitment();
        assert_eq!(commitment.rows, 1);
        assert_eq!(commitment.cols, 4);
        assert_eq!(commitment.commitment, "0xa1b2");
        assert!(commitment.data_root.is_some());

        let lookup = ext.payload().app_lookup();
        assert_eq!(lookup.size, 3);
        assert_eq!(lookup.index[1], AppLookupEntry { app_id: 4, start: 2 });
    }

    #[test]
    fn test_decode_v1_from_json_string() {
        let encoded = json!({
            "v1": {
                "commitment": {"rows": 2, "cols": 8, "dataRoot": "0xdd", "commitment": [1, 2, 255]},
                "appLookup": {"size": 1, "index": []}
            }
        })
        .to_string();
        let value = serde_json::Value::String(encoded);

        let ext = HeaderExtension::from_value(Some(&value)).unwrap().unwrap();
        assert_eq!(ext.version(), "v1");
        let commitment = ext.payload().commitment();
        assert_eq!(commitment.commitment, "0x0102ff");
        assert_eq!(commitment.data_root.as_deref(), Some("0xdd"));
    }

    #[test]
    fn test_unknown_version_rejected() {
        let value = json!({"v9": {}});
        assert!(matches!(
            HeaderExtension::from_value(Some(&value)),
            Err(DecodeError::Extension(_))
        ));
    }
}
