use crate::chain::scale::{bytes_to_hex, hex_to_bytes};
use crate::chain::{engine_to_string, DigestItem};
use crate::db::LogRecord;
use tracing::warn;

/// Decode one digest entry into its log record
///
/// Malformed entries never fail the block: they are stored as `Unknown` with
/// the raw entry as payload.
pub fn decode_log(block_number: u64, index: usize, raw_log: &str) -> (LogRecord, DigestItem) {
    let item = match DigestItem::from_hex(raw_log) {
        Ok(item) => item,
        Err(e) => {
            warn!(
                "Block {}: undecodable digest log {}: {}",
                block_number, index, e
            );
            DigestItem::Unknown(hex_to_bytes(raw_log).unwrap_or_default())
        }
    };

    let data = match &item {
        // Entries that were not even valid hex are kept verbatim
        DigestItem::Unknown(bytes) if bytes.is_empty() && !raw_log.is_empty() => {
            raw_log.to_string()
        }
        _ => bytes_to_hex(item.payload()),
    };

    let record = LogRecord {
        id: format!("{}-{}", block_number, index),
        block_id: block_number,
        log_type: item.type_name().to_string(),
        engine: item.engine().map(engine_to_string),
        data,
    };
    (record, item)
}

/// Decode every digest entry in order
pub fn decode_logs(block_number: u64, raw_logs: &[String]) -> (Vec<LogRecord>, Vec<DigestItem>) {
    raw_logs
        .iter()
        .enumerate()
        .map(|(i, raw)| decode_log(block_number, i, raw))
        .unzip()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_pre_runtime_log() {
        let (record, item) = decode_log(5, 0, "0x066175726120778c911100000000");
        assert_eq!(record.id, "5-0");
        assert_eq!(record.log_type, "PreRuntime");
        assert_eq!(record.engine.as_deref(), Some("aura"));
        assert_eq!(record.data, "0x778c911100000000");
        assert!(item.engine().is_some());
    }

    #[test]
    fn test_decode_other_log_has_no_engine() {
        // Other variant with a 2-byte payload
        let (record, _) = decode_log(5, 1, "0x0008beef");
        assert_eq!(record.log_type, "Other");
        assert_eq!(record.engine, None);
        assert_eq!(record.data, "0xbeef");
    }

    #[test]
    fn test_unknown_discriminant() {
        let (record, _) = decode_log(5, 2, "0x2a0102");
        assert_eq!(record.log_type, "Unknown");
        assert_eq!(record.engine, None);
        assert_eq!(record.data, "0x2a0102");
    }

    #[test]
    fn test_malformed_log_does_not_fail() {
        // Truncated Seal entry: engine id cut short
        let (truncated, _) = decode_log(5, 3, "0x056175");
        assert_eq!(truncated.log_type, "Unknown");
        assert_eq!(truncated.data, "0x056175");

        let (garbage, _) = decode_log(5, 4, "not-hex");
        assert_eq!(garbage.log_type, "Unknown");
        assert_eq!(garbage.data, "not-hex");
    }

    #[test]
    fn test_decode_logs_preserves_order() {
        let raw = vec![
            "0x066175726120778c911100000000".to_string(),
            "0x0008beef".to_string(),
        ];
        let (records, items) = decode_logs(9, &raw);
        let ids: Vec<_> = records.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["9-0", "9-1"]);
        assert_eq!(items.len(), 2);
    }
}
