use crate::chain::{DecodeError, HeaderExtension};
use crate::db::{AppLookupRecord, CommitmentRecord, ExtensionRecords, HeaderExtensionRecord};

/// Build the extension, commitment and app lookup records of a block
///
/// All three share the block number as id. `Ok(None)` when the header has no
/// extension payload.
pub fn decode_extension(
    block_number: u64,
    raw: Option<&serde_json::Value>,
) -> Result<Option<ExtensionRecords>, DecodeError> {
    let Some(extension) = HeaderExtension::from_value(raw)? else {
        return Ok(None);
    };

    let id = block_number.to_string();
    let payload = extension.payload();
    let commitment = payload.commitment();
    let lookup = payload.app_lookup();
    let index = serde_json::to_string(&lookup.index)
        .map_err(|e| DecodeError::Extension(e.to_string()))?;

    Ok(Some(ExtensionRecords {
        extension: HeaderExtensionRecord {
            id: id.clone(),
            block_id: block_number,
            version: extension.version().to_string(),
        },
        commitment: CommitmentRecord {
            id: id.clone(),
            block_id: block_number,
            header_extension_id: id.clone(),
            rows: commitment.rows,
            cols: commitment.cols,
            data_root: commitment.data_root,
            commitment: commitment.commitment,
        },
        app_lookup: AppLookupRecord {
            id: id.clone(),
            block_id: block_number,
            header_extension_id: id,
            size: lookup.size,
            index,
        },
    }))
}
