use anyhow::Result;
use rusqlite::{params, Connection};

/// Header extension of one block; `id` is the block number
#[derive(Debug, Clone, PartialEq)]
pub struct HeaderExtensionRecord {
    pub id: String,
    pub block_id: u64,
    pub version: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CommitmentRecord {
    pub id: String,
    pub block_id: u64,
    pub header_extension_id: String,
    pub rows: u16,
    pub cols: u16,
    pub data_root: Option<String>,
    pub commitment: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AppLookupRecord {
    pub id: String,
    pub block_id: u64,
    pub header_extension_id: String,
    pub size: u32,
    /// Index table serialized as JSON text
    pub index: String,
}

/// The three records derived from one header extension
#[derive(Debug, Clone, PartialEq)]
pub struct ExtensionRecords {
    pub extension: HeaderExtensionRecord,
    pub commitment: CommitmentRecord,
    pub app_lookup: AppLookupRecord,
}

/// Insert extension, commitment and app lookup, in that order
pub fn insert_extension(conn: &Connection, records: &ExtensionRecords) -> Result<()> {
    let ext = &records.extension;
    conn.execute(
        "INSERT INTO header_extensions (id, block_id, version) VALUES (?1, ?2, ?3)",
        params![&ext.id, ext.block_id as i64, &ext.version],
    )?;

    let c = &records.commitment;
    conn.execute(
        "INSERT INTO commitments
         (id, block_id, header_extension_id, row_count, col_count, data_root, commitment)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            &c.id,
            c.block_id as i64,
            &c.header_extension_id,
            c.rows,
            c.cols,
            &c.data_root,
            &c.commitment
        ],
    )?;

    let a = &records.app_lookup;
    conn.execute(
        "INSERT INTO app_lookups (id, block_id, header_extension_id, size, lookup_index)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![&a.id, a.block_id as i64, &a.header_extension_id, a.size, &a.index],
    )?;
    Ok(())
}

/// Load the extension triple of a block, if it has one
pub fn get_extension_for_block(conn: &Connection, block_number: u64) -> Result<Option<ExtensionRecords>> {
    let result = conn.query_row(
        "SELECT e.id, e.version,
                c.id, c.row_count, c.col_count, c.data_root, c.commitment,
                a.id, a.size, a.lookup_index
         FROM header_extensions e
         JOIN commitments c ON c.header_extension_id = e.id
         JOIN app_lookups a ON a.header_extension_id = e.id
         WHERE e.block_id = ?1",
        params![block_number as i64],
        |row| {
            let extension_id: String = row.get(0)?;
            Ok(ExtensionRecords {
                extension: HeaderExtensionRecord {
                    id: extension_id.clone(),
                    block_id: block_number,
                    version: row.get(1)?,
                },
                commitment: CommitmentRecord {
                    id: row.get(2)?,
                    block_id: block_number,
                    header_extension_id: extension_id.clone(),
                    rows: row.get(3)?,
                    cols: row.get(4)?,
                    data_root: row.get(5)?,
                    commitment: row.get(6)?,
                },
                app_lookup: AppLookupRecord {
                    id: row.get(7)?,
                    block_id: block_number,
                    header_extension_id: extension_id,
                    size: row.get(8)?,
                    index: row.get(9)?,
                },
            })
        },
    );

    match result {
        Ok(records) => Ok(Some(records)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::schema::init_schema;

    #[test]
    fn test_insert_and_get_extension() {
        let conn = Connection::open_in_memory().unwrap();
        init_schema(&conn).unwrap();

        let records = ExtensionRecords {
            extension: HeaderExtensionRecord {
                id: "42".to_string(),
                block_id: 42,
                version: "v2".to_string(),
            },
            commitment: CommitmentRecord {
                id: "42".to_string(),
                block_id: 42,
                header_extension_id: "42".to_string(),
                rows: 1,
                cols: 4,
                data_root: None,
                commitment: "0xab".to_string(),
            },
            app_lookup: AppLookupRecord {
                id: "42".to_string(),
                block_id: 42,
                header_extension_id: "42".to_string(),
                size: 1,
                index: "[]".to_string(),
            },
        };

        insert_extension(&conn, &records).unwrap();
        assert_eq!(get_extension_for_block(&conn, 42).unwrap(), Some(records));
        assert_eq!(get_extension_for_block(&conn, 43).unwrap(), None);
    }
}
