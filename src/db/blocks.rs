use anyhow::Result;
use chrono::{DateTime, TimeZone, Utc};
use rusqlite::{params, Connection, Row};

/// Block record for database storage
#[derive(Debug, Clone, PartialEq)]
pub struct BlockRecord {
    pub block_number: u64,
    pub block_hash: String,
    pub timestamp: DateTime<Utc>,
    pub parent_hash: String,
    pub state_root: String,
    pub extrinsics_root: String,
    pub spec_version: u32,
    pub extrinsics_count: u32,
    pub session_id: Option<u32>,
    pub author: Option<String>,
    pub is_finalized: bool,
}

/// Extrinsic record; `id` is "{block}-{index}"
#[derive(Debug, Clone, PartialEq)]
pub struct ExtrinsicRecord {
    pub id: String,
    pub block_id: u64,
    pub hash: String,
    pub module: String,
    pub call: String,
    pub block_height: u64,
    pub success: bool,
    pub is_signed: bool,
    pub extrinsic_index: u32,
    pub timestamp: DateTime<Utc>,
    pub description_id: String,
    pub signer: Option<String>,
    pub signature: Option<String>,
    pub nonce: Option<u64>,
    pub arg_names: Vec<String>,
    pub arg_values: Vec<String>,
    pub nb_events: u32,
    pub fees: Option<String>,
    pub fees_rounded: Option<f64>,
}

/// Event record; `id` is "{block}-{index}"
#[derive(Debug, Clone, PartialEq)]
pub struct EventRecord {
    pub id: String,
    pub block_id: u64,
    pub module: String,
    pub event: String,
    pub block_height: u64,
    pub event_index: u32,
    pub description_id: String,
    /// Set only for events emitted while applying a call
    pub extrinsic_id: Option<String>,
    pub arg_names: Vec<String>,
    pub arg_values: Vec<String>,
}

/// Digest log record; `id` is "{block}-{index}"
#[derive(Debug, Clone, PartialEq)]
pub struct LogRecord {
    pub id: String,
    pub block_id: u64,
    pub log_type: String,
    pub engine: Option<String>,
    pub data: String,
}

fn to_millis(ts: i64) -> DateTime<Utc> {
    Utc.timestamp_millis_opt(ts).single().unwrap_or_default()
}

fn to_json(values: &[String]) -> Result<String> {
    Ok(serde_json::to_string(values)?)
}

fn from_json(text: String) -> rusqlite::Result<Vec<String>> {
    serde_json::from_str(&text).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(0, rusqlite::types::Type::Text, Box::new(e))
    })
}

/// Insert a block; fails if the block number already exists
pub fn insert_block(conn: &Connection, block: &BlockRecord) -> Result<()> {
    conn.execute(
        "INSERT INTO blocks
         (block_number, block_hash, timestamp, parent_hash, state_root, extrinsics_root,
          spec_version, extrinsics_count, session_id, author, is_finalized, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
        params![
            block.block_number as i64,
            &block.block_hash,
            block.timestamp.timestamp_millis(),
            &block.parent_hash,
            &block.state_root,
            &block.extrinsics_root,
            block.spec_version,
            block.extrinsics_count,
            block.session_id,
            &block.author,
            block.is_finalized as i32,
            Utc::now().timestamp()
        ],
    )?;
    Ok(())
}

pub fn insert_extrinsic(conn: &Connection, ext: &ExtrinsicRecord) -> Result<()> {
    conn.execute(
        "INSERT INTO extrinsics
         (id, block_id, hash, module, call, block_height, success, is_signed, extrinsic_index,
          timestamp, description_id, signer, signature, nonce, arg_names, arg_values,
          nb_events, fees, fees_rounded)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18, ?19)",
        params![
            &ext.id,
            ext.block_id as i64,
            &ext.hash,
            &ext.module,
            &ext.call,
            ext.block_height as i64,
            ext.success as i32,
            ext.is_signed as i32,
            ext.extrinsic_index,
            ext.timestamp.timestamp_millis(),
            &ext.description_id,
            &ext.signer,
            &ext.signature,
            ext.nonce.map(|n| n as i64),
            to_json(&ext.arg_names)?,
            to_json(&ext.arg_values)?,
            ext.nb_events,
            &ext.fees,
            ext.fees_rounded,
        ],
    )?;
    Ok(())
}

pub fn insert_event(conn: &Connection, event: &EventRecord) -> Result<()> {
    conn.execute(
        "INSERT INTO events
         (id, block_id, module, event, block_height, event_index, description_id,
          extrinsic_id, arg_names, arg_values)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
        params![
            &event.id,
            event.block_id as i64,
            &event.module,
            &event.event,
            event.block_height as i64,
            event.event_index,
            &event.description_id,
            &event.extrinsic_id,
            to_json(&event.arg_names)?,
            to_json(&event.arg_values)?,
        ],
    )?;
    Ok(())
}

pub fn insert_log(conn: &Connection, log: &LogRecord) -> Result<()> {
    conn.execute(
        "INSERT INTO logs (id, block_id, log_type, engine, data) VALUES (?1, ?2, ?3, ?4, ?5)",
        params![
            &log.id,
            log.block_id as i64,
            &log.log_type,
            &log.engine,
            &log.data
        ],
    )?;
    Ok(())
}

const BLOCK_COLUMNS: &str = "block_number, block_hash, timestamp, parent_hash, state_root,
    extrinsics_root, spec_version, extrinsics_count, session_id, author, is_finalized";

fn block_from_row(row: &Row<'_>) -> rusqlite::Result<BlockRecord> {
    Ok(BlockRecord {
        block_number: row.get::<_, i64>(0)? as u64,
        block_hash: row.get(1)?,
        timestamp: to_millis(row.get(2)?),
        parent_hash: row.get(3)?,
        state_root: row.get(4)?,
        extrinsics_root: row.get(5)?,
        spec_version: row.get(6)?,
        extrinsics_count: row.get(7)?,
        session_id: row.get(8)?,
        author: row.get(9)?,
        is_finalized: row.get::<_, i32>(10)? != 0,
    })
}

/// Check whether a block number has already been indexed
pub fn block_exists(conn: &Connection, block_number: u64) -> Result<bool> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM blocks WHERE block_number = ?1",
        params![block_number as i64],
        |row| row.get(0),
    )?;
    Ok(count > 0)
}

/// Get a block by number
pub fn get_block(conn: &Connection, block_number: u64) -> Result<Option<BlockRecord>> {
    let sql = format!("SELECT {} FROM blocks WHERE block_number = ?1", BLOCK_COLUMNS);
    let result = conn.query_row(&sql, params![block_number as i64], block_from_row);

    match result {
        Ok(block) => Ok(Some(block)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

/// Get the highest block number in the database
pub fn get_max_block_number(conn: &Connection) -> Result<Option<u64>> {
    let result: Option<i64> =
        conn.query_row("SELECT MAX(block_number) FROM blocks", [], |row| row.get(0))?;
    Ok(result.map(|n| n as u64))
}

/// Count total blocks in database
pub fn count_blocks(conn: &Connection) -> Result<u64> {
    let count: i64 = conn.query_row("SELECT COUNT(*) FROM blocks", [], |row| row.get(0))?;
    Ok(count as u64)
}

/// Count rows of an indexed child table (extrinsics, events, logs, ...)
pub fn count_rows(conn: &Connection, table: ChildTable) -> Result<u64> {
    let sql = format!("SELECT COUNT(*) FROM {}", table.name());
    let count: i64 = conn.query_row(&sql, [], |row| row.get(0))?;
    Ok(count as u64)
}

/// Tables counted by the stats query
#[derive(Debug, Clone, Copy)]
pub enum ChildTable {
    Extrinsics,
    Events,
    Logs,
    Sessions,
    HeaderExtensions,
    Transfers,
}

impl ChildTable {
    fn name(&self) -> &'static str {
        match self {
            ChildTable::Extrinsics => "extrinsics",
            ChildTable::Events => "events",
            ChildTable::Logs => "logs",
            ChildTable::Sessions => "sessions",
            ChildTable::HeaderExtensions => "header_extensions",
            ChildTable::Transfers => "transfers",
        }
    }
}

/// Get blocks in a range
pub fn get_blocks_in_range(
    conn: &Connection,
    from: u64,
    to: u64,
    limit: Option<u32>,
) -> Result<Vec<BlockRecord>> {
    let limit_clause = limit.map_or(String::new(), |l| format!(" LIMIT {}", l));
    let sql = format!(
        "SELECT {} FROM blocks WHERE block_number >= ?1 AND block_number <= ?2
         ORDER BY block_number ASC{}",
        BLOCK_COLUMNS, limit_clause
    );

    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(params![from as i64, to as i64], block_from_row)?;

    rows.collect::<std::result::Result<Vec<_>, _>>()
        .map_err(Into::into)
}

/// Extrinsics of one block in index order
pub fn get_extrinsics_for_block(conn: &Connection, block_number: u64) -> Result<Vec<ExtrinsicRecord>> {
    let mut stmt = conn.prepare(
        "SELECT id, block_id, hash, module, call, block_height, success, is_signed,
                extrinsic_index, timestamp, description_id, signer, signature, nonce,
                arg_names, arg_values, nb_events, fees, fees_rounded
         FROM extrinsics WHERE block_id = ?1 ORDER BY extrinsic_index ASC",
    )?;

    let rows = stmt.query_map(params![block_number as i64], |row| {
        Ok(ExtrinsicRecord {
            id: row.get(0)?,
            block_id: row.get::<_, i64>(1)? as u64,
            hash: row.get(2)?,
            module: row.get(3)?,
            call: row.get(4)?,
            block_height: row.get::<_, i64>(5)? as u64,
            success: row.get::<_, i32>(6)? != 0,
            is_signed: row.get::<_, i32>(7)? != 0,
            extrinsic_index: row.get(8)?,
            timestamp: to_millis(row.get(9)?),
            description_id: row.get(10)?,
            signer: row.get(11)?,
            signature: row.get(12)?,
            nonce: row.get::<_, Option<i64>>(13)?.map(|n| n as u64),
            arg_names: from_json(row.get(14)?)?,
            arg_values: from_json(row.get(15)?)?,
            nb_events: row.get(16)?,
            fees: row.get(17)?,
            fees_rounded: row.get(18)?,
        })
    })?;

    rows.collect::<std::result::Result<Vec<_>, _>>()
        .map_err(Into::into)
}

/// Events of one block in index order
pub fn get_events_for_block(conn: &Connection, block_number: u64) -> Result<Vec<EventRecord>> {
    let mut stmt = conn.prepare(
        "SELECT id, block_id, module, event, block_height, event_index, description_id,
                extrinsic_id, arg_names, arg_values
         FROM events WHERE block_id = ?1 ORDER BY event_index ASC",
    )?;

    let rows = stmt.query_map(params![block_number as i64], |row| {
        Ok(EventRecord {
            id: row.get(0)?,
            block_id: row.get::<_, i64>(1)? as u64,
            module: row.get(2)?,
            event: row.get(3)?,
            block_height: row.get::<_, i64>(4)? as u64,
            event_index: row.get(5)?,
            description_id: row.get(6)?,
            extrinsic_id: row.get(7)?,
            arg_names: from_json(row.get(8)?)?,
            arg_values: from_json(row.get(9)?)?,
        })
    })?;

    rows.collect::<std::result::Result<Vec<_>, _>>()
        .map_err(Into::into)
}

/// Digest logs of one block in digest order
pub fn get_logs_for_block(conn: &Connection, block_number: u64) -> Result<Vec<LogRecord>> {
    let mut stmt = conn.prepare(
        "SELECT id, block_id, log_type, engine, data FROM logs
         WHERE block_id = ?1 ORDER BY CAST(substr(id, instr(id, '-') + 1) AS INTEGER) ASC",
    )?;

    let rows = stmt.query_map(params![block_number as i64], |row| {
        Ok(LogRecord {
            id: row.get(0)?,
            block_id: row.get::<_, i64>(1)? as u64,
            log_type: row.get(2)?,
            engine: row.get(3)?,
            data: row.get(4)?,
        })
    })?;

    rows.collect::<std::result::Result<Vec<_>, _>>()
        .map_err(Into::into)
}

/// Find gaps in block sequence
pub fn find_gaps(conn: &Connection) -> Result<Vec<(u64, u64)>> {
    let mut stmt = conn.prepare(
        "SELECT b1.block_number + 1 AS gap_start,
                MIN(b2.block_number) - 1 AS gap_end
         FROM blocks b1
         LEFT JOIN blocks b2 ON b1.block_number < b2.block_number
         WHERE NOT EXISTS (
             SELECT 1 FROM blocks c WHERE c.block_number = b1.block_number + 1
         )
         AND b2.block_number IS NOT NULL
         GROUP BY b1.block_number
         HAVING gap_end >= gap_start",
    )?;

    let rows = stmt.query_map([], |row| {
        Ok((row.get::<_, i64>(0)? as u64, row.get::<_, i64>(1)? as u64))
    })?;

    rows.collect::<std::result::Result<Vec<_>, _>>()
        .map_err(Into::into)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::db::schema::init_schema;

    fn setup_db() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        init_schema(&conn).unwrap();
        conn
    }

    pub(crate) fn sample_block(number: u64) -> BlockRecord {
        BlockRecord {
            block_number: number,
            block_hash: format!("0x{:x}", number),
            timestamp: Utc.timestamp_millis_opt(1_700_000_000_000 + number as i64).unwrap(),
            parent_hash: format!("0x{:x}", number.saturating_sub(1)),
            state_root: "0xabc".to_string(),
            extrinsics_root: "0xdef".to_string(),
            spec_version: 12,
            extrinsics_count: 0,
            session_id: Some(7),
            author: None,
            is_finalized: false,
        }
    }

    #[test]
    fn test_insert_and_get_block() {
        let conn = setup_db();
        let block = sample_block(1000);

        insert_block(&conn, &block).unwrap();

        let retrieved = get_block(&conn, 1000).unwrap().unwrap();
        assert_eq!(retrieved, block);
        assert!(block_exists(&conn, 1000).unwrap());
        assert!(!block_exists(&conn, 1001).unwrap());
    }

    #[test]
    fn test_block_is_never_overwritten() {
        let conn = setup_db();
        insert_block(&conn, &sample_block(5)).unwrap();

        let mut changed = sample_block(5);
        changed.block_hash = "0xother".to_string();
        assert!(insert_block(&conn, &changed).is_err());
        assert_eq!(get_block(&conn, 5).unwrap().unwrap().block_hash, "0x5");
    }

    #[test]
    fn test_extrinsic_args_survive_storage() {
        let conn = setup_db();
        insert_block(&conn, &sample_block(1)).unwrap();

        let ext = ExtrinsicRecord {
            id: "1-0".to_string(),
            block_id: 1,
            hash: "0xe1".to_string(),
            module: "balances".to_string(),
            call: "transferKeepAlive".to_string(),
            block_height: 1,
            success: true,
            is_signed: true,
            extrinsic_index: 0,
            timestamp: sample_block(1).timestamp,
            description_id: "balances_transferKeepAlive".to_string(),
            signer: Some("0xsigner".to_string()),
            signature: Some("0xsig".to_string()),
            nonce: Some(4),
            arg_names: vec!["dest".to_string(), "value".to_string()],
            arg_values: vec!["{\"id\":\"0x01\"}".to_string(), "1000".to_string()],
            nb_events: 3,
            fees: Some("124000000000000000".to_string()),
            fees_rounded: Some(0.124),
        };
        insert_extrinsic(&conn, &ext).unwrap();

        let stored = get_extrinsics_for_block(&conn, 1).unwrap();
        assert_eq!(stored, vec![ext]);
    }

    #[test]
    fn test_logs_ordered_by_index() {
        let conn = setup_db();
        insert_block(&conn, &sample_block(3)).unwrap();
        for i in [10, 2, 1] {
            insert_log(
                &conn,
                &LogRecord {
                    id: format!("3-{}", i),
                    block_id: 3,
                    log_type: "Other".to_string(),
                    engine: None,
                    data: "0x".to_string(),
                },
            )
            .unwrap();
        }

        let ids: Vec<String> = get_logs_for_block(&conn, 3)
            .unwrap()
            .into_iter()
            .map(|l| l.id)
            .collect();
        assert_eq!(ids, vec!["3-1", "3-2", "3-10"]);
    }

    #[test]
    fn test_find_gaps() {
        let conn = setup_db();
        for i in [1, 2, 3, 7, 8, 12] {
            insert_block(&conn, &sample_block(i)).unwrap();
        }

        assert_eq!(find_gaps(&conn).unwrap(), vec![(4, 6), (9, 11)]);
        assert_eq!(get_max_block_number(&conn).unwrap(), Some(12));
        assert_eq!(get_blocks_in_range(&conn, 2, 8, Some(2)).unwrap().len(), 2);
    }
}
