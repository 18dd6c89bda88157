use anyhow::Result;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection};

/// Balance transfer derived from a `balances.Transfer` event; `id` is the event id
#[derive(Debug, Clone, PartialEq)]
pub struct TransferRecord {
    pub id: String,
    pub from: String,
    pub to: String,
    pub amount: String,
    pub block_id: u64,
    pub block_hash: String,
    pub timestamp: DateTime<Utc>,
    pub extrinsic_id: Option<String>,
}

/// Queue accounts for a balance refresh; re-queuing bumps the request time
pub fn queue_account_refresh(conn: &Connection, account_ids: &[String]) -> Result<()> {
    let now = Utc::now().timestamp();
    let mut stmt = conn.prepare(
        "INSERT INTO account_refreshes (account_id, requested_at) VALUES (?1, ?2)
         ON CONFLICT(account_id) DO UPDATE SET requested_at = excluded.requested_at",
    )?;
    for id in account_ids {
        stmt.execute(params![id, now])?;
    }
    Ok(())
}

/// Accounts waiting for a balance refresh
pub fn get_pending_refreshes(conn: &Connection) -> Result<Vec<String>> {
    let mut stmt = conn.prepare("SELECT account_id FROM account_refreshes ORDER BY account_id")?;
    let rows = stmt.query_map([], |row| row.get(0))?;

    rows.collect::<std::result::Result<Vec<_>, _>>()
        .map_err(Into::into)
}

/// Insert a transfer; replays of the same event are ignored
pub fn insert_transfer(conn: &Connection, transfer: &TransferRecord) -> Result<()> {
    conn.execute(
        "INSERT OR IGNORE INTO transfers
         (id, from_account, to_account, amount, block_id, block_hash, timestamp, extrinsic_id)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        params![
            &transfer.id,
            &transfer.from,
            &transfer.to,
            &transfer.amount,
            transfer.block_id as i64,
            &transfer.block_hash,
            transfer.timestamp.timestamp_millis(),
            &transfer.extrinsic_id,
        ],
    )?;
    Ok(())
}

/// Transfers recorded for a block, in event order
pub fn get_transfers_for_block(conn: &Connection, block_number: u64) -> Result<Vec<TransferRecord>> {
    let mut stmt = conn.prepare(
        "SELECT id, from_account, to_account, amount, block_id, block_hash, timestamp, extrinsic_id
         FROM transfers WHERE block_id = ?1
         ORDER BY CAST(substr(id, instr(id, '-') + 1) AS INTEGER) ASC",
    )?;
    let rows = stmt.query_map(params![block_number as i64], |row| {
        Ok(TransferRecord {
            id: row.get(0)?,
            from: row.get(1)?,
            to: row.get(2)?,
            amount: row.get(3)?,
            block_id: row.get::<_, i64>(4)? as u64,
            block_hash: row.get(5)?,
            timestamp: DateTime::from_timestamp_millis(row.get(6)?).unwrap_or_default(),
            extrinsic_id: row.get(7)?,
        })
    })?;

    rows.collect::<std::result::Result<Vec<_>, _>>()
        .map_err(Into::into)
}
