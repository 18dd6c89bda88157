use anyhow::Result;
use rusqlite::{params, Connection};

/// Validator session with its ordered validator set
#[derive(Debug, Clone, PartialEq)]
pub struct SessionRecord {
    pub id: u32,
    /// Authority index order
    pub validators: Vec<String>,
}

/// Runtime version and the block it first appeared in
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SpecVersionRecord {
    pub spec_version: u32,
    pub block_height: u64,
}

pub fn get_session(conn: &Connection, session_id: u32) -> Result<Option<SessionRecord>> {
    let result = conn.query_row(
        "SELECT id, validators FROM sessions WHERE id = ?1",
        params![session_id],
        |row| Ok((row.get::<_, u32>(0)?, row.get::<_, String>(1)?)),
    );

    match result {
        Ok((id, validators)) => Ok(Some(SessionRecord {
            id,
            validators: serde_json::from_str(&validators)?,
        })),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

/// Insert a session unless it already exists
pub fn insert_session(conn: &Connection, session: &SessionRecord) -> Result<()> {
    conn.execute(
        "INSERT OR IGNORE INTO sessions (id, validators) VALUES (?1, ?2)",
        params![session.id, serde_json::to_string(&session.validators)?],
    )?;
    Ok(())
}

pub fn get_spec_version(conn: &Connection, spec_version: u32) -> Result<Option<SpecVersionRecord>> {
    let result = conn.query_row(
        "SELECT spec_version, block_height FROM spec_versions WHERE spec_version = ?1",
        params![spec_version],
        |row| {
            Ok(SpecVersionRecord {
                spec_version: row.get(0)?,
                block_height: row.get::<_, i64>(1)? as u64,
            })
        },
    );

    match result {
        Ok(record) => Ok(Some(record)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

/// Insert a spec version; the first block a version was seen at wins
pub fn insert_spec_version(conn: &Connection, record: &SpecVersionRecord) -> Result<()> {
    conn.execute(
        "INSERT OR IGNORE INTO spec_versions (spec_version, block_height) VALUES (?1, ?2)",
        params![record.spec_version, record.block_height as i64],
    )?;
    Ok(())
}

/// All spec versions ordered by the block they started at
pub fn list_spec_versions(conn: &Connection) -> Result<Vec<SpecVersionRecord>> {
    let mut stmt = conn.prepare(
        "SELECT spec_version, block_height FROM spec_versions ORDER BY block_height ASC",
    )?;
    let rows = stmt.query_map([], |row| {
        Ok(SpecVersionRecord {
            spec_version: row.get(0)?,
            block_height: row.get::<_, i64>(1)? as u64,
        })
    })?;

    rows.collect::<std::result::Result<Vec<_>, _>>()
        .map_err(Into::into)
}
