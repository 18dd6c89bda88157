use anyhow::Result;
use rusqlite::{params, Connection};

/// Which description table a record belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DescriptionKind {
    Extrinsic,
    Event,
}

impl DescriptionKind {
    fn table(&self) -> &'static str {
        match self {
            DescriptionKind::Extrinsic => "extrinsic_descriptions",
            DescriptionKind::Event => "event_descriptions",
        }
    }

    fn method_column(&self) -> &'static str {
        match self {
            DescriptionKind::Extrinsic => "call",
            DescriptionKind::Event => "event",
        }
    }
}

impl std::fmt::Display for DescriptionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DescriptionKind::Extrinsic => write!(f, "extrinsic"),
            DescriptionKind::Event => write!(f, "event"),
        }
    }
}

/// Human-readable documentation for one (module, method) pair
#[derive(Debug, Clone, PartialEq)]
pub struct DescriptionRecord {
    pub id: String,
    pub module: String,
    pub method: String,
    pub description: String,
}

impl DescriptionRecord {
    pub fn key(module: &str, method: &str) -> String {
        format!("{}_{}", module, method)
    }
}

pub fn get_description(
    conn: &Connection,
    kind: DescriptionKind,
    id: &str,
) -> Result<Option<DescriptionRecord>> {
    let sql = format!(
        "SELECT id, module, {}, description FROM {} WHERE id = ?1",
        kind.method_column(),
        kind.table()
    );
    let result = conn.query_row(&sql, params![id], |row| {
        Ok(DescriptionRecord {
            id: row.get(0)?,
            module: row.get(1)?,
            method: row.get(2)?,
            description: row.get(3)?,
        })
    });

    match result {
        Ok(record) => Ok(Some(record)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

/// Insert a description unless its id exists; returns whether a row was written
pub fn insert_description(
    conn: &Connection,
    kind: DescriptionKind,
    record: &DescriptionRecord,
) -> Result<bool> {
    let sql = format!(
        "INSERT OR IGNORE INTO {} (id, module, {}, description) VALUES (?1, ?2, ?3, ?4)",
        kind.table(),
        kind.method_column()
    );
    let inserted = conn.execute(
        &sql,
        params![&record.id, &record.module, &record.method, &record.description],
    )?;
    Ok(inserted > 0)
}

pub fn count_descriptions(conn: &Connection, kind: DescriptionKind) -> Result<u64> {
    let sql = format!("SELECT COUNT(*) FROM {}", kind.table());
    let count: i64 = conn.query_row(&sql, [], |row| row.get(0))?;
    Ok(count as u64)
}
