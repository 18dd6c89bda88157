use anyhow::{bail, Result};
use rusqlite::Connection;
use tracing::info;

/// Current schema version - increment when making schema changes
pub const CURRENT_SCHEMA_VERSION: u32 = 1;

/// SQL schema for the indexer database
pub const SCHEMA: &str = r#"
-- Schema metadata for version tracking
CREATE TABLE IF NOT EXISTS schema_meta (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL
);

-- One row per indexed block, never overwritten
CREATE TABLE IF NOT EXISTS blocks (
    block_number INTEGER PRIMARY KEY,
    block_hash TEXT NOT NULL,
    timestamp INTEGER NOT NULL,
    parent_hash TEXT NOT NULL,
    state_root TEXT NOT NULL,
    extrinsics_root TEXT NOT NULL,
    spec_version INTEGER NOT NULL,
    extrinsics_count INTEGER NOT NULL DEFAULT 0,
    session_id INTEGER,
    author TEXT,
    is_finalized INTEGER DEFAULT 0,
    created_at INTEGER NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_blocks_hash ON blocks(block_hash);
CREATE INDEX IF NOT EXISTS idx_blocks_author ON blocks(author);
CREATE INDEX IF NOT EXISTS idx_blocks_session ON blocks(session_id);

-- Calls included in a block; id is "{block}-{index}"
CREATE TABLE IF NOT EXISTS extrinsics (
    id TEXT PRIMARY KEY,
    block_id INTEGER NOT NULL REFERENCES blocks(block_number),
    hash TEXT NOT NULL,
    module TEXT NOT NULL,
    call TEXT NOT NULL,
    block_height INTEGER NOT NULL,
    success INTEGER NOT NULL,
    is_signed INTEGER NOT NULL,
    extrinsic_index INTEGER NOT NULL,
    timestamp INTEGER NOT NULL,
    description_id TEXT NOT NULL,
    signer TEXT,
    signature TEXT,
    nonce INTEGER,
    arg_names TEXT NOT NULL,
    arg_values TEXT NOT NULL,
    nb_events INTEGER NOT NULL DEFAULT 0,
    fees TEXT,
    fees_rounded REAL
);

CREATE INDEX IF NOT EXISTS idx_extrinsics_block ON extrinsics(block_id);
CREATE INDEX IF NOT EXISTS idx_extrinsics_hash ON extrinsics(hash);
CREATE INDEX IF NOT EXISTS idx_extrinsics_module ON extrinsics(module, call);
CREATE INDEX IF NOT EXISTS idx_extrinsics_signer ON extrinsics(signer);

-- Events emitted during block execution; id is "{block}-{index}"
CREATE TABLE IF NOT EXISTS events (
    id TEXT PRIMARY KEY,
    block_id INTEGER NOT NULL REFERENCES blocks(block_number),
    module TEXT NOT NULL,
    event TEXT NOT NULL,
    block_height INTEGER NOT NULL,
    event_index INTEGER NOT NULL,
    description_id TEXT NOT NULL,
    extrinsic_id TEXT,
    arg_names TEXT NOT NULL,
    arg_values TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_events_block ON events(block_id);
CREATE INDEX IF NOT EXISTS idx_events_extrinsic ON events(extrinsic_id);
CREATE INDEX IF NOT EXISTS idx_events_module ON events(module, event);

-- Header digest entries in digest order
CREATE TABLE IF NOT EXISTS logs (
    id TEXT PRIMARY KEY,
    block_id INTEGER NOT NULL REFERENCES blocks(block_number),
    log_type TEXT NOT NULL,
    engine TEXT,
    data TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_logs_block ON logs(block_id);

-- Validator sessions; validators is a JSON array in authority index order
CREATE TABLE IF NOT EXISTS sessions (
    id INTEGER PRIMARY KEY,
    validators TEXT NOT NULL
);

-- Runtime versions keyed by version, with the first block they appeared in
CREATE TABLE IF NOT EXISTS spec_versions (
    spec_version INTEGER PRIMARY KEY,
    block_height INTEGER NOT NULL
);

-- Lazily created, immutable call/event documentation; id is "{module}_{method}"
CREATE TABLE IF NOT EXISTS extrinsic_descriptions (
    id TEXT PRIMARY KEY,
    module TEXT NOT NULL,
    call TEXT NOT NULL,
    description TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS event_descriptions (
    id TEXT PRIMARY KEY,
    module TEXT NOT NULL,
    event TEXT NOT NULL,
    description TEXT NOT NULL
);

-- Data-availability header extension, 1:1:1 with the block
CREATE TABLE IF NOT EXISTS header_extensions (
    id TEXT PRIMARY KEY,
    block_id INTEGER NOT NULL REFERENCES blocks(block_number),
    version TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS commitments (
    id TEXT PRIMARY KEY,
    block_id INTEGER NOT NULL REFERENCES blocks(block_number),
    header_extension_id TEXT NOT NULL REFERENCES header_extensions(id),
    row_count INTEGER NOT NULL,
    col_count INTEGER NOT NULL,
    data_root TEXT,
    commitment TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS app_lookups (
    id TEXT PRIMARY KEY,
    block_id INTEGER NOT NULL REFERENCES blocks(block_number),
    header_extension_id TEXT NOT NULL REFERENCES header_extensions(id),
    size INTEGER NOT NULL,
    lookup_index TEXT NOT NULL
);

-- Accounts whose balances the account updater must refresh
CREATE TABLE IF NOT EXISTS account_refreshes (
    account_id TEXT PRIMARY KEY,
    requested_at INTEGER NOT NULL
);

-- Balance transfers; id is the event id
CREATE TABLE IF NOT EXISTS transfers (
    id TEXT PRIMARY KEY,
    from_account TEXT NOT NULL,
    to_account TEXT NOT NULL,
    amount TEXT NOT NULL,
    block_id INTEGER NOT NULL,
    block_hash TEXT NOT NULL,
    timestamp INTEGER NOT NULL,
    extrinsic_id TEXT
);

CREATE INDEX IF NOT EXISTS idx_transfers_from ON transfers(from_account);
CREATE INDEX IF NOT EXISTS idx_transfers_to ON transfers(to_account);
"#;

/// Initialize database schema and stamp or check its version
pub fn init_schema(conn: &Connection) -> Result<()> {
    conn.execute_batch(SCHEMA)?;

    let db_version = get_schema_version(conn)?;
    if db_version == 0 {
        set_meta(conn, "schema_version", &CURRENT_SCHEMA_VERSION.to_string())?;
        set_meta(conn, "created_by", env!("CARGO_PKG_VERSION"))?;
        info!("Initialized schema version {}", CURRENT_SCHEMA_VERSION);
    } else if db_version > CURRENT_SCHEMA_VERSION {
        bail!(
            "Database schema version {} is newer than supported version {} - upgrade avix",
            db_version,
            CURRENT_SCHEMA_VERSION
        );
    }

    Ok(())
}

/// Get a metadata value from schema_meta
pub fn get_meta(conn: &Connection, key: &str) -> Result<Option<String>> {
    let result = conn.query_row(
        "SELECT value FROM schema_meta WHERE key = ?1",
        [key],
        |row| row.get(0),
    );
    match result {
        Ok(value) => Ok(Some(value)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

/// Set a metadata value in schema_meta
pub fn set_meta(conn: &Connection, key: &str, value: &str) -> Result<()> {
    conn.execute(
        "INSERT OR REPLACE INTO schema_meta (key, value) VALUES (?1, ?2)",
        [key, value],
    )?;
    Ok(())
}

/// Get the current schema version from the database (0 if not set)
pub fn get_schema_version(conn: &Connection) -> Result<u32> {
    match get_meta(conn, "schema_version")? {
        Some(v) => Ok(v.parse().unwrap_or(0)),
        None => Ok(0),
    }
}
