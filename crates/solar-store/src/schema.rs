//! Hot store schema and versioning.

use rusqlite::Connection;

use crate::error::{Error, Result};

/// Current schema version.
pub const SCHEMA_VERSION: i32 = 1;

/// Initialize the database schema.
pub fn initialize(conn: &Connection) -> Result<()> {
    let version = get_schema_version(conn)?;

    if version == 0 {
        create_schema_v1(conn)?;
        set_schema_version(conn, SCHEMA_VERSION)?;
    } else if version != SCHEMA_VERSION {
        return Err(Error::Corrupt(format!(
            "unsupported hot store schema version {} (expected {})",
            version, SCHEMA_VERSION
        )));
    }

    Ok(())
}

/// Get the current schema version.
fn get_schema_version(conn: &Connection) -> Result<i32> {
    let exists: bool = conn.query_row(
        "SELECT COUNT(*) > 0 FROM sqlite_master WHERE type='table' AND name='schema_version'",
        [],
        |row| row.get(0),
    )?;

    if !exists {
        return Ok(0);
    }

    let version: i32 =
        conn.query_row("SELECT version FROM schema_version", [], |row| row.get(0))?;

    Ok(version)
}

fn set_schema_version(conn: &Connection, version: i32) -> Result<()> {
    conn.execute(
        "INSERT OR REPLACE INTO schema_version (id, version) VALUES (1, ?)",
        [version],
    )?;
    Ok(())
}

/// Create the initial schema (version 1).
///
/// Readings are keyed by `(day, time)`; `day` is the two-digit day of month
/// and `time` the `"HH:MM"` text, so `ORDER BY time` is chronological.
fn create_schema_v1(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS schema_version (
            id INTEGER PRIMARY KEY CHECK (id = 1),
            version INTEGER NOT NULL
        );

        CREATE TABLE IF NOT EXISTS hot_readings (
            day TEXT NOT NULL,
            time TEXT NOT NULL,
            energy REAL NOT NULL,
            power REAL NOT NULL,
            temperature REAL NOT NULL,
            expire_at INTEGER NOT NULL,
            PRIMARY KEY (day, time)
        );
        CREATE INDEX IF NOT EXISTS idx_hot_readings_expire
            ON hot_readings(expire_at);
        "#,
    )?;

    Ok(())
}
