//! Schema migrations, applied in order when a database is opened.
//!
//! `PRAGMA user_version` records the last applied step. Steps above it run
//! inside one transaction each, so a failed step leaves the version untouched.

pub mod v001_initial;

use rusqlite::Connection;

use crate::error::{Result, StoreError};

struct Migration {
    version: u32,
    name: &'static str,
    up: fn(&Connection) -> rusqlite::Result<()>,
}

const MIGRATIONS: &[Migration] = &[Migration {
    version: 1,
    name: "v001_initial",
    up: v001_initial::up,
}];

/// Highest schema version this build knows about.
pub fn latest_version() -> u32 {
    MIGRATIONS.last().map_or(0, |m| m.version)
}

pub fn schema_version(conn: &Connection) -> Result<u32> {
    Ok(conn.pragma_query_value(None, "user_version", |row| row.get(0))?)
}

pub fn run_migrations(conn: &Connection) -> Result<()> {
    let current = schema_version(conn)?;
    if current > latest_version() {
        return Err(StoreError::Migration(format!(
            "database schema v{current} is newer than this build (v{})",
            latest_version()
        )));
    }

    for migration in MIGRATIONS.iter().filter(|m| m.version > current) {
        tracing::info!(version = migration.version, name = migration.name, "applying migration");
        let tx = conn.unchecked_transaction()?;
        (migration.up)(&tx).map_err(|e| StoreError::Migration(format!("{}: {e}", migration.name)))?;
        tx.pragma_update(None, "user_version", migration.version)?;
        tx.commit()?;
    }

    Ok(())
}
