//! Versioned schema migrations.
//!
//! `PRAGMA user_version` records the last applied step. Each pending step
//! runs inside its own transaction together with the version bump, so a
//! failed step leaves the schema at the previous version.

pub mod v001_initial;

use rusqlite::Connection;

use crate::error::{Result, StoreError};

type Step = fn(&Connection) -> rusqlite::Result<()>;

/// Ordered steps; the schema version after step `i` is `i + 1`.
const STEPS: &[(&str, Step)] = &[("v001_initial", v001_initial::up)];

/// Schema version of a fully migrated database.
pub fn current_version() -> u32 {
    STEPS.len() as u32
}

/// Apply every step newer than the database's `user_version`.
pub fn run_migrations(conn: &Connection) -> Result<()> {
    let applied: u32 = conn.pragma_query_value(None, "user_version", |row| row.get(0))?;
    let target = current_version();

    if applied > target {
        return Err(StoreError::Migration(format!(
            "database is at schema v{applied}, this build only knows v{target}"
        )));
    }

    for (index, (name, step)) in STEPS.iter().enumerate().skip(applied as usize) {
        let version = index as u32 + 1;
        tracing::info!(migration = name, version, "applying migration");

        let tx = conn.unchecked_transaction()?;
        step(&tx).map_err(|e| StoreError::Migration(format!("{name}: {e}")))?;
        tx.pragma_update(None, "user_version", version)?;
        tx.commit()?;
    }

    Ok(())
}
