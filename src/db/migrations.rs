//! Schema versioning.
//!
//! `schema::init_schema` always creates the current layout and stamps version 1.
//! Later layouts are reached by appending a [`Migration`] to [`MIGRATIONS`];
//! each one runs in its own transaction and bumps `schema_meta.schema_version`.
//! A database stamped with a version this binary does not know is refused
//! rather than silently used.

use anyhow::{bail, Result};
use rusqlite::Connection;

/// One forward step of the schema.
pub struct Migration {
    /// Version the database is at after this step.
    pub version: u32,
    pub sql: &'static str,
}

/// Ordered upgrade steps past version 1.
pub const MIGRATIONS: &[Migration] = &[];

/// The schema version that the current binary expects.
pub const CURRENT_SCHEMA_VERSION: u32 = 1 + MIGRATIONS.len() as u32;

pub fn get_schema_version(conn: &Connection) -> rusqlite::Result<u32> {
    conn.query_row(
        "SELECT value FROM schema_meta WHERE key = 'schema_version'",
        [],
        |row| {
            let val: String = row.get(0)?;
            Ok(val.parse::<u32>().unwrap_or(0))
        },
    )
}

fn set_schema_version(conn: &Connection, version: u32) -> rusqlite::Result<()> {
    conn.execute(
        "UPDATE schema_meta SET value = ?1 WHERE key = 'schema_version'",
        [version.to_string()],
    )?;
    Ok(())
}

/// Embedding model the server last ran with, if any.
pub fn get_embedding_model(conn: &Connection) -> rusqlite::Result<Option<String>> {
    match conn.query_row(
        "SELECT value FROM schema_meta WHERE key = 'embedding_model'",
        [],
        |row| row.get::<_, String>(0),
    ) {
        Ok(val) => Ok(Some(val)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e),
    }
}

/// Record the embedding model the server is running with.
pub fn set_embedding_model(conn: &Connection, model: &str) -> rusqlite::Result<()> {
    conn.execute(
        "INSERT OR REPLACE INTO schema_meta (key, value) VALUES ('embedding_model', ?1)",
        [model],
    )?;
    Ok(())
}

/// Bring the database up to [`CURRENT_SCHEMA_VERSION`].
pub fn run_migrations(conn: &Connection) -> Result<()> {
    apply_migrations(conn, MIGRATIONS)
}

fn apply_migrations(conn: &Connection, migrations: &[Migration]) -> Result<()> {
    let version = get_schema_version(conn)?;
    let target = migrations.last().map_or(1, |m| m.version);
    if version > target {
        bail!("database schema v{version} is newer than this build supports (v{target})");
    }

    for migration in migrations.iter().filter(|m| m.version > version) {
        tracing::info!(to = migration.version, "running migration");
        let tx = conn.unchecked_transaction()?;
        tx.execute_batch(migration.sql)?;
        set_schema_version(&tx, migration.version)?;
        tx.commit()?;
    }

    Ok(())
}
