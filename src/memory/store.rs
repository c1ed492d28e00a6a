//! Append-only memory storage.
//!
//! Memories are inserted once per completed exchange and never updated or
//! deleted. Reads are a full scan of one account's rows for one embedding model.

use anyhow::{ensure, Result};
use rusqlite::{params, Connection, OptionalExtension};

use super::types::Memory;
use super::{bytes_to_embedding, embedding_to_bytes};

/// Insert a memory. Returns the new row id.
pub fn store_memory(
    conn: &Connection,
    account_id: i64,
    content: &str,
    embedding: &[f32],
    embedding_model: &str,
) -> Result<i64> {
    ensure!(!embedding.is_empty(), "refusing to store an empty embedding");

    let now = chrono::Utc::now().to_rfc3339();
    conn.execute(
        "INSERT INTO memories (account_id, content, embedding, dimensions, embedding_model, created_at) \
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            account_id,
            content,
            embedding_to_bytes(embedding),
            embedding.len() as i64,
            embedding_model,
            now,
        ],
    )?;

    let id = conn.last_insert_rowid();
    tracing::debug!(id, account_id, dims = embedding.len(), "memory stored");
    Ok(id)
}

/// Load every memory an account owns that was embedded with `embedding_model`.
pub fn list_memories(
    conn: &Connection,
    account_id: i64,
    embedding_model: &str,
) -> Result<Vec<Memory>> {
    let mut stmt = conn.prepare(
        "SELECT id, account_id, content, embedding, dimensions, embedding_model, created_at \
         FROM memories WHERE account_id = ?1 AND embedding_model = ?2 ORDER BY id",
    )?;

    let rows = stmt.query_map(params![account_id, embedding_model], |row| {
        Ok((
            row.get::<_, i64>(0)?,
            row.get::<_, i64>(1)?,
            row.get::<_, String>(2)?,
            row.get::<_, Vec<u8>>(3)?,
            row.get::<_, i64>(4)?,
            row.get::<_, String>(5)?,
            row.get::<_, String>(6)?,
        ))
    })?;

    let mut memories = Vec::new();
    for row in rows {
        let (id, account_id, content, blob, dimensions, embedding_model, created_at) = row?;
        let embedding = bytes_to_embedding(&blob)?;
        ensure!(
            embedding.len() as i64 == dimensions,
            "memory {id} is corrupt: blob holds {} values, row declares {dimensions}",
            embedding.len()
        );
        memories.push(Memory {
            id,
            account_id,
            content,
            embedding,
            embedding_model,
            created_at,
        });
    }
    Ok(memories)
}

/// A stored dimensionality other than `expected` among an account's memories
/// for `embedding_model`, if one exists. Answered from the `dimensions` column
/// without decoding any vector.
pub fn find_dimension_mismatch(
    conn: &Connection,
    account_id: i64,
    embedding_model: &str,
    expected: usize,
) -> Result<Option<usize>> {
    let found: Option<i64> = conn
        .query_row(
            "SELECT dimensions FROM memories \
             WHERE account_id = ?1 AND embedding_model = ?2 AND dimensions != ?3 LIMIT 1",
            params![account_id, embedding_model, expected as i64],
            |row| row.get(0),
        )
        .optional()?;
    Ok(found.map(|d| d as usize))
}

/// Number of memories an account owns, across all embedding models.
pub fn count_memories(conn: &Connection, account_id: i64) -> Result<u64> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM memories WHERE account_id = ?1",
        params![account_id],
        |row| row.get(0),
    )?;
    Ok(count as u64)
}
