//! Opaque bearer tokens mapping to accounts.

use anyhow::Result;
use rusqlite::{params, Connection, OptionalExtension};

use super::store::get_account;
use super::Account;

/// Issue a new session token for an account.
pub fn create_session(conn: &Connection, account_id: i64) -> Result<String> {
    let token = uuid::Uuid::new_v4().simple().to_string();
    conn.execute(
        "INSERT INTO sessions (token, account_id, created_at) VALUES (?1, ?2, ?3)",
        params![token, account_id, chrono::Utc::now().to_rfc3339()],
    )?;
    Ok(token)
}

/// Resolve a token to its account. `None` for unknown tokens.
pub fn authenticate(conn: &Connection, token: &str) -> Result<Option<Account>> {
    let account_id: Option<i64> = conn
        .query_row(
            "SELECT account_id FROM sessions WHERE token = ?1",
            params![token],
            |row| row.get(0),
        )
        .optional()?;

    match account_id {
        Some(id) => get_account(conn, id),
        None => Ok(None),
    }
}

/// Revoke a token. Returns `false` if it did not exist.
pub fn delete_session(conn: &Connection, token: &str) -> Result<bool> {
    Ok(conn.execute("DELETE FROM sessions WHERE token = ?1", params![token])? == 1)
}
