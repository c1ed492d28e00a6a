//! Per-account, per-day message counter.
//!
//! Rows are keyed by `(account_id, date)`; a new calendar day simply has no row
//! yet, so counts reset without any rollover job. Check and increment are
//! separate statements: concurrent requests from one account can each pass the
//! check before either increments, admitting at most one extra request per
//! request in flight.

use anyhow::Result;
use chrono::NaiveDate;
use rusqlite::{params, Connection, OptionalExtension};

/// Daily ceiling for accounts on the free plan.
pub const FREE_DAILY_LIMIT: u32 = 10;

/// The server's current calendar day.
pub fn today() -> NaiveDate {
    chrono::Local::now().date_naive()
}

fn day_key(day: NaiveDate) -> String {
    day.format("%Y-%m-%d").to_string()
}

/// Messages counted for `(account_id, day)`; 0 when no row exists.
pub fn usage_for(conn: &Connection, account_id: i64, day: NaiveDate) -> Result<u32> {
    let count: Option<i64> = conn
        .query_row(
            "SELECT message_count FROM daily_usage WHERE account_id = ?1 AND date = ?2",
            params![account_id, day_key(day)],
            |row| row.get(0),
        )
        .optional()?;
    Ok(count.unwrap_or(0) as u32)
}

/// `true` iff the account is still below `limit` for `day`.
pub fn check_daily_limit(
    conn: &Connection,
    account_id: i64,
    day: NaiveDate,
    limit: u32,
) -> Result<bool> {
    Ok(usage_for(conn, account_id, day)? < limit)
}

/// Create the `(account_id, day)` row at zero if absent, then add one.
/// Returns the new count.
pub fn increment_usage(conn: &Connection, account_id: i64, day: NaiveDate) -> Result<u32> {
    let key = day_key(day);
    conn.execute(
        "INSERT OR IGNORE INTO daily_usage (account_id, date, message_count) VALUES (?1, ?2, 0)",
        params![account_id, key],
    )?;
    conn.execute(
        "UPDATE daily_usage SET message_count = message_count + 1 WHERE account_id = ?1 AND date = ?2",
        params![account_id, key],
    )?;
    usage_for(conn, account_id, day)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_db() -> Connection {
        let conn = crate::db::open_memory_database().unwrap();
        conn.execute(
            "INSERT INTO accounts (username, email, password_hash, created_at) VALUES ('a', 'a@x', 'h', 'now')",
            [],
        )
        .unwrap();
        conn
    }

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 3, d).unwrap()
    }

    #[test]
    fn missing_row_counts_as_zero() {
        let conn = test_db();
        assert_eq!(usage_for(&conn, 1, day(1)).unwrap(), 0);
        assert!(check_daily_limit(&conn, 1, day(1), FREE_DAILY_LIMIT).unwrap());
    }

    #[test]
    fn increments_accumulate() {
        let conn = test_db();
        for expected in 1..=7 {
            assert_eq!(increment_usage(&conn, 1, day(1)).unwrap(), expected);
        }
        assert_eq!(usage_for(&conn, 1, day(1)).unwrap(), 7);
    }

    #[test]
    fn next_day_starts_fresh() {
        let conn = test_db();
        increment_usage(&conn, 1, day(1)).unwrap();
        increment_usage(&conn, 1, day(1)).unwrap();
        assert_eq!(usage_for(&conn, 1, day(2)).unwrap(), 0);
    }

    #[test]
    fn ceiling_boundary() {
        let conn = test_db();
        for _ in 0..9 {
            increment_usage(&conn, 1, day(5)).unwrap();
        }
        assert!(check_daily_limit(&conn, 1, day(5), FREE_DAILY_LIMIT).unwrap());
        assert_eq!(increment_usage(&conn, 1, day(5)).unwrap(), 10);
        assert!(!check_daily_limit(&conn, 1, day(5), FREE_DAILY_LIMIT).unwrap());
    }
}
