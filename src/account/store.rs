//! Account persistence: registration, credential checks and plan changes.

use anyhow::{anyhow, Result};
use argon2::password_hash::rand_core::OsRng;
use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;
use rusqlite::{params, Connection, OptionalExtension, Row};

use super::{Account, Plan};
use crate::error::ChatError;

const ACCOUNT_COLUMNS: &str = "id, username, email, plan, billing_customer_id, created_at";

/// Hash a password into a PHC string (argon2id, random salt).
pub fn hash_password(password: &str) -> Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| anyhow!("password hashing failed: {e}"))?;
    Ok(hash.to_string())
}

/// Check a password against a PHC string produced by [`hash_password`].
pub fn verify_password(password: &str, phc: &str) -> Result<bool> {
    let parsed = PasswordHash::new(phc).map_err(|e| anyhow!("stored hash is malformed: {e}"))?;
    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .is_ok())
}

/// Create a free-plan account.
///
/// Fails with [`ChatError::DuplicateIdentity`] when the username or email is taken.
pub fn register(conn: &Connection, username: &str, email: &str, password: &str) -> Result<Account> {
    let username = username.trim();
    let email = email.trim();
    if username.is_empty() || email.is_empty() || password.is_empty() {
        return Err(ChatError::invalid_input("username, email and password are required").into());
    }
    if !email.contains('@') {
        return Err(ChatError::invalid_input("email address is not valid").into());
    }

    let password_hash = hash_password(password)?;
    let now = chrono::Utc::now().to_rfc3339();

    let inserted = conn.execute(
        "INSERT INTO accounts (username, email, password_hash, plan, created_at) VALUES (?1, ?2, ?3, 'free', ?4)",
        params![username, email, password_hash, now],
    );
    match inserted {
        Ok(_) => {}
        Err(rusqlite::Error::SqliteFailure(e, _))
            if e.code == rusqlite::ErrorCode::ConstraintViolation =>
        {
            return Err(ChatError::DuplicateIdentity.into());
        }
        Err(e) => return Err(e.into()),
    }

    let id = conn.last_insert_rowid();
    tracing::info!(account_id = id, username, "account registered");
    get_account(conn, id)?.ok_or_else(|| anyhow!("account {id} vanished after insert"))
}

/// Look up an account by username and check its password.
///
/// Unknown usernames and wrong passwords are indistinguishable to the caller.
pub fn verify_credentials(conn: &Connection, username: &str, password: &str) -> Result<Account> {
    let row: Option<(i64, String)> = conn
        .query_row(
            "SELECT id, password_hash FROM accounts WHERE username = ?1",
            params![username.trim()],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )
        .optional()?;

    let Some((id, phc)) = row else {
        return Err(ChatError::unauthorized("Invalid credentials.").into());
    };
    if !verify_password(password, &phc)? {
        return Err(ChatError::unauthorized("Invalid credentials.").into());
    }

    get_account(conn, id)?.ok_or_else(|| ChatError::unauthorized("Invalid credentials.").into())
}

/// Fetch an account by id.
pub fn get_account(conn: &Connection, id: i64) -> Result<Option<Account>> {
    let row = conn
        .query_row(
            &format!("SELECT {ACCOUNT_COLUMNS} FROM accounts WHERE id = ?1"),
            params![id],
            row_to_parts,
        )
        .optional()?;
    row.map(into_account).transpose()
}

/// All accounts, oldest first.
pub fn list_accounts(conn: &Connection) -> Result<Vec<Account>> {
    let mut stmt = conn.prepare(&format!("SELECT {ACCOUNT_COLUMNS} FROM accounts ORDER BY id"))?;
    let rows = stmt.query_map([], row_to_parts)?;
    let mut accounts = Vec::new();
    for row in rows {
        accounts.push(into_account(row?)?);
    }
    Ok(accounts)
}

/// Change an account's plan, optionally recording its billing customer reference.
///
/// Returns `false` if no account has that id.
pub fn set_plan(
    conn: &Connection,
    id: i64,
    plan: Plan,
    billing_customer_id: Option<&str>,
) -> Result<bool> {
    let changed = conn.execute(
        "UPDATE accounts SET plan = ?1, billing_customer_id = COALESCE(?2, billing_customer_id) WHERE id = ?3",
        params![plan.as_str(), billing_customer_id, id],
    )?;
    Ok(changed == 1)
}

type AccountParts = (i64, String, String, String, Option<String>, String);

fn row_to_parts(row: &Row<'_>) -> rusqlite::Result<AccountParts> {
    Ok((
        row.get(0)?,
        row.get(1)?,
        row.get(2)?,
        row.get(3)?,
        row.get(4)?,
        row.get(5)?,
    ))
}

fn into_account(parts: AccountParts) -> Result<Account> {
    let (id, username, email, plan, billing_customer_id, created_at) = parts;
    Ok(Account {
        id,
        username,
        email,
        plan: plan.parse::<Plan>().map_err(|e| anyhow!(e))?,
        billing_customer_id,
        created_at,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_db() -> Connection {
        crate::db::open_memory_database().unwrap()
    }

    #[test]
    fn register_creates_free_account() {
        let conn = test_db();
        let account = register(&conn, "alice", "alice@example.com", "s3cret").unwrap();
        assert_eq!(account.username, "alice");
        assert_eq!(account.plan, Plan::Free);
        assert!(account.billing_customer_id.is_none());
    }

    #[test]
    fn password_is_not_stored_in_clear() {
        let conn = test_db();
        register(&conn, "alice", "alice@example.com", "s3cret").unwrap();
        let stored: String = conn
            .query_row("SELECT password_hash FROM accounts WHERE id = 1", [], |r| r.get(0))
            .unwrap();
        assert!(stored.starts_with("$argon2"));
        assert!(!stored.contains("s3cret"));
    }

    #[test]
    fn duplicate_username_or_email_is_reported() {
        let conn = test_db();
        register(&conn, "alice", "alice@example.com", "pw").unwrap();

        for (user, email) in [("alice", "other@example.com"), ("bob", "alice@example.com")] {
            let err = register(&conn, user, email, "pw").unwrap_err();
            assert!(matches!(
                err.downcast_ref::<ChatError>(),
                Some(ChatError::DuplicateIdentity)
            ));
        }
    }

    #[test]
    fn empty_fields_are_rejected() {
        let conn = test_db();
        let err = register(&conn, " ", "a@example.com", "pw").unwrap_err();
        assert!(matches!(
            err.downcast_ref::<ChatError>(),
            Some(ChatError::InvalidInput(_))
        ));
    }

    #[test]
    fn credentials_are_verified() {
        let conn = test_db();
        let account = register(&conn, "alice", "alice@example.com", "s3cret").unwrap();

        assert_eq!(verify_credentials(&conn, "alice", "s3cret").unwrap().id, account.id);

        for (user, pw) in [("alice", "wrong"), ("nobody", "s3cret")] {
            let err = verify_credentials(&conn, user, pw).unwrap_err();
            assert!(matches!(
                err.downcast_ref::<ChatError>(),
                Some(ChatError::Unauthorized(_))
            ));
        }
    }

    #[test]
    fn set_plan_updates_only_target() {
        let conn = test_db();
        let a = register(&conn, "alice", "alice@example.com", "pw").unwrap();
        let b = register(&conn, "bob", "bob@example.com", "pw").unwrap();

        assert!(set_plan(&conn, a.id, Plan::Pro, Some("cus_123")).unwrap());

        let a = get_account(&conn, a.id).unwrap().unwrap();
        let b = get_account(&conn, b.id).unwrap().unwrap();
        assert_eq!(a.plan, Plan::Pro);
        assert_eq!(a.billing_customer_id.as_deref(), Some("cus_123"));
        assert_eq!(b.plan, Plan::Free);
        assert!(!set_plan(&conn, 404, Plan::Pro, None).unwrap());
    }
}
