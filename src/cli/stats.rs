use anyhow::Result;
use rusqlite::{params, Connection};

use crate::account::store::{get_account, list_accounts};
use crate::account::Account;
use crate::config::AppConfig;
use crate::error::ChatError;
use crate::memory::store::count_memories;
use crate::usage::{today, usage_for};

/// Activity totals for one account.
#[derive(Debug)]
pub struct AccountStats {
    pub account: Account,
    pub conversations: u64,
    pub messages: u64,
    pub memories: u64,
    pub used_today: u32,
}

pub fn account_stats(conn: &Connection, account: Account) -> Result<AccountStats> {
    let count = |sql: &str| -> Result<u64> {
        let n: i64 = conn.query_row(sql, params![account.id], |row| row.get(0))?;
        Ok(n as u64)
    };
    let conversations = count("SELECT COUNT(*) FROM conversations WHERE account_id = ?1")?;
    let messages = count("SELECT COUNT(*) FROM messages WHERE account_id = ?1")?;
    let memories = count_memories(conn, account.id)?;
    let used_today = usage_for(conn, account.id, today())?;

    Ok(AccountStats {
        account,
        conversations,
        messages,
        memories,
        used_today,
    })
}

/// Print per-account activity, for one account or all of them.
pub fn stats(config: &AppConfig, account_id: Option<i64>) -> Result<()> {
    let conn = crate::db::open_database(config.resolved_db_path())?;

    let accounts = match account_id {
        Some(id) => vec![get_account(&conn, id)?.ok_or_else(|| ChatError::not_found(format!("account {id}")))?],
        None => list_accounts(&conn)?,
    };

    println!("Account Statistics ({})", today());
    println!("{}", "=".repeat(72));
    println!(
        "  {:<6} {:<20} {:<5} {:>7} {:>9} {:>9} {:>7}",
        "id", "username", "plan", "convos", "messages", "memories", "today"
    );
    for account in accounts {
        let s = account_stats(&conn, account)?;
        let today = if s.account.plan.is_metered() {
            format!("{}/{}", s.used_today, config.limits.free_daily_messages)
        } else {
            s.used_today.to_string()
        };
        println!(
            "  {:<6} {:<20} {:<5} {:>7} {:>9} {:>9} {:>7}",
            s.account.id,
            s.account.username,
            s.account.plan.as_str(),
            s.conversations,
            s.messages,
            s.memories,
            today
        );
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::account::store::register;
    use crate::conversation::{append_message, create_conversation, Role};
    use crate::memory::store::store_memory;
    use crate::usage::increment_usage;

    #[test]
    fn counts_only_the_accounts_own_rows() {
        let conn = crate::db::open_memory_database().unwrap();
        let alice = register(&conn, "alice", "alice@example.com", "pw-alice").unwrap();
        let bob = register(&conn, "bob", "bob@example.com", "pw-bob").unwrap();

        let c = create_conversation(&conn, alice.id, "tea").unwrap();
        append_message(&conn, c.id, alice.id, Role::User, "I like tea").unwrap();
        append_message(&conn, c.id, alice.id, Role::Ai, "Noted.").unwrap();
        store_memory(&conn, alice.id, "I like tea Noted.", &[1.0, 0.0], "embedding-001").unwrap();
        increment_usage(&conn, alice.id, today()).unwrap();
        create_conversation(&conn, bob.id, "other").unwrap();

        let s = account_stats(&conn, alice).unwrap();
        assert_eq!(s.conversations, 1);
        assert_eq!(s.messages, 2);
        assert_eq!(s.memories, 1);
        assert_eq!(s.used_today, 1);

        let s = account_stats(&conn, bob).unwrap();
        assert_eq!((s.conversations, s.messages, s.memories, s.used_today), (1, 0, 0, 0));
    }
}
