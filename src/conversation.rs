//! Conversations and their ordered, immutable message log.

use anyhow::{anyhow, Result};
use rusqlite::{params, Connection, OptionalExtension};
use serde::{Deserialize, Serialize};

use crate::error::ChatError;

/// Title given to conversations opened without one.
pub const DEFAULT_TITLE: &str = "New Chat";

/// Who wrote a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    User,
    Ai,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Ai => "ai",
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "user" => Ok(Self::User),
            "ai" => Ok(Self::Ai),
            _ => Err(format!("unknown role: {s}")),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Conversation {
    pub id: i64,
    pub account_id: i64,
    pub title: String,
    pub created_at: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct Message {
    pub id: i64,
    pub conversation_id: i64,
    pub account_id: i64,
    pub role: Role,
    pub content: String,
    pub created_at: String,
}

/// Open a new conversation for an account.
pub fn create_conversation(conn: &Connection, account_id: i64, title: &str) -> Result<Conversation> {
    let title = if title.trim().is_empty() {
        DEFAULT_TITLE
    } else {
        title.trim()
    };
    let now = chrono::Utc::now().to_rfc3339();
    conn.execute(
        "INSERT INTO conversations (account_id, title, created_at) VALUES (?1, ?2, ?3)",
        params![account_id, title, now],
    )?;
    let id = conn.last_insert_rowid();
    tracing::debug!(conversation_id = id, account_id, "conversation created");
    Ok(Conversation {
        id,
        account_id,
        title: title.to_string(),
        created_at: now,
    })
}

/// Fetch a conversation only if `account_id` owns it.
pub fn get_conversation(
    conn: &Connection,
    account_id: i64,
    conversation_id: i64,
) -> Result<Option<Conversation>> {
    Ok(conn
        .query_row(
            "SELECT id, account_id, title, created_at FROM conversations WHERE id = ?1 AND account_id = ?2",
            params![conversation_id, account_id],
            |row| {
                Ok(Conversation {
                    id: row.get(0)?,
                    account_id: row.get(1)?,
                    title: row.get(2)?,
                    created_at: row.get(3)?,
                })
            },
        )
        .optional()?)
}

/// An account's conversations, newest first.
pub fn list_conversations(conn: &Connection, account_id: i64) -> Result<Vec<Conversation>> {
    let mut stmt = conn.prepare(
        "SELECT id, account_id, title, created_at FROM conversations \
         WHERE account_id = ?1 ORDER BY created_at DESC, id DESC",
    )?;
    let rows = stmt.query_map(params![account_id], |row| {
        Ok(Conversation {
            id: row.get(0)?,
            account_id: row.get(1)?,
            title: row.get(2)?,
            created_at: row.get(3)?,
        })
    })?;
    Ok(rows.collect::<Result<Vec<_>, _>>()?)
}

/// Append a message. The conversation must belong to `account_id`, otherwise
/// [`ChatError::NotFound`] is returned and nothing is written.
pub fn append_message(
    conn: &Connection,
    conversation_id: i64,
    account_id: i64,
    role: Role,
    content: &str,
) -> Result<i64> {
    if get_conversation(conn, account_id, conversation_id)?.is_none() {
        return Err(ChatError::not_found(format!("conversation {conversation_id}")).into());
    }

    conn.execute(
        "INSERT INTO messages (conversation_id, account_id, role, content, created_at) VALUES (?1, ?2, ?3, ?4, ?5)",
        params![
            conversation_id,
            account_id,
            role.as_str(),
            content,
            chrono::Utc::now().to_rfc3339(),
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

/// Messages of a conversation in creation order.
pub fn list_messages(conn: &Connection, conversation_id: i64) -> Result<Vec<Message>> {
    let mut stmt = conn.prepare(
        "SELECT id, conversation_id, account_id, role, content, created_at FROM messages \
         WHERE conversation_id = ?1 ORDER BY created_at, id",
    )?;
    let rows = stmt.query_map(params![conversation_id], |row| {
        Ok((
            row.get::<_, i64>(0)?,
            row.get::<_, i64>(1)?,
            row.get::<_, i64>(2)?,
            row.get::<_, String>(3)?,
            row.get::<_, String>(4)?,
            row.get::<_, String>(5)?,
        ))
    })?;

    let mut messages = Vec::new();
    for row in rows {
        let (id, conversation_id, account_id, role, content, created_at) = row?;
        messages.push(Message {
            id,
            conversation_id,
            account_id,
            role: role.parse().map_err(|e: String| anyhow!(e))?,
            content,
            created_at,
        });
    }
    Ok(messages)
}
