//! Billing bridge: verified payment notifications become plan upgrades.

pub mod checkout;
pub mod webhook;

use anyhow::Result;
use rusqlite::{params, Connection, OptionalExtension};

use crate::account::store::set_plan;
use crate::account::Plan;
use crate::error::ChatError;
use webhook::{CheckoutSession, WebhookEvent, CHECKOUT_COMPLETED};

/// What applying a notification did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventOutcome {
    Upgraded { account_id: i64 },
    /// Already applied on an earlier delivery.
    Duplicate,
    /// Not an event this service acts on.
    Ignored,
}

/// Account a completed checkout was paid for: `metadata.account_id`, else
/// `client_reference_id`. There is no fallback.
pub fn resolve_account_id(session: &CheckoutSession) -> Result<i64, ChatError> {
    let raw = session
        .metadata
        .as_ref()
        .and_then(|m| m.get("account_id"))
        .or(session.client_reference_id.as_ref())
        .ok_or_else(|| {
            ChatError::payment(format!("checkout session {} carries no account reference", session.id))
        })?;

    raw.trim().parse::<i64>().map_err(|_| {
        ChatError::payment(format!(
            "checkout session {} has unparseable account reference {raw:?}",
            session.id
        ))
    })
}

/// Upgrade the account a checkout session belongs to. Nothing is written when
/// the account cannot be identified.
pub fn apply_checkout_completed(conn: &Connection, session: &CheckoutSession) -> Result<i64> {
    let account_id = resolve_account_id(session)?;
    if !set_plan(conn, account_id, Plan::Pro, session.customer.as_deref())? {
        return Err(ChatError::payment(format!("checkout session {} names unknown account {account_id}", session.id)).into());
    }
    tracing::info!(account_id, session_id = %session.id, "account upgraded to pro");
    Ok(account_id)
}

/// Apply a verified notification at most once per event id.
pub fn apply_event(conn: &mut Connection, event: &WebhookEvent) -> Result<EventOutcome> {
    if event.event_type != CHECKOUT_COMPLETED {
        tracing::debug!(event_id = %event.id, event_type = %event.event_type, "ignoring billing event");
        return Ok(EventOutcome::Ignored);
    }

    let tx = conn.transaction()?;
    let seen = tx
        .query_row(
            "SELECT 1 FROM processed_events WHERE event_id = ?1",
            params![event.id],
            |_| Ok(()),
        )
        .optional()?
        .is_some();
    if seen {
        tracing::info!(event_id = %event.id, "billing event already processed");
        return Ok(EventOutcome::Duplicate);
    }

    let session = event.checkout_session()?;
    let account_id = apply_checkout_completed(&tx, &session)?;
    tx.execute(
        "INSERT INTO processed_events (event_id, event_type, account_id, processed_at) VALUES (?1, ?2, ?3, ?4)",
        params![
            event.id,
            event.event_type,
            account_id,
            chrono::Utc::now().to_rfc3339()
        ],
    )?;
    tx.commit()?;

    Ok(EventOutcome::Upgraded { account_id })
}
