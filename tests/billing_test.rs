mod helpers;

use helpers::{create_account, test_db};
use serde_json::json;
use suhan::account::store::get_account;
use suhan::account::Plan;
use suhan::billing::webhook::{compute_signature, verify_event, WebhookEvent, CHECKOUT_COMPLETED};
use suhan::billing::{apply_event, EventOutcome};
use suhan::error::ChatError;

const SECRET: &str = "whsec_integration";

/// Sign `body` the way the payment processor does and run it through
/// verification.
fn deliver(body: serde_json::Value) -> anyhow::Result<WebhookEvent> {
    let payload = body.to_string().into_bytes();
    let now = chrono::Utc::now().timestamp();
    let header = format!("t={now},v1={}", compute_signature(SECRET, now, &payload)?);
    verify_event(&payload, &header, SECRET, 300, now)
}

fn checkout_event(event_id: &str, object: serde_json::Value) -> serde_json::Value {
    json!({
        "id": event_id,
        "type": CHECKOUT_COMPLETED,
        "data": { "object": object }
    })
}

fn plan_of(conn: &rusqlite::Connection, id: i64) -> Plan {
    get_account(conn, id).unwrap().unwrap().plan
}

#[test]
fn checkout_upgrades_exactly_the_paying_account() {
    let mut conn = test_db();
    let first = create_account(&conn, "first", Plan::Free);
    let buyer = create_account(&conn, "buyer", Plan::Free);

    let event = deliver(checkout_event(
        "evt_100",
        json!({
            "id": "cs_100",
            "customer": "cus_abc",
            "metadata": { "account_id": buyer.id.to_string() }
        }),
    ))
    .unwrap();

    let outcome = apply_event(&mut conn, &event).unwrap();
    assert_eq!(outcome, EventOutcome::Upgraded { account_id: buyer.id });

    let upgraded = get_account(&conn, buyer.id).unwrap().unwrap();
    assert_eq!(upgraded.plan, Plan::Pro);
    assert_eq!(upgraded.billing_customer_id.as_deref(), Some("cus_abc"));
    // the lowest-numbered account is never a fallback
    assert_eq!(plan_of(&conn, first.id), Plan::Free);
}

#[test]
fn client_reference_is_used_without_metadata() {
    let mut conn = test_db();
    let buyer = create_account(&conn, "buyer", Plan::Free);

    let event = deliver(checkout_event(
        "evt_101",
        json!({ "id": "cs_101", "client_reference_id": buyer.id.to_string() }),
    ))
    .unwrap();

    apply_event(&mut conn, &event).unwrap();
    assert_eq!(plan_of(&conn, buyer.id), Plan::Pro);
}

#[test]
fn redelivery_is_acknowledged_once() {
    let mut conn = test_db();
    let buyer = create_account(&conn, "buyer", Plan::Free);
    let body = checkout_event(
        "evt_102",
        json!({ "id": "cs_102", "metadata": { "account_id": buyer.id.to_string() } }),
    );

    let event = deliver(body.clone()).unwrap();
    assert!(matches!(apply_event(&mut conn, &event).unwrap(), EventOutcome::Upgraded { .. }));

    let again = deliver(body).unwrap();
    assert_eq!(apply_event(&mut conn, &again).unwrap(), EventOutcome::Duplicate);
}

#[test]
fn unidentifiable_checkout_changes_nothing() {
    let mut conn = test_db();
    let only = create_account(&conn, "only", Plan::Free);

    for (event_id, object) in [
        ("evt_200", json!({ "id": "cs_200" })),
        ("evt_201", json!({ "id": "cs_201", "metadata": { "account_id": "not-a-number" } })),
        ("evt_202", json!({ "id": "cs_202", "metadata": { "account_id": "999" } })),
    ] {
        let event = deliver(checkout_event(event_id, object)).unwrap();
        let err = apply_event(&mut conn, &event).unwrap_err();
        assert!(
            matches!(err.downcast_ref::<ChatError>(), Some(ChatError::PaymentVerification(_))),
            "{event_id}: {err}"
        );
    }

    assert_eq!(plan_of(&conn, only.id), Plan::Free);
    let recorded: i64 = conn
        .query_row("SELECT COUNT(*) FROM processed_events", [], |row| row.get(0))
        .unwrap();
    assert_eq!(recorded, 0);
}

#[test]
fn other_event_types_are_ignored() {
    let mut conn = test_db();
    let buyer = create_account(&conn, "buyer", Plan::Free);

    let event = deliver(json!({
        "id": "evt_300",
        "type": "payment_intent.created",
        "data": { "object": { "id": "pi_1", "metadata": { "account_id": buyer.id.to_string() } } }
    }))
    .unwrap();

    assert_eq!(apply_event(&mut conn, &event).unwrap(), EventOutcome::Ignored);
    assert_eq!(plan_of(&conn, buyer.id), Plan::Free);
}

#[test]
fn forged_notification_never_reaches_the_bridge() {
    let payload = checkout_event("evt_400", json!({ "id": "cs_400", "metadata": { "account_id": "1" } }))
        .to_string()
        .into_bytes();
    let now = chrono::Utc::now().timestamp();
    let forged = format!("t={now},v1={}", compute_signature("whsec_attacker", now, &payload).unwrap());

    let err = verify_event(&payload, &forged, SECRET, 300, now).unwrap_err();
    assert!(matches!(err.downcast_ref::<ChatError>(), Some(ChatError::PaymentVerification(_))));
}
