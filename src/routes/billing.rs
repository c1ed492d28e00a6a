//! Checkout initiation and the payment-processor webhook.

use axum::body::Bytes;
use axum::extract::State;
use axum::http::HeaderMap;
use axum::Json;
use serde::Serialize;
use serde_json::json;

use super::{ApiError, AuthAccount};
use crate::billing::checkout::CheckoutLink;
use crate::billing::webhook::verify_event;
use crate::billing::{apply_event, EventOutcome};
use crate::db::with_conn;
use crate::error::ChatError;
use crate::server::AppState;

const SIGNATURE_HEADER: &str = "stripe-signature";

#[derive(Debug, Serialize)]
pub struct BillingConfigResponse {
    pub publishable_key: String,
    pub product_name: String,
    pub price: String,
    pub unit_amount_cents: u32,
    pub currency: String,
}

/// `GET /api/billing/config`
pub async fn config(State(state): State<AppState>) -> Json<BillingConfigResponse> {
    let billing = &state.config.billing;
    Json(BillingConfigResponse {
        publishable_key: billing.publishable_key.clone(),
        product_name: billing.product_name.clone(),
        price: billing.display_price(),
        unit_amount_cents: billing.unit_amount_cents,
        currency: billing.currency.clone(),
    })
}

/// `POST /api/billing/checkout`
pub async fn checkout(
    State(state): State<AppState>,
    AuthAccount(account): AuthAccount,
) -> Result<Json<CheckoutLink>, ApiError> {
    let link = state.billing.create_checkout_session(account.id).await?;
    Ok(Json(link))
}

/// `POST /webhook`: verify, then apply at most once.
pub async fn webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<serde_json::Value>, ApiError> {
    let signature = headers
        .get(SIGNATURE_HEADER)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| ChatError::payment("missing signature header"))?;

    let billing = &state.config.billing;
    let event = verify_event(
        &body,
        signature,
        &billing.webhook_secret,
        billing.signature_tolerance_secs,
        chrono::Utc::now().timestamp(),
    )
    .inspect_err(|e| tracing::warn!(error = %e, "rejected billing notification"))?;

    let event_id = event.id.clone();
    let outcome = with_conn(&state.db, move |conn| apply_event(conn, &event)).await?;
    tracing::info!(event_id = %event_id, ?outcome, "billing notification handled");

    let status = match outcome {
        EventOutcome::Upgraded { .. } => "applied",
        EventOutcome::Duplicate => "duplicate",
        EventOutcome::Ignored => "ignored",
    };
    Ok(Json(json!({ "received": true, "status": status })))
}
