//! Payment-processor notification verification and parsing.
//!
//! The `Stripe-Signature` header looks like `t=1700000000,v1=<hex>,v1=<hex>`.
//! Each `v1` value is HMAC-SHA256 over `"{t}.{raw body}"` keyed with the
//! endpoint's webhook secret; any one match within the tolerance window
//! verifies the payload.

use std::collections::HashMap;

use anyhow::Result;
use hmac::{Hmac, Mac};
use serde::Deserialize;
use sha2::Sha256;

use crate::error::ChatError;

type HmacSha256 = Hmac<Sha256>;

/// The event type that upgrades an account.
pub const CHECKOUT_COMPLETED: &str = "checkout.session.completed";

/// A verified notification envelope.
#[derive(Debug, Clone, Deserialize)]
pub struct WebhookEvent {
    pub id: String,
    #[serde(rename = "type")]
    pub event_type: String,
    pub data: EventData,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EventData {
    pub object: serde_json::Value,
}

/// The parts of a checkout session the billing bridge reads.
#[derive(Debug, Clone, Deserialize)]
pub struct CheckoutSession {
    pub id: String,
    #[serde(default)]
    pub client_reference_id: Option<String>,
    #[serde(default)]
    pub customer: Option<String>,
    #[serde(default)]
    pub metadata: Option<HashMap<String, String>>,
}

impl WebhookEvent {
    /// Interpret the payload object as a checkout session.
    pub fn checkout_session(&self) -> Result<CheckoutSession> {
        serde_json::from_value(self.data.object.clone()).map_err(|e| {
            ChatError::payment(format!("malformed checkout session in event {}: {e}", self.id)).into()
        })
    }
}

#[derive(Debug, PartialEq, Eq)]
struct SignatureHeader {
    timestamp: i64,
    signatures: Vec<Vec<u8>>,
}

fn parse_signature_header(header: &str) -> Result<SignatureHeader, ChatError> {
    let mut timestamp = None;
    let mut signatures = Vec::new();

    for part in header.split(',') {
        let Some((key, value)) = part.trim().split_once('=') else {
            continue;
        };
        match key {
            "t" => {
                timestamp = Some(
                    value
                        .parse::<i64>()
                        .map_err(|_| ChatError::payment("invalid signature timestamp"))?,
                );
            }
            // unknown schemes (e.g. v0) and undecodable values are skipped
            "v1" => {
                if let Ok(bytes) = hex::decode(value) {
                    signatures.push(bytes);
                }
            }
            _ => {}
        }
    }

    let timestamp = timestamp.ok_or_else(|| ChatError::payment("signature header has no timestamp"))?;
    if signatures.is_empty() {
        return Err(ChatError::payment("signature header has no v1 signature"));
    }
    Ok(SignatureHeader {
        timestamp,
        signatures,
    })
}

/// Hex HMAC-SHA256 of `"{timestamp}.{payload}"`, as the processor signs it.
pub fn compute_signature(secret: &str, timestamp: i64, payload: &[u8]) -> Result<String> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|e| anyhow::anyhow!("invalid webhook secret: {e}"))?;
    mac.update(timestamp.to_string().as_bytes());
    mac.update(b".");
    mac.update(payload);
    Ok(hex::encode(mac.finalize().into_bytes()))
}

/// Check the signature header against the raw payload at time `now` (unix
/// seconds), then parse the event.
pub fn verify_event(
    payload: &[u8],
    header: &str,
    secret: &str,
    tolerance_secs: i64,
    now: i64,
) -> Result<WebhookEvent> {
    if secret.is_empty() {
        return Err(ChatError::payment("no webhook secret configured").into());
    }

    let parsed = parse_signature_header(header)?;
    if now.abs_diff(parsed.timestamp) > tolerance_secs.unsigned_abs() {
        return Err(ChatError::payment("signature timestamp outside tolerance").into());
    }

    let matched = parsed.signatures.iter().any(|candidate| {
        let Ok(mut mac) = HmacSha256::new_from_slice(secret.as_bytes()) else {
            return false;
        };
        mac.update(parsed.timestamp.to_string().as_bytes());
        mac.update(b".");
        mac.update(payload);
        mac.verify_slice(candidate).is_ok()
    });
    if !matched {
        return Err(ChatError::payment("signature mismatch").into());
    }

    serde_json::from_slice(payload)
        .map_err(|e| ChatError::payment(format!("invalid payload: {e}")).into())
}
