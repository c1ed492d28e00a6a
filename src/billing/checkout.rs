//! Checkout initiation against the Stripe REST API.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::config::BillingConfig;
use crate::error::ChatError;

/// A hosted checkout page the client should be redirected to.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckoutLink {
    pub id: String,
    #[serde(default)]
    pub url: Option<String>,
}

pub struct StripeClient {
    client: reqwest::Client,
    config: BillingConfig,
}

impl StripeClient {
    pub fn new(config: &BillingConfig) -> Result<Self> {
        if config.secret_key.is_empty() {
            tracing::warn!("no payment secret key configured (set STRIPE_SECRET_KEY); checkout will fail");
        }
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .build()
            .context("failed to create HTTP client")?;
        Ok(Self {
            client,
            config: config.clone(),
        })
    }

    /// Open a one-off payment session for the Pro plan, tagged with the buyer's
    /// account id so the completion notification can be mapped back.
    pub async fn create_checkout_session(&self, account_id: i64) -> Result<CheckoutLink> {
        let form = checkout_form(&self.config, account_id);

        let response = self
            .client
            .post(format!(
                "{}/checkout/sessions",
                self.config.api_base.trim_end_matches('/')
            ))
            .bearer_auth(&self.config.secret_key)
            .form(&form)
            .send()
            .await
            .map_err(|e| ChatError::upstream(format!("checkout request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ChatError::upstream(format!(
                "checkout request returned {status}: {}",
                error_message(&body)
            ))
            .into());
        }

        let link: CheckoutLink = response
            .json()
            .await
            .map_err(|e| ChatError::upstream(format!("malformed checkout response: {e}")))?;
        tracing::info!(account_id, session_id = %link.id, "checkout session created");
        Ok(link)
    }
}

/// Form fields in the processor's bracketed-key encoding.
pub(crate) fn checkout_form(config: &BillingConfig, account_id: i64) -> Vec<(String, String)> {
    let account = account_id.to_string();
    [
        ("mode", "payment".to_string()),
        ("payment_method_types[0]", "card".to_string()),
        ("line_items[0][quantity]", "1".to_string()),
        ("line_items[0][price_data][currency]", config.currency.clone()),
        (
            "line_items[0][price_data][unit_amount]",
            config.unit_amount_cents.to_string(),
        ),
        (
            "line_items[0][price_data][product_data][name]",
            config.product_name.clone(),
        ),
        ("success_url", config.success_url.clone()),
        ("cancel_url", config.cancel_url.clone()),
        ("client_reference_id", account.clone()),
        ("metadata[account_id]", account),
    ]
    .into_iter()
    .map(|(k, v)| (k.to_string(), v))
    .collect()
}

fn error_message(body: &str) -> String {
    #[derive(Deserialize)]
    struct Envelope {
        error: Detail,
    }
    #[derive(Deserialize)]
    struct Detail {
        message: String,
    }
    serde_json::from_str::<Envelope>(body)
        .map(|e| e.error.message)
        .unwrap_or_else(|_| body.chars().take(200).collect())
}
