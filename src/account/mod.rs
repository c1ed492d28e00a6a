//! Accounts, subscription plans and bearer sessions.

pub mod session;
pub mod store;

use serde::{Deserialize, Serialize};

/// Subscription plan. Only the billing bridge moves an account to `Pro`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Plan {
    /// Unprivileged tier, subject to the daily message ceiling.
    Free,
    /// Paid tier, unrestricted.
    Pro,
}

impl Plan {
    /// SQL-compatible string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Free => "free",
            Self::Pro => "pro",
        }
    }

    /// Whether the daily ceiling applies.
    pub fn is_metered(&self) -> bool {
        matches!(self, Self::Free)
    }
}

impl std::fmt::Display for Plan {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Plan {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "free" => Ok(Self::Free),
            "pro" => Ok(Self::Pro),
            _ => Err(format!("unknown plan: {s}")),
        }
    }
}

/// An account row, without its credential hash.
#[derive(Debug, Clone, Serialize)]
pub struct Account {
    pub id: i64,
    pub username: String,
    pub email: String,
    pub plan: Plan,
    /// Customer reference at the payment processor, set on first purchase.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub billing_customer_id: Option<String>,
    pub created_at: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plan_round_trips_through_str() {
        for plan in [Plan::Free, Plan::Pro] {
            assert_eq!(plan.as_str().parse::<Plan>().unwrap(), plan);
        }
        assert!("enterprise".parse::<Plan>().is_err());
    }

    #[test]
    fn only_free_is_metered() {
        assert!(Plan::Free.is_metered());
        assert!(!Plan::Pro.is_metered());
    }
}
