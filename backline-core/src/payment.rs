use crate::snapshot::OrderSnapshot;
use crate::BoxError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Provider-side payment state, normalized across gateways.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum PaymentState {
    Open,
    Pending,
    Paid,
    Failed,
    Canceled,
    Expired,
}

impl PaymentState {
    /// Parse a provider status string. Unknown strings land on `Open`
    /// so a new provider value never breaks webhook intake.
    pub fn parse(raw: &str) -> Self {
        match raw.to_ascii_lowercase().as_str() {
            "paid" | "succeeded" => Self::Paid,
            "failed" => Self::Failed,
            "canceled" | "cancelled" => Self::Canceled,
            "expired" => Self::Expired,
            "pending" | "authorized" | "processing" => Self::Pending,
            _ => Self::Open,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Open => "open",
            Self::Pending => "pending",
            Self::Paid => "paid",
            Self::Failed => "failed",
            Self::Canceled => "canceled",
            Self::Expired => "expired",
        }
    }

    /// Terminal states never move again; the reconciler treats anything
    /// non-terminal as "keep waiting".
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Paid | Self::Failed | Self::Canceled | Self::Expired)
    }
}

impl std::fmt::Display for PaymentState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of initiating a payment with the provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentInit {
    pub provider_payment_id: String,
    pub redirect_url: String,
}

/// Boundary to the external payment provider. Checkout initiates a
/// payment inside the order-creation transaction; the reconciler
/// re-fetches authoritative state on webhooks and polling fallback.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Create a provider payment for the order and return the id plus
    /// the URL the customer is redirected to.
    async fn initiate(&self, order: &OrderSnapshot) -> Result<PaymentInit, BoxError>;

    /// Fetch the provider's current state for a payment.
    async fn fetch_state(&self, provider_payment_id: &str) -> Result<PaymentState, BoxError>;
}

/// In-process gateway for development and tests. Encodes the order id
/// in the payment id so `fetch_state` needs no storage.
pub struct MockGateway;

#[async_trait]
impl PaymentGateway for MockGateway {
    async fn initiate(&self, order: &OrderSnapshot) -> Result<PaymentInit, BoxError> {
        // A name prefixed "fail-gateway" simulates a provider outage,
        // exercising the checkout rollback path.
        if order.customer_name.starts_with("fail-gateway") {
            return Err("simulated payment provider outage".into());
        }
        let id = format!("mock_pay_{}", order.order_id.simple());
        Ok(PaymentInit {
            redirect_url: format!("https://pay.example.test/checkout/{id}"),
            provider_payment_id: id,
        })
    }

    async fn fetch_state(&self, provider_payment_id: &str) -> Result<PaymentState, BoxError> {
        let raw = provider_payment_id
            .strip_prefix("mock_pay_")
            .unwrap_or_default();
        match Uuid::parse_str(raw) {
            Ok(_) => Ok(PaymentState::Paid),
            Err(_) => Ok(PaymentState::Open),
        }
    }
}
