use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use spg_common::{Money, PaymentStatus};

/// The subset of an order a provider needs to initialize or charge a payment. No backend state is mutated on
/// initialization; the engine only learns about the payment once the provider confirms it.
#[derive(Debug, Clone)]
pub struct PaymentOrder {
    pub order_id: String,
    pub total: Money,
    pub email: String,
}

/// What the storefront should do next to collect the payment.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum NextAction {
    /// The provider hosts the payment page; redirect the customer there.
    Redirect { url: String },
    /// The provider's in-browser widget collects the card and hands back a one-time token, which the storefront
    /// posts to the charge endpoint.
    ClientToken { public_key: String },
}

#[derive(Debug, Clone, Serialize)]
pub struct InitializeResponse {
    /// The correlation reference presented to the provider. Embeds the order id; see
    /// [`crate::helpers::correlation_reference`].
    pub reference: String,
    #[serde(flatten)]
    pub next: NextAction,
}

/// The normalized result of a transaction lookup or a synchronous charge. A `Pending` or `Failed` status is a valid
/// result, not an error.
#[derive(Debug, Clone, Serialize)]
pub struct VerifyResult {
    pub provider: String,
    pub provider_tx_id: String,
    pub reference: String,
    pub status: PaymentStatus,
    pub amount: Money,
    pub paid_at: Option<DateTime<Utc>>,
}

/// A webhook payload after signature verification, normalized across providers.
#[derive(Debug, Clone)]
pub struct WebhookEvent {
    pub event_type: String,
    /// `None` for event types this gateway does not act on. Such events are acknowledged, not errored, so the
    /// provider does not retry-storm the endpoint.
    pub payment: Option<PaymentEventData>,
}

#[derive(Debug, Clone)]
pub struct PaymentEventData {
    pub provider_tx_id: String,
    /// The correlation reference echoed back by the provider, when it carries one.
    pub reference: Option<String>,
    pub status: PaymentStatus,
    pub amount: Money,
    pub paid_at: Option<DateTime<Utc>>,
}
