use std::fmt::Display;

use provider_clients::{
    data_objects::{InitializeResponse, PaymentEventData, VerifyResult},
    ProviderId,
};
use reconciliation_engine::{db_types::Order, ProviderResult, ReconciliationOutcome};
use serde::{Deserialize, Serialize};
use spg_common::PaymentStatus;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreatePaymentRequest {
    pub order_id: String,
    /// Omitting the provider selects the server's configured default.
    #[serde(default)]
    pub provider: Option<ProviderId>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChargeRequest {
    pub order_id: String,
    /// The one-time card token issued by the provider's in-browser widget.
    pub token: String,
    #[serde(default)]
    pub provider: Option<ProviderId>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct VerifyQuery {
    /// An order id, a composite reference, or a provider-issued reference.
    pub reference: String,
    #[serde(default)]
    pub provider: Option<ProviderId>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SuccessQuery {
    pub reference: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct PaymentInitiated {
    pub provider: String,
    pub order_id: String,
    #[serde(flatten)]
    pub payment: InitializeResponse,
}

/// The body returned by the verify and charge endpoints. A pending or failed payment is reported here with a 200, not
/// an error status; the storefront polls until the status settles.
#[derive(Debug, Clone, Serialize)]
pub struct VerifyResponse {
    pub payment_status: PaymentStatus,
    pub reconciled: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub order: Option<Order>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub partial_failures: Vec<reconciliation_engine::StockUpdateError>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl VerifyResponse {
    pub fn from_outcome(outcome: ReconciliationOutcome) -> Self {
        Self {
            payment_status: outcome.payment_status,
            reconciled: outcome.reconciled,
            order: Some(outcome.order),
            partial_failures: outcome.partial_failures,
            message: None,
        }
    }

    pub fn pending<S: Display>(order: Option<Order>, message: S) -> Self {
        Self {
            payment_status: PaymentStatus::Pending,
            reconciled: false,
            order,
            partial_failures: Vec::new(),
            message: Some(message.to_string()),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonResponse {
    pub success: bool,
    pub message: String,
}

impl JsonResponse {
    pub fn success<S: Display>(message: S) -> Self {
        Self { success: true, message: message.to_string() }
    }

    pub fn failure<S: Display>(message: S) -> Self {
        Self { success: false, message: message.to_string() }
    }
}

/// Normalizes a transaction-lookup result into the engine's provider result.
pub fn provider_result_from_verify(result: &VerifyResult) -> ProviderResult {
    ProviderResult {
        provider: result.provider.clone(),
        provider_tx_id: result.provider_tx_id.clone(),
        status: result.status,
        amount: result.amount,
        paid_at: result.paid_at,
    }
}

/// Normalizes an authenticated webhook event into the engine's provider result.
pub fn provider_result_from_event(provider: ProviderId, event: &PaymentEventData) -> ProviderResult {
    ProviderResult {
        provider: provider.to_string(),
        provider_tx_id: event.provider_tx_id.clone(),
        status: event.status,
        amount: event.amount,
        paid_at: event.paid_at,
    }
}

/// The lookup key used to resolve a webhook event to an order: the echoed correlation reference when the provider
/// carries one, otherwise the provider's own transaction id (which may match a stored payment reference).
pub fn webhook_lookup_key(event: &PaymentEventData) -> String {
    match &event.reference {
        Some(reference) if !reference.is_empty() => reference.clone(),
        _ => event.provider_tx_id.clone(),
    }
}
