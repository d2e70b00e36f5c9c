use std::{fmt::Display, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::{
    data_objects::{InitializeResponse, PaymentOrder, VerifyResult, WebhookEvent},
    Payfast,
    Paystack,
    ProviderError,
    Yoco,
};

/// The three operations every payment provider integration exposes, hiding that provider's HTTP contract details.
#[allow(async_fn_in_trait)]
pub trait PaymentProvider {
    fn name(&self) -> &'static str;

    /// Validates the order and prepares a payment with the provider. Returns the correlation reference and either a
    /// redirect URL or a client-side token config. Mutates no backend state.
    async fn initialize(&self, order: &PaymentOrder) -> Result<InitializeResponse, ProviderError>;

    /// Looks the transaction up with the provider. The reference must be the provider's own issued reference; see
    /// `ReconciliationApi::resolve_provider_reference` for resolving bare order ids first.
    async fn verify(&self, reference: &str) -> Result<VerifyResult, ProviderError>;

    /// Synchronous charge-and-confirm for providers offering client-side tokenization.
    async fn charge(&self, _token: &str, _order: &PaymentOrder) -> Result<VerifyResult, ProviderError> {
        Err(ProviderError::Unsupported(format!("{} does not support client-side tokenization", self.name())))
    }

    /// Authenticates and parses a webhook delivery. The signature is recomputed over the raw, unparsed body and
    /// compared in constant time *before* any JSON parsing, so unauthenticated input is never processed.
    fn parse_webhook(&self, raw_body: &[u8], signature: &str) -> Result<WebhookEvent, ProviderError>;
}

//--------------------------------------      ProviderId       -------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderId {
    Paystack,
    Yoco,
    Payfast,
}

impl Display for ProviderId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProviderId::Paystack => write!(f, "paystack"),
            ProviderId::Yoco => write!(f, "yoco"),
            ProviderId::Payfast => write!(f, "payfast"),
        }
    }
}

impl FromStr for ProviderId {
    type Err = ProviderError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "paystack" => Ok(Self::Paystack),
            "yoco" => Ok(Self::Yoco),
            "payfast" => Ok(Self::Payfast),
            s => Err(ProviderError::InvalidInput(format!("Unknown payment provider: {s}"))),
        }
    }
}

//--------------------------------------      AnyProvider      -------------------------------------------------------
/// Static dispatch over the configured provider clients. Async trait methods are not object-safe, so the handler
/// layer works with this enum rather than `dyn PaymentProvider`.
#[derive(Clone)]
pub enum AnyProvider {
    Paystack(Paystack),
    Yoco(Yoco),
    Payfast(Payfast),
}

impl PaymentProvider for AnyProvider {
    fn name(&self) -> &'static str {
        match self {
            AnyProvider::Paystack(p) => p.name(),
            AnyProvider::Yoco(p) => p.name(),
            AnyProvider::Payfast(p) => p.name(),
        }
    }

    async fn initialize(&self, order: &PaymentOrder) -> Result<InitializeResponse, ProviderError> {
        match self {
            AnyProvider::Paystack(p) => p.initialize(order).await,
            AnyProvider::Yoco(p) => p.initialize(order).await,
            AnyProvider::Payfast(p) => p.initialize(order).await,
        }
    }

    async fn verify(&self, reference: &str) -> Result<VerifyResult, ProviderError> {
        match self {
            AnyProvider::Paystack(p) => p.verify(reference).await,
            AnyProvider::Yoco(p) => p.verify(reference).await,
            AnyProvider::Payfast(p) => p.verify(reference).await,
        }
    }

    async fn charge(&self, token: &str, order: &PaymentOrder) -> Result<VerifyResult, ProviderError> {
        match self {
            AnyProvider::Paystack(p) => p.charge(token, order).await,
            AnyProvider::Yoco(p) => p.charge(token, order).await,
            AnyProvider::Payfast(p) => p.charge(token, order).await,
        }
    }

    fn parse_webhook(&self, raw_body: &[u8], signature: &str) -> Result<WebhookEvent, ProviderError> {
        match self {
            AnyProvider::Paystack(p) => p.parse_webhook(raw_body, signature),
            AnyProvider::Yoco(p) => p.parse_webhook(raw_body, signature),
            AnyProvider::Payfast(p) => p.parse_webhook(raw_body, signature),
        }
    }
}
