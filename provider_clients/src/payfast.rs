//! PayFast integration: the redirect URL is assembled locally (no initialization call), amounts cross the wire as
//! major-unit decimal strings, and ITN (webhook) deliveries are signed with HMAC-SHA256 hex over the raw body.

use std::{str::FromStr, sync::Arc, time::Duration};

use log::*;
use reqwest::{Client, Method, Url};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use spg_common::{Money, PaymentStatus};

use crate::{
    config::PayfastConfig,
    data_objects::{InitializeResponse, NextAction, PaymentEventData, PaymentOrder, VerifyResult, WebhookEvent},
    helpers::{constant_time_eq, correlation_reference, hmac_sha256, to_hex, validate_payment_order},
    provider::PaymentProvider,
    ProviderError,
};

pub const PAYFAST_SIGNATURE_HEADER: &str = "x-payfast-signature";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Clone)]
pub struct Payfast {
    config: PayfastConfig,
    client: Arc<Client>,
}

#[derive(Deserialize)]
struct TransactionNotice {
    pf_payment_id: String,
    #[serde(default)]
    m_payment_id: Option<String>,
    payment_status: String,
    /// Major-unit decimal string, e.g. "800.00".
    amount_gross: String,
}

fn map_status(status: &str) -> PaymentStatus {
    match status {
        "COMPLETE" => PaymentStatus::Success,
        "FAILED" | "CANCELLED" => PaymentStatus::Failed,
        // "PENDING" and any future vocabulary are still in flight.
        _ => PaymentStatus::Pending,
    }
}

fn parse_amount(amount: &str) -> Result<Money, ProviderError> {
    Money::from_str(amount)
        .map_err(|e| ProviderError::Json(format!("Unparseable PayFast amount '{amount}': {e}")))
}

impl Payfast {
    pub fn new(config: PayfastConfig) -> Result<Self, ProviderError> {
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| ProviderError::Initialization(e.to_string()))?;
        Ok(Self { config, client: Arc::new(client) })
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{path}", self.config.base_url)
    }

    async fn rest_query<T: DeserializeOwned, B: Serialize>(
        &self,
        method: Method,
        path: &str,
        body: Option<B>,
    ) -> Result<T, ProviderError> {
        let url = self.url(path);
        trace!("Sending PayFast query: {url}");
        let mut req = self.client.request(method, url);
        if let Some(body) = body {
            req = req.json(&body);
        }
        let response = req.send().await.map_err(|e| {
            if e.is_timeout() {
                ProviderError::Verification("PayFast request timed out".to_string())
            } else {
                ProviderError::Verification(e.to_string())
            }
        })?;
        if response.status().is_success() {
            trace!("PayFast query successful. {}", response.status());
            response.json::<T>().await.map_err(|e| ProviderError::Json(e.to_string()))
        } else {
            let status = response.status().as_u16();
            let message = response.text().await.map_err(|e| ProviderError::Verification(e.to_string()))?;
            Err(ProviderError::QueryError { status, message })
        }
    }

    fn notice_to_payment(notice: TransactionNotice) -> Result<PaymentEventData, ProviderError> {
        let amount = parse_amount(&notice.amount_gross)?;
        Ok(PaymentEventData {
            provider_tx_id: notice.pf_payment_id,
            reference: notice.m_payment_id,
            status: map_status(&notice.payment_status),
            amount,
            paid_at: None,
        })
    }
}

impl PaymentProvider for Payfast {
    fn name(&self) -> &'static str {
        "payfast"
    }

    /// PayFast has no initialization endpoint. The redirect URL is built locally from the merchant credentials and
    /// the order, with the amount formatted as a major-unit decimal string.
    async fn initialize(&self, order: &PaymentOrder) -> Result<InitializeResponse, ProviderError> {
        validate_payment_order(order)?;
        let reference = correlation_reference(&order.order_id);
        let mut url = Url::parse(&self.url("/eng/process"))
            .map_err(|e| ProviderError::InvalidInput(format!("Invalid PayFast base URL: {e}")))?;
        url.query_pairs_mut()
            .append_pair("merchant_id", &self.config.merchant_id)
            .append_pair("merchant_key", &self.config.merchant_key)
            .append_pair("return_url", &self.config.return_url)
            .append_pair("cancel_url", &self.config.cancel_url)
            .append_pair("notify_url", &self.config.notify_url)
            .append_pair("m_payment_id", &reference)
            .append_pair("amount", &order.total.to_string())
            .append_pair("item_name", &format!("Order {}", order.order_id))
            .append_pair("email_address", &order.email);
        debug!("💳️ Built PayFast redirect for order {} ({})", order.order_id, order.total);
        Ok(InitializeResponse { reference, next: NextAction::Redirect { url: url.to_string() } })
    }

    async fn verify(&self, reference: &str) -> Result<VerifyResult, ProviderError> {
        let body = serde_json::json!({
            "merchant_id": self.config.merchant_id,
            "m_payment_id": reference,
        });
        let notice: TransactionNotice =
            self.rest_query(Method::POST, "/eng/query/fetch", Some(body)).await.map_err(|e| match e {
                ProviderError::QueryError { status, message } => {
                    ProviderError::Verification(format!("PayFast lookup failed ({status}): {message}"))
                },
                e => e,
            })?;
        debug!("💳️ PayFast reports '{}' for reference {reference}", notice.payment_status);
        let status = map_status(&notice.payment_status);
        let amount = parse_amount(&notice.amount_gross)?;
        Ok(VerifyResult {
            provider: self.name().to_string(),
            provider_tx_id: notice.pf_payment_id,
            reference: notice.m_payment_id.unwrap_or_else(|| reference.to_string()),
            status,
            amount,
            paid_at: None,
        })
    }

    fn parse_webhook(&self, raw_body: &[u8], signature: &str) -> Result<WebhookEvent, ProviderError> {
        // Authenticate before parsing anything.
        let expected = to_hex(&hmac_sha256(self.config.passphrase.reveal(), raw_body));
        if !constant_time_eq(expected.as_bytes(), signature.trim().as_bytes()) {
            return Err(ProviderError::InvalidSignature);
        }
        let notice: TransactionNotice =
            serde_json::from_slice(raw_body).map_err(|e| ProviderError::Json(e.to_string()))?;
        let event_type = format!("itn.{}", notice.payment_status.to_ascii_lowercase());
        let payment = Some(Self::notice_to_payment(notice)?);
        Ok(WebhookEvent { event_type, payment })
    }
}

#[cfg(test)]
mod test {
    use spg_common::Secret;

    use super::*;
    use crate::config::PAYFAST_SANDBOX_URL;

    fn test_client() -> Payfast {
        let config = PayfastConfig::new(
            "10000100",
            "46f0cd694581a",
            Secret::from("test-passphrase"),
            "https://shop.test/return",
            "https://shop.test/cancel",
            "https://shop.test/payments/webhook/payfast",
        )
        .with_base_url(PAYFAST_SANDBOX_URL);
        Payfast::new(config).unwrap()
    }

    fn signed(client: &Payfast, body: &[u8]) -> String {
        to_hex(&hmac_sha256(client.config.passphrase.reveal(), body))
    }

    const ITN_BODY: &str = r#"{
        "pf_payment_id": "1089250",
        "m_payment_id": "order_9f1c2e34-55a6-47b8-9c0d-1e2f3a4b5c6d_1700000000000",
        "payment_status": "COMPLETE",
        "amount_gross": "800.00"
    }"#;

    #[tokio::test]
    async fn the_redirect_url_is_built_locally_with_major_unit_amounts() {
        let client = test_client();
        let order = PaymentOrder {
            order_id: "9f1c2e34-55a6-47b8-9c0d-1e2f3a4b5c6d".to_string(),
            total: Money::from_cents(80000),
            email: "alice@example.com".to_string(),
        };
        let response = client.initialize(&order).await.unwrap();
        let NextAction::Redirect { url } = response.next else { panic!("expected a redirect") };
        assert!(url.starts_with("https://sandbox.payfast.co.za/eng/process?"));
        assert!(url.contains("merchant_id=10000100"));
        assert!(url.contains("amount=800.00"));
        assert!(url.contains("email_address=alice%40example.com"));
        assert!(url.contains(&format!("m_payment_id={}", response.reference)));
    }

    #[tokio::test]
    async fn zero_totals_are_rejected_before_building_a_url() {
        let client = test_client();
        let order = PaymentOrder {
            order_id: "9f1c2e34-55a6-47b8-9c0d-1e2f3a4b5c6d".to_string(),
            total: Money::from_cents(0),
            email: "alice@example.com".to_string(),
        };
        let err = client.initialize(&order).await.unwrap_err();
        assert!(matches!(err, ProviderError::InvalidInput(_)));
    }

    #[test]
    fn a_complete_itn_parses_with_the_amount_in_cents() {
        let client = test_client();
        let sig = signed(&client, ITN_BODY.as_bytes());
        let event = client.parse_webhook(ITN_BODY.as_bytes(), &sig).unwrap();
        assert_eq!(event.event_type, "itn.complete");
        let payment = event.payment.unwrap();
        assert_eq!(payment.status, PaymentStatus::Success);
        assert_eq!(payment.provider_tx_id, "1089250");
        assert_eq!(payment.amount, Money::from_cents(80000));
        assert!(payment.reference.unwrap().starts_with("order_9f1c2e34"));
    }

    #[test]
    fn an_unsigned_itn_is_rejected() {
        let client = test_client();
        let err = client.parse_webhook(ITN_BODY.as_bytes(), "deadbeef").unwrap_err();
        assert!(matches!(err, ProviderError::InvalidSignature));
    }

    #[test]
    fn provider_status_vocabulary_maps_to_the_three_way_status() {
        assert_eq!(map_status("COMPLETE"), PaymentStatus::Success);
        assert_eq!(map_status("FAILED"), PaymentStatus::Failed);
        assert_eq!(map_status("CANCELLED"), PaymentStatus::Failed);
        assert_eq!(map_status("PENDING"), PaymentStatus::Pending);
    }
}
