//! Yoco integration: in-browser tokenization followed by a synchronous server-side charge, webhook deliveries signed
//! with base64 HMAC-SHA256 over the raw body.

use std::{sync::Arc, time::Duration};

use chrono::{DateTime, Utc};
use log::*;
use reqwest::{
    header::{HeaderMap, HeaderValue},
    Client,
    Method,
};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::Value;
use spg_common::{Money, PaymentStatus, CURRENCY_CODE};

use crate::{
    config::YocoConfig,
    data_objects::{InitializeResponse, NextAction, PaymentEventData, PaymentOrder, VerifyResult, WebhookEvent},
    helpers::{constant_time_eq, correlation_reference, hmac_sha256, validate_payment_order},
    provider::PaymentProvider,
    ProviderError,
};

pub const YOCO_SIGNATURE_HEADER: &str = "webhook-signature";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Clone)]
pub struct Yoco {
    config: YocoConfig,
    client: Arc<Client>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ChargeData {
    id: String,
    status: String,
    amount_in_cents: i64,
    #[serde(default)]
    created_date: Option<DateTime<Utc>>,
    #[serde(default)]
    metadata: Option<ChargeMetadata>,
}

#[derive(Deserialize)]
struct ChargeMetadata {
    #[serde(default)]
    reference: Option<String>,
}

fn map_status(status: &str) -> PaymentStatus {
    match status {
        "successful" => PaymentStatus::Success,
        "failed" | "refunded" => PaymentStatus::Failed,
        // "created" and "processing" are still in flight.
        _ => PaymentStatus::Pending,
    }
}

impl Yoco {
    pub fn new(config: YocoConfig) -> Result<Self, ProviderError> {
        let mut headers = HeaderMap::with_capacity(2);
        let auth = format!("Bearer {}", config.secret_key.reveal());
        let val =
            HeaderValue::from_str(&auth).map_err(|e| ProviderError::Initialization(e.to_string()))?;
        headers.insert("Authorization", val);
        headers.insert("Content-Type", HeaderValue::from_static("application/json"));
        let client = Client::builder()
            .default_headers(headers)
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
        trace!("Sending Yoco query: {url}");
        let mut req = self.client.request(method, url);
        if let Some(body) = body {
            req = req.json(&body);
        }
        let response = req.send().await.map_err(|e| {
            if e.is_timeout() {
                ProviderError::Verification("Yoco request timed out".to_string())
            } else {
                ProviderError::Verification(e.to_string())
            }
        })?;
        if response.status().is_success() {
            trace!("Yoco query successful. {}", response.status());
            response.json::<T>().await.map_err(|e| ProviderError::Json(e.to_string()))
        } else {
            let status = response.status().as_u16();
            let message = response.text().await.map_err(|e| ProviderError::Verification(e.to_string()))?;
            Err(ProviderError::QueryError { status, message })
        }
    }

    fn verify_result(&self, data: ChargeData, reference: String) -> VerifyResult {
        VerifyResult {
            provider: self.name().to_string(),
            provider_tx_id: data.id,
            reference,
            status: map_status(&data.status),
            amount: Money::from_cents(data.amount_in_cents),
            paid_at: data.created_date,
        }
    }
}

impl PaymentProvider for Yoco {
    fn name(&self) -> &'static str {
        "yoco"
    }

    /// Yoco collects the card in the browser, so initialization is purely local: hand the storefront the public key
    /// for the tokenization widget and a correlation reference for the follow-up charge.
    async fn initialize(&self, order: &PaymentOrder) -> Result<InitializeResponse, ProviderError> {
        validate_payment_order(order)?;
        let reference = correlation_reference(&order.order_id);
        debug!("💳️ Prepared Yoco tokenization for order {} ({})", order.order_id, order.total);
        Ok(InitializeResponse {
            reference,
            next: NextAction::ClientToken { public_key: self.config.public_key.clone() },
        })
    }

    async fn verify(&self, reference: &str) -> Result<VerifyResult, ProviderError> {
        let path = format!("/charges/{reference}");
        let data: ChargeData =
            self.rest_query::<_, ()>(Method::GET, &path, None).await.map_err(|e| match e {
                ProviderError::QueryError { status, message } => {
                    ProviderError::Verification(format!("Yoco lookup failed ({status}): {message}"))
                },
                e => e,
            })?;
        debug!("💳️ Yoco reports '{}' for charge {reference}", data.status);
        let stored = data.metadata.as_ref().and_then(|m| m.reference.clone()).unwrap_or_else(|| reference.to_string());
        Ok(self.verify_result(data, stored))
    }

    async fn charge(&self, token: &str, order: &PaymentOrder) -> Result<VerifyResult, ProviderError> {
        validate_payment_order(order)?;
        let reference = correlation_reference(&order.order_id);
        let body = serde_json::json!({
            "token": token,
            "amountInCents": order.total.value(),
            "currency": CURRENCY_CODE,
            "metadata": { "reference": reference },
        });
        debug!("💳️ Charging Yoco token for order {} ({})", order.order_id, order.total);
        let data: ChargeData = self.rest_query(Method::POST, "/charges", Some(body)).await?;
        info!("💳️ Yoco charge {} for order {} came back '{}'", data.id, order.order_id, data.status);
        Ok(self.verify_result(data, reference))
    }

    fn parse_webhook(&self, raw_body: &[u8], signature: &str) -> Result<WebhookEvent, ProviderError> {
        // Authenticate before parsing anything.
        let expected = base64::encode(hmac_sha256(self.config.webhook_secret.reveal(), raw_body));
        if !constant_time_eq(expected.as_bytes(), signature.trim().as_bytes()) {
            return Err(ProviderError::InvalidSignature);
        }
        #[derive(Deserialize)]
        struct Event {
            #[serde(rename = "type")]
            event_type: String,
            payload: Value,
        }
        let event: Event = serde_json::from_slice(raw_body).map_err(|e| ProviderError::Json(e.to_string()))?;
        let payment = match event.event_type.as_str() {
            "payment.succeeded" | "payment.failed" => {
                let data: ChargeData =
                    serde_json::from_value(event.payload).map_err(|e| ProviderError::Json(e.to_string()))?;
                Some(PaymentEventData {
                    provider_tx_id: data.id.clone(),
                    reference: data.metadata.as_ref().and_then(|m| m.reference.clone()),
                    status: map_status(&data.status),
                    amount: Money::from_cents(data.amount_in_cents),
                    paid_at: data.created_date,
                })
            },
            other => {
                debug!("💳️ Ignoring unhandled Yoco event type '{other}'");
                None
            },
        };
        Ok(WebhookEvent { event_type: event.event_type, payment })
    }
}

#[cfg(test)]
mod test {
    use spg_common::Secret;

    use super::*;

    fn test_client() -> Yoco {
        let config = YocoConfig::new("pk_test_yoco", Secret::from("sk_test_yoco"), Secret::from("whsec_yoco"));
        Yoco::new(config).unwrap()
    }

    fn signed(client: &Yoco, body: &[u8]) -> String {
        base64::encode(hmac_sha256(client.config.webhook_secret.reveal(), body))
    }

    const SUCCESS_BODY: &str = r#"{
        "type": "payment.succeeded",
        "payload": {
            "id": "ch_9XrgLKAQW2mPd",
            "status": "successful",
            "amountInCents": 80000,
            "createdDate": "2024-06-01T10:00:00Z",
            "metadata": { "reference": "order_9f1c2e34-55a6-47b8-9c0d-1e2f3a4b5c6d_1700000000000" }
        }
    }"#;

    #[tokio::test]
    async fn initialization_is_local_and_returns_the_public_key() {
        let client = test_client();
        let order = PaymentOrder {
            order_id: "9f1c2e34-55a6-47b8-9c0d-1e2f3a4b5c6d".to_string(),
            total: Money::from_cents(80000),
            email: "alice@example.com".to_string(),
        };
        let response = client.initialize(&order).await.unwrap();
        assert!(response.reference.starts_with("order_9f1c2e34"));
        assert!(matches!(response.next, NextAction::ClientToken { public_key } if public_key == "pk_test_yoco"));
    }

    #[test]
    fn valid_signatures_parse_to_a_success_event() {
        let client = test_client();
        let sig = signed(&client, SUCCESS_BODY.as_bytes());
        let event = client.parse_webhook(SUCCESS_BODY.as_bytes(), &sig).unwrap();
        assert_eq!(event.event_type, "payment.succeeded");
        let payment = event.payment.unwrap();
        assert_eq!(payment.status, PaymentStatus::Success);
        assert_eq!(payment.provider_tx_id, "ch_9XrgLKAQW2mPd");
        assert!(payment.reference.unwrap().starts_with("order_9f1c2e34"));
    }

    #[test]
    fn signatures_from_a_different_secret_are_rejected() {
        let client = test_client();
        let sig = base64::encode(hmac_sha256("some-other-secret", SUCCESS_BODY.as_bytes()));
        let err = client.parse_webhook(SUCCESS_BODY.as_bytes(), &sig).unwrap_err();
        assert!(matches!(err, ProviderError::InvalidSignature));
    }

    #[test]
    fn unrecognized_events_are_acknowledged_without_payment_data() {
        let client = test_client();
        let body = br#"{"type": "refund.succeeded", "payload": {"refundId": "rf_1"}}"#;
        let sig = signed(&client, body);
        let event = client.parse_webhook(body, &sig).unwrap();
        assert_eq!(event.event_type, "refund.succeeded");
        assert!(event.payment.is_none());
    }

    #[test]
    fn provider_status_vocabulary_maps_to_the_three_way_status() {
        assert_eq!(map_status("successful"), PaymentStatus::Success);
        assert_eq!(map_status("failed"), PaymentStatus::Failed);
        assert_eq!(map_status("created"), PaymentStatus::Pending);
        assert_eq!(map_status("processing"), PaymentStatus::Pending);
    }
}
