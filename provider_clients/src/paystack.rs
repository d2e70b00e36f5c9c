//! Paystack integration: hosted payment page (redirect flow), integer minor-unit amounts, webhook deliveries signed
//! with HMAC-SHA512 over the raw body.

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
    config::PaystackConfig,
    data_objects::{InitializeResponse, NextAction, PaymentEventData, PaymentOrder, VerifyResult, WebhookEvent},
    helpers::{constant_time_eq, correlation_reference, hmac_sha512, to_hex, validate_payment_order},
    provider::PaymentProvider,
    ProviderError,
};

pub const PAYSTACK_SIGNATURE_HEADER: &str = "x-paystack-signature";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Clone)]
pub struct Paystack {
    config: PaystackConfig,
    client: Arc<Client>,
}

#[derive(Deserialize)]
struct Envelope<T> {
    status: bool,
    message: Option<String>,
    data: T,
}

#[derive(Deserialize)]
struct InitializeData {
    authorization_url: String,
    reference: String,
}

#[derive(Deserialize)]
struct TransactionData {
    id: u64,
    status: String,
    reference: String,
    amount: i64,
    paid_at: Option<DateTime<Utc>>,
}

fn map_status(status: &str) -> PaymentStatus {
    match status {
        "success" => PaymentStatus::Success,
        "failed" | "reversed" => PaymentStatus::Failed,
        // "abandoned", "ongoing", "pending", "processing", "queued" and anything new are all still in flight.
        _ => PaymentStatus::Pending,
    }
}

impl Paystack {
    pub fn new(config: PaystackConfig) -> Result<Self, ProviderError> {
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
        trace!("Sending Paystack query: {url}");
        let mut req = self.client.request(method, url);
        if let Some(body) = body {
            req = req.json(&body);
        }
        let response = req.send().await.map_err(|e| {
            if e.is_timeout() {
                ProviderError::Verification("Paystack request timed out".to_string())
            } else {
                ProviderError::Verification(e.to_string())
            }
        })?;
        if response.status().is_success() {
            trace!("Paystack query successful. {}", response.status());
            response.json::<T>().await.map_err(|e| ProviderError::Json(e.to_string()))
        } else {
            let status = response.status().as_u16();
            let message = response.text().await.map_err(|e| ProviderError::Verification(e.to_string()))?;
            Err(ProviderError::QueryError { status, message })
        }
    }
}

impl PaymentProvider for Paystack {
    fn name(&self) -> &'static str {
        "paystack"
    }

    async fn initialize(&self, order: &PaymentOrder) -> Result<InitializeResponse, ProviderError> {
        validate_payment_order(order)?;
        let reference = correlation_reference(&order.order_id);
        let body = serde_json::json!({
            "email": order.email,
            // Amounts cross to the provider as integer minor units, exactly once.
            "amount": order.total.value(),
            "currency": CURRENCY_CODE,
            "reference": reference,
            "callback_url": self.config.callback_url,
        });
        debug!("💳️ Initializing Paystack transaction for order {} ({})", order.order_id, order.total);
        let result: Envelope<InitializeData> =
            self.rest_query(Method::POST, "/transaction/initialize", Some(body)).await?;
        if !result.status {
            return Err(ProviderError::QueryError {
                status: 200,
                message: result.message.unwrap_or_else(|| "Paystack rejected the initialization".to_string()),
            });
        }
        info!("💳️ Paystack transaction initialized for order {}", order.order_id);
        Ok(InitializeResponse {
            reference: result.data.reference,
            next: NextAction::Redirect { url: result.data.authorization_url },
        })
    }

    async fn verify(&self, reference: &str) -> Result<VerifyResult, ProviderError> {
        let path = format!("/transaction/verify/{reference}");
        let result: Envelope<TransactionData> =
            self.rest_query::<_, ()>(Method::GET, &path, None).await.map_err(|e| match e {
                ProviderError::QueryError { status, message } => {
                    ProviderError::Verification(format!("Paystack lookup failed ({status}): {message}"))
                },
                e => e,
            })?;
        if !result.status {
            return Err(ProviderError::Verification(
                result.message.unwrap_or_else(|| "Paystack could not find the transaction".to_string()),
            ));
        }
        let data = result.data;
        debug!("💳️ Paystack reports '{}' for reference {reference}", data.status);
        Ok(VerifyResult {
            provider: self.name().to_string(),
            provider_tx_id: data.id.to_string(),
            reference: data.reference,
            status: map_status(&data.status),
            amount: Money::from_cents(data.amount),
            paid_at: data.paid_at,
        })
    }

    fn parse_webhook(&self, raw_body: &[u8], signature: &str) -> Result<WebhookEvent, ProviderError> {
        // Authenticate before parsing anything.
        let expected = to_hex(&hmac_sha512(self.config.secret_key.reveal(), raw_body));
        if !constant_time_eq(expected.as_bytes(), signature.trim().as_bytes()) {
            return Err(ProviderError::InvalidSignature);
        }
        #[derive(Deserialize)]
        struct Event {
            event: String,
            data: Value,
        }
        let event: Event = serde_json::from_slice(raw_body).map_err(|e| ProviderError::Json(e.to_string()))?;
        let payment = match event.event.as_str() {
            "charge.success" | "charge.failed" => {
                let data: TransactionData =
                    serde_json::from_value(event.data).map_err(|e| ProviderError::Json(e.to_string()))?;
                Some(PaymentEventData {
                    provider_tx_id: data.id.to_string(),
                    reference: Some(data.reference),
                    status: map_status(&data.status),
                    amount: Money::from_cents(data.amount),
                    paid_at: data.paid_at,
                })
            },
            other => {
                debug!("💳️ Ignoring unhandled Paystack event type '{other}'");
                None
            },
        };
        Ok(WebhookEvent { event_type: event.event, payment })
    }
}
