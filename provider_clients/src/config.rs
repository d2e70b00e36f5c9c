use spg_common::Secret;

pub const PAYSTACK_LIVE_URL: &str = "https://api.paystack.co";
pub const YOCO_LIVE_URL: &str = "https://payments.yoco.co.za/api";
pub const PAYFAST_LIVE_URL: &str = "https://www.payfast.co.za";
pub const PAYFAST_SANDBOX_URL: &str = "https://sandbox.payfast.co.za";

#[derive(Debug, Clone, Default)]
pub struct PaystackConfig {
    pub public_key: String,
    pub secret_key: Secret<String>,
    /// Where the provider sends the customer after the hosted payment page completes.
    pub callback_url: String,
    pub base_url: String,
}

impl PaystackConfig {
    pub fn new(public_key: &str, secret_key: Secret<String>, callback_url: &str) -> Self {
        Self {
            public_key: public_key.to_string(),
            secret_key,
            callback_url: callback_url.to_string(),
            base_url: PAYSTACK_LIVE_URL.to_string(),
        }
    }

    pub fn with_base_url(mut self, base_url: &str) -> Self {
        self.base_url = base_url.to_string();
        self
    }
}

#[derive(Debug, Clone, Default)]
pub struct YocoConfig {
    pub public_key: String,
    pub secret_key: Secret<String>,
    pub webhook_secret: Secret<String>,
    pub base_url: String,
}

impl YocoConfig {
    pub fn new(public_key: &str, secret_key: Secret<String>, webhook_secret: Secret<String>) -> Self {
        Self {
            public_key: public_key.to_string(),
            secret_key,
            webhook_secret,
            base_url: YOCO_LIVE_URL.to_string(),
        }
    }

    pub fn with_base_url(mut self, base_url: &str) -> Self {
        self.base_url = base_url.to_string();
        self
    }
}

#[derive(Debug, Clone, Default)]
pub struct PayfastConfig {
    pub merchant_id: String,
    pub merchant_key: String,
    pub passphrase: Secret<String>,
    pub return_url: String,
    pub cancel_url: String,
    /// The ITN (webhook) endpoint registered with the provider.
    pub notify_url: String,
    pub base_url: String,
}

impl PayfastConfig {
    pub fn new(
        merchant_id: &str,
        merchant_key: &str,
        passphrase: Secret<String>,
        return_url: &str,
        cancel_url: &str,
        notify_url: &str,
    ) -> Self {
        Self {
            merchant_id: merchant_id.to_string(),
            merchant_key: merchant_key.to_string(),
            passphrase,
            return_url: return_url.to_string(),
            cancel_url: cancel_url.to_string(),
            notify_url: notify_url.to_string(),
            base_url: PAYFAST_LIVE_URL.to_string(),
        }
    }

    pub fn with_base_url(mut self, base_url: &str) -> Self {
        self.base_url = base_url.to_string();
        self
    }
}
