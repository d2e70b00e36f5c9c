use std::{env, str::FromStr};

use log::*;
use provider_clients::{
    config::{PayfastConfig, PaystackConfig, YocoConfig, PAYFAST_SANDBOX_URL},
    ProviderId,
};
use spg_common::Secret;

use crate::errors::ServerError;

const DEFAULT_SPG_HOST: &str = "127.0.0.1";
const DEFAULT_SPG_PORT: u16 = 8380;
const DEFAULT_DATABASE_URL: &str = "sqlite://data/storefront.db";

/// Whether this instance talks to the providers' live or sandbox environments. In a live deployment, missing provider
/// secrets are a startup error rather than a warning.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum DeployEnv {
    #[default]
    Test,
    Live,
}

impl DeployEnv {
    pub fn is_live(&self) -> bool {
        matches!(self, DeployEnv::Live)
    }
}

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub database_url: String,
    pub deploy_env: DeployEnv,
    /// The provider used when a payment request does not name one.
    pub default_provider: ProviderId,
    pub paystack: Option<PaystackConfig>,
    pub yoco: Option<YocoConfig>,
    pub payfast: Option<PayfastConfig>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_SPG_HOST.to_string(),
            port: DEFAULT_SPG_PORT,
            database_url: DEFAULT_DATABASE_URL.to_string(),
            deploy_env: DeployEnv::default(),
            default_provider: ProviderId::Paystack,
            paystack: None,
            yoco: None,
            payfast: None,
        }
    }
}

impl ServerConfig {
    pub fn new(host: &str, port: u16) -> Self {
        Self { host: host.to_string(), port, ..Default::default() }
    }

    pub fn from_env() -> Result<Self, ServerError> {
        let host = env::var("SPG_HOST").ok().unwrap_or_else(|| DEFAULT_SPG_HOST.into());
        let port = env::var("SPG_PORT")
            .map(|s| {
                s.parse::<u16>().unwrap_or_else(|e| {
                    error!(
                        "🪛️ {s} is not a valid port for SPG_PORT. {e} Using the default, {DEFAULT_SPG_PORT}, instead."
                    );
                    DEFAULT_SPG_PORT
                })
            })
            .ok()
            .unwrap_or(DEFAULT_SPG_PORT);
        let database_url = env::var("SPG_DATABASE_URL").ok().unwrap_or_else(|| {
            warn!("🪛️ SPG_DATABASE_URL is not set. Using the default, {DEFAULT_DATABASE_URL}, instead.");
            DEFAULT_DATABASE_URL.to_string()
        });
        let deploy_env = deploy_env_from_env();
        let default_provider = match env::var("SPG_DEFAULT_PROVIDER") {
            Ok(s) => ProviderId::from_str(&s)
                .map_err(|e| ServerError::ConfigurationError(format!("SPG_DEFAULT_PROVIDER: {e}")))?,
            Err(_) => {
                info!("🪛️ SPG_DEFAULT_PROVIDER is not set. Using 'paystack' as the default provider.");
                ProviderId::Paystack
            },
        };
        let paystack = paystack_from_env(deploy_env)?;
        let yoco = yoco_from_env(deploy_env)?;
        let payfast = payfast_from_env(deploy_env)?;
        Ok(Self { host, port, database_url, deploy_env, default_provider, paystack, yoco, payfast })
    }
}

fn deploy_env_from_env() -> DeployEnv {
    match env::var("SPG_DEPLOY_ENV").map(|s| s.to_lowercase()) {
        Ok(s) if s == "live" || s == "production" => DeployEnv::Live,
        Ok(s) if s == "test" || s == "sandbox" || s == "development" => DeployEnv::Test,
        Ok(s) => {
            warn!("🪛️ '{s}' is not a valid value for SPG_DEPLOY_ENV. Assuming a test deployment.");
            DeployEnv::Test
        },
        Err(_) => {
            warn!("🪛️ SPG_DEPLOY_ENV is not set. Assuming a test deployment. Set it to 'live' in production.");
            DeployEnv::Test
        },
    }
}

/// Reads a provider credential. In a live deployment a missing value aborts startup; in a test deployment it falls
/// back to the given sandbox value, with a warning.
fn required(var: &str, deploy_env: DeployEnv, sandbox_value: &str) -> Result<String, ServerError> {
    match env::var(var) {
        Ok(s) if !s.trim().is_empty() => Ok(s),
        _ if deploy_env.is_live() => {
            Err(ServerError::ConfigurationError(format!("{var} must be set in a live deployment.")))
        },
        _ => {
            warn!("🪛️ {var} is not set. Using the sandbox value for this session.");
            Ok(sandbox_value.to_string())
        },
    }
}

fn any_set(vars: &[&str]) -> bool {
    vars.iter().any(|v| env::var(v).is_ok())
}

fn paystack_from_env(deploy_env: DeployEnv) -> Result<Option<PaystackConfig>, ServerError> {
    if !any_set(&["SPG_PAYSTACK_PUBLIC_KEY", "SPG_PAYSTACK_SECRET_KEY"]) {
        info!("🪛️ No Paystack credentials are configured. Paystack payments are disabled.");
        return Ok(None);
    }
    let public_key = required("SPG_PAYSTACK_PUBLIC_KEY", deploy_env, "pk_test_sandbox")?;
    let secret_key = Secret::new(required("SPG_PAYSTACK_SECRET_KEY", deploy_env, "sk_test_sandbox")?);
    let callback_url =
        required("SPG_PAYSTACK_CALLBACK_URL", deploy_env, "http://localhost:8380/payments/thanks")?;
    let mut config = PaystackConfig::new(&public_key, secret_key, &callback_url);
    if let Ok(url) = env::var("SPG_PAYSTACK_URL") {
        config = config.with_base_url(&url);
    }
    Ok(Some(config))
}

fn yoco_from_env(deploy_env: DeployEnv) -> Result<Option<YocoConfig>, ServerError> {
    if !any_set(&["SPG_YOCO_PUBLIC_KEY", "SPG_YOCO_SECRET_KEY", "SPG_YOCO_WEBHOOK_SECRET"]) {
        info!("🪛️ No Yoco credentials are configured. Yoco payments are disabled.");
        return Ok(None);
    }
    let public_key = required("SPG_YOCO_PUBLIC_KEY", deploy_env, "pk_test_sandbox")?;
    let secret_key = Secret::new(required("SPG_YOCO_SECRET_KEY", deploy_env, "sk_test_sandbox")?);
    let webhook_secret = Secret::new(required("SPG_YOCO_WEBHOOK_SECRET", deploy_env, "whsec_sandbox")?);
    let mut config = YocoConfig::new(&public_key, secret_key, webhook_secret);
    if let Ok(url) = env::var("SPG_YOCO_URL") {
        config = config.with_base_url(&url);
    }
    Ok(Some(config))
}

fn payfast_from_env(deploy_env: DeployEnv) -> Result<Option<PayfastConfig>, ServerError> {
    if !any_set(&["SPG_PAYFAST_MERCHANT_ID", "SPG_PAYFAST_MERCHANT_KEY", "SPG_PAYFAST_PASSPHRASE"]) {
        info!("🪛️ No PayFast credentials are configured. PayFast payments are disabled.");
        return Ok(None);
    }
    let merchant_id = required("SPG_PAYFAST_MERCHANT_ID", deploy_env, "10000100")?;
    let merchant_key = required("SPG_PAYFAST_MERCHANT_KEY", deploy_env, "46f0cd694581a")?;
    let passphrase = Secret::new(required("SPG_PAYFAST_PASSPHRASE", deploy_env, "sandbox-passphrase")?);
    let return_url = required("SPG_PAYFAST_RETURN_URL", deploy_env, "http://localhost:8380/payments/thanks")?;
    let cancel_url = required("SPG_PAYFAST_CANCEL_URL", deploy_env, "http://localhost:8380/payments/cancelled")?;
    let notify_url =
        required("SPG_PAYFAST_NOTIFY_URL", deploy_env, "http://localhost:8380/payments/webhook/payfast")?;
    let mut config =
        PayfastConfig::new(&merchant_id, &merchant_key, passphrase, &return_url, &cancel_url, &notify_url);
    config = match env::var("SPG_PAYFAST_URL") {
        Ok(url) => config.with_base_url(&url),
        Err(_) if !deploy_env.is_live() => config.with_base_url(PAYFAST_SANDBOX_URL),
        Err(_) => config,
    };
    Ok(Some(config))
}
