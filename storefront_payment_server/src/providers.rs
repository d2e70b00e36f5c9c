//! The set of provider clients built from the server configuration.

use std::collections::HashMap;

use log::*;
use provider_clients::{
    AnyProvider,
    Payfast,
    Paystack,
    ProviderId,
    Yoco,
    PAYFAST_SIGNATURE_HEADER,
    PAYSTACK_SIGNATURE_HEADER,
    YOCO_SIGNATURE_HEADER,
};

use crate::{config::ServerConfig, errors::ServerError};

#[derive(Clone)]
pub struct ProviderRegistry {
    default_provider: ProviderId,
    providers: HashMap<ProviderId, AnyProvider>,
}

impl ProviderRegistry {
    pub fn new(default_provider: ProviderId) -> Self {
        Self { default_provider, providers: HashMap::new() }
    }

    pub fn register(&mut self, id: ProviderId, provider: AnyProvider) {
        self.providers.insert(id, provider);
    }

    /// Returns the client for the requested provider, or for the configured default when none is named.
    pub fn get(&self, id: Option<ProviderId>) -> Result<&AnyProvider, ServerError> {
        let id = id.unwrap_or(self.default_provider);
        self.providers
            .get(&id)
            .ok_or_else(|| ServerError::UnknownProvider(format!("'{id}' is not configured on this gateway.")))
    }

    pub fn default_provider(&self) -> ProviderId {
        self.default_provider
    }

    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }
}

/// The request header each provider uses to deliver its webhook signature.
pub fn signature_header(id: ProviderId) -> &'static str {
    match id {
        ProviderId::Paystack => PAYSTACK_SIGNATURE_HEADER,
        ProviderId::Yoco => YOCO_SIGNATURE_HEADER,
        ProviderId::Payfast => PAYFAST_SIGNATURE_HEADER,
    }
}

pub fn build_registry(config: &ServerConfig) -> Result<ProviderRegistry, ServerError> {
    let mut registry = ProviderRegistry::new(config.default_provider);
    if let Some(cfg) = &config.paystack {
        let client = Paystack::new(cfg.clone()).map_err(|e| ServerError::InitializeError(e.to_string()))?;
        registry.register(ProviderId::Paystack, AnyProvider::Paystack(client));
        info!("💳️ Paystack payments are enabled.");
    }
    if let Some(cfg) = &config.yoco {
        let client = Yoco::new(cfg.clone()).map_err(|e| ServerError::InitializeError(e.to_string()))?;
        registry.register(ProviderId::Yoco, AnyProvider::Yoco(client));
        info!("💳️ Yoco payments are enabled.");
    }
    if let Some(cfg) = &config.payfast {
        let client = Payfast::new(cfg.clone()).map_err(|e| ServerError::InitializeError(e.to_string()))?;
        registry.register(ProviderId::Payfast, AnyProvider::Payfast(client));
        info!("💳️ PayFast payments are enabled.");
    }
    if registry.is_empty() {
        return Err(ServerError::ConfigurationError(
            "At least one payment provider must be configured for the gateway to be useful.".to_string(),
        ));
    }
    registry.get(None).map_err(|_| {
        ServerError::ConfigurationError(format!(
            "The default provider '{}' has no credentials configured.",
            config.default_provider
        ))
    })?;
    Ok(registry)
}
