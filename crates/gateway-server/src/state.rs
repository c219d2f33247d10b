//! Shared application state.

use gateway_config::{ConfigHandle, GatewayConfig};
use gateway_providers::{build_http_client, ProviderContext, ProviderRegistry};
use reqwest::Client;
use std::sync::Arc;

/// State shared by every handler.
///
/// Everything here is read-only per request: the configuration is read via a
/// snapshot, adapters are rebuilt from it on each call.
#[derive(Debug, Clone)]
pub struct AppState {
    /// Reloadable configuration
    pub config: ConfigHandle,
    /// Provider catalog
    pub registry: Arc<ProviderRegistry>,
    /// Pooled upstream HTTP client
    pub http: Client,
}

impl AppState {
    /// Create state from its parts
    #[must_use]
    pub fn new(config: ConfigHandle, registry: ProviderRegistry, http: Client) -> Self {
        Self {
            config,
            registry: Arc::new(registry),
            http,
        }
    }

    /// State with the standard catalog and a client honouring the configured
    /// upstream timeout
    ///
    /// # Errors
    /// Returns an error if the HTTP client cannot be built
    pub fn standard(config: ConfigHandle) -> Result<Self, reqwest::Error> {
        let timeout = config.snapshot().server.upstream_timeout;
        let http = build_http_client(timeout)?;
        Ok(Self::new(config, ProviderRegistry::standard(), http))
    }

    /// Adapter inputs for one request
    #[must_use]
    pub fn provider_context(&self, config: &GatewayConfig) -> ProviderContext {
        ProviderContext::new(config.credentials.clone(), self.http.clone())
    }
}
