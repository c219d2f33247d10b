//! Provider registry.
//!
//! The catalog is a fixed, ordered list of constructors. Every call to
//! [`ProviderRegistry::active_adapters`] builds adapters from the current
//! credential mapping and keeps those whose required credentials are all
//! present, so a credential rotation is visible on the next request.

use crate::anthropic::AnthropicProvider;
use crate::azure::AzureOpenAIProvider;
use crate::cohere::CohereProvider;
use crate::google::GoogleProvider;
use crate::openai::OpenAICompatibleProvider;
use crate::vendors;
use gateway_core::{CredentialMapping, ProviderAdapter};
use reqwest::Client;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Inputs available to adapter constructors
#[derive(Debug, Clone)]
pub struct ProviderContext {
    /// Current credential mapping
    pub credentials: CredentialMapping,
    /// Shared HTTP client
    pub http: Client,
}

impl ProviderContext {
    /// Create a context
    #[must_use]
    pub fn new(credentials: CredentialMapping, http: Client) -> Self {
        Self { credentials, http }
    }
}

/// Build the shared upstream HTTP client.
///
/// # Errors
/// Returns an error if the TLS backend cannot be initialized
pub fn build_http_client(timeout: Duration) -> Result<Client, reqwest::Error> {
    Client::builder()
        .timeout(timeout)
        .pool_max_idle_per_host(100)
        .build()
}

type Constructor = Arc<dyn Fn(&ProviderContext) -> Arc<dyn ProviderAdapter> + Send + Sync>;

/// One catalog entry
#[derive(Clone)]
pub struct ProviderEntry {
    name: String,
    build: Constructor,
}

impl ProviderEntry {
    /// Create an entry from a constructor
    pub fn new<F>(name: impl Into<String>, build: F) -> Self
    where
        F: Fn(&ProviderContext) -> Arc<dyn ProviderAdapter> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            build: Arc::new(build),
        }
    }

    /// Entry that always yields the same adapter instance
    pub fn fixed(adapter: Arc<dyn ProviderAdapter>) -> Self {
        let name = adapter.name().to_string();
        Self::new(name, move |_| Arc::clone(&adapter))
    }

    /// Entry name
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Construct the adapter for `ctx`
    #[must_use]
    pub fn build(&self, ctx: &ProviderContext) -> Arc<dyn ProviderAdapter> {
        (self.build)(ctx)
    }
}

impl fmt::Debug for ProviderEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderEntry")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

/// Ordered provider catalog
#[derive(Debug, Clone)]
pub struct ProviderRegistry {
    entries: Vec<ProviderEntry>,
}

impl Default for ProviderRegistry {
    fn default() -> Self {
        Self::standard()
    }
}

impl ProviderRegistry {
    /// The built-in catalog, in registration order
    #[must_use]
    pub fn standard() -> Self {
        fn entry<P, F>(name: &str, build: F) -> ProviderEntry
        where
            P: ProviderAdapter + 'static,
            F: Fn(&ProviderContext) -> P + Send + Sync + 'static,
        {
            ProviderEntry::new(name, move |ctx| Arc::new(build(ctx)) as Arc<dyn ProviderAdapter>)
        }

        Self::from_entries(vec![
            entry("openai", OpenAICompatibleProvider::openai),
            entry("anthropic", AnthropicProvider::direct),
            entry("anthropic-vertex", AnthropicProvider::vertex),
            entry("google", GoogleProvider::from_context),
            entry("deepseek", vendors::deepseek),
            entry("moonshot", vendors::moonshot),
            entry("lingyiwanwu", vendors::lingyiwanwu),
            entry("groq", vendors::groq),
            entry("azure-openai", AzureOpenAIProvider::from_context),
            entry("cohere", CohereProvider::from_context),
            entry("bailian", vendors::bailian),
        ])
    }

    /// A custom catalog
    #[must_use]
    pub fn from_entries(entries: Vec<ProviderEntry>) -> Self {
        Self { entries }
    }

    /// Catalog entries in order
    #[must_use]
    pub fn entries(&self) -> &[ProviderEntry] {
        &self.entries
    }

    /// Number of catalog entries
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the catalog is empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Every catalog adapter, regardless of credentials
    #[must_use]
    pub fn all_adapters(&self, ctx: &ProviderContext) -> Vec<Arc<dyn ProviderAdapter>> {
        self.entries.iter().map(|e| e.build(ctx)).collect()
    }

    /// Adapters whose required credentials are all present, in catalog order
    #[must_use]
    pub fn active_adapters(&self, ctx: &ProviderContext) -> Vec<Arc<dyn ProviderAdapter>> {
        let active: Vec<_> = self
            .all_adapters(ctx)
            .into_iter()
            .filter(|adapter| ctx.credentials.contains_all(adapter.required_credentials()))
            .collect();

        debug!(
            catalog = self.entries.len(),
            active = active.len(),
            "Computed active providers"
        );
        active
    }
}
