//! Azure OpenAI provider implementation.
//!
//! Supports Azure OpenAI Service with deployment-based model access.
//! Key differences from OpenAI:
//! - URL structure: `{resource}.openai.azure.com/openai/deployments/{deployment}/chat/completions`
//! - Authentication via API key in `api-key` header
//! - API version required as query parameter
//!
//! The requested model id is the deployment name.

use crate::common::{secret, select_key, setting};
use crate::openai::{open_chunk_stream, send_completion};
use crate::registry::ProviderContext;
use async_trait::async_trait;
use gateway_core::{
    CancellationSignal, ChatCompletion, ChatCompletionRequest, ChunkStream, GatewayResult,
    ProviderAdapter,
};
use reqwest::{Client, RequestBuilder};
use secrecy::SecretString;
use tracing::debug;

/// Azure OpenAI API version
pub const DEFAULT_API_VERSION: &str = "2024-02-15-preview";

/// Credential holding the Azure API key
pub const AZURE_OPENAI_API_KEY: &str = "AZURE_OPENAI_API_KEY";
/// Credential holding the Azure resource name
pub const AZURE_OPENAI_RESOURCE_NAME: &str = "AZURE_OPENAI_RESOURCE_NAME";

const REQUIRED: &[&str] = &[AZURE_OPENAI_API_KEY, AZURE_OPENAI_RESOURCE_NAME];
const DEFAULT_DEPLOYMENTS: &[&str] = &["gpt-4o", "gpt-4o-mini", "gpt-4", "gpt-35-turbo"];

/// Azure OpenAI provider configuration
#[derive(Debug, Clone)]
pub struct AzureOpenAIConfig {
    /// API key
    pub api_key: Option<SecretString>,
    /// Azure resource name (e.g., "my-resource")
    pub resource_name: String,
    /// API version (default: 2024-02-15-preview)
    pub api_version: String,
    /// Deployment names, served as model ids
    pub deployments: Vec<String>,
    /// Custom endpoint (private endpoint or test server), scheme included
    pub custom_endpoint: Option<String>,
}

impl AzureOpenAIConfig {
    /// Create a new Azure OpenAI configuration with the default deployments
    #[must_use]
    pub fn new(resource_name: impl Into<String>, api_key: Option<SecretString>) -> Self {
        Self {
            api_key,
            resource_name: resource_name.into(),
            api_version: DEFAULT_API_VERSION.to_string(),
            deployments: DEFAULT_DEPLOYMENTS.iter().map(|d| (*d).to_string()).collect(),
            custom_endpoint: None,
        }
    }

    /// Read the configuration from the credential mapping
    #[must_use]
    pub fn from_credentials(ctx: &ProviderContext) -> Self {
        let creds = &ctx.credentials;
        let mut config = Self::new(
            setting(creds, AZURE_OPENAI_RESOURCE_NAME).unwrap_or_default(),
            secret(creds, AZURE_OPENAI_API_KEY),
        );
        if let Some(version) = setting(creds, "AZURE_OPENAI_API_VERSION") {
            config = config.with_api_version(version);
        }
        if let Some(list) = setting(creds, "AZURE_OPENAI_DEPLOYMENTS") {
            config = config.with_deployments(parse_deployments(&list));
        }
        if let Some(endpoint) = setting(creds, "AZURE_OPENAI_ENDPOINT") {
            config = config.with_custom_endpoint(endpoint);
        }
        config
    }

    /// Set the API version
    #[must_use]
    pub fn with_api_version(mut self, version: impl Into<String>) -> Self {
        self.api_version = version.into();
        self
    }

    /// Replace the deployment list; an empty list keeps the defaults
    #[must_use]
    pub fn with_deployments(mut self, deployments: Vec<String>) -> Self {
        if !deployments.is_empty() {
            self.deployments = deployments;
        }
        self
    }

    /// Set a custom endpoint
    #[must_use]
    pub fn with_custom_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.custom_endpoint = Some(endpoint.into());
        self
    }

    /// Get the base URL for the Azure OpenAI resource
    #[must_use]
    pub fn base_url(&self) -> String {
        match self.custom_endpoint {
            Some(ref endpoint) => endpoint.trim_end_matches('/').to_string(),
            None => format!("https://{}.openai.azure.com", self.resource_name),
        }
    }
}

fn parse_deployments(list: &str) -> Vec<String> {
    list.split(',')
        .map(str::trim)
        .filter(|d| !d.is_empty())
        .map(String::from)
        .collect()
}

/// Azure OpenAI provider implementation
#[derive(Debug, Clone)]
pub struct AzureOpenAIProvider {
    config: AzureOpenAIConfig,
    client: Client,
}

impl AzureOpenAIProvider {
    /// Create a new Azure OpenAI provider
    #[must_use]
    pub fn new(config: AzureOpenAIConfig, client: Client) -> Self {
        Self { config, client }
    }

    /// Build from the credential mapping
    #[must_use]
    pub fn from_context(ctx: &ProviderContext) -> Self {
        Self::new(AzureOpenAIConfig::from_credentials(ctx), ctx.http.clone())
    }

    /// Get the chat completions endpoint URL for a deployment
    fn completions_url(&self, deployment: &str) -> String {
        format!(
            "{}/openai/deployments/{}/chat/completions?api-version={}",
            self.config.base_url(),
            deployment,
            self.config.api_version
        )
    }

    fn request(
        &self,
        request: &ChatCompletionRequest,
        upstream_key: Option<&str>,
        stream: bool,
    ) -> GatewayResult<RequestBuilder> {
        let key = select_key(self.name(), upstream_key, self.config.api_key.as_ref())?;
        let url = self.completions_url(&request.model);

        debug!(
            deployment = %request.model,
            url = %url,
            stream,
            "Sending request to Azure OpenAI"
        );

        Ok(self
            .client
            .post(url)
            .header("api-key", key)
            .json(&request.to_upstream_body(stream)))
    }
}

#[async_trait]
impl ProviderAdapter for AzureOpenAIProvider {
    fn name(&self) -> &str {
        "azure-openai"
    }

    fn required_credentials(&self) -> &[&'static str] {
        REQUIRED
    }

    fn supported_models(&self) -> &[String] {
        &self.config.deployments
    }

    async fn chat_completion(
        &self,
        request: &ChatCompletionRequest,
        upstream_key: Option<&str>,
    ) -> GatewayResult<ChatCompletion> {
        let builder = self.request(request, upstream_key, false)?;
        send_completion(self.name(), builder).await
    }

    async fn chat_completion_stream(
        &self,
        request: &ChatCompletionRequest,
        cancellation: CancellationSignal,
        upstream_key: Option<&str>,
    ) -> GatewayResult<ChunkStream> {
        let builder = self.request(request, upstream_key, true)?;
        open_chunk_stream(self.name(), builder, cancellation)
    }
}
