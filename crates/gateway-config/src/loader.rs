//! Configuration loading and hot reload.
//!
//! Sources, lowest to highest precedence: built-in defaults, an optional
//! TOML or YAML file, then the process environment. Every environment
//! variable is also offered to the provider catalog as a credential, layered
//! over the file's `[credentials]` table.

use crate::config::{FileConfig, GatewayConfig};
use arc_swap::ArcSwap;
use gateway_core::CredentialMapping;
use secrecy::SecretString;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info};

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    /// File could not be read
    #[error("Failed to read config file {path}: {source}")]
    Io {
        /// File path
        path: PathBuf,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },

    /// File could not be parsed
    #[error("Failed to parse config file {path}: {message}")]
    Parse {
        /// File path
        path: PathBuf,
        /// Parser message
        message: String,
    },

    /// File extension is not `.toml`, `.yaml` or `.yml`
    #[error("Unsupported config file format: {0}")]
    UnsupportedFormat(PathBuf),

    /// A setting has an invalid value
    #[error("Invalid value for {key}: {message}")]
    InvalidValue {
        /// Setting name
        key: String,
        /// What is wrong
        message: String,
    },
}

/// Reads configuration from its sources
#[derive(Debug, Clone, Default)]
pub struct ConfigLoader {
    path: Option<PathBuf>,
    env: Option<HashMap<String, String>>,
}

impl ConfigLoader {
    /// Loader reading only the process environment
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Also read `path`
    #[must_use]
    pub fn with_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.path = Some(path.into());
        self
    }

    /// Use `vars` instead of the process environment
    #[must_use]
    pub fn with_env<I, K, V>(mut self, vars: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.env = Some(
            vars.into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        );
        self
    }

    /// Configured file path, if any
    #[must_use]
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Build the effective configuration
    ///
    /// # Errors
    /// Returns an error if the file cannot be read or parsed, or a value is invalid
    pub fn load(&self) -> Result<GatewayConfig, ConfigError> {
        let file = match &self.path {
            Some(path) => read_file(path)?,
            None => FileConfig::default(),
        };
        let env = match &self.env {
            Some(vars) => vars.clone(),
            None => std::env::vars().collect(),
        };

        let mut config = GatewayConfig {
            server: file.server.unwrap_or_default(),
            logging: file.logging.unwrap_or_default(),
            api_key: non_empty(file.api_key).map(SecretString::new),
            cors_origin: non_empty(file.cors_origin),
            credentials: CredentialMapping::from_pairs(file.credentials),
        };

        apply_env(&mut config, &env)?;

        debug!(
            host = %config.server.host,
            port = config.server.port,
            credentials = config.credentials.len(),
            api_key_configured = config.has_api_key(),
            "Configuration loaded"
        );
        Ok(config)
    }
}

fn read_file(path: &Path) -> Result<FileConfig, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;

    let parse_error = |message: String| ConfigError::Parse {
        path: path.to_path_buf(),
        message,
    };

    match path.extension().and_then(|e| e.to_str()) {
        Some("toml") => toml::from_str(&content).map_err(|e| parse_error(e.to_string())),
        Some("yaml" | "yml") => {
            serde_yaml::from_str(&content).map_err(|e| parse_error(e.to_string()))
        }
        _ => Err(ConfigError::UnsupportedFormat(path.to_path_buf())),
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

fn apply_env(config: &mut GatewayConfig, env: &HashMap<String, String>) -> Result<(), ConfigError> {
    let get = |key: &str| non_empty(env.get(key).cloned());

    if let Some(key) = get("API_KEY") {
        config.api_key = Some(SecretString::new(key));
    }
    if let Some(origin) = get("CORS_ORIGIN") {
        config.cors_origin = Some(origin);
    }
    if let Some(host) = get("GATEWAY_HOST") {
        config.server.host = host;
    }
    if let Some(port) = get("GATEWAY_PORT") {
        config.server.port = port.trim().parse().map_err(|e| ConfigError::InvalidValue {
            key: "GATEWAY_PORT".to_string(),
            message: format!("{e}"),
        })?;
    }
    if let Some(level) = get("LOG_LEVEL") {
        config.logging.level = level;
    }
    if let Some(format) = get("LOG_FORMAT") {
        config.logging.json = match format.to_ascii_lowercase().as_str() {
            "json" => true,
            "pretty" | "text" | "plain" => false,
            other => {
                return Err(ConfigError::InvalidValue {
                    key: "LOG_FORMAT".to_string(),
                    message: format!("expected json or pretty, got {other}"),
                })
            }
        };
    }

    let from_env = CredentialMapping::from_pairs(env.iter().map(|(k, v)| (k.as_str(), v.as_str())));
    config.credentials = config.credentials.merged(&from_env);
    Ok(())
}

/// Shared, swappable configuration snapshot.
///
/// Readers take a cheap `Arc` snapshot per request; `reload` re-reads every
/// source and swaps the snapshot atomically. A failed reload keeps the old one.
#[derive(Debug, Clone)]
pub struct ConfigHandle {
    current: Arc<ArcSwap<GatewayConfig>>,
    loader: ConfigLoader,
}

impl ConfigHandle {
    /// Load once and wrap the result
    ///
    /// # Errors
    /// Returns an error if the initial load fails
    pub fn load(loader: ConfigLoader) -> Result<Self, ConfigError> {
        let config = loader.load()?;
        Ok(Self::with_loader(config, loader))
    }

    /// Wrap an already built configuration; `reload` reads the environment
    #[must_use]
    pub fn new(config: GatewayConfig) -> Self {
        Self::with_loader(config, ConfigLoader::new())
    }

    fn with_loader(config: GatewayConfig, loader: ConfigLoader) -> Self {
        Self {
            current: Arc::new(ArcSwap::from_pointee(config)),
            loader,
        }
    }

    /// Current configuration
    #[must_use]
    pub fn snapshot(&self) -> Arc<GatewayConfig> {
        self.current.load_full()
    }

    /// Replace the configuration
    pub fn store(&self, config: GatewayConfig) {
        self.current.store(Arc::new(config));
    }

    /// Re-read all sources and swap in the result
    ///
    /// # Errors
    /// Returns an error (and keeps the current snapshot) if loading fails
    pub fn reload(&self) -> Result<Arc<GatewayConfig>, ConfigError> {
        let config = Arc::new(self.loader.load()?);
        self.current.store(Arc::clone(&config));
        info!(
            credentials = config.credentials.len(),
            "Configuration reloaded"
        );
        Ok(config)
    }
}
