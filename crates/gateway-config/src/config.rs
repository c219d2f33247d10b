//! Configuration model.

use gateway_core::CredentialMapping;
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::time::Duration;

/// Effective gateway configuration
#[derive(Debug, Clone, Default)]
pub struct GatewayConfig {
    /// Listener settings
    pub server: ServerSettings,
    /// Logging settings
    pub logging: LoggingSettings,
    /// Access key callers must present as `Bearer <key>`; unset rejects all
    pub api_key: Option<SecretString>,
    /// Allowed CORS origin; any origin when unset
    pub cors_origin: Option<String>,
    /// Provider credentials and settings
    pub credentials: CredentialMapping,
}

impl GatewayConfig {
    /// Whether an access key is configured
    #[must_use]
    pub fn has_api_key(&self) -> bool {
        self.api_key.is_some()
    }
}

/// Listener settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerSettings {
    /// Bind host
    #[serde(default = "default_host")]
    pub host: String,

    /// Bind port
    #[serde(default = "default_port")]
    pub port: u16,

    /// Grace period for in-flight requests on shutdown
    #[serde(default = "default_shutdown_timeout", with = "humantime_serde")]
    pub shutdown_timeout: Duration,

    /// Upper bound for a single upstream call, streams included
    #[serde(default = "default_upstream_timeout", with = "humantime_serde")]
    pub upstream_timeout: Duration,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            shutdown_timeout: default_shutdown_timeout(),
            upstream_timeout: default_upstream_timeout(),
        }
    }
}

impl ServerSettings {
    /// `host:port` as a socket address
    ///
    /// # Errors
    /// Returns an error if the host is not an IP address
    pub fn socket_addr(&self) -> Result<SocketAddr, std::net::AddrParseError> {
        format!("{}:{}", self.host, self.port).parse()
    }
}

/// Logging settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoggingSettings {
    /// Default level filter (e.g. `info`, `model_relay=debug,info`)
    #[serde(default = "default_level")]
    pub level: String,

    /// Emit JSON lines instead of human readable output
    #[serde(default)]
    pub json: bool,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: default_level(),
            json: false,
        }
    }
}

/// Shape of an on-disk configuration file
#[derive(Debug, Clone, Default, Deserialize)]
pub(crate) struct FileConfig {
    #[serde(default)]
    pub server: Option<ServerSettings>,
    #[serde(default)]
    pub logging: Option<LoggingSettings>,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default)]
    pub cors_origin: Option<String>,
    #[serde(default)]
    pub credentials: HashMap<String, String>,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_shutdown_timeout() -> Duration {
    Duration::from_secs(30)
}

fn default_upstream_timeout() -> Duration {
    Duration::from_secs(600)
}

fn default_level() -> String {
    "info".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = GatewayConfig::default();
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.server.shutdown_timeout, Duration::from_secs(30));
        assert_eq!(config.logging.level, "info");
        assert!(!config.logging.json);
        assert!(!config.has_api_key());
        assert!(config.credentials.is_empty());
    }

    #[test]
    fn test_socket_addr() {
        let settings = ServerSettings {
            host: "127.0.0.1".to_string(),
            port: 9000,
            ..ServerSettings::default()
        };
        assert_eq!(settings.socket_addr().unwrap().port(), 9000);

        let settings = ServerSettings {
            host: "not a host".to_string(),
            ..ServerSettings::default()
        };
        assert!(settings.socket_addr().is_err());
    }

    #[test]
    fn test_server_settings_humantime() {
        let settings: ServerSettings =
            serde_yaml::from_str("port: 9090\nshutdown_timeout: 5s\nupstream_timeout: 2m\n").unwrap();
        assert_eq!(settings.host, "0.0.0.0");
        assert_eq!(settings.port, 9090);
        assert_eq!(settings.shutdown_timeout, Duration::from_secs(5));
        assert_eq!(settings.upstream_timeout, Duration::from_secs(120));
    }
}
