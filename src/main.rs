//! # Model Relay
//!
//! OpenAI-compatible gateway in front of many LLM vendors.
//!
//! ## Usage
//!
//! ```bash
//! # Credentials and the gateway key from the environment (or .env)
//! API_KEY=relay-key OPENAI_API_KEY=sk-... model-relay
//!
//! # With a config file
//! model-relay --config /etc/model-relay/relay.toml
//!
//! # Validate configuration and list active providers, then exit
//! model-relay --check
//! ```
//!
//! Send SIGHUP to reload the configuration (rotated credentials apply to the
//! next request).

use anyhow::{Context, Result};
use clap::Parser;
use gateway_config::{ConfigHandle, ConfigLoader};
use gateway_routing::warn_overlaps;
use gateway_server::{shutdown_signal, spawn_reload_on_hangup, AppState, Server};
use gateway_telemetry::{init_logging, LoggingConfig};
use std::path::PathBuf;
use tracing::{info, warn};

/// Model Relay - OpenAI-compatible gateway for many LLM providers
#[derive(Parser, Debug)]
#[command(name = "model-relay")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Configuration file (TOML or YAML)
    #[arg(short, long, env = "GATEWAY_CONFIG")]
    config: Option<PathBuf>,

    /// Emit JSON logs regardless of configuration
    #[arg(long)]
    json_logs: bool,

    /// Validate configuration, report active providers and exit
    #[arg(long)]
    check: bool,
}

/// Application entry point
#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();

    let mut loader = ConfigLoader::new();
    if let Some(path) = &cli.config {
        loader = loader.with_file(path);
    }
    let handle = ConfigHandle::load(loader).context("Failed to load configuration")?;
    let config = handle.snapshot();

    init_logging(
        &LoggingConfig::new()
            .with_level(&config.logging.level)
            .with_json(config.logging.json || cli.json_logs),
    )?;

    info!(
        version = env!("CARGO_PKG_VERSION"),
        config_file = ?cli.config,
        "Starting Model Relay"
    );

    if !config.has_api_key() {
        warn!("API_KEY is not set; every authenticated route will answer 401");
    }

    let state = AppState::standard(handle.clone()).context("Failed to build upstream HTTP client")?;

    let ctx = state.provider_context(&config);
    warn_overlaps(&state.registry.all_adapters(&ctx));

    let active = state.registry.active_adapters(&ctx);
    let names: Vec<&str> = active.iter().map(|adapter| adapter.name()).collect();
    info!(
        active = active.len(),
        catalog = state.registry.len(),
        providers = ?names,
        "Provider catalog evaluated"
    );
    if active.is_empty() {
        warn!("No provider credentials configured; every model will be reported as not supported");
    }

    if cli.check {
        return Ok(());
    }

    let reload = spawn_reload_on_hangup(handle);

    Server::new(state)
        .run(async {
            shutdown_signal().await;
        })
        .await?;

    reload.abort();
    Ok(())
}
