//! port-registry
//!
//! Serves configured endpoints from a port-scoped listener registry.
//!
//! # Architecture Overview
//!
//! ```text
//!   config.toml ──▶ config::load_config ──▶ EngineRegistry::from_config
//!                                                   │
//!                        [[endpoints]] ──▶ create_for_protocol(port)
//!                                                   │
//!                                                   ▼
//!   Client ──▶ AxumContainer (one per port) ──▶ Dispatcher ──▶ ContextRouter ──▶ StaticHandler
//!
//!   SIGINT/SIGTERM ──▶ remove servants ──▶ EngineRegistry::shutdown
//! ```

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;

use port_registry::config::{self, RegistryConfig};
use port_registry::lifecycle::{bootstrap, wait_for_shutdown};
use port_registry::net::{AxumContainerFactory, ContainerSettings};
use port_registry::observability::init_logging;

#[derive(Parser)]
#[command(name = "port-registry")]
#[command(about = "Port-scoped HTTP listener registry", long_about = None)]
struct Cli {
    /// TOML configuration file; built-in defaults when omitted.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Validate the configuration and exit.
    #[arg(long)]
    check: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => config::load_config(path)?,
        None => RegistryConfig::default(),
    };
    if cli.check {
        println!("Configuration OK");
        return Ok(());
    }

    init_logging(&config.logging)?;
    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        engines = config.engines.len(),
        endpoints = config.endpoints.len(),
        request_timeout_secs = config.timeouts.request_secs,
        "port-registry starting"
    );

    let factory = AxumContainerFactory::new(ContainerSettings::from(&config.timeouts));
    let deployment = bootstrap(&config, Arc::new(factory))?;

    wait_for_shutdown().await?;

    let report = deployment.shutdown();
    if report.is_complete() {
        tracing::info!(released = ?report.released, "Shutdown complete");
    } else {
        tracing::warn!(
            released = ?report.released,
            retained = ?report.retained,
            "Shutdown left ports bound"
        );
    }
    Ok(())
}
