//! Startup orchestration.
//!
//! # Responsibilities
//! - Build the registry and its pre-configured engines
//! - Register every configured endpoint as a `StaticHandler`
//! - Tear down in order: servants first, then the registry
//!
//! # Design Decisions
//! - Fail fast: any startup error is fatal
//! - A failed bootstrap releases whatever it already started
//! - Listeners start with their first endpoint (traffic only when ready)

use std::sync::Arc;

use thiserror::Error;
use url::Url;

use crate::config::{EndpointConfig, RegistryConfig};
use crate::engine::{EngineError, EngineRegistry, ListenerEngine, Protocol, ShutdownReport};
use crate::http::StaticHandler;
use crate::net::ContainerFactory;
use crate::routing::MatchMode;

#[derive(Debug, Error)]
pub enum StartupError {
    #[error("invalid endpoint url {url}: {source}")]
    InvalidUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },

    #[error("failed to set up {target}: {source}")]
    Engine {
        target: String,
        #[source]
        source: EngineError,
    },
}

/// A running registry and the servants registered from configuration.
pub struct Deployment {
    registry: Arc<EngineRegistry>,
    servants: Vec<(Arc<ListenerEngine>, Url)>,
}

impl Deployment {
    pub fn registry(&self) -> &Arc<EngineRegistry> {
        &self.registry
    }

    /// URLs of the endpoints registered at startup, in configuration order.
    pub fn endpoints(&self) -> impl Iterator<Item = &Url> {
        self.servants.iter().map(|(_, url)| url)
    }

    /// Remove every servant, then release every idle engine.
    pub fn shutdown(self) -> ShutdownReport {
        for (engine, url) in &self.servants {
            if engine.remove_servant(url).is_none() {
                tracing::debug!(url = %url, "Endpoint already removed");
            }
        }
        self.registry.shutdown()
    }
}

impl std::fmt::Debug for Deployment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Deployment")
            .field("registry", &self.registry)
            .field("endpoints", &self.servants.len())
            .finish()
    }
}

/// Build a registry from `config` and register all of its endpoints.
pub fn bootstrap(
    config: &RegistryConfig,
    factory: Arc<dyn ContainerFactory>,
) -> Result<Deployment, StartupError> {
    let registry = EngineRegistry::from_config(config, factory).map_err(|source| {
        StartupError::Engine {
            target: "configured engines".to_string(),
            source,
        }
    })?;

    let mut deployment = Deployment {
        registry: Arc::new(registry),
        servants: Vec::with_capacity(config.endpoints.len()),
    };

    for endpoint in &config.endpoints {
        match register_endpoint(&deployment.registry, endpoint) {
            Ok(servant) => deployment.servants.push(servant),
            Err(e) => {
                tracing::error!(url = %endpoint.url, error = %e, "Endpoint registration failed");
                let report = deployment.shutdown();
                tracing::debug!(released = ?report.released, "Rolled back partial startup");
                return Err(e);
            }
        }
    }

    tracing::info!(
        engines = deployment.registry.len(),
        endpoints = deployment.servants.len(),
        "Registry started"
    );
    Ok(deployment)
}

fn register_endpoint(
    registry: &EngineRegistry,
    endpoint: &EndpointConfig,
) -> Result<(Arc<ListenerEngine>, Url), StartupError> {
    let url = Url::parse(&endpoint.url).map_err(|source| StartupError::InvalidUrl {
        url: endpoint.url.clone(),
        source,
    })?;
    let engine_error = |source| StartupError::Engine {
        target: endpoint.url.clone(),
        source,
    };

    let (protocol, port) = Protocol::of_url(&url).map_err(engine_error)?;

    let engine = registry
        .create_for_protocol(url.host_str(), port, protocol)
        .map_err(engine_error)?;
    let handler = StaticHandler::new(endpoint.body.as_str(), MatchMode::from_exact(endpoint.exact))
        .with_content_type(&endpoint.content_type);
    engine
        .add_servant(&url, Arc::new(handler))
        .map_err(engine_error)?;

    Ok((engine, url))
}
