//! The external container capability.
//!
//! # Responsibilities
//! - Describe what an engine asks of the HTTP server it owns
//! - Carry the resolved listener parameters (`ListenerSpec`)
//! - Report bind/TLS/shutdown failures
//!
//! # Design Decisions
//! - One container per engine, created only when the engine starts
//! - All operations are synchronous; serving runs on the container's own tasks
//! - The container never routes requests itself: it forwards everything to
//!   the installed `Dispatcher`

use crate::config::{ThreadingParameters, TlsConfig};
use crate::engine::Protocol;
use crate::http::Dispatcher;

/// Error type for container operations.
#[derive(Debug)]
pub enum ContainerError {
    /// Failed to bind to address.
    Bind(std::io::Error),
    /// Failed to load TLS material.
    Tls(std::io::Error),
    /// No async runtime available to serve on.
    NoRuntime,
    /// Failed to stop cleanly.
    Shutdown(String),
}

impl std::fmt::Display for ContainerError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ContainerError::Bind(e) => write!(f, "Failed to bind: {}", e),
            ContainerError::Tls(e) => write!(f, "Failed to load TLS configuration: {}", e),
            ContainerError::NoRuntime => write!(f, "No tokio runtime available to serve on"),
            ContainerError::Shutdown(msg) => write!(f, "Failed to stop: {}", msg),
        }
    }
}

impl std::error::Error for ContainerError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ContainerError::Bind(e) | ContainerError::Tls(e) => Some(e),
            _ => None,
        }
    }
}

/// Socket and response knobs for a listener.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListenerOptions {
    pub reuse_address: bool,
    pub send_server_version: bool,
}

impl Default for ListenerOptions {
    fn default() -> Self {
        Self {
            reuse_address: true,
            send_server_version: true,
        }
    }
}

/// Everything a container needs to start listening.
#[derive(Debug, Clone)]
pub struct ListenerSpec {
    pub host: String,
    pub port: u16,
    pub protocol: Protocol,
    pub tls: Option<TlsConfig>,
    pub threading: Option<ThreadingParameters>,
    pub options: ListenerOptions,
}

/// An HTTP(S) server bound to one port.
pub trait ServerContainer: Send + Sync {
    /// Bind and begin accepting.
    fn start(&self, spec: &ListenerSpec) -> Result<(), ContainerError>;

    /// Install the single entry point for every path on this listener.
    fn install_dispatcher(&self, dispatcher: Dispatcher);

    /// Stop accepting and release the port.
    fn stop(&self) -> Result<(), ContainerError>;
}

/// Creates containers for engines.
pub trait ContainerFactory: Send + Sync + 'static {
    fn create(&self, host: &str, port: u16) -> Box<dyn ServerContainer>;
}
