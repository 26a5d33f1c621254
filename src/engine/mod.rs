//! Listener engines and the port registry.
//!
//! # Data Flow
//! ```text
//! Transport owner
//!     → registry.rs (get-or-create the single engine for a port)
//!     → listener.rs (addServant: check url, register path, start container once)
//!     → net::ServerContainer (bind, install Dispatcher)
//!
//! Engine states:
//!     Unstarted → Running → Stopped
//! ```
//!
//! # Design Decisions
//! - One engine per port, enforced by insert-if-absent on a `DashMap`
//! - Candidate engines own no socket, so losing a creation race is free
//! - Configuration mistakes are returned as `EngineError`, never panics

pub mod listener;
pub mod protocol;
pub mod registry;

use thiserror::Error;

use crate::net::ContainerError;
use crate::routing::Conflict;

pub use listener::{EngineState, ListenerEngine, PathCheck};
pub use protocol::Protocol;
pub use registry::{EngineRegistry, ShutdownReport};

/// Errors surfaced by engine and registry operations.
#[derive(Debug, Error)]
pub enum EngineError {
    /// The caller asked for a protocol the engine does not serve.
    #[error("port {port} is configured for {expected}, but {actual} was requested")]
    ProtocolMismatch {
        port: u16,
        expected: Protocol,
        actual: Protocol,
    },

    #[error("cannot change TLS configuration on port {port}: listener already started")]
    TlsAfterStart { port: u16 },

    #[error("cannot change threading parameters on port {port}: listener already started")]
    ThreadingAfterStart { port: u16 },

    /// The URL names a different port than the engine listens on.
    #[error("url {url} targets port {url_port}, but this engine listens on {engine_port}")]
    PortMismatch {
        url: String,
        url_port: u16,
        engine_port: u16,
    },

    #[error("unsupported url scheme '{scheme}'")]
    UnsupportedScheme { scheme: String },

    #[error("url {url} has no port and its scheme has no default")]
    MissingPort { url: String },

    #[error("invalid TLS configuration for port {port}: {reason}")]
    InvalidTls { port: u16, reason: String },

    #[error("invalid threading parameters for port {port}: {reason}")]
    InvalidThreading { port: u16, reason: String },

    /// The engine has been stopped and cannot take new servants.
    #[error("engine for port {port} is stopped")]
    EngineStopped { port: u16 },

    #[error(transparent)]
    Conflict(#[from] Conflict),

    #[error("failed to start listener on port {port}: {source}")]
    ContainerStart {
        port: u16,
        #[source]
        source: ContainerError,
    },
}

impl EngineError {
    /// Whether retrying with the same inputs can succeed.
    ///
    /// Only container start failures qualify: the port may become free.
    pub fn is_retryable(&self) -> bool {
        matches!(self, EngineError::ContainerStart { .. })
    }
}
