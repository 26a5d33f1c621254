//! Port-scoped HTTP listener registry.
//!
//! Many independent endpoints each own a sub-path of an HTTP(S) listener.
//! The registry keeps at most one listener per port, routes requests to the
//! registered handler by exact or longest-prefix match, rejects ambiguous
//! registrations up front, and releases ports only when they are idle.

pub mod config;
pub mod engine;
pub mod http;
pub mod lifecycle;
pub mod net;
pub mod observability;
pub mod routing;

pub use config::schema::RegistryConfig;
pub use engine::{EngineError, EngineRegistry, ListenerEngine, Protocol};
pub use http::{Handler, StaticHandler};
pub use lifecycle::{bootstrap, Deployment};
