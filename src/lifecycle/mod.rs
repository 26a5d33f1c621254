//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (startup.rs):
//!     Validated config → EngineRegistry::from_config → register endpoints
//!     (each engine's listener starts with its first endpoint)
//!
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → return to the caller
//!
//! Shutdown (Deployment::shutdown):
//!     Remove servants → EngineRegistry::shutdown → ShutdownReport
//! ```
//!
//! # Design Decisions
//! - Ordered startup: config first, then engines, then endpoints
//! - Ordered shutdown: servants first so every port is idle when released

pub mod signals;
pub mod startup;

pub use signals::{wait_for_shutdown, ShutdownSignal};
pub use startup::{bootstrap, Deployment, StartupError};
