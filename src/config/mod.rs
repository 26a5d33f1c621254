//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → RegistryConfig (validated, immutable)
//!     → EngineRegistry::from_config / lifecycle::startup
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded
//! - All fields have defaults to allow minimal configs
//! - Overrides are explicit fields, never ambient environment lookups
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_config, parse_config, ConfigError};
pub use schema::{
    EndpointConfig, EngineConfig, LogFormat, LoggingConfig, OverrideConfig, RegistryConfig,
    ThreadingParameters, TimeoutConfig, TlsConfig,
};
pub use validation::ValidationError;
