//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (ports, thread bounds, TLS paths)
//! - Check endpoints against their engines' protocols
//! - Detect conflicting endpoint paths before anything binds
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: RegistryConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::collections::{HashMap, HashSet};
use std::fmt;

use url::Url;

use crate::config::schema::RegistryConfig;
use crate::engine::Protocol;
use crate::routing::{conflict, path};

/// One semantic problem in a configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    pub field: String,
    pub message: String,
}

impl ValidationError {
    fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

pub fn validate_config(config: &RegistryConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    let mut seen_ports = HashSet::new();
    for (i, engine) in config.engines.iter().enumerate() {
        let field = format!("engines[{i}]");
        if engine.port == 0 {
            errors.push(ValidationError::new(format!("{field}.port"), "port must be non-zero"));
        }
        if !seen_ports.insert(engine.port) {
            errors.push(ValidationError::new(
                format!("{field}.port"),
                format!("port {} is configured more than once", engine.port),
            ));
        }
        if let Some(tls) = &engine.tls {
            if let Err(msg) = tls.validate() {
                errors.push(ValidationError::new(format!("{field}.tls"), msg));
            }
        }
        if let Some(threading) = &engine.threading {
            if let Err(msg) = threading.validate() {
                errors.push(ValidationError::new(format!("{field}.threading"), msg));
            }
        }
    }

    if let Some(threading) = &config.fallback_threading {
        if let Err(msg) = threading.validate() {
            errors.push(ValidationError::new("fallback_threading", msg));
        }
    }

    let tls_ports = config.tls_ports();
    let mut paths_by_port: HashMap<u16, Vec<String>> = HashMap::new();
    for (i, endpoint) in config.endpoints.iter().enumerate() {
        let field = format!("endpoints[{i}].url");
        let url = match Url::parse(&endpoint.url) {
            Ok(url) => url,
            Err(e) => {
                errors.push(ValidationError::new(field, format!("invalid url: {e}")));
                continue;
            }
        };
        let (protocol, port) = match Protocol::of_url(&url) {
            Ok(endpoint) => endpoint,
            Err(e) => {
                errors.push(ValidationError::new(field, e.to_string()));
                continue;
            }
        };

        let engine_protocol = if tls_ports.contains(&port) {
            Protocol::Https
        } else {
            Protocol::Http
        };
        if protocol != engine_protocol {
            errors.push(ValidationError::new(
                field.clone(),
                format!(
                    "port {port} is configured for {engine_protocol}, but the url uses {protocol}"
                ),
            ));
        }

        let normalized = path::normalize(url.path());
        let existing = paths_by_port.entry(port).or_default();
        if !config.overrides.skips_path_check(port) {
            if let Err(conflict) = conflict::check(&normalized, existing.iter()) {
                errors.push(ValidationError::new(field, conflict.to_string()));
                continue;
            }
        }
        existing.push(normalized);
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
