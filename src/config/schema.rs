//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the registry.
//! All types derive Serde traits for deserialization from config files.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

/// Root configuration.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct RegistryConfig {
    /// Logging settings.
    pub logging: LoggingConfig,

    /// Timeout configuration for listeners.
    pub timeouts: TimeoutConfig,

    /// Operator overrides for conflict checking and port release.
    pub overrides: OverrideConfig,

    /// Threading parameters applied to engines that configure none.
    pub fallback_threading: Option<ThreadingParameters>,

    /// Engines installed before any endpoint asks for them.
    pub engines: Vec<EngineConfig>,

    /// Endpoints registered at startup.
    pub endpoints: Vec<EndpointConfig>,
}

/// Output format for log lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default filter directive; `RUST_LOG` takes precedence.
    pub level: String,
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "port_registry=info,tower_http=info".to_string(),
            format: LogFormat::Pretty,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Per-request timeout in seconds.
    pub request_secs: u64,

    /// Grace period for in-flight requests when a listener stops.
    pub shutdown_grace_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            request_secs: 30,
            shutdown_grace_secs: 5,
        }
    }
}

/// Escape hatches, global or per port.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct OverrideConfig {
    /// Skip path conflict checks on every engine.
    pub skip_path_check: bool,

    /// Skip path conflict checks on these ports only.
    pub skip_path_check_ports: Vec<u16>,

    /// Release every port on shutdown even while servants remain.
    pub always_release: bool,

    /// Release these ports on shutdown even while servants remain.
    pub always_release_ports: Vec<u16>,
}

impl OverrideConfig {
    pub fn skips_path_check(&self, port: u16) -> bool {
        self.skip_path_check || self.skip_path_check_ports.contains(&port)
    }

    pub fn forces_release(&self, port: u16) -> bool {
        self.always_release || self.always_release_ports.contains(&port)
    }
}

/// A pre-configured engine for one port.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct EngineConfig {
    /// Bind host; all interfaces when absent.
    #[serde(default)]
    pub host: Option<String>,

    pub port: u16,

    /// Serve HTTPS with these parameters.
    #[serde(default)]
    pub tls: Option<TlsConfig>,

    #[serde(default)]
    pub threading: Option<ThreadingParameters>,

    /// Set `SO_REUSEADDR` on the listening socket.
    #[serde(default = "default_true")]
    pub reuse_address: bool,

    /// Add a `Server` header to responses.
    #[serde(default = "default_true")]
    pub send_server_version: bool,
}

impl EngineConfig {
    pub fn new(port: u16) -> Self {
        Self {
            host: None,
            port,
            tls: None,
            threading: None,
            reuse_address: true,
            send_server_version: true,
        }
    }
}

fn default_true() -> bool {
    true
}

/// TLS configuration for a listener.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct TlsConfig {
    /// Path to certificate chain file (PEM).
    pub cert_path: String,

    /// Path to private key file (PEM).
    pub key_path: String,
}

impl TlsConfig {
    pub fn new(cert_path: impl Into<String>, key_path: impl Into<String>) -> Self {
        Self {
            cert_path: cert_path.into(),
            key_path: key_path.into(),
        }
    }

    /// Shape check only; files are read when the listener starts.
    pub fn validate(&self) -> Result<(), String> {
        if self.cert_path.trim().is_empty() {
            return Err("cert_path must not be empty".to_string());
        }
        if self.key_path.trim().is_empty() {
            return Err("key_path must not be empty".to_string());
        }
        Ok(())
    }
}

/// Request-processing concurrency for a listener.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct ThreadingParameters {
    pub min_threads: usize,

    /// Upper bound on requests processed concurrently.
    pub max_threads: usize,

    /// Name used for the listener's serving task span.
    #[serde(default)]
    pub thread_name_prefix: Option<String>,
}

impl ThreadingParameters {
    pub fn validate(&self) -> Result<(), String> {
        if self.min_threads == 0 {
            return Err("min_threads must be at least 1".to_string());
        }
        if self.min_threads > self.max_threads {
            return Err(format!(
                "min_threads ({}) exceeds max_threads ({})",
                self.min_threads, self.max_threads
            ));
        }
        Ok(())
    }
}

/// An endpoint served by a [`crate::http::StaticHandler`].
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct EndpointConfig {
    /// Full URL, e.g. `http://localhost:8080/hello/test`.
    pub url: String,

    /// Match the path exactly instead of as a prefix.
    #[serde(default)]
    pub exact: bool,

    /// Response body.
    #[serde(default)]
    pub body: String,

    #[serde(default = "default_content_type")]
    pub content_type: String,
}

fn default_content_type() -> String {
    "text/plain; charset=utf-8".to_string()
}

impl RegistryConfig {
    /// Ports whose pre-configured engine serves TLS.
    pub fn tls_ports(&self) -> HashSet<u16> {
        self.engines
            .iter()
            .filter(|e| e.tls.is_some())
            .map(|e| e.port)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn overrides_apply_globally_or_per_port() {
        let mut overrides = OverrideConfig::default();
        assert!(!overrides.skips_path_check(8080));
        assert!(!overrides.forces_release(8080));

        overrides.skip_path_check_ports.push(8080);
        overrides.always_release_ports.push(9090);
        assert!(overrides.skips_path_check(8080));
        assert!(!overrides.skips_path_check(9090));
        assert!(overrides.forces_release(9090));

        overrides.always_release = true;
        assert!(overrides.forces_release(1));
    }

    #[test]
    fn threading_bounds_are_checked() {
        let ok = ThreadingParameters { min_threads: 2, max_threads: 8, thread_name_prefix: None };
        assert!(ok.validate().is_ok());

        let inverted = ThreadingParameters { min_threads: 9, max_threads: 8, thread_name_prefix: None };
        assert!(inverted.validate().is_err());

        let zero = ThreadingParameters { min_threads: 0, max_threads: 8, thread_name_prefix: None };
        assert!(zero.validate().is_err());
    }

    #[test]
    fn tls_paths_must_be_present() {
        assert!(TlsConfig::new("cert.pem", "key.pem").validate().is_ok());
        assert!(TlsConfig::new("", "key.pem").validate().is_err());
        assert!(TlsConfig::new("cert.pem", " ").validate().is_err());
    }
}
