//! Port → engine registry.
//!
//! # Responsibilities
//! - Guarantee at most one `ListenerEngine` per port
//! - Create engines on demand, optimistically and without a global lock
//! - Apply the shutdown-vs-idle release policy
//!
//! # Design Decisions
//! - `get_or_create` builds a candidate outside any lock and installs it with
//!   insert-if-absent; the loser of a race drops its candidate, which never
//!   bound a socket
//! - Registry-wide shutdown walks a snapshot of ports, never the live map
//! - Busy engines are not released unless an override forces it

use std::sync::Arc;

use dashmap::DashMap;

use crate::config::{EngineConfig, OverrideConfig, RegistryConfig, ThreadingParameters, TlsConfig};
use crate::engine::listener::{ListenerEngine, PathCheck};
use crate::engine::{EngineError, Protocol};
use crate::net::{ContainerFactory, ListenerOptions};

/// Outcome of [`EngineRegistry::shutdown`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ShutdownReport {
    /// Ports whose engines were stopped and removed.
    pub released: Vec<u16>,
    /// Ports kept because servants were still registered.
    pub retained: Vec<u16>,
}

impl ShutdownReport {
    pub fn is_complete(&self) -> bool {
        self.retained.is_empty()
    }
}

/// Process-wide (or test-local) mapping of ports to their engines.
pub struct EngineRegistry {
    engines: DashMap<u16, Arc<ListenerEngine>>,
    factory: Arc<dyn ContainerFactory>,
    overrides: OverrideConfig,
    fallback_threading: Option<ThreadingParameters>,
}

impl EngineRegistry {
    pub fn new(factory: Arc<dyn ContainerFactory>) -> Self {
        Self {
            engines: DashMap::new(),
            factory,
            overrides: OverrideConfig::default(),
            fallback_threading: None,
        }
    }

    pub fn with_overrides(mut self, overrides: OverrideConfig) -> Self {
        self.overrides = overrides;
        self
    }

    /// Threading parameters given to engines that have none when requested
    /// through [`create_for_protocol`](Self::create_for_protocol).
    pub fn with_fallback_threading(mut self, threading: Option<ThreadingParameters>) -> Self {
        self.fallback_threading = threading;
        self
    }

    /// Build a registry with every engine declared in `config` installed.
    pub fn from_config(
        config: &RegistryConfig,
        factory: Arc<dyn ContainerFactory>,
    ) -> Result<Self, EngineError> {
        let registry = Self::new(factory)
            .with_overrides(config.overrides.clone())
            .with_fallback_threading(config.fallback_threading.clone());
        for engine in &config.engines {
            registry.configure_engine(engine)?;
        }
        Ok(registry)
    }

    pub fn overrides(&self) -> &OverrideConfig {
        &self.overrides
    }

    /// Return the engine for `port`, creating it if absent.
    ///
    /// `host` and `tls` only apply when this call creates the engine.
    pub fn get_or_create(
        &self,
        host: Option<&str>,
        port: u16,
        tls: Option<TlsConfig>,
    ) -> Result<Arc<ListenerEngine>, EngineError> {
        if let Some(engine) = self.retrieve(port) {
            return Ok(engine);
        }

        if let Some(tls) = &tls {
            tls.validate()
                .map_err(|reason| EngineError::InvalidTls { port, reason })?;
        }
        let candidate = Arc::new(self.build_engine(host, port).with_tls(tls));
        Ok(self.install(candidate))
    }

    /// Install a pre-configured engine, or reconfigure the unstarted engine
    /// already holding the port.
    pub fn configure_engine(
        &self,
        config: &EngineConfig,
    ) -> Result<Arc<ListenerEngine>, EngineError> {
        let port = config.port;
        if let Some(tls) = &config.tls {
            tls.validate()
                .map_err(|reason| EngineError::InvalidTls { port, reason })?;
        }
        if let Some(threading) = &config.threading {
            threading
                .validate()
                .map_err(|reason| EngineError::InvalidThreading { port, reason })?;
        }

        let candidate = Arc::new(
            self.build_engine(config.host.as_deref(), port)
                .with_tls(config.tls.clone())
                .with_threading(config.threading.clone())
                .with_options(ListenerOptions {
                    reuse_address: config.reuse_address,
                    send_server_version: config.send_server_version,
                }),
        );
        let engine = self.install(Arc::clone(&candidate));
        if !Arc::ptr_eq(&engine, &candidate) {
            engine.set_tls_config(config.tls.clone())?;
            engine.set_threading_parameters(config.threading.clone())?;
        }
        Ok(engine)
    }

    fn build_engine(&self, host: Option<&str>, port: u16) -> ListenerEngine {
        ListenerEngine::new(host, port, Arc::clone(&self.factory))
            .with_path_check(PathCheck::from_skip(self.overrides.skips_path_check(port)))
    }

    fn install(&self, candidate: Arc<ListenerEngine>) -> Arc<ListenerEngine> {
        let port = candidate.port();
        let winner = self
            .engines
            .entry(port)
            .or_insert_with(|| Arc::clone(&candidate))
            .clone();

        if Arc::ptr_eq(&winner, &candidate) {
            tracing::info!(
                host = %winner.host(),
                port,
                protocol = %winner.protocol(),
                "Engine created"
            );
        } else {
            tracing::debug!(port, "Discarding candidate engine, another caller created it first");
        }
        winner
    }

    /// Look up the engine for `port` without creating one.
    pub fn retrieve(&self, port: u16) -> Option<Arc<ListenerEngine>> {
        self.engines.get(&port).map(|e| Arc::clone(e.value()))
    }

    /// Get or create the engine for `port` and require it to serve `protocol`.
    pub fn create_for_protocol(
        &self,
        host: Option<&str>,
        port: u16,
        protocol: Protocol,
    ) -> Result<Arc<ListenerEngine>, EngineError> {
        let engine = self.get_or_create(host, port, None)?;
        let expected = engine.protocol();
        if expected != protocol {
            return Err(EngineError::ProtocolMismatch {
                port,
                expected,
                actual: protocol,
            });
        }

        if let Some(fallback) = &self.fallback_threading {
            if engine.apply_fallback_threading(fallback) {
                tracing::info!(
                    port,
                    min_threads = fallback.min_threads,
                    max_threads = fallback.max_threads,
                    "Applied fallback threading parameters"
                );
            }
        }
        Ok(engine)
    }

    /// Stop and remove the engine for `port` if it is idle or its release is
    /// forced. Returns whether an engine was released.
    pub fn destroy_for_port(&self, port: u16) -> bool {
        let force = self.overrides.forces_release(port);
        match self.engines.remove_if(&port, |_, engine| engine.try_retire(force)) {
            Some((_, engine)) => {
                engine.stop();
                tracing::info!(port, forced = force, "Engine released");
                true
            }
            None => {
                match self.retrieve(port) {
                    Some(engine) => tracing::warn!(
                        port,
                        servants = engine.servant_count(),
                        "Not releasing port while servants are registered"
                    ),
                    None => tracing::debug!(port, "No engine to release"),
                }
                false
            }
        }
    }

    /// Set TLS for `port`, creating the engine with it if none exists yet.
    pub fn set_tls_params_for_port(
        &self,
        host: Option<&str>,
        port: u16,
        tls: Option<TlsConfig>,
    ) -> Result<Arc<ListenerEngine>, EngineError> {
        if let Some(engine) = self.retrieve(port) {
            engine.set_tls_config(tls)?;
            return Ok(engine);
        }

        let engine = self.get_or_create(host, port, tls.clone())?;
        // Lost the creation race to an engine built without these parameters.
        if engine.tls_config() != tls {
            engine.set_tls_config(tls)?;
        }
        Ok(engine)
    }

    /// Release every engine the idle policy allows.
    pub fn shutdown(&self) -> ShutdownReport {
        let mut ports: Vec<u16> = self.engines.iter().map(|e| *e.key()).collect();
        ports.sort_unstable();

        let mut report = ShutdownReport::default();
        for port in ports {
            if self.destroy_for_port(port) {
                report.released.push(port);
            } else if self.engines.contains_key(&port) {
                report.retained.push(port);
            }
        }
        tracing::info!(
            released = report.released.len(),
            retained = report.retained.len(),
            "Registry shutdown"
        );
        report
    }

    /// Snapshot of all engines, ordered by port.
    pub fn engines(&self) -> Vec<Arc<ListenerEngine>> {
        let mut engines: Vec<Arc<ListenerEngine>> =
            self.engines.iter().map(|e| Arc::clone(e.value())).collect();
        engines.sort_by_key(|e| e.port());
        engines
    }

    pub fn len(&self) -> usize {
        self.engines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.engines.is_empty()
    }
}

impl std::fmt::Debug for EngineRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EngineRegistry")
            .field("engines", &self.engines.len())
            .field("overrides", &self.overrides)
            .field("fallback_threading", &self.fallback_threading)
            .finish_non_exhaustive()
    }
}
