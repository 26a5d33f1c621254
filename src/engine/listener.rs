//! One listener engine per port.
//!
//! # Responsibilities
//! - Own the port's `ContextRouter` and its container
//! - Start the container on the first successful registration
//! - Enforce the protocol and port the engine was configured with
//! - Track how many servants are registered
//!
//! # Design Decisions
//! - Registration and lifecycle transitions serialize on the engine mutex;
//!   dispatch never takes it (the container reads the router directly)
//! - The container is created lazily, so an unstarted engine holds no port
//! - A failed start leaves the engine `Unstarted` with an unchanged router

use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use url::Url;

use crate::config::{ThreadingParameters, TlsConfig};
use crate::engine::{EngineError, Protocol};
use crate::http::{Dispatcher, Handler};
use crate::net::{ContainerError, ContainerFactory, ListenerOptions, ListenerSpec, ServerContainer};
use crate::routing::{ContextRouter, RegisteredPath};

const DEFAULT_HOST: &str = "0.0.0.0";

/// Lifecycle of a [`ListenerEngine`]. There is no way back from `Stopped`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineState {
    Unstarted,
    Running,
    Stopped,
}

impl fmt::Display for EngineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EngineState::Unstarted => f.write_str("unstarted"),
            EngineState::Running => f.write_str("running"),
            EngineState::Stopped => f.write_str("stopped"),
        }
    }
}

/// Whether registrations on an engine run the path conflict check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PathCheck {
    #[default]
    Enforce,
    /// Escape hatch for diagnostics and tests.
    Skip,
}

impl PathCheck {
    pub fn from_skip(skip: bool) -> Self {
        if skip {
            PathCheck::Skip
        } else {
            PathCheck::Enforce
        }
    }
}

struct EngineInner {
    state: EngineState,
    tls: Option<TlsConfig>,
    threading: Option<ThreadingParameters>,
    container: Option<Box<dyn ServerContainer>>,
    servants: usize,
}

/// The owner of one port, multiplexing many registered paths.
pub struct ListenerEngine {
    host: String,
    port: u16,
    options: ListenerOptions,
    path_check: PathCheck,
    factory: Arc<dyn ContainerFactory>,
    router: Arc<ContextRouter>,
    inner: Mutex<EngineInner>,
}

impl ListenerEngine {
    /// Create an unstarted engine. All interfaces are bound when `host` is `None`.
    pub fn new(host: Option<&str>, port: u16, factory: Arc<dyn ContainerFactory>) -> Self {
        Self {
            host: host.unwrap_or(DEFAULT_HOST).to_string(),
            port,
            options: ListenerOptions::default(),
            path_check: PathCheck::default(),
            factory,
            router: Arc::new(ContextRouter::new()),
            inner: Mutex::new(EngineInner {
                state: EngineState::Unstarted,
                tls: None,
                threading: None,
                container: None,
                servants: 0,
            }),
        }
    }

    pub fn with_tls(mut self, tls: Option<TlsConfig>) -> Self {
        self.inner_mut().tls = tls;
        self
    }

    pub fn with_threading(mut self, threading: Option<ThreadingParameters>) -> Self {
        self.inner_mut().threading = threading;
        self
    }

    pub fn with_options(mut self, options: ListenerOptions) -> Self {
        self.options = options;
        self
    }

    pub fn with_path_check(mut self, path_check: PathCheck) -> Self {
        self.path_check = path_check;
        self
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn options(&self) -> &ListenerOptions {
        &self.options
    }

    pub fn path_check(&self) -> PathCheck {
        self.path_check
    }

    pub fn state(&self) -> EngineState {
        self.lock().state
    }

    pub fn protocol(&self) -> Protocol {
        Protocol::for_tls(self.lock().tls.as_ref())
    }

    pub fn servant_count(&self) -> usize {
        self.lock().servants
    }

    pub fn tls_config(&self) -> Option<TlsConfig> {
        self.lock().tls.clone()
    }

    pub fn threading_parameters(&self) -> Option<ThreadingParameters> {
        self.lock().threading.clone()
    }

    /// Registered paths, sorted.
    pub fn paths(&self) -> Vec<RegisteredPath> {
        self.router.paths()
    }

    /// Register `handler` at `url`'s path, starting the listener if this is
    /// the first servant.
    pub fn add_servant(&self, url: &Url, handler: Arc<dyn Handler>) -> Result<(), EngineError> {
        self.register(url, handler, self.path_check == PathCheck::Enforce)
    }

    /// Like [`add_servant`](Self::add_servant) but without the path conflict check.
    pub fn add_servant_unchecked(
        &self,
        url: &Url,
        handler: Arc<dyn Handler>,
    ) -> Result<(), EngineError> {
        self.register(url, handler, false)
    }

    fn register(
        &self,
        url: &Url,
        handler: Arc<dyn Handler>,
        check_conflicts: bool,
    ) -> Result<(), EngineError> {
        let requested = self.check_url(url)?;

        let mut inner = self.lock();
        if inner.state == EngineState::Stopped {
            return Err(EngineError::EngineStopped { port: self.port });
        }
        let expected = Protocol::for_tls(inner.tls.as_ref());
        if requested != expected {
            return Err(EngineError::ProtocolMismatch {
                port: self.port,
                expected,
                actual: requested,
            });
        }

        let path = RegisteredPath::new(url.path(), handler.match_mode());
        let displaced = self.router.register(path.clone(), handler, check_conflicts)?;

        if inner.state == EngineState::Unstarted {
            if let Err(source) = self.start_container(&mut inner) {
                self.router.remove(path.as_str());
                tracing::error!(
                    port = self.port,
                    protocol = %expected,
                    error = %source,
                    "Listener failed to start"
                );
                return Err(EngineError::ContainerStart {
                    port: self.port,
                    source,
                });
            }
        }

        match &displaced {
            Some(_) => tracing::debug!(
                port = self.port,
                path = %path,
                servants = inner.servants,
                "Servant replaced"
            ),
            None => {
                inner.servants += 1;
                tracing::debug!(
                    port = self.port,
                    path = %path,
                    servants = inner.servants,
                    "Servant added"
                );
            }
        }
        drop(inner);

        if let Some(old) = displaced {
            old.on_removed();
        }
        Ok(())
    }

    fn start_container(&self, inner: &mut EngineInner) -> Result<(), ContainerError> {
        let protocol = Protocol::for_tls(inner.tls.as_ref());
        let spec = ListenerSpec {
            host: self.host.clone(),
            port: self.port,
            protocol,
            tls: inner.tls.clone(),
            threading: inner.threading.clone(),
            options: self.options.clone(),
        };

        let container = self.factory.create(&self.host, self.port);
        container.start(&spec)?;
        container.install_dispatcher(Dispatcher::new(self.port, Arc::clone(&self.router)));

        inner.container = Some(container);
        inner.state = EngineState::Running;
        tracing::info!(host = %self.host, port = self.port, protocol = %protocol, "Listener started");
        Ok(())
    }

    /// Remove the servant at `url`'s path. `None` if nothing was registered there.
    pub fn remove_servant(&self, url: &Url) -> Option<Arc<dyn Handler>> {
        if !self.targets_this_port(url) {
            tracing::debug!(port = self.port, url = %url, "Ignoring removal for another port");
            return None;
        }

        let removed = {
            let mut inner = self.lock();
            let removed = self.router.remove(url.path());
            if removed.is_some() {
                inner.servants = inner.servants.saturating_sub(1);
                tracing::debug!(
                    port = self.port,
                    path = %url.path(),
                    servants = inner.servants,
                    "Servant removed"
                );
            }
            removed
        };

        if let Some(handler) = &removed {
            handler.on_removed();
        }
        removed
    }

    /// Look up the handler that would serve `url`'s path.
    pub fn get_servant(&self, url: &Url) -> Option<Arc<dyn Handler>> {
        if !self.targets_this_port(url) {
            return None;
        }
        self.router.resolve(url.path())
    }

    /// Stop the listener. Safe to call repeatedly; failures are only logged.
    pub fn stop(&self) {
        let container = {
            let mut inner = self.lock();
            inner.state = EngineState::Stopped;
            inner.container.take()
        };

        if let Some(container) = container {
            match container.stop() {
                Ok(()) => tracing::info!(port = self.port, "Listener stopped"),
                Err(e) => tracing::warn!(port = self.port, error = %e, "Listener failed to stop"),
            }
        }
    }

    /// Replace the TLS configuration. Only allowed before the listener starts.
    pub fn set_tls_config(&self, tls: Option<TlsConfig>) -> Result<(), EngineError> {
        if let Some(tls) = &tls {
            tls.validate().map_err(|reason| EngineError::InvalidTls {
                port: self.port,
                reason,
            })?;
        }

        let mut inner = self.lock();
        if inner.state != EngineState::Unstarted {
            return Err(EngineError::TlsAfterStart { port: self.port });
        }
        tracing::debug!(port = self.port, tls = tls.is_some(), "TLS configuration set");
        inner.tls = tls;
        Ok(())
    }

    /// Replace the threading parameters. Only allowed before the listener starts.
    pub fn set_threading_parameters(
        &self,
        threading: Option<ThreadingParameters>,
    ) -> Result<(), EngineError> {
        if let Some(threading) = &threading {
            threading
                .validate()
                .map_err(|reason| EngineError::InvalidThreading {
                    port: self.port,
                    reason,
                })?;
        }

        let mut inner = self.lock();
        if inner.state != EngineState::Unstarted {
            return Err(EngineError::ThreadingAfterStart { port: self.port });
        }
        inner.threading = threading;
        Ok(())
    }

    /// Install `fallback` if the engine is unstarted and has no threading
    /// parameters of its own. Returns whether it was applied.
    pub(crate) fn apply_fallback_threading(&self, fallback: &ThreadingParameters) -> bool {
        let mut inner = self.lock();
        if inner.state != EngineState::Unstarted || inner.threading.is_some() {
            return false;
        }
        inner.threading = Some(fallback.clone());
        true
    }

    /// Mark the engine stopped if it is idle or `force` is set.
    ///
    /// The caller must follow a `true` result with [`stop`](Self::stop);
    /// from here on registrations fail with `EngineStopped`.
    pub(crate) fn try_retire(&self, force: bool) -> bool {
        let mut inner = self.lock();
        if inner.servants > 0 && !force {
            return false;
        }
        inner.state = EngineState::Stopped;
        true
    }

    fn check_url(&self, url: &Url) -> Result<Protocol, EngineError> {
        let (protocol, url_port) = Protocol::of_url(url)?;
        if url_port != self.port {
            return Err(EngineError::PortMismatch {
                url: url.to_string(),
                url_port,
                engine_port: self.port,
            });
        }
        Ok(protocol)
    }

    fn targets_this_port(&self, url: &Url) -> bool {
        url.port_or_known_default() == Some(self.port)
    }

    fn lock(&self) -> MutexGuard<'_, EngineInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn inner_mut(&mut self) -> &mut EngineInner {
        self.inner.get_mut().unwrap_or_else(PoisonError::into_inner)
    }
}

impl fmt::Debug for ListenerEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.lock();
        f.debug_struct("ListenerEngine")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("state", &inner.state)
            .field("protocol", &Protocol::for_tls(inner.tls.as_ref()))
            .field("servants", &inner.servants)
            .finish_non_exhaustive()
    }
}
