//! Socket-backed container on axum and axum-server.
//!
//! # Responsibilities
//! - Bind the engine's port (optionally with `SO_REUSEADDR`)
//! - Serve plain HTTP or HTTPS (rustls) on the ambient tokio runtime
//! - Wrap the dispatcher with tracing, timeout, request-id and concurrency layers
//! - Gracefully stop with a bounded grace period
//!
//! # Design Decisions
//! - Binding is synchronous so registration reports bind errors immediately
//! - The dispatcher is read per request from an `ArcSwapOption`; requests
//!   that arrive before it is installed get `503`
//! - Request concurrency is capped by `ThreadingParameters::max_threads`

use std::net::{SocketAddr, ToSocketAddrs};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use arc_swap::ArcSwapOption;
use axum::{
    body::Body,
    extract::State,
    http::{header, HeaderValue, Request, StatusCode},
    response::{IntoResponse, Response},
    Router,
};
use axum_server::Handle;
use tokio::net::TcpSocket;
use tower::limit::ConcurrencyLimitLayer;
use tower_http::{
    set_header::SetResponseHeaderLayer,
    timeout::TimeoutLayer,
    trace::TraceLayer,
};
use tracing::Instrument;

use crate::config::TimeoutConfig;
use crate::http::request::{propagate_request_id_layer, set_request_id_layer};
use crate::http::Dispatcher;
use crate::net::container::{ContainerError, ContainerFactory, ListenerSpec, ServerContainer};
use crate::net::tls::load_rustls_config;

const SERVER_HEADER: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"));
const BACKLOG: u32 = 1024;

/// Timeouts applied by every container a factory creates.
#[derive(Debug, Clone)]
pub struct ContainerSettings {
    pub request_timeout: Duration,
    pub shutdown_grace: Duration,
}

impl Default for ContainerSettings {
    fn default() -> Self {
        Self::from(&TimeoutConfig::default())
    }
}

impl From<&TimeoutConfig> for ContainerSettings {
    fn from(config: &TimeoutConfig) -> Self {
        Self {
            request_timeout: Duration::from_secs(config.request_secs),
            shutdown_grace: Duration::from_secs(config.shutdown_grace_secs),
        }
    }
}

/// Creates [`AxumContainer`]s.
#[derive(Debug, Clone, Default)]
pub struct AxumContainerFactory {
    settings: ContainerSettings,
}

impl AxumContainerFactory {
    pub fn new(settings: ContainerSettings) -> Self {
        Self { settings }
    }
}

impl ContainerFactory for AxumContainerFactory {
    fn create(&self, host: &str, port: u16) -> Box<dyn ServerContainer> {
        tracing::debug!(host = %host, port, "Creating axum container");
        Box::new(AxumContainer::new(self.settings.clone()))
    }
}

/// An axum server bound to one port.
pub struct AxumContainer {
    settings: ContainerSettings,
    dispatcher: Arc<ArcSwapOption<Dispatcher>>,
    handle: Mutex<Option<Handle>>,
}

impl AxumContainer {
    pub fn new(settings: ContainerSettings) -> Self {
        Self {
            settings,
            dispatcher: Arc::new(ArcSwapOption::empty()),
            handle: Mutex::new(None),
        }
    }

    #[allow(deprecated)]
    fn build_router(&self, spec: &ListenerSpec) -> Router {
        let mut router = Router::new()
            .fallback(dispatch_handler)
            .with_state(Arc::clone(&self.dispatcher));

        if let Some(threading) = &spec.threading {
            router = router.layer(ConcurrencyLimitLayer::new(threading.max_threads));
        }
        if spec.options.send_server_version {
            router = router.layer(SetResponseHeaderLayer::if_not_present(
                header::SERVER,
                HeaderValue::from_static(SERVER_HEADER),
            ));
        }

        router
            .layer(TimeoutLayer::new(self.settings.request_timeout))
            .layer(propagate_request_id_layer())
            .layer(TraceLayer::new_for_http())
            .layer(set_request_id_layer())
    }
}

impl ServerContainer for AxumContainer {
    fn start(&self, spec: &ListenerSpec) -> Result<(), ContainerError> {
        let runtime =
            tokio::runtime::Handle::try_current().map_err(|_| ContainerError::NoRuntime)?;
        let _entered = runtime.enter();

        let addr = resolve_addr(&spec.host, spec.port).map_err(ContainerError::Bind)?;
        let listener = bind(addr, spec.options.reuse_address).map_err(ContainerError::Bind)?;
        let app = self.build_router(spec).into_make_service();
        let handle = Handle::new();

        let span = tracing::info_span!(
            "listener",
            task = spec
                .threading
                .as_ref()
                .and_then(|t| t.thread_name_prefix.as_deref())
                .unwrap_or("container"),
            port = spec.port,
        );

        match &spec.tls {
            Some(tls) => {
                let rustls = load_rustls_config(tls).map_err(ContainerError::Tls)?;
                let server = axum_server::from_tcp_rustls(listener, rustls).handle(handle.clone());
                runtime.spawn(
                    async move {
                        if let Err(e) = server.serve(app).await {
                            tracing::error!(error = %e, "Listener terminated");
                        }
                    }
                    .instrument(span),
                );
            }
            None => {
                let server = axum_server::from_tcp(listener).handle(handle.clone());
                runtime.spawn(
                    async move {
                        if let Err(e) = server.serve(app).await {
                            tracing::error!(error = %e, "Listener terminated");
                        }
                    }
                    .instrument(span),
                );
            }
        }

        tracing::info!(address = %addr, protocol = %spec.protocol, "Listener bound");
        *self.handle.lock().unwrap_or_else(PoisonError::into_inner) = Some(handle);
        Ok(())
    }

    fn install_dispatcher(&self, dispatcher: Dispatcher) {
        self.dispatcher.store(Some(Arc::new(dispatcher)));
    }

    fn stop(&self) -> Result<(), ContainerError> {
        let handle = self
            .handle
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(handle) = handle {
            handle.graceful_shutdown(Some(self.settings.shutdown_grace));
            tracing::info!(
                grace_secs = self.settings.shutdown_grace.as_secs(),
                "Listener stopping"
            );
        }
        self.dispatcher.store(None);
        Ok(())
    }
}

async fn dispatch_handler(
    State(dispatcher): State<Arc<ArcSwapOption<Dispatcher>>>,
    request: Request<Body>,
) -> Response {
    match dispatcher.load_full() {
        Some(dispatcher) => dispatcher.dispatch(request).await,
        None => (StatusCode::SERVICE_UNAVAILABLE, "Listener not ready").into_response(),
    }
}

fn resolve_addr(host: &str, port: u16) -> Result<SocketAddr, std::io::Error> {
    (host, port).to_socket_addrs()?.next().ok_or_else(|| {
        std::io::Error::new(
            std::io::ErrorKind::AddrNotAvailable,
            format!("Could not resolve {}:{}", host, port),
        )
    })
}

fn bind(addr: SocketAddr, reuse_address: bool) -> Result<std::net::TcpListener, std::io::Error> {
    let socket = if addr.is_ipv4() {
        TcpSocket::new_v4()?
    } else {
        TcpSocket::new_v6()?
    };
    socket.set_reuseaddr(reuse_address)?;
    socket.bind(addr)?;
    socket.listen(BACKLOG)?.into_std()
}
