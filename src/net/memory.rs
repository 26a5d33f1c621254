//! In-process container.
//!
//! Serves requests handed to it directly instead of over sockets. Useful for
//! embedding the registry without binding ports, and for exercising engines
//! and the registry in tests. Only one container per port may be listening
//! at a time, mirroring the OS rule for real sockets.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use arc_swap::ArcSwapOption;
use axum::{
    body::Body,
    http::{Request, StatusCode},
    response::{IntoResponse, Response},
};
use dashmap::DashMap;

use crate::engine::Protocol;
use crate::http::Dispatcher;
use crate::net::container::{ContainerError, ContainerFactory, ListenerSpec, ServerContainer};

/// Observable state of one in-process port.
#[derive(Debug)]
pub struct MemoryListener {
    port: u16,
    listening: AtomicBool,
    starts: AtomicUsize,
    stops: AtomicUsize,
    protocol: Mutex<Option<Protocol>>,
    dispatcher: ArcSwapOption<Dispatcher>,
}

impl MemoryListener {
    fn new(port: u16) -> Self {
        Self {
            port,
            listening: AtomicBool::new(false),
            starts: AtomicUsize::new(0),
            stops: AtomicUsize::new(0),
            protocol: Mutex::new(None),
            dispatcher: ArcSwapOption::empty(),
        }
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn is_listening(&self) -> bool {
        self.listening.load(Ordering::SeqCst)
    }

    /// Number of successful starts over the port's lifetime.
    pub fn start_count(&self) -> usize {
        self.starts.load(Ordering::SeqCst)
    }

    pub fn stop_count(&self) -> usize {
        self.stops.load(Ordering::SeqCst)
    }

    /// Protocol of the most recent start.
    pub fn protocol(&self) -> Option<Protocol> {
        *self.protocol.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Deliver a request. `None` when nothing is listening on the port.
    pub async fn send(&self, request: Request<Body>) -> Option<Response> {
        if !self.is_listening() {
            return None;
        }
        let response = match self.dispatcher.load_full() {
            Some(dispatcher) => dispatcher.dispatch(request).await,
            None => (StatusCode::SERVICE_UNAVAILABLE, "Listener not ready").into_response(),
        };
        Some(response)
    }
}

#[derive(Debug, Default)]
struct MemoryState {
    listeners: DashMap<u16, Arc<MemoryListener>>,
    failing_ports: Mutex<HashSet<u16>>,
}

/// Factory for in-process containers. Clones share state.
#[derive(Debug, Clone, Default)]
pub struct MemoryContainerFactory {
    state: Arc<MemoryState>,
}

impl MemoryContainerFactory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every start on `port` fail with `AddrInUse` until cleared.
    pub fn fail_port(&self, port: u16) {
        self.failing_ports().insert(port);
    }

    pub fn clear_failure(&self, port: u16) {
        self.failing_ports().remove(&port);
    }

    pub fn listener(&self, port: u16) -> Option<Arc<MemoryListener>> {
        self.state.listeners.get(&port).map(|l| Arc::clone(l.value()))
    }

    pub fn is_listening(&self, port: u16) -> bool {
        self.listener(port).is_some_and(|l| l.is_listening())
    }

    /// Send a `GET` for `path` to `port`.
    pub async fn get(&self, port: u16, path: &str) -> Option<Response> {
        let listener = self.listener(port)?;
        let request = Request::builder().uri(path).body(Body::empty()).ok()?;
        listener.send(request).await
    }

    fn failing_ports(&self) -> std::sync::MutexGuard<'_, HashSet<u16>> {
        self.state
            .failing_ports
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

impl ContainerFactory for MemoryContainerFactory {
    fn create(&self, _host: &str, port: u16) -> Box<dyn ServerContainer> {
        let listener = self
            .state
            .listeners
            .entry(port)
            .or_insert_with(|| Arc::new(MemoryListener::new(port)))
            .clone();
        Box::new(MemoryContainer {
            listener,
            factory: self.clone(),
            owns_port: AtomicBool::new(false),
        })
    }
}

struct MemoryContainer {
    listener: Arc<MemoryListener>,
    factory: MemoryContainerFactory,
    owns_port: AtomicBool,
}

impl ServerContainer for MemoryContainer {
    fn start(&self, spec: &ListenerSpec) -> Result<(), ContainerError> {
        if self.factory.failing_ports().contains(&spec.port) {
            return Err(ContainerError::Bind(std::io::Error::new(
                std::io::ErrorKind::AddrInUse,
                format!("port {} is unavailable", spec.port),
            )));
        }
        if self
            .listener
            .listening
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return Err(ContainerError::Bind(std::io::Error::new(
                std::io::ErrorKind::AddrInUse,
                format!("port {} is already listening", spec.port),
            )));
        }
        self.owns_port.store(true, Ordering::SeqCst);
        *self
            .listener
            .protocol
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(spec.protocol);
        self.listener.starts.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn install_dispatcher(&self, dispatcher: Dispatcher) {
        self.listener.dispatcher.store(Some(Arc::new(dispatcher)));
    }

    fn stop(&self) -> Result<(), ContainerError> {
        if self.owns_port.swap(false, Ordering::SeqCst) {
            self.listener.dispatcher.store(None);
            self.listener.listening.store(false, Ordering::SeqCst);
            self.listener.stops.fetch_add(1, Ordering::SeqCst);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::net::container::ListenerOptions;
    use crate::routing::ContextRouter;

    fn spec(port: u16) -> ListenerSpec {
        ListenerSpec {
            host: "localhost".to_string(),
            port,
            protocol: Protocol::Http,
            tls: None,
            threading: None,
            options: ListenerOptions::default(),
        }
    }

    #[tokio::test]
    async fn requests_before_dispatcher_are_unavailable() {
        let factory = MemoryContainerFactory::new();
        let container = factory.create("localhost", 7001);
        assert!(factory.get(7001, "/x").await.is_none());

        container.start(&spec(7001)).unwrap();
        let response = factory.get(7001, "/x").await.unwrap();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);

        container.install_dispatcher(Dispatcher::new(7001, Arc::new(ContextRouter::new())));
        let response = factory.get(7001, "/x").await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn second_container_cannot_take_listening_port() {
        let factory = MemoryContainerFactory::new();
        let first = factory.create("localhost", 7002);
        let second = factory.create("localhost", 7002);
        first.start(&spec(7002)).unwrap();

        assert!(matches!(second.start(&spec(7002)), Err(ContainerError::Bind(_))));
        // Stopping a container that never owned the port leaves it alone.
        second.stop().unwrap();
        assert!(factory.is_listening(7002));

        first.stop().unwrap();
        first.stop().unwrap();
        assert!(!factory.is_listening(7002));
        assert_eq!(factory.listener(7002).unwrap().stop_count(), 1);
    }

    #[test]
    fn failing_port_rejects_start() {
        let factory = MemoryContainerFactory::new();
        factory.fail_port(7003);
        let container = factory.create("localhost", 7003);
        assert!(container.start(&spec(7003)).is_err());

        factory.clear_failure(7003);
        assert!(container.start(&spec(7003)).is_ok());
        assert_eq!(factory.listener(7003).unwrap().protocol(), Some(Protocol::Http));
    }
}
