//! Shared utilities for integration tests.

#![allow(dead_code)]

use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use axum::{
    body::Body,
    http::Request,
    response::{IntoResponse, Response},
};
use futures_util::future::BoxFuture;
use url::Url;

use port_registry::config::TlsConfig;
use port_registry::http::{FnHandler, Handler, StaticHandler};
use port_registry::routing::MatchMode;

pub fn url(scheme: &str, port: u16, path: &str) -> Url {
    Url::parse(&format!("{scheme}://127.0.0.1:{port}{path}")).unwrap()
}

pub fn prefix_handler(body: &'static str) -> Arc<dyn Handler> {
    Arc::new(StaticHandler::new(body, MatchMode::PrefixDescendant))
}

pub fn exact_handler(body: &'static str) -> Arc<dyn Handler> {
    Arc::new(StaticHandler::new(body, MatchMode::Exact))
}

/// Handler that answers with the request path it saw.
pub fn echo_handler(mode: MatchMode) -> Arc<dyn Handler> {
    Arc::new(FnHandler::new(mode, |req: Request<Body>| async move {
        req.uri().path().to_string().into_response()
    }))
}

/// Handler that counts teardown notifications.
pub struct TrackedHandler {
    pub removed: AtomicUsize,
}

impl TrackedHandler {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            removed: AtomicUsize::new(0),
        })
    }

    pub fn removals(&self) -> usize {
        self.removed.load(Ordering::SeqCst)
    }
}

impl Handler for TrackedHandler {
    fn match_mode(&self) -> MatchMode {
        MatchMode::PrefixDescendant
    }

    fn invoke(&self, _request: Request<Body>) -> BoxFuture<'static, Response> {
        Box::pin(async { "tracked".into_response() })
    }

    fn on_removed(&self) {
        self.removed.fetch_add(1, Ordering::SeqCst);
    }
}

pub async fn body_string(response: Response) -> String {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

/// Client without connection pooling so released ports close promptly.
pub fn client() -> reqwest::Client {
    reqwest::Client::builder()
        .pool_max_idle_per_host(0)
        .no_proxy()
        .danger_accept_invalid_certs(true)
        .timeout(Duration::from_secs(5))
        .build()
        .unwrap()
}

/// Write a self-signed certificate for `localhost`/`127.0.0.1` into `dir`.
pub fn write_self_signed(dir: &Path) -> TlsConfig {
    let rcgen::CertifiedKey { cert, key_pair } = rcgen::generate_simple_self_signed(vec![
        "localhost".to_string(),
        "127.0.0.1".to_string(),
    ])
    .unwrap();
    let cert_path = dir.join("server.pem");
    let key_path = dir.join("server.key");
    std::fs::write(&cert_path, cert.pem()).unwrap();
    std::fs::write(&key_path, key_pair.serialize_pem()).unwrap();
    TlsConfig::new(
        cert_path.to_string_lossy().into_owned(),
        key_path.to_string_lossy().into_owned(),
    )
}

/// Poll until a TCP connect to `port` succeeds.
pub async fn wait_for_port(port: u16) {
    for _ in 0..50 {
        if tokio::net::TcpStream::connect(("127.0.0.1", port)).await.is_ok() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    panic!("port {port} never accepted connections");
}

/// Poll until a TCP connect to `port` fails.
pub async fn wait_for_release(port: u16) {
    for _ in 0..100 {
        if tokio::net::TcpStream::connect(("127.0.0.1", port)).await.is_err() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    panic!("port {port} was never released");
}
