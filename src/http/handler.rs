//! The handler capability registered on an engine.
//!
//! # Responsibilities
//! - Define what a servant exposes to the router (match mode, invoke)
//! - Provide teardown notification on removal
//! - Ship two simple implementations: fixed responses and async closures
//!
//! # Design Decisions
//! - Handlers are shared as `Arc<dyn Handler>`; identity is pointer identity
//! - `invoke` returns a boxed `'static` future so dispatch can drop router locks first

use std::future::Future;
use std::sync::Arc;

use axum::{
    body::Body,
    http::{header, HeaderValue, Request, StatusCode},
    response::{IntoResponse, Response},
};
use futures_util::future::BoxFuture;

use crate::routing::MatchMode;

/// A registered owner of one URL path on an engine.
pub trait Handler: Send + Sync + 'static {
    /// How this handler's path matches inbound requests.
    fn match_mode(&self) -> MatchMode;

    /// Serve one routed request.
    fn invoke(&self, request: Request<Body>) -> BoxFuture<'static, Response>;

    /// Called once after the handler has been removed from its engine.
    fn on_removed(&self) {}
}

/// Responds to every request with the same body.
#[derive(Debug, Clone)]
pub struct StaticHandler {
    body: Arc<str>,
    content_type: HeaderValue,
    mode: MatchMode,
}

impl StaticHandler {
    pub fn new(body: impl Into<Arc<str>>, mode: MatchMode) -> Self {
        Self {
            body: body.into(),
            content_type: HeaderValue::from_static("text/plain; charset=utf-8"),
            mode,
        }
    }

    /// Override the `Content-Type` header. Invalid values keep the default.
    pub fn with_content_type(mut self, content_type: &str) -> Self {
        match HeaderValue::from_str(content_type) {
            Ok(value) => self.content_type = value,
            Err(_) => {
                tracing::warn!(content_type = %content_type, "Ignoring invalid content type");
            }
        }
        self
    }

    pub fn body(&self) -> &str {
        &self.body
    }
}

impl Handler for StaticHandler {
    fn match_mode(&self) -> MatchMode {
        self.mode
    }

    fn invoke(&self, _request: Request<Body>) -> BoxFuture<'static, Response> {
        let body = Arc::clone(&self.body);
        let content_type = self.content_type.clone();
        Box::pin(async move {
            (
                StatusCode::OK,
                [(header::CONTENT_TYPE, content_type)],
                body.to_string(),
            )
                .into_response()
        })
    }
}

/// Adapts an async closure into a [`Handler`].
pub struct FnHandler<F> {
    mode: MatchMode,
    f: F,
}

impl<F, Fut> FnHandler<F>
where
    F: Fn(Request<Body>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Response> + Send + 'static,
{
    pub fn new(mode: MatchMode, f: F) -> Self {
        Self { mode, f }
    }
}

impl<F, Fut> Handler for FnHandler<F>
where
    F: Fn(Request<Body>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Response> + Send + 'static,
{
    fn match_mode(&self) -> MatchMode {
        self.mode
    }

    fn invoke(&self, request: Request<Body>) -> BoxFuture<'static, Response> {
        Box::pin((self.f)(request))
    }
}
