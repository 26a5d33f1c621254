//! Request dispatch entry point.
//!
//! A container installs one [`Dispatcher`] per listener. Every inbound
//! request is resolved against the engine's router and handed to the
//! matching handler; unmatched paths get `404 Not Found`.

use std::sync::Arc;

use axum::{
    body::Body,
    http::{Request, StatusCode},
    response::{IntoResponse, Response},
};

use crate::routing::ContextRouter;

#[derive(Debug, Clone)]
pub struct Dispatcher {
    port: u16,
    router: Arc<ContextRouter>,
}

impl Dispatcher {
    pub fn new(port: u16, router: Arc<ContextRouter>) -> Self {
        Self { port, router }
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub async fn dispatch(&self, request: Request<Body>) -> Response {
        let handler = self.router.resolve(request.uri().path());
        match handler {
            Some(handler) => handler.invoke(request).await,
            None => {
                tracing::debug!(
                    port = self.port,
                    method = %request.method(),
                    path = %request.uri().path(),
                    "No servant registered for path"
                );
                (StatusCode::NOT_FOUND, "No servant registered for path").into_response()
            }
        }
    }
}
