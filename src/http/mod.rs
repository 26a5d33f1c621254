//! HTTP handling subsystem.
//!
//! # Data Flow
//! ```text
//! Container worker (accepted, parsed request)
//!     → request.rs (assign x-request-id)
//!     → dispatch.rs (resolve path on the engine's ContextRouter)
//!     → handler.rs (registered servant produces the response)
//!     → Send to client
//! ```

pub mod dispatch;
pub mod handler;
pub mod request;

pub use dispatch::Dispatcher;
pub use handler::{FnHandler, Handler, StaticHandler};
pub use request::{UuidRequestId, X_REQUEST_ID};
