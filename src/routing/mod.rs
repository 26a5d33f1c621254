//! Routing subsystem.
//!
//! # Data Flow
//! ```text
//! Registration (per engine):
//!     url.path + handler match mode
//!     → path.rs (normalize into RegisteredPath)
//!     → conflict.rs (duplicate / parent / child check, unless bypassed)
//!     → router.rs (atomic insert)
//!
//! Dispatch (container worker threads):
//!     request path
//!     → router.rs (exact hit, then longest ancestor in prefix mode)
//!     → Return: handler or NotFound
//! ```
//!
//! # Design Decisions
//! - Conflicts are rejected at registration time, never at dispatch time
//! - No regex: exact and segment-prefix matching only
//! - Deterministic: same path set always resolves the same way

pub mod conflict;
pub mod path;
pub mod router;

pub use conflict::{Conflict, ConflictKind};
pub use path::{MatchMode, RegisteredPath};
pub use router::{ContextRouter, Route};
