//! Per-engine context router.
//!
//! # Responsibilities
//! - Store `path -> handler` registrations for one listener
//! - Reject conflicting registrations before mutating anything
//! - Resolve inbound request paths to a handler
//!
//! # Design Decisions
//! - Backed by a `DashMap`: lookups take a shard read lock only, so dispatch
//!   never waits on a registration for an unrelated key
//! - Writers serialize on a small mutex so check-then-insert is atomic with
//!   respect to other writers
//! - Resolution normalizes the request path the way registration does, then
//!   walks it from longest to shortest ancestor: an exact hit wins, then the
//!   longest prefix registration
//! - Registering over an existing path (only possible with the conflict
//!   check off) replaces the route and hands the displaced handler back

use std::sync::{Arc, Mutex, PoisonError};

use dashmap::DashMap;

use crate::http::Handler;
use crate::routing::conflict::{self, Conflict};
use crate::routing::path::{lookup_candidates, normalize, RegisteredPath};

/// A registered handler together with the path it owns.
#[derive(Clone)]
pub struct Route {
    pub path: RegisteredPath,
    pub handler: Arc<dyn Handler>,
}

impl std::fmt::Debug for Route {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Route").field("path", &self.path).finish_non_exhaustive()
    }
}

/// Concurrent map of context paths to handlers.
#[derive(Debug, Default)]
pub struct ContextRouter {
    routes: DashMap<String, Route>,
    write_lock: Mutex<()>,
}

impl ContextRouter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `handler` at `path`, running the conflict check when `check_conflicts` is set.
    ///
    /// Returns the handler previously registered at the same path, if any.
    pub fn register(
        &self,
        path: RegisteredPath,
        handler: Arc<dyn Handler>,
        check_conflicts: bool,
    ) -> Result<Option<Arc<dyn Handler>>, Conflict> {
        let _guard = self.write_lock.lock().unwrap_or_else(PoisonError::into_inner);

        if check_conflicts {
            conflict::check(path.as_str(), self.routes.iter().map(|r| r.key().clone()))?;
        }

        tracing::debug!(path = %path, mode = %path.mode(), "Registering context");
        let displaced = self
            .routes
            .insert(path.as_str().to_string(), Route { path, handler })
            .map(|route| route.handler);
        Ok(displaced)
    }

    /// Find the handler serving `request_path`.
    pub fn resolve(&self, request_path: &str) -> Option<Arc<dyn Handler>> {
        let request_path = normalize(request_path);
        let resolved = lookup_candidates(&request_path).find_map(|candidate| {
            self.routes
                .get(candidate)
                .filter(|route| route.path.matches(&request_path))
                .map(|route| Arc::clone(&route.handler))
        });
        resolved
    }

    /// Remove the registration for `path` (normalized before lookup).
    pub fn remove(&self, path: &str) -> Option<Arc<dyn Handler>> {
        let key = normalize(path);
        let _guard = self.write_lock.lock().unwrap_or_else(PoisonError::into_inner);
        self.routes.remove(&key).map(|(_, route)| route.handler)
    }

    /// Number of registered paths.
    pub fn count(&self) -> usize {
        self.routes.len()
    }

    /// Snapshot of the registered paths.
    pub fn paths(&self) -> Vec<RegisteredPath> {
        let mut paths: Vec<RegisteredPath> =
            self.routes.iter().map(|r| r.value().path.clone()).collect();
        paths.sort_by(|a, b| a.as_str().cmp(b.as_str()));
        paths
    }

    /// Drop every registration. Handlers are not notified.
    pub fn clear(&self) {
        let _guard = self.write_lock.lock().unwrap_or_else(PoisonError::into_inner);
        self.routes.clear();
    }
}
