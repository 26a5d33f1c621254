//! Path ownership conflict detection.
//!
//! A candidate path `P` conflicts with an existing path `R` when:
//! - `P == R` (duplicate registration)
//! - `P == parent(R)` (parent context registered under an owned child)
//! - `R == parent(P)` (child registered under an owned parent context)
//!
//! Siblings under the same parent never conflict. Callers may bypass the
//! check entirely (see [`crate::engine::PathCheck`]); that is an escape hatch
//! for diagnostics and tests, not a normal registration path.

use std::fmt;

use thiserror::Error;

use crate::routing::path::parent;

/// Which rule a conflicting registration broke.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConflictKind {
    Duplicate,
    ParentOfExisting,
    ChildOfExisting,
}

impl fmt::Display for ConflictKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConflictKind::Duplicate => write!(f, "duplicates"),
            ConflictKind::ParentOfExisting => write!(f, "is the parent context of"),
            ConflictKind::ChildOfExisting => write!(f, "is nested directly under"),
        }
    }
}

/// A rejected registration, naming the existing path it collides with.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("context {path} {kind} registered context {existing}")]
pub struct Conflict {
    pub kind: ConflictKind,
    pub path: String,
    pub existing: String,
}

/// Check `candidate` against every existing path. Both sides must be normalized.
pub fn check<I, S>(candidate: &str, existing: I) -> Result<(), Conflict>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let candidate_parent = parent(candidate);
    for registered in existing {
        let registered = registered.as_ref();
        let kind = if candidate == registered {
            Some(ConflictKind::Duplicate)
        } else if parent(registered) == Some(candidate) {
            Some(ConflictKind::ParentOfExisting)
        } else if candidate_parent == Some(registered) {
            Some(ConflictKind::ChildOfExisting)
        } else {
            None
        };

        if let Some(kind) = kind {
            return Err(Conflict {
                kind,
                path: candidate.to_string(),
                existing: registered.to_string(),
            });
        }
    }
    Ok(())
}
