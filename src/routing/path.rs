//! Registered context paths.
//!
//! # Responsibilities
//! - Normalize URL paths into the canonical form stored by the router
//! - Carry the match mode a handler was registered with
//! - Derive the parent context of a path
//!
//! # Design Decisions
//! - Always a leading `/`, never a trailing `/` (except the root itself)
//! - Repeated slashes collapse into one
//! - Request paths are normalized the same way before lookup, so
//!   `/hello/test/` and `/hello//test` reach a servant registered at
//!   `/hello/test` (and vice versa)
//! - Matching is case-sensitive

use std::fmt;

/// How a registered path matches inbound request paths.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum MatchMode {
    /// Request path must equal the registered path.
    Exact,
    /// Request path equals the registered path or lies below it.
    #[default]
    PrefixDescendant,
}

impl MatchMode {
    /// Match mode for a handler's `exact` flag.
    pub fn from_exact(exact: bool) -> Self {
        if exact {
            MatchMode::Exact
        } else {
            MatchMode::PrefixDescendant
        }
    }
}

impl fmt::Display for MatchMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MatchMode::Exact => write!(f, "exact"),
            MatchMode::PrefixDescendant => write!(f, "prefix"),
        }
    }
}

/// A normalized path plus its match mode. Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RegisteredPath {
    path: String,
    mode: MatchMode,
}

impl RegisteredPath {
    pub fn new(path: &str, mode: MatchMode) -> Self {
        Self {
            path: normalize(path),
            mode,
        }
    }

    pub fn as_str(&self) -> &str {
        &self.path
    }

    pub fn mode(&self) -> MatchMode {
        self.mode
    }

    /// Returns true if `request_path` is served by this registration.
    pub fn matches(&self, request_path: &str) -> bool {
        if request_path == self.path {
            return true;
        }
        match self.mode {
            MatchMode::Exact => false,
            MatchMode::PrefixDescendant => is_descendant(request_path, &self.path),
        }
    }
}

impl fmt::Display for RegisteredPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.path)
    }
}

/// Normalize a raw URL path.
pub fn normalize(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len() + 1);
    for segment in raw.split('/').filter(|s| !s.is_empty()) {
        out.push('/');
        out.push_str(segment);
    }
    if out.is_empty() {
        out.push('/');
    }
    out
}

/// Parent context of a normalized path: its last segment removed.
///
/// `/a/b` → `/a`, `/a` → `/`, and the root has no parent.
pub fn parent(path: &str) -> Option<&str> {
    if path == "/" {
        return None;
    }
    match path.rfind('/') {
        Some(0) => Some("/"),
        Some(idx) => Some(&path[..idx]),
        None => None,
    }
}

/// True when `path` is a strict sub-path of `base`.
pub fn is_descendant(path: &str, base: &str) -> bool {
    if base == "/" {
        return path.len() > 1 && path.starts_with('/');
    }
    path.len() > base.len() && path.starts_with(base) && path.as_bytes()[base.len()] == b'/'
}

/// Candidate registered paths that could serve `request_path`, longest first:
/// the path itself, then every ancestor up to the root.
pub(crate) fn lookup_candidates(request_path: &str) -> impl Iterator<Item = &str> {
    let ancestors = request_path
        .rmatch_indices('/')
        .map(move |(idx, _)| if idx == 0 { "/" } else { &request_path[..idx] })
        .filter(move |candidate| candidate.len() < request_path.len());
    std::iter::once(request_path).chain(ancestors)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize() {
        assert_eq!(normalize("/hello/test"), "/hello/test");
        assert_eq!(normalize("hello/test/"), "/hello/test");
        assert_eq!(normalize("//hello///test"), "/hello/test");
        assert_eq!(normalize(""), "/");
        assert_eq!(normalize("/"), "/");
    }

    #[test]
    fn test_parent() {
        assert_eq!(parent("/a/b/c"), Some("/a/b"));
        assert_eq!(parent("/a/b"), Some("/a"));
        assert_eq!(parent("/a"), Some("/"));
        assert_eq!(parent("/"), None);
    }

    #[test]
    fn test_descendant() {
        assert!(is_descendant("/a/b", "/a"));
        assert!(is_descendant("/a/b/c", "/a"));
        assert!(!is_descendant("/ab", "/a"));
        assert!(!is_descendant("/a", "/a"));
        assert!(is_descendant("/x", "/"));
        assert!(!is_descendant("/", "/"));
    }

    #[test]
    fn test_exact_and_prefix_matching() {
        let exact = RegisteredPath::new("/hello/test", MatchMode::Exact);
        assert!(exact.matches("/hello/test"));
        assert!(!exact.matches("/hello/test/x"));

        let prefix = RegisteredPath::new("/hello/test", MatchMode::PrefixDescendant);
        assert!(prefix.matches("/hello/test"));
        assert!(prefix.matches("/hello/test/x/y"));
        assert!(!prefix.matches("/hello/testing"));
        assert!(!prefix.matches("/hello2/test"));
    }

    #[test]
    fn test_lookup_candidates_longest_first() {
        let all: Vec<&str> = lookup_candidates("/a/b/c").collect();
        assert_eq!(all, vec!["/a/b/c", "/a/b", "/a", "/"]);

        let root: Vec<&str> = lookup_candidates("/").collect();
        assert_eq!(root, vec!["/"]);

        let trailing: Vec<&str> = lookup_candidates("/a/").collect();
        assert_eq!(trailing, vec!["/a/", "/a", "/"]);
    }
}
