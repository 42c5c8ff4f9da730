//! Route matching logic.
//!
//! # Responsibilities
//! - Match the Host header, exactly or against a `*.suffix` wildcard
//! - Match the path, exactly or by `/**` prefix
//! - Combine conditions with AND semantics
//!
//! # Design Decisions
//! - Host matching is case-insensitive and ignores the port
//! - Path matching is case-sensitive
//! - No regex to guarantee O(n) matching

use axum::body::Body;
use axum::http::{header, Request};

/// Trait for matching requests against conditions.
pub trait Matcher: Send + Sync + std::fmt::Debug {
    /// Returns true if the request matches this condition.
    fn matches(&self, req: &Request<Body>) -> bool;
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum HostPattern {
    Exact(String),
    /// `*.foo.bar` stored as `.foo.bar`.
    Suffix(String),
}

/// Matches the Host header against `example.com` or `*.example.com`.
#[derive(Debug, Clone)]
pub struct HostMatcher {
    pattern: HostPattern,
}

impl HostMatcher {
    /// The pattern is normalized to lowercase for case-insensitive matching.
    pub fn new(pattern: impl Into<String>) -> Self {
        let pattern = pattern.into().to_lowercase();
        let pattern = match pattern.strip_prefix('*') {
            Some(suffix) if suffix.starts_with('.') => HostPattern::Suffix(suffix.to_string()),
            _ => HostPattern::Exact(pattern),
        };
        Self { pattern }
    }

    fn matches_host(&self, host: &str) -> bool {
        let host = host.to_lowercase();
        let host = strip_port(&host);
        match &self.pattern {
            HostPattern::Exact(expected) => host == expected,
            HostPattern::Suffix(suffix) => {
                host.len() > suffix.len() && host.ends_with(suffix.as_str())
            }
        }
    }
}

fn strip_port(host: &str) -> &str {
    // Bracketed IPv6 literals keep their colons.
    if let Some(end) = host.rfind(']') {
        return &host[..=end];
    }
    match host.rsplit_once(':') {
        Some((name, port)) if port.chars().all(|c| c.is_ascii_digit()) => name,
        _ => host,
    }
}

impl Matcher for HostMatcher {
    fn matches(&self, req: &Request<Body>) -> bool {
        req.headers()
            .get(header::HOST)
            .and_then(|h| h.to_str().ok())
            .or_else(|| req.uri().host())
            .map(|h| self.matches_host(h))
            .unwrap_or(false)
    }
}

/// Matches the request path exactly, or by prefix when the pattern ends
/// in `/**`.
#[derive(Debug, Clone)]
pub struct PathMatcher {
    path: String,
    prefix: bool,
}

impl PathMatcher {
    pub fn new(pattern: impl Into<String>) -> Self {
        let pattern = pattern.into();
        match pattern.strip_suffix("/**") {
            Some(base) => Self {
                path: base.to_string(),
                prefix: true,
            },
            None => Self {
                path: pattern,
                prefix: false,
            },
        }
    }

    fn matches_path(&self, path: &str) -> bool {
        if !self.prefix {
            return path == self.path;
        }
        match path.strip_prefix(self.path.as_str()) {
            Some(rest) => rest.is_empty() || rest.starts_with('/'),
            None => false,
        }
    }
}

impl Matcher for PathMatcher {
    fn matches(&self, req: &Request<Body>) -> bool {
        self.matches_path(req.uri().path())
    }
}

/// Combines multiple matchers with AND semantics.
#[derive(Debug)]
pub struct AndMatcher {
    matchers: Vec<Box<dyn Matcher>>,
}

impl AndMatcher {
    pub fn new(matchers: Vec<Box<dyn Matcher>>) -> Self {
        Self { matchers }
    }
}

impl Matcher for AndMatcher {
    fn matches(&self, req: &Request<Body>) -> bool {
        // All matchers must pass (AND)
        self.matchers.iter().all(|m| m.matches(req))
    }
}
