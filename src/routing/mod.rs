//! Reverse-proxy routing subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming Request (host, path)
//!     → router.rs (route lookup, first match wins)
//!     → matcher.rs (evaluate host/path conditions)
//!     → Return: matched ProxyRoute or None
//!
//! Route Compilation (at startup):
//!     RouteConfig[]
//!     → Compile matchers and header filters
//!     → Freeze as immutable ProxyRouter
//! ```
//!
//! # Design Decisions
//! - Routes compiled at startup, immutable at runtime
//! - No regex in hot path
//! - Deterministic: same input always matches same route

pub mod matcher;
pub mod router;

pub use router::{ProxyRoute, ProxyRouter, RouteError};
