//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Downstream stream (e.g. reservation client)
//!     → circuit_breaker.rs (admit or short-circuit, time each element)
//!     → on failure: fallback stream replaces the rest of the source
//! ```
//!
//! # Design Decisions
//! - Partial failure becomes a degraded but successful response only here
//! - Breakers are named and shared through `CircuitBreakerRegistry`

pub mod circuit_breaker;

pub use circuit_breaker::{BreakerError, BreakerState, CircuitBreaker, CircuitBreakerRegistry};
