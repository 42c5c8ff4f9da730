//! Greeting subsystem.
//!
//! # Data Flow
//! ```text
//! Reservation service:
//!     service.rs (periodic generator) → rpc::server route "greetings"
//!
//! Gateway:
//!     client.rs (GreetingClient) → rpc::client logical stream → SSE
//!     service.rs (local generator) → /ws/greetings
//! ```

pub mod client;
pub mod service;
pub mod types;

pub use client::{GreetingClient, GreetingsRoute, GREETINGS_ROUTE};
pub use service::GreetingService;
pub use types::{GreetingRequest, GreetingResponse};
