//! HTTP surfaces of the mesh.
//!
//! # Data Flow
//! ```text
//! Gateway (server.rs):
//!     request.rs (assign x-request-id)
//!     → /greetings/{name}    → greeting::GreetingClient → SSE
//!     → /ws/greetings        → websocket.rs → greeting::GreetingService
//!     → /reservations/names  → reservations::ReservationClient
//!                              → resilience::CircuitBreaker → response.rs
//!     → anything else        → routing::ProxyRouter → upstream
//!
//! Reservation service (backend.rs):
//!     /reservations → reservations::ReservationRepository → response.rs (NDJSON)
//! ```

pub mod backend;
pub mod request;
pub mod response;
pub mod server;
pub mod websocket;

pub use backend::ReservationServer;
pub use request::X_REQUEST_ID;
pub use server::{GatewayError, GatewayServer, FALLBACK_NAME};
pub use websocket::{GreetingsSocketHandler, StreamHandler};
