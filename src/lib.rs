//! Reactive microservice mesh.
//!
//! A gateway that composes two downstream transports into long-lived output
//! streams, a reservation service backing it, and a bulk processing demo.
//!
//! # Architecture Overview
//!
//! ```text
//!                 ┌──────────────────────── gateway ─────────────────────────┐
//!  GET /greetings │ http::server ──► greeting::GreetingClient ──► rpc::client ├──┐
//!  GET /ws/...    │ http::websocket ──► greeting::GreetingService            │  │ WebSocket
//!  GET /res/names │ resilience::CircuitBreaker ──► reservations::client      ├─┐│ JSON frames
//!  * (rules)      │ routing::ProxyRouter ──► hyper client                    ├┐││
//!                 └──────────────────────────────────────────────────────────┘│││
//!                 ┌────────────────── reservation-service ───────────────────┐│││
//!                 │ http::backend (GET /reservations, NDJSON)  ◄─────────────┼┴┘│
//!                 │ rpc::server ("greetings" → greeting::GreetingsRoute) ◄───┼──┘
//!                 │ reservations::{repository, service} ──► SQLite           │
//!                 │ lifecycle::seed (sample data once ready)                 │
//!                 └──────────────────────────────────────────────────────────┘
//! ```

// Domain
pub mod bulk;
pub mod greeting;
pub mod reservations;

// Transports
pub mod http;
pub mod routing;
pub mod rpc;

// Cross-cutting concerns
pub mod config;
pub mod lifecycle;
pub mod observability;
pub mod resilience;

pub use config::MeshConfig;
pub use http::{GatewayServer, ReservationServer};
pub use lifecycle::Shutdown;
