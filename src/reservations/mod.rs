//! Reservation subsystem.
//!
//! # Data Flow
//! ```text
//! Reservation service side:
//!     repository.rs (pooled SQLite store: save / find_all / delete_all)
//!     → service.rs (validated, transactional batch saves)
//!     → http::backend (GET /reservations as NDJSON)
//!
//! Gateway side:
//!     client.rs (GET /reservations → lazy stream of Reservation)
//! ```

pub mod client;
pub mod model;
pub mod repository;
pub mod service;

pub use client::{ClientError, ReservationClient};
pub use model::{validate_name, InvalidNameError, Reservation};
pub use repository::{ReservationRepository, StoreError};
pub use service::{ReservationError, ReservationService};
