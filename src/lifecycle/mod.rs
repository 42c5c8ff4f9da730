//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (startup.rs):
//!     Load config → Validate → Logging/metrics → Bind listeners
//!
//! Ready (seed.rs):
//!     Listeners bound → SampleDataSeeder runs detached
//!
//! Shutdown (shutdown.rs, signals.rs):
//!     SIGTERM/SIGINT → Shutdown::trigger → servers stop accepting
//!     → drain with deadline → exit
//! ```
//!
//! # Design Decisions
//! - Ordered startup: config first, then core, then listeners
//! - Shutdown has timeout: forced exit after deadline

pub mod seed;
pub mod shutdown;
pub mod signals;
pub mod startup;

pub use seed::{PipelineContext, SampleDataSeeder, SeedError, SeedReport};
pub use shutdown::Shutdown;
pub use startup::StartupError;
