//! Bulk concurrent processing.
//!
//! # Data Flow
//! ```text
//! CardMetaData::batch(rng, n) → BulkProcessor::process (rayon pool, lane-0 … lane-N-1)
//!     → per-item op → BulkReport
//! ```

pub mod card;
pub mod processor;

pub use card::CardMetaData;
pub use processor::{BulkError, BulkProcessor, BulkReport};
