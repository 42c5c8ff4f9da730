//! Fixed-lane parallel processor.
//!
//! # Responsibilities
//! - Deal items round-robin over N logical lanes
//! - Run the items on a dedicated rayon pool of N named threads
//! - Count per-item outcomes without letting one failure stop the rest
//!
//! # Design Decisions
//! - The pool is owned by the processor, not rayon's global pool, so the
//!   lane count is exact and threads are named `lane-{i}`
//! - A panicking item is caught and counted as a failure
//! - No ordering guarantee across lanes

use std::fmt::Display;
use std::ops::Add;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use rayon::prelude::*;
use rayon::{ThreadPool, ThreadPoolBuildError, ThreadPoolBuilder};
use thiserror::Error;

use crate::observability::metrics;

#[derive(Debug, Error)]
pub enum BulkError {
    #[error("failed to start lane pool: {0}")]
    Pool(#[from] ThreadPoolBuildError),
}

/// Outcome counts of one `process` call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BulkReport {
    pub processed: usize,
    pub failed: usize,
}

impl BulkReport {
    pub fn total(&self) -> usize {
        self.processed + self.failed
    }
}

impl Add for BulkReport {
    type Output = BulkReport;

    fn add(self, other: BulkReport) -> BulkReport {
        BulkReport {
            processed: self.processed + other.processed,
            failed: self.failed + other.failed,
        }
    }
}

#[derive(Debug, Clone)]
pub struct BulkProcessor {
    lanes: usize,
    pool: Arc<ThreadPool>,
}

impl BulkProcessor {
    /// `lanes` is clamped to at least one.
    pub fn new(lanes: usize) -> Result<Self, BulkError> {
        let lanes = lanes.max(1);
        let pool = ThreadPoolBuilder::new()
            .num_threads(lanes)
            .thread_name(|i| format!("lane-{i}"))
            .build()?;
        Ok(Self {
            lanes,
            pool: Arc::new(pool),
        })
    }

    pub fn lanes(&self) -> usize {
        self.lanes
    }

    /// Apply `op(lane, item)` to every item, blocking until all are done.
    /// Item `i` is assigned lane `i % lanes`.
    pub fn process<T, F, E>(&self, items: Vec<T>, op: F) -> BulkReport
    where
        T: Send,
        F: Fn(usize, T) -> Result<(), E> + Sync,
        E: Display,
    {
        let total = items.len();
        let lanes = self.lanes;

        tracing::info!(items = total, lanes, "Bulk processing started");
        let report = self.pool.install(|| {
            items
                .into_par_iter()
                .enumerate()
                .map(|(index, item)| run_item(index % lanes, item, &op))
                .reduce(BulkReport::default, Add::add)
        });

        tracing::info!(processed = report.processed, failed = report.failed, "Bulk processing finished");
        report
    }
}

fn run_item<T, F, E>(lane: usize, item: T, op: &F) -> BulkReport
where
    F: Fn(usize, T) -> Result<(), E>,
    E: Display,
{
    match panic::catch_unwind(AssertUnwindSafe(|| op(lane, item))) {
        Ok(Ok(())) => {
            metrics::record_bulk_item("processed");
            BulkReport { processed: 1, failed: 0 }
        }
        Ok(Err(e)) => {
            tracing::warn!(lane, error = %e, "Item failed");
            metrics::record_bulk_item("failed");
            BulkReport { processed: 0, failed: 1 }
        }
        Err(_) => {
            tracing::error!(lane, "Item panicked");
            metrics::record_bulk_item("failed");
            BulkReport { processed: 0, failed: 1 }
        }
    }
}
