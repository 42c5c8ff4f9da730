//! Circuit breaker guarding downstream streams.
//!
//! # States
//! - Closed: calls pass through, outcomes fill a count-based window
//! - Open: calls short-circuit to the fallback without touching the source
//! - Half-Open: a fixed number of probe calls decide whether to close again
//!
//! # State Transitions
//! ```text
//! Closed → Open: window holds >= minimum calls and failure rate >= threshold
//! Open → Half-Open: after the open wait duration
//! Half-Open → Closed: probe failure rate below threshold
//! Half-Open → Open: probe failure rate >= threshold
//! ```
//!
//! # Design Decisions
//! - One call is one source stream: success when it completes, failure when
//!   it errors or an element takes longer than the call timeout
//! - A stream dropped before finishing records nothing
//! - Once the source fails, the guarded stream switches irrevocably to the
//!   fallback stream; source elements already yielded stay yielded

use std::collections::VecDeque;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use dashmap::DashMap;
use futures_util::stream::{self, BoxStream, Stream, StreamExt};
use thiserror::Error;
use tokio::time::Instant;

use crate::config::schema::CircuitBreakerConfig;
use crate::observability::metrics;

/// Why a guarded call ended up on its fallback.
#[derive(Debug, Error)]
pub enum BreakerError<E> {
    #[error("circuit breaker is open")]
    Open,

    #[error("call timed out after {0:?}")]
    Timeout(Duration),

    #[error("{0}")]
    Inner(E),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BreakerState {
    Closed,
    Open,
    HalfOpen,
}

impl BreakerState {
    fn as_str(self) -> &'static str {
        match self {
            BreakerState::Closed => "closed",
            BreakerState::Open => "open",
            BreakerState::HalfOpen => "half_open",
        }
    }
}

impl fmt::Display for BreakerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug)]
struct Inner {
    state: BreakerState,
    /// Bumped on every transition so outcomes of calls admitted under an
    /// earlier state are discarded.
    generation: u64,
    /// Most recent outcomes, `true` meaning failure.
    window: VecDeque<bool>,
    opened_at: Option<Instant>,
    probes_admitted: usize,
}

#[derive(Debug)]
struct Shared {
    name: String,
    failure_rate_threshold: f32,
    sliding_window_size: usize,
    minimum_number_of_calls: usize,
    wait_in_open: Duration,
    permitted_in_half_open: usize,
    call_timeout: Option<Duration>,
    inner: Mutex<Inner>,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, Inner> {
        // The critical sections never panic, so a poisoned lock still holds
        // consistent state.
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn failure_rate(window: &VecDeque<bool>) -> f32 {
        if window.is_empty() {
            return 0.0;
        }
        let failures = window.iter().filter(|failed| **failed).count();
        failures as f32 * 100.0 / window.len() as f32
    }

    fn transition(&self, inner: &mut Inner, to: BreakerState) {
        let from = inner.state;
        inner.state = to;
        inner.generation += 1;
        inner.window.clear();
        inner.probes_admitted = 0;
        inner.opened_at = (to == BreakerState::Open).then(Instant::now);

        tracing::info!(breaker = %self.name, from = %from, to = %to, "Circuit breaker transition");
        metrics::record_breaker_transition(&self.name, to.as_str());
    }

    fn acquire(self: &Arc<Self>) -> Option<Permit> {
        let mut inner = self.lock();

        if inner.state == BreakerState::Open {
            let waited = inner
                .opened_at
                .map(|at| at.elapsed() >= self.wait_in_open)
                .unwrap_or(true);
            if !waited {
                return None;
            }
            self.transition(&mut inner, BreakerState::HalfOpen);
        }

        if inner.state == BreakerState::HalfOpen {
            if inner.probes_admitted >= self.permitted_in_half_open {
                return None;
            }
            inner.probes_admitted += 1;
        }

        Some(Permit {
            shared: Arc::clone(self),
            generation: inner.generation,
            recorded: false,
        })
    }

    fn record(&self, generation: u64, failed: bool) {
        let mut inner = self.lock();
        if inner.generation != generation {
            return;
        }

        inner.window.push_back(failed);
        match inner.state {
            BreakerState::Closed => {
                while inner.window.len() > self.sliding_window_size {
                    inner.window.pop_front();
                }
                if inner.window.len() >= self.minimum_number_of_calls
                    && Self::failure_rate(&inner.window) >= self.failure_rate_threshold
                {
                    self.transition(&mut inner, BreakerState::Open);
                }
            }
            BreakerState::HalfOpen => {
                if inner.window.len() >= self.permitted_in_half_open {
                    let next = if Self::failure_rate(&inner.window) >= self.failure_rate_threshold {
                        BreakerState::Open
                    } else {
                        BreakerState::Closed
                    };
                    self.transition(&mut inner, next);
                }
            }
            BreakerState::Open => {}
        }
    }

    fn release(&self, generation: u64) {
        let mut inner = self.lock();
        if inner.generation == generation && inner.state == BreakerState::HalfOpen {
            inner.probes_admitted = inner.probes_admitted.saturating_sub(1);
        }
    }
}

/// Admission for one call; dropping it unrecorded frees a half-open slot.
struct Permit {
    shared: Arc<Shared>,
    generation: u64,
    recorded: bool,
}

impl Permit {
    fn record(mut self, failed: bool) {
        self.recorded = true;
        self.shared.record(self.generation, failed);
    }
}

impl Drop for Permit {
    fn drop(&mut self) {
        if !self.recorded {
            self.shared.release(self.generation);
        }
    }
}

/// Named circuit breaker. Clones share state.
#[derive(Debug, Clone)]
pub struct CircuitBreaker {
    shared: Arc<Shared>,
}

impl CircuitBreaker {
    pub fn new(config: &CircuitBreakerConfig) -> Self {
        let call_timeout =
            (config.timeout_ms > 0).then(|| Duration::from_millis(config.timeout_ms));
        Self {
            shared: Arc::new(Shared {
                name: config.name.clone(),
                failure_rate_threshold: config.failure_rate_threshold,
                sliding_window_size: config.sliding_window_size.max(1),
                minimum_number_of_calls: config.minimum_number_of_calls.max(1),
                wait_in_open: Duration::from_millis(config.wait_duration_in_open_state_ms),
                permitted_in_half_open: config.permitted_calls_in_half_open_state.max(1),
                call_timeout,
                inner: Mutex::new(Inner {
                    state: BreakerState::Closed,
                    generation: 0,
                    window: VecDeque::new(),
                    opened_at: None,
                    probes_admitted: 0,
                }),
            }),
        }
    }

    pub fn name(&self) -> &str {
        &self.shared.name
    }

    pub fn state(&self) -> BreakerState {
        self.shared.lock().state
    }

    /// Forward `source` until it completes or fails; on failure (or when
    /// the breaker refuses the call) continue with `fallback(error)`.
    ///
    /// The source is never polled when the breaker is open.
    pub fn run<T, E, S, F, R>(&self, source: S, fallback: F) -> BoxStream<'static, T>
    where
        T: Send + 'static,
        E: Send + 'static,
        S: Stream<Item = Result<T, E>> + Send + 'static,
        F: FnOnce(BreakerError<E>) -> R + Send + 'static,
        R: Stream<Item = T> + Send + 'static,
    {
        let name = self.shared.name.clone();
        let call_timeout = self.shared.call_timeout;

        // The open arm consumes the fallback; the source arm keeps it for
        // the first failure.
        let (phase, fallback) = match self.shared.acquire() {
            Some(permit) => (
                Phase::Source {
                    source: source.boxed(),
                    permit,
                },
                Some(fallback),
            ),
            None => {
                tracing::debug!(breaker = %name, "Circuit open, skipping source");
                metrics::record_breaker_fallback(&name);
                (Phase::Fallback(fallback(BreakerError::Open).boxed()), None)
            }
        };

        stream::unfold(
            (phase, fallback),
            move |(mut phase, mut fallback)| {
                let name = name.clone();
                async move {
                    loop {
                        match phase {
                            Phase::Source { mut source, permit } => {
                                let next = match call_timeout {
                                    Some(limit) => tokio::time::timeout(limit, source.next())
                                        .await
                                        .map_err(|_| BreakerError::Timeout(limit)),
                                    None => Ok(source.next().await),
                                };
                                let error = match next {
                                    Ok(Some(Ok(item))) => {
                                        return Some((
                                            item,
                                            (Phase::Source { source, permit }, fallback),
                                        ));
                                    }
                                    Ok(None) => {
                                        permit.record(false);
                                        return None;
                                    }
                                    Ok(Some(Err(e))) => BreakerError::Inner(e),
                                    Err(timeout) => timeout,
                                };

                                permit.record(true);
                                drop(source);
                                let Some(fallback) = fallback.take() else {
                                    return None;
                                };
                                tracing::warn!(breaker = %name, error_kind = error.kind(), "Guarded call failed, using fallback");
                                metrics::record_breaker_fallback(&name);
                                phase = Phase::Fallback(fallback(error).boxed());
                            }
                            Phase::Fallback(mut replacement) => {
                                let item = replacement.next().await?;
                                return Some((item, (Phase::Fallback(replacement), fallback)));
                            }
                        }
                    }
                }
            },
        )
        .boxed()
    }
}

impl<E> BreakerError<E> {
    fn kind(&self) -> &'static str {
        match self {
            BreakerError::Open => "open",
            BreakerError::Timeout(_) => "timeout",
            BreakerError::Inner(_) => "inner",
        }
    }
}

enum Phase<T, E> {
    Source {
        source: BoxStream<'static, Result<T, E>>,
        permit: Permit,
    },
    Fallback(BoxStream<'static, T>),
}

/// Breakers by name, created on first use.
#[derive(Debug, Default)]
pub struct CircuitBreakerRegistry {
    breakers: DashMap<String, CircuitBreaker>,
}

impl CircuitBreakerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the breaker named `config.name`, creating it from `config` if
    /// it does not exist yet.
    pub fn breaker(&self, config: &CircuitBreakerConfig) -> CircuitBreaker {
        self.breakers
            .entry(config.name.clone())
            .or_insert_with(|| CircuitBreaker::new(config))
            .clone()
    }

    pub fn get(&self, name: &str) -> Option<CircuitBreaker> {
        self.breakers.get(name).map(|entry| entry.clone())
    }
}
