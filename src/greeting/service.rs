//! Periodic greeting generator.
//!
//! `greet` returns an unbounded stream: one greeting per interval, forever.
//! The only way to stop it is to drop the stream, which also drops its timer.

use std::time::Duration;

use chrono::{SecondsFormat, Utc};
use futures_util::stream::{Stream, StreamExt};
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_stream::wrappers::IntervalStream;

use crate::greeting::types::{GreetingRequest, GreetingResponse};

#[derive(Debug, Clone)]
pub struct GreetingService {
    interval: Duration,
}

impl GreetingService {
    pub fn new(interval: Duration) -> Self {
        Self { interval }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Emit `Hello <name> @ <timestamp>` once per interval, starting one
    /// interval from now.
    pub fn greet(
        &self,
        request: GreetingRequest,
    ) -> impl Stream<Item = GreetingResponse> + Send + 'static {
        let mut ticker = interval_at(Instant::now() + self.interval, self.interval);
        // A slow consumer must never see two greetings closer than one interval.
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        tracing::debug!(name = %request.name, interval = ?self.interval, "Greeting stream opened");
        IntervalStream::new(ticker).map(move |_| {
            GreetingResponse::new(format!(
                "Hello {} @ {}",
                request.name,
                Utc::now().to_rfc3339_opts(SecondsFormat::AutoSi, true)
            ))
        })
    }
}

impl Default for GreetingService {
    fn default() -> Self {
        Self::new(Duration::from_secs(1))
    }
}
