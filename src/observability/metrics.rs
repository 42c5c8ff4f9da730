//! Metrics collection and exposition.
//!
//! # Metrics
//! - `mesh_requests_total` (counter): gateway requests by endpoint, status
//! - `mesh_request_duration_seconds` (histogram): handler entry until the
//!   response body is finished or dropped
//! - `mesh_circuit_breaker_transitions_total` (counter): by breaker, target state
//! - `mesh_circuit_breaker_fallbacks_total` (counter): by breaker
//! - `mesh_rpc_streams_total` (counter): logical RPC streams by route, event
//! - `mesh_bulk_items_total` (counter): bulk items by outcome
//!
//! # Design Decisions
//! - Recording goes through the `metrics` facade; without an installed
//!   recorder every call is a no-op
//! - Prometheus exporter is opt-in via config

use std::net::SocketAddr;
use std::time::Instant;

use futures_util::stream::{self, Stream, StreamExt};
use metrics_exporter_prometheus::PrometheusBuilder;

/// Install the Prometheus exporter listening on `addr`.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics exporter listening"),
        Err(e) => tracing::error!(error = %e, "Failed to install metrics exporter"),
    }
}

pub fn record_request(endpoint: &'static str, status: u16, start: Instant) {
    metrics::counter!(
        "mesh_requests_total",
        "endpoint" => endpoint,
        "status" => status.to_string()
    )
    .increment(1);
    metrics::histogram!("mesh_request_duration_seconds", "endpoint" => endpoint)
        .record(start.elapsed().as_secs_f64());
}

/// Times one request from handler entry. The sample is recorded on drop,
/// so a timer carried by a response body covers the whole stream.
#[derive(Debug)]
pub struct RequestTimer {
    endpoint: &'static str,
    status: u16,
    start: Instant,
}

impl RequestTimer {
    pub fn start(endpoint: &'static str) -> Self {
        Self {
            endpoint,
            status: 200,
            start: Instant::now(),
        }
    }

    pub fn with_status(mut self, status: u16) -> Self {
        self.status = status;
        self
    }
}

impl Drop for RequestTimer {
    fn drop(&mut self) {
        record_request(self.endpoint, self.status, self.start);
    }
}

/// Hold `timer` until `body` ends or is dropped.
pub fn timed<S: Stream>(body: S, timer: RequestTimer) -> impl Stream<Item = S::Item> {
    stream::unfold((Box::pin(body), timer), |(mut body, timer)| async move {
        let item = body.next().await?;
        Some((item, (body, timer)))
    })
}

pub fn record_breaker_transition(breaker: &str, state: &'static str) {
    metrics::counter!(
        "mesh_circuit_breaker_transitions_total",
        "breaker" => breaker.to_string(),
        "state" => state
    )
    .increment(1);
}

pub fn record_breaker_fallback(breaker: &str) {
    metrics::counter!("mesh_circuit_breaker_fallbacks_total", "breaker" => breaker.to_string())
        .increment(1);
}

pub fn record_rpc_stream(route: &str, event: &'static str) {
    metrics::counter!(
        "mesh_rpc_streams_total",
        "route" => route.to_string(),
        "event" => event
    )
    .increment(1);
}

pub fn record_bulk_item(outcome: &'static str) {
    metrics::counter!("mesh_bulk_items_total", "outcome" => outcome).increment(1);
}
