//! Reservation service HTTP frontage.
//!
//! Serves `GET /reservations` as newline-delimited JSON straight from the
//! store's lazy find-all; rows are written as they are read.

use axum::{extract::State, response::Response, routing::get, Router};
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower_http::trace::TraceLayer;

use crate::http::request::{propagate_request_id_layer, set_request_id_layer};
use crate::http::response;
use crate::lifecycle::shutdown::signalled;
use crate::observability::metrics;
use crate::reservations::ReservationRepository;

/// HTTP server for the reservation service.
pub struct ReservationServer {
    router: Router,
}

impl ReservationServer {
    pub fn new(repository: ReservationRepository) -> Self {
        let router = Router::new()
            .route("/reservations", get(all_reservations))
            .with_state(repository)
            .layer(propagate_request_id_layer())
            .layer(TraceLayer::new_for_http())
            .layer(set_request_id_layer());
        Self { router }
    }

    /// Run the server until `shutdown` fires.
    pub async fn run(
        self,
        listener: TcpListener,
        shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "Reservation frontage listening");

        axum::serve(listener, self.router)
            .with_graceful_shutdown(signalled(shutdown))
            .await?;

        tracing::info!("Reservation frontage stopped");
        Ok(())
    }
}

async fn all_reservations(State(repository): State<ReservationRepository>) -> Response {
    let timer = metrics::RequestTimer::start("reservations");
    response::ndjson(metrics::timed(repository.find_all(), timer))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lifecycle::Shutdown;
    use crate::reservations::repository::tests::memory_repository;
    use crate::reservations::{Reservation, ReservationClient};
    use futures_util::TryStreamExt;
    use std::time::Duration;

    #[tokio::test]
    async fn client_reads_what_the_frontage_serves() {
        let repository = memory_repository().await;
        for name in ["Dhaval", "Bhavin"] {
            repository.save(Reservation::new(name)).await.unwrap();
        }

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let shutdown = Shutdown::new();
        tokio::spawn(ReservationServer::new(repository).run(listener, shutdown.subscribe()));

        let client = ReservationClient::new(&format!("http://{addr}"), Duration::from_secs(2)).unwrap();
        let mut names: Vec<String> = client
            .get_all_reservations()
            .map_ok(|r| r.name)
            .try_collect()
            .await
            .unwrap();
        names.sort();
        assert_eq!(names, vec!["Bhavin".to_string(), "Dhaval".to_string()]);
    }
}
