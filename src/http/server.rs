//! Gateway HTTP server.
//!
//! # Responsibilities
//! - Create the Axum router with the gateway endpoints
//! - Wire up middleware (request id, tracing, timeout)
//! - Stream remote greetings as server-sent events
//! - Serve local greetings over WebSocket
//! - Aggregate reservation names behind the circuit breaker
//! - Forward requests matching a proxy rule upstream
//!
//! # Endpoints
//! ```text
//! GET /greetings/{name}   → text/event-stream of {"message": ...}
//! GET /ws/greetings       → WebSocket, name in / greeting text out
//! GET /reservations/names → text/plain, one name per line, or "EEK!"
//! *   (proxy rules)       → upstream, 404 when no rule matches
//! ```

use std::convert::Infallible;
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::{
    body::Body,
    extract::{Path, State, WebSocketUpgrade},
    http::{header, HeaderMap, Request, StatusCode},
    response::{
        sse::{Event, KeepAlive, Sse},
        IntoResponse, Response,
    },
    routing::get,
    Router,
};
use futures_util::future;
use futures_util::stream::{self, Stream, StreamExt, TryStreamExt};
use hyper_util::{
    client::legacy::{connect::HttpConnector, Client},
    rt::TokioExecutor,
};
use thiserror::Error;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower::ServiceBuilder;
use tower_http::{timeout::TimeoutLayer, trace::TraceLayer};

use crate::config::MeshConfig;
use crate::greeting::{GreetingClient, GreetingRequest, GreetingService};
use crate::http::request::{propagate_request_id_layer, request_id, set_request_id_layer};
use crate::http::response;
use crate::http::websocket::{GreetingsSocketHandler, StreamHandler};
use crate::lifecycle::shutdown::signalled;
use crate::observability::metrics;
use crate::reservations::{ClientError, ReservationClient};
use crate::resilience::{BreakerError, CircuitBreaker, CircuitBreakerRegistry};
use crate::routing::{ProxyRouter, RouteError};

/// Single line served when the reservation names cannot be fetched.
pub const FALLBACK_NAME: &str = "EEK!";

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error(transparent)]
    Route(#[from] RouteError),

    #[error(transparent)]
    Client(#[from] ClientError),
}

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub greetings: GreetingClient,
    pub local_greetings: GreetingService,
    pub reservations: ReservationClient,
    pub breaker: CircuitBreaker,
    pub router: Arc<ProxyRouter>,
    pub client: Client<HttpConnector, Body>,
}

/// HTTP server for the gateway.
pub struct GatewayServer {
    router: Router,
}

impl GatewayServer {
    /// `greetings` is the already established RPC client; the gateway
    /// never dials it again.
    pub fn new(
        config: &MeshConfig,
        greetings: GreetingClient,
        breakers: &CircuitBreakerRegistry,
    ) -> Result<Self, GatewayError> {
        let connect_timeout = Duration::from_secs(config.timeouts.connect_secs);

        let mut connector = HttpConnector::new();
        connector.set_connect_timeout(Some(connect_timeout));
        let client = Client::builder(TokioExecutor::new()).build(connector);

        let state = AppState {
            greetings,
            local_greetings: GreetingService::new(Duration::from_millis(config.greeting.interval_ms)),
            reservations: ReservationClient::new(&config.gateway.reservations_url, connect_timeout)?,
            breaker: breakers.breaker(&config.circuit_breaker),
            router: Arc::new(ProxyRouter::new(&config.routes)?),
            client,
        };
        tracing::info!(
            routes = state.router.len(),
            breaker = %state.breaker.name(),
            "Gateway initialized"
        );

        Ok(Self {
            router: Self::build_router(config, state),
        })
    }

    /// Build the Axum router with all middleware layers.
    #[allow(deprecated)]
    fn build_router(config: &MeshConfig, state: AppState) -> Router {
        Router::new()
            .route("/greetings/{name}", get(greetings_sse))
            .route("/ws/greetings", get(greetings_ws))
            .route("/reservations/names", get(reservation_names))
            .fallback(proxy_handler)
            .with_state(state)
            .layer(
                ServiceBuilder::new()
                    .layer(set_request_id_layer())
                    .layer(TraceLayer::new_for_http())
                    .layer(propagate_request_id_layer())
                    .layer(TimeoutLayer::new(Duration::from_secs(config.timeouts.request_secs))),
            )
    }

    /// Run the server until `shutdown` fires.
    pub async fn run(
        self,
        listener: TcpListener,
        shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "Gateway listening");

        axum::serve(listener, self.router)
            .with_graceful_shutdown(signalled(shutdown))
            .await?;

        tracing::info!("Gateway stopped");
        Ok(())
    }
}

/// Remote greetings for `name`, one event per greeting. A failed RPC stream
/// simply ends the event stream.
async fn greetings_sse(
    State(state): State<AppState>,
    Path(name): Path<String>,
    headers: HeaderMap,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let timer = metrics::RequestTimer::start("greetings_sse");
    let request_id = request_id(&headers).to_string();
    tracing::info!(request_id = %request_id, name = %name, "Opening greeting event stream");

    let events = state
        .greetings
        .greet(GreetingRequest::new(name))
        .scan((), move |_, greeting| {
            let event = match greeting {
                Ok(greeting) => match Event::default().json_data(&greeting) {
                    Ok(event) => Some(Ok(event)),
                    Err(e) => {
                        tracing::error!(request_id = %request_id, error = %e, "Failed to encode greeting");
                        None
                    }
                },
                Err(e) => {
                    tracing::warn!(request_id = %request_id, error = %e, "Greeting stream failed");
                    None
                }
            };
            future::ready(event)
        });

    Sse::new(metrics::timed(events, timer)).keep_alive(KeepAlive::default())
}

async fn greetings_ws(State(state): State<AppState>, ws: WebSocketUpgrade) -> Response {
    let timer = metrics::RequestTimer::start("greetings_ws").with_status(101);
    let handler = GreetingsSocketHandler::new(state.local_greetings.clone());
    ws.on_upgrade(move |socket| async move {
        if let Err(e) = handler.handle(socket).await {
            tracing::debug!(error = %e, "Greeting session ended with error");
        }
        drop(timer);
    })
}

/// Names of every reservation, or the single fallback line when the
/// reservation service fails or the breaker is open.
async fn reservation_names(State(state): State<AppState>, headers: HeaderMap) -> Response {
    let timer = metrics::RequestTimer::start("reservation_names");
    let request_id = request_id(&headers).to_string();

    let names = state
        .reservations
        .get_all_reservations()
        .map_ok(|reservation| reservation.name);
    let guarded = state
        .breaker
        .run(names, move |error: BreakerError<ClientError>| {
            tracing::warn!(request_id = %request_id, error = %error, "Serving fallback names");
            stream::iter([FALLBACK_NAME.to_string()])
        });

    response::text_lines(metrics::timed(guarded, timer))
}

/// Forward a request matching a proxy rule to its upstream.
async fn proxy_handler(State(state): State<AppState>, request: Request<Body>) -> Response {
    let start = Instant::now();
    let request_id = request_id(request.headers()).to_string();

    let Some(route) = state.router.find(&request) else {
        tracing::debug!(request_id = %request_id, path = %request.uri().path(), "No route matched");
        metrics::record_request("proxy", 404, start);
        return (StatusCode::NOT_FOUND, "No matching route found").into_response();
    };

    let upstream = match route.upstream_uri(request.uri()) {
        Ok(uri) => uri,
        Err(e) => {
            tracing::error!(request_id = %request_id, route = %route.name(), error = %e, "Failed to build upstream uri");
            metrics::record_request("proxy", 502, start);
            return (StatusCode::BAD_GATEWAY, "Invalid upstream").into_response();
        }
    };
    tracing::debug!(request_id = %request_id, route = %route.name(), upstream = %upstream, "Proxying request");

    let (mut parts, body) = request.into_parts();
    parts.uri = upstream;
    parts.headers.remove(header::HOST);

    match state.client.request(Request::from_parts(parts, body)).await {
        Ok(upstream_response) => {
            let (mut parts, body) = upstream_response.into_parts();
            for (name, value) in route.response_headers() {
                parts.headers.insert(name.clone(), value.clone());
            }
            metrics::record_request("proxy", parts.status.as_u16(), start);
            Response::from_parts(parts, Body::new(body))
        }
        Err(e) => {
            tracing::error!(request_id = %request_id, route = %route.name(), error = %e, "Upstream error");
            metrics::record_request("proxy", 502, start);
            (StatusCode::BAD_GATEWAY, "Upstream request failed").into_response()
        }
    }
}
