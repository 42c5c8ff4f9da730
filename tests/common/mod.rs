//! Shared utilities for integration testing.
//!
//! Every helper binds `127.0.0.1:0` so tests can run in parallel.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

use reactive_mesh::config::schema::{RpcEndpointConfig, StoreConfig};
use reactive_mesh::greeting::{GreetingClient, GreetingService, GreetingsRoute, GREETINGS_ROUTE};
use reactive_mesh::reservations::{Reservation, ReservationRepository};
use reactive_mesh::resilience::CircuitBreakerRegistry;
use reactive_mesh::rpc::RpcServer;
use reactive_mesh::{GatewayServer, MeshConfig, ReservationServer, Shutdown};

pub const GREETING_INTERVAL: Duration = Duration::from_millis(50);

/// A running reservation service: HTTP frontage plus greeting RPC endpoint.
pub struct Backend {
    pub http_addr: SocketAddr,
    pub rpc_addr: SocketAddr,
    pub repository: ReservationRepository,
    pub shutdown: Shutdown,
}

impl Backend {
    pub fn reservations_url(&self) -> String {
        format!("http://{}", self.http_addr)
    }

    pub fn rpc_endpoint(&self) -> RpcEndpointConfig {
        RpcEndpointConfig {
            host: self.rpc_addr.ip().to_string(),
            port: self.rpc_addr.port(),
            connect_timeout_secs: 2,
        }
    }
}

pub async fn memory_repository() -> ReservationRepository {
    let config = StoreConfig {
        database_url: "sqlite::memory:".into(),
        max_connections: 1,
    };
    ReservationRepository::connect(&config).await.unwrap()
}

/// Start a reservation service whose store holds `names`.
pub async fn start_backend(names: &[&str]) -> Backend {
    let repository = memory_repository().await;
    for name in names {
        repository.save(Reservation::new(*name)).await.unwrap();
    }

    let shutdown = Shutdown::new();

    let http_listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let http_addr = http_listener.local_addr().unwrap();
    tokio::spawn(ReservationServer::new(repository.clone()).run(http_listener, shutdown.subscribe()));

    let rpc_listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let rpc_addr = rpc_listener.local_addr().unwrap();
    let rpc = RpcServer::new().route(
        GREETINGS_ROUTE,
        GreetingsRoute::new(GreetingService::new(GREETING_INTERVAL)),
    );
    tokio::spawn(rpc.run(rpc_listener, shutdown.subscribe()));

    Backend {
        http_addr,
        rpc_addr,
        repository,
        shutdown,
    }
}

/// Gateway configuration pointing at `backend`.
pub fn gateway_config(backend: &Backend) -> MeshConfig {
    let mut config = MeshConfig::default();
    config.gateway.greeting_rpc = backend.rpc_endpoint();
    config.gateway.reservations_url = backend.reservations_url();
    config.greeting.interval_ms = GREETING_INTERVAL.as_millis() as u64;
    config.timeouts.connect_secs = 1;
    for route in &mut config.routes {
        route.uri = backend.reservations_url();
    }
    config
}

/// Start a gateway from `config`; returns its address and shutdown handle.
pub async fn start_gateway(config: &MeshConfig) -> (SocketAddr, Shutdown) {
    let greetings = GreetingClient::connect(&config.gateway.greeting_rpc)
        .await
        .unwrap();
    let server = GatewayServer::new(config, greetings, &CircuitBreakerRegistry::new()).unwrap();

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let shutdown = Shutdown::new();
    tokio::spawn(server.run(listener, shutdown.subscribe()));
    (addr, shutdown)
}

/// An address nothing listens on.
pub async fn unused_addr() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    addr
}

/// Start a raw HTTP/1.1 upstream answering `body` and recording each
/// request line it receives.
pub async fn start_recording_upstream(body: &'static str) -> (SocketAddr, Arc<Mutex<Vec<String>>>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let seen = Arc::new(Mutex::new(Vec::new()));
    let recorded = seen.clone();

    tokio::spawn(async move {
        while let Ok((mut socket, _)) = listener.accept().await {
            let recorded = recorded.clone();
            tokio::spawn(async move {
                let mut buffer = vec![0u8; 4096];
                let Ok(n) = socket.read(&mut buffer).await else {
                    return;
                };
                let head = String::from_utf8_lossy(&buffer[..n]).to_string();
                if let Some(line) = head.lines().next() {
                    recorded.lock().unwrap().push(line.to_string());
                }

                let response = format!(
                    "HTTP/1.1 200 OK\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                    body.len(),
                    body
                );
                let _ = socket.write_all(response.as_bytes()).await;
                let _ = socket.shutdown().await;
            });
        }
    });

    (addr, seen)
}
