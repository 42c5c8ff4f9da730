//! Reservation service binary.
//!
//! Startup order: config → logging → store pool + schema → bind HTTP and
//! RPC listeners → spawn servers → seed sample data.

use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;

use reactive_mesh::greeting::{GreetingService, GreetingsRoute, GREETINGS_ROUTE};
use reactive_mesh::lifecycle::{shutdown, signals, startup, SampleDataSeeder, Shutdown, StartupError};
use reactive_mesh::reservations::ReservationRepository;
use reactive_mesh::rpc::RpcServer;
use reactive_mesh::ReservationServer;

#[derive(Parser)]
#[command(name = "reservation-service")]
#[command(about = "Reservation store frontage and greeting stream endpoint")]
struct Cli {
    /// Path to the TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let config = startup::init(cli.config.as_deref())?;

    let repository = ReservationRepository::connect(&config.store)
        .await
        .map_err(StartupError::from)?;

    let http_listener = startup::bind("reservation frontage", &config.backend.http_bind_address).await?;
    let rpc_listener = startup::bind("greeting RPC endpoint", &config.backend.rpc_bind_address).await?;

    let greetings = GreetingService::new(Duration::from_millis(config.greeting.interval_ms));
    let rpc = RpcServer::new().route(GREETINGS_ROUTE, GreetingsRoute::new(greetings));

    let shutdown = Shutdown::new();
    let http_task = tokio::spawn(ReservationServer::new(repository.clone()).run(http_listener, shutdown.subscribe()));
    let rpc_task = tokio::spawn(rpc.run(rpc_listener, shutdown.subscribe()));

    if config.seed.enabled {
        SampleDataSeeder::new(repository, config.seed.clone()).spawn();
    }

    signals::trigger_on_signal(&shutdown).await;
    tokio::join!(
        shutdown::drain("reservation frontage", http_task, shutdown::GRACE_PERIOD),
        shutdown::drain("greeting RPC endpoint", rpc_task, shutdown::GRACE_PERIOD),
    );

    tracing::info!("Reservation service exited");
    Ok(())
}
