//! Gateway binary.
//!
//! Startup order: config → logging → RPC connect (fatal on failure) →
//! bind listener → serve until SIGINT/SIGTERM.

use std::path::PathBuf;

use clap::Parser;

use reactive_mesh::greeting::GreetingClient;
use reactive_mesh::lifecycle::{shutdown, signals, startup, Shutdown, StartupError};
use reactive_mesh::resilience::CircuitBreakerRegistry;
use reactive_mesh::GatewayServer;

#[derive(Parser)]
#[command(name = "gateway")]
#[command(about = "Streaming gateway in front of the reservation and greeting services")]
struct Cli {
    /// Path to the TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let config = startup::init(cli.config.as_deref())?;

    let rpc = &config.gateway.greeting_rpc;
    let greetings = GreetingClient::connect(rpc).await.map_err(|e| {
        tracing::error!(address = %rpc.address(), error = %e, "Greeting service unreachable");
        StartupError::from(e)
    })?;

    let breakers = CircuitBreakerRegistry::new();
    let server = GatewayServer::new(&config, greetings, &breakers).map_err(StartupError::from)?;
    let listener = startup::bind("gateway", &config.gateway.bind_address).await?;

    let shutdown = Shutdown::new();
    let server_task = tokio::spawn(server.run(listener, shutdown.subscribe()));

    signals::trigger_on_signal(&shutdown).await;
    shutdown::drain("gateway", server_task, shutdown::GRACE_PERIOD).await;

    tracing::info!("Gateway exited");
    Ok(())
}
