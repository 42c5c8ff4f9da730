//! Startup orchestration shared by the binaries.
//!
//! # Responsibilities
//! - Load and validate configuration
//! - Initialize logging and the optional metrics exporter
//! - Bind listeners with errors that name what failed
//!
//! # Design Decisions
//! - Fail fast: any startup error is fatal
//! - Subsystems initialize in order, not concurrently
//! - Listeners are bound before anything is spawned on them

use std::net::SocketAddr;
use std::path::Path;

use thiserror::Error;
use tokio::net::TcpListener;

use crate::config::{load_or_default, ConfigError, MeshConfig};
use crate::http::GatewayError;
use crate::observability::{logging, metrics};
use crate::reservations::StoreError;
use crate::rpc::RpcError;

#[derive(Debug, Error)]
pub enum StartupError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("failed to bind {what} on {addr}: {source}")]
    Bind {
        what: &'static str,
        addr: String,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Rpc(#[from] RpcError),

    #[error(transparent)]
    Gateway(#[from] GatewayError),
}

/// Load configuration, then bring up logging and metrics as it asks.
pub fn init(config_path: Option<&Path>) -> Result<MeshConfig, StartupError> {
    let config = load_or_default(config_path)?;

    logging::init(&config.observability);
    match config_path {
        Some(path) => tracing::info!(path = %path.display(), "Configuration loaded"),
        None => tracing::info!("No configuration file given, using defaults"),
    }

    if config.observability.metrics_enabled {
        // Validation guarantees the address parses.
        if let Ok(addr) = config.observability.metrics_address.parse::<SocketAddr>() {
            metrics::init_metrics(addr);
        }
    }

    Ok(config)
}

/// Bind a TCP listener for the component named `what`.
pub async fn bind(what: &'static str, addr: &str) -> Result<TcpListener, StartupError> {
    TcpListener::bind(addr)
        .await
        .map_err(|source| StartupError::Bind {
            what,
            addr: addr.to_string(),
            source,
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn bind_failure_names_the_component() {
        let taken = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = taken.local_addr().unwrap().to_string();

        let err = bind("gateway", &addr).await.unwrap_err();
        assert!(err.to_string().starts_with(&format!("failed to bind gateway on {addr}")));
    }

    #[test]
    fn missing_config_file_is_reported() {
        let err = init(Some(Path::new("/nonexistent/mesh.toml"))).unwrap_err();
        assert!(matches!(err, StartupError::Config(ConfigError::Io(_))));
    }
}
