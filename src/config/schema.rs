//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the mesh.
//! All types derive Serde traits for deserialization from config files.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Root configuration shared by the gateway and the reservation service.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct MeshConfig {
    /// Gateway listener and downstream addresses.
    pub gateway: GatewayConfig,

    /// Reservation service listeners.
    pub backend: BackendConfig,

    /// Relational store settings.
    pub store: StoreConfig,

    /// Greeting generator settings.
    pub greeting: GreetingConfig,

    /// Circuit breaker guarding the reservation names endpoint.
    pub circuit_breaker: CircuitBreakerConfig,

    /// Reverse-proxy rules evaluated by the gateway.
    pub routes: Vec<RouteConfig>,

    /// Timeout configuration.
    pub timeouts: TimeoutConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,

    /// Bulk processor settings.
    pub bulk: BulkConfig,

    /// Startup sample data.
    pub seed: SeedConfig,
}

impl Default for MeshConfig {
    fn default() -> Self {
        Self {
            gateway: GatewayConfig::default(),
            backend: BackendConfig::default(),
            store: StoreConfig::default(),
            greeting: GreetingConfig::default(),
            circuit_breaker: CircuitBreakerConfig::default(),
            routes: default_routes(),
            timeouts: TimeoutConfig::default(),
            observability: ObservabilityConfig::default(),
            bulk: BulkConfig::default(),
            seed: SeedConfig::default(),
        }
    }
}

/// Gateway configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct GatewayConfig {
    /// Bind address (e.g., "0.0.0.0:9999").
    pub bind_address: String,

    /// Base URL of the reservation service HTTP frontage.
    pub reservations_url: String,

    /// Streaming RPC endpoint serving the greetings route.
    pub greeting_rpc: RpcEndpointConfig,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:9999".to_string(),
            reservations_url: "http://localhost:8080".to_string(),
            greeting_rpc: RpcEndpointConfig::default(),
        }
    }
}

/// Address of a remote streaming RPC endpoint.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RpcEndpointConfig {
    pub host: String,
    pub port: u16,

    /// Connection establishment timeout in seconds.
    pub connect_timeout_secs: u64,
}

impl RpcEndpointConfig {
    /// `host:port` form used to dial the endpoint.
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl Default for RpcEndpointConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 7070,
            connect_timeout_secs: 5,
        }
    }
}

/// Reservation service listeners.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct BackendConfig {
    /// HTTP frontage bind address.
    pub http_bind_address: String,

    /// Streaming RPC bind address.
    pub rpc_bind_address: String,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            http_bind_address: "0.0.0.0:8080".to_string(),
            rpc_bind_address: "0.0.0.0:7070".to_string(),
        }
    }
}

/// Relational store configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Connection URL (e.g., "sqlite://reservations.db?mode=rwc").
    pub database_url: String,

    /// Maximum pooled connections.
    pub max_connections: u32,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            database_url: "sqlite://reservations.db?mode=rwc".to_string(),
            max_connections: 5,
        }
    }
}

/// Greeting generator configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct GreetingConfig {
    /// Delay between two greetings in milliseconds.
    pub interval_ms: u64,
}

impl Default for GreetingConfig {
    fn default() -> Self {
        Self { interval_ms: 1000 }
    }
}

/// Circuit breaker policy.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CircuitBreakerConfig {
    /// Breaker identifier for logging/metrics.
    pub name: String,

    /// Failure percentage at or above which the circuit opens.
    pub failure_rate_threshold: f32,

    /// Number of most recent calls kept in the rolling window.
    pub sliding_window_size: usize,

    /// Calls required before the failure rate is evaluated.
    pub minimum_number_of_calls: usize,

    /// Time spent open before probing again, in milliseconds.
    pub wait_duration_in_open_state_ms: u64,

    /// Probe calls allowed while half-open.
    pub permitted_calls_in_half_open_state: usize,

    /// Maximum wait for each element of a guarded stream, in milliseconds.
    /// Zero disables the timeout.
    pub timeout_ms: u64,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            name: "names".to_string(),
            failure_rate_threshold: 50.0,
            sliding_window_size: 100,
            minimum_number_of_calls: 100,
            wait_duration_in_open_state_ms: 60_000,
            permitted_calls_in_half_open_state: 10,
            timeout_ms: 1_000,
        }
    }
}

/// Reverse-proxy rule.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RouteConfig {
    /// Route identifier for logging/metrics.
    pub name: String,

    /// Host pattern to match, exact or `*.suffix`.
    pub host: Option<String>,

    /// Path pattern to match, exact or ending in `/**`.
    pub path: Option<String>,

    /// Replacement path sent upstream.
    #[serde(default)]
    pub set_path: Option<String>,

    /// Headers added to the upstream response.
    #[serde(default)]
    pub add_response_headers: BTreeMap<String, String>,

    /// Upstream base URI (e.g., "http://localhost:8080").
    pub uri: String,
}

fn default_routes() -> Vec<RouteConfig> {
    vec![RouteConfig {
        name: "reservations-proxy".to_string(),
        host: Some("*.foo.bar".to_string()),
        path: Some("/proxy".to_string()),
        set_path: Some("/reservations".to_string()),
        add_response_headers: BTreeMap::from([(
            "Access-Control-Allow-Origin".to_string(),
            "*".to_string(),
        )]),
        uri: "http://localhost:8080".to_string(),
    }]
}

/// Timeout configuration for various operations.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Connection establishment timeout in seconds.
    pub connect_secs: u64,

    /// Time allowed to produce response headers, in seconds.
    pub request_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            connect_secs: 5,
            request_secs: 30,
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Emit logs as JSON lines instead of the human format.
    pub json_logs: bool,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            json_logs: false,
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}

/// Bulk processor configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct BulkConfig {
    /// Number of parallel lanes.
    pub lanes: usize,

    /// Synthetic items generated per run.
    pub items: usize,
}

impl Default for BulkConfig {
    fn default() -> Self {
        Self {
            lanes: 10,
            items: 100,
        }
    }
}

/// Sample data written when the reservation service becomes ready.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SeedConfig {
    pub enabled: bool,

    /// Names saved directly through the store.
    pub names: Vec<String>,

    /// Names saved through the validating domain service.
    pub validated_names: Vec<String>,
}

impl Default for SeedConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            names: ["Dhaval", "Bhavin", "Jigar", "Vishal", "Sharad", "Sid", "Samir"]
                .map(String::from)
                .to_vec(),
            validated_names: ["Viral", "Ankur", "Hitesh", "Parag", "Rikin"]
                .map(String::from)
                .to_vec(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_document_yields_defaults() {
        let config: MeshConfig = toml::from_str("").unwrap();
        assert_eq!(config.gateway.greeting_rpc.address(), "localhost:7070");
        assert_eq!(config.circuit_breaker.name, "names");
        assert_eq!(config.greeting.interval_ms, 1000);
        assert_eq!(config.bulk.lanes, 10);
        assert_eq!(config.routes.len(), 1);
        assert_eq!(config.routes[0].host.as_deref(), Some("*.foo.bar"));
    }

    #[test]
    fn partial_sections_keep_remaining_defaults() {
        let config: MeshConfig = toml::from_str(
            r#"
            [gateway.greeting_rpc]
            port = 7171

            [circuit_breaker]
            minimum_number_of_calls = 4
            "#,
        )
        .unwrap();
        assert_eq!(config.gateway.greeting_rpc.host, "localhost");
        assert_eq!(config.gateway.greeting_rpc.port, 7171);
        assert_eq!(config.circuit_breaker.minimum_number_of_calls, 4);
        assert_eq!(config.circuit_breaker.sliding_window_size, 100);
    }
}
