//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate addresses and URLs before any listener or client is built
//! - Validate value ranges (intervals > 0, thresholds within bounds)
//! - Detect duplicate proxy route names
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: MeshConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::collections::HashSet;
use std::net::SocketAddr;

use thiserror::Error;
use url::Url;

use crate::config::schema::MeshConfig;

/// A single semantic problem found in a configuration document.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    #[error("{field}: invalid socket address '{value}'")]
    InvalidAddress { field: &'static str, value: String },

    #[error("{field}: invalid URL '{value}'")]
    InvalidUrl { field: String, value: String },

    #[error("{field}: must be greater than zero")]
    Zero { field: &'static str },

    #[error("circuit_breaker.failure_rate_threshold: {0} is outside (0, 100]")]
    ThresholdOutOfRange(f32),

    #[error("routes: duplicate route name '{0}'")]
    DuplicateRoute(String),

    #[error("routes.{route}.set_path: '{value}' must start with '/'")]
    RelativePath { route: String, value: String },
}

/// Validate a parsed configuration, collecting every problem found.
pub fn validate_config(config: &MeshConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    check_address(&mut errors, "gateway.bind_address", &config.gateway.bind_address);
    check_address(&mut errors, "backend.http_bind_address", &config.backend.http_bind_address);
    check_address(&mut errors, "backend.rpc_bind_address", &config.backend.rpc_bind_address);
    check_url(&mut errors, "gateway.reservations_url".to_string(), &config.gateway.reservations_url);
    if config.observability.metrics_enabled {
        check_address(
            &mut errors,
            "observability.metrics_address",
            &config.observability.metrics_address,
        );
    }

    if config.gateway.greeting_rpc.port == 0 {
        errors.push(ValidationError::Zero { field: "gateway.greeting_rpc.port" });
    }
    if config.greeting.interval_ms == 0 {
        errors.push(ValidationError::Zero { field: "greeting.interval_ms" });
    }
    if config.store.max_connections == 0 {
        errors.push(ValidationError::Zero { field: "store.max_connections" });
    }
    if config.bulk.lanes == 0 {
        errors.push(ValidationError::Zero { field: "bulk.lanes" });
    }

    let breaker = &config.circuit_breaker;
    if !(breaker.failure_rate_threshold > 0.0 && breaker.failure_rate_threshold <= 100.0) {
        errors.push(ValidationError::ThresholdOutOfRange(breaker.failure_rate_threshold));
    }
    if breaker.sliding_window_size == 0 {
        errors.push(ValidationError::Zero { field: "circuit_breaker.sliding_window_size" });
    }
    if breaker.minimum_number_of_calls == 0 {
        errors.push(ValidationError::Zero { field: "circuit_breaker.minimum_number_of_calls" });
    }
    if breaker.permitted_calls_in_half_open_state == 0 {
        errors.push(ValidationError::Zero {
            field: "circuit_breaker.permitted_calls_in_half_open_state",
        });
    }

    let mut seen = HashSet::new();
    for route in &config.routes {
        if !seen.insert(route.name.as_str()) {
            errors.push(ValidationError::DuplicateRoute(route.name.clone()));
        }
        check_url(&mut errors, format!("routes.{}.uri", route.name), &route.uri);
        if let Some(path) = &route.set_path {
            if !path.starts_with('/') {
                errors.push(ValidationError::RelativePath {
                    route: route.name.clone(),
                    value: path.clone(),
                });
            }
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn check_address(errors: &mut Vec<ValidationError>, field: &'static str, value: &str) {
    if value.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::InvalidAddress {
            field,
            value: value.to_string(),
        });
    }
}

fn check_url(errors: &mut Vec<ValidationError>, field: String, value: &str) {
    if Url::parse(value).is_err() {
        errors.push(ValidationError::InvalidUrl {
            field,
            value: value.to_string(),
        });
    }
}
