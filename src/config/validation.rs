//! Configuration validation.
//!
//! Serde handles syntax; this checks values. All problems are reported at
//! once rather than stopping at the first.

use std::net::SocketAddr;

use thiserror::Error;
use url::Url;

use crate::client::types::TimeUnit;
use crate::config::schema::TckConfig;

/// A single semantic problem in the configuration.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    #[error("target.base_url '{0}' is not an absolute http(s) URL")]
    InvalidBaseUrl(String),

    #[error("{0} must be greater than zero")]
    ZeroTimeout(&'static str),

    #[error("timeouts.default_unit '{0}' is not a supported time unit")]
    InvalidUnit(String),

    #[error("timeouts.timeout_factor must be a positive number, got {0}")]
    InvalidFactor(f64),

    #[error("paths.{0} must not be empty")]
    EmptyPath(&'static str),

    #[error("observability.metrics_address '{0}' is not a socket address")]
    InvalidMetricsAddress(String),
}

/// Validate a parsed configuration.
pub fn validate_config(config: &TckConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    match Url::parse(&config.target.base_url) {
        Ok(url) if matches!(url.scheme(), "http" | "https") && !url.cannot_be_a_base() => {}
        _ => errors.push(ValidationError::InvalidBaseUrl(config.target.base_url.clone())),
    }
    if config.target.request_timeout_secs == 0 {
        errors.push(ValidationError::ZeroTimeout("target.request_timeout_secs"));
    }
    if config.target.connect_timeout_secs == 0 {
        errors.push(ValidationError::ZeroTimeout("target.connect_timeout_secs"));
    }

    if config.timeouts.default_unit.parse::<TimeUnit>().is_err() {
        errors.push(ValidationError::InvalidUnit(config.timeouts.default_unit.clone()));
    }
    let factor = config.timeouts.timeout_factor;
    if !factor.is_finite() || factor <= 0.0 {
        errors.push(ValidationError::InvalidFactor(factor));
    }

    let paths = [
        ("non_participant", &config.paths.non_participant),
        ("start_dont_end", &config.paths.start_dont_end),
        ("end", &config.paths.end),
        ("coerce_status_query", &config.paths.coerce_status_query),
        ("context_header", &config.paths.context_header),
    ];
    for (name, value) in paths {
        if value.trim().is_empty() {
            errors.push(ValidationError::EmptyPath(name));
        }
    }

    if config.observability.metrics_enabled
        && config.observability.metrics_address.parse::<SocketAddr>().is_err()
    {
        errors.push(ValidationError::InvalidMetricsAddress(
            config.observability.metrics_address.clone(),
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
