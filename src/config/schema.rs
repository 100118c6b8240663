//! Configuration schema definitions.
//!
//! All types derive Serde traits for deserialization from a TOML file; every
//! section has defaults so an empty file is a valid configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::client::types::{LraResult, TimeUnit};

/// Root configuration for the TCK client.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct TckConfig {
    /// Where the participant resources are deployed.
    pub target: TargetConfig,

    /// Resource path names and protocol names on the participant.
    pub paths: ResourcePaths,

    /// LRA timeout defaults.
    pub timeouts: TimeoutConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Deployment target configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TargetConfig {
    /// Base URL of the deployment (e.g., "http://localhost:8080/").
    pub base_url: String,

    /// Request timeout (total time for request/response) in seconds.
    pub request_timeout_secs: u64,

    /// Connection establishment timeout in seconds.
    pub connect_timeout_secs: u64,
}

impl Default for TargetConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8080/".to_string(),
            request_timeout_secs: 30,
            connect_timeout_secs: 5,
        }
    }
}

/// Names of the non-participating TCK resource and its actions.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(default)]
pub struct ResourcePaths {
    /// Base path of the non-participating resource.
    pub non_participant: String,

    /// Action starting an LRA that is not ended when the call returns.
    pub start_dont_end: String,

    /// Action ending the LRA given as context (close or cancel).
    pub end: String,

    /// Query parameter naming the status the resource must answer with.
    pub coerce_status_query: String,

    /// Header carrying the LRA context.
    pub context_header: String,
}

impl Default for ResourcePaths {
    fn default() -> Self {
        Self {
            non_participant: "non-participant-tck-resource".to_string(),
            start_dont_end: "start-dont-end".to_string(),
            end: "end-lra".to_string(),
            coerce_status_query: crate::client::types::STATUS_CODE_QUERY_NAME.to_string(),
            context_header: crate::client::types::LRA_HTTP_CONTEXT_HEADER.to_string(),
        }
    }
}

/// LRA timeout defaults used by tests.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Default LRA timeout, in `default_unit`.
    pub default_timeout: u64,

    /// Unit of `default_timeout` (nanos, micros, millis, seconds, minutes, hours, days).
    pub default_unit: String,

    /// Multiplier applied to every timeout, for slow environments.
    pub timeout_factor: f64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            default_timeout: 10,
            default_unit: "seconds".to_string(),
            timeout_factor: 1.0,
        }
    }
}

impl TimeoutConfig {
    /// The default timeout with `timeout_factor` applied.
    pub fn default_duration(&self) -> LraResult<Duration> {
        let unit: TimeUnit = self.default_unit.parse()?;
        let base = unit.duration(self.default_timeout)?;
        Ok(self.adjust(base))
    }

    /// Scale `timeout` by `timeout_factor`.
    pub fn adjust(&self, timeout: Duration) -> Duration {
        if self.timeout_factor.is_finite() && self.timeout_factor > 0.0 {
            Duration::try_from_secs_f64(timeout.as_secs_f64() * self.timeout_factor)
                .unwrap_or(Duration::MAX)
        } else {
            timeout
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Enable the Prometheus metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            metrics_enabled: false,
            metrics_address: "127.0.0.1:9090".to_string(),
        }
    }
}
