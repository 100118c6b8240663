//! Configuration loading from disk and the environment.

use std::fs;
use std::path::Path;

use crate::config::schema::TckConfig;
use crate::config::validation::{validate_config, ValidationError};

/// Overrides the deployment base URL.
pub const BASE_URL_ENV: &str = "LRA_TCK_BASE_URL";
/// Overrides the timeout factor.
pub const TIMEOUT_FACTOR_ENV: &str = "LRA_TCK_TIMEOUT_FACTOR";

/// Error type for configuration loading.
#[derive(Debug)]
pub enum ConfigError {
    Io(std::io::Error),
    Parse(toml::de::Error),
    Env { name: &'static str, value: String },
    Validation(Vec<ValidationError>),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Io(e) => write!(f, "IO error: {}", e),
            ConfigError::Parse(e) => write!(f, "Parse error: {}", e),
            ConfigError::Env { name, value } => {
                write!(f, "Invalid value for {}: '{}'", name, value)
            }
            ConfigError::Validation(errors) => {
                write!(f, "Validation failed: ")?;
                for (i, err) in errors.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", err)?;
                }
                Ok(())
            }
        }
    }
}

impl std::error::Error for ConfigError {}

/// Load, override from the environment and validate a TOML configuration.
///
/// Without a path the defaults are used.
pub fn load_config(path: Option<&Path>) -> Result<TckConfig, ConfigError> {
    let mut config = match path {
        Some(path) => parse_config(&fs::read_to_string(path).map_err(ConfigError::Io)?)?,
        None => TckConfig::default(),
    };

    apply_overrides(&mut config, |name| std::env::var(name).ok())?;
    validate_config(&config).map_err(ConfigError::Validation)?;

    tracing::debug!(
        base_url = %config.target.base_url,
        timeout_factor = config.timeouts.timeout_factor,
        "Configuration loaded"
    );
    Ok(config)
}

/// Parse configuration text without validating it.
pub fn parse_config(content: &str) -> Result<TckConfig, ConfigError> {
    toml::from_str(content).map_err(ConfigError::Parse)
}

/// Apply overrides looked up through `lookup`.
pub fn apply_overrides<F>(config: &mut TckConfig, lookup: F) -> Result<(), ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(base_url) = lookup(BASE_URL_ENV) {
        config.target.base_url = base_url;
    }
    if let Some(raw) = lookup(TIMEOUT_FACTOR_ENV) {
        config.timeouts.timeout_factor = raw.trim().parse().map_err(|_| ConfigError::Env {
            name: TIMEOUT_FACTOR_ENV,
            value: raw.clone(),
        })?;
    }
    Ok(())
}
