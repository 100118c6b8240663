//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML, optional)
//!     → loader.rs (parse & deserialize)
//!     → environment overrides (LRA_TCK_BASE_URL, LRA_TCK_TIMEOUT_FACTOR)
//!     → validation.rs (semantic checks)
//!     → TckConfig (validated, immutable)
//! ```
//!
//! # Design Decisions
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_config, ConfigError};
pub use schema::{ObservabilityConfig, ResourcePaths, TargetConfig, TckConfig, TimeoutConfig};
