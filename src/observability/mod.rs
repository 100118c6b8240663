//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! Controller, timer worker, harness produce:
//!     → logging.rs (structured tracing events, warn on leaked LRAs)
//!     → metrics.rs (started / ended / leaked counters, pending timer gauge)
//!
//! Consumers:
//!     → stdout via tracing-subscriber fmt layer
//!     → Prometheus scrape endpoint when enabled
//! ```

pub mod logging;
pub mod metrics;
