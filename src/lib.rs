//! Client driver for the LRA (Long Running Action) compatibility kit.
//!
//! Starts, closes and cancels LRAs on a TCK participant deployment, and
//! guarantees that an LRA started with a timeout is never abandoned: a timer
//! worker cancels it and reports the leak.

pub mod client;
pub mod config;
pub mod harness;
pub mod lifecycle;
pub mod observability;

pub use client::{HttpInvoker, LraError, LraId, LraResult, RemoteInvoker};
pub use config::TckConfig;
pub use harness::TckContext;
pub use lifecycle::LraClientOps;
