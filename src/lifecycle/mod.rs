//! LRA lifecycle subsystem.
//!
//! # Data Flow
//! ```text
//! start_lra:
//!     invoker (start-dont-end) → LraId → [timeout > 0] timer.rs schedule
//!
//! close_lra / cancel_lra:
//!     registry.rs deregister (abort sleeper) → invoker (end, 200 | 500)
//!
//! timer fires (worker task):
//!     registry.rs claim → warn → invoker (end, 500) → PrematureTimeout on
//!     the background error channel
//!
//! clean_up:
//!     every pending registration → warn → cancel_lra
//! ```
//!
//! # Design Decisions
//! - Exactly one of {explicit end, timer} performs the remote end call
//! - One worker runs fired timers, one at a time
//! - Timer errors cannot reach the caller, so they are queued for polling

pub mod controller;
pub mod registry;
pub mod shutdown;
pub mod timer;

pub use controller::LraClientOps;
pub use registry::{Deregistered, TaskRegistry};
pub use shutdown::Shutdown;
