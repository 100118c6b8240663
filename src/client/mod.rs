//! Remote invocation subsystem.
//!
//! # Data Flow
//! ```text
//! LraClientOps (caller task or timer worker)
//!     → invoker.rs (serialized PUT against the participant resource)
//!     → InvokeResponse { status, body }
//!     → types.rs (LraId parsing, error mapping)
//! ```
//!
//! # Design Decisions
//! - One attempt per call; transport failures surface to the caller
//! - The shared HTTP client is guarded by a mutex for the whole round trip
//! - Status codes are data, not errors: the harness coerces 500 on purpose

pub mod invoker;
pub mod types;

pub use invoker::{HttpInvoker, RemoteInvoker};
pub use types::{InvokeResponse, LraError, LraId, LraResult, TimeUnit};
