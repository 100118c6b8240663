//! Cancellation timers and the single worker that runs them.
//!
//! # Data Flow
//! ```text
//! schedule(lra, delay)
//!     → registry.reserve (ticketed pending slot)
//!     → sleeper task: sleep(delay) → Fired { lra, ticket } over mpsc
//!     → worker: one Fired at a time → FiredHandler::on_fired
//! ```
//!
//! Sleepers only wait; all cancellation work happens on the worker, so fired
//! callbacks never overlap. Aborting a sleeper prevents a future firing but
//! never interrupts a callback already running on the worker.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tracing::Instrument;

use crate::client::types::LraId;
use crate::lifecycle::registry::TaskRegistry;

/// Message sent by a sleeper whose delay elapsed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fired {
    pub lra: LraId,
    pub ticket: u64,
}

/// Receives fired timers on the worker task.
#[async_trait]
pub trait FiredHandler: Send + Sync + 'static {
    async fn on_fired(&self, fired: Fired);
}

/// Creates sleepers that report to the worker.
#[derive(Debug, Clone)]
pub struct Scheduler {
    fired_tx: mpsc::UnboundedSender<Fired>,
}

impl Scheduler {
    /// Create a scheduler and the receiving end for its worker.
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<Fired>) {
        let (fired_tx, fired_rx) = mpsc::unbounded_channel();
        (Self { fired_tx }, fired_rx)
    }

    /// Arrange for `lra` to be reported to the worker after `delay`.
    ///
    /// The registry slot exists before the sleeper can run, so even a zero
    /// length sleep is claimable by the worker.
    pub fn schedule(&self, registry: &TaskRegistry, lra: &LraId, client_id: &str, delay: Duration) {
        let (ticket, replaced) = registry.reserve(lra, client_id);
        if let Some(previous) = replaced {
            tracing::warn!(
                lra = %lra,
                client_id,
                previous_client_id = %previous,
                "Replacing existing cancellation timer"
            );
        }

        let fired_tx = self.fired_tx.clone();
        let fired = Fired {
            lra: lra.clone(),
            ticket,
        };
        let sleeper = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let _ = fired_tx.send(fired);
        });
        registry.attach(lra, ticket, sleeper);

        tracing::debug!(lra = %lra, client_id, delay = ?delay, "Cancellation timer scheduled");
    }
}

/// The single background worker executing fired cancellations.
pub struct TimerWorker;

impl TimerWorker {
    /// Spawn the worker loop. It exits on shutdown or when every scheduler
    /// has been dropped. The loop runs inside the caller's current span.
    pub fn spawn<H: FiredHandler>(
        handler: Arc<H>,
        mut fired_rx: mpsc::UnboundedReceiver<Fired>,
        mut shutdown: broadcast::Receiver<()>,
    ) -> JoinHandle<()> {
        let worker = async move {
            tracing::debug!("Timer worker started");
            loop {
                tokio::select! {
                    fired = fired_rx.recv() => match fired {
                        Some(fired) => handler.on_fired(fired).await,
                        None => break,
                    },
                    _ = shutdown.recv() => {
                        tracing::debug!("Timer worker received shutdown signal, exiting loop");
                        break;
                    }
                }
            }
        };
        tokio::spawn(worker.in_current_span())
    }
}
