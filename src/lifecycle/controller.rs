//! LRA lifecycle controller.
//!
//! Starts, closes and cancels LRAs through a [`RemoteInvoker`] and makes sure
//! an LRA started with a timeout is cancelled if the test never ends it.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::client::invoker::{HttpInvoker, RemoteInvoker};
use crate::client::types::{InvokeResponse, LraError, LraId, LraResult, TimeUnit};
use crate::config::schema::{ResourcePaths, TckConfig};
use crate::lifecycle::registry::{Deregistered, TaskRegistry};
use crate::lifecycle::shutdown::Shutdown;
use crate::lifecycle::timer::{Fired, FiredHandler, Scheduler, TimerWorker};
use crate::observability::metrics;

/// Status coerced on the end call to close an LRA.
pub const CLOSE_STATUS: u16 = 200;
/// Status coerced on the end call to cancel an LRA; the participant answers
/// 500 and the LRA is compensated.
pub const CANCEL_STATUS: u16 = 500;
/// Status coerced on start and leave calls.
pub const SUCCESS_STATUS: u16 = 200;

/// State shared between the controller and its timer worker.
struct Shared<I> {
    invoker: I,
    registry: TaskRegistry,
    paths: ResourcePaths,
    errors_tx: mpsc::UnboundedSender<LraError>,
}

impl<I: RemoteInvoker> Shared<I> {
    async fn end(&self, lra: &LraId, coerce_status: u16) -> LraResult<InvokeResponse> {
        self.invoker
            .invoke(
                Some(lra),
                &self.paths.non_participant,
                &self.paths.end,
                coerce_status,
            )
            .await
    }

    fn report(&self, error: LraError) {
        // Receiver lives as long as the controller; after that nobody is listening.
        let _ = self.errors_tx.send(error);
    }
}

#[async_trait]
impl<I: RemoteInvoker> FiredHandler for Shared<I> {
    async fn on_fired(&self, fired: Fired) {
        let Some(client_id) = self.registry.claim_fired(&fired.lra, fired.ticket) else {
            tracing::debug!(lra = %fired.lra, "Timer fired after the LRA was ended, ignoring");
            return;
        };

        tracing::warn!(
            client_id = %client_id,
            lra = %fired.lra,
            "cancelling LRA from the timer"
        );

        match self.end(&fired.lra, CANCEL_STATUS).await {
            Ok(_) => metrics::record_lra_ended("timed_out"),
            Err(e) => {
                tracing::error!(lra = %fired.lra, error = %e, "Timer failed to cancel LRA");
                self.report(e);
            }
        }
        self.registry.release(&fired.lra, fired.ticket);
        metrics::set_pending_timers(self.registry.len());

        let error = LraError::PrematureTimeout {
            client_id,
            lra: fired.lra,
        };
        tracing::error!(error = %error, "LRA timed out before the test ended it");
        self.report(error);
    }
}

/// Client side driver for LRAs hosted by the TCK participant resource.
///
/// Owns the cancellation registry and one timer worker. Must be created
/// inside a Tokio runtime.
pub struct LraClientOps<I: RemoteInvoker> {
    shared: Arc<Shared<I>>,
    scheduler: Scheduler,
    shutdown: Shutdown,
    worker: Option<JoinHandle<()>>,
    errors_rx: Mutex<mpsc::UnboundedReceiver<LraError>>,
}

impl LraClientOps<HttpInvoker> {
    /// Build a controller talking HTTP to the configured target.
    pub fn from_config(config: &TckConfig) -> LraResult<Self> {
        let invoker = HttpInvoker::new(&config.target, &config.paths)?;
        Ok(Self::new(invoker, config.paths.clone()))
    }
}

impl<I: RemoteInvoker> LraClientOps<I> {
    pub fn new(invoker: I, paths: ResourcePaths) -> Self {
        let (errors_tx, errors_rx) = mpsc::unbounded_channel();
        let shared = Arc::new(Shared {
            invoker,
            registry: TaskRegistry::new(),
            paths,
            errors_tx,
        });

        let shutdown = Shutdown::new();
        let (scheduler, fired_rx) = Scheduler::channel();
        let worker = TimerWorker::spawn(shared.clone(), fired_rx, shutdown.subscribe());

        Self {
            shared,
            scheduler,
            shutdown,
            worker: Some(worker),
            errors_rx: Mutex::new(errors_rx),
        }
    }

    /// Start an LRA that the participant does not end on its own.
    ///
    /// With a non-zero `timeout` the LRA is cancelled by the timer worker if
    /// it is still open when the timeout elapses; that is reported as a
    /// [`LraError::PrematureTimeout`] through [`Self::background_errors`].
    pub async fn start_lra(
        &self,
        parent: Option<&LraId>,
        client_id: &str,
        timeout: Duration,
    ) -> LraResult<LraId> {
        let response = self
            .shared
            .invoker
            .invoke(
                parent,
                &self.shared.paths.non_participant,
                &self.shared.paths.start_dont_end,
                SUCCESS_STATUS,
            )
            .await?;
        let lra = LraId::parse(&response.body)?;

        if !timeout.is_zero() {
            self.scheduler
                .schedule(&self.shared.registry, &lra, client_id, timeout);
            metrics::set_pending_timers(self.shared.registry.len());
        }

        metrics::record_lra_started(parent.is_some());
        tracing::debug!(
            lra = %lra,
            client_id,
            parent = ?parent.map(LraId::as_str),
            timeout = ?timeout,
            "LRA started"
        );
        Ok(lra)
    }

    /// [`Self::start_lra`] with the timeout given as an amount and a unit name.
    ///
    /// An unsupported unit is rejected before anything is sent.
    pub async fn start_lra_in(
        &self,
        parent: Option<&LraId>,
        client_id: &str,
        amount: u64,
        unit: &str,
    ) -> LraResult<LraId> {
        let timeout = unit.parse::<TimeUnit>()?.duration(amount)?;
        self.start_lra(parent, client_id, timeout).await
    }

    /// Cancel (compensate) an LRA, dropping its timer first.
    pub async fn cancel_lra(&self, lra: &LraId) -> LraResult<()> {
        self.end_lra(lra, CANCEL_STATUS, "cancelled").await
    }

    /// Close (complete) an LRA, dropping its timer first.
    pub async fn close_lra(&self, lra: &LraId) -> LraResult<()> {
        self.end_lra(lra, CLOSE_STATUS, "closed").await
    }

    /// Close an LRA given as text.
    pub async fn close_lra_str(&self, lra: &str) -> LraResult<()> {
        let lra = LraId::parse(lra)?;
        self.close_lra(&lra).await
    }

    async fn end_lra(&self, lra: &LraId, coerce_status: u16, outcome: &'static str) -> LraResult<()> {
        match self.shared.registry.deregister(lra) {
            Deregistered::TimedOut => {
                tracing::warn!(lra = %lra, "LRA was already cancelled by its timer");
                return Ok(());
            }
            Deregistered::Cancelled { client_id } => {
                tracing::debug!(lra = %lra, client_id = %client_id, "Cancellation timer removed");
                metrics::set_pending_timers(self.shared.registry.len());
            }
            Deregistered::Absent => {}
        }

        self.shared.end(lra, coerce_status).await?;
        metrics::record_lra_ended(outcome);
        Ok(())
    }

    /// Detach a participant from `lra` without changing the LRA's state.
    ///
    /// Returns the status the participant answered with.
    pub async fn leave_lra(&self, lra: &LraId, base_path: &str, resource_path: &str) -> LraResult<u16> {
        let response = self
            .shared
            .invoker
            .invoke(Some(lra), base_path, resource_path, SUCCESS_STATUS)
            .await?;
        Ok(response.status)
    }

    /// Call an arbitrary participant endpoint and return its body.
    pub async fn invoke_and_read(
        &self,
        lra: Option<&LraId>,
        base_path: &str,
        path: &str,
        coerce_status: u16,
    ) -> LraResult<String> {
        let response = self
            .shared
            .invoker
            .invoke(lra, base_path, path, coerce_status)
            .await?;
        Ok(response.body)
    }

    /// Call an arbitrary participant endpoint and return its status.
    pub async fn invoke_and_status(
        &self,
        lra: Option<&LraId>,
        base_path: &str,
        path: &str,
        coerce_status: u16,
    ) -> LraResult<u16> {
        let response = self
            .shared
            .invoker
            .invoke(lra, base_path, path, coerce_status)
            .await?;
        Ok(response.status)
    }

    /// Cancel every LRA whose timer is still pending.
    ///
    /// Each leak is logged; failures to cancel are logged and skipped so the
    /// outcome of the test itself is not masked. Returns the number of leaks.
    ///
    /// Only the timers present when the call starts are cancelled; a timer
    /// registered while cleanup runs stays scheduled.
    pub async fn clean_up(&self, test_name: &str) -> usize {
        let leaked = self.shared.registry.pending();

        for (lra, client_id) in &leaked {
            tracing::warn!(
                test = test_name,
                lra = %lra,
                client_id = %client_id,
                "Test didn't finish LRA"
            );
            metrics::record_lra_leaked();
            if let Err(e) = self.cancel_lra(lra).await {
                tracing::error!(test = test_name, lra = %lra, error = %e, "Failed to cancel leaked LRA");
            }
        }

        metrics::set_pending_timers(self.shared.registry.len());
        leaked.len()
    }

    /// Drain errors raised on the timer worker since the last call.
    pub fn background_errors(&self) -> Vec<LraError> {
        let mut rx = self
            .errors_rx
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        let mut errors = Vec::new();
        while let Ok(error) = rx.try_recv() {
            errors.push(error);
        }
        errors
    }

    /// Number of timers that have not fired or been cancelled.
    pub fn pending_timers(&self) -> usize {
        self.shared.registry.len()
    }

    pub fn has_timer(&self, lra: &LraId) -> bool {
        self.shared.registry.is_pending(lra)
    }

    pub fn invoker(&self) -> &I {
        &self.shared.invoker
    }

    pub fn paths(&self) -> &ResourcePaths {
        &self.shared.paths
    }

    /// Stop the timer worker and wait for it to exit.
    ///
    /// Intended to run after [`Self::clean_up`]; timers still pending are
    /// dropped without cancelling their LRAs.
    pub async fn shutdown(mut self) {
        self.shutdown.trigger();
        if let Some(worker) = self.worker.take() {
            if let Err(e) = worker.await {
                tracing::error!(error = %e, "Timer worker terminated abnormally");
            }
        }
    }
}

impl<I: RemoteInvoker> Drop for LraClientOps<I> {
    fn drop(&mut self) {
        let pending = self.shared.registry.len();
        if pending > 0 {
            tracing::warn!(pending, "LRA client dropped with pending cancellation timers");
        }
        self.shared.registry.clear();
        self.shutdown.trigger();
    }
}
