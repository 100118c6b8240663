//! Registry of scheduled LRA cancellations.
//!
//! Keyed by [`LraId`] only; the client id is kept in the slot for
//! diagnostics. Every slot carries a ticket so a sleeper that belongs to a
//! replaced registration can never consume its successor.

use std::sync::atomic::{AtomicU64, Ordering};

use dashmap::DashMap;
use tokio::task::JoinHandle;

use crate::client::types::LraId;

/// A pending cancellation for one LRA.
#[derive(Debug)]
struct Scheduled {
    client_id: String,
    ticket: u64,
    sleeper: Option<JoinHandle<()>>,
}

impl Scheduled {
    fn abort(self) {
        if let Some(sleeper) = self.sleeper {
            sleeper.abort();
        }
    }
}

#[derive(Debug)]
enum Slot {
    Pending(Scheduled),
    /// The timer won and its remote cancel is in flight.
    TimedOut { ticket: u64 },
}

/// Outcome of removing an LRA's timer ahead of an explicit close or cancel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Deregistered {
    /// A pending timer was cancelled before it fired.
    Cancelled { client_id: String },
    /// The timer fired and its cancel call is still in flight.
    TimedOut,
    /// No timer was ever registered (or it was already removed).
    Absent,
}

/// Concurrent map from LRA identity to its cancellation timer.
#[derive(Debug, Default)]
pub struct TaskRegistry {
    slots: DashMap<LraId, Slot>,
    next_ticket: AtomicU64,
}

impl TaskRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reserve a pending slot for `lra`, replacing any existing registration.
    ///
    /// Returns the ticket for the new slot and the client id of a replaced
    /// pending registration, whose sleeper is aborted.
    pub fn reserve(&self, lra: &LraId, client_id: &str) -> (u64, Option<String>) {
        let ticket = self.next_ticket.fetch_add(1, Ordering::Relaxed);
        let slot = Slot::Pending(Scheduled {
            client_id: client_id.to_string(),
            ticket,
            sleeper: None,
        });

        let replaced = match self.slots.insert(lra.clone(), slot) {
            Some(Slot::Pending(old)) => {
                let old_client = old.client_id.clone();
                old.abort();
                Some(old_client)
            }
            Some(Slot::TimedOut { .. }) | None => None,
        };
        (ticket, replaced)
    }

    /// Attach the sleeper task to a reserved slot.
    ///
    /// If the slot was deregistered or claimed in the meantime the sleeper is
    /// aborted instead.
    pub fn attach(&self, lra: &LraId, ticket: u64, sleeper: JoinHandle<()>) {
        if let Some(mut slot) = self.slots.get_mut(lra) {
            if let Slot::Pending(scheduled) = slot.value_mut() {
                if scheduled.ticket == ticket {
                    scheduled.sleeper = Some(sleeper);
                    return;
                }
            }
        }
        sleeper.abort();
    }

    /// Remove the registration for `lra`, cancelling a pending timer.
    pub fn deregister(&self, lra: &LraId) -> Deregistered {
        match self.slots.remove(lra) {
            Some((_, Slot::Pending(scheduled))) => {
                let client_id = scheduled.client_id.clone();
                scheduled.abort();
                Deregistered::Cancelled { client_id }
            }
            Some((_, Slot::TimedOut { .. })) => Deregistered::TimedOut,
            None => Deregistered::Absent,
        }
    }

    /// Claim a fired timer for the worker.
    ///
    /// Succeeds only if `lra` still has the pending slot identified by
    /// `ticket`; the slot becomes `TimedOut` until [`Self::release`] and the
    /// client id is returned.
    pub fn claim_fired(&self, lra: &LraId, ticket: u64) -> Option<String> {
        let mut slot = self.slots.get_mut(lra)?;
        let client_id = match slot.value() {
            Slot::Pending(scheduled) if scheduled.ticket == ticket => scheduled.client_id.clone(),
            _ => return None,
        };
        *slot.value_mut() = Slot::TimedOut { ticket };
        Some(client_id)
    }

    /// Drop the `TimedOut` marker left by [`Self::claim_fired`] once the
    /// timer's cancel call has returned. A newer registration is left alone.
    pub fn release(&self, lra: &LraId, ticket: u64) -> bool {
        self.slots
            .remove_if(lra, |_, slot| matches!(slot, Slot::TimedOut { ticket: t } if *t == ticket))
            .is_some()
    }

    /// Snapshot of all pending registrations as (identity, client id).
    pub fn pending(&self) -> Vec<(LraId, String)> {
        self.slots
            .iter()
            .filter_map(|entry| match entry.value() {
                Slot::Pending(scheduled) => Some((entry.key().clone(), scheduled.client_id.clone())),
                Slot::TimedOut { .. } => None,
            })
            .collect()
    }

    /// Whether `lra` has a timer that has not fired yet.
    pub fn is_pending(&self, lra: &LraId) -> bool {
        self.slots
            .get(lra)
            .map(|slot| matches!(slot.value(), Slot::Pending(_)))
            .unwrap_or(false)
    }

    /// Number of pending timers.
    pub fn len(&self) -> usize {
        self.slots
            .iter()
            .filter(|entry| matches!(entry.value(), Slot::Pending(_)))
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop every slot, aborting pending sleepers.
    pub fn clear(&self) {
        let keys: Vec<LraId> = self.slots.iter().map(|entry| entry.key().clone()).collect();
        for key in keys {
            if let Some((_, Slot::Pending(scheduled))) = self.slots.remove(&key) {
                scheduled.abort();
            }
        }
    }
}
