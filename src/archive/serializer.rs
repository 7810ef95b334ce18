//! The single-consumer serializer loop.
//!
//! [`run`] owns the value model and the observer registry outright; no
//! other code can reach them, so every access is data-race-free by
//! construction rather than by locking. Commands are processed strictly one
//! at a time, in queue order, which is the total order every consistency
//! guarantee of the store derives from.
//!
//! Notification fan-out happens inside the serialized step only up to the
//! point of scheduling: each [`Mutation`] is handed to the observer's own
//! execution context, so the loop never blocks on subscriber code.

use std::collections::HashMap;
use std::time::Instant;

use tokio::sync::mpsc;

use crate::domain::elastomer::ErasedValue;
use crate::domain::observer::Observer;
use crate::domain::{Elastomer, Mutation, ObserverReceipt};

use super::command::Command;

/// Shared mutable state, owned exclusively by the serializer task.
#[derive(Default)]
struct State {
    /// Current value per slot. Entries are created on first commit and
    /// never deleted; absence means "never staged".
    model: HashMap<Elastomer, ErasedValue>,
    /// Registered observers per slot, keyed by receipt for O(1) removal
    /// that leaves other registrations undisturbed.
    observers: HashMap<Elastomer, HashMap<ObserverReceipt, Observer>>,
    /// Reverse index so retirement needs only the receipt.
    receipt_index: HashMap<ObserverReceipt, Elastomer>,
}

impl State {
    fn apply(&mut self, command: Command) {
        match command {
            Command::Stage {
                elastomer,
                value,
                discard_redundant,
            } => self.stage(&elastomer, value, discard_redundant),
            Command::StageMany {
                entries,
                discard_redundant,
            } => {
                for (elastomer, value) in entries {
                    self.stage(&elastomer, value, discard_redundant);
                }
            }
            Command::Express { elastomer, reply } => {
                let _ = reply.send(self.model.get(&elastomer).cloned());
            }
            Command::ExpressMany { elastomers, reply } => {
                let snapshot = elastomers
                    .into_iter()
                    .filter_map(|elastomer| {
                        let value = self.model.get(&elastomer).cloned()?;
                        Some((elastomer, value))
                    })
                    .collect();
                let _ = reply.send(snapshot);
            }
            Command::Observe {
                elastomer,
                receipt,
                observer,
            } => self.observe(elastomer, receipt, observer),
            Command::Retire { receipt } => self.retire(receipt),
            Command::Repost { elastomer } => self.repost(&elastomer),
        }
    }

    /// Commits `value` and fans out one [`Mutation`] per observer, unless
    /// the slot already holds an equal value and filtering is on.
    ///
    /// Redundancy is judged against the value committed most recently
    /// before this step runs, not against whatever was current when the
    /// caller issued the write.
    fn stage(&mut self, elastomer: &Elastomer, value: ErasedValue, discard_redundant: bool) {
        let old = self.model.get(elastomer).cloned();
        if discard_redundant && elastomer.values_equal(old.as_ref(), Some(&value)) {
            tracing::trace!(key = %elastomer, "redundant stage discarded");
            return;
        }

        self.model.insert(elastomer.clone(), ErasedValue::clone(&value));
        tracing::debug!(key = %elastomer, "value committed");
        self.fan_out(elastomer, old, Some(value));
    }

    fn observe(&mut self, elastomer: Elastomer, receipt: ObserverReceipt, observer: Observer) {
        tracing::debug!(key = %elastomer, %receipt, "observer registered");
        self.observers
            .entry(elastomer.clone())
            .or_default()
            .insert(receipt, observer);
        self.receipt_index.insert(receipt, elastomer);
    }

    /// Idempotent: an unknown or already-retired receipt is a no-op.
    fn retire(&mut self, receipt: ObserverReceipt) {
        let Some(elastomer) = self.receipt_index.remove(&receipt) else {
            tracing::trace!(%receipt, "retire of unknown receipt ignored");
            return;
        };
        if let Some(registrations) = self.observers.get_mut(&elastomer) {
            registrations.remove(&receipt);
            if registrations.is_empty() {
                self.observers.remove(&elastomer);
            }
        }
        tracing::debug!(key = %elastomer, %receipt, "observer retired");
    }

    /// Delivers the current value to every observer of the slot, with
    /// old == new, so a late subscriber can receive the present state as if
    /// it had just changed.
    fn repost(&self, elastomer: &Elastomer) {
        let current = self.model.get(elastomer).cloned();
        self.fan_out(elastomer, current.clone(), current);
    }

    /// Schedules one delivery per observer registered at this instant.
    /// Relative order across observers is up to their contexts; order of
    /// successive deliveries to one observer follows commit order.
    fn fan_out(
        &self,
        elastomer: &Elastomer,
        old: Option<ErasedValue>,
        new: Option<ErasedValue>,
    ) {
        let Some(registrations) = self.observers.get(elastomer) else {
            return;
        };
        for (receipt, observer) in registrations {
            observer.deliver(Mutation {
                elastomer: elastomer.clone(),
                receipt: *receipt,
                old_value: old.clone(),
                new_value: new.clone(),
                timestamp: Instant::now(),
            });
        }
    }
}

/// Runs the serializer until every archive handle has been dropped.
pub(crate) async fn run(mut commands: mpsc::Receiver<Command>) {
    let mut state = State::default();
    while let Some(command) = commands.recv().await {
        state.apply(command);
    }
    tracing::debug!("serializer stopped");
}
