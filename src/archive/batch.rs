//! Bulk operations over groups of keys.
//!
//! Thin conveniences layered on the same serializer: a bulk read or bulk
//! write occupies one serialized step, so the whole group is applied (or
//! snapshotted) at a single consistent point in the write order.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::oneshot;

use crate::context::ExecutionContext;
use crate::domain::elastomer::ErasedValue;
use crate::domain::observer::{Observer, ObserverCallback};
use crate::domain::{Elastomer, Mutation, ObserverReceipt};
use crate::error::ArchiveError;

use super::Archive;
use super::command::Command;

impl Archive {
    /// Stages a batch of pre-erased values in one serialized step.
    ///
    /// Each entry is type-checked up front; non-conforming entries are
    /// dropped with a warning, exactly as in [`stage`](Self::stage). The
    /// surviving entries commit together: no read can observe some of them
    /// applied and others not. Redundancy filtering and notification
    /// fan-out still apply per entry.
    pub fn stage_many(
        &self,
        entries: impl IntoIterator<Item = (Elastomer, ErasedValue)>,
        discard_redundant: bool,
    ) {
        let admitted: Vec<(Elastomer, ErasedValue)> = entries
            .into_iter()
            .filter(|(elastomer, value)| {
                if elastomer.admits(&**value) {
                    true
                } else {
                    tracing::warn!(
                        key = %elastomer,
                        expected = elastomer.type_name(),
                        "bulk stage entry rejected: value is not of the key's associated type"
                    );
                    false
                }
            })
            .collect();
        if admitted.is_empty() {
            return;
        }
        self.submit(Command::StageMany {
            entries: admitted,
            discard_redundant,
        });
    }

    /// Reads several slots at one consistent point in the write order.
    ///
    /// The returned map reflects a single serialized step: it cannot show
    /// one key updated by a write while missing an earlier-enqueued write
    /// to another. Never-staged keys are omitted.
    ///
    /// # Errors
    ///
    /// Returns [`ArchiveError::Closed`] if the serializer has shut down, or
    /// [`ArchiveError::Overloaded`] if the command queue is full.
    pub async fn express_many(
        &self,
        elastomers: &[Elastomer],
    ) -> Result<HashMap<Elastomer, ErasedValue>, ArchiveError> {
        let (reply, response) = oneshot::channel();
        self.try_submit(Command::ExpressMany {
            elastomers: elastomers.to_vec(),
            reply,
        })?;
        response.await.map_err(|_| ArchiveError::Closed)
    }

    /// Registers the same callback independently for each key.
    ///
    /// Every key gets its own registration and receipt; the returned map
    /// is keyed by elastomer. Receipts are retired individually or via
    /// [`retire_all`](Self::retire_all). The callback can tell deliveries
    /// apart through [`Mutation::elastomer`].
    pub fn observe_many<F>(
        &self,
        elastomers: &[Elastomer],
        context: Arc<dyn ExecutionContext>,
        callback: F,
    ) -> HashMap<Elastomer, ObserverReceipt>
    where
        F: Fn(Mutation) + Send + Sync + 'static,
    {
        let callback: ObserverCallback = Arc::new(callback);
        elastomers
            .iter()
            .map(|elastomer| {
                let receipt = ObserverReceipt::new();
                self.submit(Command::Observe {
                    elastomer: elastomer.clone(),
                    receipt,
                    observer: Observer::new(Arc::clone(&context), Arc::clone(&callback)),
                });
                (elastomer.clone(), receipt)
            })
            .collect()
    }

    /// Retires a group of registrations, one by one.
    pub fn retire_all(&self, receipts: impl IntoIterator<Item = ObserverReceipt>) {
        for receipt in receipts {
            self.retire(receipt);
        }
    }
}
