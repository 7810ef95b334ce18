//! Units of work funneled through the serializer.

use std::collections::HashMap;

use tokio::sync::oneshot;

use crate::domain::elastomer::ErasedValue;
use crate::domain::observer::Observer;
use crate::domain::{Elastomer, ObserverReceipt};

/// One serialized unit of work.
///
/// Every mutation and query of the shared model is expressed as a command
/// and processed strictly one at a time, in queue order.
pub(crate) enum Command {
    /// Commit a value (unless redundant) and fan out notifications.
    Stage {
        elastomer: Elastomer,
        value: ErasedValue,
        discard_redundant: bool,
    },
    /// Commit a batch of values in one step.
    StageMany {
        entries: Vec<(Elastomer, ErasedValue)>,
        discard_redundant: bool,
    },
    /// Snapshot one slot.
    Express {
        elastomer: Elastomer,
        reply: oneshot::Sender<Option<ErasedValue>>,
    },
    /// Snapshot several slots at one consistent point in the write order.
    ExpressMany {
        elastomers: Vec<Elastomer>,
        reply: oneshot::Sender<HashMap<Elastomer, ErasedValue>>,
    },
    /// Register an observer under a pre-issued receipt.
    Observe {
        elastomer: Elastomer,
        receipt: ObserverReceipt,
        observer: Observer,
    },
    /// Remove the registration behind a receipt, if it still exists.
    Retire { receipt: ObserverReceipt },
    /// Re-deliver the current value to every observer of a slot.
    Repost { elastomer: Elastomer },
}
