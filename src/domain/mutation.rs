//! Per-delivery change record.
//!
//! One [`Mutation`] is built for every (write, observer) pair inside the
//! serialized step and delivered on the observer's own execution context.
//! It is never stored; it exists only for the duration of one delivery.

use std::fmt;
use std::time::Instant;

use super::elastomer::ErasedValue;
use super::{Elastomer, ObserverReceipt};

/// Ephemeral record describing one committed change, as seen by one
/// observer.
///
/// For a force-notify delivery, `old_value` and `new_value` both carry the
/// current value (both absent if the slot was never staged).
pub struct Mutation {
    /// Key whose slot changed.
    pub elastomer: Elastomer,
    /// Receipt of the registration this record is addressed to.
    pub receipt: ObserverReceipt,
    /// Value before the commit; absent if the slot had never been staged.
    pub old_value: Option<ErasedValue>,
    /// Value after the commit.
    pub new_value: Option<ErasedValue>,
    /// Monotonic instant captured when the record was built, inside the
    /// serialized step.
    pub timestamp: Instant,
}

impl Mutation {
    /// Downcasts the pre-commit value to `T`.
    #[must_use]
    pub fn old_as<T: 'static>(&self) -> Option<&T> {
        self.old_value.as_ref().and_then(|value| value.downcast_ref::<T>())
    }

    /// Downcasts the post-commit value to `T`.
    #[must_use]
    pub fn new_as<T: 'static>(&self) -> Option<&T> {
        self.new_value.as_ref().and_then(|value| value.downcast_ref::<T>())
    }
}

impl fmt::Debug for Mutation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Mutation")
            .field("elastomer", &self.elastomer)
            .field("receipt", &self.receipt)
            .field("old_value", if self.old_value.is_some() { &"present" } else { &"absent" })
            .field("new_value", if self.new_value.is_some() { &"present" } else { &"absent" })
            .field("timestamp", &self.timestamp)
            .finish()
    }
}
