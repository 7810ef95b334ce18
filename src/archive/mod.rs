//! The archive: a process-wide observable model behind one serializer.
//!
//! [`Archive`] is a cheap-to-clone handle; every clone talks to the same
//! serializer task, which is the sole reader and writer of the shared
//! model. Writes, reads, registrations, and retirements are all funneled
//! through its command queue and processed strictly one at a time, so all
//! callers observe a single total order of mutations without taking a lock
//! anywhere.
//!
//! No operation blocks its caller: writes and registrations enqueue and
//! return, reads are `async` and resolve when the serializer replies.

pub(crate) mod command;
pub(crate) mod serializer;

mod batch;

use std::any::Any;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, oneshot};

use crate::config::ArchiveConfig;
use crate::context::ExecutionContext;
use crate::domain::elastomer::ErasedValue;
use crate::domain::observer::Observer;
use crate::domain::{Elastomer, Mutation, ObserverReceipt};
use crate::error::ArchiveError;

use command::Command;

/// Handle to an in-process observable key-value store.
///
/// Create one per process (or per independent model) and share clones. The
/// serializer task ends once every clone has been dropped; registered
/// observers are dropped with it.
#[derive(Debug, Clone)]
pub struct Archive {
    commands: mpsc::Sender<Command>,
}

impl Archive {
    /// Creates an archive with default options and spawns its serializer.
    ///
    /// # Panics
    ///
    /// Panics if called outside a tokio runtime.
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(&ArchiveConfig::default())
    }

    /// Creates an archive with the given options and spawns its serializer.
    ///
    /// # Panics
    ///
    /// Panics if called outside a tokio runtime.
    #[must_use]
    pub fn with_config(config: &ArchiveConfig) -> Self {
        let (commands, receiver) = mpsc::channel(config.command_capacity);
        tokio::spawn(serializer::run(receiver));
        Self { commands }
    }

    /// Stages `value` for `elastomer`.
    ///
    /// The value is type-checked here, in the caller's context: a value
    /// that is not an instance of the key's associated type is dropped with
    /// a warning and nothing is enqueued. Otherwise the write is committed
    /// by the serializer in queue order; with `discard_redundant` set, a
    /// value equal to the one current at commit time is discarded without
    /// notification.
    pub fn stage(
        &self,
        elastomer: &Elastomer,
        value: impl Any + Send + Sync,
        discard_redundant: bool,
    ) {
        let Some(value) = self.admit(elastomer, value) else {
            return;
        };
        self.submit(Command::Stage {
            elastomer: elastomer.clone(),
            value,
            discard_redundant,
        });
    }

    /// Stages `value` after `delay`, without blocking the caller.
    ///
    /// The type check happens now; the enqueue happens once the delay has
    /// elapsed, so the write takes its place in the total order at that
    /// later point. A delayed write cannot be cancelled once scheduled.
    ///
    /// # Panics
    ///
    /// Panics if called outside a tokio runtime.
    pub fn stage_after(
        &self,
        elastomer: &Elastomer,
        value: impl Any + Send + Sync,
        delay: Duration,
        discard_redundant: bool,
    ) {
        let Some(value) = self.admit(elastomer, value) else {
            return;
        };
        let commands = self.commands.clone();
        let command = Command::Stage {
            elastomer: elastomer.clone(),
            value,
            discard_redundant,
        };
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            if commands.try_send(command).is_err() {
                tracing::debug!("delayed stage dropped; serializer unavailable");
            }
        });
    }

    /// Reads the current value for `elastomer`.
    ///
    /// The read is linearized with writes through the serializer: it
    /// reflects every write committed before it is processed and none
    /// committed after. A never-staged key yields `Ok(None)`.
    ///
    /// # Errors
    ///
    /// Returns [`ArchiveError::Closed`] if the serializer has shut down, or
    /// [`ArchiveError::Overloaded`] if the command queue is full.
    pub async fn express(
        &self,
        elastomer: &Elastomer,
    ) -> Result<Option<ErasedValue>, ArchiveError> {
        let (reply, response) = oneshot::channel();
        self.try_submit(Command::Express {
            elastomer: elastomer.clone(),
            reply,
        })?;
        response.await.map_err(|_| ArchiveError::Closed)
    }

    /// Reads the current value for `elastomer`, downcast and cloned as `T`.
    ///
    /// Yields `Ok(None)` for a never-staged key, and also when the stored
    /// value is not a `T` (possible only if `T` differs from the key's
    /// associated type).
    ///
    /// # Errors
    ///
    /// Returns [`ArchiveError::Closed`] if the serializer has shut down, or
    /// [`ArchiveError::Overloaded`] if the command queue is full.
    pub async fn express_as<T>(&self, elastomer: &Elastomer) -> Result<Option<T>, ArchiveError>
    where
        T: Any + Clone,
    {
        let value = self.express(elastomer).await?;
        Ok(value.and_then(|value| value.downcast_ref::<T>().cloned()))
    }

    /// Registers `callback` to run on `context` after every commit to
    /// `elastomer`, and returns the retirement receipt.
    ///
    /// The receipt is issued immediately; the registration itself takes its
    /// place in the serializer's order, so it sees exactly the writes
    /// enqueued after it. Each delivery is scheduled on `context` outside
    /// the serialized step; successive deliveries to one registration
    /// arrive in commit order.
    pub fn observe<F>(
        &self,
        elastomer: &Elastomer,
        context: Arc<dyn ExecutionContext>,
        callback: F,
    ) -> ObserverReceipt
    where
        F: Fn(Mutation) + Send + Sync + 'static,
    {
        let receipt = ObserverReceipt::new();
        self.submit(Command::Observe {
            elastomer: elastomer.clone(),
            receipt,
            observer: Observer::new(context, Arc::new(callback)),
        });
        receipt
    }

    /// Retires the registration behind `receipt`.
    ///
    /// Idempotent: an unknown or already-retired receipt is a no-op. Other
    /// observers of the same key are undisturbed.
    pub fn retire(&self, receipt: ObserverReceipt) {
        self.submit(Command::Retire { receipt });
    }

    /// Re-delivers the current value of `elastomer` to all of its
    /// observers, with old == new, as if it had just changed. Useful for
    /// handing a late subscriber the present state.
    pub fn repost(&self, elastomer: &Elastomer) {
        self.submit(Command::Repost {
            elastomer: elastomer.clone(),
        });
    }

    /// [`repost`](Self::repost) after `delay`, without blocking the caller.
    ///
    /// # Panics
    ///
    /// Panics if called outside a tokio runtime.
    pub fn repost_after(&self, elastomer: &Elastomer, delay: Duration) {
        let commands = self.commands.clone();
        let command = Command::Repost {
            elastomer: elastomer.clone(),
        };
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            if commands.try_send(command).is_err() {
                tracing::debug!("delayed repost dropped; serializer unavailable");
            }
        });
    }

    /// Type guard shared by the staging paths. Returns the erased value, or
    /// `None` (after logging) when the value does not conform to the key.
    fn admit(
        &self,
        elastomer: &Elastomer,
        value: impl Any + Send + Sync,
    ) -> Option<ErasedValue> {
        if elastomer.admits(&value) {
            Some(Arc::new(value))
        } else {
            tracing::warn!(
                key = %elastomer,
                expected = elastomer.type_name(),
                "stage rejected: value is not of the key's associated type"
            );
            None
        }
    }

    /// Enqueues a fire-and-forget command; failures degrade to logged
    /// no-ops.
    fn submit(&self, command: Command) {
        let _ = self.try_submit(command);
    }

    /// Enqueues a command without blocking.
    fn try_submit(&self, command: Command) -> Result<(), ArchiveError> {
        match self.commands.try_send(command) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(_)) => {
                tracing::warn!("archive command queue full; command dropped");
                Err(ArchiveError::Overloaded)
            }
            Err(TrySendError::Closed(_)) => {
                tracing::debug!("archive serializer closed; command dropped");
                Err(ArchiveError::Closed)
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use tokio::sync::mpsc::UnboundedReceiver;

    use crate::context::SerialContext;

    use super::*;

    fn observe_into_channel(
        archive: &Archive,
        key: &Elastomer,
    ) -> (ObserverReceipt, UnboundedReceiver<Mutation>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let context: Arc<dyn ExecutionContext> = Arc::new(SerialContext::new());
        let receipt = archive.observe(key, context, move |mutation| {
            let _ = tx.send(mutation);
        });
        (receipt, rx)
    }

    async fn next_mutation(rx: &mut UnboundedReceiver<Mutation>) -> Mutation {
        match tokio::time::timeout(Duration::from_secs(2), rx.recv()).await {
            Ok(Some(mutation)) => mutation,
            _ => panic!("expected a delivery"),
        }
    }

    /// Lets spawned tasks (delayed stages, context workers) run to
    /// quiescence on the current-thread test runtime.
    async fn settle() {
        for _ in 0..8 {
            tokio::task::yield_now().await;
        }
    }

    #[tokio::test]
    async fn stage_then_express_reads_own_write() {
        let archive = Archive::new();
        let flag = Elastomer::new::<bool>("flag");

        archive.stage(&flag, true, true);

        assert_eq!(archive.express_as::<bool>(&flag).await, Ok(Some(true)));
    }

    #[tokio::test]
    async fn express_of_never_staged_key_is_none() {
        let archive = Archive::new();
        let flag = Elastomer::new::<bool>("flag");

        assert_eq!(archive.express(&flag).await, Ok(None));
        assert_eq!(archive.express_as::<bool>(&flag).await, Ok(None));
    }

    #[tokio::test]
    async fn mismatched_type_never_commits() {
        let archive = Archive::new();
        let flag = Elastomer::new::<bool>("flag");

        archive.stage(&flag, 1i64, true);
        assert_eq!(archive.express_as::<bool>(&flag).await, Ok(None));

        archive.stage(&flag, true, true);
        archive.stage(&flag, "open".to_string(), true);
        assert_eq!(archive.express_as::<bool>(&flag).await, Ok(Some(true)));
    }

    #[tokio::test]
    async fn same_name_different_type_are_independent_slots() {
        let archive = Archive::new();
        let as_bool = Elastomer::new::<bool>("kindred");
        let as_int = Elastomer::new::<i64>("kindred");

        archive.stage(&as_bool, true, true);
        archive.stage(&as_int, 9i64, true);

        assert_eq!(archive.express_as::<bool>(&as_bool).await, Ok(Some(true)));
        assert_eq!(archive.express_as::<i64>(&as_int).await, Ok(Some(9)));
    }

    #[tokio::test]
    async fn redundant_stage_notifies_once() {
        let archive = Archive::new();
        let flag = Elastomer::new::<bool>("flag");
        let (_receipt, mut deliveries) = observe_into_channel(&archive, &flag);

        archive.stage(&flag, true, true);
        archive.stage(&flag, true, true);
        archive.stage(&flag, false, true);

        let first = next_mutation(&mut deliveries).await;
        assert_eq!(first.new_as::<bool>(), Some(&true));

        // Per-observer deliveries follow commit order, so if the repeated
        // stage had not been discarded it would arrive before this one.
        let second = next_mutation(&mut deliveries).await;
        assert_eq!(second.old_as::<bool>(), Some(&true));
        assert_eq!(second.new_as::<bool>(), Some(&false));
    }

    #[tokio::test]
    async fn redundancy_override_notifies_twice() {
        let archive = Archive::new();
        let flag = Elastomer::new::<bool>("flag");
        let (_receipt, mut deliveries) = observe_into_channel(&archive, &flag);

        archive.stage(&flag, true, false);
        archive.stage(&flag, true, false);

        let first = next_mutation(&mut deliveries).await;
        assert_eq!(first.new_as::<bool>(), Some(&true));
        let second = next_mutation(&mut deliveries).await;
        assert_eq!(second.old_as::<bool>(), Some(&true));
        assert_eq!(second.new_as::<bool>(), Some(&true));
    }

    #[tokio::test(start_paused = true)]
    async fn delayed_stage_applies_after_the_delay() {
        let archive = Archive::new();
        let counter = Elastomer::new::<i64>("counter");

        archive.stage(&counter, 1i64, true);
        archive.stage_after(&counter, 2i64, Duration::from_secs(5), true);

        assert_eq!(archive.express_as::<i64>(&counter).await, Ok(Some(1)));

        tokio::time::advance(Duration::from_secs(6)).await;
        settle().await;

        assert_eq!(archive.express_as::<i64>(&counter).await, Ok(Some(2)));
    }

    #[tokio::test]
    async fn retired_observer_stops_while_others_continue() {
        let archive = Archive::new();
        let flag = Elastomer::new::<bool>("flag");
        let (first_receipt, mut first) = observe_into_channel(&archive, &flag);
        let (_second_receipt, mut second) = observe_into_channel(&archive, &flag);

        archive.stage(&flag, true, true);
        assert_eq!(next_mutation(&mut first).await.new_as::<bool>(), Some(&true));
        assert_eq!(next_mutation(&mut second).await.new_as::<bool>(), Some(&true));

        archive.retire(first_receipt);
        archive.stage(&flag, false, true);

        assert_eq!(
            next_mutation(&mut second).await.new_as::<bool>(),
            Some(&false)
        );
        // The retirement preceded the second stage in serializer order, so
        // no delivery was ever scheduled for the retired registration.
        settle().await;
        assert!(first.try_recv().is_err());
    }

    #[tokio::test]
    async fn repost_delivers_current_state_as_a_change() {
        let archive = Archive::new();
        let counter = Elastomer::new::<i64>("counter");
        archive.stage(&counter, 42i64, true);

        let (_receipt, mut deliveries) = observe_into_channel(&archive, &counter);
        archive.repost(&counter);

        let mutation = next_mutation(&mut deliveries).await;
        assert_eq!(mutation.old_as::<i64>(), Some(&42));
        assert_eq!(mutation.new_as::<i64>(), Some(&42));
    }

    #[tokio::test]
    async fn observer_sees_only_writes_enqueued_after_registration() {
        let archive = Archive::new();
        let counter = Elastomer::new::<i64>("counter");

        archive.stage(&counter, 1i64, true);
        let (_receipt, mut deliveries) = observe_into_channel(&archive, &counter);
        archive.stage(&counter, 2i64, true);

        let mutation = next_mutation(&mut deliveries).await;
        assert_eq!(mutation.old_as::<i64>(), Some(&1));
        assert_eq!(mutation.new_as::<i64>(), Some(&2));
    }

    #[tokio::test]
    async fn deliveries_to_one_observer_follow_commit_order() {
        let archive = Archive::new();
        let counter = Elastomer::new::<i64>("counter");
        let (_receipt, mut deliveries) = observe_into_channel(&archive, &counter);

        for value in 1..=5i64 {
            archive.stage(&counter, value, true);
        }

        for expected in 1..=5i64 {
            let mutation = next_mutation(&mut deliveries).await;
            assert_eq!(mutation.new_as::<i64>(), Some(&expected));
        }
    }

    #[tokio::test(start_paused = true)]
    async fn flag_scenario_end_to_end() {
        let archive = Archive::new();
        let flag = Elastomer::new::<bool>("flag");

        archive.stage(&flag, true, true);
        assert_eq!(archive.express_as::<bool>(&flag).await, Ok(Some(true)));

        archive.stage_after(&flag, false, Duration::from_secs(1), true);
        assert_eq!(archive.express_as::<bool>(&flag).await, Ok(Some(true)));

        tokio::time::advance(Duration::from_millis(1_100)).await;
        settle().await;
        assert_eq!(archive.express_as::<bool>(&flag).await, Ok(Some(false)));

        let (_receipt, mut deliveries) = observe_into_channel(&archive, &flag);
        archive.stage(&flag, true, true);

        let mutation = next_mutation(&mut deliveries).await;
        assert_eq!(mutation.old_as::<bool>(), Some(&false));
        assert_eq!(mutation.new_as::<bool>(), Some(&true));
    }

    #[test]
    #[allow(clippy::unwrap_used)]
    fn operations_after_shutdown_degrade_gracefully() {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_time()
            .build()
            .unwrap();
        let archive = runtime.block_on(async { Archive::new() });
        drop(runtime); // kills the serializer task

        let flag = Elastomer::new::<bool>("flag");
        archive.stage(&flag, true, true); // silent no-op
        archive.retire(ObserverReceipt::new()); // silent no-op

        let reader = tokio::runtime::Builder::new_current_thread()
            .enable_time()
            .build()
            .unwrap();
        let result = reader.block_on(archive.express(&flag));
        assert_eq!(result, Err(ArchiveError::Closed));
    }
}
