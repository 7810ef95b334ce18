//! Archive construction options.
//!
//! The archive is a library-embedded primitive, so configuration is passed
//! at construction rather than read from the environment. Defaults suit a
//! process-wide store; see [`ArchiveConfig`].

/// Default capacity of the serializer's command queue.
pub const DEFAULT_COMMAND_CAPACITY: usize = 10_000;

/// Construction-time options for an [`Archive`](crate::Archive).
#[derive(Debug, Clone)]
pub struct ArchiveConfig {
    /// Capacity of the serializer's command queue.
    ///
    /// Producers never block: when the queue is full, fire-and-forget
    /// commands are dropped with a warning and awaited reads report
    /// [`ArchiveError::Overloaded`](crate::ArchiveError::Overloaded). The
    /// default keeps that path out of reach of normal use.
    pub command_capacity: usize,
}

impl Default for ArchiveConfig {
    fn default() -> Self {
        Self {
            command_capacity: DEFAULT_COMMAND_CAPACITY,
        }
    }
}
