//! Archive error types.
//!
//! The store's operational taxonomy is deliberately silent: type-mismatched
//! writes, redundant writes, unknown receipts, and reads of never-staged
//! keys are all no-ops, not errors. [`ArchiveError`] covers only the two
//! conditions a caller awaiting a reply must be able to observe.

/// Failure reported to an awaited read when the serializer cannot answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum ArchiveError {
    /// The serializer task has shut down because its runtime ended.
    #[error("archive serializer has shut down")]
    Closed,

    /// The command queue was full when the read was submitted.
    #[error("archive command queue is full")]
    Overloaded,
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;

    #[test]
    fn display_names_the_condition() {
        assert_eq!(
            ArchiveError::Closed.to_string(),
            "archive serializer has shut down"
        );
        assert_eq!(
            ArchiveError::Overloaded.to_string(),
            "archive command queue is full"
        );
    }
}
