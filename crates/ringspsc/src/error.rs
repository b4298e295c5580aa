use std::fmt;
use thiserror::Error;

/// Error returned by [`Producer::try_push`](crate::Producer::try_push) when
/// the ring has no free slot.
///
/// The rejected value is handed back so the caller can retry without cloning.
#[derive(Clone, Copy, PartialEq, Eq, Error)]
pub enum PushError<T> {
    /// All `N` usable slots are occupied.
    #[error("queue is full")]
    Full(T),
}

impl<T> PushError<T> {
    /// Returns the value that could not be pushed.
    pub fn into_inner(self) -> T {
        match self {
            PushError::Full(value) => value,
        }
    }

    /// Returns true if the push failed because the ring was full.
    pub fn is_full(&self) -> bool {
        matches!(self, PushError::Full(_))
    }
}

// Manual impl so `T: Debug` is not required to unwrap a push result.
impl<T> fmt::Debug for PushError<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PushError::Full(_) => f.write_str("Full(..)"),
        }
    }
}

/// Error types for queue construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum QueueError {
    /// `(N + 1) * size_of::<T>()` does not fit in an allocation.
    #[error("ring of {slots} slots overflows the maximum allocation size")]
    CapacityOverflow {
        /// Number of slots requested (capacity + 1).
        slots: usize,
    },
    /// The global allocator could not provide the storage block.
    #[error("failed to allocate {bytes} bytes for {slots} ring slots")]
    AllocationFailed {
        /// Number of slots requested (capacity + 1).
        slots: usize,
        /// Size of the requested block in bytes.
        bytes: usize,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_push_error_returns_value() {
        let err = PushError::Full(String::from("rejected"));
        assert!(err.is_full());
        assert_eq!(err.to_string(), "queue is full");
        assert_eq!(err.into_inner(), "rejected");
    }

    #[test]
    fn test_queue_error_messages() {
        let err = QueueError::AllocationFailed { slots: 5, bytes: 40 };
        assert_eq!(err.to_string(), "failed to allocate 40 bytes for 5 ring slots");

        let err = QueueError::CapacityOverflow { slots: 9 };
        assert_eq!(
            err.to_string(),
            "ring of 9 slots overflows the maximum allocation size"
        );
    }
}
