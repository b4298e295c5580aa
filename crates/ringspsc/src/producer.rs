use crate::invariants::debug_assert_bounded_occupancy;
use crate::trace;
use crate::{PushError, SpscQueue};
use crossbeam_utils::Backoff;
use std::fmt;
use std::sync::atomic::Ordering;

/// Write side of an [`SpscQueue`].
///
/// There is exactly one per [`split`](SpscQueue::split). All methods that
/// mutate the ring take `&mut self`, so a single producer is enforced by the
/// borrow checker. Send it to the producer thread.
pub struct Producer<'a, T, const N: usize> {
    queue: &'a SpscQueue<T, N>,
}

impl<'a, T, const N: usize> Producer<'a, T, N> {
    pub(crate) fn new(queue: &'a SpscQueue<T, N>) -> Self {
        Self { queue }
    }

    /// Copies `value` into the ring.
    ///
    /// Returns `false` without cloning if the ring is full. This is the
    /// backpressure signal, not an error.
    #[inline]
    pub fn push(&mut self, value: &T) -> bool
    where
        T: Clone,
    {
        match self.free_slot() {
            Some((write, next)) => {
                // SAFETY: free_slot proved the slot is outside [read, write).
                unsafe { self.publish(write, next, value.clone()) };
                true
            }
            None => false,
        }
    }

    /// Moves `value` into the ring, handing it back if the ring is full.
    #[inline]
    pub fn try_push(&mut self, value: T) -> Result<(), PushError<T>> {
        match self.free_slot() {
            Some((write, next)) => {
                // SAFETY: free_slot proved the slot is outside [read, write).
                unsafe { self.publish(write, next, value) };
                Ok(())
            }
            None => Err(PushError::Full(value)),
        }
    }

    /// Retries [`try_push`](Self::try_push) with adaptive backoff.
    ///
    /// Spins, then yields, then gives up and returns the value. Never parks
    /// the thread.
    pub fn push_with_backoff(&mut self, value: T) -> Result<(), PushError<T>> {
        let mut backoff = Backoff::new();
        let mut value = value;
        loop {
            match self.try_push(value) {
                Ok(()) => return Ok(()),
                Err(PushError::Full(rejected)) => {
                    if backoff.is_completed() {
                        trace::trace!(capacity = N, "push gave up after backoff");
                        return Err(PushError::Full(rejected));
                    }
                    value = rejected;
                    backoff.snooze();
                }
            }
        }
    }

    /// Returns the number of slots the producer can fill right now.
    ///
    /// Never more than the true number: the consumer can only free slots.
    #[inline]
    pub fn write_available(&self) -> usize {
        let write = self.queue.write_cursor().load(Ordering::Relaxed);
        let read = self.queue.read_cursor().load(Ordering::Acquire);
        N - SpscQueue::<T, N>::distance(read, write)
    }

    /// See [`SpscQueue::len`].
    #[inline]
    pub fn len(&self) -> usize {
        self.queue.len()
    }

    /// See [`SpscQueue::is_empty`].
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    /// See [`SpscQueue::is_full`].
    #[inline]
    pub fn is_full(&self) -> bool {
        self.queue.is_full()
    }

    /// Returns the number of usable slots, `N`.
    #[inline]
    pub const fn capacity(&self) -> usize {
        N
    }

    /// See [`SpscQueue::is_lock_free`].
    #[inline]
    pub const fn is_lock_free(&self) -> bool {
        self.queue.is_lock_free()
    }

    /// Returns `(write, advance(write))` if the slot at `write` is free.
    #[inline]
    fn free_slot(&self) -> Option<(usize, usize)> {
        // Relaxed: only this handle stores to `write`.
        let write = self.queue.write_cursor().load(Ordering::Relaxed);
        let next = SpscQueue::<T, N>::advance(write);

        // Acquire: pairs with the consumer's Release on `read`, so the slot
        // the consumer last vacated is fully destroyed before we reuse it.
        if next == self.queue.read_cursor().load(Ordering::Acquire) {
            return None;
        }
        Some((write, next))
    }

    /// Constructs `value` at `write`, then publishes `next`.
    ///
    /// # Safety
    ///
    /// `(write, next)` must come from `free_slot` with no publish since.
    #[inline]
    unsafe fn publish(&mut self, write: usize, next: usize, value: T) {
        self.queue.slot(write).write(value);

        debug_assert_bounded_occupancy!(
            SpscQueue::<T, N>::distance(self.queue.read_cursor().load(Ordering::Relaxed), next),
            N
        );

        // Release: the payload constructed above happens-before the
        // consumer's Acquire load that observes `next`.
        self.queue.write_cursor().store(next, Ordering::Release);
    }
}

impl<T, const N: usize> fmt::Debug for Producer<'_, T, N> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Producer")
            .field("capacity", &N)
            .field("write_available", &self.write_available())
            .finish()
    }
}
