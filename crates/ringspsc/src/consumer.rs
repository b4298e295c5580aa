use crate::invariants::debug_assert_occupied;
use crate::SpscQueue;
use crossbeam_utils::Backoff;
use std::fmt;
use std::marker::PhantomData;
use std::ops::Deref;
use std::sync::atomic::Ordering;

/// Read side of an [`SpscQueue`].
///
/// There is exactly one per [`split`](SpscQueue::split). All methods that
/// mutate the ring take `&mut self`, so a single consumer is enforced by the
/// borrow checker. Send it to the consumer thread.
pub struct Consumer<'a, T, const N: usize> {
    queue: &'a SpscQueue<T, N>,
    /// Slot borrowed by the outstanding [`Peek`], if any.
    pending: usize,
}

impl<'a, T, const N: usize> Consumer<'a, T, N> {
    pub(crate) fn new(queue: &'a SpscQueue<T, N>) -> Self {
        Self {
            queue,
            pending: queue.read_cursor().load(Ordering::Relaxed),
        }
    }

    /// Removes the oldest element.
    ///
    /// Returns `None` if the ring is empty.
    #[inline]
    pub fn pop(&mut self) -> Option<T> {
        let read = self.occupied_slot()?;
        // SAFETY: occupied_slot proved `read` is in [read, write).
        let value = unsafe { self.queue.slot(read).read() };
        self.vacate(read);
        Some(value)
    }

    /// Moves the oldest element into `out`.
    ///
    /// Returns `false` and leaves `out` untouched if the ring is empty. The
    /// previous value of `out` is dropped on success.
    #[inline]
    pub fn pop_into(&mut self, out: &mut T) -> bool {
        match self.pop() {
            Some(value) => {
                *out = value;
                true
            }
            None => false,
        }
    }

    /// Borrows the oldest element without removing it.
    ///
    /// The returned [`Peek`] holds the consumer mutably, so no other
    /// consumer operation can run until it is released or dropped. Call
    /// [`Peek::release`] to remove the element; dropping the `Peek` leaves it
    /// in the ring.
    #[inline]
    pub fn front(&mut self) -> Option<Peek<'_, 'a, T, N>> {
        self.pending = self.occupied_slot()?;
        Some(Peek {
            consumer: self,
            _marker: PhantomData,
        })
    }

    /// Runs `f` on the oldest element in place, then drops it.
    ///
    /// Returns `false` without calling `f` if the ring is empty. If `f`
    /// panics the element stays in the ring. If the element's destructor
    /// panics, the slot has already been freed.
    #[inline]
    pub fn consume_one<F>(&mut self, f: F) -> bool
    where
        F: FnOnce(&T),
    {
        let Some(read) = self.occupied_slot() else {
            return false;
        };
        let slot = self.queue.slot(read);
        // SAFETY: occupied_slot proved `read` is in [read, write). The
        // payload is moved out only after `f` returns.
        let value = unsafe {
            f(slot.get());
            slot.read()
        };
        self.vacate(read);
        drop(value);
        true
    }

    /// Runs `f` on every published element, then frees them all with a
    /// single cursor store.
    ///
    /// Elements pushed while this runs are left for the next call. Returns
    /// the number of elements consumed.
    pub fn consume_all<F>(&mut self, mut f: F) -> usize
    where
        F: FnMut(&T),
    {
        let read = self.queue.read_cursor().load(Ordering::Relaxed);
        let write = self.queue.write_cursor().load(Ordering::Acquire);
        if read == write {
            return 0;
        }

        // Publishes progress even if `f` panics, so consumed slots are not
        // dropped a second time by the queue.
        let mut batch = BatchRead {
            queue: self.queue,
            pos: read,
        };

        while batch.pos != write {
            debug_assert_occupied!(batch.pos, read, write, SpscQueue::<T, N>::SLOTS);

            let slot = self.queue.slot(batch.pos);
            // SAFETY: every slot in [read, write) was published by the
            // producer and observed through the Acquire load of `write`.
            let value = unsafe {
                f(slot.get());
                slot.read()
            };
            // Past this slot before the destructor runs.
            batch.pos = SpscQueue::<T, N>::advance(batch.pos);
            drop(value);
        }

        SpscQueue::<T, N>::distance(read, write)
    }

    /// Retries [`pop`](Self::pop) with adaptive backoff.
    ///
    /// Spins, then yields, then gives up and returns `None`. Never parks the
    /// thread.
    pub fn pop_with_backoff(&mut self) -> Option<T> {
        let mut backoff = Backoff::new();
        loop {
            if let Some(value) = self.pop() {
                return Some(value);
            }
            if backoff.is_completed() {
                return None;
            }
            backoff.snooze();
        }
    }

    /// Returns the number of elements the consumer can take right now.
    ///
    /// Never more than the true number: the producer can only add elements.
    #[inline]
    pub fn read_available(&self) -> usize {
        let read = self.queue.read_cursor().load(Ordering::Relaxed);
        let write = self.queue.write_cursor().load(Ordering::Acquire);
        SpscQueue::<T, N>::distance(read, write)
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

    /// Returns the read cursor if it points at a published element.
    #[inline]
    fn occupied_slot(&self) -> Option<usize> {
        // Acquire: pairs with the producer's Release on `write`, so the
        // payload at `read` is fully constructed.
        let write = self.queue.write_cursor().load(Ordering::Acquire);
        // Relaxed: only this handle stores to `read`.
        let read = self.queue.read_cursor().load(Ordering::Relaxed);
        (read != write).then_some(read)
    }

    /// Hands slot `read` back to the producer.
    #[inline]
    fn vacate(&mut self, read: usize) {
        let next = SpscQueue::<T, N>::advance(read);
        // Release: the destruction of the payload happens-before the
        // producer's Acquire load that observes `next`.
        self.queue.read_cursor().store(next, Ordering::Release);
    }
}

impl<T, const N: usize> fmt::Debug for Consumer<'_, T, N> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Consumer")
            .field("capacity", &N)
            .field("read_available", &self.read_available())
            .finish()
    }
}

/// Releases the batch processed so far by [`Consumer::consume_all`].
struct BatchRead<'q, T, const N: usize> {
    queue: &'q SpscQueue<T, N>,
    pos: usize,
}

impl<T, const N: usize> Drop for BatchRead<'_, T, N> {
    fn drop(&mut self) {
        self.queue.read_cursor().store(self.pos, Ordering::Release);
    }
}

// =============================================================================
// PEEK
// =============================================================================

/// Borrowed view of the oldest element, returned by [`Consumer::front`].
///
/// Dereferences to the element. [`release`](Peek::release) drops it and
/// frees the slot; dropping the `Peek` instead leaves the ring unchanged.
///
/// A `Peek` hands out `&T`, so it is only `Sync` when `T` is:
///
/// ```compile_fail
/// use ringspsc_rs::SpscQueue;
/// use std::cell::Cell;
///
/// fn assert_sync<S: Sync>(_: &S) {}
///
/// let mut queue = SpscQueue::<Cell<u64>, 2>::new();
/// let (mut producer, mut consumer) = queue.split();
/// assert!(producer.try_push(Cell::new(0)).is_ok());
///
/// let peek = consumer.front().unwrap();
/// assert_sync(&peek);
/// ```
pub struct Peek<'c, 'a, T, const N: usize> {
    consumer: &'c mut Consumer<'a, T, N>,
    _marker: PhantomData<&'c T>,
}

impl<T, const N: usize> Peek<'_, '_, T, N> {
    /// Drops the peeked element and frees its slot.
    ///
    /// Equivalent to the `pop` that would have returned this element. The
    /// slot is freed before the element's destructor runs.
    #[inline]
    pub fn release(self) {
        let pending = self.consumer.pending;

        #[cfg(debug_assertions)]
        {
            let queue = self.consumer.queue;
            debug_assert_occupied!(
                pending,
                queue.read_cursor().load(Ordering::Relaxed),
                queue.write_cursor().load(Ordering::Relaxed),
                SpscQueue::<T, N>::SLOTS
            );
        }

        drop(self.take());
    }

    /// Moves the peeked element out and frees its slot.
    #[inline]
    pub fn take(self) -> T {
        let pending = self.consumer.pending;
        // SAFETY: `pending` was occupied when the Peek was created, and the
        // mutable borrow of the consumer kept `read` from moving since.
        let value = unsafe { self.consumer.queue.slot(pending).read() };
        self.consumer.vacate(pending);
        value
    }
}

impl<T, const N: usize> Deref for Peek<'_, '_, T, N> {
    type Target = T;

    #[inline]
    fn deref(&self) -> &T {
        // SAFETY: the slot stays occupied while the Peek borrows the consumer.
        unsafe { self.consumer.queue.slot(self.consumer.pending).get() }
    }
}

impl<T: fmt::Debug, const N: usize> fmt::Debug for Peek<'_, '_, T, N> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Peek").field(&**self).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::Peek;
    use crate::SpscQueue;
    use std::panic::{catch_unwind, AssertUnwindSafe};
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::Arc;

    #[test]
    fn test_fifo_order() {
        let mut queue = SpscQueue::<u32, 4>::new();
        let (mut producer, mut consumer) = queue.split();

        for i in 1..=3 {
            assert!(producer.push(&i));
        }
        assert_eq!(consumer.pop(), Some(1));
        assert_eq!(consumer.pop(), Some(2));
        assert_eq!(consumer.pop(), Some(3));
        assert_eq!(consumer.pop(), None);
    }

    #[test]
    fn test_full_empty_round_trip() {
        let mut queue = SpscQueue::<u32, 3>::new();
        let (mut producer, mut consumer) = queue.split();

        assert!(consumer.is_empty());
        for i in 0..3 {
            assert!(producer.push(&i));
        }
        assert!(!producer.push(&3));
        assert_eq!(consumer.len(), 3);

        let mut out = 0;
        for expected in 0..3 {
            assert!(consumer.pop_into(&mut out));
            assert_eq!(out, expected);
        }
        assert!(consumer.is_empty());

        out = 42;
        assert!(!consumer.pop_into(&mut out));
        assert_eq!(out, 42, "out must be untouched on empty pop");
    }

    #[test]
    fn test_wrap_around() {
        let mut queue = SpscQueue::<u64, 3>::new();
        let (mut producer, mut consumer) = queue.split();

        for round in 0..10u64 {
            assert!(producer.try_push(round * 2).is_ok());
            assert!(producer.try_push(round * 2 + 1).is_ok());
            assert_eq!(consumer.pop(), Some(round * 2));
            assert_eq!(consumer.pop(), Some(round * 2 + 1));
        }
        assert!(consumer.is_empty());
    }

    #[test]
    fn test_front_does_not_consume() {
        let mut queue = SpscQueue::<String, 4>::new();
        let (mut producer, mut consumer) = queue.split();

        assert!(consumer.front().is_none());
        assert!(producer.try_push("a".to_string()).is_ok());

        {
            let peek = consumer.front().expect("element expected");
            assert_eq!(peek.as_str(), "a");
            // dropped without release
        }
        assert_eq!(consumer.len(), 1);

        let peek = consumer.front().expect("element expected");
        assert_eq!(*peek, "a");
        peek.release();
        assert!(consumer.is_empty());
    }

    #[test]
    fn test_front_release_matches_pop() {
        let mut a = SpscQueue::<u32, 3>::new();
        let mut b = SpscQueue::<u32, 3>::new();
        {
            let (mut pa, mut ca) = a.split();
            let (mut pb, mut cb) = b.split();
            for i in 0..3 {
                assert!(pa.push(&i));
                assert!(pb.push(&i));
            }

            ca.front().expect("element expected").release();
            assert_eq!(cb.pop(), Some(0));

            assert_eq!(ca.len(), cb.len());
            assert_eq!(ca.pop(), cb.pop());
        }
        assert_eq!(format!("{:?}", a), format!("{:?}", b));
    }

    #[test]
    fn test_peek_take() {
        let mut queue = SpscQueue::<Vec<u8>, 2>::new();
        let (mut producer, mut consumer) = queue.split();

        assert!(producer.try_push(vec![1, 2, 3]).is_ok());
        let peek = consumer.front().expect("element expected");
        assert_eq!(peek.len(), 3);
        assert_eq!(peek.take(), vec![1, 2, 3]);
        assert!(consumer.is_empty());
    }

    #[test]
    fn test_consume_one_drops_in_place() {
        static DROPS: AtomicUsize = AtomicUsize::new(0);

        struct Counted(u32);
        impl Drop for Counted {
            fn drop(&mut self) {
                DROPS.fetch_add(1, Ordering::SeqCst);
            }
        }

        let mut queue = SpscQueue::<Counted, 2>::new();
        let (mut producer, mut consumer) = queue.split();

        assert!(!consumer.consume_one(|_| panic!("called on empty ring")));

        assert!(producer.try_push(Counted(5)).is_ok());
        let mut seen = 0;
        assert!(consumer.consume_one(|c| seen = c.0));
        assert_eq!(seen, 5);
        assert_eq!(DROPS.load(Ordering::SeqCst), 1);
        assert!(consumer.is_empty());
    }

    #[test]
    fn test_consume_all_single_batch() {
        let mut queue = SpscQueue::<u64, 8>::new();
        let (mut producer, mut consumer) = queue.split();

        assert_eq!(consumer.consume_all(|_| {}), 0);

        // Position the cursors near the end so the batch wraps.
        for i in 0..6 {
            assert!(producer.try_push(i).is_ok());
        }
        assert_eq!(consumer.consume_all(|_| {}), 6);

        for i in 10..16 {
            assert!(producer.try_push(i).is_ok());
        }
        let mut values = Vec::new();
        assert_eq!(consumer.consume_all(|v| values.push(*v)), 6);
        assert_eq!(values, vec![10, 11, 12, 13, 14, 15]);
        assert!(consumer.is_empty());
        assert_eq!(producer.write_available(), 8);
    }

    #[test]
    fn test_consume_all_panic_keeps_accounting() {
        static DROPS: AtomicUsize = AtomicUsize::new(0);

        struct Counted(u32);
        impl Drop for Counted {
            fn drop(&mut self) {
                DROPS.fetch_add(1, Ordering::SeqCst);
            }
        }

        let mut queue = SpscQueue::<Counted, 4>::new();
        {
            let (mut producer, mut consumer) = queue.split();
            for i in 0..4 {
                assert!(producer.try_push(Counted(i)).is_ok());
            }

            let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
                consumer.consume_all(|c| assert!(c.0 < 2, "stop at {}", c.0));
            }));
            assert!(result.is_err());
            assert_eq!(DROPS.load(Ordering::SeqCst), 2);
            assert_eq!(consumer.len(), 2);
        }
        drop(queue);
        assert_eq!(DROPS.load(Ordering::SeqCst), 4);
    }

    /// Counts drops; the first drop after `armed` is set panics.
    struct PanicOnce {
        drops: Arc<AtomicUsize>,
        armed: Arc<AtomicBool>,
    }

    impl Drop for PanicOnce {
        fn drop(&mut self) {
            self.drops.fetch_add(1, Ordering::SeqCst);
            if self.armed.swap(false, Ordering::SeqCst) {
                panic!("destructor failed");
            }
        }
    }

    /// Pushes `count` elements, arms the first destructor, runs `consume`
    /// under `catch_unwind`, and returns the drops seen after the panic and
    /// after the queue itself is dropped.
    fn drops_with_panicking_destructor<F>(count: u32, consume: F) -> (usize, usize)
    where
        F: FnOnce(&mut crate::Consumer<'_, PanicOnce, 4>),
    {
        let drops = Arc::new(AtomicUsize::new(0));
        let armed = Arc::new(AtomicBool::new(false));

        let mut queue = SpscQueue::<PanicOnce, 4>::new();
        let after_panic = {
            let (mut producer, mut consumer) = queue.split();
            for _ in 0..count {
                let item = PanicOnce {
                    drops: Arc::clone(&drops),
                    armed: Arc::clone(&armed),
                };
                assert!(producer.try_push(item).is_ok());
            }

            armed.store(true, Ordering::SeqCst);
            let result = catch_unwind(AssertUnwindSafe(|| consume(&mut consumer)));
            assert!(result.is_err(), "destructor should have panicked");
            assert_eq!(consumer.len(), count as usize - 1);
            drops.load(Ordering::SeqCst)
        };
        drop(queue);
        (after_panic, drops.load(Ordering::SeqCst))
    }

    #[test]
    fn test_consume_one_panicking_destructor_drops_once() {
        let (after_panic, total) = drops_with_panicking_destructor(1, |c| {
            c.consume_one(|_| {});
        });
        assert_eq!(after_panic, 1);
        assert_eq!(total, 1);
    }

    #[test]
    fn test_release_panicking_destructor_drops_once() {
        let (after_panic, total) = drops_with_panicking_destructor(2, |c| {
            c.front().expect("element expected").release();
        });
        assert_eq!(after_panic, 1);
        assert_eq!(total, 2);
    }

    #[test]
    fn test_consume_all_panicking_destructor_drops_once() {
        let (after_panic, total) = drops_with_panicking_destructor(3, |c| {
            c.consume_all(|_| {});
        });
        assert_eq!(after_panic, 1);
        assert_eq!(total, 3);
    }

    #[test]
    fn test_peek_is_sync_only_for_sync_payloads() {
        fn assert_sync<S: Sync>() {}
        assert_sync::<Peek<'static, 'static, u64, 2>>();
        assert_sync::<Peek<'static, 'static, std::sync::Mutex<u64>, 2>>();
    }

    #[test]
    fn test_read_available() {
        let mut queue = SpscQueue::<u8, 3>::new();
        let (mut producer, mut consumer) = queue.split();

        assert_eq!(consumer.read_available(), 0);
        assert!(producer.try_push(1).is_ok());
        assert!(producer.try_push(2).is_ok());
        assert_eq!(consumer.read_available(), 2);
        assert_eq!(consumer.pop_with_backoff(), Some(1));
        assert_eq!(consumer.read_available(), 1);
    }

    #[test]
    fn test_pop_with_backoff_gives_up_when_empty() {
        let mut queue = SpscQueue::<u8, 2>::new();
        let (_producer, mut consumer) = queue.split();
        assert_eq!(consumer.pop_with_backoff(), None);
    }
}
