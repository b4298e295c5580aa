use crate::invariants::debug_assert_cursor_in_range;
use crate::slot::Slot;
use crate::trace;
use crate::{Consumer, Producer, QueueError};
use crossbeam_utils::CachePadded;
use std::alloc::Layout;
use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};

// =============================================================================
// MEMORY ORDERING & SYNCHRONIZATION STRATEGY
// =============================================================================
//
// The buffer holds N + 1 slots. Cursors are plain indices in [0, N] and wrap
// with `advance`; one slot is always left free so that `read == write` means
// empty and `advance(write) == read` means full.
//
// **Producer (push):**
// 1. Load `write` with Relaxed (only the producer writes it)
// 2. Load `read` with Acquire (synchronizes with the consumer's Release,
//    so the slot at `write` has been fully vacated)
// 3. Construct the payload in slot `write`
// 4. Store `advance(write)` into `write` with Release (publishes the payload)
//
// **Consumer (pop / consume_one / release):**
// 1. Load `write` with Acquire (synchronizes with the producer's Release,
//    so the payload at `read` is fully constructed)
// 2. Load `read` with Relaxed (only the consumer writes it)
// 3. Move out of / borrow / drop the payload at `read`
// 4. Store `advance(read)` into `read` with Release (hands the slot back)
//
// ## Single-Writer Invariants
//
// - `write`: only written by the Producer handle
// - `read`: only written by the Consumer handle
// - `pending`: lives inside the Consumer handle, never shared
// - `buffer[i]`: owned by the producer while outside [read, write),
//                owned by the consumer while inside it
//
// Both handles borrow the queue for their whole lifetime and are not Clone,
// so there is at most one of each. `reset` and `Drop` take `&mut self` and
// therefore run with no handle alive.
//
// =============================================================================

/// Fixed-capacity lock-free SPSC queue.
///
/// `N` is the number of usable slots; storage for `N + 1` slots is allocated
/// once at construction and released once on drop. No `T` is constructed
/// until it is pushed, so `T` needs neither `Default` nor `Clone`.
///
/// The queue itself only exposes introspection and exclusive maintenance
/// (`reset`). Pushing and popping go through the handles returned by
/// [`split`](SpscQueue::split).
///
/// # Memory Layout
///
/// ```text
/// ┌────────────────────────────────────────────────────────────────────┐
/// │ write: CachePadded<AtomicUsize>  ← Producer writes, Consumer reads │
/// ├────────────────────────────────────────────────────────────────────┤
/// │ read:  CachePadded<AtomicUsize>  ← Consumer writes, Producer reads │
/// ├────────────────────────────────────────────────────────────────────┤
/// │ buffer: Box<[Slot<T>]>           ← N + 1 maybe-uninit slots        │
/// └────────────────────────────────────────────────────────────────────┘
/// ```
pub struct SpscQueue<T, const N: usize> {
    /// Next slot the producer constructs into.
    write: CachePadded<AtomicUsize>,
    /// Next slot the consumer reads from.
    read: CachePadded<AtomicUsize>,
    buffer: Box<[Slot<T>]>,
}

// Safety: the queue hands out at most one producer and one consumer, and the
// cursor protocol transfers each slot between them. Shared access therefore
// only ever moves `T` across threads, which requires `T: Send`.
unsafe impl<T: Send, const N: usize> Sync for SpscQueue<T, N> {}

impl<T, const N: usize> SpscQueue<T, N> {
    /// Number of physical slots, one more than the usable capacity.
    pub(crate) const SLOTS: usize = N + 1;

    /// Compile-time check that `N` is usable. `N + 1` must not overflow.
    const VALID_CAPACITY: () = assert!(
        N > 0 && N < usize::MAX,
        "SpscQueue capacity must be in 1..usize::MAX"
    );

    /// Creates an empty queue with `N` usable slots.
    ///
    /// Aborts through the global allocation error handler if storage cannot
    /// be acquired, like `Vec::with_capacity`. Use [`try_new`](Self::try_new)
    /// to observe the failure instead.
    pub fn new() -> Self {
        let () = Self::VALID_CAPACITY;

        let buffer: Box<[Slot<T>]> = (0..Self::SLOTS).map(|_| Slot::uninit()).collect();
        Self::from_buffer(buffer)
    }

    /// Creates an empty queue, reporting allocation failure as an error.
    pub fn try_new() -> Result<Self, QueueError> {
        let () = Self::VALID_CAPACITY;

        let slots = Self::SLOTS;
        let layout = Layout::array::<Slot<T>>(slots)
            .map_err(|_| QueueError::CapacityOverflow { slots })?;

        let mut buffer = Vec::new();
        buffer
            .try_reserve_exact(slots)
            .map_err(|_| QueueError::AllocationFailed {
                slots,
                bytes: layout.size(),
            })?;
        buffer.resize_with(slots, Slot::uninit);

        Ok(Self::from_buffer(buffer.into_boxed_slice()))
    }

    fn from_buffer(buffer: Box<[Slot<T>]>) -> Self {
        debug_assert_eq!(buffer.len(), Self::SLOTS);
        trace::trace!(
            capacity = N,
            slot_bytes = std::mem::size_of::<T>(),
            "allocated ring storage"
        );

        Self {
            write: CachePadded::new(AtomicUsize::new(0)),
            read: CachePadded::new(AtomicUsize::new(0)),
            buffer,
        }
    }

    /// Splits the queue into its producer and consumer handles.
    ///
    /// The handles borrow the queue, so it cannot be reset or dropped while
    /// either is alive. Splitting again after both are dropped is allowed;
    /// elements already in the ring are kept.
    ///
    /// ```
    /// use ringspsc_rs::SpscQueue;
    ///
    /// let mut queue = SpscQueue::<u32, 4>::new();
    /// let (mut producer, mut consumer) = queue.split();
    ///
    /// std::thread::scope(|s| {
    ///     s.spawn(move || {
    ///         for i in 0..100 {
    ///             while producer.try_push(i).is_err() {
    ///                 std::hint::spin_loop();
    ///             }
    ///         }
    ///     });
    ///
    ///     let mut expected = 0;
    ///     while expected < 100 {
    ///         if let Some(v) = consumer.pop() {
    ///             assert_eq!(v, expected);
    ///             expected += 1;
    ///         }
    ///     }
    /// });
    /// ```
    pub fn split(&mut self) -> (Producer<'_, T, N>, Consumer<'_, T, N>) {
        let queue: &Self = self;
        (Producer::new(queue), Consumer::new(queue))
    }

    // =========================================================================
    // STATUS
    // =========================================================================

    /// Returns the number of usable slots, `N`.
    #[inline]
    pub const fn capacity(&self) -> usize {
        N
    }

    /// Returns the number of occupied slots.
    ///
    /// Best-effort when the other side is running concurrently.
    #[inline]
    pub fn len(&self) -> usize {
        let write = self.write.load(Ordering::Relaxed);
        let read = self.read.load(Ordering::Relaxed);
        Self::distance(read, write)
    }

    /// Returns true if no slot is occupied.
    ///
    /// Best-effort when the other side is running concurrently.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.write.load(Ordering::Relaxed) == self.read.load(Ordering::Relaxed)
    }

    /// Returns true if all `N` usable slots are occupied.
    ///
    /// Best-effort when the other side is running concurrently.
    #[inline]
    pub fn is_full(&self) -> bool {
        self.len() == N
    }

    /// Returns true if the cursor atomics are lock-free on this target.
    #[inline]
    pub const fn is_lock_free(&self) -> bool {
        cfg!(target_has_atomic = "ptr")
    }

    // =========================================================================
    // EXCLUSIVE MAINTENANCE
    // =========================================================================

    /// Drops every occupied element and rewinds both cursors to 0.
    ///
    /// Requires `&mut self`, so neither handle can be alive. Returns the
    /// number of elements dropped.
    pub fn reset(&mut self) -> usize {
        let dropped = self.drain_in_place();
        *self.write.get_mut() = 0;
        *self.read.get_mut() = 0;
        trace::debug!(dropped, "ring reset");
        dropped
    }

    /// Drops all occupied elements and moves `read` up to `write`.
    ///
    /// `read` passes each slot before its payload is dropped, so a panicking
    /// destructor leaves only live payloads in [read, write).
    fn drain_in_place(&mut self) -> usize {
        let write = *self.write.get_mut();
        let mut dropped = 0;

        loop {
            let read = *self.read.get_mut();
            if read == write {
                break;
            }
            // SAFETY: slots in [read, write) hold live payloads and no handle
            // exists (`&mut self`), so nothing else can observe them.
            let value = unsafe { self.buffer[read].read() };
            *self.read.get_mut() = Self::advance(read);
            dropped += 1;
            drop(value);
        }

        dropped
    }

    // =========================================================================
    // CURSOR PROTOCOL (crate-internal, used by the handles)
    // =========================================================================

    /// Next cursor position, wrapping at `N + 1`.
    #[inline]
    pub(crate) fn advance(index: usize) -> usize {
        debug_assert_cursor_in_range!(index, Self::SLOTS);
        let next = index + 1;
        if next == Self::SLOTS {
            0
        } else {
            next
        }
    }

    /// Forward cyclic distance from `read` to `write`.
    #[inline]
    pub(crate) fn distance(read: usize, write: usize) -> usize {
        if write >= read {
            write - read
        } else {
            write + Self::SLOTS - read
        }
    }

    #[inline]
    pub(crate) fn slot(&self, index: usize) -> &Slot<T> {
        &self.buffer[index]
    }

    #[inline]
    pub(crate) fn write_cursor(&self) -> &AtomicUsize {
        &self.write
    }

    #[inline]
    pub(crate) fn read_cursor(&self) -> &AtomicUsize {
        &self.read
    }
}

impl<T, const N: usize> Default for SpscQueue<T, N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T, const N: usize> Drop for SpscQueue<T, N> {
    fn drop(&mut self) {
        let remaining = self.drain_in_place();
        if remaining > 0 {
            trace::debug!(remaining, "dropped unconsumed elements with ring");
        }
    }
}

impl<T, const N: usize> fmt::Debug for SpscQueue<T, N> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SpscQueue")
            .field("capacity", &N)
            .field("len", &self.len())
            .field("write", &self.write.load(Ordering::Relaxed))
            .field("read", &self.read.load(Ordering::Relaxed))
            .finish()
    }
}

// =============================================================================
// TESTS
// =============================================================================
