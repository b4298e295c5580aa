//! Maybe-uninitialized storage cell for one ring position.
//!
//! A [`Slot`] never tracks whether it is occupied; the cursor range of the
//! owning queue is the single source of truth. Every accessor is `unsafe`
//! and documents which side of that range the caller must be on.

use std::cell::UnsafeCell;
use std::mem::MaybeUninit;

/// One ring position: either raw memory or a live `T`.
#[repr(transparent)]
pub(crate) struct Slot<T> {
    value: UnsafeCell<MaybeUninit<T>>,
}

impl<T> Slot<T> {
    /// Creates an uninitialized slot. No `T` is constructed.
    #[inline]
    pub(crate) const fn uninit() -> Self {
        Self {
            value: UnsafeCell::new(MaybeUninit::uninit()),
        }
    }

    /// Constructs `value` in place.
    ///
    /// # Safety
    ///
    /// The slot must be unoccupied and exclusively owned by the caller
    /// (the producer, between observing `read` and publishing `write`).
    #[inline]
    pub(crate) unsafe fn write(&self, value: T) {
        (*self.value.get()).write(value);
    }

    /// Moves the payload out, leaving the slot uninitialized.
    ///
    /// # Safety
    ///
    /// The slot must be occupied and exclusively owned by the caller
    /// (the consumer, between observing `write` and publishing `read`).
    #[inline]
    pub(crate) unsafe fn read(&self) -> T {
        (*self.value.get()).assume_init_read()
    }

    /// Borrows the payload in place.
    ///
    /// # Safety
    ///
    /// The slot must be occupied, and must stay occupied for `'a`.
    #[inline]
    pub(crate) unsafe fn get<'a>(&self) -> &'a T {
        (*self.value.get()).assume_init_ref()
    }
}
