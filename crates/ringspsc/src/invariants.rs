//! Debug assertion macros for ring queue invariants.
//!
//! Only active in debug builds (`#[cfg(debug_assertions)]`), so there is
//! zero overhead in release builds.

// =============================================================================
// Cursor Range
// =============================================================================

/// Assert that a cursor indexes a real slot.
///
/// **Invariant**: `cursor ∈ [0, N]` (the buffer holds `N + 1` slots)
///
/// Used in: `advance()` on its input
macro_rules! debug_assert_cursor_in_range {
    ($cursor:expr, $slots:expr) => {
        debug_assert!(
            $cursor < $slots,
            "cursor {} outside buffer of {} slots",
            $cursor,
            $slots
        )
    };
}

// =============================================================================
// Bounded Occupancy
// =============================================================================

/// Assert that the occupied count never exceeds the usable capacity.
///
/// **Invariant**: `distance(read, write) ≤ N`; one slot is always free
///
/// Used in: `try_push()` after a successful write, before publishing
macro_rules! debug_assert_bounded_occupancy {
    ($occupied:expr, $capacity:expr) => {
        debug_assert!(
            $occupied <= $capacity,
            "occupied slots {} exceed capacity {}",
            $occupied,
            $capacity
        )
    };
}

// =============================================================================
// Occupied Read
// =============================================================================

/// Assert that the consumer only touches an occupied slot.
///
/// **Invariant**: slot `i` holds a live `T` ⟺ `i ∈ [read, write)` cyclically
///
/// Used in: `consume_all()` before each move-out, `Peek::release()`
macro_rules! debug_assert_occupied {
    ($pos:expr, $read:expr, $write:expr, $slots:expr) => {
        debug_assert!(
            if $read <= $write {
                $pos >= $read && $pos < $write
            } else {
                $pos >= $read || $pos < $write
            },
            "slot {} outside occupied range [{}, {}) of {} slots",
            $pos,
            $read,
            $write,
            $slots
        )
    };
}

pub(crate) use debug_assert_bounded_occupancy;
pub(crate) use debug_assert_cursor_in_range;
pub(crate) use debug_assert_occupied;
