//! Debug assertion macros for access-set and batcher invariants.
//!
//! These macros are runtime checks for the word-state machine that the
//! conflict rules rely on. They compile to nothing in release builds, so
//! there is zero overhead on the hot read/write paths.

// =============================================================================
// Access-set word states
// =============================================================================
//
// During an epoch, every access-set word must match exactly one of:
//
//   0                        untouched
//   0 < set < WRITTEN        bitmap of read/write transactions that read it
//   WRITTEN | (1 << t)       written by exactly one transaction t
//
// Any other bit pattern means the conflict rules were bypassed.

/// Assert that an access-set word is in one of the three legal states.
///
/// Used after every load of an access-set entry under its word lock.
macro_rules! debug_assert_word_state {
    ($set:expr) => {
        debug_assert!(
            $set < $crate::segment::WRITTEN
                || ($set & !$crate::segment::WRITTEN).count_ones() == 1,
            "access-set word corrupted: {:#018x}",
            $set
        )
    };
}

/// Assert that a written word is owned by the expected transaction alone.
///
/// Used when rolling a write back: the range can only have been written by
/// the aborting transaction itself.
macro_rules! debug_assert_sole_writer {
    ($set:expr, $bit:expr) => {
        debug_assert!(
            $set == $crate::segment::WRITTEN | $bit,
            "rolling back a word not exclusively written by this transaction: {:#018x}",
            $set
        )
    };
}

// =============================================================================
// Word alignment
// =============================================================================

/// Assert that a byte count lies on the region's word grid.
///
/// Callers validate sizes before taking word locks; this double-checks the
/// internal paths that assume whole words.
macro_rules! debug_assert_word_multiple {
    ($bytes:expr, $align:expr) => {
        debug_assert!(
            $bytes % $align == 0,
            "{} bytes is not a multiple of the {}-byte word size",
            $bytes,
            $align
        )
    };
}

// =============================================================================
// Batcher bookkeeping
// =============================================================================

/// Assert that a departing transaction was actually counted in the epoch.
///
/// Used in `Batcher::leave` before decrementing `remaining`.
macro_rules! debug_assert_member_of_epoch {
    ($remaining:expr) => {
        debug_assert!(
            $remaining > 0,
            "leave without a matching enter: remaining is 0"
        )
    };
}

pub(crate) use debug_assert_member_of_epoch;
pub(crate) use debug_assert_sole_writer;
pub(crate) use debug_assert_word_multiple;
pub(crate) use debug_assert_word_state;
