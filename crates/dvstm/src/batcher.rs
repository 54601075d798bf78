use crate::invariants::debug_assert_member_of_epoch;
use log::trace;
use std::sync::{Condvar, Mutex, PoisonError};

/// Per-epoch quota of read/write transactions.
///
/// The limit is the algorithm's, not an implementation artefact: a word's
/// access set packs a written flag and a transaction bitmap into one u64, so
/// at most 63 read/write transactions can be told apart within an epoch.
pub const MAX_RW_TX: u64 = 63;

/// Transaction id. Read/write ids lie in `[0, MAX_RW_TX)`; read-only ids
/// start at `MAX_RW_TX` and are unbounded.
pub(crate) type TxId = u64;

// =============================================================================
// EPOCH PROTOCOL
// =============================================================================
//
// The batcher serializes progress into epochs. Every transaction admitted to
// an epoch runs concurrently; nobody else runs until all of them have left.
//
// - A thread that finds `remaining == 0` is the sole starter of a fresh
//   epoch: it takes the first id and runs immediately.
// - Every other entrant is assigned an id for the *next* epoch and waits.
//   Ids handed to waiters reuse the numeric range of the running epoch; the
//   two generations never overlap in time because waiters only run after
//   every current member has left and the access sets were wiped.
// - Waiters gate on the epoch counter, never on `remaining`: the last
//   departer refills `remaining` from `blocked` *before* broadcasting, so a
//   waiter testing `remaining` could observe its own refill and spin
//   forever.
// - The last departer performs the epoch-end work (snapshot install, segment
//   reclamation, access-set wipe) while still holding the mutex, then bumps
//   the counter, resets the id counters, refills `remaining`, zeroes
//   `blocked` and broadcasts - in that order, all before the mutex is
//   released. Any other order loses a wakeup or admits a transaction twice.
//
// =============================================================================

#[derive(Debug)]
struct BatcherState {
    /// Current epoch id, monotonically increasing.
    counter: u64,
    /// Next read/write id to assign (for the next epoch once one is running).
    rw_tx: u64,
    /// Next read-only id to assign.
    ro_tx: u64,
    /// Transactions still inside the current epoch.
    remaining: u64,
    /// Threads admitted to the next epoch, waiting on `epoch_tick`.
    blocked: u64,
}

/// Admission control for a region.
#[derive(Debug)]
pub(crate) struct Batcher {
    state: Mutex<BatcherState>,
    epoch_tick: Condvar,
}

impl Batcher {
    pub(crate) fn new() -> Self {
        Self {
            state: Mutex::new(BatcherState {
                counter: 0,
                rw_tx: 0,
                ro_tx: MAX_RW_TX,
                remaining: 0,
                blocked: 0,
            }),
            epoch_tick: Condvar::new(),
        }
    }

    /// Current epoch id.
    pub(crate) fn epoch(&self) -> u64 {
        self.lock_state().counter
    }

    /// Wait for and enter an epoch.
    ///
    /// Returns the assigned transaction id, or `None` when the caller asked
    /// for a read/write slot and the quota for the upcoming epoch is already
    /// full. A refused caller was never counted and must not leave.
    ///
    /// Blocks until the epoch the caller was admitted to begins; this is the
    /// library's only suspension point.
    pub(crate) fn enter(&self, is_ro: bool) -> Option<TxId> {
        let mut st = self.lock_state();
        let epoch_at_entry = st.counter;

        // Sole starter: nothing is running, open a fresh epoch and go.
        if st.remaining == 0 {
            st.remaining = 1;
            let id = if is_ro { MAX_RW_TX } else { 0 };
            trace!("epoch {}: tx {} starts the batch", st.counter, id);
            return Some(id);
        }

        // An epoch is in flight: reserve an id for the next one and wait.
        let id = if is_ro {
            let id = st.ro_tx;
            st.ro_tx += 1;
            id
        } else if st.rw_tx == MAX_RW_TX {
            return None;
        } else {
            let id = st.rw_tx;
            st.rw_tx += 1;
            id
        };
        st.blocked += 1;

        while st.counter == epoch_at_entry {
            st = self
                .epoch_tick
                .wait(st)
                .unwrap_or_else(PoisonError::into_inner);
        }
        Some(id)
    }

    /// Leave the current epoch.
    ///
    /// The last member to leave runs `at_epoch_end` with the mutex held and
    /// every other thread either departed or parked in [`enter`](Self::enter),
    /// which is what makes the epoch-end walk safe without further locking.
    pub(crate) fn leave(&self, at_epoch_end: impl FnOnce()) {
        let mut st = self.lock_state();
        debug_assert_member_of_epoch!(st.remaining);
        st.remaining -= 1;
        if st.remaining > 0 {
            return;
        }

        at_epoch_end();

        st.counter += 1;
        st.rw_tx = 0;
        st.ro_tx = MAX_RW_TX;
        st.remaining = st.blocked;
        st.blocked = 0;
        trace!(
            "epoch {}: begins with {} admitted transactions",
            st.counter,
            st.remaining
        );
        self.epoch_tick.notify_all();
    }

    fn lock_state(&self) -> std::sync::MutexGuard<'_, BatcherState> {
        // A panic inside the epoch-end walk only fires from debug
        // assertions; recover the guard rather than poisoning every
        // subsequent transaction.
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
