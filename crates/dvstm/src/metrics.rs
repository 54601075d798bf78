use std::sync::atomic::{AtomicU64, Ordering};

/// Thread-safe counters for region activity.
///
/// Counters are bumped only when a transaction leaves its epoch and at epoch
/// transitions, never on the read/write hot path.
#[derive(Debug, Default)]
pub(crate) struct Metrics {
    commits: AtomicU64,
    aborts: AtomicU64,
    conflicts: AtomicU64,
    epochs: AtomicU64,
}

impl Metrics {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn add_commit(&self) {
        self.commits.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn add_abort(&self) {
        self.aborts.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn add_conflict(&self) {
        self.conflicts.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn add_epoch(&self) {
        self.epochs.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            commits: self.commits.load(Ordering::Relaxed),
            aborts: self.aborts.load(Ordering::Relaxed),
            conflicts: self.conflicts.load(Ordering::Relaxed),
            epochs: self.epochs.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time copy of a region's [`Metrics`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MetricsSnapshot {
    /// Transactions that committed.
    pub commits: u64,
    /// Transactions that aborted, for any reason.
    pub aborts: u64,
    /// Aborts caused by an access-set conflict.
    pub conflicts: u64,
    /// Completed epoch transitions.
    pub epochs: u64,
}
