use thiserror::Error;

/// Error types for region and transaction operations.
///
/// Every variant except [`TooManyWriters`](StmError::TooManyWriters) and
/// [`TransactionClosed`](StmError::TransactionClosed) also aborts the
/// transaction that hit it: the failing operation rolls the transaction's
/// effects back and leaves the current epoch before returning, so the caller
/// only has to stop using the handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum StmError {
    /// Too many read/write transactions admitted for the next epoch.
    ///
    /// The transaction was never admitted, so nothing has to be rolled back;
    /// read-only admission is not subject to this quota.
    #[error("too many read/write transactions admitted (max: {max})")]
    TooManyWriters {
        /// The per-epoch read/write transaction quota.
        max: usize,
    },

    /// Another transaction in this epoch touched one of the accessed words
    /// in an incompatible way.
    #[error("conflicting access to a shared word")]
    Conflict,

    /// All segment ids are in use.
    #[error("segment quota exhausted (max: {max})")]
    SegmentQuota {
        /// Maximum number of live segments per region.
        max: usize,
    },

    /// Memory for a segment or an operation record could not be reserved.
    #[error("out of memory")]
    OutOfMemory,

    /// The first segment exists for the lifetime of the region and cannot
    /// be freed by a transaction.
    #[error("the first segment cannot be freed")]
    PermanentSegment,

    /// The handle does not name a live segment, or the accessed range falls
    /// outside of it.
    #[error("address does not name live shared memory")]
    InvalidAddress,

    /// The transaction already aborted; the handle is dead.
    #[error("transaction is closed")]
    TransactionClosed,

    /// Region or allocation size is zero, not a multiple of the alignment,
    /// or beyond what one segment can address.
    #[error("invalid size {size} for alignment {align}")]
    InvalidSize {
        /// The rejected size in bytes.
        size: usize,
        /// The region's word alignment in bytes.
        align: usize,
    },

    /// Region alignment is not a power of two at least the pointer size.
    #[error("invalid alignment {align}")]
    InvalidAlignment {
        /// The rejected alignment in bytes.
        align: usize,
    },

    /// An access length is not a positive multiple of the word alignment.
    #[error("access of {size} bytes is not word-aligned (align: {align})")]
    Misaligned {
        /// The rejected access length in bytes.
        size: usize,
        /// The region's word alignment in bytes.
        align: usize,
    },
}
