//! DVSTM - Dual-Versioned Software Transactional Memory
//!
//! A region of shared memory exposed to concurrent threads as transactions
//! with snapshot-isolation semantics. Every segment carries two copies: a
//! read-only snapshot observed by read-only transactions and a working copy
//! mutated by read/write transactions. A batcher groups transactions into
//! epochs; when the last transaction of an epoch leaves, committed writes
//! are installed into the snapshot in one step and the next batch is
//! released.
//!
//! # Key properties
//!
//! - Read-only transactions never lock, never abort, and keep no history
//! - Conflict detection is per word, through a fused access-set bitmap
//!   (1 written flag + 63 transaction bits per word)
//! - Aborts are invisible to other transactions: writes are rolled back
//!   from the snapshot copy before the epoch can end
//! - Segment handles are opaque `(segment id, offset)` pairs, never raw
//!   pointers; freed ids are recycled in O(1)
//!
//! # Example
//!
//! ```
//! use dvstm_rs::{Region, TxKind};
//!
//! let region = Region::new(128, 8).unwrap();
//!
//! // Read/write transaction: writes land in the working copy.
//! let mut tx = region.begin(TxKind::ReadWrite).unwrap();
//! tx.write(&7u64.to_le_bytes(), region.start()).unwrap();
//! let extra = tx.alloc(64).unwrap();
//! tx.write(&[0xAB; 8], extra).unwrap();
//! assert!(tx.commit());
//!
//! // After the epoch boundary, a read-only transaction sees the snapshot.
//! let mut ro = region.begin(TxKind::ReadOnly).unwrap();
//! let mut buf = [0u8; 8];
//! ro.read(extra, &mut buf).unwrap();
//! assert_eq!(buf, [0xAB; 8]);
//! ro.commit();
//! ```

mod addr;
mod batcher;
mod error;
mod history;
mod invariants;
mod metrics;
mod region;
mod segment;
mod spinlock;
mod transaction;

pub use addr::{Addr, MAX_SEGMENTS, MAX_SEGMENT_SIZE};
pub use batcher::MAX_RW_TX;
pub use error::StmError;
pub use metrics::MetricsSnapshot;
pub use region::Region;
pub use transaction::{Transaction, TxKind};
