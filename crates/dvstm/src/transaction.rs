use crate::addr::{Addr, FIRST_SEG};
use crate::batcher::{TxId, MAX_RW_TX};
use crate::history::{OpLog, Record};
use crate::region::Region;
use crate::{StmError, MAX_SEGMENT_SIZE};

/// Whether a transaction may modify shared memory.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TxKind {
    /// Observes the snapshot installed at the last epoch boundary. Cannot
    /// write, allocate or free, keeps no history, and never conflicts.
    ReadOnly,
    /// Full access. Subject to the per-epoch quota and to per-word conflict
    /// detection.
    ReadWrite,
}

/// A transaction on a [`Region`].
///
/// Obtained from [`Region::begin`]. All operations are word-granular: every
/// accessed byte range must start on a word boundary and span whole words.
///
/// A transaction ends in exactly one of two ways:
///
/// - [`commit`](Self::commit) consumes the handle and schedules the
///   transaction's writes for installation at the epoch boundary;
/// - dropping the handle, or any operation returning an abort-class error,
///   rolls every effect back as if the transaction had never run.
///
/// After an aborted operation the handle is dead; further operations return
/// [`StmError::TransactionClosed`] and dropping it does nothing more.
pub struct Transaction<'r> {
    region: &'r Region,
    id: TxId,
    is_ro: bool,
    log: OpLog,
    open: bool,
}

impl<'r> Transaction<'r> {
    pub(crate) fn begin(region: &'r Region, kind: TxKind) -> Result<Self, StmError> {
        let is_ro = kind == TxKind::ReadOnly;
        let id = region.batcher().enter(is_ro).ok_or(StmError::TooManyWriters {
            max: MAX_RW_TX as usize,
        })?;
        Ok(Self {
            region,
            id,
            is_ro,
            log: OpLog::new(),
            open: true,
        })
    }

    /// Whether this transaction was admitted read-only.
    #[inline]
    pub fn is_read_only(&self) -> bool {
        self.is_ro
    }

    /// Read `buf.len()` bytes of shared memory at `src` into `buf`.
    ///
    /// Read-only transactions copy from the epoch snapshot without locking
    /// and cannot conflict. Read/write transactions read the working copy
    /// (so they see their own earlier writes) and abort if any word was
    /// written by another transaction this epoch.
    pub fn read(&mut self, src: Addr, buf: &mut [u8]) -> Result<(), StmError> {
        self.ensure_open()?;
        let region = self.region;
        let align = region.word_size();
        if buf.is_empty() || buf.len() % align != 0 {
            return Err(self.abort(StmError::Misaligned {
                size: buf.len(),
                align,
            }));
        }

        let offset = src.seg_offset();
        let Some(sn) = region.segment(src.seg_id()) else {
            return Err(self.abort(StmError::InvalidAddress));
        };
        if offset % align != 0 || offset + buf.len() > sn.len() {
            return Err(self.abort(StmError::InvalidAddress));
        }

        // Read-only fast path: snapshot copy, no locks, no history.
        if self.is_ro {
            sn.read_ro(offset, buf);
            return Ok(());
        }

        let bit = 1u64 << self.id;
        let words = sn.word_range(offset, buf.len());
        if !sn.acquire_for_read(words.clone(), bit) {
            return Err(self.abort_conflict());
        }
        sn.read_rw(offset, buf);
        sn.mark_read(words.clone(), bit);
        sn.release(words);

        self.log_op(Record::Read {
            seg: src.seg_id(),
            offset,
            len: buf.len(),
        })
    }

    /// Write `data` to shared memory at `dst`.
    ///
    /// Aborts if any word of the range was read or written by another
    /// transaction this epoch. The bytes land in the working copy and become
    /// visible to read-only transactions only after commit, at the epoch
    /// boundary.
    ///
    /// # Panics
    ///
    /// Panics if called on a read-only transaction.
    pub fn write(&mut self, data: &[u8], dst: Addr) -> Result<(), StmError> {
        self.ensure_open()?;
        assert!(!self.is_ro, "write on a read-only transaction");
        let region = self.region;
        let align = region.word_size();
        if data.is_empty() || data.len() % align != 0 {
            return Err(self.abort(StmError::Misaligned {
                size: data.len(),
                align,
            }));
        }

        let offset = dst.seg_offset();
        let Some(sn) = region.segment(dst.seg_id()) else {
            return Err(self.abort(StmError::InvalidAddress));
        };
        if offset % align != 0 || offset + data.len() > sn.len() {
            return Err(self.abort(StmError::InvalidAddress));
        }

        let bit = 1u64 << self.id;
        let words = sn.word_range(offset, data.len());
        if !sn.acquire_for_write(words.clone(), bit) {
            return Err(self.abort_conflict());
        }
        sn.write_rw(offset, data);
        sn.mark_written(words.clone(), bit);
        sn.release(words);

        self.log_op(Record::Write {
            seg: dst.seg_id(),
            offset,
            len: data.len(),
        })
    }

    /// Allocate a fresh zeroed segment of `size` bytes and return its
    /// handle.
    ///
    /// The segment exists immediately for this transaction; if the
    /// transaction aborts, the segment is reclaimed at the epoch boundary.
    /// Fails (and aborts) with [`StmError::SegmentQuota`] when all segment
    /// ids are taken and [`StmError::OutOfMemory`] when the copies cannot be
    /// allocated.
    ///
    /// # Panics
    ///
    /// Panics if called on a read-only transaction.
    pub fn alloc(&mut self, size: usize) -> Result<Addr, StmError> {
        self.ensure_open()?;
        assert!(!self.is_ro, "alloc on a read-only transaction");
        let region = self.region;
        let align = region.word_size();
        if size == 0 || size % align != 0 || size > MAX_SEGMENT_SIZE {
            return Err(self.abort(StmError::InvalidSize { size, align }));
        }

        let addr = match region.alloc_segment(size) {
            Ok(addr) => addr,
            Err(e) => return Err(self.abort(e)),
        };
        if let Err(e) = self.log.push(Record::Alloc {
            seg: addr.seg_id(),
        }) {
            // No record points at the fresh segment, so the rollback walk
            // would miss it; mark it for reclamation by hand.
            if let Some(sn) = region.segment(addr.seg_id()) {
                sn.set_freed();
            }
            return Err(self.abort(e));
        }
        Ok(addr)
    }

    /// Free the segment `target` points into at the end of the epoch.
    ///
    /// The bytes stay readable and writable for the rest of the epoch;
    /// reclamation happens only if this transaction commits. Freeing the
    /// region's first segment aborts with [`StmError::PermanentSegment`].
    ///
    /// # Panics
    ///
    /// Panics if called on a read-only transaction.
    pub fn free(&mut self, target: Addr) -> Result<(), StmError> {
        self.ensure_open()?;
        assert!(!self.is_ro, "free on a read-only transaction");
        let seg = target.seg_id();
        if seg == FIRST_SEG {
            return Err(self.abort(StmError::PermanentSegment));
        }
        if self.region.segment(seg).is_none() {
            return Err(self.abort(StmError::InvalidAddress));
        }
        self.log_op(Record::Free { seg })
    }

    /// Commit the transaction.
    ///
    /// The writes are installed into the snapshot by the last transaction
    /// leaving this epoch. Returns `true` when the commit was scheduled;
    /// `false` only if the transaction had already aborted.
    pub fn commit(mut self) -> bool {
        if !self.open {
            return false;
        }
        self.open = false;
        self.region.leave(self.id, true, &mut self.log);
        true
    }

    fn ensure_open(&self) -> Result<(), StmError> {
        if self.open {
            Ok(())
        } else {
            Err(StmError::TransactionClosed)
        }
    }

    /// Abort: roll this transaction's effects back, leave the epoch, and
    /// hand the causing error back for returning.
    fn abort(&mut self, err: StmError) -> StmError {
        self.open = false;
        self.region.leave(self.id, false, &mut self.log);
        err
    }

    fn abort_conflict(&mut self) -> StmError {
        self.region.note_conflict();
        self.abort(StmError::Conflict)
    }

    fn log_op(&mut self, record: Record) -> Result<(), StmError> {
        match self.log.push(record) {
            Ok(()) => Ok(()),
            Err(e) => Err(self.abort(e)),
        }
    }
}

impl Drop for Transaction<'_> {
    /// A transaction that goes out of scope without committing aborts.
    fn drop(&mut self) {
        if self.open {
            self.open = false;
            self.region.leave(self.id, false, &mut self.log);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_write_then_read_same_transaction() {
        let region = Region::new(32, 8).unwrap();
        let mut tx = region.begin(TxKind::ReadWrite).unwrap();

        tx.write(&[1, 2, 3, 4, 5, 6, 7, 8], region.start()).unwrap();
        let mut buf = [0u8; 8];
        tx.read(region.start(), &mut buf).unwrap();
        assert_eq!(buf, [1, 2, 3, 4, 5, 6, 7, 8]);
        assert!(tx.commit());
    }

    #[test]
    fn test_read_only_sees_previous_epoch_only() {
        let region = Region::new(16, 8).unwrap();

        let mut tx = region.begin(TxKind::ReadWrite).unwrap();
        tx.write(&[0xAA; 8], region.start()).unwrap();
        assert!(tx.commit());

        let mut ro = region.begin(TxKind::ReadOnly).unwrap();
        let mut buf = [0u8; 8];
        ro.read(region.start(), &mut buf).unwrap();
        assert_eq!(buf, [0xAA; 8]);
        assert!(ro.commit());
    }

    #[test]
    fn test_drop_aborts_and_rolls_back() {
        let region = Region::new(16, 8).unwrap();

        {
            let mut tx = region.begin(TxKind::ReadWrite).unwrap();
            tx.write(&[0x77; 16], region.start()).unwrap();
            // dropped without commit
        }

        let mut ro = region.begin(TxKind::ReadOnly).unwrap();
        let mut buf = [0xFFu8; 16];
        ro.read(region.start(), &mut buf).unwrap();
        assert_eq!(buf, [0u8; 16]);
        assert!(ro.commit());

        let m = region.metrics();
        assert_eq!(m.aborts, 1);
        assert_eq!(m.commits, 1);
    }

    #[test]
    fn test_invalid_address_aborts() {
        let region = Region::new(16, 8).unwrap();
        let mut tx = region.begin(TxKind::ReadWrite).unwrap();

        // Out-of-bounds range in a live segment.
        let mut buf = [0u8; 16];
        let err = tx.read(region.start().offset(8), &mut buf).unwrap_err();
        assert_eq!(err, StmError::InvalidAddress);

        // Handle is dead now.
        assert_eq!(
            tx.read(region.start(), &mut buf).unwrap_err(),
            StmError::TransactionClosed
        );
        assert!(!tx.commit());
    }

    #[test]
    fn test_misaligned_access_aborts() {
        let region = Region::new(16, 8).unwrap();
        let mut tx = region.begin(TxKind::ReadWrite).unwrap();
        let mut buf = [0u8; 3];
        assert_eq!(
            tx.read(region.start(), &mut buf).unwrap_err(),
            StmError::Misaligned { size: 3, align: 8 }
        );
    }

    #[test]
    fn test_free_first_segment_aborts() {
        let region = Region::new(16, 8).unwrap();
        let mut tx = region.begin(TxKind::ReadWrite).unwrap();
        assert_eq!(
            tx.free(region.start()).unwrap_err(),
            StmError::PermanentSegment
        );
    }

    #[test]
    #[should_panic(expected = "write on a read-only transaction")]
    fn test_read_only_write_panics() {
        let region = Region::new(16, 8).unwrap();
        let mut ro = region.begin(TxKind::ReadOnly).unwrap();
        let _ = ro.write(&[0u8; 8], region.start());
    }
}
