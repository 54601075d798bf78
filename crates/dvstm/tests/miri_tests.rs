//! Miri-compatible tests for detecting undefined behavior.
//!
//! Run with: `cargo +nightly miri test --test miri_tests`
//!
//! These tests are small on purpose (tiny regions, few iterations) and
//! exercise the unsafe code paths: the raw-pointer copies in and out of the
//! dual segment copies, rollback, snapshot installation, and the segment
//! table mutation at epoch end.

use dvstm_rs::{Region, TxKind};
use std::sync::Arc;
use std::thread;

#[test]
fn miri_write_commit_read() {
    let region = Region::new(32, 8).unwrap();

    let mut tx = region.begin(TxKind::ReadWrite).unwrap();
    tx.write(&[1, 2, 3, 4, 5, 6, 7, 8], region.start()).unwrap();
    let mut buf = [0u8; 8];
    tx.read(region.start(), &mut buf).unwrap();
    assert_eq!(buf, [1, 2, 3, 4, 5, 6, 7, 8]);
    assert!(tx.commit());

    let mut ro = region.begin(TxKind::ReadOnly).unwrap();
    ro.read(region.start(), &mut buf).unwrap();
    assert_eq!(buf, [1, 2, 3, 4, 5, 6, 7, 8]);
    assert!(ro.commit());
}

#[test]
fn miri_abort_rolls_back() {
    let region = Region::new(16, 8).unwrap();

    {
        let mut tx = region.begin(TxKind::ReadWrite).unwrap();
        tx.write(&[0xFF; 16], region.start()).unwrap();
        // dropped: rollback copies the snapshot back over the working copy
    }

    let mut ro = region.begin(TxKind::ReadOnly).unwrap();
    let mut buf = [0xAAu8; 16];
    ro.read(region.start(), &mut buf).unwrap();
    assert_eq!(buf, [0u8; 16]);
    assert!(ro.commit());
}

#[test]
fn miri_alloc_free_reclaim() {
    let region = Region::new(16, 8).unwrap();

    let mut tx = region.begin(TxKind::ReadWrite).unwrap();
    let h = tx.alloc(16).unwrap();
    tx.write(&[7; 16], h).unwrap();
    assert!(tx.commit());

    let mut tx = region.begin(TxKind::ReadWrite).unwrap();
    tx.free(h).unwrap();
    assert!(tx.commit());

    // Reallocation reuses the freed slot; the buffers were dropped and
    // rebuilt, so any stale pointer use would trip miri here.
    let mut tx = region.begin(TxKind::ReadWrite).unwrap();
    let h2 = tx.alloc(16).unwrap();
    assert_eq!(h2, h);
    let mut buf = [0xFFu8; 16];
    tx.read(h2, &mut buf).unwrap();
    assert_eq!(buf, [0u8; 16]);
    assert!(tx.commit());
}

#[test]
fn miri_concurrent_disjoint_writers() {
    let region = Arc::new(Region::new(32, 8).unwrap());
    let mut handles = vec![];

    for t in 0..2usize {
        let region = Arc::clone(&region);
        handles.push(thread::spawn(move || {
            for i in 0..3u64 {
                let mut tx = region.begin(TxKind::ReadWrite).unwrap();
                let slot = region.start().offset(t * 8);
                tx.write(&(i + 1).to_le_bytes(), slot).unwrap();
                assert!(tx.commit());
            }
        }));
    }
    for h in handles {
        h.join().unwrap();
    }

    let mut ro = region.begin(TxKind::ReadOnly).unwrap();
    for t in 0..2usize {
        let mut buf = [0u8; 8];
        ro.read(region.start().offset(t * 8), &mut buf).unwrap();
        assert_eq!(u64::from_le_bytes(buf), 3);
    }
    assert!(ro.commit());
}
