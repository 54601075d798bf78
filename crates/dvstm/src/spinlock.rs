//! Test-and-set spinlocks.
//!
//! Two variants back the two places the library spins:
//!
//! - [`RawSpinLock`] - a bare lock bit with explicit acquire/release, used
//!   one-per-word to guard access-set entries. Acquiring a whole word range
//!   and releasing it after a copy does not fit an RAII guard, so the raw
//!   form is deliberate.
//! - [`SpinLock<T>`] - a lock that owns its data and hands out an RAII
//!   guard, used for the segment-id stack.
//!
//! Both are unfair. Held intervals are a few memory accesses, so waiters use
//! adaptive backoff rather than parking.

use crossbeam_utils::Backoff;
use std::cell::UnsafeCell;
use std::ops::{Deref, DerefMut};
use std::sync::atomic::{AtomicBool, Ordering};

/// A single lock bit with spin-wait acquire and clearing release.
#[derive(Debug, Default)]
pub(crate) struct RawSpinLock {
    locked: AtomicBool,
}

impl RawSpinLock {
    pub(crate) const fn new() -> Self {
        Self {
            locked: AtomicBool::new(false),
        }
    }

    /// Acquire the lock, spinning until it is free.
    #[inline]
    pub(crate) fn lock(&self) {
        let backoff = Backoff::new();
        while self.locked.swap(true, Ordering::Acquire) {
            // Wait on a plain load so contended acquires don't bounce the
            // cache line between cores on every iteration.
            while self.locked.load(Ordering::Relaxed) {
                backoff.snooze();
            }
        }
    }

    /// Release the lock. The caller must hold it.
    #[inline]
    pub(crate) fn unlock(&self) {
        self.locked.store(false, Ordering::Release);
    }

    /// Try to acquire the lock without spinning.
    #[inline]
    pub(crate) fn try_lock(&self) -> bool {
        !self.locked.swap(true, Ordering::Acquire)
    }
}

/// A spinlock that owns its data, in the shape of a mutex.
pub(crate) struct SpinLock<T> {
    locked: AtomicBool,
    data: UnsafeCell<T>,
}

impl<T> SpinLock<T> {
    pub(crate) const fn new(data: T) -> Self {
        Self {
            locked: AtomicBool::new(false),
            data: UnsafeCell::new(data),
        }
    }

    /// Acquire the lock, spinning if necessary.
    #[inline]
    pub(crate) fn lock(&self) -> SpinLockGuard<'_, T> {
        let backoff = Backoff::new();
        while self.locked.swap(true, Ordering::Acquire) {
            while self.locked.load(Ordering::Relaxed) {
                backoff.snooze();
            }
        }
        SpinLockGuard { lock: self }
    }
}

// Safety: the lock bit serializes all access to `data`.
unsafe impl<T: Send> Send for SpinLock<T> {}
unsafe impl<T: Send> Sync for SpinLock<T> {}

/// RAII guard for [`SpinLock`].
pub(crate) struct SpinLockGuard<'a, T> {
    lock: &'a SpinLock<T>,
}

impl<T> Deref for SpinLockGuard<'_, T> {
    type Target = T;

    fn deref(&self) -> &Self::Target {
        // SAFETY: the guard exists, so this thread holds the lock bit.
        unsafe { &*self.lock.data.get() }
    }
}

impl<T> DerefMut for SpinLockGuard<'_, T> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        // SAFETY: the guard exists, so this thread holds the lock bit.
        unsafe { &mut *self.lock.data.get() }
    }
}

impl<T> Drop for SpinLockGuard<'_, T> {
    fn drop(&mut self) {
        self.lock.locked.store(false, Ordering::Release);
    }
}
