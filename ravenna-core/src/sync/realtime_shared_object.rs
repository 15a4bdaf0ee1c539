use std::sync::atomic::{AtomicPtr, Ordering};
use std::sync::{Mutex, PoisonError};

use super::{DEFAULT_RETRY_LIMIT, RETRY_SLEEP};

/// Shares a single value with one realtime reader, wait-free on the reader
/// side.
///
/// The reader takes the value by atomically exchanging the published
/// pointer with null; releasing the lock stores it back. The writer replaces
/// the value behind a mutex with a bounded compare-exchange loop: while the
/// reader holds the lock the slot contains null and the exchange cannot
/// succeed, so after the retry budget the update reports failure instead of
/// blocking the caller forever.
///
/// There must be at most one realtime reader; that reader must not hold two
/// locks at once.
#[derive(Debug)]
pub struct RealtimeSharedObject<T> {
    ptr: AtomicPtr<T>,
    storage: Mutex<*mut T>,
    retry_limit: usize,
}

unsafe impl<T: Send> Send for RealtimeSharedObject<T> {}
unsafe impl<T: Send + Sync> Sync for RealtimeSharedObject<T> {}

impl<T> RealtimeSharedObject<T> {
    pub fn new(initial: T) -> RealtimeSharedObject<T> {
        Self::with_retry_limit(initial, DEFAULT_RETRY_LIMIT)
    }

    pub fn with_retry_limit(initial: T, retry_limit: usize) -> RealtimeSharedObject<T> {
        let ptr = Box::into_raw(Box::new(initial));
        RealtimeSharedObject {
            ptr: AtomicPtr::new(ptr),
            storage: Mutex::new(ptr),
            retry_limit,
        }
    }

    /// Takes the value for realtime access. Wait-free. While the returned
    /// lock is live no update can be published.
    pub fn lock_realtime(&self) -> RealtimeLock<'_, T> {
        let value = self.ptr.swap(std::ptr::null_mut(), Ordering::AcqRel);
        RealtimeLock { parent: self, value }
    }

    /// Replaces the shared value. Returns false if the reader held its lock
    /// across the entire retry budget and the new value could not be
    /// published.
    pub fn update(&self, new_value: T) -> bool {
        let mut storage = self.storage.lock().unwrap_or_else(PoisonError::into_inner);

        let new_ptr = Box::into_raw(Box::new(new_value));

        for _ in 0..self.retry_limit {
            let expected = *storage;
            if self
                .ptr
                .compare_exchange(expected, new_ptr, Ordering::AcqRel, Ordering::Acquire)
                .is_ok()
            {
                // the old allocation is no longer published; reclaim it
                unsafe { drop(Box::from_raw(expected)) };
                *storage = new_ptr;
                return true;
            }

            std::thread::sleep(RETRY_SLEEP);
        }

        log::debug!(
            "realtime shared object update failed after {} attempts",
            self.retry_limit
        );
        unsafe { drop(Box::from_raw(new_ptr)) };
        false
    }
}

impl<T> Drop for RealtimeSharedObject<T> {
    fn drop(&mut self) {
        debug_assert!(
            !self.ptr.load(Ordering::Acquire).is_null(),
            "dropped while a realtime lock was held"
        );
        let storage = self.storage.get_mut().unwrap_or_else(PoisonError::into_inner);
        unsafe { drop(Box::from_raw(*storage)) };
    }
}

/// Exclusive realtime access to the shared value. Dropping the lock (or
/// calling [`RealtimeLock::reset`]) releases the value back to the slot.
pub struct RealtimeLock<'a, T> {
    parent: &'a RealtimeSharedObject<T>,
    value: *mut T,
}

impl<T> RealtimeLock<'_, T> {
    /// The locked value. None if another lock was already live when this
    /// one was taken, which violates the single-reader contract.
    pub fn get(&self) -> Option<&T> {
        unsafe { self.value.as_ref() }
    }

    pub fn get_mut(&mut self) -> Option<&mut T> {
        unsafe { self.value.as_mut() }
    }

    /// Releases the value early.
    pub fn reset(&mut self) {
        self.parent.ptr.store(self.value, Ordering::Release);
        self.value = std::ptr::null_mut();
    }
}

impl<T> Drop for RealtimeLock<'_, T> {
    fn drop(&mut self) {
        self.parent.ptr.store(self.value, Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;

    #[test]
    fn reader_sees_published_updates() {
        let shared = RealtimeSharedObject::new(1u32);

        assert_eq!(shared.lock_realtime().get().copied(), Some(1));
        assert!(shared.update(2));
        assert_eq!(shared.lock_realtime().get().copied(), Some(2));
    }

    #[test]
    fn update_fails_while_lock_is_held() {
        let shared = RealtimeSharedObject::with_retry_limit(1u32, 3);

        let lock = shared.lock_realtime();
        assert!(!shared.update(2));
        drop(lock);

        assert!(shared.update(3));
        assert_eq!(shared.lock_realtime().get().copied(), Some(3));
    }

    #[test]
    fn reset_releases_early() {
        let shared = RealtimeSharedObject::new(7u32);
        let mut lock = shared.lock_realtime();
        lock.reset();
        assert!(shared.update(8));
        drop(lock);
        assert_eq!(shared.lock_realtime().get().copied(), Some(8));
    }

    #[test]
    fn contended_updates_are_observed_or_reported() {
        let shared = Arc::new(RealtimeSharedObject::with_retry_limit(0u64, 100));
        let stop = Arc::new(AtomicBool::new(false));

        let reader_shared = shared.clone();
        let reader_stop = stop.clone();
        let reader = std::thread::spawn(move || {
            let mut last_seen = 0u64;
            while !reader_stop.load(Ordering::Relaxed) {
                let lock = reader_shared.lock_realtime();
                if let Some(value) = lock.get() {
                    // published values never go backwards
                    assert!(*value >= last_seen);
                    last_seen = *value;
                }
            }
        });

        for value in 1..=100u64 {
            while !shared.update(value) {}
        }

        stop.store(true, Ordering::Relaxed);
        reader.join().unwrap();
        assert_eq!(shared.lock_realtime().get().copied(), Some(100));
    }
}
