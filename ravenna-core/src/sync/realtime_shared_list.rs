use std::sync::atomic::{AtomicPtr, Ordering};
use std::sync::{Mutex, PoisonError};

use super::{DEFAULT_RETRY_LIMIT, RETRY_SLEEP};

/// Shares a list of values with one realtime reader, wait-free on the
/// reader side.
///
/// The published value is a vector of element pointers. Two backing vectors
/// ping-pong: every mutation rebuilds the spare vector from the owned
/// elements and swaps it in with the same bounded compare-exchange protocol
/// as [`super::RealtimeSharedObject`], so steady-state writes do not
/// allocate vector storage.
#[derive(Debug)]
pub struct RealtimeSharedList<T> {
    ptr: AtomicPtr<Vec<*mut T>>,
    inner: Mutex<ListInner<T>>,
    retry_limit: usize,
}

#[derive(Debug)]
struct ListInner<T> {
    elements: Vec<Box<T>>,
    vectors: [*mut Vec<*mut T>; 2],
    active: usize,
}

unsafe impl<T: Send> Send for RealtimeSharedList<T> {}
unsafe impl<T: Send + Sync> Sync for RealtimeSharedList<T> {}

impl<T> Default for RealtimeSharedList<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> RealtimeSharedList<T> {
    pub fn new() -> RealtimeSharedList<T> {
        Self::with_retry_limit(DEFAULT_RETRY_LIMIT)
    }

    pub fn with_retry_limit(retry_limit: usize) -> RealtimeSharedList<T> {
        let vectors = [
            Box::into_raw(Box::new(Vec::new())),
            Box::into_raw(Box::new(Vec::new())),
        ];
        RealtimeSharedList {
            ptr: AtomicPtr::new(vectors[0]),
            inner: Mutex::new(ListInner { elements: Vec::new(), vectors, active: 0 }),
            retry_limit,
        }
    }

    /// Takes the element list for realtime access. Wait-free.
    pub fn lock_realtime(&self) -> RealtimeListLock<'_, T> {
        let value = self.ptr.swap(std::ptr::null_mut(), Ordering::AcqRel);
        RealtimeListLock { parent: self, value }
    }

    /// Appends an element. Returns false if publication failed within the
    /// retry budget; the list is unchanged in that case.
    pub fn push_back(&self, element: T) -> bool {
        let mut inner = self.lock_inner();
        inner.elements.push(Box::new(element));

        if self.publish(&mut inner) {
            true
        } else {
            inner.elements.pop();
            false
        }
    }

    /// Removes the element at `index`. Returns false for an out-of-bounds
    /// index or when publication failed; the list is unchanged in either
    /// case.
    pub fn erase(&self, index: usize) -> bool {
        let mut inner = self.lock_inner();
        if index >= inner.elements.len() {
            return false;
        }

        let element = inner.elements.remove(index);

        if self.publish(&mut inner) {
            true
        } else {
            inner.elements.insert(index, element);
            false
        }
    }

    /// Removes all elements. Returns false if publication failed; the list
    /// is unchanged in that case.
    pub fn clear(&self) -> bool {
        let mut inner = self.lock_inner();
        let elements = std::mem::take(&mut inner.elements);

        if self.publish(&mut inner) {
            true
        } else {
            inner.elements = elements;
            false
        }
    }

    /// Number of elements, observed from the writer side.
    pub fn len(&self) -> usize {
        self.lock_inner().elements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock_inner(&self) -> std::sync::MutexGuard<'_, ListInner<T>> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn publish(&self, inner: &mut ListInner<T>) -> bool {
        let spare = inner.vectors[1 - inner.active];

        unsafe {
            let spare_vec = &mut *spare;
            spare_vec.clear();
            spare_vec.extend(inner.elements.iter_mut().map(|e| &mut **e as *mut T));
        }

        for _ in 0..self.retry_limit {
            let expected = inner.vectors[inner.active];
            if self
                .ptr
                .compare_exchange(expected, spare, Ordering::AcqRel, Ordering::Acquire)
                .is_ok()
            {
                inner.active = 1 - inner.active;
                return true;
            }

            std::thread::sleep(RETRY_SLEEP);
        }

        log::debug!(
            "realtime shared list update failed after {} attempts",
            self.retry_limit
        );
        false
    }
}

impl<T> Drop for RealtimeSharedList<T> {
    fn drop(&mut self) {
        debug_assert!(
            !self.ptr.load(Ordering::Acquire).is_null(),
            "dropped while a realtime lock was held"
        );
        let inner = self.inner.get_mut().unwrap_or_else(PoisonError::into_inner);
        for vector in inner.vectors {
            unsafe { drop(Box::from_raw(vector)) };
        }
    }
}

/// Exclusive realtime access to the element list.
pub struct RealtimeListLock<'a, T> {
    parent: &'a RealtimeSharedList<T>,
    value: *mut Vec<*mut T>,
}

impl<T> RealtimeListLock<'_, T> {
    pub fn len(&self) -> usize {
        self.vec().map(Vec::len).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn at(&self, index: usize) -> Option<&T> {
        let vec = self.vec()?;
        vec.get(index).map(|ptr| unsafe { &**ptr })
    }

    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.vec()
            .map(|vec| vec.as_slice())
            .unwrap_or(&[])
            .iter()
            .map(|ptr| unsafe { &**ptr })
    }

    /// Releases the list early.
    pub fn reset(&mut self) {
        self.parent.ptr.store(self.value, Ordering::Release);
        self.value = std::ptr::null_mut();
    }

    fn vec(&self) -> Option<&Vec<*mut T>> {
        unsafe { self.value.as_ref() }
    }
}

impl<T> Drop for RealtimeListLock<'_, T> {
    fn drop(&mut self) {
        self.parent.ptr.store(self.value, Ordering::Release);
    }
}
