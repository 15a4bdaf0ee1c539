//! A family of index-only FIFOs with two-phase reserve/commit positions.
//!
//! The FIFOs manage read/write bookkeeping only; element storage lives with
//! the caller (see `CircularAudioBuffer` and the RTP reader slots). Each
//! prepare call hands out a [`Position`] describing up to two contiguous
//! spans of the backing storage. Committing the lock advances the owning
//! timestamp; dropping it without committing leaves the FIFO unchanged.
//!
//! | variant  | producers | consumers | rt-safe producer | rt-safe consumer |
//! |----------|-----------|-----------|------------------|------------------|
//! | `Single` | 1         | 1 (same thread) | yes        | yes              |
//! | `Spsc`   | 1         | 1         | yes              | yes              |
//! | `Mpsc`   | N         | 1         | no (mutex)       | yes              |
//! | `Spmc`   | 1         | N         | yes              | no (mutex)       |
//! | `Mpmc`   | N         | N         | no               | no               |

use std::cell::Cell;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

/// The regions of a FIFO buffer covered by a read or write operation.
///
/// `size1 + size2` equals the requested element count; `size2` is non-zero
/// exactly when the operation wraps around the end of the buffer.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq)]
pub struct Position {
    pub index1: usize,
    pub size1: usize,
    pub size2: usize,
}

impl Position {
    /// Computes the spans for an operation of `count` elements starting at
    /// the monotonic `timestamp`, modulo `capacity`.
    pub fn new(timestamp: u64, capacity: usize, count: usize) -> Position {
        debug_assert!(count <= capacity, "count must not exceed capacity");

        if capacity == 0 {
            return Position::default();
        }

        let index1 = (timestamp % capacity as u64) as usize;
        let mut position = Position { index1, size1: count, size2: 0 };

        if index1 + count > capacity {
            position.size1 = capacity - index1;
            position.size2 = count - position.size1;
        }

        position
    }
}

/// A prepared, uncommitted FIFO operation.
pub trait Lock {
    fn position(&self) -> Position;
    fn commit(self);
}

/// The shared interface of the FIFO family.
pub trait Fifo {
    type WriteLock<'a>: Lock
    where
        Self: 'a;
    type ReadLock<'a>: Lock
    where
        Self: 'a;

    /// Reserves space for writing `count` elements. Returns `None` when the
    /// buffer does not have enough free space.
    fn prepare_for_write(&self, count: usize) -> Option<Self::WriteLock<'_>>;

    /// Reserves `count` elements for reading. Returns `None` when the
    /// buffer does not hold enough data.
    fn prepare_for_read(&self, count: usize) -> Option<Self::ReadLock<'_>>;

    /// The number of committed elements in the buffer.
    fn size(&self) -> usize;

    fn capacity(&self) -> usize;

    /// Resizes the buffer. Implies a reset. Must not be called while
    /// producers or consumers are active.
    fn resize(&mut self, capacity: usize);

    /// Discards all contents.
    fn reset(&mut self);
}

fn relock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// A FIFO without any synchronization, for single-threaded use.
#[derive(Debug, Default)]
pub struct Single {
    read_ts: Cell<u64>,
    write_ts: Cell<u64>,
    capacity: usize,
}

impl Single {
    pub fn new(capacity: usize) -> Single {
        Single { capacity, ..Single::default() }
    }
}

pub struct SingleWriteLock<'a> {
    fifo: &'a Single,
    position: Position,
    count: u64,
}

pub struct SingleReadLock<'a> {
    fifo: &'a Single,
    position: Position,
    count: u64,
}

impl Lock for SingleWriteLock<'_> {
    fn position(&self) -> Position {
        self.position
    }

    fn commit(self) {
        self.fifo.write_ts.set(self.fifo.write_ts.get() + self.count);
    }
}

impl Lock for SingleReadLock<'_> {
    fn position(&self) -> Position {
        self.position
    }

    fn commit(self) {
        self.fifo.read_ts.set(self.fifo.read_ts.get() + self.count);
    }
}

impl Fifo for Single {
    type WriteLock<'a> = SingleWriteLock<'a> where Self: 'a;
    type ReadLock<'a> = SingleReadLock<'a> where Self: 'a;

    fn prepare_for_write(&self, count: usize) -> Option<SingleWriteLock<'_>> {
        if self.size() + count > self.capacity {
            return None;
        }

        Some(SingleWriteLock {
            position: Position::new(self.write_ts.get(), self.capacity, count),
            count: count as u64,
            fifo: self,
        })
    }

    fn prepare_for_read(&self, count: usize) -> Option<SingleReadLock<'_>> {
        if self.size() < count {
            return None;
        }

        Some(SingleReadLock {
            position: Position::new(self.read_ts.get(), self.capacity, count),
            count: count as u64,
            fifo: self,
        })
    }

    fn size(&self) -> usize {
        (self.write_ts.get() - self.read_ts.get()) as usize
    }

    fn capacity(&self) -> usize {
        self.capacity
    }

    fn resize(&mut self, capacity: usize) {
        self.reset();
        self.capacity = capacity;
    }

    fn reset(&mut self) {
        self.read_ts.set(0);
        self.write_ts.set(0);
    }
}

/// A FIFO that a single producer thread and a single consumer thread can use
/// simultaneously without locking.
#[derive(Debug, Default)]
pub struct Spsc {
    read_ts: AtomicU64,
    write_ts: AtomicU64,
    size: AtomicUsize,
    capacity: usize,
}

impl Spsc {
    pub fn new(capacity: usize) -> Spsc {
        Spsc { capacity, ..Spsc::default() }
    }
}

pub struct SpscWriteLock<'a> {
    fifo: &'a Spsc,
    position: Position,
    count: usize,
}

pub struct SpscReadLock<'a> {
    fifo: &'a Spsc,
    position: Position,
    count: usize,
}

impl Lock for SpscWriteLock<'_> {
    fn position(&self) -> Position {
        self.position
    }

    fn commit(self) {
        self.fifo.write_ts.fetch_add(self.count as u64, Ordering::Relaxed);
        self.fifo.size.fetch_add(self.count, Ordering::Release);
    }
}

impl Lock for SpscReadLock<'_> {
    fn position(&self) -> Position {
        self.position
    }

    fn commit(self) {
        self.fifo.read_ts.fetch_add(self.count as u64, Ordering::Relaxed);
        self.fifo.size.fetch_sub(self.count, Ordering::Release);
    }
}

impl Fifo for Spsc {
    type WriteLock<'a> = SpscWriteLock<'a> where Self: 'a;
    type ReadLock<'a> = SpscReadLock<'a> where Self: 'a;

    fn prepare_for_write(&self, count: usize) -> Option<SpscWriteLock<'_>> {
        if self.size.load(Ordering::Acquire) + count > self.capacity {
            return None;
        }

        Some(SpscWriteLock {
            position: Position::new(self.write_ts.load(Ordering::Relaxed), self.capacity, count),
            count,
            fifo: self,
        })
    }

    fn prepare_for_read(&self, count: usize) -> Option<SpscReadLock<'_>> {
        if self.size.load(Ordering::Acquire) < count {
            return None;
        }

        Some(SpscReadLock {
            position: Position::new(self.read_ts.load(Ordering::Relaxed), self.capacity, count),
            count,
            fifo: self,
        })
    }

    fn size(&self) -> usize {
        self.size.load(Ordering::Acquire)
    }

    fn capacity(&self) -> usize {
        self.capacity
    }

    fn resize(&mut self, capacity: usize) {
        self.reset();
        self.capacity = capacity;
    }

    fn reset(&mut self) {
        *self.read_ts.get_mut() = 0;
        *self.write_ts.get_mut() = 0;
        *self.size.get_mut() = 0;
    }
}

/// A FIFO where multiple producer threads write behind a mutex, while a
/// single consumer thread reads without locking.
#[derive(Debug, Default)]
pub struct Mpsc {
    read_ts: AtomicU64,
    write_ts: Mutex<u64>,
    size: AtomicUsize,
    capacity: usize,
}

impl Mpsc {
    pub fn new(capacity: usize) -> Mpsc {
        Mpsc { capacity, ..Mpsc::default() }
    }
}

pub struct MpscWriteLock<'a> {
    fifo: &'a Mpsc,
    guard: MutexGuard<'a, u64>,
    position: Position,
    count: usize,
}

pub struct MpscReadLock<'a> {
    fifo: &'a Mpsc,
    position: Position,
    count: usize,
}

impl Lock for MpscWriteLock<'_> {
    fn position(&self) -> Position {
        self.position
    }

    fn commit(mut self) {
        *self.guard += self.count as u64;
        self.fifo.size.fetch_add(self.count, Ordering::Release);
    }
}

impl Lock for MpscReadLock<'_> {
    fn position(&self) -> Position {
        self.position
    }

    fn commit(self) {
        self.fifo.read_ts.fetch_add(self.count as u64, Ordering::Relaxed);
        self.fifo.size.fetch_sub(self.count, Ordering::Release);
    }
}

impl Fifo for Mpsc {
    type WriteLock<'a> = MpscWriteLock<'a> where Self: 'a;
    type ReadLock<'a> = MpscReadLock<'a> where Self: 'a;

    fn prepare_for_write(&self, count: usize) -> Option<MpscWriteLock<'_>> {
        let guard = relock(&self.write_ts);

        if self.size.load(Ordering::Acquire) + count > self.capacity {
            return None;
        }

        Some(MpscWriteLock {
            position: Position::new(*guard, self.capacity, count),
            count,
            guard,
            fifo: self,
        })
    }

    fn prepare_for_read(&self, count: usize) -> Option<MpscReadLock<'_>> {
        if self.size.load(Ordering::Acquire) < count {
            return None;
        }

        Some(MpscReadLock {
            position: Position::new(self.read_ts.load(Ordering::Relaxed), self.capacity, count),
            count,
            fifo: self,
        })
    }

    fn size(&self) -> usize {
        self.size.load(Ordering::Acquire)
    }

    fn capacity(&self) -> usize {
        self.capacity
    }

    fn resize(&mut self, capacity: usize) {
        self.reset();
        self.capacity = capacity;
    }

    fn reset(&mut self) {
        *self.read_ts.get_mut() = 0;
        *relock(&self.write_ts) = 0;
        *self.size.get_mut() = 0;
    }
}

/// A FIFO where a single producer thread writes without locking, while
/// multiple consumer threads read behind a mutex.
#[derive(Debug, Default)]
pub struct Spmc {
    read_ts: Mutex<u64>,
    write_ts: AtomicU64,
    size: AtomicUsize,
    capacity: usize,
}

impl Spmc {
    pub fn new(capacity: usize) -> Spmc {
        Spmc { capacity, ..Spmc::default() }
    }
}

pub struct SpmcWriteLock<'a> {
    fifo: &'a Spmc,
    position: Position,
    count: usize,
}

pub struct SpmcReadLock<'a> {
    fifo: &'a Spmc,
    guard: MutexGuard<'a, u64>,
    position: Position,
    count: usize,
}

impl Lock for SpmcWriteLock<'_> {
    fn position(&self) -> Position {
        self.position
    }

    fn commit(self) {
        self.fifo.write_ts.fetch_add(self.count as u64, Ordering::Relaxed);
        self.fifo.size.fetch_add(self.count, Ordering::Release);
    }
}

impl Lock for SpmcReadLock<'_> {
    fn position(&self) -> Position {
        self.position
    }

    fn commit(mut self) {
        *self.guard += self.count as u64;
        self.fifo.size.fetch_sub(self.count, Ordering::Release);
    }
}

impl Fifo for Spmc {
    type WriteLock<'a> = SpmcWriteLock<'a> where Self: 'a;
    type ReadLock<'a> = SpmcReadLock<'a> where Self: 'a;

    fn prepare_for_write(&self, count: usize) -> Option<SpmcWriteLock<'_>> {
        if self.size.load(Ordering::Acquire) + count > self.capacity {
            return None;
        }

        Some(SpmcWriteLock {
            position: Position::new(self.write_ts.load(Ordering::Relaxed), self.capacity, count),
            count,
            fifo: self,
        })
    }

    fn prepare_for_read(&self, count: usize) -> Option<SpmcReadLock<'_>> {
        let guard = relock(&self.read_ts);

        if self.size.load(Ordering::Acquire) < count {
            return None;
        }

        Some(SpmcReadLock {
            position: Position::new(*guard, self.capacity, count),
            count,
            guard,
            fifo: self,
        })
    }

    fn size(&self) -> usize {
        self.size.load(Ordering::Acquire)
    }

    fn capacity(&self) -> usize {
        self.capacity
    }

    fn resize(&mut self, capacity: usize) {
        self.reset();
        self.capacity = capacity;
    }

    fn reset(&mut self) {
        *relock(&self.read_ts) = 0;
        *self.write_ts.get_mut() = 0;
        *self.size.get_mut() = 0;
    }
}

#[derive(Debug, Default)]
struct MpmcState {
    read_ts: u64,
    write_ts: u64,
}

/// A FIFO where any number of producer and consumer threads share one mutex.
#[derive(Debug, Default)]
pub struct Mpmc {
    state: Mutex<MpmcState>,
    size: AtomicUsize,
    capacity: usize,
}

impl Mpmc {
    pub fn new(capacity: usize) -> Mpmc {
        Mpmc { capacity, ..Mpmc::default() }
    }
}

pub struct MpmcWriteLock<'a> {
    size: &'a AtomicUsize,
    guard: MutexGuard<'a, MpmcState>,
    position: Position,
    count: usize,
}

pub struct MpmcReadLock<'a> {
    size: &'a AtomicUsize,
    guard: MutexGuard<'a, MpmcState>,
    position: Position,
    count: usize,
}

impl Lock for MpmcWriteLock<'_> {
    fn position(&self) -> Position {
        self.position
    }

    fn commit(mut self) {
        self.guard.write_ts += self.count as u64;
        self.size.fetch_add(self.count, Ordering::Release);
    }
}

impl Lock for MpmcReadLock<'_> {
    fn position(&self) -> Position {
        self.position
    }

    fn commit(mut self) {
        self.guard.read_ts += self.count as u64;
        self.size.fetch_sub(self.count, Ordering::Release);
    }
}

impl Fifo for Mpmc {
    type WriteLock<'a> = MpmcWriteLock<'a> where Self: 'a;
    type ReadLock<'a> = MpmcReadLock<'a> where Self: 'a;

    fn prepare_for_write(&self, count: usize) -> Option<MpmcWriteLock<'_>> {
        let guard = relock(&self.state);

        if self.size.load(Ordering::Acquire) + count > self.capacity {
            return None;
        }

        Some(MpmcWriteLock {
            position: Position::new(guard.write_ts, self.capacity, count),
            count,
            guard,
            size: &self.size,
        })
    }

    fn prepare_for_read(&self, count: usize) -> Option<MpmcReadLock<'_>> {
        let guard = relock(&self.state);

        if self.size.load(Ordering::Acquire) < count {
            return None;
        }

        Some(MpmcReadLock {
            position: Position::new(guard.read_ts, self.capacity, count),
            count,
            guard,
            size: &self.size,
        })
    }

    fn size(&self) -> usize {
        self.size.load(Ordering::Acquire)
    }

    fn capacity(&self) -> usize {
        self.capacity
    }

    fn resize(&mut self, capacity: usize) {
        self.reset();
        self.capacity = capacity;
    }

    fn reset(&mut self) {
        let mut state = relock(&self.state);
        state.read_ts = 0;
        state.write_ts = 0;
        *self.size.get_mut() = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn position_arithmetic() {
        let position = Position::new(0, 8, 3);
        assert_eq!(position, Position { index1: 0, size1: 3, size2: 0 });

        let position = Position::new(6, 8, 3);
        assert_eq!(position, Position { index1: 6, size1: 2, size2: 1 });

        let position = Position::new(8, 8, 8);
        assert_eq!(position, Position { index1: 0, size1: 8, size2: 0 });

        // index1 = T mod C, size1 + size2 = n, size2 > 0 iff wrapping
        for timestamp in 0..32u64 {
            for count in 0..=8usize {
                let position = Position::new(timestamp, 8, count);
                assert_eq!(position.index1, (timestamp % 8) as usize);
                assert_eq!(position.size1 + position.size2, count);
                assert_eq!(position.size2 > 0, position.index1 + count > 8);
            }
        }
    }

    #[test]
    fn uncommitted_lock_leaves_fifo_unchanged() {
        let fifo = Single::new(4);

        {
            let lock = fifo.prepare_for_write(3).unwrap();
            assert_eq!(lock.position().size1, 3);
            // dropped without commit
        }
        assert_eq!(fifo.size(), 0);

        fifo.prepare_for_write(3).unwrap().commit();
        assert_eq!(fifo.size(), 3);

        {
            let _lock = fifo.prepare_for_read(2).unwrap();
        }
        assert_eq!(fifo.size(), 3);
    }

    #[test]
    fn single_wraps_and_refuses_overfill() {
        let fifo = Single::new(4);

        fifo.prepare_for_write(3).unwrap().commit();
        assert!(fifo.prepare_for_write(2).is_none());
        fifo.prepare_for_read(2).unwrap().commit();

        let lock = fifo.prepare_for_write(3).unwrap();
        assert_eq!(lock.position(), Position { index1: 3, size1: 1, size2: 2 });
        lock.commit();
        assert_eq!(fifo.size(), 4);
        assert!(fifo.prepare_for_read(5).is_none());
    }

    #[test]
    fn resize_implies_reset() {
        let mut fifo = Spsc::new(4);
        fifo.prepare_for_write(4).unwrap().commit();
        fifo.resize(8);
        assert_eq!(fifo.size(), 0);
        assert_eq!(fifo.capacity(), 8);
        assert!(fifo.prepare_for_write(8).is_some());
    }

    #[test]
    fn spsc_cross_thread_handoff() {
        use std::sync::Arc;

        let fifo = Arc::new(Spsc::new(16));
        let producer_fifo = fifo.clone();

        let producer = std::thread::spawn(move || {
            let mut written = 0u32;
            while written < 1000 {
                if let Some(lock) = producer_fifo.prepare_for_write(1) {
                    lock.commit();
                    written += 1;
                }
            }
        });

        let mut read = 0u32;
        while read < 1000 {
            if let Some(lock) = fifo.prepare_for_read(1) {
                lock.commit();
                read += 1;
            }
        }

        producer.join().unwrap();
        assert_eq!(fifo.size(), 0);
    }

    #[test]
    fn mpsc_producers_share_buffer() {
        use std::sync::Arc;

        let fifo = Arc::new(Mpsc::new(64));
        let mut producers = Vec::new();

        for _ in 0..4 {
            let fifo = fifo.clone();
            producers.push(std::thread::spawn(move || {
                let mut written = 0;
                while written < 100 {
                    if let Some(lock) = fifo.prepare_for_write(1) {
                        lock.commit();
                        written += 1;
                    }
                }
            }));
        }

        let mut read = 0;
        while read < 400 {
            if let Some(lock) = fifo.prepare_for_read(1) {
                lock.commit();
                read += 1;
            }
        }

        for producer in producers {
            producer.join().unwrap();
        }
        assert_eq!(fifo.size(), 0);
    }

    #[test]
    fn mpmc_round_trip() {
        let fifo = Mpmc::new(2);
        fifo.prepare_for_write(2).unwrap().commit();
        assert!(fifo.prepare_for_write(1).is_none());
        fifo.prepare_for_read(2).unwrap().commit();
        assert_eq!(fifo.size(), 0);
    }

    #[test]
    fn spmc_consumer_side_locks() {
        let fifo = Spmc::new(8);
        fifo.prepare_for_write(5).unwrap().commit();
        fifo.prepare_for_read(3).unwrap().commit();
        assert_eq!(fifo.size(), 2);
    }
}
