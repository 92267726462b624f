//! Reference-counted byte buffers recycled through a shared pool.
//!
//! A [`Buffer`] is a handle; cloning it adds a holder and dropping the last
//! holder returns the storage to the [`BufferPool`] it came from. Two frames
//! can therefore share one decoded picture and the storage stays alive until
//! both are released.

use parking_lot::Mutex;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use tracing::trace;

/// Default amount of idle storage kept for reuse.
pub const DEFAULT_IDLE_BUDGET: usize = 256 * 1024 * 1024;

/// Counters describing pool activity.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PoolStats {
    /// Buffers created with a fresh allocation.
    pub allocations: u64,
    /// Buffers served from the free list.
    pub reuses: u64,
    /// Buffers currently on the free list.
    pub idle_buffers: usize,
    /// Bytes currently on the free list.
    pub idle_bytes: usize,
}

struct PoolInner {
    free: Mutex<Vec<Vec<u8>>>,
    idle_budget: usize,
    allocations: AtomicU64,
    reuses: AtomicU64,
}

impl PoolInner {
    fn take(&self, size: usize) -> Vec<u8> {
        let reused = {
            let mut free = self.free.lock();
            let best = free
                .iter()
                .enumerate()
                .filter(|(_, b)| b.len() >= size)
                .min_by_key(|(_, b)| b.len())
                .map(|(i, _)| i);
            best.map(|i| free.swap_remove(i))
        };
        match reused {
            Some(storage) => {
                self.reuses.fetch_add(1, Ordering::Relaxed);
                storage
            }
            None => {
                self.allocations.fetch_add(1, Ordering::Relaxed);
                vec![0u8; size]
            }
        }
    }

    fn recycle(&self, storage: Vec<u8>) {
        let cap = storage.len();
        if cap == 0 {
            return;
        }
        let mut free = self.free.lock();
        let idle: usize = free.iter().map(Vec::len).sum();
        if idle + cap <= self.idle_budget {
            trace!("Recycling buffer of {} bytes", cap);
            free.push(storage);
        }
    }
}

/// Pool of reusable byte buffers shared by every pipeline stage.
///
/// Cloning the pool is cheap and yields a handle to the same free list.
#[derive(Clone)]
pub struct BufferPool {
    inner: Arc<PoolInner>,
}

impl Default for BufferPool {
    fn default() -> Self {
        Self::new(DEFAULT_IDLE_BUDGET)
    }
}

impl fmt::Debug for BufferPool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BufferPool")
            .field("stats", &self.stats())
            .finish()
    }
}

impl BufferPool {
    /// Create a pool that keeps at most `idle_budget` bytes of free storage.
    pub fn new(idle_budget: usize) -> Self {
        Self {
            inner: Arc::new(PoolInner {
                free: Mutex::new(Vec::new()),
                idle_budget,
                allocations: AtomicU64::new(0),
                reuses: AtomicU64::new(0),
            }),
        }
    }

    /// Get a buffer of at least `size` bytes.
    ///
    /// The smallest free buffer that fits is reused; otherwise a new one is
    /// allocated. Reused contents are not cleared.
    pub fn get_buffer(&self, size: usize) -> Buffer {
        Buffer {
            slot: Arc::new(Slot {
                storage: self.inner.take(size),
                len: size,
                pool: Arc::downgrade(&self.inner),
            }),
        }
    }

    /// Add a holder to `buffer`.
    #[inline]
    pub fn use_buffer(&self, buffer: &Buffer) -> Buffer {
        buffer.clone()
    }

    /// Drop one holder of `buffer`. Storage returns to the free list once
    /// no holder remains.
    #[inline]
    pub fn release_buffer(&self, buffer: Buffer) {
        drop(buffer);
    }

    /// Grow `buffer` to at least `new_size` bytes, keeping its contents.
    ///
    /// Grows in place when `buffer` is the only holder; otherwise the
    /// caller's handle is moved to a fresh copy and other holders keep
    /// the original.
    pub fn enlarge_buffer(&self, buffer: &mut Buffer, new_size: usize) {
        let new_size = new_size.max(buffer.len());
        if new_size <= buffer.capacity() {
            if let Some(slot) = Arc::get_mut(&mut buffer.slot) {
                slot.len = new_size;
                return;
            }
        }
        if let Some(slot) = Arc::get_mut(&mut buffer.slot) {
            slot.storage.resize(new_size, 0);
            slot.len = new_size;
            return;
        }
        let mut grown = self.get_buffer(new_size);
        let n = buffer.len();
        grown.make_mut()[..n].copy_from_slice(buffer.data());
        *buffer = grown;
    }

    pub fn stats(&self) -> PoolStats {
        let free = self.inner.free.lock();
        PoolStats {
            allocations: self.inner.allocations.load(Ordering::Relaxed),
            reuses: self.inner.reuses.load(Ordering::Relaxed),
            idle_buffers: free.len(),
            idle_bytes: free.iter().map(Vec::len).sum(),
        }
    }

    /// Drop all idle storage.
    pub fn trim(&self) {
        self.inner.free.lock().clear();
    }
}

struct Slot {
    storage: Vec<u8>,
    len: usize,
    pool: Weak<PoolInner>,
}

impl Clone for Slot {
    fn clone(&self) -> Self {
        let mut storage = match self.pool.upgrade() {
            Some(pool) => pool.take(self.len),
            None => vec![0u8; self.len],
        };
        storage[..self.len].copy_from_slice(&self.storage[..self.len]);
        Self {
            storage,
            len: self.len,
            pool: self.pool.clone(),
        }
    }
}

impl Drop for Slot {
    fn drop(&mut self) {
        if let Some(pool) = self.pool.upgrade() {
            pool.recycle(std::mem::take(&mut self.storage));
        }
    }
}

/// Shared handle to pooled bytes.
#[derive(Clone)]
pub struct Buffer {
    slot: Arc<Slot>,
}

impl fmt::Debug for Buffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Buffer")
            .field("len", &self.len())
            .field("capacity", &self.capacity())
            .field("use_count", &self.use_count())
            .finish()
    }
}

impl Buffer {
    /// Requested size in bytes.
    #[inline]
    pub fn len(&self) -> usize {
        self.slot.len
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.slot.len == 0
    }

    /// Allocated size in bytes.
    #[inline]
    pub fn capacity(&self) -> usize {
        self.slot.storage.len()
    }

    /// Number of live holders.
    #[inline]
    pub fn use_count(&self) -> usize {
        Arc::strong_count(&self.slot)
    }

    /// Whether both handles refer to the same storage.
    #[inline]
    pub fn ptr_eq(&self, other: &Buffer) -> bool {
        Arc::ptr_eq(&self.slot, &other.slot)
    }

    #[inline]
    pub fn data(&self) -> &[u8] {
        &self.slot.storage[..self.slot.len]
    }

    /// Mutable access, or `None` if the storage is shared.
    #[inline]
    pub fn data_mut(&mut self) -> Option<&mut [u8]> {
        Arc::get_mut(&mut self.slot).map(|s| {
            let len = s.len;
            &mut s.storage[..len]
        })
    }

    /// Mutable access, copying the bytes into a fresh pooled buffer first
    /// if another holder shares them.
    pub fn make_mut(&mut self) -> &mut [u8] {
        let slot = Arc::make_mut(&mut self.slot);
        let len = slot.len;
        &mut slot.storage[..len]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_reuses_released_buffer() {
        let pool = BufferPool::new(1 << 20);
        let a = pool.get_buffer(1000);
        pool.release_buffer(a);
        let b = pool.get_buffer(800);
        assert_eq!(b.capacity(), 1000);
        assert_eq!(b.len(), 800);
        let stats = pool.stats();
        assert_eq!(stats.allocations, 1);
        assert_eq!(stats.reuses, 1);
    }

    #[test]
    fn test_picks_smallest_fit() {
        let pool = BufferPool::new(1 << 20);
        let a = pool.get_buffer(4000);
        let b = pool.get_buffer(1000);
        let c = pool.get_buffer(2000);
        drop((a, b, c));
        let d = pool.get_buffer(1500);
        assert_eq!(d.capacity(), 2000);
    }

    #[test]
    fn test_shared_buffer_survives_one_release() {
        let pool = BufferPool::new(1 << 20);
        let mut a = pool.get_buffer(16);
        a.data_mut().unwrap().fill(7);
        let b = pool.use_buffer(&a);
        assert_eq!(a.use_count(), 2);
        pool.release_buffer(a);
        assert_eq!(b.use_count(), 1);
        assert_eq!(pool.stats().idle_buffers, 0);
        assert!(b.data().iter().all(|&x| x == 7));
        pool.release_buffer(b);
        assert_eq!(pool.stats().idle_buffers, 1);
    }

    #[test]
    fn test_shared_buffer_is_read_only() {
        let pool = BufferPool::default();
        let mut a = pool.get_buffer(8);
        let _b = a.clone();
        assert!(a.data_mut().is_none());
    }

    #[test]
    fn test_make_mut_detaches_copy() {
        let pool = BufferPool::default();
        let mut a = pool.get_buffer(4);
        a.data_mut().unwrap().copy_from_slice(&[1, 2, 3, 4]);
        let b = a.clone();
        a.make_mut()[0] = 9;
        assert_eq!(a.data(), &[9, 2, 3, 4]);
        assert_eq!(b.data(), &[1, 2, 3, 4]);
        assert!(!a.ptr_eq(&b));
    }

    #[test]
    fn test_enlarge_in_place_and_shared() {
        let pool = BufferPool::default();
        let mut a = pool.get_buffer(4);
        a.data_mut().unwrap().copy_from_slice(&[1, 2, 3, 4]);
        pool.enlarge_buffer(&mut a, 8);
        assert_eq!(a.len(), 8);
        assert_eq!(&a.data()[..4], &[1, 2, 3, 4]);

        let b = a.clone();
        pool.enlarge_buffer(&mut a, 16);
        assert_eq!(a.len(), 16);
        assert_eq!(b.len(), 8);
        assert_eq!(&a.data()[..4], &[1, 2, 3, 4]);
    }

    #[test]
    fn test_idle_budget_limits_free_list() {
        let pool = BufferPool::new(100);
        let a = pool.get_buffer(60);
        let b = pool.get_buffer(60);
        drop(a);
        drop(b);
        assert_eq!(pool.stats().idle_buffers, 1);
    }

    #[test]
    fn test_buffer_outlives_pool() {
        let pool = BufferPool::default();
        let a = pool.get_buffer(32);
        drop(pool);
        assert_eq!(a.len(), 32);
    }

    proptest! {
        #[test]
        fn prop_live_holders_keep_contents(ops in proptest::collection::vec((0usize..6, 1usize..512), 1..64)) {
            let pool = BufferPool::new(1 << 16);
            let mut live: Vec<(Buffer, u8)> = Vec::new();
            for (i, (op, size)) in ops.into_iter().enumerate() {
                let tag = (i % 251) as u8;
                match op {
                    0 | 1 | 2 => {
                        let mut b = pool.get_buffer(size);
                        b.data_mut().unwrap().fill(tag);
                        live.push((b, tag));
                    }
                    3 if !live.is_empty() => {
                        let (b, t) = &live[size % live.len()];
                        live.push((pool.use_buffer(b), *t));
                    }
                    _ if !live.is_empty() => {
                        let (b, _) = live.swap_remove(size % live.len());
                        pool.release_buffer(b);
                    }
                    _ => {}
                }
                for (b, t) in &live {
                    prop_assert!(b.data().iter().all(|x| x == t));
                }
            }
        }
    }
}
