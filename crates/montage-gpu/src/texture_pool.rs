//! GPU texture pool handing out leases to composited frames.
//!
//! Textures are keyed by (width, height, format). A leased texture is
//! tracked by id until the [`TextureLease`] held by its frame is dropped,
//! which moves it back to the free list.

use crate::texture::{FrameTexture, FRAME_FORMAT};
use montage_core::TextureLease;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::{Arc, Weak};
use tracing::trace;

/// Key for pooled textures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TextureKey {
    pub width: u32,
    pub height: u32,
    pub format: wgpu::TextureFormat,
}

/// What the pool needs to know about a texture.
pub trait PooledTexture: Send + Sync + 'static {
    fn key(&self) -> TextureKey;
    fn memory_size(&self) -> u64;
}

impl PooledTexture for FrameTexture {
    fn key(&self) -> TextureKey {
        TextureKey {
            width: self.width,
            height: self.height,
            format: FRAME_FORMAT,
        }
    }

    fn memory_size(&self) -> u64 {
        self.byte_size()
    }
}

struct PoolState<T> {
    free: HashMap<TextureKey, Vec<Arc<T>>>,
    leased: HashMap<u64, Arc<T>>,
    /// Memory held by free textures.
    idle_memory: u64,
    max_memory: u64,
    next_id: u64,
}

impl<T: PooledTexture> PoolState<T> {
    fn give_back(&mut self, id: u64) {
        let Some(texture) = self.leased.remove(&id) else {
            return;
        };
        let mem = texture.memory_size();
        if self.idle_memory + mem > self.max_memory {
            trace!("Texture {} dropped, pool over budget", id);
            return;
        }
        self.idle_memory += mem;
        self.free.entry(texture.key()).or_default().push(texture);
    }
}

/// Pool of reusable GPU textures.
pub struct TexturePool<T: PooledTexture = FrameTexture> {
    state: Arc<Mutex<PoolState<T>>>,
}

impl<T: PooledTexture> Clone for TexturePool<T> {
    fn clone(&self) -> Self {
        Self {
            state: Arc::clone(&self.state),
        }
    }
}

impl<T: PooledTexture> TexturePool<T> {
    /// Create a pool keeping at most `max_memory` bytes of idle textures.
    pub fn new(max_memory: u64) -> Self {
        Self {
            state: Arc::new(Mutex::new(PoolState {
                free: HashMap::new(),
                leased: HashMap::new(),
                idle_memory: 0,
                max_memory,
                next_id: 1,
            })),
        }
    }

    /// Lease a texture matching `key`, creating one with `create` when none
    /// is free.
    pub fn acquire(&self, key: TextureKey, create: impl FnOnce() -> T) -> (TextureLease, Arc<T>) {
        let mut state = self.state.lock();
        let reused = state.free.get_mut(&key).and_then(Vec::pop);
        let texture = match reused {
            Some(t) => {
                state.idle_memory -= t.memory_size();
                t
            }
            None => Arc::new(create()),
        };
        let id = state.next_id;
        state.next_id += 1;
        state.leased.insert(id, Arc::clone(&texture));
        drop(state);

        let weak: Weak<Mutex<PoolState<T>>> = Arc::downgrade(&self.state);
        let lease = TextureLease::new(
            id,
            key.width,
            key.height,
            Box::new(move |id| {
                if let Some(state) = weak.upgrade() {
                    state.lock().give_back(id);
                }
            }),
        );
        (lease, texture)
    }

    /// Texture behind a live lease.
    pub fn get(&self, id: u64) -> Option<Arc<T>> {
        self.state.lock().leased.get(&id).cloned()
    }

    /// Memory held by free textures.
    pub fn memory_usage(&self) -> u64 {
        self.state.lock().idle_memory
    }

    /// Number of free textures.
    pub fn texture_count(&self) -> usize {
        self.state.lock().free.values().map(Vec::len).sum()
    }

    pub fn leased_count(&self) -> usize {
        self.state.lock().leased.len()
    }

    /// Drop every free texture.
    pub fn clear(&self) {
        let mut state = self.state.lock();
        state.free.clear();
        state.idle_memory = 0;
    }

    /// Drop free textures until idle memory is at or below `target`.
    pub fn evict_to(&self, target: u64) {
        let mut state = self.state.lock();
        while state.idle_memory > target {
            let key = state
                .free
                .iter()
                .filter(|(_, v)| !v.is_empty())
                .max_by_key(|(_, v)| v.len())
                .map(|(k, _)| *k);
            let Some(key) = key else { break };
            let popped = state.free.get_mut(&key).and_then(Vec::pop);
            if let Some(t) = popped {
                state.idle_memory -= t.memory_size();
            }
            if state.free.get(&key).map_or(false, Vec::is_empty) {
                state.free.remove(&key);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FakeTexture(TextureKey);

    impl PooledTexture for FakeTexture {
        fn key(&self) -> TextureKey {
            self.0
        }
        fn memory_size(&self) -> u64 {
            self.0.width as u64 * self.0.height as u64 * 4
        }
    }

    fn key(w: u32, h: u32) -> TextureKey {
        TextureKey {
            width: w,
            height: h,
            format: wgpu::TextureFormat::Rgba8Unorm,
        }
    }

    #[test]
    fn test_lease_returns_on_drop() {
        let pool: TexturePool<FakeTexture> = TexturePool::new(1 << 20);
        let (lease, _tex) = pool.acquire(key(4, 4), || FakeTexture(key(4, 4)));
        assert_eq!(pool.leased_count(), 1);
        assert!(pool.get(lease.id).is_some());
        drop(lease);
        assert_eq!(pool.leased_count(), 0);
        assert_eq!(pool.texture_count(), 1);
        assert_eq!(pool.memory_usage(), 64);
    }

    #[test]
    fn test_reuses_matching_texture() {
        let pool: TexturePool<FakeTexture> = TexturePool::new(1 << 20);
        let (lease, first) = pool.acquire(key(4, 4), || FakeTexture(key(4, 4)));
        drop(lease);
        let mut created = false;
        let (_lease, second) = pool.acquire(key(4, 4), || {
            created = true;
            FakeTexture(key(4, 4))
        });
        assert!(!created);
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(pool.memory_usage(), 0);
    }

    #[test]
    fn test_over_budget_texture_is_dropped() {
        let pool: TexturePool<FakeTexture> = TexturePool::new(100);
        let (a, _) = pool.acquire(key(4, 4), || FakeTexture(key(4, 4)));
        let (b, _) = pool.acquire(key(4, 4), || FakeTexture(key(4, 4)));
        drop(a);
        drop(b);
        assert_eq!(pool.texture_count(), 1);
    }

    #[test]
    fn test_evict_to() {
        let pool: TexturePool<FakeTexture> = TexturePool::new(1 << 20);
        let leases: Vec<_> = (0..3)
            .map(|_| pool.acquire(key(2, 2), || FakeTexture(key(2, 2))).0)
            .collect();
        drop(leases);
        assert_eq!(pool.memory_usage(), 48);
        pool.evict_to(20);
        assert_eq!(pool.memory_usage(), 16);
    }

    #[test]
    fn test_lease_outliving_pool() {
        let pool: TexturePool<FakeTexture> = TexturePool::new(1 << 20);
        let (lease, _) = pool.acquire(key(1, 1), || FakeTexture(key(1, 1)));
        drop(pool);
        drop(lease);
    }
}
