//! # Shared Slab Arena
//!
//! The engine owns its allocator exclusively, so two maps pooling nodes
//! from one slab arena need external synchronization. [`SharedAllocator`]
//! is that synchronization: a cloneable handle over a mutex-guarded
//! [`SlabAllocator`]. Clones share the underlying pools; the last handle to
//! drop releases the slabs.
//!
//! The lock is taken per allocation call, never across a tree mutation, so
//! two maps can interleave inserts freely.

use std::alloc::Layout;
use std::ptr::NonNull;
use std::sync::Arc;

use parking_lot::Mutex;

use super::raw::RawAllocator;
use super::slab::{SlabAllocator, SlabConfig, SlabStats};

/// Cloneable, externally synchronized handle over one [`SlabAllocator`].
#[derive(Debug, Clone)]
pub struct SharedAllocator {
    inner: Arc<Mutex<SlabAllocator>>,
}

impl SharedAllocator {
    pub fn new() -> Self {
        Self::with_config(SlabConfig::default())
    }

    pub fn with_config(config: SlabConfig) -> Self {
        Self {
            inner: Arc::new(Mutex::new(SlabAllocator::with_config(config))),
        }
    }

    /// Aggregated occupancy across every map using this arena.
    pub fn stats(&self) -> SlabStats {
        self.inner.lock().stats()
    }
}

impl Default for SharedAllocator {
    fn default() -> Self {
        Self::new()
    }
}

impl RawAllocator for SharedAllocator {
    fn allocate(&mut self, layout: Layout) -> NonNull<u8> {
        self.inner.lock().allocate(layout)
    }

    unsafe fn deallocate(&mut self, ptr: NonNull<u8>, layout: Layout) {
        // SAFETY: forwarded from the trait contract.
        unsafe { self.inner.lock().deallocate(ptr, layout) }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clones_share_one_arena() {
        let mut a = SharedAllocator::new();
        let mut b = a.clone();

        let layout = Layout::from_size_align(128, 8).unwrap();
        let p = a.allocate(layout);
        assert_eq!(b.stats().live_items, 1);

        unsafe { b.deallocate(p, layout) };
        assert_eq!(a.stats().live_items, 0);
        assert_eq!(a.stats().free_items, 1);
    }
}
