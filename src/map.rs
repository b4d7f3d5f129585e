//! # Public Map Surface
//!
//! [`PackedMap`] is the public face over the B-tree engine: an ordered
//! key→value map for fixed-width, trivially copyable entries, tuned for
//! workloads where a hash map costs too much memory per entry and a
//! pointer-heavy tree wastes cache lines per node.
//!
//! ```ignore
//! use packmap::PackedMap;
//!
//! let mut map: PackedMap<u64, u64> = PackedMap::new();
//! map.add(1, 100)?;
//! map.set(1, 200);
//! assert_eq!(map.get(&1)?, &200);
//! for (k, v) in map.iter() { /* ascending key order */ }
//! ```
//!
//! ## Failure Model
//!
//! Misuse (duplicate `add`, `get` on an absent key, inverted range bounds)
//! surfaces as a typed [`MapError`] inside an `eyre::Report`, before any
//! mutation is visible. Allocation exhaustion is fatal and aborts; there
//! is no partially-applied operation to observe.
//!
//! ## Iteration
//!
//! Iterators borrow the map, so the borrow checker enforces what the
//! engine's cursors cannot express on their own: no mutation can free a
//! node out from under a live iterator.

use eyre::{ensure, Report, Result};

use crate::btree::cursor::Cursor;
use crate::btree::layout::NodeLayout;
use crate::btree::tree::Tree;
use crate::config::DEFAULT_TARGET_NODE_BYTES;
use crate::error::MapError;
use crate::memory::{HeapAllocator, RawAllocator};
use crate::order::{Comparator, NaturalOrder};
use crate::types::Pod;

/// Ordered map over a B-tree of fixed-byte-budget nodes.
///
/// `C` injects the key order as a zero-size type (defaulting to the key's
/// own `Ord`); `A` supplies raw node storage (defaulting to the global
/// heap; see [`crate::memory::SlabAllocator`] for pooled allocation).
pub struct PackedMap<K: Pod, V: Pod, C = NaturalOrder, A: RawAllocator = HeapAllocator> {
    tree: Tree<K, V, C, A>,
}

impl<K: Pod + Ord, V: Pod> PackedMap<K, V> {
    /// An empty map with the default 256-byte node budget, natural key
    /// order and heap-backed nodes.
    pub fn new() -> Self {
        // INVARIANT: the default budget always yields a valid geometry
        // (capacity is clamped to at least the floor and the 256-byte
        // budget cannot overflow the u16 header fields).
        Self::with_config(DEFAULT_TARGET_NODE_BYTES, NaturalOrder, HeapAllocator)
            .expect("default node budget always yields a valid layout")
    }

    /// An empty map with a custom node byte budget.
    pub fn with_target_node_bytes(target_node_bytes: usize) -> Result<Self> {
        Self::with_config(target_node_bytes, NaturalOrder, HeapAllocator)
    }
}

impl<K: Pod + Ord, V: Pod, A: RawAllocator> PackedMap<K, V, NaturalOrder, A> {
    /// An empty map drawing node storage from `alloc`.
    pub fn new_in(alloc: A) -> Self {
        Self::with_config(DEFAULT_TARGET_NODE_BYTES, NaturalOrder, alloc)
            .expect("default node budget always yields a valid layout")
    }
}

impl<K: Pod, V: Pod, C: Comparator<K>, A: RawAllocator> PackedMap<K, V, C, A> {
    /// An empty map with every construction option explicit: node byte
    /// budget, comparator, allocator.
    pub fn with_config(target_node_bytes: usize, cmp: C, alloc: A) -> Result<Self> {
        let layout = NodeLayout::compute::<K, V>(target_node_bytes)?;
        Ok(Self {
            tree: Tree::new(layout, cmp, alloc),
        })
    }

    // ------------------------------------------------------------------
    // Mutation
    // ------------------------------------------------------------------

    /// Inserts a new entry. Fails with [`MapError::DuplicateKey`] when the
    /// key is already present (use [`PackedMap::set`] to upsert).
    pub fn add(&mut self, key: K, value: V) -> Result<()> {
        if self.tree.insert_unique(key, value) {
            Ok(())
        } else {
            Err(Report::new(MapError::DuplicateKey))
        }
    }

    /// Upserts: inserts when absent, overwrites the value otherwise.
    pub fn set(&mut self, key: K, value: V) {
        self.tree.upsert(key, value);
    }

    /// Removes the entry for `key`. Returns whether anything was removed.
    pub fn remove(&mut self, key: &K) -> bool {
        self.tree.erase_key(key)
    }

    /// Frees every node and resets the map to empty. The allocator is
    /// retained and reused by later inserts.
    pub fn clear(&mut self) {
        self.tree.clear();
    }

    // ------------------------------------------------------------------
    // Lookup
    // ------------------------------------------------------------------

    /// The value stored for `key`. Fails with [`MapError::KeyNotFound`]
    /// when absent; use [`PackedMap::try_get`] to tolerate absence.
    pub fn get(&self, key: &K) -> Result<&V> {
        self.try_get(key)
            .ok_or_else(|| Report::new(MapError::KeyNotFound))
    }

    /// The value stored for `key`, or `None`.
    pub fn try_get(&self, key: &K) -> Option<&V> {
        let cur = self.tree.find(key)?;
        let entry = cur.entry_ptr(self.tree.layout());
        // SAFETY: the cursor names a live entry; the returned reference is
        // tied to `&self`, so no mutation can free the node beneath it.
        Some(unsafe { &(*entry).value })
    }

    /// Whether `key` is present.
    pub fn contains(&self, key: &K) -> bool {
        self.tree.find(key).is_some()
    }

    /// Whether the exact `(key, value)` pair is present.
    pub fn contains_entry(&self, key: &K, value: &V) -> bool
    where
        V: PartialEq,
    {
        self.try_get(key) == Some(value)
    }

    pub fn len(&self) -> usize {
        self.tree.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tree.len() == 0
    }

    // ------------------------------------------------------------------
    // Ordered enumeration
    // ------------------------------------------------------------------

    /// All entries in ascending key order.
    pub fn iter(&self) -> Iter<'_, K, V> {
        Iter {
            layout: *self.tree.layout(),
            cur: self.tree.begin(),
            end: self.tree.end(),
            _map: std::marker::PhantomData,
        }
    }

    /// Entries from `lower_bound(start)` to `upper_bound(end)`.
    ///
    /// The bounds follow the cursor algebra exactly: the iteration runs
    /// `[lower_bound(start), upper_bound(end))`, so an entry whose key
    /// equals `end` is included — in particular `range(k, k)` on a present
    /// key yields that single entry. Fails with [`MapError::InvalidRange`]
    /// when `end` sorts before `start`.
    pub fn range(&self, start: &K, end: &K) -> Result<Iter<'_, K, V>> {
        if self.tree.comparator().lt(end, start) {
            return Err(Report::new(MapError::InvalidRange));
        }
        let cur = self.tree.lower_bound(start);
        let end_cur = match self.tree.upper_bound(end) {
            c if c.node.is_some() => c,
            _ => self.tree.end(),
        };
        let cur = if cur.node.is_some() { cur } else { end_cur };
        Ok(Iter {
            layout: *self.tree.layout(),
            cur,
            end: end_cur,
            _map: std::marker::PhantomData,
        })
    }

    /// Entries from `lower_bound(start)` to the end of the map.
    pub fn from(&self, start: &K) -> Iter<'_, K, V> {
        let end = self.tree.end();
        let cur = match self.tree.lower_bound(start) {
            c if c.node.is_some() => c,
            _ => end,
        };
        Iter {
            layout: *self.tree.layout(),
            cur,
            end,
            _map: std::marker::PhantomData,
        }
    }

    /// Copies every entry, in ascending key order, into `dst` starting at
    /// `offset`. Fails when the destination cannot hold them.
    pub fn copy_to(&self, dst: &mut [(K, V)], offset: usize) -> Result<()> {
        ensure!(
            offset <= dst.len() && dst.len() - offset >= self.len(),
            "destination too small: need {} slots at offset {}, have {}",
            self.len(),
            offset,
            dst.len()
        );
        for (slot, (k, v)) in dst[offset..].iter_mut().zip(self.iter()) {
            *slot = (*k, *v);
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Introspection
    // ------------------------------------------------------------------

    /// Total bytes held in node allocations.
    pub fn bytes_used(&self) -> usize {
        self.tree.bytes_used()
    }

    /// Number of live nodes.
    pub fn node_count(&self) -> usize {
        self.tree.node_count()
    }

    /// Levels from root to leaves (0 when empty).
    pub fn height(&self) -> usize {
        self.tree.height()
    }

    /// Entries a full node holds under this map's byte budget.
    pub fn node_capacity(&self) -> usize {
        self.tree.layout().kv_count
    }

    /// Bookkeeping bytes per entry beyond the entry payload itself.
    pub fn overhead(&self) -> f64 {
        if self.is_empty() {
            return 0.0;
        }
        let payload = self.len() * self.tree.layout().entry_size;
        (self.bytes_used().saturating_sub(payload)) as f64 / self.len() as f64
    }

    /// Entry-slot utilization: `len / (node_count * node_capacity)`,
    /// in `[0, 1]`.
    pub fn fullness(&self) -> f64 {
        if self.node_count() == 0 {
            return 0.0;
        }
        self.len() as f64 / (self.node_count() * self.node_capacity()) as f64
    }

    /// The allocator backing this map's nodes.
    pub fn allocator(&self) -> &A {
        self.tree.allocator()
    }

    /// Walks the whole tree and checks its structural invariants.
    /// O(n); intended for tests, fuzzing and debugging.
    pub fn validate(&self) -> Result<()> {
        self.tree.validate()
    }
}

impl<K: Pod + Ord, V: Pod> Default for PackedMap<K, V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V, C, A> std::fmt::Debug for PackedMap<K, V, C, A>
where
    K: Pod + std::fmt::Debug,
    V: Pod + std::fmt::Debug,
    C: Comparator<K>,
    A: RawAllocator,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_map().entries(self.iter()).finish()
    }
}

/// Double-ended iterator over map entries in ascending key order.
///
/// Returned by [`PackedMap::iter`], [`PackedMap::range`] and
/// [`PackedMap::from`].
pub struct Iter<'a, K: Pod, V: Pod> {
    layout: NodeLayout,
    cur: Cursor<K, V>,
    end: Cursor<K, V>,
    _map: std::marker::PhantomData<&'a ()>,
}

impl<'a, K: Pod, V: Pod> std::fmt::Debug for Iter<'a, K, V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Iter")
            .field("layout", &self.layout)
            .field("cur", &self.cur)
            .field("end", &self.end)
            .finish()
    }
}

impl<'a, K: Pod, V: Pod> Iterator for Iter<'a, K, V> {
    type Item = (&'a K, &'a V);

    fn next(&mut self) -> Option<Self::Item> {
        if self.cur.node.is_none() || self.cur == self.end {
            return None;
        }
        let entry = self.cur.entry_ptr(&self.layout);
        self.cur.increment(&self.layout);
        // SAFETY: the cursor named a live entry and the iterator's borrow
        // of the map keeps every node alive and unmodified.
        Some(unsafe { (&(*entry).key, &(*entry).value) })
    }
}

impl<'a, K: Pod, V: Pod> DoubleEndedIterator for Iter<'a, K, V> {
    fn next_back(&mut self) -> Option<Self::Item> {
        if self.end.node.is_none() || self.cur == self.end {
            return None;
        }
        self.end.decrement(&self.layout);
        let entry = self.end.entry_ptr(&self.layout);
        // SAFETY: as in next().
        Some(unsafe { (&(*entry).key, &(*entry).value) })
    }
}

impl<'a, K: Pod, V: Pod, C: Comparator<K>, A: RawAllocator> IntoIterator
    for &'a PackedMap<K, V, C, A>
{
    type Item = (&'a K, &'a V);
    type IntoIter = Iter<'a, K, V>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}
