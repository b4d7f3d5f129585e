//! # Node Accessors and Local Mutations
//!
//! [`NodeRef`] is a copyable handle over one raw node allocation. Every
//! accessor reads or writes through the pointer; nothing here holds long
//! lived references into node memory, so the engine can hop freely between
//! a node, its parent and its siblings during a mutation.
//!
//! All mutations are purely local: they touch a node plus at most its
//! parent or one immediate sibling, and they keep child back-pointers
//! (`parent`, `position`) exact. They assume the caller supplies valid
//! indices and capacity headroom — tree-wide invariants are the engine's
//! job, checked with `debug_assert!` here.
//!
//! ## Safety
//!
//! A `NodeRef` is only ever created for a live allocation owned by exactly
//! one tree, and the engine is strictly single-threaded, so plain loads and
//! stores through the header pointer cannot race. Entry slots beyond
//! `count` are uninitialized; every read below is bounded by `count` (or by
//! an explicit caller-provided index asserted against it).

use std::marker::PhantomData;
use std::ptr::{self, NonNull};

use crate::order::Comparator;
use crate::types::Pod;

use super::layout::{Entry, NodeHeader, NodeKind, NodeLayout};

/// Copyable handle to one node allocation.
pub(crate) struct NodeRef<K, V> {
    ptr: NonNull<NodeHeader>,
    _marker: PhantomData<*mut Entry<K, V>>,
}

impl<K, V> Clone for NodeRef<K, V> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<K, V> Copy for NodeRef<K, V> {}

impl<K, V> PartialEq for NodeRef<K, V> {
    fn eq(&self, other: &Self) -> bool {
        self.ptr == other.ptr
    }
}

impl<K, V> Eq for NodeRef<K, V> {}

impl<K, V> std::fmt::Debug for NodeRef<K, V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("NodeRef").field(&self.ptr).finish()
    }
}

impl<K: Pod, V: Pod> NodeRef<K, V> {
    /// Writes a fresh header into `region` and returns the handle.
    /// Entry slots start uninitialized; `parent` starts null (root).
    pub fn init(region: NonNull<u8>, kind: NodeKind, max_count: usize) -> Self {
        let ptr = region.cast::<NodeHeader>();
        // SAFETY: region is a fresh allocation of at least header size,
        // aligned for NodeHeader by the node layout.
        unsafe {
            ptr.as_ptr().write(NodeHeader {
                kind,
                position: 0,
                count: 0,
                max_count: max_count as u16,
                parent: ptr::null_mut(),
            });
        }
        Self {
            ptr,
            _marker: PhantomData,
        }
    }

    fn from_header(ptr: *mut NodeHeader) -> Option<Self> {
        NonNull::new(ptr).map(|ptr| Self {
            ptr,
            _marker: PhantomData,
        })
    }

    pub fn as_raw(self) -> NonNull<u8> {
        self.ptr.cast()
    }

    fn hdr(self) -> *mut NodeHeader {
        self.ptr.as_ptr()
    }

    pub fn kind(self) -> NodeKind {
        unsafe { (*self.hdr()).kind }
    }

    pub fn is_leaf(self) -> bool {
        self.kind() == NodeKind::Leaf
    }

    pub fn is_internal(self) -> bool {
        self.kind() == NodeKind::Internal
    }

    pub fn count(self) -> usize {
        unsafe { (*self.hdr()).count as usize }
    }

    pub fn max_count(self) -> usize {
        unsafe { (*self.hdr()).max_count as usize }
    }

    pub fn position(self) -> usize {
        unsafe { (*self.hdr()).position as usize }
    }

    pub fn parent(self) -> Option<Self> {
        Self::from_header(unsafe { (*self.hdr()).parent })
    }

    pub fn is_root(self) -> bool {
        unsafe { (*self.hdr()).parent.is_null() }
    }

    pub fn set_count(self, count: usize) {
        unsafe { (*self.hdr()).count = count as u16 }
    }

    pub fn set_position(self, position: usize) {
        unsafe { (*self.hdr()).position = position as u16 }
    }

    /// Detaches the node from any parent, marking it the root.
    pub fn make_root(self) {
        unsafe {
            (*self.hdr()).parent = ptr::null_mut();
            (*self.hdr()).position = 0;
        }
    }

    // ------------------------------------------------------------------
    // Entry slots
    // ------------------------------------------------------------------

    pub fn entry_ptr(self, lay: &NodeLayout, i: usize) -> *mut Entry<K, V> {
        debug_assert!(i < self.max_count(), "entry index {} out of capacity", i);
        // SAFETY: i is within the allocated entry array.
        unsafe {
            self.as_raw()
                .as_ptr()
                .add(lay.entries_offset)
                .cast::<Entry<K, V>>()
                .add(i)
        }
    }

    pub fn entry(self, lay: &NodeLayout, i: usize) -> Entry<K, V> {
        debug_assert!(i < self.count());
        unsafe { self.entry_ptr(lay, i).read() }
    }

    pub fn set_entry(self, lay: &NodeLayout, i: usize, entry: Entry<K, V>) {
        unsafe { self.entry_ptr(lay, i).write(entry) }
    }

    pub fn key(self, lay: &NodeLayout, i: usize) -> K {
        debug_assert!(i < self.count());
        unsafe { ptr::addr_of!((*self.entry_ptr(lay, i)).key).read() }
    }

    // ------------------------------------------------------------------
    // Child slots (internal nodes)
    // ------------------------------------------------------------------

    fn child_slot(self, lay: &NodeLayout, i: usize) -> *mut *mut NodeHeader {
        debug_assert!(self.is_internal());
        debug_assert!(i <= self.max_count(), "child index {} out of capacity", i);
        // SAFETY: internal allocations carry kv_count + 1 child slots.
        unsafe {
            self.as_raw()
                .as_ptr()
                .add(lay.children_offset)
                .cast::<*mut NodeHeader>()
                .add(i)
        }
    }

    pub fn child(self, lay: &NodeLayout, i: usize) -> Self {
        debug_assert!(i <= self.count());
        let child = unsafe { self.child_slot(lay, i).read() };
        Self::from_header(child).expect("child slot must hold a node")
    }

    /// Installs `child` at slot `i`, fixing its back-pointers.
    pub fn init_child(self, lay: &NodeLayout, i: usize, child: Self) {
        unsafe {
            self.child_slot(lay, i).write(child.hdr());
            (*child.hdr()).parent = self.hdr();
            (*child.hdr()).position = i as u16;
        }
    }

    /// Moves the pointer already stored at `from` to slot `to`, fixing the
    /// child's position.
    fn shift_child(self, lay: &NodeLayout, from: usize, to: usize) {
        unsafe {
            let child = self.child_slot(lay, from).read();
            debug_assert!(!child.is_null());
            self.child_slot(lay, to).write(child);
            (*child).position = to as u16;
        }
    }

    // ------------------------------------------------------------------
    // Search
    // ------------------------------------------------------------------

    /// Smallest index `i` in `[0, count]` with `key[i] >= key`, by linear
    /// scan. The node spans a handful of cache lines, so the scan beats a
    /// binary search's branch mispredictions at this size.
    pub fn linear_search<C: Comparator<K>>(self, lay: &NodeLayout, cmp: &C, key: &K) -> usize {
        let n = self.count();
        let mut i = 0;
        while i < n {
            let probe = self.key(lay, i);
            if !cmp.lt(&probe, key) {
                break;
            }
            i += 1;
        }
        i
    }

    /// Smallest index `i` in `[0, count]` with `key[i] > key`.
    pub fn upper_search<C: Comparator<K>>(self, lay: &NodeLayout, cmp: &C, key: &K) -> usize {
        let n = self.count();
        let mut i = 0;
        while i < n {
            let probe = self.key(lay, i);
            if cmp.lt(key, &probe) {
                break;
            }
            i += 1;
        }
        i
    }

    // ------------------------------------------------------------------
    // Local mutations
    // ------------------------------------------------------------------

    /// Shift-inserts `entry` at slot `i`. On internal nodes the child slots
    /// right of `i` shift with it and slot `i + 1` is left for the caller
    /// to fill with [`NodeRef::init_child`].
    pub fn insert_entry(self, lay: &NodeLayout, i: usize, entry: Entry<K, V>) {
        let n = self.count();
        debug_assert!(i <= n);
        debug_assert!(n < self.max_count(), "insert into full node");

        unsafe {
            let base = self.entry_ptr(lay, i);
            ptr::copy(base, base.add(1), n - i);
            base.write(entry);
        }
        if self.is_internal() {
            for j in (i + 1..=n).rev() {
                self.shift_child(lay, j, j + 1);
            }
            // Vacated slot; the caller installs the new child.
            unsafe { self.child_slot(lay, i + 1).write(ptr::null_mut()) };
        }
        self.set_count(n + 1);
    }

    /// Shift-removes the entry at slot `i`. On internal nodes the child at
    /// slot `i + 1` must already be drained (merged away); its slot is
    /// dropped with the entry.
    pub fn remove_entry(self, lay: &NodeLayout, i: usize) {
        let n = self.count();
        debug_assert!(i < n);

        if self.is_internal() {
            debug_assert_eq!(
                self.child(lay, i + 1).count(),
                0,
                "removing a delimiter whose right child still holds entries"
            );
            for j in i + 2..=n {
                self.shift_child(lay, j, j - 1);
            }
        }
        unsafe {
            let base = self.entry_ptr(lay, i);
            ptr::copy(base.add(1), base, n - i - 1);
        }
        self.set_count(n - 1);
    }

    /// Biased split of a full node into the fresh sibling `dst`.
    ///
    /// The bias follows the pending insertion: inserting at slot 0 moves
    /// all but one entry right (descending fills pack tightly), inserting
    /// past the last slot moves none (ascending fills pack tightly),
    /// anything else moves half. The last remaining entry is promoted into
    /// the parent at this node's position and `dst` becomes the child at
    /// `position + 1`. The parent must have a free slot.
    pub fn split(self, lay: &NodeLayout, insert_pos: usize, dst: Self) {
        debug_assert_eq!(dst.count(), 0);
        debug_assert_eq!(dst.kind(), self.kind());
        debug_assert_eq!(self.count(), self.max_count());

        let old_count = self.count();
        let dst_count = if insert_pos == 0 {
            old_count - 1
        } else if insert_pos == self.max_count() {
            0
        } else {
            old_count / 2
        };
        let mut new_count = old_count - dst_count;

        copy_entries(self, new_count, dst, 0, dst_count, lay);
        dst.set_count(dst_count);

        // Promote the last remaining entry as the delimiter.
        new_count -= 1;
        let delimiter = self.entry(lay, new_count);
        self.set_count(new_count);

        let parent = self.parent().expect("split node must have a parent");
        parent.insert_entry(lay, self.position(), delimiter);
        parent.init_child(lay, self.position() + 1, dst);

        if self.is_internal() {
            for j in 0..=dst_count {
                dst.init_child(lay, j, self.child_raw(lay, new_count + 1 + j));
            }
        }
    }

    /// Rotates `to_move` slots from the head of `right` into the tail of
    /// this node, through the parent's delimiter.
    pub fn rebalance_right_to_left(self, lay: &NodeLayout, right: Self, to_move: usize) {
        let parent = self.parent().expect("rebalance below the root only");
        debug_assert_eq!(right.parent(), Some(parent));
        debug_assert_eq!(self.position() + 1, right.position());
        debug_assert!(to_move >= 1 && to_move <= right.count());
        debug_assert!(self.count() + to_move <= self.max_count());

        let lc = self.count();
        let rc = right.count();

        // Delimiter rotates down into our tail, right's head replaces it.
        self.set_entry(lay, lc, parent.entry(lay, self.position()));
        copy_entries(right, 0, self, lc + 1, to_move - 1, lay);
        parent.set_entry(lay, self.position(), right.entry(lay, to_move - 1));

        unsafe {
            let base = right.entry_ptr(lay, 0);
            ptr::copy(base.add(to_move), base, rc - to_move);
        }

        if self.is_internal() {
            for j in 0..to_move {
                self.init_child(lay, lc + 1 + j, right.child_raw(lay, j));
            }
            for j in to_move..=rc {
                right.shift_child(lay, j, j - to_move);
            }
        }

        self.set_count(lc + to_move);
        right.set_count(rc - to_move);
    }

    /// Rotates `to_move` slots from the tail of this node into the head of
    /// `right`, through the parent's delimiter.
    pub fn rebalance_left_to_right(self, lay: &NodeLayout, right: Self, to_move: usize) {
        let parent = self.parent().expect("rebalance below the root only");
        debug_assert_eq!(right.parent(), Some(parent));
        debug_assert_eq!(self.position() + 1, right.position());
        debug_assert!(to_move >= 1 && to_move <= self.count());
        debug_assert!(right.count() + to_move <= right.max_count());

        let lc = self.count();
        let rc = right.count();

        unsafe {
            let base = right.entry_ptr(lay, 0);
            ptr::copy(base, base.add(to_move), rc);
        }
        if self.is_internal() {
            for j in (0..=rc).rev() {
                right.shift_child(lay, j, j + to_move);
            }
        }

        right.set_entry(lay, to_move - 1, parent.entry(lay, self.position()));
        copy_entries(self, lc - to_move + 1, right, 0, to_move - 1, lay);
        parent.set_entry(lay, self.position(), self.entry(lay, lc - to_move));

        if self.is_internal() {
            for j in 0..to_move {
                right.init_child(lay, j, self.child_raw(lay, lc - to_move + 1 + j));
            }
        }

        self.set_count(lc - to_move);
        right.set_count(rc + to_move);
    }

    /// Absorbs the parent delimiter plus all of `right` into this node's
    /// tail and drops the delimiter from the parent. The caller frees
    /// `right` afterwards.
    pub fn merge_from(self, lay: &NodeLayout, right: Self) {
        let parent = self.parent().expect("merge below the root only");
        debug_assert_eq!(right.parent(), Some(parent));
        debug_assert_eq!(self.position() + 1, right.position());

        let lc = self.count();
        let rc = right.count();
        debug_assert!(1 + lc + rc <= self.max_count());

        self.set_entry(lay, lc, parent.entry(lay, self.position()));
        copy_entries(right, 0, self, lc + 1, rc, lay);

        if self.is_internal() {
            for j in 0..=rc {
                self.init_child(lay, lc + 1 + j, right.child_raw(lay, j));
            }
        }

        self.set_count(lc + 1 + rc);
        right.set_count(0);
        parent.remove_entry(lay, self.position());
    }

    /// Child read without the count bound, for slots being moved while the
    /// source count is already decremented.
    fn child_raw(self, lay: &NodeLayout, i: usize) -> Self {
        debug_assert!(self.is_internal());
        let child = unsafe { self.child_slot(lay, i).read() };
        Self::from_header(child).expect("child slot must hold a node")
    }
}

/// Copies `n` entry slots between two distinct nodes.
fn copy_entries<K: Pod, V: Pod>(
    src: NodeRef<K, V>,
    src_i: usize,
    dst: NodeRef<K, V>,
    dst_i: usize,
    n: usize,
    lay: &NodeLayout,
) {
    if n == 0 {
        return;
    }
    debug_assert!(src != dst);
    unsafe {
        ptr::copy_nonoverlapping(src.entry_ptr(lay, src_i), dst.entry_ptr(lay, dst_i), n);
    }
}
