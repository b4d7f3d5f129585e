//! # Tree Engine
//!
//! This module drives the node-local mutations into a full ordered map:
//! descent, duplicate detection, rebalance-or-split on insert, merge-or-
//! rebalance on delete, root growth and shrink, and the aggregate state
//! (`len`, `height`, cached spine leaves) that lives in the handle rather
//! than in any node.
//!
//! ## Insert Algorithm
//!
//! ```text
//! 1. Single descent from the root, linear-scanning each node (lt only)
//! 2. At the leaf, hoist a trailing position onto its ancestor slot
//!    (normalize_last) and test equality there — duplicates are rejected
//! 3. With spare capacity: shift-insert in place
//! 4. Full small-leaf root: reallocate at twice the capacity and retry
//! 5. Full regular node: move entries to a sibling with spare room
//!    (biased by the insertion position), else make room in the parent
//!    recursively, else grow a new root, then biased-split
//! ```
//!
//! ## Delete Algorithm
//!
//! ```text
//! 1. Locate the entry (descent + normalize + equality)
//! 2. An internal-node hit is overwritten with its leaf predecessor and
//!    the delete proceeds in that leaf
//! 3. Walk ancestors while underfull: merge with a sibling when the
//!    combined entries fit, else rotate entries from the richer sibling —
//!    skipped when deleting at a node's very front or back, so pop-front
//!    and pop-back workloads do not thrash entries between siblings
//! 4. An emptied root collapses: the tree shrinks a level or empties
//! ```
//!
//! ## Occupancy
//!
//! Splits are biased by insertion position (sequential fills pack nodes
//! tightly instead of leaving half-empty siblings) and the front/back
//! deletion optimization tolerates transiently underfull nodes, so the
//! `MIN_NODE_KV_COUNT` target is an equilibrium, not a hard floor. The
//! hard invariants — ordering, back-pointers, uniform leaf depth, at least
//! one entry per non-root node — are enforced by [`Tree::validate`].

use eyre::{ensure, Result};
use smallvec::SmallVec;

use crate::memory::RawAllocator;
use crate::order::Comparator;
use crate::types::Pod;

use super::cursor::Cursor;
use super::layout::{Entry, NodeKind, NodeLayout};
use super::node::NodeRef;

pub(crate) struct Tree<K: Pod, V: Pod, C, A: RawAllocator> {
    root: Option<NodeRef<K, V>>,
    /// Left-spine leaf; begin() starts here.
    leftmost: Option<NodeRef<K, V>>,
    /// Right-spine leaf; end() parks here.
    rightmost: Option<NodeRef<K, V>>,
    len: usize,
    height: usize,
    node_count: usize,
    bytes_used: usize,
    layout: NodeLayout,
    cmp: C,
    alloc: A,
}

// SAFETY: the tree exclusively owns every node it points at; moving or
// sharing the handle moves that ownership with it. The raw pointers inside
// never alias another tree's nodes.
unsafe impl<K, V, C, A> Send for Tree<K, V, C, A>
where
    K: Pod + Send,
    V: Pod + Send,
    C: Send,
    A: RawAllocator + Send,
{
}
unsafe impl<K, V, C, A> Sync for Tree<K, V, C, A>
where
    K: Pod + Sync,
    V: Pod + Sync,
    C: Sync,
    A: RawAllocator + Sync,
{
}

/// Operations that need no key order: lifecycle, cursors to the spine,
/// bulk teardown, introspection.
impl<K: Pod, V: Pod, C, A: RawAllocator> Tree<K, V, C, A> {
    pub fn new(layout: NodeLayout, cmp: C, alloc: A) -> Self {
        Self {
            root: None,
            leftmost: None,
            rightmost: None,
            len: 0,
            height: 0,
            node_count: 0,
            bytes_used: 0,
            layout,
            cmp,
            alloc,
        }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn node_count(&self) -> usize {
        self.node_count
    }

    pub fn bytes_used(&self) -> usize {
        self.bytes_used
    }

    pub fn layout(&self) -> &NodeLayout {
        &self.layout
    }

    pub fn allocator(&self) -> &A {
        &self.alloc
    }

    // ------------------------------------------------------------------
    // Node lifecycle
    // ------------------------------------------------------------------

    fn new_leaf(&mut self, max_count: usize) -> NodeRef<K, V> {
        let layout = self.layout.leaf_layout(max_count);
        let region = self.alloc.allocate(layout);
        self.node_count += 1;
        self.bytes_used += layout.size();
        NodeRef::init(region, NodeKind::Leaf, max_count)
    }

    fn new_internal(&mut self) -> NodeRef<K, V> {
        let layout = self.layout.internal_layout();
        let region = self.alloc.allocate(layout);
        self.node_count += 1;
        self.bytes_used += layout.size();
        NodeRef::init(region, NodeKind::Internal, self.layout.kv_count)
    }

    /// Frees a node at the layout its header describes.
    fn free_node(&mut self, node: NodeRef<K, V>) {
        let layout = self.layout.layout_of(node.kind(), node.max_count());
        self.node_count -= 1;
        self.bytes_used -= layout.size();
        // SAFETY: node came from new_leaf/new_internal with this derived
        // layout and is being released exactly once.
        unsafe { self.alloc.deallocate(node.as_raw(), layout) }
    }

    // ------------------------------------------------------------------
    // Spine cursors
    // ------------------------------------------------------------------

    pub fn begin(&self) -> Cursor<K, V> {
        match self.leftmost {
            Some(node) => Cursor::new(node, 0),
            None => Cursor::none(),
        }
    }

    /// The parked one-past-last position: `(rightmost, rightmost.count)`.
    pub fn end(&self) -> Cursor<K, V> {
        match self.rightmost {
            Some(node) => Cursor::new(node, node.count() as i32),
            None => Cursor::none(),
        }
    }

    // ------------------------------------------------------------------
    // Bulk teardown
    // ------------------------------------------------------------------

    /// Frees every node and resets the tree to the empty state. The
    /// allocator stays usable for subsequent inserts.
    pub fn clear(&mut self) {
        let lay = self.layout;
        let Some(root) = self.root.take() else {
            return;
        };
        let mut stack: SmallVec<[NodeRef<K, V>; 32]> = SmallVec::new();
        stack.push(root);
        while let Some(node) = stack.pop() {
            if node.is_internal() {
                for i in 0..=node.count() {
                    stack.push(node.child(&lay, i));
                }
            }
            self.free_node(node);
        }
        self.leftmost = None;
        self.rightmost = None;
        self.len = 0;
        self.height = 0;
        debug_assert_eq!(self.node_count, 0);
        debug_assert_eq!(self.bytes_used, 0);
    }
}

/// Operations driven by the key order.
impl<K: Pod, V: Pod, C: Comparator<K>, A: RawAllocator> Tree<K, V, C, A> {
    pub fn comparator(&self) -> &C {
        &self.cmp
    }

    /// Descends to the leaf slot of the first entry not less than `key`.
    fn descend_lower(&self, key: &K) -> Cursor<K, V> {
        let lay = &self.layout;
        let Some(mut node) = self.root else {
            return Cursor::none();
        };
        loop {
            let pos = node.linear_search(lay, &self.cmp, key);
            if node.is_leaf() {
                return Cursor::new(node, pos as i32);
            }
            node = node.child(lay, pos);
        }
    }

    /// Descends to the leaf slot of the first entry greater than `key`.
    fn descend_upper(&self, key: &K) -> Cursor<K, V> {
        let lay = &self.layout;
        let Some(mut node) = self.root else {
            return Cursor::none();
        };
        loop {
            let pos = node.upper_search(lay, &self.cmp, key);
            if node.is_leaf() {
                return Cursor::new(node, pos as i32);
            }
            node = node.child(lay, pos);
        }
    }

    /// Cursor at the first entry with key `>= key`, or the empty marker.
    pub fn lower_bound(&self, key: &K) -> Cursor<K, V> {
        let mut cur = self.descend_lower(key);
        cur.normalize_last();
        cur
    }

    /// Cursor at the first entry with key `> key`, or the empty marker.
    pub fn upper_bound(&self, key: &K) -> Cursor<K, V> {
        let mut cur = self.descend_upper(key);
        cur.normalize_last();
        cur
    }

    /// Cursor at the entry holding `key`, if present.
    pub fn find(&self, key: &K) -> Option<Cursor<K, V>> {
        let cur = self.lower_bound(key);
        match cur.node {
            Some(_) if self.cmp.eq(key, &cur.key(&self.layout)) => Some(cur),
            _ => None,
        }
    }

    // ------------------------------------------------------------------
    // Insert
    // ------------------------------------------------------------------

    /// Inserts the entry unless `key` is already present. Returns whether
    /// the tree changed.
    pub fn insert_unique(&mut self, key: K, value: V) -> bool {
        if self.root.is_none() {
            self.init_first_root(Entry { key, value });
            return true;
        }
        let iter = self.descend_lower(&key);
        let mut last = iter;
        last.normalize_last();
        if last.node.is_some() && self.cmp.eq(&key, &last.key(&self.layout)) {
            return false;
        }
        self.internal_emplace(iter, Entry { key, value });
        true
    }

    /// Inserts or overwrites. Returns true when a new entry was inserted,
    /// false when an existing value was replaced.
    pub fn upsert(&mut self, key: K, value: V) -> bool {
        if self.root.is_none() {
            self.init_first_root(Entry { key, value });
            return true;
        }
        let iter = self.descend_lower(&key);
        let mut last = iter;
        last.normalize_last();
        if last.node.is_some() && self.cmp.eq(&key, &last.key(&self.layout)) {
            last.set_value(&self.layout, value)
                .expect("normalized cursor names an entry");
            return false;
        }
        self.internal_emplace(iter, Entry { key, value });
        true
    }

    fn init_first_root(&mut self, entry: Entry<K, V>) {
        let root = self.new_leaf(1);
        root.insert_entry(&self.layout, 0, entry);
        self.root = Some(root);
        self.leftmost = Some(root);
        self.rightmost = Some(root);
        self.height = 1;
        self.len = 1;
    }

    fn internal_emplace(&mut self, mut iter: Cursor<K, V>, entry: Entry<K, V>) {
        let lay = self.layout;
        // An equality-check path can leave the cursor on an internal node;
        // its insertion slot is the successor position of the previous
        // (leaf) entry.
        if let Some(node) = iter.node {
            if node.is_internal() {
                iter.decrement(&lay);
                iter.pos += 1;
            }
        }
        let mut node = iter.node.expect("emplace cursor must point at a node");

        if node.count() == node.max_count() {
            if node.max_count() < lay.kv_count {
                // Full small-leaf root: grow the root allocation instead
                // of splitting a nearly-empty tree.
                debug_assert!(node.is_root() && node.is_leaf());
                let grown = self.new_leaf((2 * node.max_count()).min(lay.kv_count));
                for i in 0..node.count() {
                    grown.set_entry(&lay, i, node.entry(&lay, i));
                }
                grown.set_count(node.count());
                self.root = Some(grown);
                self.leftmost = Some(grown);
                self.rightmost = Some(grown);
                self.free_node(node);
                node = grown;
                iter.node = Some(grown);
            } else {
                self.rebalance_or_split(&mut iter);
                node = iter.node.expect("split relocates the cursor");
            }
        }

        node.insert_entry(&lay, iter.pos as usize, entry);
        self.len += 1;
    }

    /// Makes room for an insertion at `iter` in a full node: first by
    /// shifting entries to a sibling with spare capacity, then by
    /// recursively making room in the parent and splitting. The cursor is
    /// relocated onto whichever node ends up holding the insertion slot.
    fn rebalance_or_split(&mut self, iter: &mut Cursor<K, V>) {
        let lay = self.layout;
        let mut node = iter.node.expect("rebalance cursor must point at a node");
        let mut insert_pos = iter.pos;
        debug_assert_eq!(node.count(), node.max_count());
        debug_assert_eq!(node.max_count(), lay.kv_count);

        if let Some(parent) = node.parent() {
            if node.position() > 0 {
                let left = parent.child(&lay, node.position() - 1);
                if left.count() < lay.kv_count {
                    // Bias: inserting at this node's very end keeps the
                    // tail loose by draining as much as possible left.
                    let bias = if (insert_pos as usize) < lay.kv_count { 1 } else { 0 };
                    let to_move = ((lay.kv_count - left.count()) / (1 + bias)).max(1);
                    if insert_pos >= to_move as i32 || left.count() + to_move < lay.kv_count {
                        left.rebalance_right_to_left(&lay, node, to_move);
                        insert_pos -= to_move as i32;
                        if insert_pos < 0 {
                            insert_pos += left.count() as i32 + 1;
                            node = left;
                        }
                        debug_assert!(node.count() < node.max_count());
                        iter.node = Some(node);
                        iter.pos = insert_pos;
                        return;
                    }
                }
            }
            if node.position() < parent.count() {
                let right = parent.child(&lay, node.position() + 1);
                if right.count() < lay.kv_count {
                    let bias = if insert_pos > 0 { 1 } else { 0 };
                    let to_move = ((lay.kv_count - right.count()) / (1 + bias)).max(1);
                    if insert_pos as usize <= node.count() - to_move
                        || right.count() + to_move < lay.kv_count
                    {
                        node.rebalance_left_to_right(&lay, right, to_move);
                        if insert_pos as usize > node.count() {
                            insert_pos -= node.count() as i32 + 1;
                            node = right;
                        }
                        debug_assert!(node.count() < node.max_count());
                        iter.node = Some(node);
                        iter.pos = insert_pos;
                        return;
                    }
                }
            }
            // Neither sibling can take entries; splitting will push a
            // delimiter up, so make room in the parent first.
            debug_assert_eq!(parent.max_count(), lay.kv_count);
            if parent.count() == lay.kv_count {
                let mut parent_iter = Cursor::new(parent, node.position() as i32);
                self.rebalance_or_split(&mut parent_iter);
            }
        } else {
            // The root itself is full: grow the tree a level.
            let new_root = self.new_internal();
            new_root.init_child(&lay, 0, node);
            self.root = Some(new_root);
            self.height += 1;
        }

        let split_node = if node.is_leaf() {
            let sibling = self.new_leaf(lay.kv_count);
            node.split(&lay, insert_pos as usize, sibling);
            if self.rightmost == Some(node) {
                self.rightmost = Some(sibling);
            }
            sibling
        } else {
            let sibling = self.new_internal();
            node.split(&lay, insert_pos as usize, sibling);
            sibling
        };

        if insert_pos as usize > node.count() {
            insert_pos -= node.count() as i32 + 1;
            node = split_node;
        }
        iter.node = Some(node);
        iter.pos = insert_pos;
    }

    // ------------------------------------------------------------------
    // Delete
    // ------------------------------------------------------------------

    /// Removes `key` if present. Returns whether the tree changed.
    pub fn erase_key(&mut self, key: &K) -> bool {
        match self.find(key) {
            Some(iter) => {
                self.erase_at(iter);
                true
            }
            None => false,
        }
    }

    /// Removes the entry at `iter` and returns the cursor to its
    /// successor (the parked end position when none remains).
    pub fn erase_at(&mut self, mut iter: Cursor<K, V>) -> Cursor<K, V> {
        let lay = self.layout;
        debug_assert!(iter.is_valid());
        let node = iter.node.expect("erase cursor must point at a node");

        let internal_delete = node.is_internal();
        if internal_delete {
            // The slot to vacate sits on an internal node; its predecessor
            // is always a leaf entry. Pull the predecessor up and delete
            // from the leaf instead.
            let internal_iter = iter;
            iter.decrement(&lay);
            let leaf = iter.node.expect("internal entry must have a predecessor");
            debug_assert!(leaf.is_leaf());
            let pred = leaf.entry(&lay, iter.pos as usize);
            internal_iter
                .node
                .expect("internal cursor")
                .set_entry(&lay, internal_iter.pos as usize, pred);
        }

        iter.node
            .expect("delete target")
            .remove_entry(&lay, iter.pos as usize);
        self.len -= 1;

        let mut res = self.rebalance_after_delete(iter);
        if internal_delete {
            res.increment(&lay);
        }
        res
    }

    fn rebalance_after_delete(&mut self, mut iter: Cursor<K, V>) -> Cursor<K, V> {
        let lay = self.layout;
        let mut res = iter;
        loop {
            let node = iter.node.expect("rebalance cursor must point at a node");
            if Some(node) == self.root {
                self.try_shrink();
                if self.root.is_none() {
                    return Cursor::none();
                }
                break;
            }
            if node.count() >= lay.min_kv_count {
                break;
            }
            let merged = self.try_merge_or_rebalance(&mut iter);
            // The leaf-level pass may move the deletion point between
            // siblings; keep the result cursor tracking it.
            if iter.node.expect("cursor tracks surviving node").is_leaf() {
                res = iter;
            }
            if !merged {
                break;
            }
            let node = iter.node.expect("merge leaves the surviving node");
            iter.pos = node.position() as i32;
            iter.node = node.parent();
        }

        // Return the successor of the removed entry: a cursor resting at a
        // node's end advances through the parked-position machinery.
        let node = res.node.expect("result cursor must point at a node");
        if res.pos == node.count() as i32 {
            res.pos = node.count() as i32 - 1;
            res.increment(&lay);
        }
        res
    }

    /// Restores occupancy around an underfull node. Returns true when a
    /// merge happened (the caller then ascends).
    fn try_merge_or_rebalance(&mut self, iter: &mut Cursor<K, V>) -> bool {
        let lay = self.layout;
        let node = iter.node.expect("merge cursor must point at a node");
        let parent = node.parent().expect("root is never merged");

        if node.position() > 0 {
            let left = parent.child(&lay, node.position() - 1);
            if 1 + left.count() + node.count() <= lay.kv_count {
                iter.pos += 1 + left.count() as i32;
                self.merge_nodes(left, node);
                iter.node = Some(left);
                return true;
            }
        }
        if node.position() < parent.count() {
            let right = parent.child(&lay, node.position() + 1);
            if 1 + node.count() + right.count() <= lay.kv_count {
                self.merge_nodes(node, right);
                return true;
            }
            // Skip the rotation when the delete was at this node's front:
            // pop-front workloads would otherwise shuttle entries back and
            // forth between siblings on every call.
            if right.count() > lay.min_kv_count && (node.count() == 0 || iter.pos > 0) {
                let to_move = ((right.count() - node.count()) / 2).min(right.count() - 1);
                node.rebalance_right_to_left(&lay, right, to_move);
                return false;
            }
        }
        if node.position() > 0 {
            let left = parent.child(&lay, node.position() - 1);
            // Same skip for deletes at the back (pop-back workloads).
            if left.count() > lay.min_kv_count
                && (node.count() == 0 || (iter.pos as usize) < node.count())
            {
                let to_move = ((left.count() - node.count()) / 2).min(left.count() - 1);
                left.rebalance_left_to_right(&lay, node, to_move);
                iter.pos += to_move as i32;
                return false;
            }
        }
        false
    }

    fn merge_nodes(&mut self, left: NodeRef<K, V>, right: NodeRef<K, V>) {
        left.merge_from(&self.layout, right);
        if right.is_leaf() && self.rightmost == Some(right) {
            self.rightmost = Some(left);
        }
        self.free_node(right);
    }

    /// Collapses a root that has been drained to zero entries: an empty
    /// leaf root empties the tree, an empty internal root promotes its
    /// sole child and the tree loses a level.
    fn try_shrink(&mut self) {
        let root = self.root.expect("shrink requires a root");
        if root.count() > 0 {
            return;
        }
        if root.is_leaf() {
            debug_assert_eq!(self.len, 0);
            self.free_node(root);
            self.root = None;
            self.leftmost = None;
            self.rightmost = None;
            self.height = 0;
        } else {
            let child = root.child(&self.layout, 0);
            child.make_root();
            self.root = Some(child);
            self.height -= 1;
            self.free_node(root);
        }
    }

    // ------------------------------------------------------------------
    // Invariant checking
    // ------------------------------------------------------------------

    /// Walks the whole tree and verifies its structural invariants:
    /// strictly ascending keys, exact parent/position back-links, uniform
    /// leaf depth, non-empty non-root nodes, and aggregate counters that
    /// match the walk. Intended for tests and fuzzing; cost is O(n).
    pub fn validate(&self) -> Result<()> {
        let Some(root) = self.root else {
            ensure!(self.len == 0, "empty tree with len {}", self.len);
            ensure!(self.node_count == 0, "empty tree holding nodes");
            ensure!(self.bytes_used == 0, "empty tree holding bytes");
            ensure!(self.height == 0, "empty tree with height {}", self.height);
            ensure!(
                self.leftmost.is_none() && self.rightmost.is_none(),
                "empty tree with cached spine leaves"
            );
            return Ok(());
        };

        ensure!(root.is_root(), "root node has a parent link");
        ensure!(root.position() == 0, "root node has nonzero position");

        let mut total = 0usize;
        let mut nodes = 0usize;
        let mut leaf_depth = None;
        self.validate_node(root, 1, None, None, &mut leaf_depth, &mut total, &mut nodes)?;

        ensure!(
            total == self.len,
            "entry walk found {} entries, len is {}",
            total,
            self.len
        );
        ensure!(
            nodes == self.node_count,
            "node walk found {} nodes, node_count is {}",
            nodes,
            self.node_count
        );
        ensure!(
            leaf_depth == Some(self.height),
            "leaf depth {:?} disagrees with height {}",
            leaf_depth,
            self.height
        );

        let lay = &self.layout;
        let mut left = root;
        while left.is_internal() {
            left = left.child(lay, 0);
        }
        ensure!(
            Some(left) == self.leftmost,
            "cached leftmost is not the left-spine leaf"
        );
        let mut right = root;
        while right.is_internal() {
            right = right.child(lay, right.count());
        }
        ensure!(
            Some(right) == self.rightmost,
            "cached rightmost is not the right-spine leaf"
        );
        Ok(())
    }

    #[allow(clippy::too_many_arguments)]
    fn validate_node(
        &self,
        node: NodeRef<K, V>,
        depth: usize,
        lower: Option<K>,
        upper: Option<K>,
        leaf_depth: &mut Option<usize>,
        total: &mut usize,
        nodes: &mut usize,
    ) -> Result<()> {
        let lay = &self.layout;
        let count = node.count();

        ensure!(count >= 1, "non-empty tree with a drained node");
        ensure!(
            count <= node.max_count(),
            "node count {} exceeds capacity {}",
            count,
            node.max_count()
        );
        ensure!(
            node.max_count() <= lay.kv_count,
            "node capacity beyond the tree's kv count"
        );
        if node.is_internal() || !node.is_root() {
            ensure!(
                node.max_count() == lay.kv_count,
                "undersized node outside the small-root position"
            );
        }

        for i in 0..count {
            let k = node.key(lay, i);
            if i > 0 {
                let prev = node.key(lay, i - 1);
                ensure!(self.cmp.lt(&prev, &k), "keys not strictly ascending");
            }
            if let Some(lo) = &lower {
                ensure!(self.cmp.lt(lo, &k), "key at or below the subtree bound");
            }
            if let Some(hi) = &upper {
                ensure!(self.cmp.lt(&k, hi), "key at or above the subtree bound");
            }
        }
        *total += count;
        *nodes += 1;

        if node.is_leaf() {
            match leaf_depth {
                Some(d) => ensure!(*d == depth, "leaves at unequal depths"),
                None => *leaf_depth = Some(depth),
            }
            return Ok(());
        }

        for i in 0..=count {
            let child = node.child(lay, i);
            ensure!(
                child.parent() == Some(node),
                "child parent back-link is wrong"
            );
            ensure!(child.position() == i, "child position back-link is wrong");
            let lo = if i == 0 { lower } else { Some(node.key(lay, i - 1)) };
            let hi = if i == count { upper } else { Some(node.key(lay, i)) };
            self.validate_node(child, depth + 1, lo, hi, leaf_depth, total, nodes)?;
        }
        Ok(())
    }
}

impl<K: Pod, V: Pod, C, A: RawAllocator> Drop for Tree<K, V, C, A> {
    fn drop(&mut self) {
        self.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::HeapAllocator;
    use crate::order::NaturalOrder;

    type TestTree = Tree<i64, i64, NaturalOrder, HeapAllocator>;

    fn tree() -> TestTree {
        let layout = NodeLayout::compute::<i64, i64>(256).unwrap();
        Tree::new(layout, NaturalOrder, HeapAllocator)
    }

    fn collect(t: &TestTree) -> Vec<(i64, i64)> {
        let lay = *t.layout();
        let mut out = Vec::new();
        let mut cur = t.begin();
        let end = t.end();
        while cur != end && cur.node.is_some() {
            let e = unsafe { cur.entry_ptr(&lay).read() };
            out.push((e.key, e.value));
            cur.increment(&lay);
        }
        out
    }

    /// Deterministic permutation of 0..n without a rand dependency.
    fn permuted(n: i64) -> Vec<i64> {
        let mut keys: Vec<i64> = (0..n).collect();
        let mut state = 0x9E37_79B9_7F4A_7C15u64;
        for i in (1..keys.len()).rev() {
            state = state.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
            let j = (state >> 33) as usize % (i + 1);
            keys.swap(i, j);
        }
        keys
    }

    #[test]
    fn tree_insert_ascending_stays_sorted() {
        let mut t = tree();
        for k in 0..200 {
            assert!(t.insert_unique(k, k * 10));
        }
        assert_eq!(t.len(), 200);
        t.validate().unwrap();

        let entries = collect(&t);
        assert_eq!(entries.len(), 200);
        for (i, (k, v)) in entries.iter().enumerate() {
            assert_eq!(*k, i as i64);
            assert_eq!(*v, i as i64 * 10);
        }
    }

    #[test]
    fn tree_insert_descending_stays_sorted() {
        let mut t = tree();
        for k in (0..200).rev() {
            assert!(t.insert_unique(k, -k));
        }
        assert_eq!(t.len(), 200);
        t.validate().unwrap();

        let keys: Vec<i64> = collect(&t).iter().map(|(k, _)| *k).collect();
        assert_eq!(keys, (0..200).collect::<Vec<_>>());
    }

    #[test]
    fn tree_insert_shuffled_stays_sorted() {
        let mut t = tree();
        for &k in &permuted(1000) {
            assert!(t.insert_unique(k, k + 7));
        }
        assert_eq!(t.len(), 1000);
        t.validate().unwrap();

        let entries = collect(&t);
        for (i, (k, v)) in entries.iter().enumerate() {
            assert_eq!(*k, i as i64);
            assert_eq!(*v, i as i64 + 7);
        }
    }

    #[test]
    fn tree_rejects_duplicate_keys() {
        let mut t = tree();
        assert!(t.insert_unique(42, 1));
        assert!(!t.insert_unique(42, 2));
        assert_eq!(t.len(), 1);

        let cur = t.find(&42).unwrap();
        let e = unsafe { cur.entry_ptr(t.layout()).read() };
        assert_eq!(e.value, 1, "rejected insert must not overwrite");
    }

    #[test]
    fn tree_rejects_duplicates_resting_on_internal_nodes() {
        let mut t = tree();
        for k in 0..500 {
            t.insert_unique(k, k);
        }
        assert!(t.height() > 1, "test needs internal nodes");
        // Every key must be rejected, wherever its slot ended up.
        for k in 0..500 {
            assert!(!t.insert_unique(k, 0), "key {} accepted twice", k);
        }
        assert_eq!(t.len(), 500);
        t.validate().unwrap();
    }

    #[test]
    fn tree_upsert_overwrites_in_place() {
        let mut t = tree();
        assert!(t.upsert(5, 100));
        assert!(!t.upsert(5, 200));
        assert_eq!(t.len(), 1);

        let cur = t.find(&5).unwrap();
        let e = unsafe { cur.entry_ptr(t.layout()).read() };
        assert_eq!(e.value, 200);
    }

    #[test]
    fn tree_small_root_grows_in_steps() {
        let mut t = tree();
        let lay = *t.layout();

        t.insert_unique(0, 0);
        assert_eq!(t.node_count(), 1);
        assert_eq!(t.bytes_used(), lay.leaf_layout(1).size());

        t.insert_unique(1, 0);
        assert_eq!(t.bytes_used(), lay.leaf_layout(2).size());

        t.insert_unique(2, 0);
        assert_eq!(t.bytes_used(), lay.leaf_layout(4).size());

        for k in 3..lay.kv_count as i64 {
            t.insert_unique(k, 0);
        }
        // Root is at full capacity now but still a single node.
        assert_eq!(t.node_count(), 1);
        assert_eq!(t.height(), 1);
        t.validate().unwrap();
    }

    #[test]
    fn tree_splits_grow_height() {
        let mut t = tree();
        let kv = t.layout().kv_count as i64;
        for k in 0..=kv {
            t.insert_unique(k, 0);
        }
        assert_eq!(t.height(), 2, "overflowing the root leaf adds a level");
        assert_eq!(t.node_count(), 3);
        t.validate().unwrap();
    }

    #[test]
    fn tree_erase_leaf_and_internal_entries() {
        let mut t = tree();
        for &k in &permuted(500) {
            t.insert_unique(k, k);
        }
        for k in (0..500).step_by(2) {
            assert!(t.erase_key(&k), "key {} missing", k);
            assert!(!t.erase_key(&k), "key {} erased twice", k);
        }
        assert_eq!(t.len(), 250);
        t.validate().unwrap();

        let keys: Vec<i64> = collect(&t).iter().map(|(k, _)| *k).collect();
        assert_eq!(keys, (0..500).filter(|k| k % 2 == 1).collect::<Vec<_>>());
    }

    #[test]
    fn tree_erase_everything_resets_to_empty() {
        let mut t = tree();
        for &k in &permuted(300) {
            t.insert_unique(k, k);
        }
        for &k in &permuted(300) {
            assert!(t.erase_key(&k));
        }
        assert_eq!(t.len(), 0);
        assert_eq!(t.node_count(), 0);
        assert_eq!(t.bytes_used(), 0);
        assert_eq!(t.height(), 0);
        t.validate().unwrap();

        // The tree must be reusable after draining.
        assert!(t.insert_unique(1, 1));
        t.validate().unwrap();
    }

    #[test]
    fn tree_add_then_remove_restores_prior_state() {
        let mut t = tree();
        for k in 0..100 {
            t.insert_unique(k, k);
        }
        let before = collect(&t);
        let bytes = t.bytes_used();

        assert!(t.insert_unique(1000, 0));
        assert!(t.erase_key(&1000));

        assert_eq!(collect(&t), before);
        assert_eq!(t.bytes_used(), bytes);
        t.validate().unwrap();
    }

    #[test]
    fn tree_pop_front_and_pop_back_workloads() {
        let mut t = tree();
        for k in 0..400 {
            t.insert_unique(k, k);
        }
        // Pop front half.
        for k in 0..200 {
            let cur = t.begin();
            let e = unsafe { cur.entry_ptr(t.layout()).read() };
            assert_eq!(e.key, k);
            t.erase_at(cur);
        }
        t.validate().unwrap();
        // Pop back the rest.
        for k in (200..400).rev() {
            let lay = *t.layout();
            let mut cur = t.end();
            cur.decrement(&lay);
            let e = unsafe { cur.entry_ptr(&lay).read() };
            assert_eq!(e.key, k);
            t.erase_at(cur);
        }
        assert_eq!(t.len(), 0);
        t.validate().unwrap();
    }

    #[test]
    fn tree_erase_returns_successor_cursor() {
        let mut t = tree();
        for k in [10, 20, 30, 40] {
            t.insert_unique(k, 0);
        }
        let cur = t.find(&20).unwrap();
        let next = t.erase_at(cur);
        assert!(next.is_valid());
        assert_eq!(next.key(t.layout()), 30);

        let cur = t.find(&40).unwrap();
        let next = t.erase_at(cur);
        assert_eq!(next, t.end(), "erasing the last entry yields end");
    }

    #[test]
    fn tree_set_value_through_cursor() {
        let mut t = tree();
        for k in 0..20 {
            t.insert_unique(k, 0);
        }
        let cur = t.find(&7).unwrap();
        cur.set_value(t.layout(), 700).unwrap();
        let e = unsafe { cur.entry_ptr(t.layout()).read() };
        assert_eq!(e.value, 700);

        let none: Cursor<i64, i64> = Cursor::none();
        assert_eq!(
            none.set_value(t.layout(), 1),
            Err(crate::error::MapError::InvalidCursor)
        );
    }

    #[test]
    fn tree_cursor_walks_both_directions() {
        let mut t = tree();
        for &k in &permuted(300) {
            t.insert_unique(k, k);
        }
        let lay = *t.layout();

        let begin = t.begin();
        let mut cur = begin;
        for _ in 0..250 {
            cur.increment(&lay);
        }
        assert_eq!(cur.key(&lay), 250);
        for _ in 0..250 {
            cur.decrement(&lay);
        }
        assert_eq!(cur, begin, "n forward then n back returns to begin");
    }

    #[test]
    fn tree_end_cursor_parks_and_stays() {
        let mut t = tree();
        for k in 0..50 {
            t.insert_unique(k, 0);
        }
        let lay = *t.layout();
        let mut cur = t.begin();
        for _ in 0..50 {
            cur.increment(&lay);
        }
        assert_eq!(cur, t.end());
        cur.increment(&lay);
        assert_eq!(cur, t.end(), "advancing past end stays parked");
    }

    #[test]
    fn tree_bounds_against_linear_scan() {
        let mut t = tree();
        for k in (0..400).step_by(4) {
            t.insert_unique(k, 0);
        }
        let lay = *t.layout();
        let keys: Vec<i64> = (0..400).step_by(4).collect();

        for probe in -2..402 {
            let lb = t.lower_bound(&probe);
            let expect_lb = keys.iter().find(|&&k| k >= probe);
            match expect_lb {
                Some(&k) => assert_eq!(lb.key(&lay), k, "lower_bound({})", probe),
                None => assert!(lb.node.is_none(), "lower_bound({}) past the end", probe),
            }

            let ub = t.upper_bound(&probe);
            let expect_ub = keys.iter().find(|&&k| k > probe);
            match expect_ub {
                Some(&k) => assert_eq!(ub.key(&lay), k, "upper_bound({})", probe),
                None => assert!(ub.node.is_none(), "upper_bound({}) past the end", probe),
            }
        }
    }

    #[test]
    fn tree_clear_releases_every_node() {
        let mut t = tree();
        for &k in &permuted(2000) {
            t.insert_unique(k, k);
        }
        assert!(t.node_count() > 1);
        t.clear();
        assert_eq!(t.len(), 0);
        assert_eq!(t.node_count(), 0);
        assert_eq!(t.bytes_used(), 0);
        t.validate().unwrap();
    }

    #[test]
    fn tree_interleaved_against_model() {
        let mut t = tree();
        let mut model = std::collections::BTreeMap::new();
        let keys = permuted(600);

        for (i, &k) in keys.iter().enumerate() {
            if i % 3 == 2 {
                let victim = keys[i / 2];
                assert_eq!(t.erase_key(&victim), model.remove(&victim).is_some());
            } else {
                assert_eq!(t.insert_unique(k, k), model.insert(k, k).is_none());
            }
        }
        t.validate().unwrap();
        assert_eq!(t.len(), model.len());

        let entries = collect(&t);
        let expected: Vec<(i64, i64)> = model.iter().map(|(k, v)| (*k, *v)).collect();
        assert_eq!(entries, expected);
    }
}
