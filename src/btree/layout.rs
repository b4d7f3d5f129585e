//! # Node Layout Geometry
//!
//! A node is one raw allocation interpreted as:
//!
//! ```text
//! +------------------+----------------------+------------------------+
//! | NodeHeader       | [Entry; max_count]   | [child ptr; kv + 1]    |
//! | kind, position,  | packed key/value     | internal nodes only    |
//! | count, max_count,| pairs, first `count` |                        |
//! | parent           | slots initialized    |                        |
//! +------------------+----------------------+------------------------+
//! ```
//!
//! All offsets and byte sizes are composed with [`std::alloc::Layout`] at
//! map construction, never hand-rolled, so padding and alignment follow the
//! entry type. The computed geometry is immutable for the life of the tree.
//!
//! Node capacity derives from the configured byte budget:
//!
//! ```text
//! NODE_KV_COUNT     = max(KV_COUNT_FLOOR, (target - header) / entry)
//! MIN_NODE_KV_COUNT = NODE_KV_COUNT / 2
//! ```
//!
//! The kind tag plus `max_count` in the header fully determine a node's
//! allocation layout, so a free can never be issued at the wrong size: the
//! tree derives the layout from the header it is about to release.

use std::alloc::Layout;

use eyre::{ensure, Result};

use crate::config::{KV_COUNT_FLOOR, MAX_NODE_KV_COUNT};

/// Discriminates the two node layouts. Stored as one byte in the header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub(crate) enum NodeKind {
    Leaf = 0,
    Internal = 1,
}

/// Per-node metadata at offset zero of every node allocation.
///
/// `parent` is null for the root; root detection is that null check and
/// nothing else. `position` is the node's index in its parent's child
/// array (0 for the root).
#[repr(C)]
#[derive(Debug)]
pub(crate) struct NodeHeader {
    pub kind: NodeKind,
    pub position: u16,
    pub count: u16,
    pub max_count: u16,
    pub parent: *mut NodeHeader,
}

/// One packed key/value pair.
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub(crate) struct Entry<K, V> {
    pub key: K,
    pub value: V,
}

/// Computed geometry for every node of one tree: capacities, field offsets
/// and allocation layouts, derived once from the byte budget and the entry
/// type at construction.
#[derive(Debug, Clone, Copy)]
pub(crate) struct NodeLayout {
    /// Entries per full node (`NODE_KV_COUNT`).
    pub kv_count: usize,
    /// Occupancy target under deletion (`NODE_KV_COUNT / 2`).
    pub min_kv_count: usize,
    /// Byte size of one entry slot (array stride).
    pub entry_size: usize,
    /// Offset of the entry array from the node base.
    pub entries_offset: usize,
    /// Offset of the child-pointer array (internal nodes only).
    pub children_offset: usize,
    /// Alignment shared by every node allocation of this tree.
    pub align: usize,
    /// Allocation size of a full leaf.
    pub leaf_size: usize,
    /// Allocation size of an internal node.
    pub internal_size: usize,
}

impl NodeLayout {
    /// Derives the geometry for `(K, V)` entries under `target_node_bytes`.
    ///
    /// Fails when the resulting capacity would not fit the u16 header
    /// fields or the byte sizes would overflow.
    pub fn compute<K, V>(target_node_bytes: usize) -> Result<Self> {
        let header = Layout::new::<NodeHeader>();
        let entry = Layout::new::<Entry<K, V>>();
        let child = Layout::new::<*mut NodeHeader>();

        ensure!(target_node_bytes > 0, "target node bytes must be non-zero");

        let entry_size = entry.size().max(1);
        let kv_count = KV_COUNT_FLOOR
            .max(target_node_bytes.saturating_sub(header.size()) / entry_size);
        ensure!(
            kv_count <= MAX_NODE_KV_COUNT,
            "node capacity {} exceeds the u16 header fields (target {} bytes, {}-byte entries)",
            kv_count,
            target_node_bytes,
            entry_size
        );

        let entries = Layout::array::<Entry<K, V>>(kv_count)
            .map_err(|e| eyre::eyre!("entry array layout overflow: {e}"))?;
        let children = Layout::array::<*mut NodeHeader>(kv_count + 1)
            .map_err(|e| eyre::eyre!("child array layout overflow: {e}"))?;

        let (leaf, entries_offset) = header
            .extend(entries)
            .map_err(|e| eyre::eyre!("leaf layout overflow: {e}"))?;
        let (internal, children_offset) = leaf
            .extend(children)
            .map_err(|e| eyre::eyre!("internal layout overflow: {e}"))?;

        let align = internal.align().max(child.align());

        Ok(Self {
            kv_count,
            min_kv_count: kv_count / 2,
            entry_size: entry.size(),
            entries_offset,
            children_offset,
            align,
            leaf_size: round_up(leaf.size(), align),
            internal_size: round_up(internal.size(), align),
        })
    }

    /// Allocation layout for a leaf holding up to `max_count` entries.
    /// Small roots pass `max_count < kv_count`; everything else passes
    /// `kv_count` and gets [`NodeLayout::leaf_size`].
    pub fn leaf_layout(&self, max_count: usize) -> Layout {
        debug_assert!(max_count >= 1 && max_count <= self.kv_count);
        let size = if max_count == self.kv_count {
            self.leaf_size
        } else {
            round_up(
                self.entries_offset + max_count * self.entry_size.max(1),
                self.align,
            )
        };
        // INVARIANT: size/align were validated in compute.
        Layout::from_size_align(size, self.align).expect("node layout validated at construction")
    }

    /// Allocation layout for an internal node.
    pub fn internal_layout(&self) -> Layout {
        Layout::from_size_align(self.internal_size, self.align)
            .expect("node layout validated at construction")
    }

    /// Allocation layout of an existing node, derived from its header
    /// fields. This is the only way nodes are freed.
    pub fn layout_of(&self, kind: NodeKind, max_count: usize) -> Layout {
        match kind {
            NodeKind::Leaf => self.leaf_layout(max_count),
            NodeKind::Internal => self.internal_layout(),
        }
    }
}

fn round_up(size: usize, align: usize) -> usize {
    (size + align - 1) & !(align - 1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DEFAULT_TARGET_NODE_BYTES;

    #[test]
    fn capacity_follows_the_byte_budget() {
        // 16-byte header, 8-byte entries, 256-byte budget: (256 - 16) / 8.
        let lay = NodeLayout::compute::<u32, u32>(DEFAULT_TARGET_NODE_BYTES).unwrap();
        let header = std::mem::size_of::<NodeHeader>();
        let expected = (DEFAULT_TARGET_NODE_BYTES - header) / 8;
        assert_eq!(lay.kv_count, expected);
        assert_eq!(lay.min_kv_count, expected / 2);
    }

    #[test]
    fn capacity_never_drops_below_floor() {
        // Entries far larger than the budget still get three slots.
        let lay = NodeLayout::compute::<[u8; 512], [u8; 512]>(256).unwrap();
        assert_eq!(lay.kv_count, 3);
        assert_eq!(lay.min_kv_count, 1);
    }

    #[test]
    fn internal_layout_extends_leaf_layout() {
        let lay = NodeLayout::compute::<u64, u64>(256).unwrap();
        assert!(lay.internal_size > lay.leaf_size);
        assert!(lay.children_offset >= lay.entries_offset + lay.kv_count * lay.entry_size);
        assert_eq!(lay.internal_size % lay.align, 0);
        assert_eq!(lay.leaf_size % lay.align, 0);
    }

    #[test]
    fn small_root_layouts_shrink_with_capacity() {
        let lay = NodeLayout::compute::<u64, u64>(256).unwrap();
        let one = lay.leaf_layout(1);
        let two = lay.leaf_layout(2);
        let full = lay.leaf_layout(lay.kv_count);
        assert!(one.size() <= two.size());
        assert!(two.size() < full.size());
        assert_eq!(full.size(), lay.leaf_size);
    }

    #[test]
    fn layout_of_agrees_with_allocation_layouts() {
        let lay = NodeLayout::compute::<u32, u64>(256).unwrap();
        assert_eq!(lay.layout_of(NodeKind::Leaf, 4), lay.leaf_layout(4));
        assert_eq!(
            lay.layout_of(NodeKind::Internal, lay.kv_count),
            lay.internal_layout()
        );
    }

    #[test]
    fn oversized_budget_is_rejected() {
        // A byte budget implying more than u16::MAX entries must error,
        // not truncate the header fields.
        let result = NodeLayout::compute::<u8, u8>(1 << 22);
        assert!(result.is_err());
    }
}
