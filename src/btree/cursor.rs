//! # Bidirectional Position Cursor
//!
//! A cursor is a `(node, position)` pair naming an entry or an inter-entry
//! gap. `position` legally equals `count` ("between this node and the next
//! in traversal order") and transiently dips to −1 while stepping
//! backwards, which is why it is a signed integer.
//!
//! Movement has a fast path — stay inside the current leaf — and a slow
//! path that ascends through parent positions until a sibling subtree
//! exists, then descends to its boundary leaf. The end-of-tree cursor
//! parks at `(rightmost, rightmost.count)`; advancing past it stays put.
//!
//! Cursors embed raw node addresses, so the engine never lets one survive
//! a mutation that could free its node: public iteration borrows the map
//! for the cursor's whole life, and the engine's own cursors live inside a
//! single operation.

use crate::error::MapError;
use crate::types::Pod;

use super::layout::{Entry, NodeLayout};
use super::node::NodeRef;

pub(crate) struct Cursor<K, V> {
    pub node: Option<NodeRef<K, V>>,
    pub pos: i32,
}

impl<K, V> Clone for Cursor<K, V> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<K, V> Copy for Cursor<K, V> {}

impl<K, V> PartialEq for Cursor<K, V> {
    fn eq(&self, other: &Self) -> bool {
        self.node == other.node && self.pos == other.pos
    }
}

impl<K, V> Eq for Cursor<K, V> {}

impl<K, V> std::fmt::Debug for Cursor<K, V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Cursor")
            .field("node", &self.node)
            .field("pos", &self.pos)
            .finish()
    }
}

impl<K: Pod, V: Pod> Cursor<K, V> {
    pub fn new(node: NodeRef<K, V>, pos: i32) -> Self {
        Self {
            node: Some(node),
            pos,
        }
    }

    /// The empty-cursor marker: no node, used both for the empty tree and
    /// for "no such position" results.
    pub fn none() -> Self {
        Self { node: None, pos: 0 }
    }

    /// True when the cursor names an actual entry.
    pub fn is_valid(&self) -> bool {
        match self.node {
            Some(node) => self.pos >= 0 && (self.pos as usize) < node.count(),
            None => false,
        }
    }

    pub fn entry_ptr(&self, lay: &NodeLayout) -> *mut Entry<K, V> {
        debug_assert!(self.is_valid());
        self.node
            .expect("entry access through an empty cursor")
            .entry_ptr(lay, self.pos as usize)
    }

    pub fn key(&self, lay: &NodeLayout) -> K {
        debug_assert!(self.is_valid());
        self.node
            .expect("key access through an empty cursor")
            .key(lay, self.pos as usize)
    }

    /// Overwrites the value at the cursor's entry. Fails with
    /// [`MapError::InvalidCursor`] when the cursor does not name an entry.
    pub fn set_value(&self, lay: &NodeLayout, value: V) -> Result<(), MapError> {
        if !self.is_valid() {
            return Err(MapError::InvalidCursor);
        }
        let entry = self.entry_ptr(lay);
        // SAFETY: validity was just checked; only the value field changes.
        unsafe { std::ptr::addr_of_mut!((*entry).value).write(value) };
        Ok(())
    }

    /// Steps to the next entry in key order; parks at the end position of
    /// the rightmost leaf when no successor exists (advancing the parked
    /// cursor again is a no-op).
    pub fn increment(&mut self, lay: &NodeLayout) {
        let Some(node) = self.node else { return };
        if node.is_leaf() {
            if (self.pos as usize) < node.count() {
                self.pos += 1;
                if (self.pos as usize) < node.count() {
                    return;
                }
            }
        }
        self.increment_slow(lay);
    }

    fn increment_slow(&mut self, lay: &NodeLayout) {
        let mut node = self.node.expect("increment on an empty cursor");
        if node.is_leaf() {
            debug_assert!(self.pos as usize >= node.count());
            let save = *self;
            while self.pos as usize == node.count() && !node.is_root() {
                debug_assert_eq!(node.parent().map(|p| p.child(lay, node.position())), Some(node));
                self.pos = node.position() as i32;
                node = node.parent().expect("non-root node must have a parent");
            }
            if self.pos as usize == node.count() {
                *self = save;
            } else {
                self.node = Some(node);
            }
        } else {
            debug_assert!((self.pos as usize) < node.count());
            node = node.child(lay, self.pos as usize + 1);
            while node.is_internal() {
                node = node.child(lay, 0);
            }
            self.node = Some(node);
            self.pos = 0;
        }
    }

    /// Steps to the previous entry in key order; before the first entry
    /// the position transiently rests at −1.
    pub fn decrement(&mut self, lay: &NodeLayout) {
        let Some(node) = self.node else { return };
        if node.is_leaf() {
            self.pos -= 1;
            if self.pos >= 0 {
                return;
            }
        }
        self.decrement_slow(lay);
    }

    fn decrement_slow(&mut self, lay: &NodeLayout) {
        let mut node = self.node.expect("decrement on an empty cursor");
        if node.is_leaf() {
            debug_assert!(self.pos < 0);
            let save = *self;
            while self.pos < 0 && !node.is_root() {
                self.pos = node.position() as i32 - 1;
                node = node.parent().expect("non-root node must have a parent");
            }
            if self.pos < 0 {
                *self = save;
            } else {
                self.node = Some(node);
            }
        } else {
            debug_assert!(self.pos >= 0);
            node = node.child(lay, self.pos as usize);
            while node.is_internal() {
                node = node.child(lay, node.count());
            }
            self.node = Some(node);
            self.pos = node.count() as i32 - 1;
        }
    }

    /// Hoists a cursor resting at `position == count` onto the nearest
    /// ancestor slot holding the successor entry; becomes the empty marker
    /// when no greater entry exists. Positions already naming an entry are
    /// untouched.
    pub fn normalize_last(&mut self) {
        let Some(mut node) = self.node else { return };
        while self.pos as usize == node.count() {
            match node.parent() {
                Some(parent) => {
                    self.pos = node.position() as i32;
                    node = parent;
                }
                None => {
                    *self = Self::none();
                    return;
                }
            }
        }
        self.node = Some(node);
    }
}
