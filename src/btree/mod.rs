//! # B-Tree Engine
//!
//! This module implements the core ordered-map engine: a B-tree whose nodes
//! are raw byte regions of a fixed byte budget, allocated through the
//! [`crate::memory`] layer. The design trades a small per-operation branch
//! count for cache locality — one node spans a handful of cache lines and
//! keys inside it are scanned linearly, not binary-searched.
//!
//! ## Node Shapes
//!
//! Three storage shapes exist, all sharing one header:
//!
//! - **Small leaf root**: capacity grows 1, 2, 4, … up to `NODE_KV_COUNT`
//!   as the first entries arrive, so a tiny map stays tiny.
//! - **Leaf**: header + `NODE_KV_COUNT` packed entries.
//! - **Internal**: leaf layout + `NODE_KV_COUNT + 1` child pointers.
//!
//! Unlike a B+tree, entries live in internal nodes too; internal keys are
//! real entries, not copied separators.
//!
//! ```text
//!                [ internal: E3 E7 ]
//!                /       |        \
//!      [E0 E1 E2]   [E4 E5 E6]   [E8 E9]
//! ```
//!
//! ## Root Handling
//!
//! The root is an ordinary node: its header's parent pointer is null and
//! the tree handle carries the aggregate state (`len`, `height`, cached
//! leftmost/rightmost leaves). Height growth allocates a fresh internal
//! root and parents the old root under it; height shrink promotes the sole
//! remaining child. No node is ever special-cased by its byte layout.
//!
//! ## Module Map
//!
//! - [`layout`]: header/entry structs and the per-type capacity geometry
//! - [`node`]: raw node accessors and the local mutations
//!   (insert/remove/split/rebalance/merge)
//! - [`cursor`]: the bidirectional `(node, position)` cursor
//! - [`tree`]: the engine driving descent, splits and merges

pub(crate) mod cursor;
pub(crate) mod layout;
pub(crate) mod node;
pub(crate) mod tree;
