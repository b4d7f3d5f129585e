//! # packmap Configuration Constants
//!
//! This module centralizes all configuration constants, grouping interdependent
//! values together and documenting their relationships.
//!
//! ## Dependency Graph
//!
//! ```text
//! DEFAULT_TARGET_NODE_BYTES (256)
//!       │
//!       └─> NODE_KV_COUNT (derived per key/value type at construction)
//!             │     max(KV_COUNT_FLOOR, (target - header) / entry)
//!             │
//!             ├─> MIN_NODE_KV_COUNT = NODE_KV_COUNT / 2
//!             │
//!             └─> must stay <= MAX_NODE_KV_COUNT
//!                   The node header stores count, max_count and the child
//!                   position as u16; a capacity beyond u16 range would
//!                   silently truncate them.
//!
//! DEFAULT_ITEMS_PER_SLAB (1024)
//!       │
//!       └─> DEFAULT_MAX_SLAB_BYTES (0 = uncapped)
//!             When capped, items-per-slab is clamped so one slab never
//!             exceeds the cap (but always holds at least one item).
//! ```
//!
//! ## Critical Invariants
//!
//! These invariants are enforced by compile-time assertions:
//!
//! 1. `KV_COUNT_FLOOR >= 3` (a split promotes one entry and leaves one on
//!    each side; two-entry nodes would deadlock the biased split)
//! 2. `MAX_NODE_KV_COUNT < u16::MAX` (header field width)
//! 3. `DEFAULT_ITEMS_PER_SLAB >= 1` and `DEFAULT_INITIAL_SLABS >= 1`
//!
//! ## Usage
//!
//! Import constants from this module rather than defining them locally:
//!
//! ```ignore
//! use crate::config::{DEFAULT_TARGET_NODE_BYTES, KV_COUNT_FLOOR};
//! ```

// ============================================================================
// NODE CAPACITY CONFIGURATION
// These drive the per-type capacity derivation in btree::layout
// ============================================================================

/// Default byte budget for one tree node (header + packed entries).
///
/// 256 bytes spans four 64-byte cache lines; the linear key scan inside a
/// node touches at most that much memory, which is the whole point of the
/// fixed-budget design.
pub const DEFAULT_TARGET_NODE_BYTES: usize = 256;

/// Lower bound on entries per node, regardless of how large one entry is.
///
/// A biased split moves entries to the fresh sibling and then promotes the
/// last remaining entry into the parent; with fewer than three slots a full
/// node could be left empty by its own split.
pub const KV_COUNT_FLOOR: usize = 3;

/// Upper bound on entries per node.
///
/// `count`, `max_count` and the child `position` live in u16 header fields;
/// capacity derivation rejects a target budget that would exceed this.
pub const MAX_NODE_KV_COUNT: usize = u16::MAX as usize - 1;

// ============================================================================
// SLAB POOL CONFIGURATION
// Defaults for memory::slab; all overridable through SlabConfig
// ============================================================================

/// Default number of items carved out of one slab allocation.
pub const DEFAULT_ITEMS_PER_SLAB: usize = 1024;

/// Default cap on a single slab's byte size. Zero means uncapped.
pub const DEFAULT_MAX_SLAB_BYTES: usize = 0;

/// Number of slabs allocated eagerly when a pool is created.
pub const DEFAULT_INITIAL_SLABS: usize = 1;

const _: () = assert!(
    KV_COUNT_FLOOR >= 3,
    "KV_COUNT_FLOOR must be >= 3 or a biased split can empty a full node"
);

const _: () = assert!(
    MAX_NODE_KV_COUNT < u16::MAX as usize,
    "MAX_NODE_KV_COUNT must fit the u16 header fields"
);

const _: () = assert!(
    DEFAULT_ITEMS_PER_SLAB >= 1,
    "a slab must hold at least one item"
);

const _: () = assert!(
    DEFAULT_INITIAL_SLABS >= 1,
    "slab pools pre-allocate at least one slab"
);
