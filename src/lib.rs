//! # packmap - Cache-Packed Ordered Map
//!
//! packmap is an in-memory, ordered key→value map implemented as a B-tree
//! of fixed-byte-budget nodes in raw, unmanaged storage. It targets
//! workloads where a hash map costs too much memory per entry and a
//! red-black tree wastes cache lines per node: the design trades a small
//! per-operation branch count for dramatically better cache locality and
//! roughly half the memory overhead of a pointer-heavy tree, while keeping
//! ordered traversal and range queries.
//!
//! ## Quick Start
//!
//! ```ignore
//! use packmap::PackedMap;
//!
//! let mut map: PackedMap<u64, u64> = PackedMap::new();
//! map.add(1, 100)?;
//! map.set(1, 200);                    // upsert
//! assert_eq!(map.get(&1)?, &200);
//! assert!(map.remove(&1));
//!
//! for (k, v) in map.range(&10, &20)? { /* ordered */ }
//! ```
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────┐
//! │     Public API (PackedMap, Iter)    │
//! ├─────────────────────────────────────┤
//! │  Tree Engine (descent, split/merge, │
//! │  cursor, range iteration)           │
//! ├─────────────────────────────────────┤
//! │  Node Layout (header + packed       │
//! │  entries + child pointers)          │
//! ├─────────────────────────────────────┤
//! │  Raw Allocation (heap or slab       │
//! │  pools with sized free lists)       │
//! └─────────────────────────────────────┘
//! ```
//!
//! ## Design Points
//!
//! - **Fixed node budget**: every node is one raw allocation of a
//!   configurable byte budget (default 256 bytes). Keys inside a node are
//!   scanned linearly — at this size the scan beats binary search's
//!   branch mispredictions.
//! - **Entries everywhere**: internal nodes store real entries, not
//!   copied separators, so memory overhead stays near one child pointer
//!   plus header amortized per node.
//! - **Biased splits**: sequential fills pack nodes tightly instead of
//!   leaving half-empty split siblings.
//! - **POD entries**: keys and values are fixed-width, trivially copyable
//!   blobs, enforced through zerocopy-derived bounds ([`Pod`]).
//! - **Injected order**: the comparator is a zero-size type parameter
//!   ([`Comparator`]), monomorphized into the hot paths.
//! - **Pooled nodes**: the optional [`SlabAllocator`] amortizes node
//!   churn through per-size slab pools with sized free lists;
//!   [`SharedAllocator`] shares one arena across maps behind a lock.
//!
//! ## Module Overview
//!
//! - `btree`: node layout, local mutations, cursor, tree engine
//! - [`memory`]: raw allocator contract, slab pools, shared arena
//! - [`config`]: centralized constants and their invariants
//! - [`order`]: comparator injection
//! - [`error`]: typed failure kinds
//!
//! ## Scope
//!
//! The map is strictly single-threaded: no operation blocks, suspends or
//! retries, and every public call completes synchronously. The handle is
//! `Send`/`Sync` where its parameters allow, so external synchronization
//! composes the usual way. Persistence, concurrent mutation and duplicate
//! keys are out of scope.

mod btree;
mod map;

pub mod config;
pub mod error;
pub mod memory;
pub mod order;
pub mod types;

pub use error::MapError;
pub use map::{Iter, PackedMap};
pub use memory::{
    HeapAllocator, RawAllocator, SharedAllocator, SlabAllocator, SlabConfig, SlabPool, SlabStats,
};
pub use order::{Comparator, NaturalOrder, OrderingFn, Reverse};
pub use types::Pod;
