//! # Memory Management
//!
//! This module provides the raw allocation layer the tree engine consumes.
//! The engine allocates nodes in a handful of discrete byte sizes (the
//! small-root growth steps, full leaves, internal nodes) and frees each one
//! at the size it was allocated with, which is exactly the shape a sized
//! free-list amortizes well.
//!
//! ## Architecture
//!
//! ```text
//! +-----------------------------------------------------------+
//! |                      PackedMap engine                     |
//! |   allocate(Layout) / deallocate(ptr, Layout)              |
//! +-----------------------------+-----------------------------+
//!                               │ RawAllocator trait
//!          +--------------------+--------------------+
//!          │                    │                    │
//! +--------+-------+  +---------+--------+  +--------+--------+
//! | HeapAllocator  |  | SlabAllocator    |  | SharedAllocator |
//! | global heap,   |  | one SlabPool per |  | Arc + Mutex over|
//! | no pooling     |  | distinct size    |  | a SlabAllocator |
//! +----------------+  +------------------+  +-----------------+
//! ```
//!
//! ## Enforcement Model
//!
//! Allocation failure is fatal: the engine has no partial-failure story for
//! a half-split node, so exhaustion aborts through
//! `std::alloc::handle_alloc_error` rather than unwinding mid-mutation.
//!
//! ## Ownership
//!
//! An allocator is owned exclusively by one map for the map's lifetime.
//! Sharing one slab arena across maps requires external synchronization,
//! which [`SharedAllocator`] provides as a cloneable locked handle.

mod raw;
mod slab;
mod shared;

pub use raw::{HeapAllocator, RawAllocator};
pub use shared::SharedAllocator;
pub use slab::{SlabAllocator, SlabConfig, SlabPool, SlabStats};
