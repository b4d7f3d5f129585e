//! # Entry Type Contract
//!
//! Keys and values are treated as fixed-width, trivially copyable byte
//! blobs: the tree moves them with raw copies, stores them in unmanaged
//! node memory, and never runs drop glue for them. [`Pod`] is the marker
//! that makes that contract checkable instead of conventional.
//!
//! The bound rides on zerocopy's derivable traits, so plain integers and
//! fixed-size arrays qualify out of the box, and user structs opt in with
//! `#[derive(FromBytes, IntoBytes, Immutable)]` on a `#[repr(C)]` layout.
//! Types holding owned heap references (`String`, `Vec`, `Box`) cannot
//! implement the zerocopy traits and are rejected at compile time — which
//! is exactly the class of type the raw node storage cannot carry.

use zerocopy::{FromBytes, Immutable, IntoBytes};

/// Marker for types the tree may store: fixed width, no interior pointers,
/// valid for any bit pattern, copyable by `memcpy`.
///
/// Blanket-implemented; never implement it by hand.
pub trait Pod: FromBytes + IntoBytes + Immutable + Copy + 'static {}

impl<T: FromBytes + IntoBytes + Immutable + Copy + 'static> Pod for T {}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_pod<T: Pod>() {}

    #[test]
    fn primitive_and_array_types_are_pod() {
        assert_pod::<u8>();
        assert_pod::<i64>();
        assert_pod::<[u8; 24]>();
        assert_pod::<[u64; 4]>();
    }
}
