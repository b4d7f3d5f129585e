//! # Map Error Kinds
//!
//! Typed failure kinds for the public map surface. Every non-fatal failure
//! surfaces synchronously at the call site, before any mutation becomes
//! visible to subsequent operations; there is no internal retry and no
//! partial-failure recovery.
//!
//! The kinds travel inside an [`eyre::Report`], so call sites keep the
//! ergonomic `?` flow while callers that need to branch on the kind can
//! recover it:
//!
//! ```ignore
//! match map.add(k, v) {
//!     Ok(()) => {}
//!     Err(report) => match report.downcast_ref::<MapError>() {
//!         Some(MapError::DuplicateKey) => { /* upsert instead */ }
//!         _ => return Err(report),
//!     },
//! }
//! ```
//!
//! Allocation failure is deliberately absent: the allocator contract treats
//! it as fatal and routes it through `std::alloc::handle_alloc_error`
//! instead of a recoverable error.

/// Failure kinds raised by [`crate::PackedMap`] operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MapError {
    /// `add` was called with a key that is already present.
    DuplicateKey,
    /// An indexed read (`get`) found no entry for the key.
    KeyNotFound,
    /// `range` was called with `end < start`.
    InvalidRange,
    /// A value write was attempted through a cursor that does not point at
    /// an entry.
    InvalidCursor,
}

impl std::fmt::Display for MapError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MapError::DuplicateKey => write!(f, "key already present in map"),
            MapError::KeyNotFound => write!(f, "key not found in map"),
            MapError::InvalidRange => write!(f, "range end lies before range start"),
            MapError::InvalidCursor => write!(f, "cursor does not point at an entry"),
        }
    }
}

impl std::error::Error for MapError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_kinds_survive_report_roundtrip() {
        let report = eyre::Report::new(MapError::DuplicateKey);
        assert_eq!(
            report.downcast_ref::<MapError>(),
            Some(&MapError::DuplicateKey)
        );
    }

    #[test]
    fn error_display_is_stable() {
        assert_eq!(MapError::KeyNotFound.to_string(), "key not found in map");
    }
}
