//! # Configuration Module
//!
//! This module centralizes all configuration constants for packmap. Constants
//! are grouped by their functional area and interdependencies are documented
//! and enforced through compile-time assertions.
//!
//! ## Why Centralization?
//!
//! The node capacity math, the slab pool defaults, and the header field widths
//! all constrain each other. Scattering them across the tree and allocator
//! modules invites mismatch bugs (a node capacity that overflows the header's
//! `u16` count, a slab smaller than one item). Co-locating the constants and
//! asserting the relationships at compile time prevents such issues.
//!
//! ## Module Organization
//!
//! - [`constants`]: All numeric configuration values with dependency
//!   documentation

pub mod constants;
pub use constants::*;
