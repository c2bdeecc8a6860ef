//! Math utilities for the spatial index.
//!
//! Vector and matrix math comes from `glam`; this module holds the
//! integer bit arithmetic the tree addressing is built on.

pub mod morton;
