//! Internal utilities for the scene index.

mod sparse_array;

pub use sparse_array::SparseArray;
