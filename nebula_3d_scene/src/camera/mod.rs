//! Camera module — frustum input for visibility testing.
//!
//! Passive data containers: the scene index does NOT store or manage
//! cameras. The caller extracts a `SimdFrustum` from its view-projection
//! matrix (or builds one by other means) and passes it to the visibility
//! pass each frame.

mod frustum;

pub use frustum::{ClipStatus, SimdFrustum};
