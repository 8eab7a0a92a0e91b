//! Handle lifecycle for the Tether protocol.
//!
//! [`IndexAllocator`] mints the integer handles the caller uses to
//! address objects across the protocol boundary. [`Tracker`] is the
//! executor-side map from those handles to backend objects, partitioned
//! by kind for bulk iteration.

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

pub mod allocator;
pub mod motion;
pub mod tracker;

pub use allocator::IndexAllocator;
pub use motion::MotionState;
pub use tracker::{Removal, TrackedObject, Tracker};
