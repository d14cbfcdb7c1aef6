//! Error types for the allocator's internal plumbing.
//!
//! Heap exhaustion is the only variant returned from a public entry point's
//! plumbing — and even that is collapsed into a `None` before it reaches
//! `allocate`/`reallocate`'s caller, per the spec. `InvariantViolation` is
//! never returned; the consistency checker constructs one purely to get a
//! formatted message out of `thiserror`'s `Display` impl before panicking
//! with it.

use thiserror::Error;

/// Failure modes for growing the backing heap, or (internally) a detected
/// invariant violation.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AllocError {
    /// The heap source could not satisfy a growth request of the given size,
    /// in bytes.
    #[error("heap source could not grow by {requested} bytes")]
    HeapExhausted { requested: usize },

    /// The consistency checker found a block or free-list invariant broken.
    /// Always fatal; see [`crate::AllocatorContext::check_heap`].
    #[error("heap invariant violated: {reason}")]
    InvariantViolation { reason: String },
}
