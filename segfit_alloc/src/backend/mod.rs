//! The `HeapSource` contract: a `sbrk`-like, one-way heap growth primitive.
//!
//! This is the "raw heap-extension primitive" the top-level spec treats as an
//! external collaborator. Two concrete backends are provided: a portable,
//! fixed-capacity backing array (the default, and the only one available on
//! targets without `sbrk`), and a Unix backend that wraps the real `sbrk`
//! syscall.

use core::ptr::NonNull;

use crate::const_init::ConstInit;
use crate::error::AllocError;

mod vec_backend;
pub use vec_backend::VecHeapSource;

cfg_if::cfg_if! {
    if #[cfg(unix)] {
        mod unix_sbrk;
        pub use unix_sbrk::UnixSbrkHeapSource;
    }
}

/// A source of monotonically growing heap memory.
///
/// Implementations must return contiguous regions across successive `grow`
/// calls: the address returned by call `k+1` must equal the address returned
/// by call `k` plus the `n` passed to call `k`. Once handed out, a region's
/// address must never change (no implementation may move previously returned
/// memory), since the allocator keeps offsets relative to the very first
/// address ever returned.
pub trait HeapSource {
    /// Grow the heap by `n` bytes, returning a pointer to the start of the
    /// newly added region. `n` must be greater than zero.
    fn grow(&mut self, n: usize) -> Result<NonNull<u8>, AllocError>;

    /// The `[low, high)` byte address range that is currently valid heap
    /// memory, for use by the consistency checker. Returns `None` if `grow`
    /// has never been called.
    fn bounds(&self) -> Option<(usize, usize)>;
}

/// Defers constructing a `HeapSource` until the first call to `grow`.
///
/// This exists so the process-wide default allocator instance can be built
/// with a `const` initializer (required for a `static`) even though
/// `VecHeapSource::new` itself allocates and so cannot run in const context.
/// The wrapped source is built from `H::default()` on first use.
pub(crate) struct LazyHeapSource<H> {
    inner: Option<H>,
}

impl<H> ConstInit for LazyHeapSource<H> {
    const INIT: Self = LazyHeapSource { inner: None };
}

impl<H: HeapSource + Default> HeapSource for LazyHeapSource<H> {
    fn grow(&mut self, n: usize) -> Result<NonNull<u8>, AllocError> {
        self.inner.get_or_insert_with(H::default).grow(n)
    }

    fn bounds(&self) -> Option<(usize, usize)> {
        self.inner.as_ref().and_then(HeapSource::bounds)
    }
}

cfg_if::cfg_if! {
    if #[cfg(unix)] {
        /// The `HeapSource` backing the process-wide default allocator
        /// instance. `sbrk` needs no upfront reservation, so the real
        /// backend is used directly rather than through `LazyHeapSource`.
        pub(crate) type DefaultHeapSource = UnixSbrkHeapSource;
    } else {
        /// The `HeapSource` backing the process-wide default allocator
        /// instance on targets without `sbrk`.
        pub(crate) type DefaultHeapSource = LazyHeapSource<VecHeapSource>;
    }
}
