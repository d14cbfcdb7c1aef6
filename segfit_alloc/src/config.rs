//! Construction-time allocator configuration.

use crate::CHUNKSIZE;

/// Tunables for an [`AllocatorContext`](crate::AllocatorContext).
///
/// This is a library, not a service: there is no environment-variable or
/// config-file layer, only this struct passed to
/// [`AllocatorContext::with_config`](crate::AllocatorContext::with_config).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AllocatorConfig {
    /// The number of bytes requested from the `HeapSource` the first time
    /// the heap must grow past its initial bookkeeping region, and the
    /// minimum grown whenever a subsequent extension is needed. Defaults to
    /// `CHUNKSIZE` (4104 bytes), the historical tuning value.
    pub initial_chunk_size: usize,

    /// The reservation size a caller should pass to
    /// [`VecHeapSource::new`](crate::backend::VecHeapSource::new) when
    /// constructing the backend this config will be paired with. Advisory
    /// only: `AllocatorContext` itself never constructs a `HeapSource`, so
    /// nothing enforces this against the backend actually supplied to
    /// [`AllocatorContext::with_config`](crate::AllocatorContext::with_config).
    pub backing_capacity: usize,

    /// Whether to apply the two historical size-policy exceptions in
    /// `allocate` (multiples of 128, and the literal 4092) documented on
    /// [`AllocatorContext::allocate`](crate::AllocatorContext::allocate).
    /// On by default, preserving bit-for-bit parity with the original
    /// benchmark tuning; turn off for a reimplementation used against a
    /// different workload, where the exceptions would otherwise silently
    /// waste space on every 128-byte-multiple allocation.
    pub apply_legacy_size_policy: bool,
}

impl Default for AllocatorConfig {
    fn default() -> Self {
        AllocatorConfig {
            initial_chunk_size: CHUNKSIZE,
            backing_capacity: 32 * 1024 * 1024,
            apply_legacy_size_policy: true,
        }
    }
}
