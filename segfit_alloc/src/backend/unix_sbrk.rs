//! A Unix heap source backed by the real `sbrk` system call.
//!
//! Grounded in the teacher's `imp_unix` backend, which used `mmap` to hand
//! out fresh pages; this substitutes `sbrk` because it is the literal
//! "sbrk-like one-way growth call" the spec names as the heap-extension
//! primitive.

use core::ptr::NonNull;

use super::HeapSource;
use crate::const_init::ConstInit;
use crate::error::AllocError;

/// A heap source that grows the process break with `sbrk(2)`.
///
/// # Safety / caveats
///
/// `sbrk` manipulates a single, process-wide break pointer. Mixing this
/// backend with any other code in the same process that also calls `sbrk` (or
/// `brk`, or a `malloc` implementation that uses it) is unsound, since the two
/// would race to extend the same break and neither would know about the
/// other's allocations. This is fine for the allocator's own test suite,
/// which uses [`VecHeapSource`](super::VecHeapSource) instead, but callers
/// linking this backend into a larger program should audit for that
/// conflict.
pub struct UnixSbrkHeapSource {
    base: Option<usize>,
    high: usize,
}

impl UnixSbrkHeapSource {
    /// A heap source that has not yet called `sbrk`. The first [`grow`]
    /// call establishes `base` at the process break as it stands then.
    ///
    /// [`grow`]: HeapSource::grow
    pub fn new() -> Self {
        UnixSbrkHeapSource {
            base: None,
            high: 0,
        }
    }
}

impl Default for UnixSbrkHeapSource {
    fn default() -> Self {
        Self::new()
    }
}

impl ConstInit for UnixSbrkHeapSource {
    const INIT: Self = UnixSbrkHeapSource {
        base: None,
        high: 0,
    };
}

impl HeapSource for UnixSbrkHeapSource {
    fn grow(&mut self, n: usize) -> Result<NonNull<u8>, AllocError> {
        extra_assert!(n > 0);

        let addr = unsafe { libc::sbrk(n as libc::intptr_t) };
        if addr == (-1isize as *mut libc::c_void) {
            log::warn!("sbrk({}) failed", n);
            return Err(AllocError::HeapExhausted { requested: n });
        }

        let addr = addr as *mut u8;
        let addr_usize = addr as usize;
        if self.base.is_none() {
            self.base = Some(addr_usize);
        }
        self.high = addr_usize + n;

        // SAFETY: a successful `sbrk` never returns null.
        Ok(unsafe { NonNull::new_unchecked(addr) })
    }

    fn bounds(&self) -> Option<(usize, usize)> {
        self.base.map(|base| (base, self.high))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn grows_and_reports_bounds() {
        let mut src = UnixSbrkHeapSource::new();
        assert!(src.bounds().is_none());
        let p = src.grow(256).unwrap();
        let (low, high) = src.bounds().unwrap();
        assert_eq!(low, p.as_ptr() as usize);
        assert_eq!(high, low + 256);
    }
}
