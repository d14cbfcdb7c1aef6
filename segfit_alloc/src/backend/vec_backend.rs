//! A portable, OS-independent backing implementation with a maximum size
//! fixed at construction time.
//!
//! Grounded in the teacher's `imp_static_array` backend: a single scratch
//! buffer is reserved once, and `grow` bumps an offset within it. The buffer
//! is never reallocated or resized after construction, which is what lets the
//! allocator hand out addresses into it that stay valid forever.

use core::ptr::NonNull;

use super::HeapSource;
use crate::error::AllocError;

/// The reservation size used when a `VecHeapSource` is constructed via
/// `Default` rather than [`VecHeapSource::new`] — matches
/// [`AllocatorConfig::default`](crate::config::AllocatorConfig::default)'s
/// `backing_capacity`.
const DEFAULT_CAPACITY: usize = 32 * 1024 * 1024;

/// The default `wee_alloc`-style static-array heap source.
pub struct VecHeapSource {
    scratch: Box<[u8]>,
    used: usize,
}

impl VecHeapSource {
    /// Reserve a scratch heap of `capacity` bytes. No bytes of it are handed
    /// out until `grow` is called.
    pub fn new(capacity: usize) -> Self {
        VecHeapSource {
            scratch: vec![0u8; capacity].into_boxed_slice(),
            used: 0,
        }
    }

    /// The maximum number of bytes this heap source can ever grow to.
    pub fn capacity(&self) -> usize {
        self.scratch.len()
    }
}

impl Default for VecHeapSource {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

impl HeapSource for VecHeapSource {
    fn grow(&mut self, n: usize) -> Result<NonNull<u8>, AllocError> {
        extra_assert!(n > 0);

        let end = self
            .used
            .checked_add(n)
            .ok_or(AllocError::HeapExhausted { requested: n })?;
        if end > self.scratch.len() {
            return Err(AllocError::HeapExhausted { requested: n });
        }

        let ptr = unsafe { self.scratch.as_mut_ptr().add(self.used) };
        self.used = end;

        // SAFETY: `scratch` is a heap allocation that lives as long as `self`
        // and is never resized, so this pointer stays valid for the lifetime
        // of the `VecHeapSource`.
        Ok(unsafe { NonNull::new_unchecked(ptr) })
    }

    fn bounds(&self) -> Option<(usize, usize)> {
        if self.used == 0 {
            None
        } else {
            let base = self.scratch.as_ptr() as usize;
            Some((base, base + self.used))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn grows_contiguously() {
        let mut src = VecHeapSource::new(64);
        let a = src.grow(16).unwrap();
        let b = src.grow(16).unwrap();
        unsafe {
            assert_eq!(a.as_ptr().add(16), b.as_ptr());
        }
    }

    #[test]
    fn exhausts_at_capacity() {
        let mut src = VecHeapSource::new(16);
        assert!(src.grow(16).is_ok());
        assert!(src.grow(1).is_err());
    }
}
