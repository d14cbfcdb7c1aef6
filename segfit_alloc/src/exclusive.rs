//! A single-owner interior-mutability cell for the process-wide default
//! allocator instance.
//!
//! Grounded in the teacher's `imp::Exclusive` (a `spin::Mutex` plus a
//! reentrance guard on the static-array backend, a `pthread_mutex_t` on the
//! unix backend). This crate's single-threaded, non-reentrant contract means
//! an actual lock buys nothing, so this keeps only the reentrance guard and
//! replaces the mutex with a bare `UnsafeCell`.

use crate::const_init::ConstInit;
use core::cell::UnsafeCell;

#[cfg(feature = "extra_assertions")]
use core::cell::Cell;

pub(crate) struct Exclusive<T> {
    inner: UnsafeCell<T>,

    #[cfg(feature = "extra_assertions")]
    in_use: Cell<bool>,
}

// SAFETY: sound only because every public entry point that reaches
// `with_exclusive_access` is documented as requiring a single-threaded,
// non-reentrant caller (see the crate's concurrency notes). This is not a
// multi-threading facility.
unsafe impl<T> Sync for Exclusive<T> {}

impl<T: ConstInit> ConstInit for Exclusive<T> {
    const INIT: Self = Exclusive {
        inner: UnsafeCell::new(T::INIT),

        #[cfg(feature = "extra_assertions")]
        in_use: Cell::new(false),
    };
}

impl<T> Exclusive<T> {
    /// Get exclusive, mutable access to the inner value.
    ///
    /// # Safety
    ///
    /// It is the caller's responsibility to ensure that `f` does not
    /// re-enter this method for this `Exclusive` instance (for example from
    /// a signal handler, or a `Drop` impl triggered during `f`). Doing so
    /// produces undetected mutable aliasing, which is UB; `extra_assertions`
    /// catches it at runtime instead of leaving it silent.
    #[inline]
    pub(crate) unsafe fn with_exclusive_access<F, U>(&self, f: F) -> U
    where
        for<'x> F: FnOnce(&'x mut T) -> U,
    {
        #[cfg(feature = "extra_assertions")]
        {
            assert!(!self.in_use.get(), "Exclusive<T> is not re-entrant");
            self.in_use.set(true);
        }

        let result = f(&mut *self.inner.get());

        #[cfg(feature = "extra_assertions")]
        self.in_use.set(false);

        result
    }
}
