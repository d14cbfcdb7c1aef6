/*!

## About

`segfit_alloc`: a segregated-fit, boundary-tag dynamic storage allocator over
a single, monotonically growable heap.

`segfit_alloc` manages one contiguous heap region and exposes the classic
allocate / free / reallocate interface for a single-threaded workload. Free
blocks are indexed by size class into `BIN_COUNT` doubly linked lists whose
links live inside the free blocks' own payloads — no metadata arena beyond
the heap itself is used. Adjacent free blocks are always coalesced via
boundary tags (a header/footer pair on every block), and oversized free
blocks are split on placement when the remainder would still be a legal
block.

- [Using `segfit_alloc` as the Global Allocator](#using-segfit_alloc-as-the-global-allocator)
- [`cargo` Features](#cargo-features)
- [Implementation Notes and Constraints](#implementation-notes-and-constraints)
- [License](#license)

## Using `segfit_alloc` as the Global Allocator

```
extern crate segfit_alloc;

#[global_allocator]
static ALLOC: segfit_alloc::SegfitAlloc = segfit_alloc::SegfitAlloc::INIT;
# fn main() {}
```

Or, for direct control over construction (choice of `HeapSource`,
`AllocatorConfig`, and ownership of the heap's lifetime), construct an
[`AllocatorContext`] directly instead of using the process-wide default
instance.

## `cargo` Features

- **extra_assertions**: Enable extra, expensive integrity assertions on every
  free-list mutation (reentrance checks, free-list membership recomputation).
  Incurs a large runtime overhead; useful when debugging a use-after-free or
  `segfit_alloc` itself. The always-on [`AllocatorContext::check_heap`]
  diagnostic is unaffected by this feature — it does its own, separately
  invoked, full heap walk.

## Implementation Notes and Constraints

- `segfit_alloc` imposes two words of overhead on each allocated block (the
  header and footer) and, while a block is free, a transient two-word cost
  for the free-list links stored in what would otherwise be payload.

- `segfit_alloc` never returns heap memory to the operating system or the
  `HeapSource`; the heap grows monotonically.

- Placement is first-fit within a block's natural size class, ascending to
  larger classes only when the current one is exhausted. Freed blocks are
  pushed to the front of their class's list (LIFO), keeping recently freed
  memory hot.

Finally, here is a diagram giving an overview of the implementation:

```text
+------------------------------------------------------------------------------+
| HeapSource (VecHeapSource / UnixSbrkHeapSource)                              |
+------------------------------------------------------------------------------+
                   |
                   | one-way growth
                   V
+------------------------------------------------------------------------------+
| Heap: [ BIN_COUNT list heads | pad×2 | prologue | blocks... | epilogue ]      |
+------------------------------------------------------------------------------+
                   |                                    |            ^
                   | in-band free-list links             |            |
                   V                                    |            |
+---------------------------------------------+         |            |
| Segregated free lists                       |         |            |
|                                             |         |            |
| Head(0)   --> [free] --> [free] --> ...     |         |            |
| Head(1)   --> [free] --> ...                |         |            |
| ...                                         |         |            |
| Head(14)  --> [free] --> ...                |         |            |
|                                             |         |            |
+---------------------------------------------+         |            |
                      |            ^                    |            |
          allocate    |      free  |          allocate  |      free  |
                      V            |                    V            |
+------------------------------------------------------------------------------+
| Caller (AllocatorContext API, or the GlobalAlloc impl)                       |
+------------------------------------------------------------------------------+
```

## License

Licensed under the [Mozilla Public License 2.0](https://www.mozilla.org/en-US/MPL/2.0/).

[TL;DR?](https://choosealicense.com/licenses/mpl-2.0/)

> Permissions of this weak copyleft license are conditioned on making available
> source code of licensed files and modifications of those files under the same
> license (or in certain cases, one of the GNU licenses). Copyright and license
> notices must be preserved. Contributors provide an express grant of patent
> rights. However, a larger work using the licensed work may be distributed
> under different terms and without source code for files added in the larger
> work.

 */

#![deny(missing_docs)]

use core::alloc::{GlobalAlloc, Layout};
use core::ptr::{self, NonNull};

#[macro_use]
mod extra_assert;

mod block;
pub mod backend;
mod checker;
mod coalesce;
pub mod config;
mod const_init;
pub mod context;
mod error;
mod exclusive;
mod freelist;
mod units;

pub use backend::{HeapSource, VecHeapSource};
#[cfg(unix)]
pub use backend::UnixSbrkHeapSource;
pub use config::AllocatorConfig;
pub use context::AllocatorContext;
pub use error::AllocError;

use backend::DefaultHeapSource;
use const_init::ConstInit;
use exclusive::Exclusive;

/// The natural pointer-sized unsigned integer of the target, in bytes (4 on
/// 32-bit targets, 8 on 64-bit).
pub use units::WORD;

/// Every returned payload address is aligned to this many bytes (`2 *
/// WORD`).
pub use units::ALIGNMENT;

/// Smallest legal block size: header + two free-list link words + footer
/// (`4 * WORD`).
pub use units::MIN_BLOCK_SIZE;

/// The number of free-list size classes.
pub const BIN_COUNT: usize = 15;

/// The size, in bytes, of the smallest (class 0) free-list size class; class
/// `k < BIN_COUNT - 1` holds blocks up to `BOUND << k` bytes.
pub const BOUND: usize = 128;

/// The default heap-extension granularity, in bytes, used both for the
/// first extension after `init` and as the floor on any later extension.
pub const CHUNKSIZE: usize = 4104;

/// The process-wide default allocator instance.
///
/// # Safety
///
/// Sound only under the single-threaded-caller contract documented on
/// [`AllocatorContext`]; see that type's concurrency notes. Typically used
/// as a `static` installed via `#[global_allocator]`, where that contract is
/// upheld by the standard library's own synchronization around allocation.
pub struct SegfitAlloc {
    context: Exclusive<AllocatorContext<DefaultHeapSource>>,
}

unsafe impl Sync for SegfitAlloc {}

impl ConstInit for SegfitAlloc {
    const INIT: Self = SegfitAlloc {
        context: Exclusive::INIT,
    };
}

impl SegfitAlloc {
    /// A `const` default construction of a `SegfitAlloc`, for initializing
    /// a `static` used as `#[global_allocator]`.
    pub const INIT: Self = <Self as ConstInit>::INIT;

    fn alloc_impl(&self, layout: Layout) -> Option<NonNull<u8>> {
        debug_assert!(
            layout.align() <= ALIGNMENT,
            "alignment requests above {} bytes are out of scope; see the crate's non-goals",
            ALIGNMENT
        );
        unsafe { self.context.with_exclusive_access(|cx| cx.allocate(layout.size())) }
    }
}

unsafe impl GlobalAlloc for SegfitAlloc {
    unsafe fn alloc(&self, layout: Layout) -> *mut u8 {
        self.alloc_impl(layout)
            .map_or(ptr::null_mut(), NonNull::as_ptr)
    }

    unsafe fn dealloc(&self, ptr: *mut u8, _layout: Layout) {
        self.context
            .with_exclusive_access(|cx| cx.free(NonNull::new(ptr)));
    }

    unsafe fn realloc(&self, ptr: *mut u8, layout: Layout, new_size: usize) -> *mut u8 {
        debug_assert!(layout.align() <= ALIGNMENT);
        self.context
            .with_exclusive_access(|cx| cx.reallocate(NonNull::new(ptr), new_size))
            .map_or(ptr::null_mut(), NonNull::as_ptr)
    }
}

static GLOBAL: SegfitAlloc = SegfitAlloc::INIT;

/// Idempotent per process lifetime; must be called before any other free
/// function in this module. (The process-wide `SegfitAlloc` used as a
/// `#[global_allocator]` calls this on demand and does not require it.)
pub fn init() -> Result<(), AllocError> {
    unsafe { GLOBAL.context.with_exclusive_access(|cx| cx.init()) }
}

/// Allocate `size` bytes from the process-wide default allocator. See
/// [`AllocatorContext::allocate`].
pub fn allocate(size: usize) -> Option<NonNull<u8>> {
    unsafe { GLOBAL.context.with_exclusive_access(|cx| cx.allocate(size)) }
}

/// Free a block previously returned by [`allocate`] or [`reallocate`]. See
/// [`AllocatorContext::free`].
pub fn free(ptr: Option<NonNull<u8>>) {
    unsafe { GLOBAL.context.with_exclusive_access(|cx| cx.free(ptr)) }
}

/// Resize a previous allocation from the process-wide default allocator. See
/// [`AllocatorContext::reallocate`].
pub fn reallocate(ptr: Option<NonNull<u8>>, size: usize) -> Option<NonNull<u8>> {
    unsafe {
        GLOBAL
            .context
            .with_exclusive_access(|cx| cx.reallocate(ptr, size))
    }
}

/// Run the consistency checker over the process-wide default allocator's
/// heap. See [`AllocatorContext::check_heap`].
pub fn check_global_heap(verbose: bool) {
    unsafe {
        GLOBAL
            .context
            .with_exclusive_access(|cx| cx.check_heap(verbose))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn global_allocate_and_free() {
        let p = allocate(64).expect("allocation should succeed");
        check_global_heap(false);
        free(Some(p));
        check_global_heap(false);
    }

    #[test]
    fn global_init_is_idempotent() {
        assert!(init().is_ok());
        assert!(init().is_ok());
    }
}
