//! The segregated free-list index: `BIN_COUNT` doubly linked lists, one per
//! size class, with their head pointers stored as the very first words of the
//! heap (see the layout described on [`crate::AllocatorContext::init`]).
//!
//! Free-list links are embedded in the payload of the free blocks
//! themselves — the index never allocates metadata of its own. This mirrors
//! the teacher's `neighbors`-module philosophy of packing structural links
//! directly into cell headers, generalized from a single intrusive list to
//! `BIN_COUNT` of them.

use crate::block::{BlockPtr, Heap};
use crate::{BIN_COUNT, BOUND, WORD};

/// Returns the size class that a free block of `size` bytes belongs in.
///
/// Class `k` (for `k < BIN_COUNT - 1`) holds blocks with `size <= BOUND <<
/// k`; the last class is the catch-all for anything larger. Branch-free
/// aside from the final clamp: this is `ilog2(size / BOUND)`, clamped.
#[inline]
pub(crate) fn class_of(size: usize) -> usize {
    let mut class = 0;
    let mut bound = BOUND;
    while class < BIN_COUNT - 1 && size > bound {
        bound <<= 1;
        class += 1;
    }
    class
}

/// A view over the `BIN_COUNT` free-list heads stored at the base of a heap.
pub(crate) struct FreeListIndex<'h> {
    heap: &'h Heap,
}

impl<'h> FreeListIndex<'h> {
    pub(crate) fn new(heap: &'h Heap) -> Self {
        FreeListIndex { heap }
    }

    #[inline]
    fn head_offset(class: usize) -> usize {
        extra_assert!(class < BIN_COUNT);
        class * WORD
    }

    fn head(&self, class: usize) -> BlockPtr {
        unsafe { BlockPtr(self.heap.read_word(Self::head_offset(class))) }
    }

    fn set_head(&self, class: usize, bp: BlockPtr) {
        unsafe { self.heap.write_word(Self::head_offset(class), bp.0) }
    }

    /// Initialize all `BIN_COUNT` list heads to empty. Called once, from
    /// `init`, before any block exists.
    pub(crate) fn init_heads(&self) {
        for class in 0..BIN_COUNT {
            self.set_head(class, BlockPtr::NULL);
        }
    }

    /// Push `bp` (a block of the given `size`, already marked free) onto the
    /// front of its size class's list.
    pub(crate) fn insert(&self, bp: BlockPtr, size: usize) {
        extra_assert!(!unsafe { self.heap.is_allocated(bp) });

        let class = class_of(size);
        let old_head = self.head(class);

        unsafe {
            self.heap.set_free_next(bp, old_head);
            self.heap.set_free_prev(bp, BlockPtr::NULL);
            if !old_head.is_null() {
                self.heap.set_free_prev(old_head, bp);
            }
        }
        self.set_head(class, bp);

        log::trace!("freelist: insert {:?} into class {} (size {})", bp, class, size);
    }

    /// Unlink `bp` from whichever list it currently belongs to. The class is
    /// recomputed from the block's own header, never cached by the caller.
    pub(crate) fn remove(&self, bp: BlockPtr) {
        let size = unsafe { self.heap.size(bp) };
        let class = class_of(size);

        let (next, prev) = unsafe { (self.heap.free_next(bp), self.heap.free_prev(bp)) };

        if prev.is_null() {
            extra_assert!(self.head(class) == bp);
            self.set_head(class, next);
        } else {
            unsafe { self.heap.set_free_next(prev, next) };
        }

        if !next.is_null() {
            unsafe { self.heap.set_free_prev(next, prev) };
        }

        log::trace!("freelist: remove {:?} from class {} (size {})", bp, class, size);
    }

    /// First-fit search for a block whose header size is at least `asize`.
    /// Scans the natural class for `asize` first, then ascends through
    /// larger classes.
    pub(crate) fn find_fit(&self, asize: usize) -> Option<BlockPtr> {
        let start_class = class_of(asize);
        for class in start_class..BIN_COUNT {
            let mut bp = self.head(class);
            while !bp.is_null() {
                if unsafe { self.heap.size(bp) } >= asize {
                    return Some(bp);
                }
                bp = unsafe { self.heap.free_next(bp) };
            }
        }
        None
    }

    /// Iterate every block currently linked into class `class`, calling `f`
    /// with each. Used by the diagnostic checker; not on any allocation hot
    /// path.
    pub(crate) fn for_each_in_class(&self, class: usize, mut f: impl FnMut(BlockPtr)) {
        let mut bp = self.head(class);
        while !bp.is_null() {
            f(bp);
            bp = unsafe { self.heap.free_next(bp) };
        }
    }
}
