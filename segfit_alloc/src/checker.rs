//! The consistency checker: `check_heap`.
//!
//! Grounded in the teacher's `extra_assertions`-gated free-list walk
//! (`assert_is_valid_free_list` in the original `wee_alloc` source), pulled
//! out into a standalone, always-compiled diagnostic that a caller can
//! invoke on demand rather than only under a cargo feature. All narration
//! goes through `log`; invariant violations are fatal.

use crate::block::{BlockPtr, Heap};
use crate::error::AllocError;
use crate::freelist::{class_of, FreeListIndex};
use crate::units::{ALIGNMENT, MIN_BLOCK_SIZE, WORD};
use crate::BIN_COUNT;

/// Walk the heap forward from the prologue and every free-list class,
/// validating every invariant named in the crate's top-level documentation.
///
/// When `verbose` is `true`, each block and list visited is logged at
/// `debug`; the walk itself always happens (checking is not gated on
/// `verbose`, only its narration is). On any invariant violation, the
/// violation is logged at `error` and the process aborts via `panic!` — this
/// checker is a development tool, not a recoverable runtime guard.
pub fn check_heap(heap: &Heap, index: &FreeListIndex, heap_start: BlockPtr, verbose: bool) {
    check_blocks(heap, heap_start, verbose);
    check_free_lists(heap, index, verbose);
}

fn check_blocks(heap: &Heap, heap_start: BlockPtr, verbose: bool) {
    let mut bp = heap_start;
    let mut prev_was_free = false;

    loop {
        let size = unsafe { heap.size(bp) };
        if size == 0 {
            if verbose {
                log::debug!("check_heap: epilogue at {:?}", bp);
            }
            break;
        }

        let header = unsafe { heap.header(bp) };
        let footer = unsafe { heap.footer(bp) };
        if header != footer {
            fatal(format!(
                "block {:?}: header ({:#x}) != footer ({:#x})",
                bp,
                header,
                footer
            ));
        }

        if size < MIN_BLOCK_SIZE {
            fatal(format!(
                "block {:?}: size {} is below the minimum block size {}",
                bp,
                size,
                MIN_BLOCK_SIZE
            ));
        }
        if size % ALIGNMENT != 0 {
            fatal(format!(
                "block {:?}: size {} is not a multiple of {}",
                bp,
                size,
                ALIGNMENT
            ));
        }
        if bp.0 % ALIGNMENT != 0 {
            fatal(format!(
                "block {:?}: payload address is not {}-byte aligned",
                bp,
                ALIGNMENT
            ));
        }

        let is_free = !unsafe { heap.is_allocated(bp) };
        if prev_was_free && is_free {
            fatal(format!(
                "block {:?}: adjacent free blocks were not coalesced",
                bp
            ));
        }
        prev_was_free = is_free;

        if verbose {
            log::debug!(
                "check_heap: block {:?} size={} alloc={}",
                bp,
                size,
                !is_free
            );
        }

        bp = unsafe { heap.next_block(bp) };
    }
}

fn check_free_lists(heap: &Heap, index: &FreeListIndex, verbose: bool) {
    for class in 0..BIN_COUNT {
        let mut prev = BlockPtr::NULL;
        index.for_each_in_class(class, |bp| {
            if unsafe { heap.is_allocated(bp) } {
                fatal(format!(
                    "free list class {}: {:?} is marked allocated",
                    class,
                    bp
                ));
            }

            let size = unsafe { heap.size(bp) };
            let actual_class = class_of(size);
            if actual_class != class {
                fatal(format!(
                    "free list class {}: {:?} (size {}) belongs in class {}",
                    class,
                    bp,
                    size,
                    actual_class
                ));
            }

            let recorded_prev = unsafe { heap.free_prev(bp) };
            if recorded_prev != prev {
                fatal(format!(
                    "free list class {}: {:?}.prev ({:?}) does not match walk predecessor ({:?})",
                    class,
                    bp,
                    recorded_prev,
                    prev
                ));
            }

            if verbose {
                log::debug!("check_heap: class {} member {:?} size={}", class, bp, size);
            }

            prev = bp;
        });
    }
}

fn fatal(reason: String) -> ! {
    let err = AllocError::InvariantViolation { reason };
    log::error!("{}", err);
    panic!("{}", err);
}


#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{HeapSource, VecHeapSource};
    use crate::BIN_COUNT as BINS;

    fn init_minimal_heap() -> (VecHeapSource, Heap, BlockPtr) {
        let mut src = VecHeapSource::new(4096);
        let base = src.grow((BINS + 5) * WORD).unwrap();
        let heap = Heap::new(base);

        for class in 0..BINS {
            unsafe { heap.write_word(class * WORD, 0) };
        }

        let prologue_header_off = BINS * WORD + 2 * WORD;
        let prologue_word = 2 * WORD | 1;
        unsafe {
            heap.write_word(prologue_header_off, prologue_word);
            heap.write_word(prologue_header_off + WORD, prologue_word);
        }

        let epilogue_header_off = prologue_header_off + 2 * WORD;
        unsafe { heap.write_word(epilogue_header_off, 1) };

        let heap_start = BlockPtr(epilogue_header_off + WORD);
        (src, heap, heap_start)
    }

    #[test]
    fn accepts_empty_heap() {
        let (_src, heap, heap_start) = init_minimal_heap();
        let index = FreeListIndex::new(&heap);
        index.init_heads();
        check_heap(&heap, &index, heap_start, false);
    }

    #[test]
    #[should_panic(expected = "invariant violation")]
    fn rejects_header_footer_mismatch() {
        let (_src, heap, heap_start) = init_minimal_heap();
        let index = FreeListIndex::new(&heap);
        index.init_heads();

        unsafe {
            heap.write_word(heap_start.0 - WORD, 64 | 1);
            heap.write_word(heap_start.0 + 64 - 2 * WORD, 32 | 1);
            heap.write_word(heap_start.0 + 64, 1);
        }

        check_heap(&heap, &index, heap_start, false);
    }
}
