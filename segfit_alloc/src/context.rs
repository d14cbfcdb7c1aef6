//! `AllocatorContext`: the top-level allocator, owning all mutable state for
//! one heap.
//!
//! This is the "Top-level allocator" component: size adjustment, the
//! free-fit/extend-heap/place pipeline, and the in-place reallocation fast
//! paths, built on top of the block, free-list, and coalescing primitives.

use core::cmp;
use core::ptr::NonNull;

use crate::backend::HeapSource;
use crate::block::{self, BlockPtr, Heap};
use crate::checker;
use crate::coalesce::{coalesce, place};
use crate::config::AllocatorConfig;
use crate::const_init::ConstInit;
use crate::error::AllocError;
use crate::freelist::FreeListIndex;
use crate::units;
use crate::{ALIGNMENT, BIN_COUNT, CHUNKSIZE, MIN_BLOCK_SIZE, WORD};

/// Owns one allocator's mutable state: its `HeapSource`, the heap base
/// address once established, and construction-time configuration.
///
/// Constructed directly for tests (`new`/`with_config`); the crate's
/// process-wide default instance wraps one of these in an
/// [`Exclusive`](crate::exclusive::Exclusive) behind a `static`.
pub struct AllocatorContext<H: HeapSource> {
    heap_source: H,
    base: Option<NonNull<u8>>,
    heap_start: BlockPtr,
    config: AllocatorConfig,
}

impl<H: HeapSource + ConstInit> ConstInit for AllocatorContext<H> {
    const INIT: Self = AllocatorContext {
        heap_source: H::INIT,
        base: None,
        heap_start: BlockPtr::NULL,
        config: AllocatorConfig {
            initial_chunk_size: CHUNKSIZE,
            backing_capacity: 32 * 1024 * 1024,
            apply_legacy_size_policy: true,
        },
    };
}

impl<H: HeapSource> AllocatorContext<H> {
    /// A new, uninitialized context over `heap_source`, with default
    /// configuration. Nothing is allocated from `heap_source` until
    /// [`init`](Self::init) (explicitly, or implicitly via the first
    /// [`allocate`](Self::allocate)).
    pub fn new(heap_source: H) -> Self {
        Self::with_config(heap_source, AllocatorConfig::default())
    }

    /// Like [`new`](Self::new), with explicit configuration.
    pub fn with_config(heap_source: H, config: AllocatorConfig) -> Self {
        AllocatorContext {
            heap_source,
            base: None,
            heap_start: BlockPtr::NULL,
            config,
        }
    }

    #[inline]
    fn heap(&self) -> Heap {
        Heap::new(
            self.base
                .expect("AllocatorContext::heap called before init"),
        )
    }

    fn ensure_init(&mut self) -> Result<(), AllocError> {
        if self.base.is_some() {
            Ok(())
        } else {
            self.init()
        }
    }

    /// Reserve and lay out the bookkeeping region (free-list heads, padding,
    /// prologue, epilogue), then extend the heap by one initial chunk.
    /// Idempotent: calling this again on an already-initialized context is a
    /// no-op that returns `Ok(())`.
    pub fn init(&mut self) -> Result<(), AllocError> {
        if self.base.is_some() {
            return Ok(());
        }

        // `BIN_COUNT` list heads, two padding words, a 2-word prologue, and
        // a 1-word epilogue: `BIN_COUNT + 5` words. Two padding words rather
        // than one — `BIN_COUNT` is odd, so a single pad word would leave
        // `heap_start` 8-mod-16 instead of 16-aligned.
        let bootstrap_bytes = (BIN_COUNT + 5) * WORD;
        let base = self.heap_source.grow(bootstrap_bytes)?;
        self.base = Some(base);

        let heap = self.heap();
        let index = FreeListIndex::new(&heap);
        index.init_heads();

        let padding_offset = BIN_COUNT * WORD;
        unsafe {
            heap.write_word(padding_offset, 0);
            heap.write_word(padding_offset + WORD, 0);
        }

        // The prologue is a permanently-allocated 2-word sentinel block,
        // smaller than `MIN_BLOCK_SIZE` by design, so it is written directly
        // rather than through `Heap::write_block` (which enforces the
        // minimum size for ordinary blocks).
        let prologue_header_offset = padding_offset + 2 * WORD;
        let prologue_word = block::pack(2 * WORD, true);
        unsafe {
            heap.write_word(prologue_header_offset, prologue_word);
            heap.write_word(prologue_header_offset + WORD, prologue_word);
        }

        let epilogue_header_offset = prologue_header_offset + 2 * WORD;
        unsafe { heap.write_word(epilogue_header_offset, block::pack(0, true)) };

        let heap_start = BlockPtr(epilogue_header_offset + WORD);
        self.heap_start = heap_start;

        log::trace!(
            "init: bootstrap region of {} bytes, heap_start at {:?}",
            bootstrap_bytes,
            heap_start
        );

        let chunk = round_up_alignment(self.config.initial_chunk_size);
        self.extend_heap(chunk)?;
        Ok(())
    }

    /// Grow the heap by exactly `size_bytes` (which must already be a
    /// multiple of the alignment), turning the new region into one free
    /// block, coalescing it with whatever free block preceded it, and
    /// linking the result into the free-list index. Returns the resulting
    /// block.
    fn extend_heap(&mut self, size_bytes: usize) -> Result<BlockPtr, AllocError> {
        extra_assert!(size_bytes % ALIGNMENT == 0, "{} misaligned", size_bytes);

        let growth_ptr = self.heap_source.grow(size_bytes)?;
        let heap = self.heap();
        let new_bp = heap.from_raw(growth_ptr);

        unsafe {
            heap.write_block(new_bp, size_bytes, false);
            let next = heap.next_block(new_bp);
            heap.write_word(next.0 - WORD, block::pack(0, true));
        }

        let index = FreeListIndex::new(&heap);
        index.insert(new_bp, size_bytes);
        log::trace!("extend_heap: grew by {} bytes at {:?}", size_bytes, new_bp);

        Ok(coalesce(&heap, &index, new_bp))
    }

    /// The internal block size needed to satisfy a `size`-byte request:
    /// rounds up for header/footer overhead and the minimum block size, then
    /// applies the two historical policy exceptions when
    /// `config.apply_legacy_size_policy` is set.
    fn adjusted_size(&self, size: usize) -> usize {
        let mut asize = if size <= ALIGNMENT {
            MIN_BLOCK_SIZE
        } else {
            round_up_alignment(size) + 2 * WORD
        };

        if self.config.apply_legacy_size_policy {
            if size != 0 && size % 128 == 0 && size != 128 {
                asize = 2 * WORD + size + 128;
            }
            if size == 4092 {
                asize = WORD + CHUNKSIZE;
            }
        }

        asize
    }

    /// Allocate `size` bytes, returning a 2×Word-aligned payload address, or
    /// `None` if `size` is zero or the heap source is exhausted.
    pub fn allocate(&mut self, size: usize) -> Option<NonNull<u8>> {
        if size == 0 {
            return None;
        }
        self.ensure_init().ok()?;

        let asize = self.adjusted_size(size);

        {
            let heap = self.heap();
            let index = FreeListIndex::new(&heap);
            if let Some(bp) = index.find_fit(asize) {
                place(&heap, &index, bp, asize);
                log::trace!("allocate({}): placed into {:?} (asize {})", size, bp, asize);
                return Some(heap.to_raw(bp));
            }
        }

        let grow_size = round_up_alignment(cmp::max(asize, self.config.initial_chunk_size));
        let bp = match self.extend_heap(grow_size) {
            Ok(bp) => bp,
            Err(err) => {
                log::warn!("allocate({}): heap extension failed: {}", size, err);
                return None;
            }
        };

        let heap = self.heap();
        let index = FreeListIndex::new(&heap);
        place(&heap, &index, bp, asize);
        log::trace!(
            "allocate({}): placed into freshly extended {:?} (asize {})",
            size,
            bp,
            asize
        );
        Some(heap.to_raw(bp))
    }

    /// Free a block previously returned by `allocate`/`reallocate`. `None`
    /// is a no-op. Double free is undefined behavior, per the crate's
    /// concurrency and misuse notes.
    pub fn free(&mut self, ptr: Option<NonNull<u8>>) {
        let ptr = match ptr {
            Some(ptr) => ptr,
            None => return,
        };

        let heap = self.heap();
        let bp = heap.from_raw(ptr);
        let size = unsafe { heap.size(bp) };
        unsafe { heap.write_block(bp, size, false) };

        let index = FreeListIndex::new(&heap);
        index.insert(bp, size);
        let merged = coalesce(&heap, &index, bp);
        log::trace!("free: {:?} freed, now {:?} (size {})", bp, merged, unsafe {
            heap.size(merged)
        });
    }

    /// Resize a previous allocation, per the semantics in the crate's
    /// top-level documentation: in-place shrink/grow fast paths, falling
    /// back to allocate-copy-free.
    pub fn reallocate(&mut self, ptr: Option<NonNull<u8>>, size: usize) -> Option<NonNull<u8>> {
        if size == 0 {
            self.free(ptr);
            return None;
        }

        let ptr = match ptr {
            Some(ptr) => ptr,
            None => return self.allocate(size),
        };

        let new_asize = round_up_alignment(size) + 2 * WORD;
        let heap = self.heap();
        let bp = heap.from_raw(ptr);
        let old_size = unsafe { heap.size(bp) };

        if new_asize == old_size {
            return Some(ptr);
        }

        if old_size > new_asize {
            let diff = old_size - new_asize;
            if diff >= 2 * ALIGNMENT {
                unsafe { heap.write_block(bp, new_asize, true) };
                let next = unsafe { heap.next_block(bp) };
                unsafe { heap.write_block(next, diff, false) };
                let index = FreeListIndex::new(&heap);
                index.insert(next, diff);
                coalesce(&heap, &index, next);
                log::trace!("reallocate: shrank {:?} to {}, freed {} remainder", bp, new_asize, diff);
            }
            return Some(ptr);
        }

        let diff = new_asize - old_size;
        let next = unsafe { heap.next_block(bp) };
        if !unsafe { heap.is_allocated(next) } {
            let nsize = unsafe { heap.size(next) };
            let index = FreeListIndex::new(&heap);

            if nsize >= diff + 2 * ALIGNMENT {
                index.remove(next);
                unsafe { heap.write_block(bp, new_asize, true) };
                let leftover_bp = unsafe { heap.next_block(bp) };
                let leftover_size = nsize - diff;
                unsafe { heap.write_block(leftover_bp, leftover_size, false) };
                index.insert(leftover_bp, leftover_size);
                log::trace!("reallocate: grew {:?} in place, {} leftover", bp, leftover_size);
                return Some(ptr);
            } else if nsize >= diff {
                index.remove(next);
                unsafe { heap.write_block(bp, old_size + nsize, true) };
                log::trace!("reallocate: grew {:?} in place, consumed whole neighbor", bp);
                return Some(ptr);
            }
        }

        match self.allocate(size) {
            Some(new_ptr) => {
                let copy_len = cmp::min(size, old_size);
                unsafe {
                    core::ptr::copy_nonoverlapping(ptr.as_ptr(), new_ptr.as_ptr(), copy_len);
                }
                self.free(Some(ptr));
                log::trace!("reallocate: {:?} could not grow in place, moved to {:?}", bp, new_ptr);
                Some(new_ptr)
            }
            None => {
                log::warn!("reallocate({}): fallback allocation failed, original untouched", size);
                None
            }
        }
    }

    /// Run the consistency checker over this context's heap. See
    /// [`checker::check_heap`].
    pub fn check_heap(&self, verbose: bool) {
        let heap = self.heap();
        let index = FreeListIndex::new(&heap);
        checker::check_heap(&heap, &index, self.heap_start, verbose);
    }
}

/// Rounds `n` up to the nearest multiple of [`ALIGNMENT`], so every block
/// size derived from it stays a multiple of 2×Word (invariant 6) and every
/// payload address built from it stays 2×Word-aligned (invariant 7).
#[inline]
fn round_up_alignment(n: usize) -> usize {
    units::round_up_to(n, ALIGNMENT) * ALIGNMENT
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::VecHeapSource;

    fn new_context() -> AllocatorContext<VecHeapSource> {
        AllocatorContext::new(VecHeapSource::new(1024 * 1024))
    }

    #[test]
    fn init_is_idempotent() {
        let mut cx = new_context();
        cx.init().unwrap();
        let base_after_first = cx.base;
        cx.init().unwrap();
        assert_eq!(cx.base, base_after_first);
    }

    #[test]
    fn allocate_zero_returns_none() {
        let mut cx = new_context();
        assert!(cx.allocate(0).is_none());
    }

    #[test]
    fn allocate_and_free_roundtrip() {
        let mut cx = new_context();
        let p = cx.allocate(64).unwrap();
        cx.check_heap(false);
        cx.free(Some(p));
        cx.check_heap(false);
    }

    #[test]
    fn allocate_one_byte_uses_minimum_block() {
        let mut cx = new_context();
        let p = cx.allocate(1).unwrap();
        let heap = cx.heap();
        let bp = heap.from_raw(p);
        assert_eq!(unsafe { heap.size(bp) }, MIN_BLOCK_SIZE);
    }

    #[test]
    fn adjacent_frees_coalesce() {
        let mut cx = new_context();
        let b = cx.allocate(24).unwrap();
        let c = cx.allocate(24).unwrap();
        cx.free(Some(b));
        cx.free(Some(c));
        cx.check_heap(false);

        let heap = cx.heap();
        let bp = heap.from_raw(b);
        assert!(!unsafe { heap.is_allocated(bp) });
    }

    #[test]
    fn reallocate_same_size_is_a_noop() {
        let mut cx = new_context();
        let p = cx.allocate(100).unwrap();
        let q = cx.reallocate(Some(p), 100).unwrap();
        assert_eq!(p, q);
    }

    #[test]
    fn reallocate_null_is_allocate() {
        let mut cx = new_context();
        let p = cx.reallocate(None, 32).unwrap();
        cx.check_heap(false);
        cx.free(Some(p));
    }

    #[test]
    fn reallocate_zero_is_free() {
        let mut cx = new_context();
        let p = cx.allocate(32).unwrap();
        assert!(cx.reallocate(Some(p), 0).is_none());
        cx.check_heap(false);
    }

    #[test]
    fn reallocate_grows_into_freed_neighbor() {
        let mut cx = new_context();
        let p = cx.allocate(24).unwrap();
        let r = cx.allocate(24).unwrap();
        cx.free(Some(r));
        let q = cx.reallocate(Some(p), 100).unwrap();
        assert_eq!(p, q);
        cx.check_heap(false);
    }

    #[test]
    fn allocate_4092_uses_legacy_chunksize_policy() {
        let mut cx = new_context();
        let p = cx.allocate(4092).unwrap();
        let heap = cx.heap();
        let bp = heap.from_raw(p);
        assert_eq!(unsafe { heap.size(bp) }, WORD + CHUNKSIZE);
    }

    #[test]
    fn exhausted_heap_source_returns_none() {
        let mut cx = AllocatorContext::new(VecHeapSource::new(256));
        assert!(cx.allocate(1_000_000).is_none());
    }

    #[test]
    fn randomized_alloc_free_sequence_stays_consistent() {
        use rand::{rngs::StdRng, Rng, SeedableRng};

        let _ = env_logger::builder().is_test(true).try_init();

        let mut cx = AllocatorContext::new(VecHeapSource::new(4 * 1024 * 1024));
        let mut rng = StdRng::seed_from_u64(0x5eed);
        let mut live = Vec::new();

        for _ in 0..2_000 {
            let choice = rng.gen_range(0..3);

            if choice == 0 || live.is_empty() {
                let size = rng.gen_range(1..4096);
                if let Some(p) = cx.allocate(size) {
                    live.push(p);
                }
            } else if choice == 1 {
                let idx = rng.gen_range(0..live.len());
                cx.free(Some(live.swap_remove(idx)));
            } else {
                let idx = rng.gen_range(0..live.len());
                let new_size = rng.gen_range(1..4096);
                if let Some(q) = cx.reallocate(Some(live[idx]), new_size) {
                    live[idx] = q;
                }
            }
            cx.check_heap(false);
        }

        for p in live {
            cx.free(Some(p));
        }
        cx.check_heap(false);
    }
}
