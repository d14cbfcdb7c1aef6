//! Randomized `allocate`/`free`/`reallocate` sequence generation for
//! `segfit_alloc`, used by the quickcheck-driven tests in `tests/`.
//!
//! Grounded in the teacher's own `Operations`/`Arbitrary` harness (same
//! weighted-random `Alloc`/`Free` operation generator, same shrink strategy),
//! adapted to run against an isolated `AllocatorContext<VecHeapSource>`
//! instead of a process-wide `GlobalAlloc`, and extended with a `Realloc`
//! operation plus a `check_heap` pass after every single operation.

use quickcheck::{Arbitrary, Gen};
use segfit_alloc::{AllocatorContext, VecHeapSource};
use std::mem;

/// One step of a simulated allocator workload.
#[derive(Debug, Clone, Copy)]
pub enum Operation {
    /// Allocate this many bytes.
    Alloc(usize),
    /// Free the n^th allocation made so far, or no-op if already freed.
    Free(usize),
    /// Resize the n^th allocation made so far to this many bytes, or no-op
    /// if already freed.
    Realloc(usize, usize),
}

use Operation::*;

/// Bytes reserved for the isolated heap each `Operations` run allocates
/// into; generously large relative to `NUM_OPERATIONS`'s working set so that
/// `HeapExhausted` is rare and not itself the thing under test.
const ARENA_BYTES: usize = 64 * 1024 * 1024;

#[inline]
fn gen_range(g: &mut Gen, low: usize, high: usize) -> usize {
    debug_assert!(high > low);
    low + (usize::from(u32::arbitrary(g)) % (high - low))
}

#[inline]
fn gen_weighted_bool(g: &mut Gen, denominator: usize) -> bool {
    gen_range(g, 0, denominator) == 0
}

impl Operation {
    #[inline]
    fn arbitrary_alloc(g: &mut Gen, active_allocs: &mut Vec<usize>, num_allocs: &mut usize) -> Self {
        active_allocs.push(*num_allocs);
        *num_allocs += 1;

        // Zero sized allocation 1/1000 times.
        if gen_weighted_bool(g, 1000) {
            return Alloc(0);
        }

        // Matches `segfit_alloc::BIN_COUNT`'s largest non-catch-all class
        // boundary closely enough to regularly cross it.
        const LARGE_THRESHOLD: usize = 256 * mem::size_of::<usize>();

        // Do a large allocation with probability P = 1/20.
        if gen_weighted_bool(g, 20) {
            let n = gen_range(g, 1, 10) * LARGE_THRESHOLD + gen_range(g, 0, LARGE_THRESHOLD);
            return Alloc(n);
        }

        // Small allocation.
        if bool::arbitrary(g) {
            Alloc(gen_range(g, 12, 17))
        } else {
            Alloc(LARGE_THRESHOLD)
        }
    }

    #[inline]
    fn arbitrary_free(g: &mut Gen, active_allocs: &mut Vec<usize>) -> Self {
        assert!(!active_allocs.is_empty());
        let i = gen_range(g, 0, active_allocs.len());
        Free(active_allocs.swap_remove(i))
    }

    #[inline]
    fn arbitrary_realloc(g: &mut Gen, active_allocs: &[usize]) -> Self {
        assert!(!active_allocs.is_empty());
        let i = gen_range(g, 0, active_allocs.len());
        let new_size = gen_range(g, 0, 4096);
        Realloc(active_allocs[i], new_size)
    }
}

/// A full sequence of operations to replay against one fresh allocator.
#[derive(Debug, Clone)]
pub struct Operations(Vec<Operation>);

#[cfg(feature = "extra_assertions")]
const NUM_OPERATIONS: usize = 2_000;

#[cfg(not(feature = "extra_assertions"))]
const NUM_OPERATIONS: usize = 20_000;

impl Arbitrary for Operations {
    fn arbitrary(g: &mut Gen) -> Self {
        let mut num_allocs = 0;
        let mut active_allocs = vec![];
        let mut operations = Vec::with_capacity(NUM_OPERATIONS);

        for _ in 0..NUM_OPERATIONS {
            let roll = gen_range(g, 0, 10);
            if !active_allocs.is_empty() && roll == 0 {
                operations.push(Operation::arbitrary_free(g, &mut active_allocs));
            } else if !active_allocs.is_empty() && roll == 1 {
                operations.push(Operation::arbitrary_realloc(g, &active_allocs));
            } else {
                operations.push(Operation::arbitrary_alloc(
                    g,
                    &mut active_allocs,
                    &mut num_allocs,
                ));
            }
        }

        operations.reserve_exact(active_allocs.len());
        while !active_allocs.is_empty() {
            operations.push(Operation::arbitrary_free(g, &mut active_allocs));
        }

        Operations(operations)
    }

    fn shrink(&self) -> Box<dyn Iterator<Item = Self>> {
        let ops = self.0.clone();
        let prefixes =
            (0..self.0.len()).map(move |i| Operations(ops.iter().cloned().take(i).collect()));

        let free_indices: Vec<_> = self
            .0
            .iter()
            .enumerate()
            .filter_map(|(i, op)| if let Free(_) = *op { Some(i) } else { None })
            .collect();

        let ops = self.0.clone();
        let without_frees = free_indices.into_iter().map(move |i| {
            Operations(
                ops.iter()
                    .enumerate()
                    .filter_map(|(j, op)| if i == j { None } else { Some(*op) })
                    .collect(),
            )
        });

        let alloc_indices: Vec<_> = self
            .0
            .iter()
            .enumerate()
            .filter_map(|(i, op)| if let Alloc(_) = *op { Some(i) } else { None })
            .collect();

        let ops = self.0.clone();
        let smaller_allocs = alloc_indices.into_iter().map(move |i| {
            Operations(
                ops.iter()
                    .enumerate()
                    .filter_map(|(j, op)| {
                        if i == j {
                            if let Alloc(size) = *op {
                                if size == 0 {
                                    None
                                } else {
                                    Some(Alloc(size / 2))
                                }
                            } else {
                                Some(*op)
                            }
                        } else {
                            Some(*op)
                        }
                    })
                    .collect(),
            )
        });

        Box::new(prefixes.chain(without_frees).chain(smaller_allocs))
    }
}

impl Operations {
    /// Replay this sequence against a fresh, isolated allocator, running the
    /// consistency checker after every step.
    pub fn run(self) {
        let _ = env_logger::builder().is_test(true).try_init();

        let mut cx = AllocatorContext::new(VecHeapSource::new(ARENA_BYTES));
        let mut allocs: Vec<Option<std::ptr::NonNull<u8>>> = vec![];

        for op in self.0 {
            match op {
                Alloc(n) => {
                    allocs.push(cx.allocate(n));
                }
                Free(idx) => {
                    if let Some(slot) = allocs.get_mut(idx) {
                        if let Some(ptr) = slot.take() {
                            cx.free(Some(ptr));
                        }
                    }
                }
                Realloc(idx, new_size) => {
                    if let Some(slot) = allocs.get_mut(idx) {
                        if let Some(ptr) = slot.take() {
                            *slot = cx.reallocate(Some(ptr), new_size);
                        }
                    }
                }
            }
            cx.check_heap(false);
        }
    }
}

macro_rules! run_quickchecks {
    ( $name:ident ) => {
        #[test]
        fn $name() {
            quickcheck::QuickCheck::new()
                .tests(1)
                .quickcheck(Operations::run as fn(Operations) -> ());
        }
    };
}

// Let the test harness run each of these concurrently with each other; each
// gets its own isolated `AllocatorContext`, so there is no shared state to
// race on.
run_quickchecks!(quickchecks_0);
run_quickchecks!(quickchecks_1);
run_quickchecks!(quickchecks_2);
run_quickchecks!(quickchecks_3);

#[cfg(test)]
mod regression {
    use super::*;

    #[test]
    fn regression_test_0() {
        Operations(vec![Alloc(1)]).run();
    }

    #[test]
    fn regression_test_1() {
        Operations(vec![Alloc(1414), Free(0), Alloc(1414), Free(1)]).run();
    }

    #[test]
    fn regression_test_2() {
        Operations(vec![Alloc(168), Free(0), Alloc(0), Alloc(168), Free(2)]).run();
    }

    #[test]
    fn regression_test_3() {
        Operations(vec![Alloc(13672), Free(0), Alloc(1)]).run();
    }

    #[test]
    fn regression_test_4_realloc_grows_in_place() {
        Operations(vec![Alloc(24), Alloc(24), Free(1), Realloc(0, 100)]).run();
    }

    #[test]
    fn allocate_size_zero() {
        use std::iter;
        Operations(
            iter::repeat(Alloc(0))
                .take(1000)
                .chain((0..1000).map(Free))
                .collect(),
        )
        .run();
    }

    #[test]
    fn allocate_many_small() {
        use std::iter;
        Operations(
            iter::repeat(Alloc(16 * mem::size_of::<usize>()))
                .take(100)
                .chain((0..100).map(Free))
                .chain(iter::repeat(Alloc(256 * mem::size_of::<usize>())).take(100))
                .chain((0..100).map(|i| Free(i + 100)))
                .collect(),
        )
        .run();
    }

    #[test]
    fn allocate_many_large() {
        use std::iter;
        Operations(
            iter::repeat(Alloc(257 * mem::size_of::<usize>()))
                .take(100)
                .chain((0..100).map(Free))
                .chain(iter::repeat(Alloc(1024 * mem::size_of::<usize>())).take(100))
                .chain((0..100).map(|i| Free(i + 100)))
                .collect(),
        )
        .run();
    }
}
