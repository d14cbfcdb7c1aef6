//! Smoke test for `SegfitAlloc` installed as `#[global_allocator]`, adapted
//! from the teacher's own `tests/global.rs`.
//!
//! Collapsed into a single `#[test]` function rather than several, and with
//! no `thread::spawn`: `cargo test` runs every `#[test]` fn in a process
//! concurrently by default, and `SegfitAlloc`'s single-threaded, non-Sync
//! contract (see the crate's concurrency notes) makes that unsound for a
//! shared global instance. One test function keeps this binary's global
//! allocator traffic on a single thread.

use std::collections::HashMap;

#[global_allocator]
static A: segfit_alloc::SegfitAlloc = segfit_alloc::SegfitAlloc::INIT;

#[test]
fn global_allocator_smoke() {
    println!("hello");

    let mut m = HashMap::new();
    m.insert(1, 2);
    m.insert(5, 3);
    assert_eq!(m.get(&1), Some(&2));
    drop(m);

    let s = format!("foo, bar, {}", "baz");
    assert_eq!(s, "foo, bar, baz");

    let v: Vec<u8> = (0..10_000).map(|i| (i % 256) as u8).collect();
    assert_eq!(v.len(), 10_000);
    drop(v);
}
