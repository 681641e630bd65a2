//! TTL Heap Tests
//!
//! Owners are indices into a side table of heap positions, the same way the
//! engine stores a position in each keyspace entry. After every operation
//! the heap order and every back-reference are checked.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tidekv::ds::{HeapItem, TtlHeap};

// =============================================================================
// Helper Functions
// =============================================================================

/// Heap plus the owners' stored positions
struct Harness {
    heap: TtlHeap<usize>,
    positions: Vec<Option<usize>>,
}

impl Harness {
    fn new(owners: usize) -> Self {
        Self {
            heap: TtlHeap::new(),
            positions: vec![None; owners],
        }
    }

    fn set(&mut self, owner: usize, expires_at: u64) {
        let positions = &mut self.positions;
        let pos = positions[owner];
        let item = HeapItem { expires_at, owner };
        let placed = self
            .heap
            .upsert(pos, item, |owner, pos| positions[owner] = Some(pos));
        assert_eq!(positions[owner], Some(placed));
    }

    fn clear(&mut self, owner: usize) {
        let Some(pos) = self.positions[owner] else {
            return;
        };
        let positions = &mut self.positions;
        let removed = self
            .heap
            .delete(pos, |owner, pos| positions[owner] = Some(pos))
            .unwrap();
        assert_eq!(removed.owner, owner);
        positions[owner] = None;
    }

    fn verify(&self) {
        let items = self.heap.items();
        for (i, item) in items.iter().enumerate() {
            if i > 0 {
                let parent = &items[(i - 1) / 2];
                assert!(parent.expires_at <= item.expires_at, "heap order broken at {}", i);
            }
            assert_eq!(self.positions[item.owner], Some(i), "stale back-reference");
        }
        let tracked = self.positions.iter().filter(|p| p.is_some()).count();
        assert_eq!(tracked, items.len());
    }
}

// =============================================================================
// Basic Operations Tests
// =============================================================================

#[test]
fn test_peek_returns_earliest() {
    let mut h = Harness::new(4);
    h.set(0, 300);
    h.set(1, 100);
    h.set(2, 200);
    h.verify();

    let top = h.heap.peek().unwrap();
    assert_eq!(top.owner, 1);
    assert_eq!(top.expires_at, 100);
}

#[test]
fn test_update_moves_item_both_ways() {
    let mut h = Harness::new(8);
    for owner in 0..8 {
        h.set(owner, 100 + owner as u64 * 10);
    }

    h.set(7, 1);
    h.verify();
    assert_eq!(h.heap.peek().unwrap().owner, 7);

    h.set(7, 1_000);
    h.verify();
    assert_eq!(h.heap.peek().unwrap().owner, 0);
    assert_eq!(h.heap.len(), 8);
}

#[test]
fn test_delete_top_and_middle() {
    let mut h = Harness::new(10);
    for owner in 0..10 {
        h.set(owner, (10 - owner) as u64);
    }

    h.clear(9);
    h.verify();
    h.clear(4);
    h.verify();
    assert_eq!(h.heap.len(), 8);
    assert_eq!(h.heap.peek().unwrap().owner, 8);
}

#[test]
fn test_delete_out_of_range() {
    let mut heap: TtlHeap<usize> = TtlHeap::new();
    assert!(heap.delete(0, |_, _| {}).is_none());
    assert!(heap.is_empty());
}

#[test]
fn test_delete_last_item_has_no_moves() {
    let mut heap = TtlHeap::new();
    heap.upsert(None, HeapItem { expires_at: 5, owner: 0usize }, |_, _| {});

    let mut moves = 0;
    heap.delete(0, |_, _| moves += 1);
    assert_eq!(moves, 0);
    assert!(heap.is_empty());
}

// =============================================================================
// Model-Based Tests
// =============================================================================

#[test]
fn test_random_operations_keep_invariants() {
    let owners = 200;
    let mut rng = StdRng::seed_from_u64(0x4ea9);
    let mut h = Harness::new(owners);

    for _ in 0..10_000 {
        let owner = rng.gen_range(0..owners);
        if rng.gen_bool(0.7) {
            h.set(owner, rng.gen_range(0..10_000));
        } else {
            h.clear(owner);
        }
        h.verify();
    }

    // draining from the top yields non-decreasing times
    let mut last = 0;
    while let Some(top) = h.heap.peek().copied() {
        assert!(top.expires_at >= last);
        last = top.expires_at;
        h.clear(top.owner);
        h.verify();
    }
}
