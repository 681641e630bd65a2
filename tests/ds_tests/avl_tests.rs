//! AVL Tree Tests
//!
//! Every mutation is followed by a full structural check: parent links,
//! cached heights and sizes, balance, and in-order contents against a
//! sorted model.

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use tidekv::ds::{AvlTree, NodeId};

// =============================================================================
// Helper Functions
// =============================================================================

fn less(a: &u32, b: &u32) -> bool {
    a < b
}

/// Verify a subtree and return its (height, size)
fn check_node(tree: &AvlTree<u32>, id: Option<NodeId>, parent: Option<NodeId>) -> (u32, u32) {
    let Some(id) = id else {
        return (0, 0);
    };
    assert_eq!(tree.parent(id), parent, "bad parent link");

    let (lh, ls) = check_node(tree, tree.left(id), Some(id));
    let (rh, rs) = check_node(tree, tree.right(id), Some(id));
    assert!(lh.abs_diff(rh) <= 1, "unbalanced node {}", tree.get(id));

    let height = 1 + lh.max(rh);
    let size = 1 + ls + rs;
    assert_eq!(tree.height(Some(id)), height, "stale height");
    assert_eq!(tree.subtree_size(Some(id)), size, "stale size");

    if let Some(l) = tree.left(id) {
        assert!(tree.get(l) <= tree.get(id));
    }
    if let Some(r) = tree.right(id) {
        assert!(tree.get(r) >= tree.get(id));
    }
    (height, size)
}

fn verify(tree: &AvlTree<u32>, model: &[u32]) {
    let (_, size) = check_node(tree, tree.root(), None);
    assert_eq!(size as usize, model.len());

    let values: Vec<u32> = tree.iter().map(|(_, v)| *v).collect();
    assert_eq!(values, model);
}

fn find(tree: &AvlTree<u32>, value: u32) -> Option<NodeId> {
    tree.iter().find(|(_, v)| **v == value).map(|(id, _)| id)
}

// =============================================================================
// Insertion Tests
// =============================================================================

#[test]
fn test_empty_tree() {
    let tree: AvlTree<u32> = AvlTree::new();
    assert!(tree.is_empty());
    assert_eq!(tree.len(), 0);
    assert_eq!(tree.root(), None);
    assert_eq!(tree.first(), None);
    assert_eq!(tree.iter().count(), 0);
}

#[test]
fn test_sequential_inserts_stay_balanced() {
    let mut tree = AvlTree::new();
    let mut model = Vec::new();
    for v in 0..200 {
        tree.insert(v, less);
        model.push(v);
        verify(&tree, &model);
    }
    // 200 nodes fit in height 1.44 * log2(201)
    assert!(tree.height(tree.root()) <= 11);
}

#[test]
fn test_descending_inserts_stay_balanced() {
    let mut tree = AvlTree::new();
    for v in (0..200).rev() {
        tree.insert(v, less);
    }
    verify(&tree, &(0..200).collect::<Vec<_>>());
}

#[test]
fn test_duplicates_are_kept() {
    let mut tree = AvlTree::new();
    for v in [3, 1, 3, 2, 3] {
        tree.insert(v, less);
    }
    verify(&tree, &[1, 2, 3, 3, 3]);
}

// =============================================================================
// Deletion Tests
// =============================================================================

#[test]
fn test_delete_every_position() {
    // delete each position out of trees of several sizes
    for size in 1..40u32 {
        for victim in 0..size {
            let mut tree = AvlTree::new();
            let ids: Vec<NodeId> = (0..size).map(|v| tree.insert(v, less)).collect();

            assert_eq!(tree.remove(ids[victim as usize]), victim);

            let model: Vec<u32> = (0..size).filter(|&v| v != victim).collect();
            verify(&tree, &model);
        }
    }
}

#[test]
fn test_remove_all_in_random_order() {
    let mut rng = StdRng::seed_from_u64(11);
    let mut tree = AvlTree::new();
    let mut ids: Vec<(u32, NodeId)> = (0..500).map(|v| (v, tree.insert(v, less))).collect();
    ids.shuffle(&mut rng);

    let mut model: Vec<u32> = (0..500).collect();
    for (value, id) in ids {
        assert_eq!(tree.remove(id), value);
        model.retain(|&v| v != value);
        verify(&tree, &model);
    }
    assert!(tree.is_empty());
}

#[test]
fn test_freed_ids_are_reused() {
    let mut tree = AvlTree::new();
    let a = tree.insert(1, less);
    tree.insert(2, less);
    tree.remove(a);
    let c = tree.insert(3, less);

    assert_eq!(c, a);
    verify(&tree, &[2, 3]);
}

#[test]
fn test_detach_and_reattach() {
    let mut tree = AvlTree::new();
    let ids: Vec<NodeId> = (0..50).map(|v| tree.insert(v * 2, less)).collect();

    // move 10 to the end, the way a score update does
    tree.detach(ids[5]);
    assert_eq!(tree.len(), 49);
    *tree.get_mut(ids[5]) = 1_000;
    tree.attach(ids[5], less);

    let mut model: Vec<u32> = (0..50).map(|v| v * 2).filter(|&v| v != 10).collect();
    model.push(1_000);
    verify(&tree, &model);
    assert_eq!(tree.rank(ids[5]), 49);
}

// =============================================================================
// Order Statistics Tests
// =============================================================================

#[test]
fn test_rank_matches_position() {
    let mut rng = StdRng::seed_from_u64(5);
    let mut tree = AvlTree::new();
    let mut values: Vec<u32> = (0..300).map(|v| v * 3).collect();
    values.shuffle(&mut rng);
    for &v in &values {
        tree.insert(v, less);
    }

    for (pos, (id, _)) in tree.iter().enumerate() {
        assert_eq!(tree.rank(id), pos);
    }
}

#[test]
fn test_offset_reaches_every_node() {
    let mut tree = AvlTree::new();
    let size = 64i64;
    for v in 0..size as u32 {
        tree.insert(v, less);
    }

    for start in 0..size {
        let id = find(&tree, start as u32).unwrap();
        for k in -size - 2..size + 2 {
            let target = start + k;
            let got = tree.offset(id, k).map(|id| *tree.get(id) as i64);
            if (0..size).contains(&target) {
                assert_eq!(got, Some(target), "offset({}, {})", start, k);
            } else {
                assert_eq!(got, None, "offset({}, {})", start, k);
            }
        }
    }
}

#[test]
fn test_successor_walk() {
    let mut tree = AvlTree::new();
    for v in [5, 1, 9, 3, 7] {
        tree.insert(v, less);
    }

    let mut walked = Vec::new();
    let mut cur = tree.first();
    while let Some(id) = cur {
        walked.push(*tree.get(id));
        cur = tree.successor(id);
    }
    assert_eq!(walked, vec![1, 3, 5, 7, 9]);
}

// =============================================================================
// Model-Based Tests
// =============================================================================

#[test]
fn test_random_insert_remove_against_sorted_vec() {
    let mut rng = StdRng::seed_from_u64(0xa71);
    let mut tree = AvlTree::new();
    let mut live: Vec<(u32, NodeId)> = Vec::new();

    for round in 0..3_000 {
        if live.is_empty() || rng.gen_bool(0.6) {
            let v = rng.gen_range(0..1_000);
            live.push((v, tree.insert(v, less)));
        } else {
            let (v, id) = live.swap_remove(rng.gen_range(0..live.len()));
            assert_eq!(tree.remove(id), v);
        }

        if round % 50 == 0 {
            let mut model: Vec<u32> = live.iter().map(|(v, _)| *v).collect();
            model.sort_unstable();
            verify(&tree, &model);
        }
    }
}
