//! Sorted set
//!
//! Pairs of (name, score) indexed twice over the same nodes:
//! - by `(score, name)` in an [`AvlTree`] for ordering, rank and range walks
//! - by `name` in a [`HashTable`] of node ids for point lookups
//!
//! Range queries follow a seek / offset / iterate protocol:
//! 1. [`SortedSet::seek_ge`] to the first pair `>= (score, name)`
//! 2. [`SortedSet::offset`] to the n-th successor or predecessor
//! 3. walk forward up to a limit

use std::cmp::Ordering;

use super::avl::{AvlTree, NodeId};
use super::hashtable::{str_hash, HashTable};

/// One member of a sorted set
#[derive(Debug, Clone, PartialEq)]
pub struct ZNode {
    pub name: Vec<u8>,
    pub score: f64,
}

/// `(score, name)` ordering; names compare bytewise, shorter prefix first
fn cmp_key(score: f64, name: &[u8], other_score: f64, other_name: &[u8]) -> Ordering {
    if score != other_score {
        return if score < other_score {
            Ordering::Less
        } else {
            Ordering::Greater
        };
    }
    name.cmp(other_name)
}

fn zless(lhs: &ZNode, rhs: &ZNode) -> bool {
    cmp_key(lhs.score, &lhs.name, rhs.score, &rhs.name) == Ordering::Less
}

/// Outcome of [`SortedSet::insert`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertOutcome {
    Created,
    Updated,
}

/// Sorted set of unique names ordered by `(score, name)`
#[derive(Default)]
pub struct SortedSet {
    tree: AvlTree<ZNode>,
    by_name: HashTable<NodeId>,
}

impl SortedSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.by_name.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_name.is_empty()
    }

    /// Member data behind a node id
    pub fn node(&self, id: NodeId) -> &ZNode {
        self.tree.get(id)
    }

    /// Add a member, or move an existing member to a new score
    pub fn insert(&mut self, name: &[u8], score: f64) -> InsertOutcome {
        if let Some(id) = self.lookup(name) {
            // the name index keeps pointing at the same node
            self.tree.detach(id);
            self.tree.get_mut(id).score = score;
            self.tree.attach(id, zless);
            return InsertOutcome::Updated;
        }

        let node = ZNode {
            name: name.to_vec(),
            score,
        };
        let id = self.tree.insert(node, zless);
        self.by_name.insert(str_hash(name), id);
        InsertOutcome::Created
    }

    /// Find a member by name
    pub fn lookup(&mut self, name: &[u8]) -> Option<NodeId> {
        if self.tree.is_empty() {
            return None;
        }
        let tree = &self.tree;
        self.by_name
            .lookup(str_hash(name), |&id| tree.get(id).name == name)
            .and_then(|handle| self.by_name.get(handle).copied())
    }

    /// Remove a member from both indexes
    pub fn delete(&mut self, id: NodeId) -> ZNode {
        let tree = &self.tree;
        let name = &tree.get(id).name;
        let removed = self.by_name.delete(str_hash(name), |&other| other == id);
        debug_assert_eq!(removed, Some(id), "zset: name index out of sync");
        self.tree.remove(id)
    }

    /// First member with `(score, name) >= (score, name)`
    pub fn seek_ge(&self, score: f64, name: &[u8]) -> Option<NodeId> {
        let mut found = None;
        let mut cur = self.tree.root();
        while let Some(id) = cur {
            let node = self.tree.get(id);
            if cmp_key(node.score, &node.name, score, name) == Ordering::Less {
                cur = self.tree.right(id);
            } else {
                // candidate; look for a smaller one on the left
                found = Some(id);
                cur = self.tree.left(id);
            }
        }
        found
    }

    /// The member `offset` positions after (or before, if negative) `id`
    pub fn offset(&self, id: NodeId, offset: i64) -> Option<NodeId> {
        self.tree.offset(id, offset)
    }

    /// The next member in order
    pub fn successor(&self, id: NodeId) -> Option<NodeId> {
        self.tree.successor(id)
    }

    /// Zero-based rank in `(score, name)` order
    pub fn rank(&self, id: NodeId) -> usize {
        self.tree.rank(id)
    }

    /// Number of members in `[from, to)`; 0 when the bounds are inverted
    pub fn count_between(&self, from: (f64, &[u8]), to: (f64, &[u8])) -> usize {
        let rank_of = |seek: Option<NodeId>| seek.map_or(self.len(), |id| self.rank(id));
        let lo = rank_of(self.seek_ge(from.0, from.1));
        let hi = rank_of(self.seek_ge(to.0, to.1));
        hi.saturating_sub(lo)
    }

    /// Up to `limit` members starting `offset` positions from the first
    /// member `>= (score, name)`
    pub fn range(&self, score: f64, name: &[u8], offset: i64, limit: usize) -> Vec<&ZNode> {
        let mut out = Vec::new();
        let mut cur = self
            .seek_ge(score, name)
            .and_then(|id| self.offset(id, offset));
        while let Some(id) = cur {
            if out.len() >= limit {
                break;
            }
            out.push(self.node(id));
            cur = self.successor(id);
        }
        out
    }

    /// Members in `(score, name)` order
    pub fn iter(&self) -> impl Iterator<Item = &ZNode> + '_ {
        self.tree.iter().map(|(_, node)| node)
    }

    /// The ordering tree, for invariant checks
    pub fn tree(&self) -> &AvlTree<ZNode> {
        &self.tree
    }

    /// Drop every member
    pub fn clear(&mut self) {
        self.by_name.clear();
        self.tree.clear();
    }
}
