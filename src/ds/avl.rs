//! Order-statistics AVL tree
//!
//! Height- and size-augmented AVL tree whose nodes live in an arena owned
//! by the tree. Links are [`NodeId`]s; `parent` links exist for upward
//! traversal only. The ordering is supplied by the caller on insertion, so
//! the tree itself never compares values.
//!
//! ## Invariants (after every public mutation)
//! - `|height(left) - height(right)| <= 1` at every node
//! - `size = 1 + size(left) + size(right)` at every node
//!
//! ## Rank walks
//! Subtree sizes make `rank` and `offset` O(log n): `offset(node, k)` moves
//! to the node at `rank(node) + k` by skip-counting whole subtrees.

/// Stable reference to a node in an [`AvlTree`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(u32);

impl NodeId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

#[derive(Debug)]
struct Node<T> {
    parent: Option<NodeId>,
    left: Option<NodeId>,
    right: Option<NodeId>,
    height: u32,
    size: u32,
    value: T,
}

impl<T> Node<T> {
    fn detached(value: T) -> Self {
        Self {
            parent: None,
            left: None,
            right: None,
            height: 1,
            size: 1,
            value,
        }
    }
}

/// Arena-backed AVL tree with subtree sizes
#[derive(Debug)]
pub struct AvlTree<T> {
    nodes: Vec<Option<Node<T>>>,
    free: Vec<u32>,
    root: Option<NodeId>,
}

impl<T> Default for AvlTree<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> AvlTree<T> {
    pub fn new() -> Self {
        Self {
            nodes: Vec::new(),
            free: Vec::new(),
            root: None,
        }
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    pub fn root(&self) -> Option<NodeId> {
        self.root
    }

    /// Number of nodes linked into the tree
    pub fn len(&self) -> usize {
        self.subtree_size(self.root) as usize
    }

    pub fn is_empty(&self) -> bool {
        self.root.is_none()
    }

    pub fn get(&self, id: NodeId) -> &T {
        &self.node(id).value
    }

    /// Mutable access to a node's value. Changing the ordering key of a
    /// linked node breaks the tree; `detach` it first.
    pub fn get_mut(&mut self, id: NodeId) -> &mut T {
        &mut self.node_mut(id).value
    }

    pub fn left(&self, id: NodeId) -> Option<NodeId> {
        self.node(id).left
    }

    pub fn right(&self, id: NodeId) -> Option<NodeId> {
        self.node(id).right
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.node(id).parent
    }

    /// Height of a subtree (0 for an empty one)
    pub fn height(&self, id: Option<NodeId>) -> u32 {
        id.map_or(0, |id| self.node(id).height)
    }

    /// Node count of a subtree (0 for an empty one)
    pub fn subtree_size(&self, id: Option<NodeId>) -> u32 {
        id.map_or(0, |id| self.node(id).size)
    }

    // =========================================================================
    // Mutation
    // =========================================================================

    /// Store `value` and link it into the tree; `less` orders two values
    pub fn insert<F>(&mut self, value: T, less: F) -> NodeId
    where
        F: Fn(&T, &T) -> bool,
    {
        let id = self.alloc(value);
        self.attach(id, less);
        id
    }

    /// Link an allocated, detached node back into the tree
    pub fn attach<F>(&mut self, id: NodeId, less: F)
    where
        F: Fn(&T, &T) -> bool,
    {
        let mut parent = None;
        let mut cur = self.root;
        let mut go_left = false;
        while let Some(c) = cur {
            parent = Some(c);
            go_left = less(&self.node(id).value, &self.node(c).value);
            cur = if go_left { self.node(c).left } else { self.node(c).right };
        }
        match parent {
            Some(p) if go_left => self.node_mut(p).left = Some(id),
            Some(p) => self.node_mut(p).right = Some(id),
            None => {}
        }
        self.node_mut(id).parent = parent;
        self.fix(id);
    }

    /// Unlink a node from the tree but keep it allocated. Returns the new root.
    pub fn detach(&mut self, id: NodeId) -> Option<NodeId> {
        let root = self.delete(id);
        let node = self.node_mut(id);
        node.parent = None;
        node.left = None;
        node.right = None;
        node.height = 1;
        node.size = 1;
        root
    }

    /// Unlink a node and release it, returning its value
    pub fn remove(&mut self, id: NodeId) -> T {
        self.detach(id);
        let node = match self.nodes[id.index()].take() {
            Some(node) => node,
            None => panic!("avl: node {} already freed", id.0),
        };
        self.free.push(id.0);
        node.value
    }

    /// Drop every node
    pub fn clear(&mut self) {
        *self = Self::new();
    }

    /// Restore heights, sizes and balance from `id` up to the root.
    /// Returns the (possibly new) root.
    pub fn fix(&mut self, mut id: NodeId) -> NodeId {
        loop {
            let parent = self.node(id).parent;
            self.update(id);
            let lh = self.height(self.node(id).left);
            let rh = self.height(self.node(id).right);
            let fixed = if lh == rh + 2 {
                self.fix_left(id)
            } else if rh == lh + 2 {
                self.fix_right(id)
            } else {
                id
            };
            match parent {
                None => {
                    self.root = Some(fixed);
                    return fixed;
                }
                Some(p) => {
                    // rotations never touch the parent's child link
                    if self.node(p).left == Some(id) {
                        self.node_mut(p).left = Some(fixed);
                    } else {
                        self.node_mut(p).right = Some(fixed);
                    }
                    id = p;
                }
            }
        }
    }

    /// Unlink a linked node. Returns the new root.
    pub fn delete(&mut self, id: NodeId) -> Option<NodeId> {
        let (left, right) = (self.node(id).left, self.node(id).right);
        let (Some(_), Some(right)) = (left, right) else {
            return self.delete_easy(id);
        };

        // in-order successor: the smallest node of the right subtree
        let mut victim = right;
        while let Some(l) = self.node(victim).left {
            victim = l;
        }
        self.delete_easy(victim);

        // the successor takes over the deleted node's position
        let (parent, left, right, height, size) = {
            let n = self.node(id);
            (n.parent, n.left, n.right, n.height, n.size)
        };
        {
            let v = self.node_mut(victim);
            v.parent = parent;
            v.left = left;
            v.right = right;
            v.height = height;
            v.size = size;
        }
        if let Some(l) = left {
            self.node_mut(l).parent = Some(victim);
        }
        if let Some(r) = right {
            self.node_mut(r).parent = Some(victim);
        }
        match parent {
            None => self.root = Some(victim),
            Some(p) if self.node(p).left == Some(id) => self.node_mut(p).left = Some(victim),
            Some(p) => self.node_mut(p).right = Some(victim),
        }
        self.root
    }

    // =========================================================================
    // Order statistics
    // =========================================================================

    /// Zero-based position of a node in the in-order sequence
    pub fn rank(&self, id: NodeId) -> usize {
        let mut rank = self.subtree_size(self.node(id).left) as usize;
        let mut cur = id;
        while let Some(p) = self.node(cur).parent {
            if self.node(p).right == Some(cur) {
                rank += self.subtree_size(self.node(p).left) as usize + 1;
            }
            cur = p;
        }
        rank
    }

    /// The node at `rank(id) + offset`, if it exists
    pub fn offset(&self, mut id: NodeId, offset: i64) -> Option<NodeId> {
        // rank of `id` relative to the starting node
        let mut pos: i64 = 0;
        while pos != offset {
            let node = self.node(id);
            if pos < offset && pos + self.subtree_size(node.right) as i64 >= offset {
                // target is inside the right subtree
                let r = node.right?;
                id = r;
                pos += self.subtree_size(self.node(r).left) as i64 + 1;
            } else if pos > offset && pos - (self.subtree_size(node.left) as i64) <= offset {
                // target is inside the left subtree
                let l = node.left?;
                id = l;
                pos -= self.subtree_size(self.node(l).right) as i64 + 1;
            } else {
                // go to the parent
                let p = node.parent?;
                if self.node(p).right == Some(id) {
                    pos -= self.subtree_size(node.left) as i64 + 1;
                } else {
                    pos += self.subtree_size(node.right) as i64 + 1;
                }
                id = p;
            }
        }
        Some(id)
    }

    /// Smallest node
    pub fn first(&self) -> Option<NodeId> {
        let mut cur = self.root?;
        while let Some(l) = self.node(cur).left {
            cur = l;
        }
        Some(cur)
    }

    /// In-order successor
    pub fn successor(&self, id: NodeId) -> Option<NodeId> {
        if let Some(mut cur) = self.node(id).right {
            while let Some(l) = self.node(cur).left {
                cur = l;
            }
            return Some(cur);
        }
        let mut cur = id;
        while let Some(p) = self.node(cur).parent {
            if self.node(p).left == Some(cur) {
                return Some(p);
            }
            cur = p;
        }
        None
    }

    /// In-order iteration over `(id, value)`
    pub fn iter(&self) -> Iter<'_, T> {
        Iter {
            tree: self,
            next: self.first(),
        }
    }

    // =========================================================================
    // Internals
    // =========================================================================

    fn alloc(&mut self, value: T) -> NodeId {
        let node = Node::detached(value);
        match self.free.pop() {
            Some(idx) => {
                self.nodes[idx as usize] = Some(node);
                NodeId(idx)
            }
            None => {
                self.nodes.push(Some(node));
                NodeId((self.nodes.len() - 1) as u32)
            }
        }
    }

    fn node(&self, id: NodeId) -> &Node<T> {
        match self.nodes.get(id.index()) {
            Some(Some(node)) => node,
            _ => panic!("avl: stale node id {}", id.0),
        }
    }

    fn node_mut(&mut self, id: NodeId) -> &mut Node<T> {
        match self.nodes.get_mut(id.index()) {
            Some(Some(node)) => node,
            _ => panic!("avl: stale node id {}", id.0),
        }
    }

    /// Recompute height and size from the children
    fn update(&mut self, id: NodeId) {
        let (l, r) = (self.node(id).left, self.node(id).right);
        let height = 1 + self.height(l).max(self.height(r));
        let size = 1 + self.subtree_size(l) + self.subtree_size(r);
        let node = self.node_mut(id);
        node.height = height;
        node.size = size;
    }

    /// Detach a node with at most one child. Returns the new root.
    fn delete_easy(&mut self, id: NodeId) -> Option<NodeId> {
        let node = self.node(id);
        debug_assert!(node.left.is_none() || node.right.is_none());
        let child = node.left.or(node.right);
        let parent = node.parent;
        if let Some(c) = child {
            self.node_mut(c).parent = parent;
        }
        let Some(p) = parent else {
            self.root = child;
            return child;
        };
        if self.node(p).left == Some(id) {
            self.node_mut(p).left = child;
        } else {
            self.node_mut(p).right = child;
        }
        Some(self.fix(p))
    }

    /// Rotate left; the caller relinks the returned subtree root
    fn rotate_left(&mut self, id: NodeId) -> NodeId {
        let parent = self.node(id).parent;
        let Some(new_top) = self.node(id).right else {
            panic!("avl: rotate_left without a right child");
        };
        let inner = self.node(new_top).left;
        self.node_mut(id).right = inner;
        if let Some(inner) = inner {
            self.node_mut(inner).parent = Some(id);
        }
        self.node_mut(new_top).parent = parent;
        self.node_mut(new_top).left = Some(id);
        self.node_mut(id).parent = Some(new_top);
        self.update(id);
        self.update(new_top);
        new_top
    }

    /// Rotate right; the caller relinks the returned subtree root
    fn rotate_right(&mut self, id: NodeId) -> NodeId {
        let parent = self.node(id).parent;
        let Some(new_top) = self.node(id).left else {
            panic!("avl: rotate_right without a left child");
        };
        let inner = self.node(new_top).right;
        self.node_mut(id).left = inner;
        if let Some(inner) = inner {
            self.node_mut(inner).parent = Some(id);
        }
        self.node_mut(new_top).parent = parent;
        self.node_mut(new_top).right = Some(id);
        self.node_mut(id).parent = Some(new_top);
        self.update(id);
        self.update(new_top);
        new_top
    }

    /// Left subtree is 2 taller
    fn fix_left(&mut self, id: NodeId) -> NodeId {
        let Some(l) = self.node(id).left else {
            panic!("avl: left-heavy node without a left child");
        };
        if self.height(self.node(l).left) < self.height(self.node(l).right) {
            let rotated = self.rotate_left(l);
            self.node_mut(id).left = Some(rotated);
        }
        self.rotate_right(id)
    }

    /// Right subtree is 2 taller
    fn fix_right(&mut self, id: NodeId) -> NodeId {
        let Some(r) = self.node(id).right else {
            panic!("avl: right-heavy node without a right child");
        };
        if self.height(self.node(r).right) < self.height(self.node(r).left) {
            let rotated = self.rotate_right(r);
            self.node_mut(id).right = Some(rotated);
        }
        self.rotate_left(id)
    }
}

/// In-order iterator returned by [`AvlTree::iter`]
pub struct Iter<'a, T> {
    tree: &'a AvlTree<T>,
    next: Option<NodeId>,
}

impl<'a, T> Iterator for Iter<'a, T> {
    type Item = (NodeId, &'a T);

    fn next(&mut self) -> Option<Self::Item> {
        let id = self.next?;
        self.next = self.tree.successor(id);
        Some((id, self.tree.get(id)))
    }
}
