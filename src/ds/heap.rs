//! TTL heap
//!
//! Dense-array binary min-heap keyed by expiration time. Every item names
//! its owner, and every time an item lands at a new position the heap
//! reports `(owner, position)` through a caller-supplied callback. Owners
//! store that position themselves, so `heap[owner.heap_index].owner == owner`
//! holds after every mutation and arbitrary items can be updated or deleted
//! in O(log n) without a separate position map.

/// One heap slot: expiration timestamp plus the owner's back-reference
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HeapItem<R> {
    /// Expiration time in monotonic milliseconds
    pub expires_at: u64,
    pub owner: R,
}

fn parent(i: usize) -> usize {
    (i - 1) / 2
}

fn left(i: usize) -> usize {
    2 * i + 1
}

fn right(i: usize) -> usize {
    2 * i + 2
}

/// Min-heap of [`HeapItem`]s with back-reference maintenance
#[derive(Debug, Clone)]
pub struct TtlHeap<R> {
    items: Vec<HeapItem<R>>,
}

impl<R> Default for TtlHeap<R> {
    fn default() -> Self {
        Self { items: Vec::new() }
    }
}

impl<R: Copy> TtlHeap<R> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// The item that expires first
    pub fn peek(&self) -> Option<&HeapItem<R>> {
        self.items.first()
    }

    /// Raw heap array, for invariant checks
    pub fn items(&self) -> &[HeapItem<R>] {
        &self.items
    }

    /// Replace the item at `pos`, or append when `pos` is `None` or out of
    /// range, then restore heap order. Returns the item's final position.
    pub fn upsert<F>(&mut self, pos: Option<usize>, item: HeapItem<R>, mut sync: F) -> usize
    where
        F: FnMut(R, usize),
    {
        let pos = match pos {
            Some(pos) if pos < self.items.len() => {
                self.items[pos] = item;
                pos
            }
            _ => {
                self.items.push(item);
                self.items.len() - 1
            }
        };
        self.update(pos, &mut sync)
    }

    /// Remove the item at `pos`; the last item fills the hole and is re-sifted
    pub fn delete<F>(&mut self, pos: usize, mut sync: F) -> Option<HeapItem<R>>
    where
        F: FnMut(R, usize),
    {
        if pos >= self.items.len() {
            return None;
        }
        let removed = self.items.swap_remove(pos);
        if pos < self.items.len() {
            self.update(pos, &mut sync);
        }
        Some(removed)
    }

    fn update<F>(&mut self, pos: usize, sync: &mut F) -> usize
    where
        F: FnMut(R, usize),
    {
        if pos > 0 && self.items[pos].expires_at < self.items[parent(pos)].expires_at {
            self.sift_up(pos, sync)
        } else {
            self.sift_down(pos, sync)
        }
    }

    fn sift_up<F>(&mut self, mut pos: usize, sync: &mut F) -> usize
    where
        F: FnMut(R, usize),
    {
        let item = self.items[pos];
        while pos > 0 && item.expires_at < self.items[parent(pos)].expires_at {
            // move the parent down into the hole
            self.items[pos] = self.items[parent(pos)];
            sync(self.items[pos].owner, pos);
            pos = parent(pos);
        }
        self.items[pos] = item;
        sync(item.owner, pos);
        pos
    }

    fn sift_down<F>(&mut self, mut pos: usize, sync: &mut F) -> usize
    where
        F: FnMut(R, usize),
    {
        let item = self.items[pos];
        let len = self.items.len();
        loop {
            // smallest among the hole and its children
            let (l, r) = (left(pos), right(pos));
            let mut min_pos = pos;
            let mut min_val = item.expires_at;
            if l < len && self.items[l].expires_at < min_val {
                min_pos = l;
                min_val = self.items[l].expires_at;
            }
            if r < len && self.items[r].expires_at < min_val {
                min_pos = r;
            }
            if min_pos == pos {
                break;
            }
            self.items[pos] = self.items[min_pos];
            sync(self.items[pos].owner, pos);
            pos = min_pos;
        }
        self.items[pos] = item;
        sync(item.owner, pos);
        pos
    }
}
