//! Incrementally rehashing hash table
//!
//! Chained hash table over two bucket-array generations:
//!
//! ```text
//!   active   [ 0 ][ 1 ][ 2 ] ... [2n-1]   <- all inserts land here
//!   retiring [ 0 ][ 1 ] ... [n-1]         <- drained by every operation
//!                 ^ migrate_pos
//! ```
//!
//! When the load factor of `active` reaches [`MAX_LOAD_FACTOR`], `active`
//! becomes `retiring` and a new array twice the size takes its place. Each
//! later insert/lookup/delete first moves up to [`REHASH_WORK`] chain nodes
//! from `retiring` to `active`, so no single call pays for the whole resize.
//!
//! Items live in a slot arena owned by the table; buckets and chain links
//! hold slot indices. A [`Handle`] stays valid while its item is in the
//! table, whichever generation currently links it.

/// Max average chain length before a resize starts
pub const MAX_LOAD_FACTOR: usize = 8;

/// Chain nodes migrated per operation while rehashing
pub const REHASH_WORK: usize = 128;

/// Bucket count of a freshly initialized table
const INITIAL_BUCKETS: usize = 4;

/// FNV-style 32-bit hash over the key bytes
pub fn str_hash(data: &[u8]) -> u32 {
    let mut h: u32 = 0x811C_9DC5;
    for &byte in data {
        h = h.wrapping_add(byte as u32).wrapping_mul(0x0100_0193);
    }
    h
}

/// Stable reference to an item stored in a [`HashTable`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Handle(u32);

impl Handle {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

struct Slot<T> {
    hcode: u32,
    next: Option<u32>,
    item: T,
}

/// One bucket array; the bucket count is zero or a power of two
#[derive(Default)]
struct Generation {
    buckets: Vec<Option<u32>>,
    len: usize,
}

impl Generation {
    fn with_buckets(n: usize) -> Self {
        debug_assert!(n.is_power_of_two());
        Self {
            buckets: vec![None; n],
            len: 0,
        }
    }

    fn is_allocated(&self) -> bool {
        !self.buckets.is_empty()
    }

    fn bucket_of(&self, hcode: u32) -> usize {
        hcode as usize & (self.buckets.len() - 1)
    }
}

/// Chained hash table with amortized, incremental resizing
pub struct HashTable<T> {
    slots: Vec<Option<Slot<T>>>,
    free: Vec<u32>,
    active: Generation,
    retiring: Generation,
    migrate_pos: usize,
}

impl<T> Default for HashTable<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> HashTable<T> {
    /// Create an empty table; no buckets are allocated until the first insert
    pub fn new() -> Self {
        Self {
            slots: Vec::new(),
            free: Vec::new(),
            active: Generation::default(),
            retiring: Generation::default(),
            migrate_pos: 0,
        }
    }

    // =========================================================================
    // Public API
    // =========================================================================

    /// Number of items in both generations
    pub fn len(&self) -> usize {
        self.active.len + self.retiring.len
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Find the item with hash `hcode` for which `eq` holds
    pub fn lookup<F>(&mut self, hcode: u32, eq: F) -> Option<Handle>
    where
        F: Fn(&T) -> bool,
    {
        self.help_rehashing();
        self.find(hcode, &eq).map(|(_, _, idx)| Handle(idx))
    }

    /// Insert an item; the caller guarantees no equal item is present
    pub fn insert(&mut self, hcode: u32, item: T) -> Handle {
        if !self.active.is_allocated() {
            self.active = Generation::with_buckets(INITIAL_BUCKETS);
        }

        let idx = self.alloc_slot(hcode, item);
        Self::link(&mut self.slots, &mut self.active, idx);

        // Only start a resize when the previous one has fully drained
        if !self.retiring.is_allocated() {
            let threshold = self.active.buckets.len() * MAX_LOAD_FACTOR;
            if self.active.len >= threshold {
                self.trigger_rehashing();
            }
        }
        self.help_rehashing();

        Handle(idx)
    }

    /// Remove and return the item with hash `hcode` for which `eq` holds
    pub fn delete<F>(&mut self, hcode: u32, eq: F) -> Option<T>
    where
        F: Fn(&T) -> bool,
    {
        self.help_rehashing();
        let (in_active, prev, idx) = self.find(hcode, &eq)?;
        Some(self.unlink_and_free(in_active, prev, idx))
    }

    /// Remove the item a handle refers to
    pub fn remove(&mut self, handle: Handle) -> Option<T> {
        self.help_rehashing();
        let hcode = self.slots.get(handle.index())?.as_ref()?.hcode;
        let target = handle.0;
        let (in_active, prev, idx) = self.find_by(hcode, |idx, _| idx == target)?;
        Some(self.unlink_and_free(in_active, prev, idx))
    }

    /// Borrow the item behind a handle
    pub fn get(&self, handle: Handle) -> Option<&T> {
        self.slots
            .get(handle.index())
            .and_then(|slot| slot.as_ref())
            .map(|slot| &slot.item)
    }

    /// Mutably borrow the item behind a handle
    pub fn get_mut(&mut self, handle: Handle) -> Option<&mut T> {
        self.slots
            .get_mut(handle.index())
            .and_then(|slot| slot.as_mut())
            .map(|slot| &mut slot.item)
    }

    /// Visit every item, `active` generation first; stops when `visitor`
    /// returns false
    pub fn for_each<F>(&self, mut visitor: F)
    where
        F: FnMut(&T) -> bool,
    {
        for generation in [&self.active, &self.retiring] {
            for head in &generation.buckets {
                let mut cur = *head;
                while let Some(idx) = cur {
                    let slot = self.slot(idx);
                    if !visitor(&slot.item) {
                        return;
                    }
                    cur = slot.next;
                }
            }
        }
    }

    /// Iterate over all items in unspecified order
    pub fn iter(&self) -> impl Iterator<Item = &T> + '_ {
        self.slots.iter().filter_map(|slot| slot.as_ref().map(|s| &s.item))
    }

    /// Drop every item and release all bucket storage
    pub fn clear(&mut self) {
        *self = Self::new();
    }

    // =========================================================================
    // Introspection (for tests and metrics)
    // =========================================================================

    /// Bucket count of the generation receiving inserts
    pub fn bucket_count(&self) -> usize {
        self.active.buckets.len()
    }

    /// True while a resize is still migrating nodes
    pub fn is_rehashing(&self) -> bool {
        self.retiring.is_allocated()
    }

    // =========================================================================
    // Internals
    // =========================================================================

    fn slot(&self, idx: u32) -> &Slot<T> {
        match &self.slots[idx as usize] {
            Some(slot) => slot,
            None => panic!("hash chain references freed slot {}", idx),
        }
    }

    fn slot_mut(slots: &mut [Option<Slot<T>>], idx: u32) -> &mut Slot<T> {
        match &mut slots[idx as usize] {
            Some(slot) => slot,
            None => panic!("hash chain references freed slot {}", idx),
        }
    }

    fn alloc_slot(&mut self, hcode: u32, item: T) -> u32 {
        let slot = Slot {
            hcode,
            next: None,
            item,
        };
        match self.free.pop() {
            Some(idx) => {
                self.slots[idx as usize] = Some(slot);
                idx
            }
            None => {
                self.slots.push(Some(slot));
                (self.slots.len() - 1) as u32
            }
        }
    }

    /// Push a slot at the front of its chain in `generation`
    fn link(slots: &mut [Option<Slot<T>>], generation: &mut Generation, idx: u32) {
        let slot = Self::slot_mut(slots, idx);
        let pos = generation.bucket_of(slot.hcode);
        slot.next = generation.buckets[pos];
        generation.buckets[pos] = Some(idx);
        generation.len += 1;
    }

    fn find<F>(&self, hcode: u32, eq: &F) -> Option<(bool, Option<u32>, u32)>
    where
        F: Fn(&T) -> bool,
    {
        self.find_by(hcode, |_, item| eq(item))
    }

    /// Locate a node as `(in_active, chain predecessor, slot index)`
    fn find_by<F>(&self, hcode: u32, matches: F) -> Option<(bool, Option<u32>, u32)>
    where
        F: Fn(u32, &T) -> bool,
    {
        for (in_active, generation) in [(true, &self.active), (false, &self.retiring)] {
            if !generation.is_allocated() {
                continue;
            }
            let mut prev = None;
            let mut cur = generation.buckets[generation.bucket_of(hcode)];
            while let Some(idx) = cur {
                let slot = self.slot(idx);
                // Compare hash codes first to rule out candidates cheaply
                if slot.hcode == hcode && matches(idx, &slot.item) {
                    return Some((in_active, prev, idx));
                }
                prev = Some(idx);
                cur = slot.next;
            }
        }
        None
    }

    /// Detach a node from its chain, leaving its slot allocated
    fn unlink(&mut self, in_active: bool, prev: Option<u32>, idx: u32) {
        let next = self.slot(idx).next;
        let generation = if in_active {
            &mut self.active
        } else {
            &mut self.retiring
        };
        match prev {
            Some(p) => Self::slot_mut(&mut self.slots, p).next = next,
            None => {
                let hcode = Self::slot_mut(&mut self.slots, idx).hcode;
                let pos = generation.bucket_of(hcode);
                generation.buckets[pos] = next;
            }
        }
        generation.len -= 1;
    }

    fn unlink_and_free(&mut self, in_active: bool, prev: Option<u32>, idx: u32) -> T {
        self.unlink(in_active, prev, idx);
        self.release_retiring_if_drained();
        let slot = match self.slots[idx as usize].take() {
            Some(slot) => slot,
            None => panic!("hash chain references freed slot {}", idx),
        };
        self.free.push(idx);
        slot.item
    }

    fn trigger_rehashing(&mut self) {
        let doubled = Generation::with_buckets(self.active.buckets.len() * 2);
        self.retiring = std::mem::replace(&mut self.active, doubled);
        self.migrate_pos = 0;
    }

    /// Move a bounded number of chain heads from `retiring` to `active`
    fn help_rehashing(&mut self) {
        let mut work = 0;
        while work < REHASH_WORK && self.retiring.len > 0 {
            let Some(idx) = self.retiring.buckets[self.migrate_pos] else {
                self.migrate_pos += 1;
                continue;
            };
            // detach the chain head, then relink it into the new generation
            self.retiring.buckets[self.migrate_pos] = Self::slot_mut(&mut self.slots, idx).next;
            self.retiring.len -= 1;
            Self::link(&mut self.slots, &mut self.active, idx);
            work += 1;
        }
        self.release_retiring_if_drained();
    }

    fn release_retiring_if_drained(&mut self) {
        if self.retiring.len == 0 && self.retiring.is_allocated() {
            self.retiring = Generation::default();
            self.migrate_pos = 0;
        }
    }
}
