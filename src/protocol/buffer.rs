//! Growable message buffer
//!
//! A byte store with a read cursor and a write cursor:
//!
//! ```text
//! ┌──────────────┬─────────────────────┬──────────────────┐
//! │   consumed   │      readable       │     writable     │
//! └──────────────┴─────────────────────┴──────────────────┘
//! 0          read_pos             write_pos          capacity
//! ```
//!
//! When the writable tail is too short, unread bytes are first shifted to
//! offset 0; the backing store is only reallocated when that is not enough.
//!
//! Placeholders are 4-byte slots reserved for a length (or count) that is
//! only known after more content has been appended. They form a stack so
//! that a frame length and the element count of a nested array can be
//! pending at the same time, and they move with the data on compaction.

/// Initial and minimum backing size
pub const DEFAULT_CAPACITY: usize = 4096;

/// Byte buffer with read/write cursors and deferred length slots
#[derive(Debug, Clone)]
pub struct MessageBuffer {
    buf: Vec<u8>,
    read_pos: usize,
    write_pos: usize,
    placeholders: Vec<usize>,
}

impl Default for MessageBuffer {
    fn default() -> Self {
        Self::new()
    }
}

impl MessageBuffer {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buf: vec![0; capacity],
            read_pos: 0,
            write_pos: 0,
            placeholders: Vec::new(),
        }
    }

    // =========================================================================
    // Views
    // =========================================================================

    /// Size of the backing store
    pub fn capacity(&self) -> usize {
        self.buf.len()
    }

    /// Number of unread bytes
    pub fn len(&self) -> usize {
        self.write_pos - self.read_pos
    }

    pub fn is_empty(&self) -> bool {
        self.read_pos == self.write_pos
    }

    /// Space left after the write cursor without moving anything
    pub fn writable_len(&self) -> usize {
        self.buf.len() - self.write_pos
    }

    pub fn readable(&self) -> &[u8] {
        &self.buf[self.read_pos..self.write_pos]
    }

    /// Free space after the write cursor; follow with [`commit`](Self::commit)
    pub fn writable_mut(&mut self) -> &mut [u8] {
        &mut self.buf[self.write_pos..]
    }

    // =========================================================================
    // Writing
    // =========================================================================

    /// Mark `n` bytes written through [`writable_mut`](Self::writable_mut)
    pub fn commit(&mut self, n: usize) {
        assert!(
            n <= self.writable_len(),
            "buffer: commit of {} bytes exceeds {} writable",
            n,
            self.writable_len()
        );
        self.write_pos += n;
    }

    /// Make at least `n` bytes writable
    pub fn reserve(&mut self, n: usize) {
        if self.writable_len() >= n {
            return;
        }
        let unread = self.len();

        // Compaction alone is enough
        if self.read_pos + self.writable_len() >= n {
            self.buf.copy_within(self.read_pos..self.write_pos, 0);
            self.rebase(unread);
            return;
        }

        // Reallocate: double, or exactly enough for the request
        let new_cap = (self.capacity() * 2).max(unread + n);
        let mut new_buf = vec![0; new_cap];
        new_buf[..unread].copy_from_slice(self.readable());
        self.buf = new_buf;
        self.rebase(unread);
    }

    pub fn append(&mut self, data: &[u8]) {
        self.reserve(data.len());
        self.buf[self.write_pos..self.write_pos + data.len()].copy_from_slice(data);
        self.write_pos += data.len();
    }

    pub fn put_u8(&mut self, v: u8) {
        self.append(&[v]);
    }

    pub fn put_u32(&mut self, v: u32) {
        self.append(&v.to_le_bytes());
    }

    pub fn put_i64(&mut self, v: i64) {
        self.append(&v.to_le_bytes());
    }

    pub fn put_f64(&mut self, v: f64) {
        self.append(&v.to_le_bytes());
    }

    // =========================================================================
    // Reading
    // =========================================================================

    /// Drop `n` bytes from the front. Consuming more than is buffered is a
    /// bug in the caller and panics.
    pub fn consume(&mut self, n: usize) {
        assert!(
            n <= self.len(),
            "buffer: consume of {} bytes with only {} buffered",
            n,
            self.len()
        );
        self.read_pos += n;
        if self.read_pos == self.write_pos && self.placeholders.is_empty() {
            self.read_pos = 0;
            self.write_pos = 0;
        }
    }

    // =========================================================================
    // Placeholders
    // =========================================================================

    /// Reserve a 4-byte slot at the write cursor to be filled later
    pub fn push_placeholder(&mut self) {
        self.reserve(4);
        self.placeholders.push(self.write_pos);
        self.append(&[0; 4]);
    }

    /// Bytes appended after the innermost pending placeholder
    pub fn placeholder_body_len(&self) -> usize {
        self.write_pos - self.top_placeholder() - 4
    }

    /// Discard everything appended after the innermost placeholder
    pub fn truncate_to_placeholder(&mut self) {
        self.write_pos = self.top_placeholder() + 4;
    }

    /// Fill the innermost placeholder with `value` and release it
    pub fn pop_placeholder(&mut self, value: u32) {
        let pos = self.top_placeholder();
        self.buf[pos..pos + 4].copy_from_slice(&value.to_le_bytes());
        self.placeholders.pop();
    }

    /// Number of placeholders still pending
    pub fn pending_placeholders(&self) -> usize {
        self.placeholders.len()
    }

    // =========================================================================
    // Memory
    // =========================================================================

    /// Shrink the backing store when it is far larger than the unread data
    pub fn shrink_if_wasteful(&mut self, hard_min: usize) {
        let unread = self.len();
        if self.capacity() <= hard_min.max(unread * 4) {
            return;
        }
        let new_cap = hard_min.max(unread * 2);
        let mut new_buf = vec![0; new_cap];
        new_buf[..unread].copy_from_slice(self.readable());
        self.buf = new_buf;
        self.rebase(unread);
    }

    fn top_placeholder(&self) -> usize {
        match self.placeholders.last() {
            Some(&pos) => pos,
            None => panic!("buffer: no pending placeholder"),
        }
    }

    /// Move the cursors after the unread bytes were copied to offset 0
    fn rebase(&mut self, unread: usize) {
        let shift = self.read_pos;
        for pos in &mut self.placeholders {
            debug_assert!(*pos >= shift, "buffer: placeholder behind read cursor");
            *pos -= shift;
        }
        self.read_pos = 0;
        self.write_pos = unread;
    }
}
