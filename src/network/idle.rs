//! Idle-connection list
//!
//! Connections ordered by last activity, least recent at the front. Every
//! key has a fixed link slot (keys are socket fds, so they are small and
//! dense), which makes touch and remove O(1) without any allocation after
//! the slot table has grown.

#[derive(Debug, Clone, Copy, Default)]
struct Link {
    prev: Option<usize>,
    next: Option<usize>,
    linked: bool,
}

/// Intrusive LRU list keyed by small integers
#[derive(Debug, Default)]
pub struct IdleList {
    links: Vec<Link>,
    head: Option<usize>,
    tail: Option<usize>,
    len: usize,
}

impl IdleList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn contains(&self, key: usize) -> bool {
        self.links.get(key).is_some_and(|l| l.linked)
    }

    /// Least recently active key
    pub fn front(&self) -> Option<usize> {
        self.head
    }

    /// Append `key` as the most recently active; a linked key is moved
    pub fn push_back(&mut self, key: usize) {
        if self.contains(key) {
            self.unlink(key);
        }
        if key >= self.links.len() {
            self.links.resize(key + 1, Link::default());
        }

        self.links[key] = Link {
            prev: self.tail,
            next: None,
            linked: true,
        };
        match self.tail {
            Some(tail) => self.links[tail].next = Some(key),
            None => self.head = Some(key),
        }
        self.tail = Some(key);
        self.len += 1;
    }

    /// Mark `key` as just active
    pub fn touch(&mut self, key: usize) {
        self.push_back(key);
    }

    /// Unlink `key`; returns false if it was not in the list
    pub fn remove(&mut self, key: usize) -> bool {
        if !self.contains(key) {
            return false;
        }
        self.unlink(key);
        true
    }

    /// Keys from least to most recently active
    pub fn iter(&self) -> impl Iterator<Item = usize> + '_ {
        std::iter::successors(self.head, move |&key| self.links[key].next)
    }

    fn unlink(&mut self, key: usize) {
        let Link { prev, next, .. } = self.links[key];
        match prev {
            Some(prev) => self.links[prev].next = next,
            None => self.head = next,
        }
        match next {
            Some(next) => self.links[next].prev = prev,
            None => self.tail = prev,
        }
        self.links[key] = Link::default();
        self.len -= 1;
    }
}
