//! Engine Module
//!
//! The data engine behind the event loop.
//!
//! ## Responsibilities
//! - Own the keyspace (string and sorted-set values)
//! - Execute commands and serialize their replies
//! - Track key TTLs in a min-heap and sweep expired keys
//! - Hand large values to the thread pool for destruction
//!
//! ## Concurrency Model
//! Everything here is touched by the event loop thread only, so nothing is
//! locked. The thread pool's queue is the one structure shared with other
//! threads, and values sent there are never looked at again.

use crate::config::Config;
use crate::ds::{str_hash, Handle, HashTable, HeapItem, InsertOutcome, SortedSet, TtlHeap};
use crate::error::Result;
use crate::pool::ThreadPool;
use crate::protocol::{
    decode_response, Command, CommandError, ErrorCode, MessageBuffer, ReplyWriter, Response,
};

/// Value stored under a key
pub enum Data {
    Str(Vec<u8>),
    ZSet(SortedSet),
}

/// One key-value slot of the keyspace
pub struct Entry {
    pub key: Vec<u8>,
    pub data: Data,
    /// Position of this entry's item in the TTL heap, if it has a TTL
    pub heap_idx: Option<usize>,
}

/// Keep an entry's stored heap position in sync after a heap move
fn sync_heap_index(keyspace: &mut HashTable<Entry>, owner: Handle, pos: usize) {
    if let Some(entry) = keyspace.get_mut(owner) {
        entry.heap_idx = Some(pos);
    }
}

/// The main data engine
pub struct Engine {
    /// Top-level key → entry table
    keyspace: HashTable<Entry>,

    /// Expiration times of entries with a TTL
    ttl: TtlHeap<Handle>,

    /// Workers for asynchronous value destruction
    pool: ThreadPool,

    large_container_threshold: usize,
    max_expirations_per_tick: usize,
}

impl Engine {
    /// Create an empty engine and start its worker pool
    pub fn new(config: &Config) -> Result<Self> {
        Ok(Self {
            keyspace: HashTable::new(),
            ttl: TtlHeap::new(),
            pool: ThreadPool::new(config.worker_threads)?,
            large_container_threshold: config.large_container_threshold,
            max_expirations_per_tick: config.max_expirations_per_tick,
        })
    }

    // =========================================================================
    // Command Execution
    // =========================================================================

    /// Execute one request and write exactly one reply value to `out`
    pub fn execute(&mut self, args: Vec<Vec<u8>>, out: &mut ReplyWriter<'_>, now_ms: u64) {
        let command = match Command::parse(args) {
            Ok(command) => command,
            Err(e) => return out.err(e.code, &e.message),
        };
        tracing::trace!("Executing {:?}", command.command_type());
        if let Err(e) = self.execute_command(command, out, now_ms) {
            out.err(e.code, &e.message);
        }
    }

    /// Execute a request and return its reply as a value
    pub fn query<S: AsRef<[u8]>>(&mut self, args: &[S], now_ms: u64) -> Response {
        let args = args.iter().map(|a| a.as_ref().to_vec()).collect();
        let mut buf = MessageBuffer::new();
        self.execute(args, &mut ReplyWriter::new(&mut buf), now_ms);
        match decode_response(buf.readable()) {
            Ok(response) => response,
            Err(e) => Response::error(ErrorCode::Unknown, &e.to_string()),
        }
    }

    /// Execute a parsed command. Errors are written by the caller, and no
    /// reply bytes have been written when one is returned.
    fn execute_command(
        &mut self,
        command: Command,
        out: &mut ReplyWriter<'_>,
        now_ms: u64,
    ) -> std::result::Result<(), CommandError> {
        match command {
            Command::Get { key } => self.do_get(&key, out),
            Command::Set { key, value } => {
                self.do_set(key, value);
                out.nil();
                Ok(())
            }
            Command::Del { key } => {
                out.int(self.do_del(&key) as i64);
                Ok(())
            }
            Command::Keys => {
                out.array(self.keyspace.len() as u32);
                self.keyspace.for_each(|entry| {
                    out.str(&entry.key);
                    true
                });
                Ok(())
            }
            Command::PExpire { key, ttl_ms } => {
                let found = match self.lookup(&key) {
                    Some(handle) => {
                        self.set_ttl(handle, ttl_ms, now_ms);
                        1
                    }
                    None => 0,
                };
                out.int(found);
                Ok(())
            }
            Command::PTtl { key } => {
                out.int(self.do_pttl(&key, now_ms));
                Ok(())
            }
            Command::ZAdd { key, score, name } => {
                let zset = self.zset_or_create(key)?;
                let added = zset.insert(&name, score) == InsertOutcome::Created;
                out.int(added as i64);
                Ok(())
            }
            Command::ZRem { key, name } => {
                let mut removed = 0;
                if let Some(zset) = self.zset_mut(&key)? {
                    if let Some(id) = zset.lookup(&name) {
                        zset.delete(id);
                        removed = 1;
                    }
                }
                out.int(removed);
                Ok(())
            }
            Command::ZScore { key, name } => {
                let score = self
                    .zset_mut(&key)?
                    .and_then(|zset| zset.lookup(&name).map(|id| zset.node(id).score));
                match score {
                    Some(score) => out.dbl(score),
                    None => out.nil(),
                }
                Ok(())
            }
            Command::ZQuery {
                key,
                score,
                name,
                offset,
                limit,
            } => {
                let zset = self.zset_mut(&key)?;
                out.begin_array();
                let mut pairs = 0;
                if let Some(zset) = zset {
                    let mut cur = zset
                        .seek_ge(score, &name)
                        .and_then(|id| zset.offset(id, offset));
                    while let Some(id) = cur {
                        if pairs >= limit {
                            break;
                        }
                        let node = zset.node(id);
                        out.str(&node.name);
                        out.dbl(node.score);
                        pairs += 1;
                        cur = zset.successor(id);
                    }
                }
                out.end_array((pairs * 2) as u32);
                Ok(())
            }
            Command::ZRank { key, name } => {
                let rank = self
                    .zset_mut(&key)?
                    .and_then(|zset| zset.lookup(&name).map(|id| zset.rank(id)));
                match rank {
                    Some(rank) => out.int(rank as i64),
                    None => out.nil(),
                }
                Ok(())
            }
            Command::ZCount { key, from, to } => {
                let count = self
                    .zset_mut(&key)?
                    .map_or(0, |zset| {
                        zset.count_between((from.0, from.1.as_slice()), (to.0, to.1.as_slice()))
                    });
                out.int(count as i64);
                Ok(())
            }
        }
    }

    // =========================================================================
    // String Commands
    // =========================================================================

    fn do_get(&mut self, key: &[u8], out: &mut ReplyWriter<'_>) -> std::result::Result<(), CommandError> {
        let Some(entry) = self.lookup(key).and_then(|h| self.keyspace.get(h)) else {
            out.nil();
            return Ok(());
        };
        match &entry.data {
            Data::Str(value) => {
                out.str(value);
                Ok(())
            }
            Data::ZSet(_) => Err(CommandError::new(ErrorCode::Type, "not a string value")),
        }
    }

    fn do_set(&mut self, key: Vec<u8>, value: Vec<u8>) {
        let Some(handle) = self.lookup(&key) else {
            let entry = Entry {
                key,
                data: Data::Str(value),
                heap_idx: None,
            };
            self.keyspace.insert(str_hash(&entry.key), entry);
            return;
        };
        let Some(entry) = self.keyspace.get_mut(handle) else {
            return;
        };
        // overwriting a sorted set changes the value kind
        let old = std::mem::replace(&mut entry.data, Data::Str(value));
        self.dispose(old);
    }

    fn do_del(&mut self, key: &[u8]) -> bool {
        let Some(entry) = self.keyspace.delete(str_hash(key), |e| e.key == key) else {
            return false;
        };
        self.destroy_entry(entry);
        true
    }

    fn do_pttl(&mut self, key: &[u8], now_ms: u64) -> i64 {
        let Some(entry) = self.lookup(key).and_then(|h| self.keyspace.get(h)) else {
            return -2;
        };
        match entry.heap_idx {
            None => -1,
            Some(pos) => {
                let expires_at = self.ttl.items()[pos].expires_at;
                expires_at.saturating_sub(now_ms) as i64
            }
        }
    }

    // =========================================================================
    // Sorted Set Access
    // =========================================================================

    /// The sorted set under `key`; `None` when the key is missing
    fn zset_mut(&mut self, key: &[u8]) -> std::result::Result<Option<&mut SortedSet>, CommandError> {
        let Some(handle) = self.lookup(key) else {
            return Ok(None);
        };
        match self.keyspace.get_mut(handle).map(|e| &mut e.data) {
            Some(Data::ZSet(zset)) => Ok(Some(zset)),
            Some(Data::Str(_)) => Err(CommandError::new(ErrorCode::Type, "expect zset")),
            None => Ok(None),
        }
    }

    /// The sorted set under `key`, created empty when the key is missing
    fn zset_or_create(&mut self, key: Vec<u8>) -> std::result::Result<&mut SortedSet, CommandError> {
        let handle = match self.lookup(&key) {
            Some(handle) => handle,
            None => {
                let entry = Entry {
                    key,
                    data: Data::ZSet(SortedSet::new()),
                    heap_idx: None,
                };
                self.keyspace.insert(str_hash(&entry.key), entry)
            }
        };
        match self.keyspace.get_mut(handle).map(|e| &mut e.data) {
            Some(Data::ZSet(zset)) => Ok(zset),
            _ => Err(CommandError::new(ErrorCode::Type, "expect zset")),
        }
    }

    // =========================================================================
    // TTL
    // =========================================================================

    /// Set a TTL of `ttl_ms` from now; a negative value clears it
    fn set_ttl(&mut self, handle: Handle, ttl_ms: i64, now_ms: u64) {
        let Some(heap_idx) = self.keyspace.get(handle).map(|e| e.heap_idx) else {
            return;
        };
        let keyspace = &mut self.keyspace;
        if ttl_ms < 0 {
            if let Some(pos) = heap_idx {
                self.ttl
                    .delete(pos, |owner, pos| sync_heap_index(keyspace, owner, pos));
                if let Some(entry) = keyspace.get_mut(handle) {
                    entry.heap_idx = None;
                }
            }
            return;
        }
        let item = HeapItem {
            expires_at: now_ms.saturating_add(ttl_ms as u64),
            owner: handle,
        };
        self.ttl
            .upsert(heap_idx, item, |owner, pos| sync_heap_index(keyspace, owner, pos));
    }

    /// Earliest pending expiration, in monotonic milliseconds
    pub fn next_expiry(&self) -> Option<u64> {
        self.ttl.peek().map(|item| item.expires_at)
    }

    /// Remove keys whose TTL is at or before `now_ms`, at most
    /// `max_expirations_per_tick` of them. Returns the number removed.
    pub fn process_expired(&mut self, now_ms: u64) -> usize {
        let mut expired = 0;
        while expired < self.max_expirations_per_tick {
            let owner = match self.ttl.peek() {
                Some(top) if top.expires_at <= now_ms => top.owner,
                _ => break,
            };
            let keyspace = &mut self.keyspace;
            self.ttl
                .delete(0, |owner, pos| sync_heap_index(keyspace, owner, pos));
            match self.keyspace.remove(owner) {
                Some(entry) => {
                    tracing::trace!("Expired key {:?}", String::from_utf8_lossy(&entry.key));
                    self.dispose(entry.data);
                }
                None => tracing::warn!("TTL heap referenced a missing entry"),
            }
            expired += 1;
        }
        expired
    }

    // =========================================================================
    // Destruction
    // =========================================================================

    /// Detach an entry removed from the keyspace from the TTL heap and free it
    fn destroy_entry(&mut self, entry: Entry) {
        if let Some(pos) = entry.heap_idx {
            let keyspace = &mut self.keyspace;
            self.ttl
                .delete(pos, |owner, pos| sync_heap_index(keyspace, owner, pos));
        }
        self.dispose(entry.data);
    }

    /// Free a value, on the pool when it is a large sorted set
    fn dispose(&self, data: Data) {
        match data {
            Data::ZSet(zset) if zset.len() > self.large_container_threshold => {
                tracing::trace!("Freeing sorted set of {} members in background", zset.len());
                self.pool.submit(move || drop(zset));
            }
            other => drop(other),
        }
    }

    fn lookup(&mut self, key: &[u8]) -> Option<Handle> {
        self.keyspace.lookup(str_hash(key), |e| e.key == key)
    }

    // =========================================================================
    // Accessors (for testing and debugging)
    // =========================================================================

    /// Number of keys
    pub fn len(&self) -> usize {
        self.keyspace.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keyspace.is_empty()
    }

    /// Number of keys with a TTL
    pub fn ttl_len(&self) -> usize {
        self.ttl.len()
    }

    /// The background pool
    pub fn pool(&self) -> &ThreadPool {
        &self.pool
    }
}
