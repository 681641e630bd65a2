//! Data Structures Module
//!
//! The in-memory structures behind the keyspace.
//!
//! ## Responsibilities
//! - `hashtable`: chained hash table with incremental rehashing
//! - `avl`: order-statistics AVL tree (rank / offset in O(log n))
//! - `zset`: sorted set built from the two above
//! - `heap`: TTL min-heap whose items track their own positions
//!
//! All structures are arena-backed: nodes are addressed by small integer
//! handles, never by pointer, and each structure owns its storage.

pub mod avl;
pub mod hashtable;
pub mod heap;
pub mod zset;

pub use avl::{AvlTree, NodeId};
pub use hashtable::{str_hash, Handle, HashTable};
pub use heap::{HeapItem, TtlHeap};
pub use zset::{InsertOutcome, SortedSet, ZNode};
