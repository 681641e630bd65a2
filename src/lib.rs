//! # TideKV
//!
//! An in-memory key-value store with:
//! - String values and sorted sets (ordered by score, then name)
//! - Per-key TTLs with millisecond resolution
//! - A single-threaded, non-blocking event loop
//! - A length-prefixed binary client protocol with pipelining
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                  Event Loop (poll)                          │
//! │        accept · read · write · idle timeout · TTL           │
//! └─────────────────────┬───────────────────────────────────────┘
//!                       │ requests / replies
//! ┌─────────────────────▼───────────────────────────────────────┐
//! │                      Engine                                 │
//! │         keyspace (hash table) + TTL heap                    │
//! └──────────┬───────────────────────────────────┬──────────────┘
//!            │                                   │ large values
//!            ▼                                   ▼
//!   ┌─────────────────┐                 ┌─────────────────┐
//!   │   Sorted Sets   │                 │   Thread Pool   │
//!   │ AVL + hash index│                 │ (async drops)   │
//!   └─────────────────┘                 └─────────────────┘
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod clock;
pub mod config;
pub mod error;

pub mod ds;
pub mod engine;
pub mod network;
pub mod pool;
pub mod protocol;

// =============================================================================
// Public API Re-exports
// =============================================================================

pub use config::Config;
pub use engine::Engine;
pub use error::{Result, TideError};
pub use network::{Client, Server};

// =============================================================================
// Version Info
// =============================================================================

/// Current version of TideKV
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
