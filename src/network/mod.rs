//! Network Module
//!
//! TCP server and client handling.
//!
//! ## Architecture
//! - One thread runs the event loop: accept, read, execute, write, timers
//! - Sockets are non-blocking and multiplexed with `poll(2)`
//! - Commands are executed inline against the [`Engine`](crate::Engine)
//! - Idle connections are closed after `idle_timeout_ms`

mod client;
mod connection;
mod idle;
mod poller;
mod server;

pub use client::Client;
pub use connection::{Connection, Limits};
pub use idle::IdleList;
pub use poller::{timeout_ms, Interest, PollSet, Readiness};
pub use server::{Server, ShutdownHandle};
