//! Network Tests
//!
//! Tests for the idle list, the readiness multiplexer, and the event loop
//! driven one iteration at a time.

mod idle_tests;
mod server_tests;
