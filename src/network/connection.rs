//! Connection Handler
//!
//! Per-client state machine driven by the event loop.
//!
//! ## States
//! A connection is always in exactly one of:
//! - **reading**: waiting for request bytes
//! - **writing**: flushing replies; no new input is read until the outgoing
//!   buffer drains, which bounds the memory one client can pin
//! - **closing**: destroyed by the event loop at the end of the iteration
//!
//! Several requests arriving in one read (pipelining) are all executed
//! before the connection switches to writing, and their replies go out in
//! request order.

use std::io::{self, Read, Write};
use std::net::TcpStream;
use std::os::fd::{AsRawFd, RawFd};

use crate::config::Config;
use crate::engine::Engine;
use crate::error::Result;
use crate::protocol::{
    begin_response, end_response, frame_len, parse_request, MessageBuffer, ReplyWriter,
    HEADER_SIZE,
};

use super::poller::Interest;

/// Bytes requested from the socket per read
const READ_CHUNK: usize = 64 * 1024;

/// Buffers are not shrunk below this capacity
const SHRINK_FLOOR: usize = 1 << 20;

/// Message limits enforced on one connection
#[derive(Debug, Clone, Copy)]
pub struct Limits {
    pub max_message_size: usize,
    pub max_args: usize,
}

impl From<&Config> for Limits {
    fn from(config: &Config) -> Self {
        Self {
            max_message_size: config.max_message_size,
            max_args: config.max_args,
        }
    }
}

/// A non-blocking client connection
pub struct Connection {
    stream: TcpStream,

    /// Peer address for logging
    peer_addr: String,

    /// Request bytes not yet parsed
    incoming: MessageBuffer,

    /// Reply bytes not yet written
    outgoing: MessageBuffer,

    want_read: bool,
    want_write: bool,
    want_close: bool,

    /// Time of the last successful read or write
    last_active_ms: u64,
}

impl Connection {
    /// Take over an accepted socket
    pub fn new(stream: TcpStream, now_ms: u64) -> Result<Self> {
        let peer_addr = stream
            .peer_addr()
            .map(|a| a.to_string())
            .unwrap_or_else(|_| "unknown".to_string());

        stream.set_nonblocking(true)?;
        // Disable Nagle's algorithm for low latency
        stream.set_nodelay(true)?;

        Ok(Self {
            stream,
            peer_addr,
            incoming: MessageBuffer::new(),
            outgoing: MessageBuffer::new(),
            want_read: true,
            want_write: false,
            want_close: false,
            last_active_ms: now_ms,
        })
    }

    pub fn stream(&self) -> &TcpStream {
        &self.stream
    }

    pub fn fd(&self) -> RawFd {
        self.stream.as_raw_fd()
    }

    pub fn peer_addr(&self) -> &str {
        &self.peer_addr
    }

    /// Readiness the event loop should wait for
    pub fn interest(&self) -> Interest {
        Interest {
            readable: self.want_read,
            writable: self.want_write,
        }
    }

    pub fn wants_read(&self) -> bool {
        self.want_read
    }

    pub fn wants_write(&self) -> bool {
        self.want_write
    }

    pub fn wants_close(&self) -> bool {
        self.want_close
    }

    /// Ask the event loop to destroy this connection
    pub fn close(&mut self) {
        self.want_close = true;
    }

    pub fn last_active_ms(&self) -> u64 {
        self.last_active_ms
    }

    pub fn touch(&mut self, now_ms: u64) {
        self.last_active_ms = now_ms;
    }

    // =========================================================================
    // Reading
    // =========================================================================

    /// Read what the socket has, run every complete request, and start
    /// writing the replies
    pub fn handle_read(&mut self, engine: &mut Engine, limits: Limits, now_ms: u64) {
        self.incoming.reserve(READ_CHUNK);
        let n = match self.stream.read(self.incoming.writable_mut()) {
            Ok(0) => {
                if self.incoming.is_empty() {
                    tracing::debug!("Client {} closed the connection", self.peer_addr);
                } else {
                    tracing::debug!("Unexpected EOF from {}", self.peer_addr);
                }
                self.want_close = true;
                return;
            }
            Ok(n) => n,
            Err(e) if is_transient(&e) => return,
            Err(e) => {
                tracing::debug!("Error reading from {}: {}", self.peer_addr, e);
                self.want_close = true;
                return;
            }
        };
        self.incoming.commit(n);
        self.last_active_ms = now_ms;

        while self.try_one_request(engine, limits, now_ms) {}
        self.incoming.shrink_if_wasteful(SHRINK_FLOOR);

        if !self.outgoing.is_empty() {
            self.want_read = false;
            self.want_write = true;
            // the socket is most likely writable already
            self.handle_write(now_ms);
        }
    }

    /// Execute the request at the front of the incoming buffer, if complete
    fn try_one_request(&mut self, engine: &mut Engine, limits: Limits, now_ms: u64) -> bool {
        if self.want_close {
            return false;
        }

        let body_len = match frame_len(self.incoming.readable(), limits.max_message_size) {
            Ok(Some(len)) => len,
            Ok(None) => return false,
            Err(e) => {
                tracing::warn!("Dropping {}: {}", self.peer_addr, e);
                self.want_close = true;
                return false;
            }
        };

        let body = &self.incoming.readable()[HEADER_SIZE..HEADER_SIZE + body_len];
        let args = match parse_request(body, limits.max_args) {
            Ok(args) => args,
            Err(e) => {
                tracing::warn!("Dropping {}: {}", self.peer_addr, e);
                self.want_close = true;
                return false;
            }
        };
        tracing::trace!("Request from {} with {} args", self.peer_addr, args.len());

        begin_response(&mut self.outgoing);
        engine.execute(args, &mut ReplyWriter::new(&mut self.outgoing), now_ms);
        end_response(&mut self.outgoing, limits.max_message_size);

        self.incoming.consume(HEADER_SIZE + body_len);
        true
    }

    // =========================================================================
    // Writing
    // =========================================================================

    /// Write as much pending reply data as the socket takes
    pub fn handle_write(&mut self, now_ms: u64) {
        let n = match self.stream.write(self.outgoing.readable()) {
            Ok(n) => n,
            Err(e) if is_transient(&e) => return,
            Err(e) => {
                tracing::debug!("Error writing to {}: {}", self.peer_addr, e);
                self.want_close = true;
                return;
            }
        };
        self.outgoing.consume(n);
        self.last_active_ms = now_ms;

        if self.outgoing.is_empty() {
            self.want_read = true;
            self.want_write = false;
            self.outgoing.shrink_if_wasteful(SHRINK_FLOOR);
        }
    }

    /// Bytes waiting to be parsed and bytes waiting to be written
    pub fn buffered(&self) -> (usize, usize) {
        (self.incoming.len(), self.outgoing.len())
    }
}

fn is_transient(e: &io::Error) -> bool {
    matches!(
        e.kind(),
        io::ErrorKind::WouldBlock | io::ErrorKind::Interrupted
    )
}
