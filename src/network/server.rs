//! TCP Server
//!
//! Single-threaded event loop over non-blocking sockets.
//!
//! ## Loop Iteration
//! 1. Compute the wait timeout from the nearest timer (idle connection,
//!    key expiry, or the shutdown check interval)
//! 2. Register the listener and every connection's interest, then wait
//! 3. Accept new clients until the listener would block
//! 4. Drive ready connections through their read/write handlers and
//!    destroy the ones that asked to close
//! 5. Close idle connections and expire keys whose TTL has passed

use std::io;
use std::net::{SocketAddr, TcpListener};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crate::clock::monotonic_ms;
use crate::config::Config;
use crate::engine::Engine;
use crate::error::Result;

use super::connection::{Connection, Limits};
use super::idle::IdleList;
use super::poller::{Interest, PollSet, Readiness};

/// Poll token of the listening socket; connections use their fd
const LISTENER: usize = usize::MAX;

/// Stops a running [`Server`] from another thread
#[derive(Debug, Clone)]
pub struct ShutdownHandle(Arc<AtomicBool>);

impl ShutdownHandle {
    /// Ask the loop to exit; it notices within `max_poll_wait_ms`
    pub fn shutdown(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_shutdown(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// TCP server for TideKV
pub struct Server {
    config: Config,
    limits: Limits,
    listener: TcpListener,
    local_addr: SocketAddr,
    engine: Engine,

    /// Connections indexed by socket fd
    connections: Vec<Option<Connection>>,
    active: usize,

    /// Connections by last activity, oldest first
    idle: IdleList,

    shutdown: ShutdownHandle,
}

impl Server {
    /// Validate `config`, bind the listener and build the engine
    pub fn bind(config: Config) -> Result<Self> {
        config.validate()?;

        let listener = TcpListener::bind(&config.listen_addr)?;
        listener.set_nonblocking(true)?;
        let local_addr = listener.local_addr()?;
        let engine = Engine::new(&config)?;
        tracing::info!("Listening on {}", local_addr);

        Ok(Self {
            limits: Limits::from(&config),
            config,
            listener,
            local_addr,
            engine,
            connections: Vec::new(),
            active: 0,
            idle: IdleList::new(),
            shutdown: ShutdownHandle(Arc::new(AtomicBool::new(false))),
        })
    }

    /// Address the listener is bound to
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Number of open client connections
    pub fn connection_count(&self) -> usize {
        self.active
    }

    pub fn shutdown_handle(&self) -> ShutdownHandle {
        self.shutdown.clone()
    }

    /// Signal the server to shutdown gracefully
    pub fn shutdown(&self) {
        self.shutdown.shutdown();
    }

    pub fn engine(&self) -> &Engine {
        &self.engine
    }

    /// Run the event loop until shutdown is requested
    pub fn run(&mut self) -> Result<()> {
        while !self.shutdown.is_shutdown() {
            self.poll_once()?;
        }
        tracing::info!(
            "Server stopped with {} open connections and {} keys",
            self.active,
            self.engine.len()
        );
        Ok(())
    }

    /// One event loop iteration
    pub fn poll_once(&mut self) -> Result<()> {
        let timeout = self.next_timeout(monotonic_ms());

        let ready = {
            let mut set = PollSet::with_capacity(self.active + 1);
            set.register(LISTENER, &self.listener, Interest::READABLE);
            for conn in self.connections.iter().flatten() {
                set.register(conn.fd() as usize, conn.stream(), conn.interest());
            }
            set.wait(Some(timeout))?
        };

        let now = monotonic_ms();
        for (token, readiness) in ready {
            if token == LISTENER {
                self.accept_all(now);
            } else {
                self.handle_ready(token, readiness, now);
            }
        }

        self.process_timers(monotonic_ms());
        Ok(())
    }

    // =========================================================================
    // Connections
    // =========================================================================

    fn accept_all(&mut self, now_ms: u64) {
        loop {
            match self.listener.accept() {
                Ok((stream, addr)) => {
                    if self.active >= self.config.max_connections {
                        tracing::warn!("Connection limit reached, rejecting {}", addr);
                        continue;
                    }
                    match Connection::new(stream, now_ms) {
                        Ok(conn) => self.register(conn),
                        Err(e) => tracing::warn!("Failed to set up connection from {}: {}", addr, e),
                    }
                }
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => break,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => {
                    tracing::warn!("Accept error: {}", e);
                    break;
                }
            }
        }
    }

    fn register(&mut self, conn: Connection) {
        let fd = conn.fd() as usize;
        if fd >= self.connections.len() {
            self.connections.resize_with(fd + 1, || None);
        }
        tracing::debug!("Connection established from {}", conn.peer_addr());
        self.connections[fd] = Some(conn);
        self.idle.push_back(fd);
        self.active += 1;
    }

    fn handle_ready(&mut self, fd: usize, readiness: Readiness, now_ms: u64) {
        let Some(conn) = self.connections.get_mut(fd).and_then(Option::as_mut) else {
            return;
        };
        conn.touch(now_ms);
        self.idle.touch(fd);

        if readiness.is_error() {
            conn.close();
        } else if conn.wants_read() && (readiness.is_readable() || readiness.is_hangup()) {
            conn.handle_read(&mut self.engine, self.limits, now_ms);
        } else if conn.wants_write() && (readiness.is_writable() || readiness.is_hangup()) {
            conn.handle_write(now_ms);
        }

        if conn.wants_close() {
            self.destroy(fd);
        }
    }

    fn destroy(&mut self, fd: usize) {
        let Some(conn) = self.connections.get_mut(fd).and_then(Option::take) else {
            return;
        };
        self.idle.remove(fd);
        self.active -= 1;
        tracing::debug!("Closed connection from {}", conn.peer_addr());
    }

    // =========================================================================
    // Timers
    // =========================================================================

    /// Time until the nearest timer, capped by `max_poll_wait_ms`
    fn next_timeout(&self, now_ms: u64) -> Duration {
        let mut wait_ms = self.config.max_poll_wait_ms;
        if let Some(deadline) = self.next_idle_deadline() {
            wait_ms = wait_ms.min(deadline.saturating_sub(now_ms));
        }
        if let Some(expires_at) = self.engine.next_expiry() {
            wait_ms = wait_ms.min(expires_at.saturating_sub(now_ms));
        }
        Duration::from_millis(wait_ms)
    }

    fn next_idle_deadline(&self) -> Option<u64> {
        let fd = self.idle.front()?;
        let conn = self.connections.get(fd)?.as_ref()?;
        Some(conn.last_active_ms() + self.config.idle_timeout_ms)
    }

    fn process_timers(&mut self, now_ms: u64) {
        while let Some(fd) = self.idle.front() {
            match self.next_idle_deadline() {
                Some(deadline) if deadline > now_ms => break,
                Some(_) => {
                    tracing::debug!("Closing idle connection on fd {}", fd);
                    self.destroy(fd);
                }
                None => {
                    // no connection behind this entry
                    self.idle.remove(fd);
                }
            }
        }

        let expired = self.engine.process_expired(now_ms);
        if expired > 0 {
            tracing::trace!("Expired {} keys", expired);
        }
    }
}
