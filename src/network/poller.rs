//! Readiness multiplexer
//!
//! Thin wrapper over `poll(2)`. A [`PollSet`] is rebuilt every loop
//! iteration from the current interest of each socket, waited on once, and
//! turned into an owned list of `(token, readiness)` pairs so the caller can
//! go back to mutating its connections.

use std::os::fd::AsFd;
use std::os::raw::c_int;
use std::time::Duration;

use nix::errno::Errno;
use nix::poll::{poll, PollFd, PollFlags};

use crate::error::Result;

/// What a socket wants to be woken up for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Interest {
    pub readable: bool,
    pub writable: bool,
}

impl Interest {
    pub const READABLE: Interest = Interest {
        readable: true,
        writable: false,
    };

    fn flags(self) -> PollFlags {
        // errors are always reported
        let mut flags = PollFlags::POLLERR;
        if self.readable {
            flags |= PollFlags::POLLIN;
        }
        if self.writable {
            flags |= PollFlags::POLLOUT;
        }
        flags
    }
}

/// What a socket turned out to be ready for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Readiness(PollFlags);

impl Readiness {
    pub fn is_readable(&self) -> bool {
        self.0.contains(PollFlags::POLLIN)
    }

    pub fn is_writable(&self) -> bool {
        self.0.contains(PollFlags::POLLOUT)
    }

    /// Peer hung up; pending data may still be readable
    pub fn is_hangup(&self) -> bool {
        self.0.contains(PollFlags::POLLHUP)
    }

    pub fn is_error(&self) -> bool {
        self.0.intersects(PollFlags::POLLERR | PollFlags::POLLNVAL)
    }
}

/// One round of registrations
pub struct PollSet<'a> {
    fds: Vec<PollFd<'a>>,
    tokens: Vec<usize>,
}

impl<'a> PollSet<'a> {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            fds: Vec::with_capacity(capacity),
            tokens: Vec::with_capacity(capacity),
        }
    }

    /// Watch `fd` for `interest`; it is reported back under `token`
    pub fn register<F: AsFd>(&mut self, token: usize, fd: &'a F, interest: Interest) {
        self.fds.push(PollFd::new(fd, interest.flags()));
        self.tokens.push(token);
    }

    pub fn len(&self) -> usize {
        self.fds.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fds.is_empty()
    }

    /// Block until a registered fd is ready or `timeout` passes (`None`
    /// waits forever). An interrupted wait reports nothing ready.
    pub fn wait(mut self, timeout: Option<Duration>) -> Result<Vec<(usize, Readiness)>> {
        match poll(&mut self.fds, timeout_ms(timeout)) {
            Ok(_) => {}
            Err(Errno::EINTR) => return Ok(Vec::new()),
            Err(e) => return Err(std::io::Error::from(e).into()),
        }

        let ready = self
            .fds
            .iter()
            .zip(&self.tokens)
            .filter_map(|(fd, &token)| {
                let revents = fd.revents().unwrap_or(PollFlags::empty());
                (!revents.is_empty()).then_some((token, Readiness(revents)))
            })
            .collect();
        Ok(ready)
    }
}

/// Milliseconds for `poll(2)`, rounded up so a short timer never spins
pub fn timeout_ms(timeout: Option<Duration>) -> c_int {
    match timeout {
        None => -1,
        Some(d) => {
            let ms = d.as_nanos().div_ceil(1_000_000);
            ms.min(c_int::MAX as u128) as c_int
        }
    }
}

