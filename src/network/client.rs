//! Blocking client
//!
//! Used by the CLI and the tests. Requests may be pipelined with
//! [`Client::send`] followed by the same number of [`Client::recv`] calls.

use std::io::{BufReader, BufWriter, Write};
use std::net::{TcpStream, ToSocketAddrs};
use std::time::Duration;

use crate::error::{Result, TideError};
use crate::protocol::{encode_request, read_response, Response, MAX_MESSAGE_SIZE};

/// A connection to a TideKV server
pub struct Client {
    reader: BufReader<TcpStream>,
    writer: BufWriter<TcpStream>,
}

impl Client {
    /// Connect to `addr`
    pub fn connect<A: ToSocketAddrs>(addr: A) -> Result<Self> {
        let stream = TcpStream::connect(addr)
            .map_err(|e| TideError::Network(format!("connect failed: {}", e)))?;
        stream.set_nodelay(true)?;

        let read_stream = stream.try_clone()?;
        Ok(Self {
            reader: BufReader::new(read_stream),
            writer: BufWriter::new(stream),
        })
    }

    /// Fail reads that block longer than `timeout`
    pub fn set_read_timeout(&self, timeout: Option<Duration>) -> Result<()> {
        self.reader.get_ref().set_read_timeout(timeout)?;
        Ok(())
    }

    /// Send one request and wait for its reply
    pub fn request<S: AsRef<[u8]>>(&mut self, args: &[S]) -> Result<Response> {
        self.send(args)?;
        self.flush()?;
        self.recv()
    }

    /// Queue a request without waiting for the reply
    pub fn send<S: AsRef<[u8]>>(&mut self, args: &[S]) -> Result<()> {
        let frame = encode_request(args, MAX_MESSAGE_SIZE)?;
        self.writer.write_all(&frame)?;
        Ok(())
    }

    /// Push queued requests to the server
    pub fn flush(&mut self) -> Result<()> {
        self.writer.flush()?;
        Ok(())
    }

    /// Read the next reply, flushing queued requests first
    pub fn recv(&mut self) -> Result<Response> {
        self.flush()?;
        read_response(&mut self.reader, MAX_MESSAGE_SIZE)
    }

    /// Send raw bytes, for exercising malformed input
    pub fn send_raw(&mut self, bytes: &[u8]) -> Result<()> {
        self.writer.write_all(bytes)?;
        self.flush()
    }
}
