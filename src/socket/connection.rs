//! Accepted client connections.
//!
//! A connection lives for one request/response exchange: it is produced by
//! `accept`, read once, written once and closed.

use super::address::Address;
use super::{close_socket, retry_interrupted, Closed, Handle, SocketError};
use bytes::{Bytes, BytesMut};
use socket2::Socket;
use std::io::{self, Read, Write};
use std::net::Shutdown;
use std::time::Duration;
use tracing::{debug, trace};

/// Largest single read; bigger capacities are clamped to this.
pub const MAX_READ_CAPACITY: usize = 1024 * 1024;

/// Most unread input discarded while closing.
const DRAIN_LIMIT: usize = 64 * 1024;

/// How long close waits for the peer between drained reads.
const DRAIN_TIMEOUT: Duration = Duration::from_secs(1);

/// What a single read produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReadOutcome {
    /// At least one byte arrived.
    Data(Bytes),
    /// The peer closed its side before sending anything more.
    Closed,
}

/// A single client connection.
#[derive(Debug)]
pub struct Connection {
    socket: Socket,
    peer: Address,
}

impl Connection {
    pub(crate) fn new(socket: Socket, peer: Address) -> Self {
        Self { socket, peer }
    }

    /// Address of the remote end, as reported by accept.
    pub fn peer(&self) -> Address {
        self.peer
    }

    /// Block until data arrives or the peer closes, reading at most
    /// `capacity` bytes.
    ///
    /// The capacity is clamped to `1..=MAX_READ_CAPACITY`: an empty buffer
    /// could not tell data apart from end of stream, and the buffer is
    /// allocated up front.
    pub fn read(&mut self, capacity: usize) -> Result<ReadOutcome, SocketError> {
        let mut buf = BytesMut::zeroed(capacity.clamp(1, MAX_READ_CAPACITY));

        let n = retry_interrupted(|| (&self.socket).read(&mut buf))?;

        if n == 0 {
            trace!(peer = %self.peer, "Peer closed connection");
            return Ok(ReadOutcome::Closed);
        }

        buf.truncate(n);
        trace!(peer = %self.peer, bytes = n, "Read");
        Ok(ReadOutcome::Data(buf.freeze()))
    }

    /// Write all of `bytes`, retrying short writes.
    pub fn write(&mut self, bytes: &[u8]) -> Result<usize, SocketError> {
        let mut stream = &self.socket;
        let written = write_fully(&mut stream, bytes)?;
        trace!(peer = %self.peer, bytes = written, "Wrote");
        Ok(written)
    }

    /// Finish sending, discard unread input, and release the descriptor.
    ///
    /// Closing a socket that still has unread input makes the kernel answer
    /// with a reset, which can destroy a response the peer has not read yet.
    /// The write side is shut down first so the peer sees end of stream, then
    /// input is read and dropped until the peer closes, `DRAIN_LIMIT` bytes
    /// have been discarded, or the peer stays silent for `DRAIN_TIMEOUT`.
    pub fn close(self) -> Result<Closed, SocketError> {
        let peer = self.peer;
        self.drain();
        let closed = close_socket(self.socket)?;
        debug!(fd = closed.fd(), peer = %peer, "Connection closed");
        Ok(closed)
    }

    fn drain(&self) {
        if let Err(e) = self.socket.shutdown(Shutdown::Write) {
            trace!(peer = %self.peer, error = %e, "Shutdown failed, skipping drain");
            return;
        }
        if let Err(e) = self.socket.set_read_timeout(Some(DRAIN_TIMEOUT)) {
            trace!(peer = %self.peer, error = %e, "Cannot bound drain, skipping it");
            return;
        }

        let mut scratch = [0u8; 4096];
        let mut drained = 0;
        while drained < DRAIN_LIMIT {
            match retry_interrupted(|| (&self.socket).read(&mut scratch)) {
                Ok(0) => break,
                Ok(n) => drained += n,
                Err(_) => break,
            }
        }

        if drained > 0 {
            trace!(peer = %self.peer, bytes = drained, "Discarded unread input");
        }
    }
}

impl Handle<Connection> {
    /// Read once and pass the connection and what was read to `f`.
    pub fn read_with<F>(self, capacity: usize, f: F) -> Self
    where
        F: FnOnce(Connection, ReadOutcome) -> Handle<Connection>,
    {
        self.and_then(|mut conn| match conn.read(capacity) {
            Ok(outcome) => f(conn, outcome),
            Err(err) => Handle::Failed(err),
        })
    }

    pub fn write(self, bytes: &[u8]) -> Self {
        self.and_then(|mut conn| match conn.write(bytes) {
            Ok(_) => Handle::Ready(conn),
            Err(err) => Handle::Failed(err),
        })
    }

    pub fn close(self) -> Handle<Closed> {
        self.and_then(|conn| conn.close().into())
    }
}

/// Keep calling `write` until every byte is accepted.
///
/// `Interrupted` is retried; a write that accepts zero bytes is an error,
/// since looping on it would never finish.
pub(crate) fn write_fully<W: Write>(writer: &mut W, bytes: &[u8]) -> io::Result<usize> {
    let mut written = 0;

    while written < bytes.len() {
        match writer.write(&bytes[written..]) {
            Ok(0) => {
                return Err(io::Error::new(io::ErrorKind::WriteZero, "write returned 0"));
            }
            Ok(n) => written += n,
            Err(ref e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }

    Ok(written)
}
