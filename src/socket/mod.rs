//! Blocking socket lifecycle built as a railway.
//!
//! Every stage of the server pipeline (create, bind, listen, accept, read,
//! write, close) produces a [`Handle`]: either `Ready` with an open
//! descriptor, or `Failed` with the diagnostic of the first stage that went
//! wrong. Calling any further stage on a `Failed` handle hands the same error
//! straight back, so a pipeline can be written as one chain and inspected
//! once at the end.
//!
//! - `Listener`: unbound -> bound -> listening, produces connections
//! - `Connection`: one accepted peer, read/write/close
//! - `Closed`: what a successful close leaves behind
//! - `Address`: IPv4 host + port with explicit network byte order
//!
//! All calls block. Apart from the bounded drain when a connection closes,
//! there are no timeouts: a peer that connects and never sends anything
//! holds the pipeline indefinitely.

mod address;
mod connection;
mod listener;

pub use address::{
    format_ipv4, parse_ipv4, port_from_network_order, port_to_network_order, Address,
};
pub use connection::{Connection, ReadOutcome, MAX_READ_CAPACITY};
pub use listener::{Listener, ListenerState, DEFAULT_ADDRESS, DEFAULT_BACKLOG};

use std::io;
use std::os::unix::io::RawFd;

/// Errors produced by the socket pipeline.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SocketError {
    /// An OS call failed; carries the OS diagnostic.
    #[error("{0}")]
    System(String),

    /// The bind address is not a dotted-quad IPv4 literal.
    #[error("unable to parse address: {0}")]
    AddressParse(String),
}

impl SocketError {
    /// Build a `System` error from a raw errno value.
    pub fn from_errno(errno: i32) -> Self {
        io::Error::from_raw_os_error(errno).into()
    }

    /// Build a `System` error from the calling thread's current errno.
    pub fn last_os_error() -> Self {
        io::Error::last_os_error().into()
    }
}

impl From<io::Error> for SocketError {
    fn from(err: io::Error) -> Self {
        SocketError::System(err.to_string())
    }
}

/// Outcome of a pipeline stage.
#[derive(Debug)]
#[must_use = "a failed handle carries the error of the stage that produced it"]
pub enum Handle<T> {
    /// The stage succeeded and `T` owns an open descriptor.
    Ready(T),
    /// The stage, or an earlier one, failed.
    Failed(SocketError),
}

impl<T> Handle<T> {
    /// Run the next stage if ready; otherwise pass the error through untouched.
    pub fn and_then<U, F>(self, f: F) -> Handle<U>
    where
        F: FnOnce(T) -> Handle<U>,
    {
        match self {
            Handle::Ready(value) => f(value),
            Handle::Failed(err) => Handle::Failed(err),
        }
    }

    pub fn map<U, F>(self, f: F) -> Handle<U>
    where
        F: FnOnce(T) -> U,
    {
        match self {
            Handle::Ready(value) => Handle::Ready(f(value)),
            Handle::Failed(err) => Handle::Failed(err),
        }
    }

    pub fn is_ready(&self) -> bool {
        matches!(self, Handle::Ready(_))
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, Handle::Failed(_))
    }

    /// Borrow the ready value, if any.
    pub fn ready(&self) -> Option<&T> {
        match self {
            Handle::Ready(value) => Some(value),
            Handle::Failed(_) => None,
        }
    }

    /// Borrow the error, if any.
    pub fn error(&self) -> Option<&SocketError> {
        match self {
            Handle::Ready(_) => None,
            Handle::Failed(err) => Some(err),
        }
    }

    pub fn into_result(self) -> Result<T, SocketError> {
        match self {
            Handle::Ready(value) => Ok(value),
            Handle::Failed(err) => Err(err),
        }
    }
}

impl<T> From<Result<T, SocketError>> for Handle<T> {
    fn from(result: Result<T, SocketError>) -> Self {
        match result {
            Ok(value) => Handle::Ready(value),
            Err(err) => Handle::Failed(err),
        }
    }
}

/// A descriptor that has been released.
///
/// Only the number is kept, for logging. Nothing here owns an OS resource,
/// so closing it again reports `EBADF` without issuing a syscall that could
/// hit a descriptor the OS has since handed out to someone else.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Closed {
    fd: RawFd,
}

impl Closed {
    pub(crate) fn new(fd: RawFd) -> Self {
        Self { fd }
    }

    /// The descriptor number that was released.
    pub fn fd(&self) -> RawFd {
        self.fd
    }

    pub fn close(self) -> Handle<Closed> {
        Handle::Failed(SocketError::from_errno(libc::EBADF))
    }
}

impl Handle<Closed> {
    /// Closing an already closed handle always fails.
    pub fn close(self) -> Handle<Closed> {
        self.and_then(Closed::close)
    }
}

/// Repeat a blocking call for as long as it is interrupted by a signal.
pub(crate) fn retry_interrupted<T, F>(mut op: F) -> io::Result<T>
where
    F: FnMut() -> io::Result<T>,
{
    loop {
        match op() {
            Err(ref e) if e.kind() == io::ErrorKind::Interrupted => continue,
            result => return result,
        }
    }
}

/// Release a socket's descriptor and report what `close(2)` said.
pub(crate) fn close_socket(socket: socket2::Socket) -> Result<Closed, SocketError> {
    use std::os::unix::io::IntoRawFd;

    let fd = socket.into_raw_fd();
    // SAFETY: `fd` was just taken out of the owning socket, nothing else refers to it.
    if unsafe { libc::close(fd) } != 0 {
        return Err(SocketError::last_os_error());
    }
    Ok(Closed::new(fd))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_and_then_passes_failure_through() {
        let err = SocketError::System("Connection refused (os error 111)".to_string());
        let handle: Handle<u32> = Handle::Failed(err.clone());

        let mut called = false;
        let next: Handle<String> = handle.and_then(|n| {
            called = true;
            Handle::Ready(n.to_string())
        });

        assert!(!called);
        assert_eq!(next.error(), Some(&err));
    }

    #[test]
    fn test_map_and_into_result() {
        let handle: Handle<u32> = Handle::Ready(7);
        assert_eq!(handle.map(|n| n * 6).into_result(), Ok(42));

        let failed: Handle<u32> = Handle::Failed(SocketError::AddressParse("x".into()));
        assert!(failed.map(|n| n * 6).is_failed());
    }

    #[test]
    fn test_from_result() {
        let ok: Handle<u8> = Ok(1).into();
        assert!(ok.is_ready());
        assert_eq!(ok.ready(), Some(&1));

        let err: Handle<u8> = Err(SocketError::System("boom".into())).into();
        assert!(err.is_failed());
        assert!(err.ready().is_none());
    }

    #[test]
    fn test_error_messages() {
        let err = SocketError::from_errno(libc::EBADF);
        match &err {
            SocketError::System(msg) => assert!(msg.contains("os error")),
            other => panic!("unexpected: {:?}", other),
        }

        let err = SocketError::AddressParse("'300.1.1.1'".to_string());
        assert_eq!(err.to_string(), "unable to parse address: '300.1.1.1'");
    }

    #[test]
    fn test_retry_interrupted() {
        let mut calls = 0;
        let result = retry_interrupted(|| {
            calls += 1;
            if calls < 3 {
                Err(io::Error::from(io::ErrorKind::Interrupted))
            } else {
                Ok(calls)
            }
        });
        assert_eq!(result.unwrap(), 3);

        let err = retry_interrupted::<(), _>(|| Err(io::Error::from_raw_os_error(libc::EMFILE)))
            .unwrap_err();
        assert_eq!(err.raw_os_error(), Some(libc::EMFILE));
    }

    #[test]
    fn test_closed_cannot_be_closed_again() {
        let closed: Handle<Closed> = Handle::Ready(Closed::new(3));
        match closed.close() {
            Handle::Failed(SocketError::System(msg)) => assert!(msg.contains("os error")),
            other => panic!("unexpected: {:?}", other),
        }
    }
}
