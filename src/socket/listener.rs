//! Listening socket.

use super::address::Address;
use super::connection::Connection;
use super::{close_socket, retry_interrupted, Closed, Handle, SocketError};
use socket2::{Domain, Protocol, Socket, Type};
use std::os::unix::io::AsRawFd;
use tracing::debug;

/// Address bound when none is configured.
pub const DEFAULT_ADDRESS: &str = "127.0.0.1";

/// Pending-connection queue length. The OS may silently clamp it.
pub const DEFAULT_BACKLOG: i32 = 128;

/// Where a listener is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListenerState {
    /// Socket allocated, no address yet.
    Unbound,
    /// Bound to an address, not yet accepting.
    Bound,
    /// Ready to accept connections.
    Listening,
}

/// An IPv4 stream socket that owns its descriptor.
#[derive(Debug)]
pub struct Listener {
    socket: Socket,
    state: ListenerState,
}

impl Listener {
    /// Allocate a new IPv4 TCP socket.
    pub fn create() -> Result<Self, SocketError> {
        let socket = Socket::new(Domain::IPV4, Type::STREAM, Some(Protocol::TCP))?;
        debug!(fd = socket.as_raw_fd(), "Socket created");
        Ok(Self {
            socket,
            state: ListenerState::Unbound,
        })
    }

    /// Bind to `address:port`.
    ///
    /// `address` must be a dotted-quad IPv4 literal. Port 0 asks the OS for
    /// an ephemeral port; see [`Listener::local_address`].
    pub fn bind(mut self, port: u16, address: &str) -> Result<Self, SocketError> {
        let addr = Address::parse(address, port)?;

        self.socket.set_reuse_address(true)?;
        self.socket.bind(&addr.to_sock_addr())?;
        self.state = ListenerState::Bound;

        debug!(fd = self.socket.as_raw_fd(), addr = %addr, "Socket bound");
        Ok(self)
    }

    pub fn listen(mut self, backlog: i32) -> Result<Self, SocketError> {
        self.socket.listen(backlog)?;
        self.state = ListenerState::Listening;

        debug!(fd = self.socket.as_raw_fd(), backlog, "Socket listening");
        Ok(self)
    }

    /// Block until a peer connects. A signal arriving meanwhile does not end
    /// the wait.
    pub fn accept(&self) -> Result<Connection, SocketError> {
        let (socket, peer) = retry_interrupted(|| self.socket.accept())?;
        let peer = Address::from_sock_addr(&peer)?;

        debug!(fd = socket.as_raw_fd(), peer = %peer, "Accepted connection");
        Ok(Connection::new(socket, peer))
    }

    /// The address the OS actually bound, including an ephemeral port.
    pub fn local_address(&self) -> Result<Address, SocketError> {
        Address::from_sock_addr(&self.socket.local_addr()?)
    }

    pub fn state(&self) -> ListenerState {
        self.state
    }

    /// Release the descriptor.
    pub fn close(self) -> Result<Closed, SocketError> {
        let closed = close_socket(self.socket)?;
        debug!(fd = closed.fd(), "Listener closed");
        Ok(closed)
    }
}

impl Handle<Listener> {
    pub fn create() -> Self {
        Listener::create().into()
    }

    pub fn bind(self, port: u16, address: &str) -> Self {
        self.and_then(|listener| listener.bind(port, address).into())
    }

    pub fn listen(self, backlog: i32) -> Self {
        self.and_then(|listener| listener.listen(backlog).into())
    }

    /// Wait for a peer and hand back its connection.
    ///
    /// The listener is only borrowed, so it can accept again or be closed
    /// afterwards. A failed listener yields a failed connection carrying the
    /// same error.
    pub fn accept(&self) -> Handle<Connection> {
        match self {
            Handle::Ready(listener) => listener.accept().into(),
            Handle::Failed(err) => Handle::Failed(err.clone()),
        }
    }

    /// `accept`, then run `f` on the new connection if there is one.
    pub fn accept_with<F>(&self, f: F) -> Handle<Connection>
    where
        F: FnOnce(Connection) -> Handle<Connection>,
    {
        self.accept().and_then(f)
    }

    pub fn local_address(&self) -> Handle<Address> {
        match self {
            Handle::Ready(listener) => listener.local_address().into(),
            Handle::Failed(err) => Handle::Failed(err.clone()),
        }
    }

    pub fn close(self) -> Handle<Closed> {
        self.and_then(|listener| listener.close().into())
    }
}
