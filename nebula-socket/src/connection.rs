//! Behaviour shared by clients and servers.

use crate::config::{ConnectionConfig, Domain, Protocol, SocketType};
use crate::error::Result;

use std::time::Duration;

/// A socket described by a validated [`ConnectionConfig`].
///
/// A connection moves from unopened to open on a successful
/// [`open`](Self::open) and to closed on [`close`](Self::close). Opening a
/// closed connection creates a new socket.
pub trait Connection {
    /// The configuration this connection was built from.
    fn config(&self) -> &ConnectionConfig;

    /// Opens the underlying socket. Does nothing if it is already open.
    fn open(&mut self) -> Result<()>;

    /// Shuts down and releases the socket.
    ///
    /// Never fails and may be called any number of times.
    fn close(&mut self);

    /// Returns `true` while a socket handle is held.
    fn is_open(&self) -> bool;

    fn host(&self) -> &str {
        self.config().host()
    }

    fn port(&self) -> Option<u16> {
        self.config().port()
    }

    fn domain(&self) -> Domain {
        self.config().domain()
    }

    fn socket_type(&self) -> SocketType {
        self.config().socket_type()
    }

    fn protocol(&self) -> Option<Protocol> {
        self.config().protocol()
    }

    fn timeout(&self) -> Duration {
        self.config().timeout()
    }

    /// See [`ConnectionConfig::uri`].
    fn uri(&self) -> String {
        self.config().uri()
    }
}
