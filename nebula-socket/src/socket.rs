use crate::config::{Domain, Endpoint, Protocol, SocketType};
use crate::sys::platform::{
    MSG_PEEK, Readiness, sys_accept, sys_bind, sys_close, sys_connect, sys_listen, sys_peername,
    sys_poll, sys_recv, sys_send, sys_set_linger, sys_set_nonblocking, sys_set_reuseaddr,
    sys_set_reuseport, sys_shutdown, sys_socket,
};

use std::io;
use std::os::fd::{AsRawFd, FromRawFd, IntoRawFd, OwnedFd, RawFd};
use std::time::Duration;

use tracing::trace;

/// An exclusively owned OS socket.
///
/// The handle is shut down and closed when the `Socket` is dropped.
/// Failures during that release are ignored: there is nobody left to
/// report them to.
///
/// Sockets opened by other code can be handed over through
/// [`From<OwnedFd>`] or [`FromRawFd`].
#[derive(Debug)]
pub struct Socket {
    /// File descriptor of the socket.
    fd: RawFd,
}

impl Socket {
    /// Creates a socket for the given domain, type and protocol.
    pub(crate) fn new(
        domain: Domain,
        socket_type: SocketType,
        protocol: Option<Protocol>,
    ) -> io::Result<Self> {
        let protocol = protocol.map(Protocol::as_raw).unwrap_or(0);
        let fd = sys_socket(domain.as_raw(), socket_type.as_raw(), protocol)?;

        Ok(Self { fd })
    }

    pub(crate) fn connect(&self, endpoint: &Endpoint) -> io::Result<()> {
        sys_connect(self.fd, endpoint)
    }

    pub(crate) fn bind(&self, endpoint: &Endpoint) -> io::Result<()> {
        sys_bind(self.fd, endpoint)
    }

    pub(crate) fn listen(&self) -> io::Result<()> {
        sys_listen(self.fd)
    }

    /// Accepts one pending connection.
    ///
    /// Returns `Ok(None)` when a non-blocking listener has nothing queued.
    pub(crate) fn accept(&self) -> io::Result<Option<Socket>> {
        loop {
            match sys_accept(self.fd) {
                Ok(fd) => return Ok(Some(Socket { fd })),
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => return Ok(None),
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            }
        }
    }

    pub(crate) fn peer_endpoint(&self) -> io::Result<Endpoint> {
        sys_peername(self.fd)
    }

    pub(crate) fn set_nonblocking(&self) -> io::Result<()> {
        sys_set_nonblocking(self.fd)
    }

    pub(crate) fn set_reuse_address(&self) -> io::Result<()> {
        sys_set_reuseaddr(self.fd)
    }

    pub(crate) fn set_reuse_port(&self) -> io::Result<()> {
        sys_set_reuseport(self.fd)
    }

    pub(crate) fn set_linger(&self, linger: Option<Duration>) -> io::Result<()> {
        sys_set_linger(self.fd, linger)
    }

    /// Receives without blocking.
    pub(crate) fn recv(&self, buffer: &mut [u8]) -> io::Result<usize> {
        let n = sys_recv(self.fd, buffer, 0)?;
        trace!(fd = self.fd, bytes = n, "Received");
        Ok(n)
    }

    /// Reads queued data without blocking and without consuming it.
    pub(crate) fn peek(&self, buffer: &mut [u8]) -> io::Result<usize> {
        sys_recv(self.fd, buffer, MSG_PEEK)
    }

    /// Sends the entire buffer.
    ///
    /// Partial sends are continued, and a full send buffer on a
    /// non-blocking socket is waited out.
    ///
    /// # Errors
    ///
    /// Returns `WriteZero` if the kernel accepts zero bytes.
    pub(crate) fn send_all(&self, mut buffer: &[u8]) -> io::Result<usize> {
        let total = buffer.len();

        while !buffer.is_empty() {
            match sys_send(self.fd, buffer) {
                Ok(0) => {
                    return Err(io::Error::new(
                        io::ErrorKind::WriteZero,
                        "send returned zero bytes",
                    ));
                }
                Ok(n) => buffer = &buffer[n..],
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => {
                    self.wait(Readiness::Writable, None)?;
                }
                Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
                Err(e) => return Err(e),
            }
        }

        trace!(fd = self.fd, bytes = total, "Sent");

        Ok(total)
    }

    /// Waits for readiness, at most `timeout` (`None` waits forever).
    pub(crate) fn wait(&self, readiness: Readiness, timeout: Option<Duration>) -> io::Result<bool> {
        sys_poll(self.fd, readiness, timeout)
    }

    /// Shuts down and closes the socket, ignoring errors.
    fn release(&self) {
        let _ = sys_shutdown(self.fd);
        sys_close(self.fd);
    }
}

impl Drop for Socket {
    /// Shuts down and closes the socket.
    fn drop(&mut self) {
        self.release();
    }
}

impl AsRawFd for Socket {
    fn as_raw_fd(&self) -> RawFd {
        self.fd
    }
}

impl IntoRawFd for Socket {
    /// Gives up ownership without closing the socket.
    fn into_raw_fd(self) -> RawFd {
        let fd = self.fd;
        std::mem::forget(self);
        fd
    }
}

impl FromRawFd for Socket {
    /// Takes ownership of an open socket.
    ///
    /// # Safety
    ///
    /// `fd` must be an open socket that nothing else will close.
    unsafe fn from_raw_fd(fd: RawFd) -> Self {
        Self { fd }
    }
}

impl From<OwnedFd> for Socket {
    fn from(fd: OwnedFd) -> Self {
        Self {
            fd: fd.into_raw_fd(),
        }
    }
}
