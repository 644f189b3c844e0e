use crate::config::{ConnectionBuilder, ConnectionConfig};
use crate::connection::Connection;
use crate::error::{Error, Result};
use crate::payload::Payload;
use crate::socket::Socket;
use crate::sys::platform::Readiness;

use std::io::{self, Read};
use std::time::{Duration, Instant};

use tracing::debug;

/// A connected socket.
///
/// A `Client` is either an outbound connection opened with
/// [`Client::connect`], or a connection accepted by a
/// [`Server`](crate::Server) and wrapped with [`Client::with_socket`].
///
/// # Examples
///
/// ```rust,ignore
/// use nebula_socket::Client;
/// use std::time::Duration;
///
/// let config = Client::builder("127.0.0.1")
///     .port(9000)
///     .timeout(Duration::from_millis(500))
///     .build()?;
///
/// let client = Client::connect(config)?;
/// client.write("hello")?;
/// let reply = client.read()?;
/// ```
#[derive(Debug)]
pub struct Client {
    config: ConnectionConfig,
    /// `None` once closed.
    socket: Option<Socket>,
}

impl Client {
    /// Maximum number of bytes returned by one [`read`](Self::read), and
    /// the chunk size used when writing streams.
    pub const BUFFER_SIZE: usize = 8192;

    /// Starts a configuration for a client connecting to `host`.
    pub fn builder(host: impl Into<String>) -> ConnectionBuilder {
        ConnectionBuilder::new(host)
    }

    /// Creates a socket and connects it to the configured endpoint.
    pub fn connect(config: ConnectionConfig) -> Result<Self> {
        let mut client = Self {
            config,
            socket: None,
        };

        client.open()?;

        Ok(client)
    }

    /// Wraps a socket that is already connected.
    pub fn with_socket(config: ConnectionConfig, socket: Socket) -> Self {
        Self {
            config,
            socket: Some(socket),
        }
    }

    /// Sets how long [`read`](Self::read) waits for data.
    pub fn set_timeout(&mut self, timeout: Duration) {
        self.config.set_timeout(timeout);
    }

    /// The underlying socket, if open.
    pub fn socket(&self) -> Option<&Socket> {
        self.socket.as_ref()
    }

    /// Reports whether the peer still appears connected.
    ///
    /// Peeks one byte without blocking or consuming it. A failed peek, or
    /// a peek reporting an orderly shutdown, means the peer is gone. Having
    /// no data queued yet still counts as alive.
    pub fn is_alive(&self) -> bool {
        let Some(socket) = &self.socket else {
            return false;
        };

        let mut byte = [0u8; 1];
        match socket.peek(&mut byte) {
            Ok(0) => false,
            Ok(_) => true,
            Err(e) => matches!(
                e.kind(),
                io::ErrorKind::WouldBlock | io::ErrorKind::Interrupted
            ),
        }
    }

    /// Returns `true` if data is waiting to be read.
    pub fn has_data(&self) -> bool {
        let Some(socket) = &self.socket else {
            return false;
        };

        let mut byte = [0u8; 1];
        matches!(socket.peek(&mut byte), Ok(n) if n > 0)
    }

    /// Receives one chunk of at most [`BUFFER_SIZE`](Self::BUFFER_SIZE)
    /// bytes.
    ///
    /// Waits up to the configured timeout for data to arrive. Returns the
    /// data of a single receive, or an empty buffer if the timeout elapsed
    /// or the peer closed the connection. Data arriving in several
    /// receives is returned by successive calls, never merged.
    ///
    /// With a zero timeout this performs one receive attempt and returns
    /// immediately.
    ///
    /// # Errors
    ///
    /// - [`Error::UnavailableSocket`] if the client is closed.
    /// - [`Error::Io`] if the receive itself fails.
    pub fn read(&self) -> Result<Vec<u8>> {
        let socket = self.socket.as_ref().ok_or(Error::UnavailableSocket)?;

        let started = Instant::now();
        let mut buffer = vec![0u8; Self::BUFFER_SIZE];

        loop {
            match socket.recv(&mut buffer) {
                Ok(n) => {
                    buffer.truncate(n);
                    return Ok(buffer);
                }
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => {}
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            }

            let remaining = self.config.timeout().saturating_sub(started.elapsed());
            if remaining.is_zero() {
                return Ok(Vec::new());
            }

            match socket.wait(Readiness::Readable, Some(remaining)) {
                Ok(_) => {}
                Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
                Err(e) => return Err(e.into()),
            }
        }
    }

    /// Writes a payload and returns the number of bytes sent.
    ///
    /// Buffers are sent in full. Streams are read in chunks of
    /// [`BUFFER_SIZE`](Self::BUFFER_SIZE) until exhausted, each chunk sent
    /// in full; the total is returned.
    ///
    /// # Errors
    ///
    /// - [`Error::UnavailableSocket`] if the client is closed.
    /// - [`Error::Io`] if reading the stream or sending fails.
    pub fn write<'a>(&self, payload: impl Into<Payload<'a>>) -> Result<usize> {
        let socket = self.socket.as_ref().ok_or(Error::UnavailableSocket)?;

        let written = match payload.into() {
            Payload::Bytes(bytes) => socket.send_all(bytes)?,
            Payload::Stream(reader) => write_stream(socket, reader)?,
            Payload::Rewindable(reader) => write_stream(socket, reader)?,
        };

        Ok(written)
    }
}

impl Connection for Client {
    fn config(&self) -> &ConnectionConfig {
        &self.config
    }

    fn open(&mut self) -> Result<()> {
        if self.socket.is_some() {
            return Ok(());
        }

        let socket = Socket::new(
            self.config.domain(),
            self.config.socket_type(),
            self.config.protocol(),
        )?;
        socket.connect(self.config.endpoint())?;

        debug!(uri = %self.config.uri(), "Client connected");

        self.socket = Some(socket);
        Ok(())
    }

    fn close(&mut self) {
        if self.socket.take().is_some() {
            debug!(uri = %self.config.uri(), "Client closed");
        }
    }

    fn is_open(&self) -> bool {
        self.socket.is_some()
    }
}

fn write_stream<R>(socket: &Socket, reader: &mut R) -> io::Result<usize>
where
    R: Read + ?Sized,
{
    let mut chunk = vec![0u8; Client::BUFFER_SIZE];
    let mut total = 0;

    loop {
        let n = match reader.read(&mut chunk) {
            Ok(0) => return Ok(total),
            Ok(n) => n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        };

        total += socket.send_all(&chunk[..n])?;
    }
}
