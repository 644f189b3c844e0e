use crate::client::Client;
use crate::config::{ConnectionBuilder, ConnectionConfig, Domain, Endpoint};
use crate::connection::Connection;
use crate::error::{Error, Result};
use crate::payload::Payload;
use crate::socket::Socket;

use std::fs;
use std::io::{self, Seek, SeekFrom};
use std::time::Duration;

use tracing::{debug, warn};

/// A listening socket and the clients it has accepted.
///
/// The server never blocks on its listener: pending connections are picked
/// up by [`connect_clients`](Self::connect_clients) or
/// [`update_clients`](Self::update_clients), which the owner calls
/// periodically. Accepted clients are kept in acceptance order until a
/// liveness sweep finds them disconnected.
///
/// # Examples
///
/// ```rust,ignore
/// use nebula_socket::Server;
///
/// let config = Server::builder("127.0.0.1").port(9000).build()?;
/// let mut server = Server::bind(config)?;
///
/// loop {
///     server.write_all("tick")?;
///     std::thread::sleep(std::time::Duration::from_secs(1));
/// }
/// ```
#[derive(Debug)]
pub struct Server {
    config: ConnectionConfig,
    /// Listening socket; `None` once closed.
    socket: Option<Socket>,
    /// Accepted clients in acceptance order.
    clients: Vec<Client>,
}

impl Server {
    /// Starts a configuration for a server bound to `host`.
    pub fn builder(host: impl Into<String>) -> ConnectionBuilder {
        ConnectionBuilder::new(host)
    }

    /// Creates, binds and starts the listening socket.
    pub fn bind(config: ConnectionConfig) -> Result<Self> {
        let mut server = Self {
            config,
            socket: None,
            clients: Vec::new(),
        };

        server.open()?;

        Ok(server)
    }

    /// Sets the read timeout given to clients accepted from now on.
    pub fn set_timeout(&mut self, timeout: Duration) {
        self.config.set_timeout(timeout);
    }

    /// Accepted clients, in acceptance order.
    pub fn clients(&self) -> &[Client] {
        &self.clients
    }

    /// Accepted clients, in acceptance order.
    pub fn clients_mut(&mut self) -> &mut [Client] {
        &mut self.clients
    }

    /// Accepts one pending connection.
    ///
    /// Returns `Ok(None)` when nobody is waiting. Otherwise the accepted
    /// socket is made non-blocking, wrapped in a [`Client`] that inherits
    /// this server's domain, type, protocol and timeout, appended to the
    /// registry and returned.
    ///
    /// # Errors
    ///
    /// - [`Error::UnavailableSocket`] if the server is closed.
    /// - [`Error::Io`] if accepting or configuring the socket fails.
    pub fn connect_client(&mut self) -> Result<Option<&mut Client>> {
        let listener = self.socket.as_ref().ok_or(Error::UnavailableSocket)?;

        let Some(socket) = listener.accept()? else {
            return Ok(None);
        };

        self.register(socket).map(Some)
    }

    /// Accepts every connection pending right now.
    ///
    /// Returns the number of clients accepted. A connection that cannot be
    /// registered (e.g. the peer reset it while it was queued) is logged
    /// and dropped, and the drain goes on. A failing `accept` is logged and
    /// ends the drain.
    pub fn connect_clients(&mut self) -> usize {
        let uri = self.config.uri();
        let mut accepted = 0;

        loop {
            let Some(listener) = &self.socket else {
                break;
            };

            let socket = match listener.accept() {
                Ok(Some(socket)) => socket,
                Ok(None) => break,
                Err(e) => {
                    warn!(%uri, error = %e, "Failed to accept client");
                    break;
                }
            };

            match self.register(socket) {
                Ok(_) => accepted += 1,
                Err(e) => warn!(%uri, error = %e, "Dropped client that could not be registered"),
            }
        }

        accepted
    }

    /// Configures an accepted socket and appends it to the registry.
    fn register(&mut self, socket: Socket) -> Result<&mut Client> {
        let peer = socket.peer_endpoint()?;
        socket.set_nonblocking()?;

        let config = self.config.for_peer(&peer)?;

        debug!(uri = %self.config.uri(), %peer, "Client accepted");

        let index = self.clients.len();
        self.clients.push(Client::with_socket(config, socket));

        Ok(&mut self.clients[index])
    }

    /// Drops every client that is no longer alive.
    ///
    /// Survivors keep their relative order. Returns the number removed.
    pub fn close_disconnected_clients(&mut self) -> usize {
        let before = self.clients.len();

        self.clients.retain(Client::is_alive);

        let removed = before - self.clients.len();
        if removed > 0 {
            debug!(uri = %self.config.uri(), removed, "Disconnected clients removed");
        }

        removed
    }

    /// Prunes disconnected clients, then accepts pending ones.
    ///
    /// This is what keeps the registry current; call it before reading
    /// from, writing to or inspecting the clients.
    pub fn update_clients(&mut self) {
        self.close_disconnected_clients();
        self.connect_clients();
    }

    /// Sends a payload to every client.
    ///
    /// Calls [`update_clients`](Self::update_clients) first. Buffers are
    /// sent as-is to each client; a rewindable stream is sought back to its
    /// current offset before each client. A client that fails to receive
    /// its copy is logged and skipped.
    ///
    /// # Errors
    ///
    /// - [`Error::UnsupportedInput`] for [`Payload::Stream`], which cannot
    ///   be replayed. Nothing is sent in that case.
    /// - [`Error::Io`] if the rewindable stream cannot be sought.
    pub fn write_all<'a>(&mut self, payload: impl Into<Payload<'a>>) -> Result<()> {
        match payload.into() {
            Payload::Stream(_) => Err(Error::unsupported_input(
                "write_all requires bytes or a rewindable stream, got a stream",
            )),

            Payload::Bytes(bytes) => {
                self.update_clients();

                for client in &self.clients {
                    if let Err(e) = client.write(Payload::Bytes(bytes)) {
                        warn!(uri = %client.uri(), error = %e, "Failed to write to client");
                    }
                }

                Ok(())
            }

            Payload::Rewindable(reader) => {
                self.update_clients();

                let offset = reader.stream_position()?;

                for client in &self.clients {
                    reader.seek(SeekFrom::Start(offset))?;

                    let payload = Payload::Rewindable(&mut *reader);
                    let kind = payload.kind();

                    if let Err(e) = client.write(payload) {
                        warn!(uri = %client.uri(), kind, error = %e, "Failed to write to client");
                    }
                }

                Ok(())
            }
        }
    }
}

impl Connection for Server {
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

        if matches!(self.config.domain(), Domain::Ipv4 | Domain::Ipv6) {
            socket.set_reuse_address()?;
            socket.set_reuse_port()?;
        }

        socket.bind(self.config.endpoint())?;
        socket.listen()?;
        socket.set_linger(Some(Duration::ZERO))?;
        socket.set_nonblocking()?;

        debug!(uri = %self.config.uri(), "Server listening");

        self.socket = Some(socket);
        Ok(())
    }

    /// Closes the listening socket and removes a Unix-domain socket file.
    /// Accepted clients stay registered and open.
    fn close(&mut self) {
        if self.socket.take().is_none() {
            return;
        }

        if let Endpoint::Unix(path) = self.config.endpoint() {
            match fs::remove_file(path) {
                Ok(()) => {}
                Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "Failed to remove socket file")
                }
            }
        }

        debug!(uri = %self.config.uri(), "Server closed");
    }

    fn is_open(&self) -> bool {
        self.socket.is_some()
    }
}

impl Drop for Server {
    fn drop(&mut self) {
        self.close();
    }
}
